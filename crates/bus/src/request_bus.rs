//! Typed request/response bus.
//!
//! A caller issues (topic, params, timeout); the one registered handler
//! for that topic replies through a oneshot channel. Registering the
//! same topic twice fails.

use parking_lot::RwLock;
use sable_types::{Block, BlsPublicKey, Certificate, Hash, Transaction};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::trace;

/// Capacity of each handler's request queue.
const HANDLER_QUEUE_CAPACITY: usize = 16;

/// The closed set of request topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestTopic {
    VerifyCandidateBlock,
    GetLastCertificate,
    GetLastCommittee,
    GetCandidate,
    GetMempoolTxs,
    SendStakeTx,
    SendBidTx,
    ClearWalletDatabase,
}

impl fmt::Display for RequestTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Request parameters, one shape per topic.
#[derive(Debug, Clone)]
pub enum RequestParams {
    None,
    /// A full candidate block to verify.
    CandidateBlock(Box<Block>),
    /// The hash of a candidate to fetch.
    CandidateHash(Hash),
    /// Amount and lock duration for a stake or bid transaction.
    LockedTx { value: u64, lock_time: u64 },
}

/// Handler replies.
#[derive(Debug, Clone)]
pub enum RequestResponse {
    Empty,
    Certificate(Certificate),
    Committee(Vec<BlsPublicKey>),
    Candidate(Box<Block>),
    Transactions(Vec<Transaction>),
    TxHash(Hash),
}

/// One in-flight request, as seen by a handler.
pub struct Request {
    pub params: RequestParams,
    pub response: oneshot::Sender<Result<RequestResponse, String>>,
}

/// Errors surfaced to request bus callers.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("topic {0} already registered")]
    AlreadyRegistered(RequestTopic),

    #[error("topic {0} not registered")]
    TopicNotRegistered(RequestTopic),

    #[error("request on {0} timed out")]
    Timeout(RequestTopic),

    #[error("handler dropped the request")]
    HandlerGone,

    #[error("handler error: {0}")]
    Handler(String),
}

/// The request bus. Cheap to clone; all clones share the handler table.
#[derive(Clone, Default)]
pub struct RequestBus {
    handlers: Arc<RwLock<HashMap<RequestTopic, mpsc::Sender<Request>>>>,
}

impl RequestBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a topic. The returned receiver yields every call made to it.
    pub fn register(&self, topic: RequestTopic) -> Result<mpsc::Receiver<Request>, BusError> {
        let mut handlers = self.handlers.write();
        if handlers.contains_key(&topic) {
            return Err(BusError::AlreadyRegistered(topic));
        }
        let (tx, rx) = mpsc::channel(HANDLER_QUEUE_CAPACITY);
        handlers.insert(topic, tx);
        trace!(%topic, "request handler registered");
        Ok(rx)
    }

    /// Issue a request and await its reply within `timeout`.
    pub async fn call(
        &self,
        topic: RequestTopic,
        params: RequestParams,
        timeout: Duration,
    ) -> Result<RequestResponse, BusError> {
        let handler = self
            .handlers
            .read()
            .get(&topic)
            .cloned()
            .ok_or(BusError::TopicNotRegistered(topic))?;

        let (tx, rx) = oneshot::channel();
        let request = Request {
            params,
            response: tx,
        };

        let fut = async {
            handler
                .send(request)
                .await
                .map_err(|_| BusError::HandlerGone)?;
            match rx.await {
                Ok(Ok(resp)) => Ok(resp),
                Ok(Err(e)) => Err(BusError::Handler(e)),
                Err(_) => Err(BusError::HandlerGone),
            }
        };

        tokio::time::timeout(timeout, fut)
            .await
            .map_err(|_| BusError::Timeout(topic))?
    }
}
