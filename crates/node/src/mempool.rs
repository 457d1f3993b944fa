//! In-memory mempool service.
//!
//! Serves verified transactions to the block generator and prunes
//! entries once they land in an accepted block. Transactions enter the
//! pool through the wallet service; transport-layer ingress is an
//! external concern.

use parking_lot::Mutex;
use sable_bus::{
    BusError, EventBus, RequestBus, RequestResponse, RequestTopic, Topic,
};
use sable_messages::Payload;
use sable_types::{Hash, Transaction};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Shared transaction pool.
#[derive(Clone, Default)]
pub struct TxPool {
    txs: Arc<Mutex<HashMap<Hash, Transaction>>>,
}

impl TxPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a verified transaction.
    pub fn insert(&self, tx: Transaction) -> Hash {
        let hash = tx.hash();
        self.txs.lock().insert(hash, tx);
        hash
    }

    /// Snapshot of the pool contents.
    pub fn verified(&self) -> Vec<Transaction> {
        self.txs.lock().values().cloned().collect()
    }

    /// Drop every transaction included in an accepted block.
    pub fn prune(&self, accepted: &[Transaction]) {
        let mut txs = self.txs.lock();
        for tx in accepted {
            txs.remove(&tx.hash());
        }
    }

    pub fn len(&self) -> usize {
        self.txs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.txs.lock().is_empty()
    }
}

/// Spawn the mempool service over a shared pool.
pub fn spawn(
    bus: EventBus,
    rb: RequestBus,
    pool: TxPool,
    cancel: CancellationToken,
) -> Result<JoinHandle<()>, BusError> {
    let mut requests = rb.register(RequestTopic::GetMempoolTxs)?;
    let (acc_sub, mut accepted_rx) = bus.subscribe(Topic::AcceptedBlock);

    let handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,

                Some(req) = requests.recv() => {
                    let _ = req
                        .response
                        .send(Ok(RequestResponse::Transactions(pool.verified())));
                }

                Some(msg) = accepted_rx.recv() => {
                    if let Payload::AcceptedBlock(block) = msg.payload {
                        pool.prune(&block.txs);
                        debug!(height = block.header.height, left = pool.len(),
                            "mempool pruned after accepted block");
                    }
                }
            }
        }
        bus.unsubscribe(Topic::AcceptedBlock, acc_sub);
    });

    Ok(handle)
}
