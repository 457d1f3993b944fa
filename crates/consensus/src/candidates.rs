//! Candidate block cache.
//!
//! Candidates seen on the candidate topic are kept until the round
//! resolves, so the chain can fetch the winning block by hash when the
//! agreement component announces it.

use sable_bus::{
    BusError, EventBus, Request, RequestBus, RequestParams, RequestResponse, RequestTopic, Topic,
};
use sable_messages::Payload;
use sable_types::{Block, Hash};
use std::collections::HashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Cap on cached candidates between prunes.
const MAX_CANDIDATES: usize = 128;

/// Spawn the candidate cache task.
///
/// Subscribes to candidate dissemination, serves `GetCandidate`, and
/// prunes on every accepted block.
pub fn spawn(
    bus: EventBus,
    rb: RequestBus,
    cancel: CancellationToken,
) -> Result<JoinHandle<()>, BusError> {
    let mut requests = rb.register(RequestTopic::GetCandidate)?;
    let (cand_sub, mut candidates_rx) = bus.subscribe(Topic::Candidate);
    let (acc_sub, mut accepted_rx) = bus.subscribe(Topic::AcceptedBlock);

    let handle = tokio::spawn(async move {
        let mut store: HashMap<Hash, Block> = HashMap::new();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,

                Some(msg) = candidates_rx.recv() => {
                    if let Payload::Candidate(block) = msg.payload {
                        if store.len() >= MAX_CANDIDATES {
                            warn!(len = store.len(), "candidate cache full, dropping");
                            continue;
                        }
                        trace!(hash = ?block.hash(), "candidate cached");
                        store.insert(block.hash(), *block);
                    }
                }

                Some(msg) = accepted_rx.recv() => {
                    if let Payload::AcceptedBlock(_) = msg.payload {
                        debug!(len = store.len(), "pruning candidate cache");
                        store.clear();
                    }
                }

                Some(req) = requests.recv() => {
                    serve(&store, req);
                }
            }
        }

        bus.unsubscribe(Topic::Candidate, cand_sub);
        bus.unsubscribe(Topic::AcceptedBlock, acc_sub);
    });

    Ok(handle)
}

fn serve(store: &HashMap<Hash, Block>, req: Request) {
    let reply = match &req.params {
        RequestParams::CandidateHash(hash) => match store.get(hash) {
            Some(block) => Ok(RequestResponse::Candidate(Box::new(block.clone()))),
            None => Err(format!("no candidate for {hash:?}")),
        },
        other => Err(format!("unexpected params {other:?}")),
    };
    let _ = req.response.send(reply);
}
