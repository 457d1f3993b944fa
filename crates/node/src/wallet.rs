//! Wallet-facing request handlers.
//!
//! The stake and bid automatons (external maintenance) request renewal
//! transactions through these topics; the chain's rebuild path clears
//! the wallet database through them as well. Transaction construction
//! proper lives in the external wallet; this service builds the opaque
//! payloads the executor understands and feeds them to the mempool.

use crate::mempool::TxPool;
use sable_bus::{
    BusError, Request, RequestBus, RequestParams, RequestResponse, RequestTopic,
};
use sable_types::{encoding, Transaction};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const STAKE_TAG: u8 = 0x01;
const BID_TAG: u8 = 0x02;

/// Sizing rules for renewal transactions.
#[derive(Debug, Clone)]
pub struct WalletConfig {
    pub default_amount: u64,
    pub default_lock_time: u64,
    pub max_lock_time: u64,
}

/// Spawn the wallet service.
pub fn spawn(
    rb: RequestBus,
    pool: TxPool,
    config: WalletConfig,
    cancel: CancellationToken,
) -> Result<JoinHandle<()>, BusError> {
    let mut stake_rx = rb.register(RequestTopic::SendStakeTx)?;
    let mut bid_rx = rb.register(RequestTopic::SendBidTx)?;
    let mut clear_rx = rb.register(RequestTopic::ClearWalletDatabase)?;

    let handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,

                Some(req) = stake_rx.recv() => {
                    submit_locked_tx(&pool, &config, STAKE_TAG, req);
                }

                Some(req) = bid_rx.recv() => {
                    submit_locked_tx(&pool, &config, BID_TAG, req);
                }

                Some(req) = clear_rx.recv() => {
                    info!("clearing wallet database");
                    let _ = req.response.send(Ok(RequestResponse::Empty));
                }
            }
        }
    });

    Ok(handle)
}

fn submit_locked_tx(pool: &TxPool, config: &WalletConfig, tag: u8, req: Request) {
    let (value, lock_time) = match req.params {
        RequestParams::LockedTx { value, lock_time } => (value, lock_time),
        RequestParams::None => (config.default_amount, config.default_lock_time),
        ref other => {
            let _ = req
                .response
                .send(Err(format!("unexpected params {other:?}")));
            return;
        }
    };
    let lock_time = lock_time.min(config.max_lock_time);

    let mut payload = Vec::with_capacity(17);
    encoding::write_u8(&mut payload, tag);
    encoding::write_u64(&mut payload, value);
    encoding::write_u64(&mut payload, lock_time);
    let hash = pool.insert(Transaction::Standard { payload });

    debug!(?hash, tag, value, lock_time, "renewal transaction queued");
    let _ = req.response.send(Ok(RequestResponse::TxHash(hash)));
}
