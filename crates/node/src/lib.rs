//! Node assembly for the sable network.
//!
//! Wires the buses, the chain, the consensus coordinator and the local
//! services (candidate cache, mempool, wallet handlers) into a running
//! node under a single root cancellation token.

pub mod config;
pub mod mempool;
pub mod telemetry;
pub mod wallet;

pub use config::{ConfigError, NodeConfig};
pub use mempool::TxPool;

use sable_bus::{BusError, EventBus, RequestBus, Topic};
use sable_chain::{Chain, ChainCommand, ChainError, MemoryLoader, StaticExecutor, TipProvider};
use sable_consensus::{candidates, BlockGenerator, Coordinator, LocalProver, LocalVerifier};
use sable_messages::Payload;
use sable_types::{BidList, BlsKeyPair, Hash, Provisioners, Stake};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Errors assembling a node.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A running node.
pub struct Node {
    bus: EventBus,
    rb: RequestBus,
    cancel: CancellationToken,
    chain_commands: mpsc::Sender<ChainCommand>,
    tip: Arc<TipProvider>,
}

impl Node {
    /// Assemble and spawn every component.
    pub fn start(config: NodeConfig, keys: BlsKeyPair) -> Result<Node, NodeError> {
        let bus = EventBus::new();
        bus.install_republisher();
        let rb = RequestBus::new();
        let cancel = CancellationToken::new();

        // Local services.
        let pool = TxPool::new();
        let _mempool = mempool::spawn(bus.clone(), rb.clone(), pool.clone(), cancel.clone())?;
        let _wallet = wallet::spawn(
            rb.clone(),
            pool,
            wallet::WalletConfig {
                default_amount: config.consensus.default_amount,
                default_lock_time: config.consensus.default_lock_time,
                max_lock_time: config.consensus.max_lock_time,
            },
            cancel.clone(),
        )?;
        let _candidates = candidates::spawn(bus.clone(), rb.clone(), cancel.clone())?;

        // The test-harness genesis path seeds the consensus sets from
        // our own keys so a fresh network can make progress.
        let prover = LocalProver::new(Hash::digest(keys.public_key().as_bytes()));
        let mut provisioners = Provisioners::new();
        let mut bid_list = BidList::new();
        if config.genesis.legacy {
            provisioners.add_stake(
                keys.public_key(),
                Stake {
                    value: config.consensus.default_amount,
                    start_height: 0,
                    end_height: u64::MAX,
                },
            );
            bid_list.insert(prover.bid(), u64::MAX);
            info!("legacy genesis: staking and bidding with our own keys");
        }
        let is_bidder = bid_list.contains(&prover.bid());

        // Chain.
        let chain = Chain::new(
            bus.clone(),
            rb.clone(),
            Arc::new(MemoryLoader::new()),
            Arc::new(StaticExecutor::new(provisioners)),
            config.chain_config(),
            bid_list,
        )?;
        let chain_commands = chain.commands();
        let tip = chain.tip();
        let _chain = chain.spawn(cancel.clone());

        // Consensus.
        let consensus_config = config.consensus_config();
        let generator = is_bidder.then(|| {
            Arc::new(BlockGenerator::new(
                bus.clone(),
                rb.clone(),
                keys.clone(),
                Arc::new(prover),
                consensus_config.generator_reward,
                consensus_config.mempool_fetch_timeout,
            ))
        });
        let _coordinator = Coordinator::new(
            bus.clone(),
            consensus_config,
            keys,
            Arc::new(LocalVerifier),
            generator,
        )
        .spawn(cancel.clone());

        if config.api.enabled {
            info!("operational API snapshots enabled");
        }

        Ok(Node {
            bus,
            rb,
            cancel,
            chain_commands,
            tip,
        })
    }

    /// Kick off the first round update.
    pub fn initialize(&self) {
        self.bus.publish(Topic::Initialization, Payload::Empty);
    }

    /// The internal event bus.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// The internal request bus.
    pub fn request_bus(&self) -> &RequestBus {
        &self.rb
    }

    /// Chain control surface.
    pub fn chain_commands(&self) -> mpsc::Sender<ChainCommand> {
        self.chain_commands.clone()
    }

    /// Read access to the chain tip.
    pub fn tip(&self) -> Arc<TipProvider> {
        self.tip.clone()
    }

    /// Stop every component.
    pub fn shutdown(&self) {
        info!("shutting down");
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// A legacy-genesis node drives itself from boot to an accepted
    /// block: round update, candidate, reduction, agreement, accept.
    #[tokio::test]
    async fn test_single_node_produces_blocks() {
        let mut config = NodeConfig::default();
        config.genesis.legacy = true;
        config.consensus.committee_size = 16;
        config.consensus.selection_timeout_ms = 100;
        config.consensus.reduction_timeout_ms = 100;

        let node = Node::start(config, BlsKeyPair::generate()).unwrap();
        let (_sub, mut accepted_rx) = node.bus().subscribe(Topic::AcceptedBlock);
        node.initialize();

        let msg = tokio::time::timeout(Duration::from_secs(10), accepted_rx.recv())
            .await
            .expect("a block should be accepted")
            .expect("bus alive");
        match msg.payload {
            Payload::AcceptedBlock(block) => {
                assert_eq!(block.header.height, 1);
                assert!(!block.header.certificate.is_empty());
            }
            other => panic!("unexpected payload {}", other.kind()),
        }
        assert_eq!(node.tip().height(), 1);

        node.shutdown();
    }
}
