//! The chain component.
//!
//! Owns the tip, the provisioner set, the latest certificate and the
//! sync counter. Runs a single event loop over its typed channels, so
//! exactly one block acceptance is in flight at any time.

use crate::error::ChainError;
use crate::executor::Executor;
use crate::loader::Loader;
use crate::sync::{sync_progress, SyncCounter};
use crate::tip::TipProvider;
use crate::verifier::{check_certificate, sanity_check};
use sable_bus::{
    BusMessage, EventBus, Request, RequestBus, RequestParams, RequestResponse, RequestTopic,
    SubscriptionId, Topic,
};
use sable_messages::{GetBlocks, GossipFrame, Inv, Payload, WinningBlock};
use sable_types::{
    BidList, Block, BlsPublicKey, Certificate, Provisioners, RoundUpdate,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Chain configuration.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// Sortition target size used for certificate verification.
    pub committee_size: usize,
    /// Bound on the block ingress queue and on a single sync gap.
    pub max_inv_blocks: u64,
    /// Deadline for fetching the winning candidate.
    pub get_candidate_timeout: Duration,
    /// Deadline for the wallet-database clear during a rebuild.
    pub clear_wallet_timeout: Duration,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            committee_size: 64,
            max_inv_blocks: 500,
            get_candidate_timeout: Duration::from_secs(5),
            clear_wallet_timeout: Duration::from_secs(5),
        }
    }
}

/// Control-surface commands (the gRPC layer's view of the chain).
pub enum ChainCommand {
    /// Wipe storage and restart from genesis.
    Rebuild {
        response: oneshot::Sender<Result<(), String>>,
    },
    /// How close the node is to the highest block seen from peers.
    SyncProgress { response: oneshot::Sender<f32> },
}

/// The chain component. Build with [`Chain::new`], then [`Chain::spawn`].
pub struct Chain {
    bus: EventBus,
    rb: RequestBus,
    loader: Arc<dyn Loader>,
    executor: Arc<dyn Executor>,
    config: ChainConfig,

    tip: Arc<TipProvider>,
    counter: Arc<SyncCounter>,
    provisioners: Provisioners,
    bid_list: BidList,
    last_certificate: Certificate,
    last_committee: Vec<BlsPublicKey>,
    highest_seen: u64,

    subscriptions: Vec<(Topic, SubscriptionId)>,
    block_rx: mpsc::Receiver<BusMessage>,
    init_rx: mpsc::Receiver<BusMessage>,
    agreement_rx: mpsc::Receiver<BusMessage>,
    highest_tx: mpsc::Sender<u64>,
    highest_rx: mpsc::Receiver<u64>,
    command_tx: mpsc::Sender<ChainCommand>,
    command_rx: mpsc::Receiver<ChainCommand>,
    verify_rx: mpsc::Receiver<Request>,
    last_cert_rx: mpsc::Receiver<Request>,
    last_committee_rx: mpsc::Receiver<Request>,
}

impl Chain {
    pub fn new(
        bus: EventBus,
        rb: RequestBus,
        loader: Arc<dyn Loader>,
        executor: Arc<dyn Executor>,
        config: ChainConfig,
        bid_list: BidList,
    ) -> Result<Self, ChainError> {
        let tip_block = loader.load_tip()?;
        let last_certificate = if tip_block.header.height == 0 {
            Certificate::empty()
        } else {
            tip_block.header.certificate
        };
        info!(
            height = tip_block.header.height,
            hash = ?tip_block.hash(),
            "chain tip loaded"
        );

        let (block_sub, block_rx) =
            bus.subscribe_with_capacity(Topic::Block, config.max_inv_blocks as usize);
        let (init_sub, init_rx) = bus.subscribe(Topic::Initialization);
        let (agr_sub, agreement_rx) = bus.subscribe(Topic::Agreement);
        let subscriptions = vec![
            (Topic::Block, block_sub),
            (Topic::Initialization, init_sub),
            (Topic::Agreement, agr_sub),
        ];

        let verify_rx = rb.register(RequestTopic::VerifyCandidateBlock)?;
        let last_cert_rx = rb.register(RequestTopic::GetLastCertificate)?;
        let last_committee_rx = rb.register(RequestTopic::GetLastCommittee)?;

        let (highest_tx, highest_rx) = mpsc::channel(16);
        let (command_tx, command_rx) = mpsc::channel(4);

        Ok(Chain {
            bus,
            rb,
            loader,
            executor,
            config,
            tip: Arc::new(TipProvider::new(tip_block)),
            counter: Arc::new(SyncCounter::new()),
            provisioners: Provisioners::new(),
            bid_list,
            last_certificate,
            last_committee: Vec::new(),
            highest_seen: 0,
            subscriptions,
            block_rx,
            init_rx,
            agreement_rx,
            highest_tx,
            highest_rx,
            command_tx,
            command_rx,
            verify_rx,
            last_cert_rx,
            last_committee_rx,
        })
    }

    /// Shared read access to the tip.
    pub fn tip(&self) -> Arc<TipProvider> {
        self.tip.clone()
    }

    /// Shared view of the sync counter.
    pub fn counter(&self) -> Arc<SyncCounter> {
        self.counter.clone()
    }

    /// Sender for the highest block height observed from peers.
    pub fn highest_seen_sender(&self) -> mpsc::Sender<u64> {
        self.highest_tx.clone()
    }

    /// Control-surface handle.
    pub fn commands(&self) -> mpsc::Sender<ChainCommand> {
        self.command_tx.clone()
    }

    /// Run the chain loop until cancelled.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    async fn run(mut self, cancel: CancellationToken) {
        // Take the authoritative provisioner view up front, so the
        // first round update carries real committees.
        match self.executor.get_provisioners().await {
            Ok(provisioners) => self.provisioners = provisioners,
            Err(e) => warn!(error = %e, "initial provisioner fetch failed"),
        }

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,

                Some(msg) = self.block_rx.recv() => {
                    if let Payload::Block(block) = msg.payload {
                        if let Err(e) = self.on_block(&block).await {
                            warn!(height = block.header.height, error = %e, "block not accepted");
                        }
                    }
                }

                Some(_) = self.init_rx.recv() => {
                    self.send_round_update();
                }

                Some(msg) = self.agreement_rx.recv() => {
                    if let Payload::WinningBlock(win) = msg.payload {
                        self.on_winning_block(*win).await;
                    }
                }

                Some(height) = self.highest_rx.recv() => {
                    self.highest_seen = self.highest_seen.max(height);
                }

                Some(command) = self.command_rx.recv() => {
                    self.on_command(command).await;
                }

                Some(req) = self.verify_rx.recv() => {
                    self.on_verify_candidate(req).await;
                }

                Some(req) = self.last_cert_rx.recv() => {
                    let _ = req.response.send(Ok(RequestResponse::Certificate(self.last_certificate)));
                }

                Some(req) = self.last_committee_rx.recv() => {
                    let reply = if self.last_committee.is_empty() {
                        Err("no last committee present".to_string())
                    } else {
                        Ok(RequestResponse::Committee(self.last_committee.clone()))
                    };
                    let _ = req.response.send(reply);
                }

                else => break,
            }
        }

        for (topic, id) in self.subscriptions.drain(..) {
            self.bus.unsubscribe(topic, id);
        }
        if let Err(e) = self.loader.close() {
            warn!(error = %e, "storage close failed");
        }
    }

    /// Handle a block arriving from peers (or the local agreement path).
    async fn on_block(&mut self, block: &Block) -> Result<(), ChainError> {
        let tip_height = self.tip.height();
        let height = block.header.height;

        if height <= tip_height {
            debug!(height, tip_height, "stale block ignored");
            return Ok(());
        }

        if height > tip_height + 1 {
            self.start_sync(height, tip_height);
            return Ok(());
        }

        self.accept_block(block).await
    }

    /// A height gap triggers synchronization, never acceptance.
    fn start_sync(&mut self, height: u64, tip_height: u64) {
        self.highest_seen = self.highest_seen.max(height);
        let gap = (height - tip_height - 1).min(self.config.max_inv_blocks);
        info!(height, tip_height, gap, "peer is ahead, syncing");

        if !self.counter.is_syncing() {
            self.bus.publish(Topic::StopConsensus, Payload::Empty);
        }
        self.counter.start(gap.max(self.counter.remaining()));

        let frame = GossipFrame::get_blocks(&GetBlocks {
            locator: self.tip.get().hash(),
        });
        self.bus.publish(Topic::Gossip, Payload::Gossip(frame));
    }

    /// The acceptance pipeline.
    async fn accept_block(&mut self, block: &Block) -> Result<(), ChainError> {
        let height = block.header.height;
        debug!(height, hash = ?block.hash(), "accepting block");

        // 1. Sanity against the parent.
        let prev = self.tip.get();
        sanity_check(&prev, block)?;

        // 2. Refresh the provisioner view before touching the certificate.
        self.provisioners = self
            .executor
            .get_provisioners()
            .await
            .map_err(|e| ChainError::ExecutorFailed(e.to_string()))?;

        // 3. The certificate must verify under the sortition committees.
        check_certificate(
            &self.provisioners,
            self.config.committee_size,
            &prev.header.seed,
            block,
        )?;

        // 4. Execute the state transition; its provisioner set is
        //    authoritative from here on.
        let provisioners = self
            .executor
            .execute_state_transition(&block.txs, height)
            .await
            .map_err(|e| ChainError::ExecutorFailed(e.to_string()))?;
        self.provisioners = provisioners;
        self.provisioners.remove_expired(height);
        self.bid_list.remove_expired(height);

        // 5. Persist. A failure here leaves executed-but-unstored state.
        if let Err(e) = self.loader.append(block) {
            error!(height, error = %e, "block storing failed");
            return Err(ChainError::StorageFailed(e));
        }

        self.tip.set(block.clone());
        self.last_certificate = block.header.certificate;

        // 6. Advertise the new block to peers.
        let frame = GossipFrame::inv(&Inv::block(block.hash()));
        self.bus.publish(Topic::Gossip, Payload::Gossip(frame));

        // 7. Announce internally (mempool pruning, consensus restart).
        self.bus.publish(
            Topic::AcceptedBlock,
            Payload::AcceptedBlock(Box::new(block.clone())),
        );

        // 8. Account for the sync gap; restart consensus once drained
        //    and caught up with the network.
        self.counter.decrement();
        if self.counter.remaining() == 0 && height >= self.highest_seen {
            self.send_round_update();
        }

        info!(height, hash = ?block.hash(), "block accepted");
        Ok(())
    }

    /// The agreement component announced this round's winner.
    async fn on_winning_block(&mut self, win: WinningBlock) {
        if self.counter.is_syncing() {
            debug!(round = win.round, "syncing, local agreement discarded");
            return;
        }
        let expected = self.tip.height() + 1;
        if win.round != expected {
            debug!(round = win.round, expected, "agreement for wrong round ignored");
            return;
        }

        let resp = self
            .rb
            .call(
                RequestTopic::GetCandidate,
                RequestParams::CandidateHash(win.hash),
                self.config.get_candidate_timeout,
            )
            .await;
        let mut block = match resp {
            Ok(RequestResponse::Candidate(block)) => block,
            Ok(other) => {
                warn!(?other, "unexpected GetCandidate response");
                return;
            }
            Err(e) => {
                // Fall back and catch up from peers later.
                error!(round = win.round, hash = ?win.hash, error = %e,
                    "could not find winning candidate block");
                return;
            }
        };

        // Attaching the certificate does not alter the hash the
        // committee voted on.
        block.header.certificate = win.certificate;
        self.last_committee = win.committee;

        if let Err(e) = self.accept_block(&block).await {
            error!(round = win.round, hash = ?win.hash, error = %e,
                "could not accept winning block");
        }
    }

    /// Emit the next round's snapshot for the consensus components.
    fn send_round_update(&self) {
        let tip = self.tip.get();
        let ru = RoundUpdate {
            round: tip.header.height + 1,
            seed: tip.header.seed,
            hash: tip.hash(),
            timestamp: tip.header.timestamp,
            provisioners: self.provisioners.clone(),
            bid_list: self.bid_list.clone(),
        };
        debug!(round = ru.round, "sending round update");
        self.bus.publish(Topic::RoundUpdate, Payload::RoundUpdate(ru));
    }

    async fn on_command(&mut self, command: ChainCommand) {
        match command {
            ChainCommand::Rebuild { response } => {
                let result = self.rebuild().await.map_err(|e| e.to_string());
                let _ = response.send(result);
            }
            ChainCommand::SyncProgress { response } => {
                let _ = response.send(sync_progress(self.tip.height(), self.highest_seen));
            }
        }
    }

    /// Wipe storage and restart from genesis.
    ///
    /// Failures after the clear leave the node without a consistent
    /// state; by policy they are unrecoverable and panic.
    async fn rebuild(&mut self) -> Result<(), ChainError> {
        info!("rebuilding chain from genesis");
        self.bus.publish(Topic::StopConsensus, Payload::Empty);

        self.loader.clear()?;

        let tip = match self.loader.load_tip() {
            Ok(tip) => tip,
            Err(e) => panic!("rebuild: could not reload genesis tip: {e}"),
        };
        self.tip.set(tip);
        self.provisioners = Provisioners::new();
        self.last_certificate = Certificate::empty();
        self.last_committee.clear();
        self.highest_seen = 0;
        self.counter.start(0);

        if let Err(e) = self
            .rb
            .call(
                RequestTopic::ClearWalletDatabase,
                RequestParams::None,
                self.config.clear_wallet_timeout,
            )
            .await
        {
            panic!("rebuild: could not clear wallet database: {e}");
        }
        Ok(())
    }

    /// Serve a candidate verification request from the block generator
    /// pipeline.
    async fn on_verify_candidate(&mut self, req: Request) {
        let RequestParams::CandidateBlock(candidate) = &req.params else {
            let _ = req
                .response
                .send(Err("expected a candidate block".to_string()));
            return;
        };

        let prev = self.tip.get();
        if let Err(e) = sanity_check(&prev, candidate) {
            let _ = req.response.send(Err(e.to_string()));
            return;
        }
        let reply = match self
            .executor
            .verify_state_transition(&candidate.txs, candidate.header.height)
            .await
        {
            Ok(()) => Ok(RequestResponse::Empty),
            Err(e) => Err(e.to_string()),
        };
        let _ = req.response.send(reply);
    }
}
