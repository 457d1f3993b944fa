//! The per-round coordinator.
//!
//! One long-lived task listens for round updates and stop signals. Each
//! round update tears down the previous round's ephemeral tasks (their
//! shared cancellation token is tripped and the teardown awaited) and
//! spawns fresh ones:
//!
//! - the *step machine*: selection → reduction 1 → reduction 2, looping
//!   with advancing steps until agreement fires or the round is torn
//!   down;
//! - the *agreement listener*: accumulates agreement events across
//!   steps and announces the round's winning block.
//!
//! Events for future (round, step) pairs are parked in shared queues
//! and replayed on phase entry.

use crate::agreement::AgreementAccumulator;
use crate::config::ConsensusConfig;
use crate::generator::BlockGenerator;
use crate::queue::EventQueue;
use crate::reduction::{reduction_succeeded, PhaseResult, ReductionPhase};
use crate::score::ScoreVerifier;
use crate::selection::Selector;
use parking_lot::Mutex;
use sable_bus::{BusMessage, EventBus, Topic};
use sable_messages::{
    AgreementMessage, ConsensusHeader, Payload, ReductionMessage, ScoreMessage, StepVotes,
};
use sable_sortition::create_committee;
use sable_types::{BlsKeyPair, Hash, RoundUpdate};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Queues for events that arrived ahead of the local state machine.
#[derive(Clone)]
struct Queues {
    scores: Arc<Mutex<EventQueue<ScoreMessage>>>,
    votes: Arc<Mutex<EventQueue<ReductionMessage>>>,
    agreements: Arc<Mutex<EventQueue<AgreementMessage>>>,
}

impl Queues {
    fn new(horizon: u64) -> Self {
        Queues {
            scores: Arc::new(Mutex::new(EventQueue::new(horizon))),
            votes: Arc::new(Mutex::new(EventQueue::new(horizon))),
            agreements: Arc::new(Mutex::new(EventQueue::new(horizon))),
        }
    }

    fn update_round(&self, round: u64) {
        self.scores.lock().update_round(round);
        self.votes.lock().update_round(round);
        self.agreements.lock().update_round(round);
    }
}

/// Everything a round's ephemeral tasks need.
#[derive(Clone)]
struct RoundContext {
    ru: RoundUpdate,
    keys: BlsKeyPair,
    config: ConsensusConfig,
    bus: EventBus,
    verifier: Arc<dyn ScoreVerifier>,
    generator: Option<Arc<BlockGenerator>>,
    queues: Queues,
    token: CancellationToken,
}

/// Owns the consensus components and their per-round lifecycle.
pub struct Coordinator {
    bus: EventBus,
    config: ConsensusConfig,
    keys: BlsKeyPair,
    verifier: Arc<dyn ScoreVerifier>,
    generator: Option<Arc<BlockGenerator>>,
}

impl Coordinator {
    pub fn new(
        bus: EventBus,
        config: ConsensusConfig,
        keys: BlsKeyPair,
        verifier: Arc<dyn ScoreVerifier>,
        generator: Option<Arc<BlockGenerator>>,
    ) -> Self {
        Coordinator {
            bus,
            config,
            keys,
            verifier,
            generator,
        }
    }

    /// Spawn the coordinator's main loop.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        let (ru_sub, mut ru_rx) = self.bus.subscribe(Topic::RoundUpdate);
        let (stop_sub, mut stop_rx) = self.bus.subscribe(Topic::StopConsensus);
        let bus = self.bus.clone();
        let queues = Queues::new(self.config.queue_horizon);

        tokio::spawn(async move {
            let mut round_token: Option<CancellationToken> = None;
            let mut round_tasks: Vec<JoinHandle<()>> = Vec::new();

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        teardown(&mut round_token, &mut round_tasks).await;
                        break;
                    }

                    Some(msg) = ru_rx.recv() => {
                        let Payload::RoundUpdate(ru) = msg.payload else {
                            continue;
                        };
                        // The previous round must be fully finalized
                        // before the new one starts.
                        teardown(&mut round_token, &mut round_tasks).await;
                        queues.update_round(ru.round);

                        info!(round = ru.round, "starting consensus round");
                        let token = cancel.child_token();
                        let ctx = RoundContext {
                            ru,
                            keys: self.keys.clone(),
                            config: self.config.clone(),
                            bus: self.bus.clone(),
                            verifier: self.verifier.clone(),
                            generator: self.generator.clone(),
                            queues: queues.clone(),
                            token: token.clone(),
                        };
                        round_tasks.push(tokio::spawn(run_steps(ctx.clone())));
                        round_tasks.push(tokio::spawn(run_agreement(ctx)));
                        round_token = Some(token);
                    }

                    Some(msg) = stop_rx.recv() => {
                        if matches!(msg.payload, Payload::Empty) {
                            debug!("stop consensus received");
                            teardown(&mut round_token, &mut round_tasks).await;
                        }
                    }
                }
            }

            bus.unsubscribe(Topic::RoundUpdate, ru_sub);
            bus.unsubscribe(Topic::StopConsensus, stop_sub);
        })
    }
}

/// Cancel the round token and await every ephemeral task.
async fn teardown(token: &mut Option<CancellationToken>, tasks: &mut Vec<JoinHandle<()>>) {
    if let Some(token) = token.take() {
        token.cancel();
    }
    for task in tasks.drain(..) {
        if let Err(e) = task.await {
            warn!(error = %e, "round task panicked");
        }
    }
}

/// The round's step machine: selection and both reduction phases,
/// looping with advancing steps.
async fn run_steps(ctx: RoundContext) {
    let bus = ctx.bus.clone();
    let (score_sub, mut score_rx) = bus.subscribe(Topic::Score);
    let (vote_sub, mut vote_rx) = bus.subscribe(Topic::Reduction);

    let mut step: u8 = 1;
    loop {
        if step as u16 + 2 > u8::MAX as u16 {
            warn!(round = ctx.ru.round, "step space exhausted, idling until round end");
            break;
        }

        // A fresh candidate and score for this attempt's selection
        // step; scores are tagged per step, so a retry needs its own.
        if let Some(generator) = &ctx.generator {
            if let Err(e) = generator.generate(&ctx.ru, step).await {
                warn!(round = ctx.ru.round, step, error = %e, "candidate generation failed");
            }
        }

        // Selection window.
        let Some(input) = run_selection(&ctx, step, &mut score_rx).await else {
            break;
        };
        debug!(round = ctx.ru.round, step, hash = ?input, "selection closed");

        // First reduction phase.
        let Some((first, observed_first, _)) = run_phase(&ctx, step + 1, input, &mut vote_rx).await
        else {
            break;
        };

        // Second phase votes on the first phase's outcome.
        let Some((second, observed_second, committee)) =
            run_phase(&ctx, step + 2, first.hash(), &mut vote_rx).await
        else {
            break;
        };

        let quorum = committee.quorum();
        if reduction_succeeded(&first, &second, quorum, observed_first, observed_second) {
            let (PhaseResult::Quorum(first), PhaseResult::Quorum(second)) = (&first, &second)
            else {
                unreachable!("reduction success implies both phases reached quorum");
            };
            publish_agreement(
                &ctx,
                step + 2,
                first.hash,
                first.votes,
                second.votes,
                committee.contains(&ctx.keys.public_key()),
            );
        } else {
            debug!(
                round = ctx.ru.round,
                step, "reduction failed, advancing step"
            );
        }

        step += 3;
    }

    bus.unsubscribe(Topic::Score, score_sub);
    bus.unsubscribe(Topic::Reduction, vote_sub);
}

/// Collect scores until the window closes; returns the winning hash, or
/// `None` when the round was cancelled.
async fn run_selection(
    ctx: &RoundContext,
    step: u8,
    score_rx: &mut mpsc::Receiver<BusMessage>,
) -> Option<Hash> {
    let round = ctx.ru.round;
    let mut selector = Selector::new(ctx.ru.clone(), step, ctx.verifier.clone());

    for msg in ctx.queues.scores.lock().drain(round, step) {
        selector.on_score(msg);
    }

    let deadline = Instant::now() + ctx.config.selection_timeout;
    loop {
        tokio::select! {
            _ = ctx.token.cancelled() => return None,
            _ = tokio::time::sleep_until(deadline) => break,
            maybe = score_rx.recv() => {
                let Some(msg) = maybe else { break };
                let Payload::Score(score) = msg.payload else { continue };
                let hdr = score.header;
                if (hdr.round, hdr.step) > (round, step) {
                    ctx.queues.scores.lock().put(hdr.round, hdr.step, *score);
                } else {
                    selector.on_score(*score);
                }
            }
        }
    }
    Some(selector.finish())
}

/// Run one reduction phase; returns `None` when the round was
/// cancelled, otherwise the phase outcome, the observed vote weight and
/// the step committee.
async fn run_phase(
    ctx: &RoundContext,
    step: u8,
    input: Hash,
    vote_rx: &mut mpsc::Receiver<BusMessage>,
) -> Option<(PhaseResult, u64, sable_sortition::Committee)> {
    let round = ctx.ru.round;
    let committee = create_committee(
        round,
        step,
        ctx.config.committee_size,
        &ctx.ru.provisioners,
        &ctx.ru.seed,
    );
    let mut phase = ReductionPhase::new(round, step, committee.clone());

    // Cast our own vote if we sit on this step's committee.
    if committee.contains(&ctx.keys.public_key()) {
        trace!(round, step, hash = ?input, "casting reduction vote");
        let vote = ReductionMessage::sign(&ctx.keys, round, step, input);
        ctx.bus.publish(Topic::Reduction, Payload::Reduction(vote));
    }

    for queued in ctx.queues.votes.lock().drain(round, step) {
        if let Some(agg) = phase.collect(&queued) {
            let observed = phase.observed();
            return Some((PhaseResult::Quorum(agg), observed, committee));
        }
    }

    let deadline = Instant::now() + ctx.config.reduction_timeout;
    loop {
        tokio::select! {
            _ = ctx.token.cancelled() => return None,
            _ = tokio::time::sleep_until(deadline) => {
                debug!(round, step, observed = phase.observed(), "reduction phase timed out");
                return Some((PhaseResult::Empty, phase.observed(), committee));
            }
            maybe = vote_rx.recv() => {
                let Some(msg) = maybe else {
                    return Some((PhaseResult::Empty, phase.observed(), committee));
                };
                let Payload::Reduction(vote) = msg.payload else { continue };
                let hdr = vote.header;
                if (hdr.round, hdr.step) > (round, step) {
                    ctx.queues.votes.lock().put(hdr.round, hdr.step, vote);
                    continue;
                }
                if let Some(agg) = phase.collect(&vote) {
                    let observed = phase.observed();
                    return Some((PhaseResult::Quorum(agg), observed, committee));
                }
            }
        }
    }
}

/// Announce a successful reduction toward the agreement phase.
fn publish_agreement(
    ctx: &RoundContext,
    step: u8,
    hash: Hash,
    first: StepVotes,
    second: StepVotes,
    is_member: bool,
) {
    info!(round = ctx.ru.round, step, hash = ?hash, "reduction succeeded");
    if !is_member {
        debug!(round = ctx.ru.round, step, "not on the agreement committee");
        return;
    }
    let msg = AgreementMessage {
        header: ConsensusHeader::sign(&ctx.keys, ctx.ru.round, step, hash),
        first_step: first,
        second_step: second,
    };
    ctx.bus.publish(Topic::Agreement, Payload::Agreement(msg));
}

/// The round's agreement listener.
async fn run_agreement(ctx: RoundContext) {
    let bus = ctx.bus.clone();
    let (agr_sub, mut agr_rx) = bus.subscribe(Topic::Agreement);
    let round = ctx.ru.round;
    let mut accumulator = AgreementAccumulator::new(ctx.ru.clone(), ctx.config.committee_size);
    let mut announced = false;

    for queued in ctx.queues.agreements.lock().drain_round(round) {
        if let Some(win) = accumulator.collect(queued) {
            bus.publish(Topic::Agreement, Payload::WinningBlock(Box::new(win)));
            announced = true;
        }
    }

    loop {
        tokio::select! {
            _ = ctx.token.cancelled() => break,
            maybe = agr_rx.recv() => {
                let Some(msg) = maybe else { break };
                let Payload::Agreement(agreement) = msg.payload else { continue };
                let hdr = agreement.header;
                if hdr.round > round {
                    ctx.queues.agreements.lock().put(hdr.round, hdr.step, agreement);
                    continue;
                }
                if announced {
                    continue;
                }
                if let Some(win) = accumulator.collect(agreement) {
                    bus.publish(Topic::Agreement, Payload::WinningBlock(Box::new(win)));
                    announced = true;
                }
            }
        }
    }

    bus.unsubscribe(Topic::Agreement, agr_sub);
}
