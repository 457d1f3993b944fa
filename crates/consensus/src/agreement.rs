//! Agreement accumulation.
//!
//! Peers that observed a successful reduction publish agreement events
//! carrying both phases' batched votes. The accumulator re-verifies the
//! embedded evidence against the sortition committees and, at quorum of
//! the agreement committee, assembles the round's certificate.

use sable_messages::{signing_message, AgreementMessage, StepVotes, WinningBlock};
use sable_sortition::{create_committee, Committee};
use sable_types::{aggregate_verify, BlsPublicKey, Hash, RoundUpdate};
use std::collections::HashMap;
use tracing::{debug, info, trace};

/// Per-hash evidence bucket.
///
/// Members at different local steps can publish agreement for the same
/// hash; their events all land here. The earliest contributing step
/// decides which committee's quorum finalizes the hash and which
/// message the certificate is assembled from.
struct Evidence {
    earliest_step: u8,
    senders: HashMap<BlsPublicKey, AgreementMessage>,
    weight: u64,
}

/// Collects agreement events for the current round.
///
/// Evidence is retained across steps within the round and discarded
/// wholesale on round advance (the accumulator is per-round).
pub struct AgreementAccumulator {
    ru: RoundUpdate,
    committee_size: usize,
    /// Agreement committees per step, computed on demand.
    committees: HashMap<u8, Committee>,
    evidence: HashMap<Hash, Evidence>,
}

impl AgreementAccumulator {
    pub fn new(ru: RoundUpdate, committee_size: usize) -> Self {
        AgreementAccumulator {
            ru,
            committee_size,
            committees: HashMap::new(),
            evidence: HashMap::new(),
        }
    }

    fn committee(&mut self, step: u8) -> &Committee {
        let ru = &self.ru;
        let size = self.committee_size;
        self.committees.entry(step).or_insert_with(|| {
            create_committee(ru.round, step, size, &ru.provisioners, &ru.seed)
        })
    }

    /// Offer an agreement event; returns the winning block once the
    /// (round, hash) evidence reaches quorum of the agreement committee
    /// of the earliest step that contributed.
    pub fn collect(&mut self, msg: AgreementMessage) -> Option<WinningBlock> {
        let header = msg.header;
        if header.round != self.ru.round {
            trace!(round = header.round, "agreement for wrong round dropped");
            return None;
        }
        if header.block_hash.is_zero() {
            trace!("agreement for empty hash dropped");
            return None;
        }

        // The sender's own step decides which committee it speaks for.
        let step_committee = self.committee(header.step).clone();
        let Some(weight) = step_committee.weight_of(&header.pubkey_bls) else {
            debug!(sender = ?header.pubkey_bls, step = header.step, "agreement from non-member dropped");
            return None;
        };
        if !header.verify() {
            debug!(sender = ?header.pubkey_bls, "agreement signature invalid");
            return None;
        }
        if !self.verify_step_votes(&msg) {
            debug!(sender = ?header.pubkey_bls, step = header.step, "embedded reduction votes invalid");
            return None;
        }

        // Merge into the hash's bucket; events from different steps
        // accumulate toward the same quorum.
        let (earliest, total_weight) = {
            let bucket = self
                .evidence
                .entry(header.block_hash)
                .or_insert_with(|| Evidence {
                    earliest_step: header.step,
                    senders: HashMap::new(),
                    weight: 0,
                });
            if bucket.senders.contains_key(&header.pubkey_bls) {
                trace!(sender = ?header.pubkey_bls, "duplicate agreement dropped");
                return None;
            }
            bucket.earliest_step = bucket.earliest_step.min(header.step);
            bucket.senders.insert(header.pubkey_bls, msg);
            bucket.weight += weight;
            (bucket.earliest_step, bucket.weight)
        };

        let quorum_committee = self.committee(earliest).clone();
        trace!(
            round = header.round,
            step = header.step,
            earliest,
            hash = ?header.block_hash,
            weight = total_weight,
            quorum = quorum_committee.quorum(),
            "agreement counted"
        );

        if total_weight < quorum_committee.quorum() {
            return None;
        }

        info!(
            round = header.round,
            step = earliest,
            hash = ?header.block_hash,
            "agreement quorum reached"
        );

        // The certificate is assembled from an event of the earliest
        // step; one exists, since that step set `earliest_step`.
        let bucket = self.evidence.get(&header.block_hash)?;
        let basis = bucket
            .senders
            .values()
            .find(|m| m.header.step == earliest)?;
        let committee = quorum_committee.members().map(|m| m.public_key).collect();
        Some(WinningBlock {
            round: header.round,
            hash: header.block_hash,
            certificate: basis.certificate(),
            committee,
        })
    }

    /// Re-verify both embedded reduction aggregates against the
    /// sortition committees of (step, step - 1).
    fn verify_step_votes(&mut self, msg: &AgreementMessage) -> bool {
        let step = msg.header.step;
        if step < 2 {
            // The second reduction phase can never run before step 2.
            return false;
        }
        let hash = msg.header.block_hash;
        let round = msg.header.round;

        let first = self.committee(step - 1).clone();
        let second = self.committee(step).clone();
        check_step_votes(round, step - 1, &hash, &msg.first_step, &first)
            && check_step_votes(round, step, &hash, &msg.second_step, &second)
    }
}

/// Verify one phase's batched votes: quorum weight and a valid
/// aggregate signature under the bitmap's members.
fn check_step_votes(
    round: u64,
    step: u8,
    hash: &Hash,
    votes: &StepVotes,
    committee: &Committee,
) -> bool {
    if committee.weight_by_bitmap(votes.bitmap) < committee.quorum() {
        return false;
    }
    let signers = committee.members_by_bitmap(votes.bitmap);
    let msg = signing_message(round, step, hash);
    aggregate_verify(&msg, &votes.aggregate, &signers)
}
