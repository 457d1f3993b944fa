//! Reduction vote collection.
//!
//! Each reduction phase is a one-shot collector: committee members'
//! votes are verified and accumulated per hash until one hash reaches
//! quorum or the phase timer (owned by the coordinator) expires.

use sable_messages::{signing_message, ReductionMessage, StepVotes};
use sable_sortition::Committee;
use sable_types::{BlsPublicKey, BlsSignature, Hash};
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace, warn};

/// The batched votes of a phase that reached quorum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedVotes {
    pub hash: Hash,
    pub votes: StepVotes,
}

/// Outcome of a finished phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseResult {
    /// A hash accumulated quorum weight.
    Quorum(AggregatedVotes),
    /// The timer expired first.
    Empty,
}

impl PhaseResult {
    /// The hash this result carries (zero for an empty phase).
    pub fn hash(&self) -> Hash {
        match self {
            PhaseResult::Quorum(agg) => agg.hash,
            PhaseResult::Empty => Hash::ZERO,
        }
    }
}

/// One reduction phase's vote accumulator.
pub struct ReductionPhase {
    round: u64,
    step: u8,
    committee: Committee,
    /// Per-hash signatures, keyed by voter.
    votes: HashMap<Hash, Vec<(BlsPublicKey, BlsSignature)>>,
    /// Accumulated vote weight per hash.
    weights: HashMap<Hash, u64>,
    /// Members that already voted this phase.
    voted: HashSet<BlsPublicKey>,
    /// Total vote weight observed across all hashes.
    observed: u64,
}

impl ReductionPhase {
    pub fn new(round: u64, step: u8, committee: Committee) -> Self {
        ReductionPhase {
            round,
            step,
            committee,
            votes: HashMap::new(),
            weights: HashMap::new(),
            voted: HashSet::new(),
            observed: 0,
        }
    }

    pub fn step(&self) -> u8 {
        self.step
    }

    pub fn committee(&self) -> &Committee {
        &self.committee
    }

    /// Total vote weight seen so far.
    pub fn observed(&self) -> u64 {
        self.observed
    }

    /// Offer a vote; returns the aggregated result once a hash reaches
    /// quorum. Invalid votes are dropped silently.
    pub fn collect(&mut self, msg: &ReductionMessage) -> Option<AggregatedVotes> {
        let header = &msg.header;
        if header.round != self.round || header.step != self.step {
            trace!(
                round = header.round,
                step = header.step,
                "vote for wrong (round, step) dropped"
            );
            return None;
        }

        let voter = header.pubkey_bls;
        let Some(weight) = self.committee.weight_of(&voter) else {
            debug!(?voter, step = self.step, "vote from non-member dropped");
            return None;
        };
        if self.voted.contains(&voter) {
            trace!(?voter, "duplicate vote dropped");
            return None;
        }
        if !header.verify() {
            debug!(?voter, "vote signature invalid");
            return None;
        }

        self.voted.insert(voter);
        self.observed += weight;
        self.votes
            .entry(header.block_hash)
            .or_default()
            .push((voter, header.signature));
        let tally = self.weights.entry(header.block_hash).or_insert(0);
        *tally += weight;

        trace!(
            round = self.round,
            step = self.step,
            hash = ?header.block_hash,
            tally = *tally,
            quorum = self.committee.quorum(),
            "vote counted"
        );

        if *tally >= self.committee.quorum() {
            return self.aggregate(header.block_hash);
        }
        None
    }

    /// Batch the winning hash's signatures into a single aggregate.
    fn aggregate(&self, hash: Hash) -> Option<AggregatedVotes> {
        let contributors = self.votes.get(&hash)?;
        let sigs: Vec<BlsSignature> = contributors.iter().map(|(_, sig)| *sig).collect();
        let aggregate = match BlsSignature::aggregate(&sigs) {
            Ok(agg) => agg,
            Err(e) => {
                // Every signature was individually verified; aggregation
                // cannot fail on well-formed points.
                warn!(error = %e, "vote aggregation failed");
                return None;
            }
        };
        let bitmap = self
            .committee
            .bitmap_of(contributors.iter().map(|(pk, _)| pk));
        Some(AggregatedVotes {
            hash,
            votes: StepVotes { aggregate, bitmap },
        })
    }
}

/// Whether two consecutive phases amount to a successful reduction.
///
/// Both phases must agree on the same non-empty hash and the combined
/// observed weight must reach twice the quorum.
pub fn reduction_succeeded(
    first: &PhaseResult,
    second: &PhaseResult,
    quorum: u64,
    observed_first: u64,
    observed_second: u64,
) -> bool {
    match (first, second) {
        (PhaseResult::Quorum(a), PhaseResult::Quorum(b)) => {
            !a.hash.is_zero() && a.hash == b.hash && observed_first + observed_second >= 2 * quorum
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_messages::ReductionMessage;
    use sable_sortition::create_committee;
    use sable_types::test_utils::{keypairs, provisioners};
    use sable_types::{aggregate_verify, BlsKeyPair};

    fn committee_with_keys(n: usize, size: usize) -> (Committee, Vec<BlsKeyPair>) {
        let keys = keypairs(n);
        let p = provisioners(&keys, 500);
        let seed = keys[0].sign(b"seed");
        (create_committee(1, 2, size, &p, &seed), keys)
    }

    #[test]
    fn test_quorum_reached_with_valid_votes() {
        let (committee, keys) = committee_with_keys(4, 12);
        let quorum = committee.quorum();
        let mut phase = ReductionPhase::new(1, 2, committee.clone());
        let hash = Hash::digest(b"candidate");

        let mut result = None;
        for key in &keys {
            if !committee.contains(&key.public_key()) {
                continue;
            }
            let vote = ReductionMessage::sign(key, 1, 2, hash);
            if let Some(agg) = phase.collect(&vote) {
                result = Some(agg);
                break;
            }
        }

        let agg = result.expect("full committee must reach quorum");
        assert_eq!(agg.hash, hash);
        assert!(committee.weight_by_bitmap(agg.votes.bitmap) >= quorum);

        // The batched signature verifies under the bitmap's members.
        let signers = committee.members_by_bitmap(agg.votes.bitmap);
        let msg = signing_message(1, 2, &hash);
        assert!(aggregate_verify(&msg, &agg.votes.aggregate, &signers));
    }

    #[test]
    fn test_non_member_vote_dropped() {
        let (committee, _) = committee_with_keys(3, 9);
        let mut phase = ReductionPhase::new(1, 2, committee);
        let stranger = keypairs(10)[9].clone();
        let vote = ReductionMessage::sign(&stranger, 1, 2, Hash::digest(b"h"));
        assert!(phase.collect(&vote).is_none());
        assert_eq!(phase.observed(), 0);
    }

    #[test]
    fn test_duplicate_vote_dropped() {
        let (committee, keys) = committee_with_keys(3, 9);
        let member = keys
            .iter()
            .find(|k| committee.contains(&k.public_key()))
            .unwrap();
        let mut phase = ReductionPhase::new(1, 2, committee);
        let vote = ReductionMessage::sign(member, 1, 2, Hash::digest(b"h"));
        phase.collect(&vote);
        let observed = phase.observed();
        phase.collect(&vote);
        assert_eq!(phase.observed(), observed);
    }

    #[test]
    fn test_wrong_step_dropped() {
        let (committee, keys) = committee_with_keys(3, 9);
        let member = keys
            .iter()
            .find(|k| committee.contains(&k.public_key()))
            .unwrap();
        let mut phase = ReductionPhase::new(1, 2, committee);
        let vote = ReductionMessage::sign(member, 1, 3, Hash::digest(b"h"));
        assert!(phase.collect(&vote).is_none());
        assert_eq!(phase.observed(), 0);
    }

    #[test]
    fn test_tampered_signature_dropped() {
        let (committee, keys) = committee_with_keys(3, 9);
        let member = keys
            .iter()
            .find(|k| committee.contains(&k.public_key()))
            .unwrap();
        let mut phase = ReductionPhase::new(1, 2, committee);
        let mut vote = ReductionMessage::sign(member, 1, 2, Hash::digest(b"h"));
        // Re-point the vote at another hash without re-signing.
        vote.header.block_hash = Hash::digest(b"other");
        assert!(phase.collect(&vote).is_none());
    }

    #[test]
    fn test_reduction_success_rule() {
        let agg = |hash: Hash| {
            PhaseResult::Quorum(AggregatedVotes {
                hash,
                votes: StepVotes {
                    aggregate: BlsSignature::zeroed(),
                    bitmap: 0b111,
                },
            })
        };
        let h = Hash::digest(b"winner");

        assert!(reduction_succeeded(&agg(h), &agg(h), 3, 3, 3));
        // Different hashes fail.
        assert!(!reduction_succeeded(
            &agg(h),
            &agg(Hash::digest(b"other")),
            3,
            3,
            3
        ));
        // Empty hash fails.
        assert!(!reduction_succeeded(&agg(Hash::ZERO), &agg(Hash::ZERO), 3, 3, 3));
        // Timeout on either side fails.
        assert!(!reduction_succeeded(&agg(h), &PhaseResult::Empty, 3, 3, 3));
        // Under 2x quorum fails.
        assert!(!reduction_succeeded(&agg(h), &agg(h), 4, 3, 3));
    }
}
