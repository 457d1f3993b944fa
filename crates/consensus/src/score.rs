//! The score proof seam.
//!
//! Score proofs gate block proposal: a bidder proves, in zero knowledge,
//! that its score was correctly derived from a bid in the eligibility
//! list. The proving system itself is an external collaborator; these
//! traits are the boundary the consensus core calls through.
//!
//! [`LocalProver`] / [`LocalVerifier`] implement the same interface with
//! a blake3 commitment scheme. They preserve the protocol's structure
//! (bid membership, seed binding, deterministic scores) and are what the
//! node runs when no proving backend is configured.

use sable_messages::ScoreMessage;
use sable_types::{Bid, BidList, BlsSignature, Hash, RoundUpdate};

const BID_DOMAIN: &[u8] = b"sable:bid:";
const SCORE_DOMAIN: &[u8] = b"sable:score:";
const PROOF_DOMAIN: &[u8] = b"sable:proof:";

/// A generated score proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreProof {
    /// The bid the proof was generated from.
    pub bid: Bid,
    /// The proof's output scalar.
    pub score: Hash,
    /// The serialized proof.
    pub proof: Vec<u8>,
}

/// Generates score proofs for this node's bid.
pub trait ScoreProver: Send + Sync {
    /// Produce a proof for the given round, or `None` when this node
    /// holds no bid in the eligibility list.
    fn prove(&self, bid_list: &BidList, seed: &BlsSignature, round: u64) -> Option<ScoreProof>;
}

/// Verifies score proofs received from the network.
pub trait ScoreVerifier: Send + Sync {
    /// Whether the message's proof is valid for the current round.
    fn verify(&self, msg: &ScoreMessage, ru: &RoundUpdate) -> bool;
}

fn commitment(bid: &Bid, score: &Hash, seed: &BlsSignature, round: u64) -> Vec<u8> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(PROOF_DOMAIN);
    hasher.update(bid.as_bytes());
    hasher.update(score.as_bytes());
    hasher.update(seed.as_bytes());
    hasher.update(&round.to_le_bytes());
    hasher.finalize().as_bytes().to_vec()
}

/// Commitment-scheme prover over a bid opening.
pub struct LocalProver {
    secret: Hash,
}

impl LocalProver {
    pub fn new(secret: Hash) -> Self {
        LocalProver { secret }
    }

    /// The bid identifier this prover's secret opens.
    pub fn bid(&self) -> Bid {
        let mut hasher = blake3::Hasher::new();
        hasher.update(BID_DOMAIN);
        hasher.update(self.secret.as_bytes());
        Hash::from_bytes(*hasher.finalize().as_bytes())
    }
}

impl ScoreProver for LocalProver {
    fn prove(&self, bid_list: &BidList, seed: &BlsSignature, round: u64) -> Option<ScoreProof> {
        let bid = self.bid();
        if !bid_list.contains(&bid) {
            return None;
        }

        let mut hasher = blake3::Hasher::new();
        hasher.update(SCORE_DOMAIN);
        hasher.update(self.secret.as_bytes());
        hasher.update(seed.as_bytes());
        hasher.update(&round.to_le_bytes());
        let score = Hash::from_bytes(*hasher.finalize().as_bytes());

        Some(ScoreProof {
            bid,
            score,
            proof: commitment(&bid, &score, seed, round),
        })
    }
}

/// Verifier matching [`LocalProver`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalVerifier;

impl ScoreVerifier for LocalVerifier {
    fn verify(&self, msg: &ScoreMessage, ru: &RoundUpdate) -> bool {
        // The score must target this chain tip.
        if msg.prev_hash != ru.hash {
            return false;
        }
        // The bid must sit in the current eligibility list.
        if !ru.bid_list.contains(&msg.bid) {
            return false;
        }
        // The embedded seed must be the sender's signature over the
        // parent seed, chaining round randomness.
        if !msg.header.pubkey_bls.verify(ru.seed.as_bytes(), &msg.seed) {
            return false;
        }
        msg.proof == commitment(&msg.bid, &msg.score, &msg.seed, ru.round)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_messages::ConsensusHeader;
    use sable_types::test_utils::keypairs;
    use sable_types::Provisioners;

    fn round_update(bid_list: BidList) -> RoundUpdate {
        RoundUpdate {
            round: 3,
            seed: keypairs(1)[0].sign(b"parent seed"),
            hash: Hash::digest(b"tip"),
            timestamp: 1_700_000_000,
            provisioners: Provisioners::new(),
            bid_list,
        }
    }

    fn message_for(prover: &LocalProver, ru: &RoundUpdate) -> ScoreMessage {
        let keys = &keypairs(1)[0];
        let seed = keys.sign(ru.seed.as_bytes());
        let proof = prover.prove(&ru.bid_list, &seed, ru.round).unwrap();
        ScoreMessage {
            header: ConsensusHeader::sign(keys, ru.round, 1, Hash::digest(b"candidate")),
            proof: proof.proof,
            score: proof.score,
            bid: proof.bid,
            witness: ru.bid_list.witness(),
            prev_hash: ru.hash,
            seed,
        }
    }

    #[test]
    fn test_prove_requires_bid_membership() {
        let prover = LocalProver::new(Hash::digest(b"secret"));
        let empty = BidList::new();
        let seed = keypairs(1)[0].sign(b"s");
        assert!(prover.prove(&empty, &seed, 1).is_none());

        let mut list = BidList::new();
        list.insert(prover.bid(), 1_000);
        assert!(prover.prove(&list, &seed, 1).is_some());
    }

    #[test]
    fn test_verify_accepts_honest_proof() {
        let prover = LocalProver::new(Hash::digest(b"secret"));
        let mut list = BidList::new();
        list.insert(prover.bid(), 1_000);
        let ru = round_update(list);
        let msg = message_for(&prover, &ru);
        assert!(LocalVerifier.verify(&msg, &ru));
    }

    #[test]
    fn test_verify_rejects_tampered_score() {
        let prover = LocalProver::new(Hash::digest(b"secret"));
        let mut list = BidList::new();
        list.insert(prover.bid(), 1_000);
        let ru = round_update(list);
        let mut msg = message_for(&prover, &ru);
        msg.score = Hash::digest(b"better score");
        assert!(!LocalVerifier.verify(&msg, &ru));
    }

    #[test]
    fn test_verify_rejects_foreign_bid() {
        let prover = LocalProver::new(Hash::digest(b"secret"));
        let mut list = BidList::new();
        list.insert(prover.bid(), 1_000);
        let ru = round_update(list);
        let mut msg = message_for(&prover, &ru);
        msg.bid = Hash::digest(b"someone else");
        assert!(!LocalVerifier.verify(&msg, &ru));
    }

    #[test]
    fn test_verify_rejects_wrong_tip() {
        let prover = LocalProver::new(Hash::digest(b"secret"));
        let mut list = BidList::new();
        list.insert(prover.bid(), 1_000);
        let ru = round_update(list);
        let mut msg = message_for(&prover, &ru);
        msg.prev_hash = Hash::digest(b"stale tip");
        assert!(!LocalVerifier.verify(&msg, &ru));
    }

    #[test]
    fn test_scores_are_deterministic_per_round() {
        let prover = LocalProver::new(Hash::digest(b"secret"));
        let mut list = BidList::new();
        list.insert(prover.bid(), 1_000);
        let seed = keypairs(1)[0].sign(b"s");
        let a = prover.prove(&list, &seed, 5).unwrap();
        let b = prover.prove(&list, &seed, 5).unwrap();
        assert_eq!(a, b);
        let c = prover.prove(&list, &seed, 6).unwrap();
        assert_ne!(a.score, c.score);
    }
}
