//! Best-score selection.
//!
//! The selector collects score events for (round, step) inside a timed
//! window and keeps the highest verified score. The coordinator owns the
//! timer; this type is the synchronous accumulator it drives.

use crate::score::ScoreVerifier;
use sable_messages::ScoreMessage;
use sable_types::{Hash, RoundUpdate};
use std::sync::Arc;
use tracing::{debug, trace};

/// Selector lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorState {
    Collecting,
    /// Finished with a best score.
    Selected,
    /// Finished with no valid score; reduction runs on the empty hash.
    Empty,
}

/// Accumulates score events and retains the best.
pub struct Selector {
    ru: RoundUpdate,
    step: u8,
    verifier: Arc<dyn ScoreVerifier>,
    best: Option<ScoreMessage>,
    state: SelectorState,
}

impl Selector {
    pub fn new(ru: RoundUpdate, step: u8, verifier: Arc<dyn ScoreVerifier>) -> Self {
        Selector {
            ru,
            step,
            verifier,
            best: None,
            state: SelectorState::Collecting,
        }
    }

    pub fn state(&self) -> SelectorState {
        self.state
    }

    /// Offer a score event. Returns whether it became the new best.
    pub fn on_score(&mut self, msg: ScoreMessage) -> bool {
        if self.state != SelectorState::Collecting {
            trace!(round = msg.header.round, "selector closed, score dropped");
            return false;
        }
        if msg.header.round != self.ru.round || msg.header.step != self.step {
            trace!(
                round = msg.header.round,
                step = msg.header.step,
                "score for wrong (round, step) dropped"
            );
            return false;
        }
        if let Some(best) = &self.best {
            if msg.score <= best.score {
                trace!(score = ?msg.score, "score not better than current best");
                return false;
            }
        }
        if !msg.header.verify() {
            debug!(sender = ?msg.header.pubkey_bls, "score event signature invalid");
            return false;
        }
        if !self.verifier.verify(&msg, &self.ru) {
            debug!(sender = ?msg.header.pubkey_bls, "score proof rejected");
            return false;
        }

        debug!(round = self.ru.round, score = ?msg.score, "new best score");
        self.best = Some(msg);
        true
    }

    /// Close the window and emit the winning vote hash.
    ///
    /// The empty hash means no valid score arrived; the reduction
    /// phases still run, voting on the empty candidate.
    pub fn finish(&mut self) -> Hash {
        match self.best.take() {
            Some(best) => {
                self.state = SelectorState::Selected;
                best.vote_hash()
            }
            None => {
                self.state = SelectorState::Empty;
                Hash::ZERO
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::{LocalProver, LocalVerifier, ScoreProver};
    use sable_messages::ConsensusHeader;
    use sable_types::test_utils::keypairs;
    use sable_types::{BidList, BlsKeyPair, Provisioners};

    fn setup(n_bidders: usize) -> (RoundUpdate, Vec<(BlsKeyPair, LocalProver)>) {
        let keys = keypairs(n_bidders);
        let mut bid_list = BidList::new();
        let bidders: Vec<(BlsKeyPair, LocalProver)> = keys
            .into_iter()
            .enumerate()
            .map(|(i, k)| {
                let prover = LocalProver::new(Hash::digest(&[i as u8]));
                bid_list.insert(prover.bid(), 1_000_000);
                (k, prover)
            })
            .collect();
        let ru = RoundUpdate {
            round: 2,
            seed: keypairs(1)[0].sign(b"parent"),
            hash: Hash::digest(b"tip"),
            timestamp: 1_700_000_000,
            provisioners: Provisioners::new(),
            bid_list,
        };
        (ru, bidders)
    }

    fn score_msg(ru: &RoundUpdate, keys: &BlsKeyPair, prover: &LocalProver, n: u8) -> ScoreMessage {
        let seed = keys.sign(ru.seed.as_bytes());
        let proof = prover.prove(&ru.bid_list, &seed, ru.round).unwrap();
        ScoreMessage {
            header: ConsensusHeader::sign(keys, ru.round, 1, Hash::digest(&[b'c', n])),
            proof: proof.proof,
            score: proof.score,
            bid: proof.bid,
            witness: ru.bid_list.witness(),
            prev_hash: ru.hash,
            seed,
        }
    }

    #[test]
    fn test_keeps_highest_score() {
        let (ru, bidders) = setup(3);
        let mut selector = Selector::new(ru.clone(), 1, Arc::new(LocalVerifier));

        let msgs: Vec<ScoreMessage> = bidders
            .iter()
            .enumerate()
            .map(|(i, (k, p))| score_msg(&ru, k, p, i as u8))
            .collect();
        for msg in &msgs {
            selector.on_score(msg.clone());
        }

        let expected = msgs.iter().max_by_key(|m| m.score).unwrap().vote_hash();
        assert_eq!(selector.finish(), expected);
        assert_eq!(selector.state(), SelectorState::Selected);
    }

    #[test]
    fn test_empty_when_nothing_arrives() {
        let (ru, _) = setup(1);
        let mut selector = Selector::new(ru, 1, Arc::new(LocalVerifier));
        assert_eq!(selector.finish(), Hash::ZERO);
        assert_eq!(selector.state(), SelectorState::Empty);
    }

    #[test]
    fn test_rejects_wrong_round_or_step() {
        let (ru, bidders) = setup(1);
        let mut selector = Selector::new(ru.clone(), 1, Arc::new(LocalVerifier));
        let (k, p) = &bidders[0];

        let mut wrong_round = score_msg(&ru, k, p, 0);
        wrong_round.header.round += 1;
        assert!(!selector.on_score(wrong_round));

        let mut wrong_step = score_msg(&ru, k, p, 0);
        wrong_step.header.step = 4;
        assert!(!selector.on_score(wrong_step));

        assert_eq!(selector.finish(), Hash::ZERO);
    }

    #[test]
    fn test_rejects_invalid_proof() {
        let (ru, bidders) = setup(1);
        let mut selector = Selector::new(ru.clone(), 1, Arc::new(LocalVerifier));
        let (k, p) = &bidders[0];
        let mut msg = score_msg(&ru, k, p, 0);
        msg.proof = vec![0; 32];
        assert!(!selector.on_score(msg));
    }

    #[test]
    fn test_closed_selector_ignores_scores() {
        let (ru, bidders) = setup(1);
        let mut selector = Selector::new(ru.clone(), 1, Arc::new(LocalVerifier));
        selector.finish();
        let (k, p) = &bidders[0];
        assert!(!selector.on_score(score_msg(&ru, k, p, 0)));
    }
}
