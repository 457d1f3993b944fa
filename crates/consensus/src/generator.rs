//! Candidate block generation.
//!
//! When this node holds a bid, it builds a candidate block (coinbase
//! first, then verified mempool transactions), proves its score and
//! publishes both the score event and the candidate. Scores are tagged
//! with their selection step, so the coordinator requests a fresh one
//! for every selection attempt of the round.

use crate::score::ScoreProver;
use sable_bus::{
    BusError, EventBus, RequestBus, RequestParams, RequestResponse, RequestTopic, Topic,
};
use sable_messages::{ConsensusHeader, Payload, ScoreMessage};
use sable_types::{
    Block, BlockHeader, BlsKeyPair, Certificate, Hash, RoundUpdate, Transaction, BLOCK_VERSION,
};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// Errors from candidate generation.
#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("mempool fetch failed: {0}")]
    Mempool(#[from] BusError),

    #[error("mempool returned an unexpected response")]
    UnexpectedResponse,
}

/// Builds and publishes this node's candidate and score each round.
pub struct BlockGenerator {
    bus: EventBus,
    rb: RequestBus,
    keys: BlsKeyPair,
    prover: Arc<dyn ScoreProver>,
    reward: u64,
    fetch_timeout: Duration,
}

impl BlockGenerator {
    pub fn new(
        bus: EventBus,
        rb: RequestBus,
        keys: BlsKeyPair,
        prover: Arc<dyn ScoreProver>,
        reward: u64,
        fetch_timeout: Duration,
    ) -> Self {
        BlockGenerator {
            bus,
            rb,
            keys,
            prover,
            reward,
            fetch_timeout,
        }
    }

    /// Generate a candidate and score for one selection step, if
    /// eligible.
    ///
    /// Returns the candidate hash, or `None` when this node holds no
    /// bid in the current eligibility list.
    pub async fn generate(
        &self,
        ru: &RoundUpdate,
        step: u8,
    ) -> Result<Option<Hash>, GeneratorError> {
        // The new seed chains round randomness: our signature over the
        // parent's seed.
        let seed = self.keys.sign(ru.seed.as_bytes());

        let Some(proof) = self.prover.prove(&ru.bid_list, &seed, ru.round) else {
            debug!(round = ru.round, "no eligible bid, not generating");
            return Ok(None);
        };

        let txs = self.assemble_txs(&proof.proof, proof.score).await?;
        let block = self.build_candidate(ru, seed, txs);
        let hash = block.hash();

        let score = ScoreMessage {
            header: ConsensusHeader::sign(&self.keys, ru.round, step, hash),
            proof: proof.proof,
            score: proof.score,
            bid: proof.bid,
            witness: ru.bid_list.witness(),
            prev_hash: ru.hash,
            seed,
        };

        info!(round = ru.round, candidate = ?hash, score = ?score.score, "publishing candidate");
        self.bus.publish(Topic::Score, Payload::Score(Box::new(score)));
        self.bus
            .publish(Topic::Candidate, Payload::Candidate(Box::new(block)));

        Ok(Some(hash))
    }

    /// Coinbase first, then the mempool's verified transactions.
    async fn assemble_txs(
        &self,
        proof: &[u8],
        score: Hash,
    ) -> Result<Vec<Transaction>, GeneratorError> {
        let mut txs = vec![Transaction::Coinbase {
            reward: self.reward,
            generator: self.keys.public_key(),
            proof: proof.to_vec(),
            score,
        }];

        let resp = self
            .rb
            .call(
                RequestTopic::GetMempoolTxs,
                RequestParams::None,
                self.fetch_timeout,
            )
            .await?;
        match resp {
            RequestResponse::Transactions(mempool_txs) => txs.extend(mempool_txs),
            _ => return Err(GeneratorError::UnexpectedResponse),
        }
        Ok(txs)
    }

    fn build_candidate(
        &self,
        ru: &RoundUpdate,
        seed: sable_types::BlsSignature,
        txs: Vec<Transaction>,
    ) -> Block {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        let header = BlockHeader {
            version: BLOCK_VERSION,
            height: ru.round,
            timestamp: now.max(ru.timestamp + 1),
            prev_block_hash: ru.hash,
            seed,
            tx_root: Hash::ZERO,
            certificate: Certificate::empty(),
            hash: Hash::ZERO,
        };
        Block::new(header, txs)
    }
}
