//! Consensus timing and sizing parameters.

use std::time::Duration;

/// Configuration for the consensus components.
#[derive(Debug, Clone)]
pub struct ConsensusConfig {
    /// Sortition target size for every step committee.
    pub committee_size: usize,
    /// How long the selector collects score events.
    pub selection_timeout: Duration,
    /// Timeout of each reduction phase.
    pub reduction_timeout: Duration,
    /// Deadline for the mempool fetch while building a candidate.
    pub mempool_fetch_timeout: Duration,
    /// Coinbase reward paid to the block generator.
    pub generator_reward: u64,
    /// How many rounds ahead events may be queued.
    pub queue_horizon: u64,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            committee_size: 64,
            selection_timeout: Duration::from_millis(2_500),
            reduction_timeout: Duration::from_millis(2_500),
            mempool_fetch_timeout: Duration::from_secs(4),
            generator_reward: 50_000_000,
            queue_horizon: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConsensusConfig::default();
        assert_eq!(config.committee_size, 64);
        assert!(config.selection_timeout > Duration::ZERO);
        assert!(config.queue_horizon > 0);
    }
}
