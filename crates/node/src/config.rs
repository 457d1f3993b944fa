//! Node configuration.

use sable_chain::ChainConfig;
use sable_consensus::ConsensusConfig;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Errors loading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level node configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub consensus: ConsensusSection,
    pub timeout: TimeoutSection,
    pub chain: ChainSection,
    pub genesis: GenesisSection,
    pub api: ApiSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConsensusSection {
    /// Sortition target size for step committees.
    pub committee_size: usize,
    /// Selector window in milliseconds.
    pub selection_timeout_ms: u64,
    /// Reduction phase timeout in milliseconds.
    pub reduction_timeout_ms: u64,
    /// Coinbase reward paid to the block generator.
    pub generator_reward: u64,
    /// Default value of automated stake and bid transactions.
    pub default_amount: u64,
    /// Default lock duration of automated stake and bid transactions.
    pub default_lock_time: u64,
    /// Upper bound on any requested lock duration.
    pub max_lock_time: u64,
}

impl Default for ConsensusSection {
    fn default() -> Self {
        Self {
            committee_size: 64,
            selection_timeout_ms: 2_500,
            reduction_timeout_ms: 2_500,
            generator_reward: 50_000_000,
            default_amount: 50_000,
            default_lock_time: 10_000,
            max_lock_time: 250_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeoutSection {
    /// Deadline of the winning-candidate fetch, in seconds.
    pub timeout_get_candidate: u64,
    /// Deadline of the wallet-database clear, in seconds.
    pub timeout_clear_wallet_database: u64,
}

impl Default for TimeoutSection {
    fn default() -> Self {
        Self {
            timeout_get_candidate: 5,
            timeout_clear_wallet_database: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChainSection {
    /// Bound on the block ingress queue and on a single sync gap.
    pub max_inv_blocks: u64,
}

impl Default for ChainSection {
    fn default() -> Self {
        Self {
            max_inv_blocks: 500,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GenesisSection {
    /// Seed the provisioner and bid sets from the node's own keys, so a
    /// fresh test network can run consensus from round one.
    pub legacy: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiSection {
    /// Operational-database snapshots of the provisioner set.
    pub enabled: bool,
}

impl NodeConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    pub fn consensus_config(&self) -> ConsensusConfig {
        ConsensusConfig {
            committee_size: self.consensus.committee_size,
            selection_timeout: Duration::from_millis(self.consensus.selection_timeout_ms),
            reduction_timeout: Duration::from_millis(self.consensus.reduction_timeout_ms),
            generator_reward: self.consensus.generator_reward,
            ..Default::default()
        }
    }

    pub fn chain_config(&self) -> ChainConfig {
        ChainConfig {
            committee_size: self.consensus.committee_size,
            max_inv_blocks: self.chain.max_inv_blocks,
            get_candidate_timeout: Duration::from_secs(self.timeout.timeout_get_candidate),
            clear_wallet_timeout: Duration::from_secs(self.timeout.timeout_clear_wallet_database),
        }
    }
}
