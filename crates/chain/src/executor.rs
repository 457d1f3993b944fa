//! The state-transition seam.
//!
//! Transaction execution lives in an external engine reached over RPC.
//! The chain only depends on this trait; [`StaticExecutor`] is the
//! in-process stand-in used by tests and by nodes running without an
//! engine attached.

use async_trait::async_trait;
use parking_lot::RwLock;
use sable_types::{Provisioners, Transaction};

/// Error from the external executor.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ExecutorError(pub String);

/// The external state executor.
#[async_trait]
pub trait Executor: Send + Sync {
    /// The authoritative provisioner set.
    async fn get_provisioners(&self) -> Result<Provisioners, ExecutorError>;

    /// Dry-run a candidate's transactions at the given height.
    async fn verify_state_transition(
        &self,
        txs: &[Transaction],
        height: u64,
    ) -> Result<(), ExecutorError>;

    /// Execute a block's transactions; returns the updated provisioner
    /// set.
    async fn execute_state_transition(
        &self,
        txs: &[Transaction],
        height: u64,
    ) -> Result<Provisioners, ExecutorError>;
}

/// An executor over a fixed provisioner set.
///
/// Accepts every transition and answers with its configured set, with
/// expired stakes swept at the requested height.
pub struct StaticExecutor {
    provisioners: RwLock<Provisioners>,
}

impl StaticExecutor {
    pub fn new(provisioners: Provisioners) -> Self {
        StaticExecutor {
            provisioners: RwLock::new(provisioners),
        }
    }
}

#[async_trait]
impl Executor for StaticExecutor {
    async fn get_provisioners(&self) -> Result<Provisioners, ExecutorError> {
        Ok(self.provisioners.read().clone())
    }

    async fn verify_state_transition(
        &self,
        _txs: &[Transaction],
        _height: u64,
    ) -> Result<(), ExecutorError> {
        Ok(())
    }

    async fn execute_state_transition(
        &self,
        _txs: &[Transaction],
        height: u64,
    ) -> Result<Provisioners, ExecutorError> {
        let mut updated = self.provisioners.read().clone();
        updated.remove_expired(height);
        *self.provisioners.write() = updated.clone();
        Ok(updated)
    }
}
