//! Chain acceptance and synchronization for the sable node.
//!
//! The [`Chain`] component validates, executes and commits accepted
//! blocks, restarts consensus through round updates, and coordinates
//! catch-up when peers are ahead. Storage and transaction execution
//! stay behind the [`Loader`] and [`Executor`] seams.

pub mod chain;
pub mod error;
pub mod executor;
pub mod loader;
pub mod sync;
pub mod tip;
pub mod verifier;

pub use chain::{Chain, ChainCommand, ChainConfig};
pub use error::{CertificateError, ChainError, SanityError};
pub use executor::{Executor, ExecutorError, StaticExecutor};
pub use loader::{genesis_block, Loader, MemoryLoader, StorageError, GENESIS_TIMESTAMP};
pub use sync::{sync_progress, SyncCounter};
pub use tip::TipProvider;
