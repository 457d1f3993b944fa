//! Chain errors.

use crate::loader::StorageError;

/// Header sanity failures.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SanityError {
    #[error("unsupported block version {0}")]
    UnsupportedVersion(u8),

    #[error("previous hash does not match the chain tip")]
    PrevHashMismatch,

    #[error("height {actual} is not parent height + 1 ({expected})")]
    HeightMismatch { expected: u64, actual: u64 },

    #[error("timestamp {actual} does not exceed parent timestamp {parent}")]
    TimestampNotMonotonic { parent: i64, actual: i64 },

    #[error("transaction root mismatch")]
    TxRootMismatch,

    #[error("header hash mismatch")]
    HashMismatch,
}

/// Certificate verification failures.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CertificateError {
    #[error("certificate is empty")]
    Empty,

    #[error("certificate step {0} leaves no room for the first phase")]
    StepOutOfRange(u8),

    #[error("phase {phase} bitmap weight {weight} is below quorum {quorum}")]
    UnderQuorum { phase: u8, weight: u64, quorum: u64 },

    #[error("phase {phase} batched signature does not verify")]
    BadAggregate { phase: u8 },
}

/// Errors surfaced by block acceptance and chain maintenance.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("sanity check failed: {0}")]
    SanityFailed(#[from] SanityError),

    #[error("certificate invalid: {0}")]
    CertificateInvalid(#[from] CertificateError),

    #[error("state executor failed: {0}")]
    ExecutorFailed(String),

    #[error("storage failed: {0}")]
    StorageFailed(#[from] StorageError),

    #[error(transparent)]
    Bus(#[from] sable_bus::BusError),
}
