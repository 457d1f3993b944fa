//! The storage seam.
//!
//! The chain persists blocks through the [`Loader`] trait; the concrete
//! backend is an external collaborator. [`MemoryLoader`] is the
//! in-process implementation used by tests and by nodes running without
//! a persistent store.

use parking_lot::Mutex;
use sable_types::{Block, BlockHeader, BlsSignature, Certificate, Hash, BLOCK_VERSION};
use std::collections::BTreeMap;

/// Fixed timestamp of the genesis block.
pub const GENESIS_TIMESTAMP: i64 = 1_609_459_200;

/// The deterministic genesis block.
pub fn genesis_block() -> Block {
    Block::new(
        BlockHeader {
            version: BLOCK_VERSION,
            height: 0,
            timestamp: GENESIS_TIMESTAMP,
            prev_block_hash: Hash::ZERO,
            seed: BlsSignature::zeroed(),
            tx_root: Hash::ZERO,
            certificate: Certificate::empty(),
            hash: Hash::ZERO,
        },
        Vec::new(),
    )
}

/// Errors from the storage backend.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("no block at height {0}")]
    NotFound(u64),

    #[error("append out of order: height {actual}, tip {tip}")]
    OutOfOrder { tip: u64, actual: u64 },

    #[error("storage backend: {0}")]
    Backend(String),
}

/// Abstracts the block store used by the chain.
pub trait Loader: Send + Sync {
    /// The latest stored block. An empty store yields the genesis
    /// block; this call never fails for lack of data.
    fn load_tip(&self) -> Result<Block, StorageError>;

    /// Append a block at the next height.
    fn append(&self, block: &Block) -> Result<(), StorageError>;

    /// The block at a given height.
    fn block_at(&self, height: u64) -> Result<Block, StorageError>;

    /// Height of the latest stored block.
    fn height(&self) -> Result<u64, StorageError>;

    /// Remove everything, the genesis block included.
    fn clear(&self) -> Result<(), StorageError>;

    /// Release the backend.
    fn close(&self) -> Result<(), StorageError>;
}

/// In-memory block store.
#[derive(Default)]
pub struct MemoryLoader {
    blocks: Mutex<BTreeMap<u64, Block>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Loader for MemoryLoader {
    fn load_tip(&self) -> Result<Block, StorageError> {
        let mut blocks = self.blocks.lock();
        if blocks.is_empty() {
            let genesis = genesis_block();
            blocks.insert(0, genesis.clone());
            return Ok(genesis);
        }
        Ok(blocks
            .last_key_value()
            .map(|(_, b)| b.clone())
            .expect("non-empty map has a last entry"))
    }

    fn append(&self, block: &Block) -> Result<(), StorageError> {
        let mut blocks = self.blocks.lock();
        let tip = blocks.last_key_value().map(|(h, _)| *h);
        match tip {
            Some(tip) if block.header.height != tip + 1 => Err(StorageError::OutOfOrder {
                tip,
                actual: block.header.height,
            }),
            None if block.header.height != 0 => Err(StorageError::OutOfOrder {
                tip: 0,
                actual: block.header.height,
            }),
            _ => {
                blocks.insert(block.header.height, block.clone());
                Ok(())
            }
        }
    }

    fn block_at(&self, height: u64) -> Result<Block, StorageError> {
        self.blocks
            .lock()
            .get(&height)
            .cloned()
            .ok_or(StorageError::NotFound(height))
    }

    fn height(&self) -> Result<u64, StorageError> {
        Ok(self
            .blocks
            .lock()
            .last_key_value()
            .map(|(h, _)| *h)
            .unwrap_or(0))
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.blocks.lock().clear();
        Ok(())
    }

    fn close(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
