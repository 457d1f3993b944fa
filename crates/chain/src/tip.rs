//! The chain tip provider.

use parking_lot::RwLock;
use sable_types::Block;
use std::sync::Arc;

/// Single-writer holder of the latest accepted block.
///
/// The chain swaps an owned block atomically; readers get a cheap
/// snapshot that stays valid while they hold it.
pub struct TipProvider {
    tip: RwLock<Arc<Block>>,
}

impl TipProvider {
    pub fn new(block: Block) -> Self {
        TipProvider {
            tip: RwLock::new(Arc::new(block)),
        }
    }

    /// Snapshot the current tip.
    pub fn get(&self) -> Arc<Block> {
        self.tip.read().clone()
    }

    /// Replace the tip.
    pub fn set(&self, block: Block) {
        *self.tip.write() = Arc::new(block);
    }

    pub fn height(&self) -> u64 {
        self.tip.read().header.height
    }
}
