//! Synchronization accounting.

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Counts the blocks still owed by peers during a catch-up.
///
/// Zero means consensus may run; non-zero means the chain is draining a
/// height gap and consensus stays halted.
#[derive(Debug, Default)]
pub struct SyncCounter {
    remaining: AtomicU64,
}

impl SyncCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a sync of `gap` blocks.
    pub fn start(&self, gap: u64) {
        debug!(gap, "sync started");
        self.remaining.store(gap, Ordering::SeqCst);
    }

    /// Account one accepted block; saturates at zero.
    pub fn decrement(&self) {
        let _ = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| {
                Some(v.saturating_sub(1))
            });
    }

    pub fn remaining(&self) -> u64 {
        self.remaining.load(Ordering::SeqCst)
    }

    pub fn is_syncing(&self) -> bool {
        self.remaining() > 0
    }
}

/// Sync progress as a percentage, clamped to [0, 100] at both ends.
pub fn sync_progress(tip_height: u64, highest_seen: u64) -> f32 {
    if highest_seen == 0 {
        return 0.0;
    }
    let progress = (tip_height as f64 / highest_seen as f64) * 100.0;
    progress.clamp(0.0, 100.0) as f32
}
