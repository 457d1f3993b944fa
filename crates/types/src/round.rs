//! Round state.

use crate::bid::BidList;
use crate::bls::BlsSignature;
use crate::provisioners::Provisioners;
use crate::Hash;

/// The snapshot handed to consensus components when a round begins.
///
/// Carries everything a per-round component needs: the round number (the
/// height of the block being built), the parent's seed and hash, and
/// read-only copies of the provisioner and bid sets as of the parent
/// block's acceptance.
#[derive(Debug, Clone)]
pub struct RoundUpdate {
    pub round: u64,
    pub seed: BlsSignature,
    pub hash: Hash,
    /// Timestamp of the parent block; candidates must exceed it.
    pub timestamp: i64,
    pub provisioners: Provisioners,
    pub bid_list: BidList,
}

/// Consensus steps start at 1; step 0 never appears on the wire.
pub const MIN_STEP: u8 = 1;
