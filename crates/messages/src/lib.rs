//! Typed consensus and gossip messages for the sable node.
//!
//! Every message here has a stable little-endian wire encoding; marshal
//! followed by unmarshal is the identity for all of them.

pub mod agreement;
pub mod header;
pub mod inv;
pub mod payload;
pub mod reduction;
pub mod score;

pub use agreement::{AgreementMessage, StepVotes, WinningBlock};
pub use header::{signing_message, ConsensusHeader};
pub use inv::{GetBlocks, Inv, InvItem, InvKind, MAX_INV_ITEMS};
pub use payload::{GossipFrame, GossipKind, Payload};
pub use reduction::ReductionMessage;
pub use score::ScoreMessage;
