//! Internal bus topics.

use std::fmt;

/// The closed set of internal event topics.
///
/// Components subscribe to topics by variant; there are no string
/// lookups anywhere on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Kick-off signal: ask the chain to emit the first round update.
    Initialization,
    /// A new consensus round is starting.
    RoundUpdate,
    /// Halt all consensus components.
    StopConsensus,
    /// A block was accepted and persisted.
    AcceptedBlock,
    /// A full block arriving for acceptance (peer or local agreement).
    Block,
    /// Candidate block dissemination.
    Candidate,
    /// Score event dissemination.
    Score,
    /// Reduction vote dissemination.
    Reduction,
    /// Agreement event dissemination.
    Agreement,
    /// Egress channel toward the transport layer.
    Gossip,
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Topic::Initialization => "Initialization",
            Topic::RoundUpdate => "RoundUpdate",
            Topic::StopConsensus => "StopConsensus",
            Topic::AcceptedBlock => "AcceptedBlock",
            Topic::Block => "Block",
            Topic::Candidate => "Candidate",
            Topic::Score => "Score",
            Topic::Reduction => "Reduction",
            Topic::Agreement => "Agreement",
            Topic::Gossip => "Gossip",
        };
        f.write_str(name)
    }
}
