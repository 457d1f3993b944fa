//! Event bus payloads and gossip frames.

use crate::{AgreementMessage, GetBlocks, Inv, ReductionMessage, ScoreMessage, WinningBlock};
use sable_types::encoding::{self, Reader, WireError};
use sable_types::{Block, RoundUpdate};

/// The payload carried by an event bus message.
///
/// A closed set: every internal topic carries exactly one of these
/// shapes, so subscribers match instead of downcasting.
#[derive(Debug, Clone)]
pub enum Payload {
    /// No payload (Initialization, StopConsensus).
    Empty,
    /// A new consensus round is starting.
    RoundUpdate(RoundUpdate),
    /// A full block arriving for acceptance.
    Block(Box<Block>),
    /// A candidate block under consideration this round.
    Candidate(Box<Block>),
    /// A bidder's score claim.
    Score(Box<ScoreMessage>),
    /// A reduction vote.
    Reduction(ReductionMessage),
    /// An agreement claim.
    Agreement(AgreementMessage),
    /// A round's winning block, announced by the agreement component.
    WinningBlock(Box<WinningBlock>),
    /// An accepted block announcement.
    AcceptedBlock(Box<Block>),
    /// Egress traffic for the transport layer.
    Gossip(GossipFrame),
}

impl Payload {
    /// Payload kind for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Empty => "Empty",
            Payload::RoundUpdate(_) => "RoundUpdate",
            Payload::Block(_) => "Block",
            Payload::Candidate(_) => "Candidate",
            Payload::Score(_) => "Score",
            Payload::Reduction(_) => "Reduction",
            Payload::Agreement(_) => "Agreement",
            Payload::WinningBlock(_) => "WinningBlock",
            Payload::AcceptedBlock(_) => "AcceptedBlock",
            Payload::Gossip(_) => "Gossip",
        }
    }
}

/// The topics understood by peers on the gossip channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GossipKind {
    Inv = 0,
    Block = 1,
    Candidate = 2,
    Score = 3,
    Reduction = 4,
    Agreement = 5,
    GetData = 6,
    GetBlocks = 7,
    MemPool = 8,
}

impl GossipKind {
    fn from_u8(v: u8) -> Result<Self, WireError> {
        Ok(match v {
            0 => GossipKind::Inv,
            1 => GossipKind::Block,
            2 => GossipKind::Candidate,
            3 => GossipKind::Score,
            4 => GossipKind::Reduction,
            5 => GossipKind::Agreement,
            6 => GossipKind::GetData,
            7 => GossipKind::GetBlocks,
            8 => GossipKind::MemPool,
            tag => return Err(WireError::UnknownTag(tag)),
        })
    }
}

/// A framed message bound for the transport layer: the peer topic plus
/// the marshalled payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GossipFrame {
    pub kind: GossipKind,
    pub bytes: Vec<u8>,
}

impl GossipFrame {
    /// Frame an already-marshalled payload.
    pub fn new(kind: GossipKind, bytes: Vec<u8>) -> Self {
        GossipFrame { kind, bytes }
    }

    /// Frame an inventory advertisement.
    pub fn inv(inv: &Inv) -> Self {
        let mut bytes = Vec::new();
        inv.marshal(&mut bytes);
        GossipFrame::new(GossipKind::Inv, bytes)
    }

    /// Frame a block-range request.
    pub fn get_blocks(msg: &GetBlocks) -> Self {
        let mut bytes = Vec::new();
        msg.marshal(&mut bytes);
        GossipFrame::new(GossipKind::GetBlocks, bytes)
    }

    pub fn marshal(&self, buf: &mut Vec<u8>) {
        encoding::write_u8(buf, self.kind as u8);
        encoding::write_var_bytes(buf, &self.bytes);
    }

    pub fn unmarshal(r: &mut Reader<'_>) -> Result<Self, WireError> {
        Ok(GossipFrame {
            kind: GossipKind::from_u8(r.read_u8()?)?,
            bytes: r.read_var_bytes()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_types::Hash;

    #[test]
    fn test_frame_roundtrip() {
        let frame = GossipFrame::inv(&Inv::block(Hash::digest(b"tip")));
        let mut buf = Vec::new();
        frame.marshal(&mut buf);
        let decoded = GossipFrame::unmarshal(&mut Reader::new(&buf)).unwrap();
        assert_eq!(frame, decoded);
        // The inner bytes decode back to the inventory.
        let inv = Inv::unmarshal(&mut Reader::new(&decoded.bytes)).unwrap();
        assert_eq!(inv.items[0].hash, Hash::digest(b"tip"));
    }

    #[test]
    fn test_unknown_gossip_kind_rejected() {
        let mut r = Reader::new(&[0xEE, 0x00]);
        assert!(matches!(
            GossipFrame::unmarshal(&mut r),
            Err(WireError::UnknownTag(0xEE))
        ));
    }
}
