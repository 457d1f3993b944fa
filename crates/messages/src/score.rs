//! Score events.

use crate::header::ConsensusHeader;
use sable_types::encoding::{self, Reader, WireError};
use sable_types::{Bid, BlsSignature, Hash, SIGNATURE_SIZE};

/// A bidder's claim to propose the candidate this round.
///
/// `header.block_hash` is the candidate's vote hash. `score` is the
/// proof's output scalar; the selector picks the event with the highest
/// verified score inside its window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreMessage {
    pub header: ConsensusHeader,
    /// Zero-knowledge proof over the bid.
    pub proof: Vec<u8>,
    /// The proof's output scalar.
    pub score: Hash,
    /// Identifier of the bid the proof was generated from.
    pub bid: Bid,
    /// Membership witness within the bid list.
    pub witness: Vec<u8>,
    /// Hash of the parent block.
    pub prev_hash: Hash,
    /// The round seed the proof committed to.
    pub seed: BlsSignature,
}

impl ScoreMessage {
    /// The candidate hash this score vouches for.
    pub fn vote_hash(&self) -> Hash {
        self.header.block_hash
    }

    pub fn marshal(&self, buf: &mut Vec<u8>) {
        self.header.marshal(buf);
        encoding::write_var_bytes(buf, &self.proof);
        encoding::write_bytes(buf, self.score.as_bytes());
        encoding::write_bytes(buf, self.bid.as_bytes());
        encoding::write_var_bytes(buf, &self.witness);
        encoding::write_bytes(buf, self.prev_hash.as_bytes());
        encoding::write_bytes(buf, self.seed.as_bytes());
    }

    pub fn unmarshal(r: &mut Reader<'_>) -> Result<Self, WireError> {
        Ok(ScoreMessage {
            header: ConsensusHeader::unmarshal(r)?,
            proof: r.read_var_bytes()?,
            score: Hash::from_bytes(r.read_array::<32>()?),
            bid: Bid::from_bytes(r.read_array::<32>()?),
            witness: r.read_var_bytes()?,
            prev_hash: Hash::from_bytes(r.read_array::<32>()?),
            seed: BlsSignature::from_bytes(r.read_array::<SIGNATURE_SIZE>()?),
        })
    }
}
