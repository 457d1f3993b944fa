//! Reduction votes.

use crate::header::ConsensusHeader;
use sable_types::encoding::{Reader, WireError};
use sable_types::{BlsKeyPair, Hash};

/// A committee member's reduction vote for (round, step, hash).
///
/// The header signature *is* the vote: it signs the (round, step, hash)
/// triple and is the signature batched into the step's aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReductionMessage {
    pub header: ConsensusHeader,
}

impl ReductionMessage {
    /// Cast a vote for `block_hash` at (round, step).
    pub fn sign(keys: &BlsKeyPair, round: u64, step: u8, block_hash: Hash) -> Self {
        ReductionMessage {
            header: ConsensusHeader::sign(keys, round, step, block_hash),
        }
    }

    pub fn marshal(&self, buf: &mut Vec<u8>) {
        self.header.marshal(buf);
    }

    pub fn unmarshal(r: &mut Reader<'_>) -> Result<Self, WireError> {
        Ok(ReductionMessage {
            header: ConsensusHeader::unmarshal(r)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_types::test_utils::keypairs;

    #[test]
    fn test_vote_verifies() {
        let keys = &keypairs(1)[0];
        let vote = ReductionMessage::sign(keys, 9, 3, Hash::digest(b"block"));
        assert!(vote.header.verify());
    }

    #[test]
    fn test_marshal_roundtrip() {
        let keys = &keypairs(1)[0];
        let vote = ReductionMessage::sign(keys, 9, 3, Hash::digest(b"block"));
        let mut buf = Vec::new();
        vote.marshal(&mut buf);
        let decoded = ReductionMessage::unmarshal(&mut Reader::new(&buf)).unwrap();
        assert_eq!(vote, decoded);
    }
}
