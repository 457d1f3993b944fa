//! Per-step committees.

use sable_types::BlsPublicKey;

/// A committee member and its vote weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitteeMember {
    pub public_key: BlsPublicKey,
    pub weight: u64,
}

/// The committee for one consensus step.
///
/// Members are kept in canonical (public key) order; a member's position
/// is its bit index in certificate bitmaps. Weights sum to the sortition
/// target size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committee {
    members: Vec<CommitteeMember>,
    size: usize,
}

impl Committee {
    pub(crate) fn new(members: Vec<CommitteeMember>, size: usize) -> Self {
        debug_assert!(members.len() <= 64, "bitmaps index at most 64 members");
        Committee { members, size }
    }

    pub(crate) fn empty(size: usize) -> Self {
        Committee {
            members: Vec::new(),
            size,
        }
    }

    /// The sortition target size (sum of all weights).
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of distinct members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Votes required for a quorum.
    pub fn quorum(&self) -> u64 {
        (self.size as u64) * 2 / 3 + 1
    }

    pub fn members(&self) -> impl Iterator<Item = &CommitteeMember> {
        self.members.iter()
    }

    /// Bit index of a member, if present.
    pub fn index_of(&self, public_key: &BlsPublicKey) -> Option<usize> {
        self.members
            .iter()
            .position(|m| m.public_key == *public_key)
    }

    pub fn contains(&self, public_key: &BlsPublicKey) -> bool {
        self.index_of(public_key).is_some()
    }

    /// Vote weight of a member, if present.
    pub fn weight_of(&self, public_key: &BlsPublicKey) -> Option<u64> {
        self.members
            .iter()
            .find(|m| m.public_key == *public_key)
            .map(|m| m.weight)
    }

    /// Bitmap with the bits of the given members set.
    ///
    /// Unknown members are ignored; the caller is expected to have
    /// checked membership when counting votes.
    pub fn bitmap_of<'a>(&self, keys: impl IntoIterator<Item = &'a BlsPublicKey>) -> u64 {
        let mut bitmap = 0u64;
        for key in keys {
            if let Some(index) = self.index_of(key) {
                bitmap |= 1u64 << index;
            }
        }
        bitmap
    }

    /// The members selected by a bitmap, in bit order.
    pub fn members_by_bitmap(&self, bitmap: u64) -> Vec<BlsPublicKey> {
        self.members
            .iter()
            .enumerate()
            .filter(|(i, _)| bitmap & (1u64 << i) != 0)
            .map(|(_, m)| m.public_key)
            .collect()
    }

    /// Total vote weight of the members selected by a bitmap.
    pub fn weight_by_bitmap(&self, bitmap: u64) -> u64 {
        self.members
            .iter()
            .enumerate()
            .filter(|(i, _)| bitmap & (1u64 << i) != 0)
            .map(|(_, m)| m.weight)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_types::test_utils::keypairs;

    fn committee_of(weights: &[u64]) -> (Committee, Vec<BlsPublicKey>) {
        let keys = keypairs(weights.len());
        let mut pks: Vec<BlsPublicKey> = keys.iter().map(|k| k.public_key()).collect();
        pks.sort();
        let members = pks
            .iter()
            .zip(weights)
            .map(|(pk, w)| CommitteeMember {
                public_key: *pk,
                weight: *w,
            })
            .collect();
        let size = weights.iter().sum::<u64>() as usize;
        (Committee::new(members, size), pks)
    }

    #[test]
    fn test_quorum_values() {
        let (c, _) = committee_of(&[32, 32]);
        assert_eq!(c.size(), 64);
        assert_eq!(c.quorum(), 43);

        let (c, _) = committee_of(&[1, 1, 1]);
        assert_eq!(c.quorum(), 3);
    }

    #[test]
    fn test_bitmap_roundtrip() {
        let (c, pks) = committee_of(&[1, 2, 3, 4]);
        let subset = [pks[0], pks[2]];
        let bitmap = c.bitmap_of(subset.iter());
        assert_eq!(bitmap, 0b101);
        assert_eq!(c.members_by_bitmap(bitmap), subset);
        assert_eq!(c.weight_by_bitmap(bitmap), 1 + 3);
    }

    #[test]
    fn test_unknown_member_ignored_in_bitmap() {
        let (c, _) = committee_of(&[1, 1]);
        let stranger = keypairs(3)[2].public_key();
        assert_eq!(c.bitmap_of([&stranger]), 0);
        assert!(!c.contains(&stranger));
        assert_eq!(c.weight_of(&stranger), None);
    }

    #[test]
    fn test_index_is_canonical_position() {
        let (c, pks) = committee_of(&[1, 1, 1]);
        for (i, pk) in pks.iter().enumerate() {
            assert_eq!(c.index_of(pk), Some(i));
        }
    }
}
