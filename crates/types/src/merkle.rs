//! Binary merkle root.

use crate::Hash;

/// Compute the merkle root over a list of leaf hashes.
///
/// Interior nodes hash the concatenation of their children; a level with
/// an odd node count duplicates its last node. An empty list yields the
/// zero hash.
pub fn root(leaves: &[Hash]) -> Hash {
    if leaves.is_empty() {
        return Hash::ZERO;
    }

    let mut level: Vec<Hash> = leaves.to_vec();
    while level.len() > 1 {
        let mut next = Vec::with_capacity((level.len() + 1) / 2);
        for pair in level.chunks(2) {
            let left = pair[0];
            let right = if pair.len() == 2 { pair[1] } else { pair[0] };
            let mut data = [0u8; 64];
            data[..32].copy_from_slice(left.as_bytes());
            data[32..].copy_from_slice(right.as_bytes());
            next.push(Hash::digest(&data));
        }
        level = next;
    }
    level[0]
}
