//! Deterministic stake-weighted committee sortition.
//!
//! Given (round, step, target size, provisioner set, round seed), every
//! node derives the same per-step committee: for each vote index a
//! pseudo-random score is drawn from the seed and mapped onto the
//! cumulative stake distribution. A member may claim several votes
//! (sampling with replacement); vote weights always sum to the target
//! size. Verification of a claimed committee is recomputation.

mod committee;

pub use committee::{Committee, CommitteeMember};

use sable_types::{BlsPublicKey, BlsSignature, Provisioners};

/// Committees are index-addressed by u64 certificate bitmaps.
pub const MAX_COMMITTEE_MEMBERS: usize = 64;

/// Draw the sortition score for vote `index`.
///
/// `H(seed || round || step || index) mod total_stake`, with the first
/// eight little-endian bytes of the digest as the integer sample.
fn score(seed: &BlsSignature, round: u64, step: u8, index: u32, total_stake: u64) -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(seed.as_bytes());
    hasher.update(&round.to_le_bytes());
    hasher.update(&[step]);
    hasher.update(&index.to_le_bytes());
    let digest = hasher.finalize();
    let mut first = [0u8; 8];
    first.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_le_bytes(first) % total_stake
}

/// Select the committee for (round, step).
///
/// Members are walked in canonical (public key) order; the first member
/// whose cumulative active stake exceeds the drawn score claims the
/// vote. Stake is not decremented between votes. An empty or fully
/// expired provisioner set yields an empty committee.
pub fn create_committee(
    round: u64,
    step: u8,
    size: usize,
    provisioners: &Provisioners,
    seed: &BlsSignature,
) -> Committee {
    let total_stake = provisioners.total_active_stake(round);
    if total_stake == 0 {
        return Committee::empty(size);
    }

    // Cumulative stake walk order is the canonical member order.
    let stakes: Vec<(BlsPublicKey, u64)> = provisioners
        .members()
        .map(|m| (m.public_key, m.active_stake(round)))
        .filter(|(_, stake)| *stake > 0)
        .collect();

    let mut weights: Vec<u64> = vec![0; stakes.len()];
    for i in 0..size {
        let drawn = score(seed, round, step, i as u32, total_stake);
        let mut cumulative = 0u64;
        for (pos, (_, stake)) in stakes.iter().enumerate() {
            cumulative += stake;
            if cumulative > drawn {
                weights[pos] += 1;
                break;
            }
        }
    }

    let members: Vec<CommitteeMember> = stakes
        .into_iter()
        .zip(weights)
        .filter(|(_, w)| *w > 0)
        .map(|((public_key, _), weight)| CommitteeMember { public_key, weight })
        .collect();

    Committee::new(members, size)
}
