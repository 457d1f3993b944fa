//! Foundational types for the sable consensus node.
//!
//! This crate provides the types shared by every other workspace crate:
//!
//! - **Primitives**: [`Hash`], BLS keys and signatures
//! - **Chain data**: [`Block`], [`BlockHeader`], [`Certificate`], transactions
//! - **Consensus sets**: [`Provisioners`], [`BidList`], [`RoundUpdate`]
//! - **Wire codec**: little-endian encoding with Bitcoin-style varints
//!
//! It depends on no other workspace crate, making it the foundation layer.

pub mod bid;
pub mod bls;
pub mod block;
pub mod encoding;
pub mod hash;
pub mod merkle;
pub mod provisioners;
pub mod round;
pub mod transaction;

pub use bid::{Bid, BidList};
pub use bls::{
    aggregate_verify, BlsError, BlsKeyPair, BlsPublicKey, BlsSignature, PUBLIC_KEY_SIZE,
    SIGNATURE_SIZE,
};
pub use block::{tx_root, Block, BlockHeader, Certificate, BLOCK_VERSION, MAX_BLOCK_TXS};
pub use encoding::{Reader, WireError};
pub use hash::{Hash, HexError};
pub use provisioners::{Member, Provisioners, Stake};
pub use round::{RoundUpdate, MIN_STEP};
pub use transaction::Transaction;

/// Test helpers shared across the workspace.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils {
    use super::*;

    /// Deterministic key pairs from consecutive seeds.
    pub fn keypairs(n: usize) -> Vec<BlsKeyPair> {
        (0..n)
            .map(|i| {
                let mut seed = [0u8; 32];
                seed[0] = (i + 1) as u8;
                seed[1] = (i >> 8) as u8;
                BlsKeyPair::from_seed(&seed).expect("valid seed")
            })
            .collect()
    }

    /// A provisioner set where every key holds one stake of `value`
    /// active for heights [0, 1_000_000).
    pub fn provisioners(keys: &[BlsKeyPair], value: u64) -> Provisioners {
        let mut p = Provisioners::new();
        for key in keys {
            p.add_stake(
                key.public_key(),
                Stake {
                    value,
                    start_height: 0,
                    end_height: 1_000_000,
                },
            );
        }
        p
    }

    /// A well-formed child of `parent` at the next height.
    pub fn child_block(parent: &Block, generator: &BlsKeyPair, txs: Vec<Transaction>) -> Block {
        let header = BlockHeader {
            version: BLOCK_VERSION,
            height: parent.header.height + 1,
            timestamp: parent.header.timestamp + 10,
            prev_block_hash: parent.hash(),
            seed: generator.sign(parent.header.seed.as_bytes()),
            tx_root: Hash::ZERO,
            certificate: Certificate::empty(),
            hash: Hash::ZERO,
        };
        Block::new(header, txs)
    }
}
