//! The common consensus event header.

use sable_types::encoding::{self, Reader, WireError};
use sable_types::{BlsKeyPair, BlsPublicKey, BlsSignature, Hash, PUBLIC_KEY_SIZE, SIGNATURE_SIZE};

/// Domain tag for consensus vote signatures.
const VOTE_DOMAIN: &[u8] = b"sable:vote:";

/// Build the byte string a committee member signs for (round, step, hash).
///
/// The domain tag prevents a vote from being replayed as any other kind
/// of signature.
pub fn signing_message(round: u64, step: u8, block_hash: &Hash) -> Vec<u8> {
    let mut msg = Vec::with_capacity(VOTE_DOMAIN.len() + 8 + 1 + 32);
    msg.extend_from_slice(VOTE_DOMAIN);
    msg.extend_from_slice(&round.to_le_bytes());
    msg.push(step);
    msg.extend_from_slice(block_hash.as_bytes());
    msg
}

/// Header carried by every consensus event.
///
/// `signature` signs `signing_message(round, step, block_hash)` under
/// `pubkey_bls`; in reduction it doubles as the member's vote and is the
/// signature that gets batched into certificates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsensusHeader {
    pub round: u64,
    pub step: u8,
    pub pubkey_bls: BlsPublicKey,
    pub block_hash: Hash,
    pub signature: BlsSignature,
}

impl ConsensusHeader {
    /// Sign a new header for (round, step, hash).
    pub fn sign(keys: &BlsKeyPair, round: u64, step: u8, block_hash: Hash) -> Self {
        let signature = keys.sign(&signing_message(round, step, &block_hash));
        ConsensusHeader {
            round,
            step,
            pubkey_bls: keys.public_key(),
            block_hash,
            signature,
        }
    }

    /// Verify the header signature against its own public key.
    pub fn verify(&self) -> bool {
        let msg = signing_message(self.round, self.step, &self.block_hash);
        self.pubkey_bls.verify(&msg, &self.signature)
    }

    pub fn marshal(&self, buf: &mut Vec<u8>) {
        encoding::write_u64(buf, self.round);
        encoding::write_u8(buf, self.step);
        encoding::write_bytes(buf, self.pubkey_bls.as_bytes());
        encoding::write_bytes(buf, self.block_hash.as_bytes());
        encoding::write_bytes(buf, self.signature.as_bytes());
    }

    pub fn unmarshal(r: &mut Reader<'_>) -> Result<Self, WireError> {
        Ok(ConsensusHeader {
            round: r.read_u64()?,
            step: r.read_u8()?,
            pubkey_bls: BlsPublicKey::from_bytes(r.read_array::<PUBLIC_KEY_SIZE>()?),
            block_hash: Hash::from_bytes(r.read_array::<32>()?),
            signature: BlsSignature::from_bytes(r.read_array::<SIGNATURE_SIZE>()?),
        })
    }
}
