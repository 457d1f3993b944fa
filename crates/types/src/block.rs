//! Blocks, headers and certificates.

use crate::bls::{BlsSignature, SIGNATURE_SIZE};
use crate::encoding::{self, Reader, WireError};
use crate::transaction::Transaction;
use crate::{merkle, Hash};

/// The only supported block version.
pub const BLOCK_VERSION: u8 = 0;

/// Maximum transaction count in a single block.
pub const MAX_BLOCK_TXS: u64 = (i32::MAX / 8) as u64;

/// The quorum certificate finalizing a block.
///
/// Carries the batched signatures of both reduction phases and the
/// bitmaps identifying which committee members contributed to each.
/// `step` is the step at which the second reduction phase completed;
/// the first phase ran at `step - 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Certificate {
    pub step_one_sig: BlsSignature,
    pub step_two_sig: BlsSignature,
    pub step: u8,
    pub step_one_committee: u64,
    pub step_two_committee: u64,
}

impl Certificate {
    /// The certificate attached to genesis and to freshly built candidates.
    pub fn empty() -> Self {
        Certificate {
            step_one_sig: BlsSignature::zeroed(),
            step_two_sig: BlsSignature::zeroed(),
            step: 0,
            step_one_committee: 0,
            step_two_committee: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Certificate::empty()
    }

    pub fn marshal(&self, buf: &mut Vec<u8>) {
        encoding::write_bytes(buf, self.step_one_sig.as_bytes());
        encoding::write_bytes(buf, self.step_two_sig.as_bytes());
        encoding::write_u8(buf, self.step);
        encoding::write_u64(buf, self.step_one_committee);
        encoding::write_u64(buf, self.step_two_committee);
    }

    pub fn unmarshal(r: &mut Reader<'_>) -> Result<Self, WireError> {
        Ok(Certificate {
            step_one_sig: BlsSignature::from_bytes(r.read_array::<SIGNATURE_SIZE>()?),
            step_two_sig: BlsSignature::from_bytes(r.read_array::<SIGNATURE_SIZE>()?),
            step: r.read_u8()?,
            step_one_committee: r.read_u64()?,
            step_two_committee: r.read_u64()?,
        })
    }
}

/// A block header.
///
/// `seed` is the generator's BLS signature over the parent's seed, giving
/// every round a verifiable randomness source. `hash` covers the hashable
/// prefix (version through tx_root); the certificate is attached after
/// agreement and must not alter the hash the committee voted on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub version: u8,
    pub height: u64,
    pub timestamp: i64,
    pub prev_block_hash: Hash,
    pub seed: BlsSignature,
    pub tx_root: Hash,
    pub certificate: Certificate,
    pub hash: Hash,
}

impl BlockHeader {
    /// Serialize the hash preimage.
    pub fn marshal_hashable(&self, buf: &mut Vec<u8>) {
        encoding::write_u8(buf, self.version);
        encoding::write_u64(buf, self.height);
        encoding::write_i64(buf, self.timestamp);
        encoding::write_bytes(buf, self.prev_block_hash.as_bytes());
        encoding::write_bytes(buf, self.seed.as_bytes());
        encoding::write_bytes(buf, self.tx_root.as_bytes());
    }

    /// Recompute the self-hash from the hashable fields.
    pub fn compute_hash(&self) -> Hash {
        let mut buf = Vec::with_capacity(1 + 8 + 8 + 32 + SIGNATURE_SIZE + 32);
        self.marshal_hashable(&mut buf);
        Hash::digest(&buf)
    }

    pub fn marshal(&self, buf: &mut Vec<u8>) {
        self.marshal_hashable(buf);
        self.certificate.marshal(buf);
        encoding::write_bytes(buf, self.hash.as_bytes());
    }

    pub fn unmarshal(r: &mut Reader<'_>) -> Result<Self, WireError> {
        let version = r.read_u8()?;
        let height = r.read_u64()?;
        let timestamp = r.read_i64()?;
        let prev_block_hash = Hash::from_bytes(r.read_array::<32>()?);
        let seed = BlsSignature::from_bytes(r.read_array::<SIGNATURE_SIZE>()?);
        let tx_root = Hash::from_bytes(r.read_array::<32>()?);
        let certificate = Certificate::unmarshal(r)?;
        let hash = Hash::from_bytes(r.read_array::<32>()?);
        Ok(BlockHeader {
            version,
            height,
            timestamp,
            prev_block_hash,
            seed,
            tx_root,
            certificate,
            hash,
        })
    }
}

/// A block: header plus ordered transactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub header: BlockHeader,
    pub txs: Vec<Transaction>,
}

impl Block {
    /// Build a block, computing the transaction root and self-hash.
    pub fn new(mut header: BlockHeader, txs: Vec<Transaction>) -> Self {
        header.tx_root = tx_root(&txs);
        header.hash = header.compute_hash();
        Block { header, txs }
    }

    /// The block's self-hash.
    pub fn hash(&self) -> Hash {
        self.header.hash
    }

    pub fn marshal(&self, buf: &mut Vec<u8>) {
        self.header.marshal(buf);
        encoding::write_varint(buf, self.txs.len() as u64);
        for tx in &self.txs {
            tx.marshal(buf);
        }
    }

    pub fn unmarshal(r: &mut Reader<'_>) -> Result<Self, WireError> {
        let header = BlockHeader::unmarshal(r)?;
        let n = r.read_varint()?;
        if n > MAX_BLOCK_TXS {
            return Err(WireError::TooLarge {
                len: n,
                max: MAX_BLOCK_TXS,
            });
        }
        let mut txs = Vec::with_capacity(n.min(1024) as usize);
        for _ in 0..n {
            txs.push(Transaction::unmarshal(r)?);
        }
        Ok(Block { header, txs })
    }
}

/// Merkle root over the wire encoding of each transaction.
pub fn tx_root(txs: &[Transaction]) -> Hash {
    let leaves: Vec<Hash> = txs.iter().map(|tx| tx.hash()).collect();
    merkle::root(&leaves)
}
