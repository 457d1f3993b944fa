//! Block transactions.
//!
//! The state executor interprets transaction payloads; the consensus core
//! only needs the coinbase structure (it builds one per candidate) and a
//! stable wire encoding for merkle hashing.

use crate::bls::{BlsPublicKey, PUBLIC_KEY_SIZE};
use crate::encoding::{self, Reader, WireError};
use crate::Hash;

const TAG_COINBASE: u8 = 0;
const TAG_STANDARD: u8 = 1;

/// A block transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transaction {
    /// Reward for the block generator, carrying its score proof.
    Coinbase {
        reward: u64,
        generator: BlsPublicKey,
        proof: Vec<u8>,
        score: Hash,
    },
    /// Opaque user transaction, executed by the external state executor.
    Standard { payload: Vec<u8> },
}

impl Transaction {
    /// Whether this is a coinbase.
    pub fn is_coinbase(&self) -> bool {
        matches!(self, Transaction::Coinbase { .. })
    }

    /// Transaction hash over the wire encoding.
    pub fn hash(&self) -> Hash {
        let mut buf = Vec::new();
        self.marshal(&mut buf);
        Hash::digest(&buf)
    }

    pub fn marshal(&self, buf: &mut Vec<u8>) {
        match self {
            Transaction::Coinbase {
                reward,
                generator,
                proof,
                score,
            } => {
                encoding::write_u8(buf, TAG_COINBASE);
                encoding::write_u64(buf, *reward);
                encoding::write_bytes(buf, generator.as_bytes());
                encoding::write_var_bytes(buf, proof);
                encoding::write_bytes(buf, score.as_bytes());
            }
            Transaction::Standard { payload } => {
                encoding::write_u8(buf, TAG_STANDARD);
                encoding::write_var_bytes(buf, payload);
            }
        }
    }

    pub fn unmarshal(r: &mut Reader<'_>) -> Result<Self, WireError> {
        match r.read_u8()? {
            TAG_COINBASE => Ok(Transaction::Coinbase {
                reward: r.read_u64()?,
                generator: BlsPublicKey::from_bytes(r.read_array::<PUBLIC_KEY_SIZE>()?),
                proof: r.read_var_bytes()?,
                score: Hash::from_bytes(r.read_array::<32>()?),
            }),
            TAG_STANDARD => Ok(Transaction::Standard {
                payload: r.read_var_bytes()?,
            }),
            tag => Err(WireError::UnknownTag(tag)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bls::BlsKeyPair;

    #[test]
    fn test_marshal_roundtrip() {
        let kp = BlsKeyPair::from_seed(&[1u8; 32]).unwrap();
        let txs = [
            Transaction::Coinbase {
                reward: 50_000,
                generator: kp.public_key(),
                proof: vec![9, 9, 9],
                score: Hash::digest(b"score"),
            },
            Transaction::Standard {
                payload: vec![1, 2, 3, 4],
            },
        ];
        for tx in txs {
            let mut buf = Vec::new();
            tx.marshal(&mut buf);
            let decoded = Transaction::unmarshal(&mut Reader::new(&buf)).unwrap();
            assert_eq!(tx, decoded);
        }
    }

    #[test]
    fn test_hash_distinguishes_payloads() {
        let a = Transaction::Standard { payload: vec![1] };
        let b = Transaction::Standard { payload: vec![2] };
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let mut r = Reader::new(&[0x7F]);
        assert!(matches!(
            Transaction::unmarshal(&mut r),
            Err(WireError::UnknownTag(0x7F))
        ));
    }
}
