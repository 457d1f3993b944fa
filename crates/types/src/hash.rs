//! 32-byte content hash.

use std::fmt;

/// A 32-byte blake3 hash.
///
/// Used for block hashes, transaction hashes, merkle roots and sortition
/// digests. The all-zero hash doubles as the "empty" sentinel in the
/// consensus protocol (an empty reduction result, the genesis parent).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Hash([u8; 32]);

impl Hash {
    /// The all-zero hash.
    pub const ZERO: Hash = Hash([0u8; 32]);

    /// Hash arbitrary bytes.
    pub fn digest(data: &[u8]) -> Self {
        Hash(*blake3::hash(data).as_bytes())
    }

    /// Wrap an existing 32-byte value.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Hash(bytes)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Whether this is the empty sentinel.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Parse from a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, HexError> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| HexError::BadLength { expected: 32 })?;
        Ok(Hash(arr))
    }

    /// Hex representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

/// Error parsing a hex-encoded value.
#[derive(Debug, thiserror::Error)]
pub enum HexError {
    #[error("invalid hex: {0}")]
    Decode(#[from] hex::FromHexError),

    #[error("wrong length, expected {expected} bytes")]
    BadLength { expected: usize },
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form keeps tracing output readable.
        write!(f, "{}", &hex::encode(&self.0[..8]))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_deterministic() {
        let a = Hash::digest(b"sable");
        let b = Hash::digest(b"sable");
        assert_eq!(a, b);
        assert_ne!(a, Hash::digest(b"elbas"));
    }

    #[test]
    fn test_zero_sentinel() {
        assert!(Hash::ZERO.is_zero());
        assert!(!Hash::digest(b"x").is_zero());
    }

    #[test]
    fn test_hex_roundtrip() {
        let h = Hash::digest(b"roundtrip");
        let parsed = Hash::from_hex(&h.to_hex()).unwrap();
        assert_eq!(h, parsed);
    }

    #[test]
    fn test_hex_rejects_bad_length() {
        assert!(matches!(
            Hash::from_hex("abcd"),
            Err(HexError::BadLength { expected: 32 })
        ));
    }
}
