//! BLS12-381 signatures.
//!
//! Thin wrappers over `blst` in the min-sig parameterization: signatures
//! are 48-byte compressed G1 points, public keys 96-byte compressed G2
//! points. Wrappers store the compressed bytes so they can be ordered,
//! hashed and put on the wire directly; points are decompressed on use.

use blst::min_sig::{AggregateSignature, PublicKey, SecretKey, Signature};
use blst::BLST_ERROR;
use rand::RngCore;
use std::fmt;

/// Domain separation tag (proof-of-possession scheme, G1 signatures).
const DST: &[u8] = b"BLS_SIG_BLS12381G1_XMD:SHA-256_SSWU_RO_POP_";

/// Compressed public key size.
pub const PUBLIC_KEY_SIZE: usize = 96;
/// Compressed signature size.
pub const SIGNATURE_SIZE: usize = 48;

/// Errors from BLS operations.
#[derive(Debug, thiserror::Error)]
pub enum BlsError {
    #[error("invalid secret key material")]
    InvalidSecretKey,

    #[error("invalid public key encoding")]
    InvalidPublicKey,

    #[error("invalid signature encoding")]
    InvalidSignature,

    #[error("cannot aggregate an empty set")]
    EmptyAggregation,

    #[error("signature aggregation failed")]
    AggregationFailed,
}

/// A BLS public key, stored in compressed form.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlsPublicKey([u8; PUBLIC_KEY_SIZE]);

impl BlsPublicKey {
    /// Wrap raw compressed bytes without validating the point.
    ///
    /// Validation happens on first use; a malformed key fails every
    /// verification.
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_SIZE]) -> Self {
        BlsPublicKey(bytes)
    }

    /// Compressed bytes.
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.0
    }

    /// Verify a signature over `message` under this key.
    pub fn verify(&self, message: &[u8], signature: &BlsSignature) -> bool {
        let Ok(pk) = PublicKey::key_validate(&self.0) else {
            return false;
        };
        let Ok(sig) = Signature::from_bytes(&signature.0) else {
            return false;
        };
        sig.verify(true, message, DST, &[], &pk, true) == BLST_ERROR::BLST_SUCCESS
    }
}

/// A BLS signature, stored in compressed form.
///
/// The all-zero value is the "unsigned" sentinel used by empty
/// certificates and the genesis seed; it never verifies.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlsSignature([u8; SIGNATURE_SIZE]);

impl BlsSignature {
    /// The unsigned sentinel.
    pub fn zeroed() -> Self {
        BlsSignature([0u8; SIGNATURE_SIZE])
    }

    /// Wrap raw compressed bytes.
    pub fn from_bytes(bytes: [u8; SIGNATURE_SIZE]) -> Self {
        BlsSignature(bytes)
    }

    /// Compressed bytes.
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.0
    }

    /// Whether this is the unsigned sentinel.
    pub fn is_zeroed(&self) -> bool {
        self.0 == [0u8; SIGNATURE_SIZE]
    }

    /// Aggregate signatures over the same message into a batched one.
    pub fn aggregate(sigs: &[BlsSignature]) -> Result<BlsSignature, BlsError> {
        if sigs.is_empty() {
            return Err(BlsError::EmptyAggregation);
        }
        let parsed: Vec<Signature> = sigs
            .iter()
            .map(|s| Signature::from_bytes(&s.0).map_err(|_| BlsError::InvalidSignature))
            .collect::<Result<_, _>>()?;
        let refs: Vec<&Signature> = parsed.iter().collect();
        AggregateSignature::aggregate(&refs, true)
            .map(|agg| BlsSignature(agg.to_signature().to_bytes()))
            .map_err(|_| BlsError::AggregationFailed)
    }
}

/// Verify a batched signature over one message against a set of signers.
pub fn aggregate_verify(
    message: &[u8],
    signature: &BlsSignature,
    signers: &[BlsPublicKey],
) -> bool {
    if signers.is_empty() {
        return false;
    }
    let Ok(sig) = Signature::from_bytes(&signature.0) else {
        return false;
    };
    let parsed: Option<Vec<PublicKey>> = signers
        .iter()
        .map(|pk| PublicKey::key_validate(&pk.0).ok())
        .collect();
    let Some(parsed) = parsed else {
        return false;
    };
    let refs: Vec<&PublicKey> = parsed.iter().collect();
    sig.fast_aggregate_verify(true, message, DST, &refs) == BLST_ERROR::BLST_SUCCESS
}

/// A BLS signing key pair.
pub struct BlsKeyPair {
    secret: SecretKey,
    public: BlsPublicKey,
}

impl Clone for BlsKeyPair {
    fn clone(&self) -> Self {
        let secret = SecretKey::from_bytes(&self.secret.to_bytes())
            .expect("a serialized secret key round-trips");
        BlsKeyPair {
            secret,
            public: self.public,
        }
    }
}

impl BlsKeyPair {
    /// Generate a fresh key pair from system randomness.
    pub fn generate() -> Self {
        let mut ikm = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut ikm);
        Self::from_seed(&ikm).expect("32 bytes of entropy is valid IKM")
    }

    /// Derive a key pair deterministically from 32 bytes of key material.
    pub fn from_seed(ikm: &[u8; 32]) -> Result<Self, BlsError> {
        let secret = SecretKey::key_gen(ikm, &[]).map_err(|_| BlsError::InvalidSecretKey)?;
        let public = BlsPublicKey(secret.sk_to_pk().to_bytes());
        Ok(Self { secret, public })
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> BlsSignature {
        BlsSignature(self.secret.sign(message, DST, &[]).to_bytes())
    }

    /// The public half.
    pub fn public_key(&self) -> BlsPublicKey {
        self.public
    }
}

impl fmt::Debug for BlsPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}

impl fmt::Debug for BlsSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}

impl fmt::Debug for BlsKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlsKeyPair")
            .field("public", &self.public)
            .finish()
    }
}
