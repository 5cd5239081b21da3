//! Shared types for the VaniKeys core: the error taxonomy and the key
//! material that crosses component boundaries.
//!
//! `Seed` and `Commitment` are deliberately distinct types. The searcher only
//! ever holds a `Commitment`; every owner-side API takes a `Seed`, so one can
//! never be passed where the other is expected.

use std::fmt;

use secp256k1::{PublicKey, Secp256k1, SecretKey};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Protocol domain tag.
///
/// Versions the child derivation, the proof binding hash, and the fuzzy
/// substitution table together, so a change to any of them is a new protocol.
pub const DOMAIN_TAG: &[u8] = b"vanikeys-secp256k1-v1/fuzzy-v1";

/// Length of an owner seed in bytes.
pub const SEED_LEN: usize = 32;

/// Length of a compressed secp256k1 public key.
pub const PUBLIC_KEY_LEN: usize = 33;

/// A position in the derivation tree relative to a parent key.
pub type PathIndex = u32;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VaniError {
    #[error("Invalid parent key: {0}")]
    InvalidParent(String),
    #[error("Index window out of range: start {start} + budget {budget} exceeds the 32-bit path space")]
    IndexOutOfRange { start: u32, budget: u64 },
    #[error("Pattern has no substrings")]
    EmptyPattern,
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
    #[error("Derivation tweak out of range")]
    TweakOutOfRange,
    #[error("Verification failed: {0}")]
    VerificationFailed(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Unsupported proof version: {0}")]
    UnsupportedVersion(u8),
    #[error("Invalid search configuration: {0}")]
    InvalidConfig(String),
}

/// The owner's 32-byte root secret.
///
/// Never serialized, never sent to the searcher, zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Seed([u8; SEED_LEN]);

impl Seed {
    /// Generate a fresh seed from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SEED_LEN];
        rand::RngCore::fill_bytes(&mut rand::rngs::OsRng, &mut bytes);
        Seed(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, VaniError> {
        if bytes.len() != SEED_LEN {
            return Err(VaniError::InvalidParent(format!(
                "seed must be {} bytes, got {}",
                SEED_LEN,
                bytes.len()
            )));
        }
        let mut seed = [0u8; SEED_LEN];
        seed.copy_from_slice(bytes);
        Ok(Seed(seed))
    }

    pub fn as_bytes(&self) -> &[u8; SEED_LEN] {
        &self.0
    }
}

impl From<[u8; SEED_LEN]> for Seed {
    fn from(bytes: [u8; SEED_LEN]) -> Self {
        Seed(bytes)
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Seed(<redacted>)")
    }
}

/// The owner's root public key: the only seed-derived value the searcher sees.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Commitment(PublicKey);

impl Commitment {
    /// Parse a compressed (33-byte) or uncompressed (65-byte) SEC1 point.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, VaniError> {
        PublicKey::from_slice(bytes)
            .map(Commitment)
            .map_err(|e| VaniError::InvalidParent(e.to_string()))
    }

    pub fn from_hex(s: &str) -> Result<Self, VaniError> {
        let bytes = hex::decode(s.trim()).map_err(|e| VaniError::InvalidParent(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_LEN] {
        self.0.serialize()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.0
    }
}

impl From<PublicKey> for Commitment {
    fn from(pk: PublicKey) -> Self {
        Commitment(pk)
    }
}

/// A derived private key. Only ever produced on the owner side.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey(SecretKey);

impl PrivateKey {
    pub(crate) fn new(sk: SecretKey) -> Self {
        PrivateKey(sk)
    }

    pub fn public_key(&self) -> PublicKey {
        let secp = Secp256k1::signing_only();
        self.0.public_key(&secp)
    }

    pub fn secret_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.0.secret_bytes())
    }

    pub fn as_secret_key(&self) -> &SecretKey {
        &self.0
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}

/// A child key produced by applying a path index to a parent.
///
/// `private_key` is `Some` only when the parent was a `Seed`.
#[derive(Clone, Debug)]
pub struct DerivedKey {
    pub path_index: PathIndex,
    pub public_key: PublicKey,
    pub private_key: Option<PrivateKey>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_length_enforced() {
        assert!(Seed::from_bytes(&[7u8; 32]).is_ok());
        assert!(matches!(
            Seed::from_bytes(&[7u8; 31]),
            Err(VaniError::InvalidParent(_))
        ));
        assert!(Seed::from_bytes(&[7u8; 64]).is_err());
    }

    #[test]
    fn test_seed_debug_redacted() {
        let seed = Seed::from([0x42u8; 32]);
        let rendered = format!("{:?}", seed);
        assert_eq!(rendered, "Seed(<redacted>)");
        assert!(!rendered.contains("42"));
    }

    #[test]
    fn test_generated_seeds_differ() {
        let a = Seed::generate();
        let b = Seed::generate();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_commitment_rejects_garbage() {
        assert!(matches!(
            Commitment::from_bytes(&[0u8; 33]),
            Err(VaniError::InvalidParent(_))
        ));
        assert!(Commitment::from_bytes(&[]).is_err());
        assert!(Commitment::from_hex("zz").is_err());
    }

    #[test]
    fn test_commitment_hex_roundtrip() {
        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(&[0x11u8; 32]).unwrap();
        let commitment = Commitment::from(sk.public_key(&secp));

        let parsed = Commitment::from_hex(&commitment.to_hex()).unwrap();
        assert_eq!(parsed, commitment);
        assert_eq!(commitment.to_bytes().len(), PUBLIC_KEY_LEN);
    }
}
