//! Proofs binding a found path index to the owner's commitment.
//!
//! The searcher builds a `Proof` from public material only. The owner checks
//! it against their own seed before deriving any private key:
//!
//! 1. the commitment in the proof is the owner's own,
//! 2. re-deriving `path_index` yields exactly `child_public`,
//! 3. `binding_hash` recomputes to the same value.
//!
//! Any failed check is fatal for that proof.

use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::derivation::{commitment_from_seed, derive_private, derive_public, Parent};
use crate::encoding::{fingerprint_key, Fingerprint};
use crate::types::{Commitment, PathIndex, VaniError, DOMAIN_TAG, PUBLIC_KEY_LEN};
use crate::wire;

/// Current proof format version.
pub const PROOF_VERSION: u8 = 1;

/// `SHA-256(commitment || ser_32(index) || DOMAIN_TAG)`
pub fn binding_hash(commitment: &Commitment, index: PathIndex) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(commitment.to_bytes());
    hasher.update(index.to_be_bytes());
    hasher.update(DOMAIN_TAG);
    hasher.finalize().into()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Proof {
    pub version: u8,
    pub commitment: Commitment,
    pub path_index: PathIndex,
    pub child_public: PublicKey,
    pub binding_hash: [u8; 32],
}

/// JSON transport form, every key field hex-encoded.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SerializedProof {
    pub version: u8,
    /// Hex-encoded compressed commitment
    pub commitment: String,
    pub path_index: u32,
    /// Hex-encoded compressed child public key
    pub child_public: String,
    /// Hex-encoded SHA-256 binding hash
    pub binding_hash: String,
}

fn fail(msg: impl Into<String>) -> VaniError {
    VaniError::VerificationFailed(msg.into())
}

fn public_key_field(bytes: &[u8], what: &str) -> Result<PublicKey, VaniError> {
    if bytes.len() != PUBLIC_KEY_LEN {
        return Err(VaniError::Serialization(format!(
            "{} must be {} bytes, got {}",
            what,
            PUBLIC_KEY_LEN,
            bytes.len()
        )));
    }
    PublicKey::from_slice(bytes).map_err(|e| VaniError::Serialization(format!("{}: {}", what, e)))
}

fn hash_field(bytes: &[u8]) -> Result<[u8; 32], VaniError> {
    bytes.try_into().map_err(|_| {
        VaniError::Serialization(format!("binding hash must be 32 bytes, got {}", bytes.len()))
    })
}

impl Proof {
    /// Build a proof from public material. Searcher side.
    ///
    /// # Arguments
    /// * `commitment` - The parent commitment the search ran under
    /// * `path_index` - The qualifying index
    /// * `child_public` - The key derived at `path_index`
    ///
    /// # Returns
    /// A version 1 proof whose binding hash ties `path_index` to `commitment`
    pub fn generate(commitment: &Commitment, path_index: PathIndex, child_public: PublicKey) -> Self {
        Proof {
            version: PROOF_VERSION,
            commitment: *commitment,
            path_index,
            child_public,
            binding_hash: binding_hash(commitment, path_index),
        }
    }

    /// Check the proof against a parent.
    ///
    /// With `Parent::Seed` this is the full owner check: the commitment is
    /// recomputed from the seed rather than trusted from the proof. With
    /// `Parent::Public` only public consistency is checked.
    pub fn verify(&self, parent: Parent<'_>) -> Result<(), VaniError> {
        if self.version != PROOF_VERSION {
            return Err(VaniError::UnsupportedVersion(self.version));
        }

        let (commitment, derived) = match parent {
            Parent::Seed(seed) => {
                let own = commitment_from_seed(seed)?;
                if own != self.commitment {
                    return Err(fail("proof was issued for a different commitment"));
                }
                let child = derive_private(seed, self.path_index).map_err(|e| {
                    fail(format!("cannot derive index {}: {}", self.path_index, e))
                })?;
                (own, child.public_key)
            }
            Parent::Public(commitment) => {
                if *commitment != self.commitment {
                    return Err(fail("proof was issued for a different commitment"));
                }
                let child = derive_public(commitment, self.path_index).map_err(|e| {
                    fail(format!("cannot derive index {}: {}", self.path_index, e))
                })?;
                (*commitment, child)
            }
        };

        if derived != self.child_public {
            return Err(fail(format!(
                "child public key at index {} does not match",
                self.path_index
            )));
        }
        if binding_hash(&commitment, self.path_index) != self.binding_hash {
            return Err(fail("binding hash mismatch"));
        }
        Ok(())
    }

    /// `verify` as a plain yes/no.
    pub fn is_valid(&self, parent: Parent<'_>) -> bool {
        self.verify(parent).is_ok()
    }

    /// Fingerprint of the claimed child key.
    pub fn fingerprint(&self) -> Fingerprint {
        fingerprint_key(&self.child_public)
    }

    /// Flat binary form: version, commitment, index, child, binding hash.
    pub fn to_wire(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + 4 + 33 + 4 + 4 + 33 + 4 + 32);
        out.push(self.version);
        wire::put_bytes(&mut out, &self.commitment.to_bytes());
        out.extend_from_slice(&self.path_index.to_be_bytes());
        wire::put_bytes(&mut out, &self.child_public.serialize());
        wire::put_bytes(&mut out, &self.binding_hash);
        out
    }

    pub fn from_wire(bytes: &[u8]) -> Result<Self, VaniError> {
        let mut r = wire::Reader::new(bytes);
        let version = r.u8("version")?;
        if version != PROOF_VERSION {
            return Err(VaniError::UnsupportedVersion(version));
        }
        let commitment = Commitment::from(public_key_field(r.bytes("commitment")?, "commitment")?);
        let path_index = r.u32("path index")?;
        let child_public = public_key_field(r.bytes("child public key")?, "child public key")?;
        let binding_hash = hash_field(r.bytes("binding hash")?)?;
        r.finish()?;

        Ok(Proof {
            version,
            commitment,
            path_index,
            child_public,
            binding_hash,
        })
    }

    pub fn to_serialized(&self) -> SerializedProof {
        SerializedProof {
            version: self.version,
            commitment: self.commitment.to_hex(),
            path_index: self.path_index,
            child_public: hex::encode(self.child_public.serialize()),
            binding_hash: hex::encode(self.binding_hash),
        }
    }

    pub fn from_serialized(s: &SerializedProof) -> Result<Self, VaniError> {
        if s.version != PROOF_VERSION {
            return Err(VaniError::UnsupportedVersion(s.version));
        }
        let commitment_bytes = hex::decode(&s.commitment)
            .map_err(|e| VaniError::Serialization(format!("commitment hex: {}", e)))?;
        let child_bytes = hex::decode(&s.child_public)
            .map_err(|e| VaniError::Serialization(format!("child public hex: {}", e)))?;
        let hash_bytes = hex::decode(&s.binding_hash)
            .map_err(|e| VaniError::Serialization(format!("binding hash hex: {}", e)))?;

        Ok(Proof {
            version: s.version,
            commitment: Commitment::from(public_key_field(&commitment_bytes, "commitment")?),
            path_index: s.path_index,
            child_public: public_key_field(&child_bytes, "child public key")?,
            binding_hash: hash_field(&hash_bytes)?,
        })
    }

    pub fn to_json(&self) -> Result<String, VaniError> {
        serde_json::to_string(&self.to_serialized())
            .map_err(|e| VaniError::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, VaniError> {
        let s: SerializedProof =
            serde_json::from_str(json).map_err(|e| VaniError::Serialization(e.to_string()))?;
        Self::from_serialized(&s)
    }
}
