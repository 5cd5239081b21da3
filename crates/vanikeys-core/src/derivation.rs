//! Deterministic child key derivation.
//!
//! Children are derived by scalar tweak, so the public half of a child can be
//! computed from the parent public key alone:
//!
//! ```text
//!   t          = SHA-512(ser_P(parent_pub) || DOMAIN_TAG || ser_32(index))[..32]
//!   child_pub  = parent_pub + t*G        (searcher, from the Commitment)
//!   child_priv = parent_priv + t (mod n) (owner, from the Seed)
//! ```
//!
//! Both sides hash the same public parent point, which is what makes
//! `derive(Commitment, i) == public(derive(Seed, i))` hold for every index.

use hmac::{Hmac, Mac};
use secp256k1::{PublicKey, Scalar, Secp256k1, SecretKey, Verification};
use sha2::{Digest, Sha512};

use crate::types::{Commitment, DerivedKey, PathIndex, PrivateKey, Seed, VaniError, DOMAIN_TAG};

/// HMAC key used to turn a seed into the root scalar.
const ROOT_HMAC_KEY: &[u8] = b"vanikeys root";

/// Parent of a derivation step.
#[derive(Clone, Copy, Debug)]
pub enum Parent<'a> {
    /// Owner side: both halves of the child are obtainable.
    Seed(&'a Seed),
    /// Searcher side: only the public half is obtainable.
    Public(&'a Commitment),
}

impl<'a> From<&'a Seed> for Parent<'a> {
    fn from(seed: &'a Seed) -> Self {
        Parent::Seed(seed)
    }
}

impl<'a> From<&'a Commitment> for Parent<'a> {
    fn from(commitment: &'a Commitment) -> Self {
        Parent::Public(commitment)
    }
}

/// Map a seed to its root secret scalar.
///
/// HMAC-SHA512(key = "vanikeys root", data = seed), left half.
fn root_secret(seed: &Seed) -> Result<SecretKey, VaniError> {
    let mut mac = <Hmac<Sha512> as Mac>::new_from_slice(ROOT_HMAC_KEY)
        .map_err(|e| VaniError::InvalidParent(e.to_string()))?;
    mac.update(seed.as_bytes());
    let digest = mac.finalize().into_bytes();

    SecretKey::from_slice(&digest[..32])
        .map_err(|_| VaniError::InvalidParent("seed maps to an invalid root scalar".into()))
}

/// Compute the owner's commitment (root public key) from a seed.
pub fn commitment_from_seed(seed: &Seed) -> Result<Commitment, VaniError> {
    let secp = Secp256k1::signing_only();
    let root = root_secret(seed)?;
    Ok(Commitment::from(root.public_key(&secp)))
}

/// Compute the scalar tweak for `index` under `parent`.
pub fn compute_tweak(parent: &PublicKey, index: PathIndex) -> Result<Scalar, VaniError> {
    let mut hasher = Sha512::new();
    hasher.update(parent.serialize());
    hasher.update(DOMAIN_TAG);
    hasher.update(index.to_be_bytes());
    let digest = hasher.finalize();

    let mut il = [0u8; 32];
    il.copy_from_slice(&digest[..32]);
    Scalar::from_be_bytes(il).map_err(|_| VaniError::TweakOutOfRange)
}

/// Public-only child derivation with a caller-supplied context.
///
/// This is the hot path of the search engine; each worker keeps its own
/// verification context and calls this directly.
pub fn derive_public_with<C: Verification>(
    secp: &Secp256k1<C>,
    parent: &PublicKey,
    index: PathIndex,
) -> Result<PublicKey, VaniError> {
    let tweak = compute_tweak(parent, index)?;
    parent
        .add_exp_tweak(secp, &tweak)
        .map_err(|_| VaniError::TweakOutOfRange)
}

/// Searcher side: derive the child public key of a commitment.
pub fn derive_public(commitment: &Commitment, index: PathIndex) -> Result<PublicKey, VaniError> {
    let secp = Secp256k1::verification_only();
    derive_public_with(&secp, commitment.public_key(), index)
}

/// Owner side: derive the child key pair of a seed.
pub fn derive_private(seed: &Seed, index: PathIndex) -> Result<DerivedKey, VaniError> {
    let secp = Secp256k1::new();
    let root = root_secret(seed)?;
    let root_pub = root.public_key(&secp);

    let tweak = compute_tweak(&root_pub, index)?;
    let child = root
        .add_tweak(&tweak)
        .map_err(|_| VaniError::TweakOutOfRange)?;

    Ok(DerivedKey {
        path_index: index,
        public_key: child.public_key(&secp),
        private_key: Some(PrivateKey::new(child)),
    })
}

/// Derive the child at `index` from either kind of parent.
///
/// # Arguments
/// * `parent` - A seed (private derivation) or a commitment (public only)
/// * `index` - Position in the 32-bit path space
///
/// # Returns
/// The child public key, plus the private key when `parent` is a seed
///
/// # Errors
/// `TweakOutOfRange` for the rare index whose tweak is not a valid scalar
pub fn derive(parent: Parent<'_>, index: PathIndex) -> Result<DerivedKey, VaniError> {
    match parent {
        Parent::Seed(seed) => derive_private(seed, index),
        Parent::Public(commitment) => Ok(DerivedKey {
            path_index: index,
            public_key: derive_public(commitment, index)?,
            private_key: None,
        }),
    }
}

/// Resolve `start + offset` to a path index, refusing to leave the u32 space.
pub fn offset_index(start: PathIndex, offset: u64) -> Result<PathIndex, VaniError> {
    let index = u64::from(start)
        .checked_add(offset)
        .filter(|i| *i <= u64::from(u32::MAX))
        .ok_or(VaniError::IndexOutOfRange {
            start,
            budget: offset,
        })?;
    Ok(index as PathIndex)
}

/// Check that the window `[start, start + budget)` fits in the path space.
pub fn check_window(start: PathIndex, budget: u64) -> Result<(), VaniError> {
    if budget == 0 {
        return Ok(());
    }
    offset_index(start, budget - 1)
        .map(|_| ())
        .map_err(|_| VaniError::IndexOutOfRange { start, budget })
}
