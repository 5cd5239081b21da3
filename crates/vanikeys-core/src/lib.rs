//! VaniKeys Core
//!
//! Vanity key search by derivation path instead of key generation.
//!
//! The owner keeps a 32-byte `Seed` and publishes only its `Commitment` (the
//! root public key). A searcher walks path indices under that commitment,
//! deriving child public keys and matching their fingerprints against a
//! pattern. When it finds one, it returns the index with a `Proof`; the
//! owner verifies the proof and derives the matching private key locally.
//! The searcher never sees a secret.
//!
//! # Derivation
//!
//! secp256k1 with additive tweaks:
//! - root = HMAC-SHA512("vanikeys root", seed)[..32]
//! - t = SHA-512(parent_pub || DOMAIN_TAG || index)[..32]
//! - child_pub = parent_pub + t*G, child_priv = root + t
//!
//! # Fingerprints
//!
//! `SHA256:` + unpadded base64 of SHA-256 over the SSH-style key encoding.
//! Patterns match the 43-character body.

pub mod derivation;
pub mod encoding;
pub mod estimator;
pub mod matcher;
pub mod proof;
pub mod protocol;
pub mod search;
pub mod seed_store;
pub mod types;
mod wire;

pub use derivation::{commitment_from_seed, derive, derive_private, derive_public, Parent};
pub use encoding::{fingerprint, fingerprint_key, Fingerprint};
pub use estimator::{estimate, estimate_in_text, Difficulty, Estimate};
pub use matcher::{MatchResult, Pattern, PatternSpec, Rarity};
pub use proof::Proof;
pub use protocol::{submit, submit_with, verify_and_derive, verify_and_match};
pub use search::{
    CancelToken, SearchConfig, SearchMode, SearchOutcome, SearchProgress, SearchResult,
    SearchState, Searcher,
};
pub use seed_store::{decrypt_seed, encrypt_seed, EncryptedSeed, StoreError};
pub use types::*;
