//! Canonical public key encoding and fingerprints.
//!
//! Keys are encoded SSH-style: `string algorithm || string key`, where the key
//! is the 33-byte compressed SEC1 point. The fingerprint is the modern OpenSSH
//! form: `SHA256:` followed by unpadded base64 of the SHA-256 digest.

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine as _;
use secp256k1::PublicKey;
use sha2::{Digest, Sha256};

use crate::types::VaniError;
use crate::wire;

/// Algorithm identifier carried in the wire encoding.
pub const KEY_ALGORITHM: &str = "ecdsa-sha2-secp256k1";

/// Hash-algorithm prefix of every fingerprint.
pub const FINGERPRINT_PREFIX: &str = "SHA256:";

/// Characters in the searchable fingerprint body (32-byte digest, unpadded base64).
pub const FINGERPRINT_BODY_LEN: usize = 43;

/// Symbols that can appear in a fingerprint body.
pub const FINGERPRINT_ALPHABET_SIZE: u32 = 64;

/// Encode a public key in the canonical wire format.
pub fn encode(public_key: &PublicKey) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + KEY_ALGORITHM.len() + 4 + 33);
    wire::put_bytes(&mut out, KEY_ALGORITHM.as_bytes());
    wire::put_bytes(&mut out, &public_key.serialize());
    out
}

/// Parse the canonical wire format back into a public key.
pub fn decode(bytes: &[u8]) -> Result<PublicKey, VaniError> {
    let mut r = wire::Reader::new(bytes);
    let algorithm = r.bytes("algorithm")?;
    if algorithm != KEY_ALGORITHM.as_bytes() {
        return Err(VaniError::InvalidParent(format!(
            "unexpected key algorithm {:?}",
            String::from_utf8_lossy(algorithm)
        )));
    }
    let key = r.bytes("key")?;
    r.finish()?;
    PublicKey::from_slice(key).map_err(|e| VaniError::InvalidParent(e.to_string()))
}

/// A key fingerprint, e.g. `SHA256:Ab3x...`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Full display form, prefix included.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The part patterns are matched against (prefix stripped).
    pub fn body(&self) -> &str {
        &self.0[FINGERPRINT_PREFIX.len()..]
    }

    /// Parse a displayed fingerprint.
    pub fn parse(s: &str) -> Result<Self, VaniError> {
        let s = s.trim();
        let body = s
            .strip_prefix(FINGERPRINT_PREFIX)
            .ok_or_else(|| VaniError::Serialization("missing SHA256: prefix".into()))?;
        let digest = STANDARD_NO_PAD
            .decode(body)
            .map_err(|e| VaniError::Serialization(e.to_string()))?;
        if digest.len() != 32 {
            return Err(VaniError::Serialization(format!(
                "fingerprint digest is {} bytes",
                digest.len()
            )));
        }
        Ok(Fingerprint(s.to_string()))
    }

    /// The raw 32-byte digest.
    pub fn to_bytes(&self) -> Result<[u8; 32], VaniError> {
        let digest = STANDARD_NO_PAD
            .decode(self.body())
            .map_err(|e| VaniError::Serialization(e.to_string()))?;
        digest
            .try_into()
            .map_err(|_| VaniError::Serialization("fingerprint digest length".into()))
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fingerprint canonical bytes.
pub fn fingerprint(canonical: &[u8]) -> Fingerprint {
    let digest = Sha256::digest(canonical);
    let mut text = String::with_capacity(FINGERPRINT_PREFIX.len() + FINGERPRINT_BODY_LEN);
    text.push_str(FINGERPRINT_PREFIX);
    STANDARD_NO_PAD.encode_string(digest, &mut text);
    Fingerprint(text)
}

/// Encode and fingerprint in one step.
pub fn fingerprint_key(public_key: &PublicKey) -> Fingerprint {
    fingerprint(&encode(public_key))
}

/// `authorized_keys`-style export line: `<algorithm> <base64(wire)> [comment]`.
pub fn authorized_key_line(public_key: &PublicKey, comment: &str) -> String {
    let b64 = STANDARD.encode(encode(public_key));
    format!("{} {} {}", KEY_ALGORITHM, b64, comment)
        .trim_end()
        .to_string()
}
