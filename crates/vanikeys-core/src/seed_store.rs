//! Password-protected seed storage for the owner side.
//!
//! Argon2id stretches the password into an AES-256-GCM key; the sealed seed
//! is stored as `salt (16) || nonce (12) || ciphertext + tag (32 + 16)`.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::types::{Seed, SEED_LEN};

/// Argon2id cost: 64 MiB, 3 passes, 4 lanes.
const ARGON2_M_COST: u32 = 65536;
const ARGON2_T_COST: u32 = 3;
const ARGON2_P_COST: u32 = 4;
const KEY_LEN: usize = 32;

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Exact length of a serialized `EncryptedSeed`.
pub const ENCRYPTED_SEED_LEN: usize = SALT_LEN + NONCE_LEN + SEED_LEN + TAG_LEN;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),
    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),
    #[error("Invalid encrypted seed format")]
    InvalidFormat,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedSeed {
    salt: [u8; SALT_LEN],
    nonce: [u8; NONCE_LEN],
    ciphertext: Vec<u8>,
}

impl EncryptedSeed {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(ENCRYPTED_SEED_LEN);
        bytes.extend_from_slice(&self.salt);
        bytes.extend_from_slice(&self.nonce);
        bytes.extend_from_slice(&self.ciphertext);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StoreError> {
        if bytes.len() != ENCRYPTED_SEED_LEN {
            return Err(StoreError::InvalidFormat);
        }

        let mut salt = [0u8; SALT_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        salt.copy_from_slice(&bytes[..SALT_LEN]);
        nonce.copy_from_slice(&bytes[SALT_LEN..SALT_LEN + NONCE_LEN]);

        Ok(EncryptedSeed {
            salt,
            nonce,
            ciphertext: bytes[SALT_LEN + NONCE_LEN..].to_vec(),
        })
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn from_hex(s: &str) -> Result<Self, StoreError> {
        let bytes = hex::decode(s.trim()).map_err(|_| StoreError::InvalidFormat)?;
        Self::from_bytes(&bytes)
    }
}

fn derive_key(
    password: &str,
    salt: &[u8; SALT_LEN],
) -> Result<Zeroizing<[u8; KEY_LEN]>, StoreError> {
    let params = Params::new(ARGON2_M_COST, ARGON2_T_COST, ARGON2_P_COST, Some(KEY_LEN))
        .map_err(|e| StoreError::KeyDerivationFailed(e.to_string()))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut key[..])
        .map_err(|e| StoreError::KeyDerivationFailed(e.to_string()))?;
    Ok(key)
}

/// Seal a seed under `password`. Fresh salt and nonce every call.
///
/// # Arguments
/// * `seed` - The 32-byte seed to encrypt
/// * `password` - User-provided password
///
/// # Returns
/// Encrypted seed that can be safely stored
pub fn encrypt_seed(seed: &Seed, password: &str) -> Result<EncryptedSeed, StoreError> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);

    let nonce_arr = Aes256Gcm::generate_nonce(&mut OsRng);
    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(&nonce_arr);

    let key = derive_key(password, &salt)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key[..]));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), seed.as_bytes().as_slice())
        .map_err(|e| StoreError::EncryptionFailed(e.to_string()))?;

    Ok(EncryptedSeed {
        salt,
        nonce,
        ciphertext,
    })
}

/// Open a sealed seed. A wrong password and a tampered blob look the same.
///
/// # Errors
/// Returns error if password is wrong or ciphertext is tampered
pub fn decrypt_seed(encrypted: &EncryptedSeed, password: &str) -> Result<Seed, StoreError> {
    let key = derive_key(password, &encrypted.salt)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key[..]));
    let plaintext = Zeroizing::new(
        cipher
            .decrypt(
                Nonce::from_slice(&encrypted.nonce),
                encrypted.ciphertext.as_slice(),
            )
            .map_err(|_| {
                StoreError::DecryptionFailed("wrong password or corrupted data".into())
            })?,
    );

    Seed::from_bytes(&plaintext)
        .map_err(|_| StoreError::DecryptionFailed("invalid seed length".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let seed = Seed::from([42u8; 32]);
        let encrypted = encrypt_seed(&seed, "correct horse battery staple").unwrap();
        let decrypted = decrypt_seed(&encrypted, "correct horse battery staple").unwrap();
        assert_eq!(decrypted.as_bytes(), seed.as_bytes());
    }

    #[test]
    fn test_wrong_password_fails() {
        let seed = Seed::from([42u8; 32]);
        let encrypted = encrypt_seed(&seed, "right").unwrap();
        assert!(matches!(
            decrypt_seed(&encrypted, "wrong"),
            Err(StoreError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn test_fresh_salt_and_nonce() {
        let seed = Seed::from([7u8; 32]);
        let a = encrypt_seed(&seed, "pw").unwrap();
        let b = encrypt_seed(&seed, "pw").unwrap();
        assert_ne!(a.to_bytes(), b.to_bytes());
    }

    #[test]
    fn test_serialized_layout() {
        let seed = Seed::from([1u8; 32]);
        let encrypted = encrypt_seed(&seed, "pw").unwrap();
        let bytes = encrypted.to_bytes();
        assert_eq!(bytes.len(), ENCRYPTED_SEED_LEN);

        let restored = EncryptedSeed::from_hex(&encrypted.to_hex()).unwrap();
        assert_eq!(restored, encrypted);
        assert_eq!(decrypt_seed(&restored, "pw").unwrap().as_bytes(), seed.as_bytes());
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let seed = Seed::from([42u8; 32]);
        let mut bytes = encrypt_seed(&seed, "pw").unwrap().to_bytes();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;

        let tampered = EncryptedSeed::from_bytes(&bytes).unwrap();
        assert!(decrypt_seed(&tampered, "pw").is_err());
    }

    #[test]
    fn test_bad_format_rejected() {
        assert_eq!(
            EncryptedSeed::from_bytes(&[0u8; 10]),
            Err(StoreError::InvalidFormat)
        );
        assert_eq!(
            EncryptedSeed::from_bytes(&[0u8; ENCRYPTED_SEED_LEN + 1]),
            Err(StoreError::InvalidFormat)
        );
        assert_eq!(EncryptedSeed::from_hex("xyz"), Err(StoreError::InvalidFormat));
    }
}
