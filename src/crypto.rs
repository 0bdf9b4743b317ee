//! Storage encryption for exchange credentials.
//!
//! API keys and secrets are encrypted at rest with AES-256-GCM under a
//! single master key. Values are stored as `ENC:v1:<b64 nonce>:<b64 ct>`
//! so plaintext and ciphertext rows can never be confused.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use thiserror::Error;
use zeroize::Zeroizing;

const STORAGE_PREFIX: &str = "ENC:v1:";
const STORAGE_DELIMITER: &str = ":";
const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid master key: {0}")]
    KeyFormat(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Invalid storage format")]
    InvalidStorageFormat,
}

/// Symmetric cipher over at-rest secret columns.
pub struct StorageCipher {
    key: Zeroizing<Vec<u8>>,
}

impl std::fmt::Debug for StorageCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageCipher")
            .field("key", &"<REDACTED>")
            .finish()
    }
}

impl StorageCipher {
    /// Build a cipher from a key string as configured in the environment.
    /// Accepts base64 or hex encodings of a 32-byte key; anything else is
    /// normalized through SHA-256.
    pub fn new(key_material: &str) -> Result<Self, CryptoError> {
        let trimmed = key_material.trim();
        if trimmed.is_empty() {
            return Err(CryptoError::KeyFormat("empty key".to_string()));
        }
        let key = Self::normalize_key(trimmed);
        Ok(Self {
            key: Zeroizing::new(key),
        })
    }

    fn normalize_key(value: &str) -> Vec<u8> {
        if let Ok(decoded) = STANDARD.decode(value) {
            if decoded.len() == 32 {
                return decoded;
            }
        }
        if let Ok(decoded) = hex::decode(value) {
            if decoded.len() == 32 {
                return decoded;
            }
        }
        let mut hasher = Sha256::new();
        hasher.update(value.as_bytes());
        hasher.finalize().to_vec()
    }

    pub fn is_encrypted_value(value: &str) -> bool {
        value.starts_with(STORAGE_PREFIX)
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }
        if Self::is_encrypted_value(plaintext) {
            return Ok(plaintext.to_string());
        }

        let key = Key::<Aes256Gcm>::from_slice(&self.key);
        let cipher = Aes256Gcm::new(key);

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        Ok(format!(
            "{}{}{}{}",
            STORAGE_PREFIX,
            STANDARD.encode(nonce_bytes),
            STORAGE_DELIMITER,
            STANDARD.encode(ciphertext)
        ))
    }

    pub fn decrypt(&self, value: &str) -> Result<Zeroizing<String>, CryptoError> {
        if value.is_empty() {
            return Ok(Zeroizing::new(String::new()));
        }
        if !Self::is_encrypted_value(value) {
            return Err(CryptoError::InvalidStorageFormat);
        }

        let payload = value.strip_prefix(STORAGE_PREFIX).unwrap_or(value);
        let parts: Vec<&str> = payload.splitn(2, STORAGE_DELIMITER).collect();
        if parts.len() != 2 {
            return Err(CryptoError::InvalidStorageFormat);
        }

        let nonce_bytes = STANDARD
            .decode(parts[0])
            .map_err(|_| CryptoError::InvalidStorageFormat)?;
        let ciphertext = STANDARD
            .decode(parts[1])
            .map_err(|_| CryptoError::InvalidStorageFormat)?;
        if nonce_bytes.len() != NONCE_LEN {
            return Err(CryptoError::InvalidStorageFormat);
        }

        let key = Key::<Aes256Gcm>::from_slice(&self.key);
        let cipher = Aes256Gcm::new(key);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let plaintext = cipher
            .decrypt(nonce, ciphertext.as_slice())
            .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;

        String::from_utf8(plaintext)
            .map(Zeroizing::new)
            .map_err(|e| CryptoError::DecryptionFailed(format!("Invalid UTF-8: {}", e)))
    }
}
