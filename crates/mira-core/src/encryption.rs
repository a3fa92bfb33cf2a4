//! Encryption service for stored credentials (LLM keys, board tokens)

use crate::{AppError, Config};
use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose, Engine as _};

const NONCE_LEN: usize = 12;

/// Symmetric cipher for secrets at rest.
/// Uses AES-256-GCM for authenticated encryption; output is
/// `base64(nonce || ciphertext)`.
#[derive(Clone)]
pub struct EncryptionService {
    cipher: Aes256Gcm,
}

impl EncryptionService {
    /// Create a new encryption service from raw 32-byte key (e.g. for tests; avoids env mutation).
    pub fn from_key_bytes(key_bytes: &[u8]) -> Result<Self, AppError> {
        if key_bytes.len() != 32 {
            return Err(AppError::Config(
                "SECRETS_MASTER_KEY must decode to 32 bytes (256 bits)".to_string(),
            ));
        }
        let key = Key::<Aes256Gcm>::from_slice(key_bytes);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// Create from a base64 master key. Both the standard and the URL-safe
    /// alphabets are accepted.
    pub fn from_base64_key(encoded: &str) -> Result<Self, AppError> {
        let encoded = encoded.trim();
        let key_bytes = general_purpose::STANDARD
            .decode(encoded)
            .or_else(|_| general_purpose::URL_SAFE.decode(encoded))
            .or_else(|_| general_purpose::URL_SAFE_NO_PAD.decode(encoded))
            .map_err(|e| {
                AppError::Config(format!("Failed to decode SECRETS_MASTER_KEY: {}", e))
            })?;

        Self::from_key_bytes(&key_bytes)
    }

    /// Build the process-wide cipher. A missing master key is a configuration
    /// error, reported before any secret is touched.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        Self::from_base64_key(config.require_secrets_master_key()?)
    }

    /// Encrypt a plaintext string
    pub fn encrypt(&self, plaintext: &str) -> Result<String, AppError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| AppError::Encryption(format!("Encryption failed: {}", e)))?;

        let mut combined = nonce.to_vec();
        combined.extend_from_slice(&ciphertext);

        Ok(general_purpose::STANDARD.encode(&combined))
    }

    /// Decrypt an encrypted string
    pub fn decrypt(&self, encrypted: &str) -> Result<String, AppError> {
        let combined = general_purpose::STANDARD
            .decode(encrypted)
            .map_err(|e| AppError::Encryption(format!("Failed to decode encrypted data: {}", e)))?;

        if combined.len() < NONCE_LEN {
            return Err(AppError::Encryption("Encrypted data too short".to_string()));
        }

        let nonce = Nonce::from_slice(&combined[..NONCE_LEN]);
        let ciphertext = &combined[NONCE_LEN..];

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| AppError::Encryption(format!("Decryption failed: {}", e)))?;

        String::from_utf8(plaintext)
            .map_err(|e| AppError::Encryption(format!("Invalid UTF-8 in decrypted data: {}", e)))
    }
}
