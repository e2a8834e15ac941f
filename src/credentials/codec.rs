//! At-rest sealing of secret material using AES-256-GCM.
//!
//! Each value is sealed with a fresh random nonce. The sealed form is a single
//! base64 blob of `nonce || ciphertext` so the store can treat it as one
//! opaque column.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

/// Size of the master key in bytes (256 bits)
const KEY_SIZE: usize = 32;

/// Size of the GCM nonce in bytes (96 bits)
const NONCE_SIZE: usize = 12;

/// Seals and opens secret values for at-rest storage.
///
/// The master key is provided base64-encoded (from config or environment) and
/// lives in memory only.
#[derive(Clone)]
pub struct SecretCodec {
    key: Vec<u8>,
}

impl SecretCodec {
    /// Creates a codec from a base64-encoded 32-byte master key.
    pub fn from_base64_key(key_base64: &str) -> Result<Self> {
        let key = BASE64
            .decode(key_base64)
            .context("Failed to decode base64 encryption key")?;

        if key.len() != KEY_SIZE {
            return Err(anyhow!(
                "Encryption key must be {} bytes (256 bits), got {} bytes",
                KEY_SIZE,
                key.len()
            ));
        }

        Ok(Self { key })
    }

    /// Seals a secret value. Returns a base64 blob of `nonce || ciphertext`.
    pub fn seal(&self, plaintext: &str) -> Result<String> {
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| anyhow!("Failed to create cipher: {}", e))?;

        // Fresh random nonce per seal (never reuse)
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| anyhow!("Encryption failed: {}", e))?;

        let mut blob = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        blob.extend_from_slice(nonce.as_slice());
        blob.extend_from_slice(&ciphertext);

        Ok(BASE64.encode(&blob))
    }

    /// Opens a sealed blob produced by [`seal`](Self::seal).
    ///
    /// Fails if the blob was sealed with a different key, is truncated, or was
    /// tampered with (GCM authentication).
    pub fn open(&self, sealed: &str) -> Result<String> {
        let blob = BASE64
            .decode(sealed)
            .context("Failed to decode sealed secret")?;

        if blob.len() <= NONCE_SIZE {
            return Err(anyhow!(
                "Sealed secret too short: {} bytes, need more than {}",
                blob.len(),
                NONCE_SIZE
            ));
        }

        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_SIZE);

        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| anyhow!("Failed to create cipher: {}", e))?;

        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| anyhow!("Decryption failed (wrong key or corrupted data): {}", e))?;

        String::from_utf8(plaintext).context("Unsealed data is not valid UTF-8")
    }
}
