//! Symmetric tokens for unsubscribe links.
//!
//! A token is the URL-safe base64 (no padding) encoding of
//! `nonce || ciphertext`, sealed with AES-256-GCM under a key derived from
//! the configured secret with SHA-256.

use std::fmt;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

use notify_core::error::AppError;
use notify_core::result::AppResult;
use notify_entity::preference::UnsubscribePatch;

/// AES-GCM nonce length in bytes.
const NONCE_LEN: usize = 12;

/// Encrypts and decrypts unsubscribe tokens.
#[derive(Clone)]
pub struct TokenCipher {
    cipher: Aes256Gcm,
}

impl fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCipher").finish_non_exhaustive()
    }
}

impl TokenCipher {
    /// Derive the key from a secret.
    pub fn new(secret: &str) -> Self {
        let digest = Sha256::digest(secret.as_bytes());
        let key = Key::<Aes256Gcm>::from_slice(&digest);
        Self {
            cipher: Aes256Gcm::new(key),
        }
    }

    /// Seal bytes into a token.
    pub fn encrypt(&self, plaintext: &[u8]) -> AppResult<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| AppError::internal("Token encryption failed"))?;
        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(sealed))
    }

    /// Open a token. Tampered or foreign tokens are `Forbidden`.
    pub fn decrypt(&self, token: &str) -> AppResult<Vec<u8>> {
        let sealed = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|_| AppError::forbidden("Malformed token"))?;
        if sealed.len() <= NONCE_LEN {
            return Err(AppError::forbidden("Malformed token"));
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| AppError::forbidden("Invalid token"))
    }

    /// Seal a string.
    pub fn encrypt_str(&self, plaintext: &str) -> AppResult<String> {
        self.encrypt(plaintext.as_bytes())
    }

    /// Open a token holding a UTF-8 string.
    pub fn decrypt_str(&self, token: &str) -> AppResult<String> {
        String::from_utf8(self.decrypt(token)?)
            .map_err(|_| AppError::forbidden("Token is not valid UTF-8"))
    }

    /// Seal a patch as JSON.
    pub fn encode_patch(&self, patch: &UnsubscribePatch) -> AppResult<String> {
        self.encrypt(&serde_json::to_vec(patch)?)
    }

    /// Open a patch token.
    pub fn decode_patch(&self, token: &str) -> AppResult<UnsubscribePatch> {
        serde_json::from_slice(&self.decrypt(token)?)
            .map_err(|_| AppError::forbidden("Token does not hold a preference patch"))
    }
}
