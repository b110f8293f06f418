//! Authenticated field encryption using AES-256-GCM.
//!
//! Sealed values are `nonce || ciphertext+tag`, with a fresh random 96-bit
//! nonce per call. This is for confidentiality of stored fields; passwords go
//! through [`super::password`] instead.

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use rand::RngCore;

use crate::AuthResult;
use crate::error::AuthError;

/// Nonce size for AES-256-GCM (96 bits)
pub const NONCE_SIZE: usize = 12;

/// Key size for AES-256 (256 bits)
pub const KEY_SIZE: usize = 32;

/// AES-256-GCM sealer bound to one key.
#[derive(Clone)]
pub struct FieldCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for FieldCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldCipher").field("key", &"<redacted>").finish()
    }
}

impl FieldCipher {
    /// Creates a cipher from a 32-byte key.
    #[must_use]
    pub fn new(key: &[u8; KEY_SIZE]) -> Self {
        Self {
            cipher: Aes256Gcm::new(key.into()),
        }
    }

    /// Parses a key from a hex or base64 string.
    pub fn from_encoded_key(encoded: &str) -> AuthResult<Self> {
        let encoded = encoded.trim();
        let bytes = if encoded.len() == KEY_SIZE * 2 {
            hex::decode(encoded)
                .map_err(|e| AuthError::validation(format!("invalid hex key: {e}")))?
        } else {
            BASE64
                .decode(encoded)
                .map_err(|e| AuthError::validation(format!("invalid base64 key: {e}")))?
        };
        let key: [u8; KEY_SIZE] = bytes.as_slice().try_into().map_err(|_| {
            AuthError::validation(format!("key must be {KEY_SIZE} bytes, got {}", bytes.len()))
        })?;
        Ok(Self::new(&key))
    }

    /// Generates a new random key.
    #[must_use]
    pub fn generate_key() -> [u8; KEY_SIZE] {
        let mut key = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut key);
        key
    }

    /// Encrypts `plaintext`, returning `nonce || ciphertext`.
    pub fn seal(&self, plaintext: &[u8]) -> AuthResult<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| AuthError::internal(format!("encryption failed: {e}")))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    /// Decrypts a value produced by [`seal`](Self::seal).
    ///
    /// # Errors
    /// Returns `Validation` when the input is too short or fails
    /// authentication (wrong key or tampered data).
    pub fn open(&self, sealed: &[u8]) -> AuthResult<Vec<u8>> {
        if sealed.len() < NONCE_SIZE {
            return Err(AuthError::validation("sealed value is shorter than a nonce"));
        }
        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);
        self.cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| AuthError::validation("sealed value failed authentication"))
    }

    /// Encrypts a string and base64-encodes the result for text columns.
    pub fn seal_string(&self, plaintext: &str) -> AuthResult<String> {
        Ok(BASE64.encode(self.seal(plaintext.as_bytes())?))
    }

    /// Reverses [`seal_string`](Self::seal_string).
    pub fn open_string(&self, sealed: &str) -> AuthResult<String> {
        let bytes = BASE64
            .decode(sealed)
            .map_err(|e| AuthError::validation(format!("invalid ciphertext base64: {e}")))?;
        String::from_utf8(self.open(&bytes)?)
            .map_err(|e| AuthError::validation(format!("invalid UTF-8 in decrypted value: {e}")))
    }
}
