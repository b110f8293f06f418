//! Password hashing and verification.
//!
//! Passwords are stored as Argon2id PHC strings. The work factor is the
//! Argon2 time cost and must fall within
//! [`MIN_WORK_FACTOR`]`..=`[`MAX_WORK_FACTOR`]; anything else is rejected
//! before hashing.
//!
//! # Example
//!
//! ```
//! use tessera_auth::crypto::password::PasswordHasher;
//!
//! let hasher = PasswordHasher::new(1, 1024).unwrap();
//! let hash = hasher.hash("correct horse").unwrap();
//! assert!(hasher.verify("correct horse", &hash).unwrap());
//! assert!(!hasher.verify("battery staple", &hash).unwrap());
//! ```

use argon2::password_hash::{
    PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString, rand_core::OsRng,
};
use std::sync::{Arc, OnceLock};

use argon2::{Algorithm, Argon2, Params, Version};

use crate::AuthResult;
use crate::error::AuthError;

/// Lowest accepted Argon2 time cost.
pub const MIN_WORK_FACTOR: u32 = 1;

/// Highest accepted Argon2 time cost.
pub const MAX_WORK_FACTOR: u32 = 10;

/// Longest password accepted, in bytes.
pub const MAX_PASSWORD_LEN: usize = 1024;

const DECOY_PASSWORD: &str = "tessera-decoy-password";

/// Argon2id hasher with a fixed, validated work factor.
#[derive(Clone)]
pub struct PasswordHasher {
    params: Params,
    /// Hash of a throwaway password under `params`, made on first use.
    decoy: Arc<OnceLock<String>>,
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasher")
            .field("work_factor", &self.params.t_cost())
            .field("memory_kib", &self.params.m_cost())
            .finish()
    }
}

impl PasswordHasher {
    /// Creates a hasher with the given time cost and memory cost (KiB).
    ///
    /// # Errors
    /// Returns `Validation` when `work_factor` is outside the valid range or
    /// the memory cost is rejected by Argon2.
    pub fn new(work_factor: u32, memory_kib: u32) -> AuthResult<Self> {
        if !(MIN_WORK_FACTOR..=MAX_WORK_FACTOR).contains(&work_factor) {
            return Err(AuthError::validation(format!(
                "work factor {work_factor} outside {MIN_WORK_FACTOR}..={MAX_WORK_FACTOR}"
            )));
        }
        let params = Params::new(memory_kib, work_factor, Params::DEFAULT_P_COST, None)
            .map_err(|e| AuthError::validation(format!("invalid Argon2 parameters: {e}")))?;
        Ok(Self {
            params,
            decoy: Arc::new(OnceLock::new()),
        })
    }

    /// Returns the configured work factor.
    #[must_use]
    pub fn work_factor(&self) -> u32 {
        self.params.t_cost()
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hashes `password` with a fresh random salt.
    ///
    /// Hashing the same password twice yields different PHC strings.
    pub fn hash(&self, password: &str) -> AuthResult<String> {
        validate_password(password)?;
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::internal(format!("password hashing failed: {e}")))?;
        Ok(hash.to_string())
    }

    /// Verifies `password` against a stored PHC string.
    ///
    /// The comparison is constant-time. The parameters embedded in the stored
    /// hash are used, so hashes made under an older work factor still verify.
    ///
    /// # Errors
    /// Returns `Validation` only when `stored` is not a PHC string.
    pub fn verify(&self, password: &str, stored: &str) -> AuthResult<bool> {
        let parsed = PasswordHash::new(stored)
            .map_err(|e| AuthError::validation(format!("stored hash is malformed: {e}")))?;
        Ok(self
            .argon2()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }
}

impl PasswordHasher {
    /// Spends the same work as [`verify`](Self::verify) for an account that
    /// does not exist. Always `false`.
    /// Unknown-account rejections take as long as wrong-password ones.
    pub fn verify_absent(&self, password: &str) -> bool {
        match self.decoy_hash() {
            Some(stored) => {
                let _ = self.verify(password, stored);
            }
            None => tracing::warn!("decoy password hash unavailable"),
        }
        false
    }

    fn decoy_hash(&self) -> Option<&str> {
        if self.decoy.get().is_none() {
            let hash = self.hash(DECOY_PASSWORD).ok()?;
            let _ = self.decoy.set(hash);
        }
        self.decoy.get().map(String::as_str)
    }

    #[cfg(test)]
    pub(crate) fn has_decoy(&self) -> bool {
        self.decoy.get().is_some()
    }
}

fn validate_password(password: &str) -> AuthResult<()> {
    if password.is_empty() {
        return Err(AuthError::validation("password must not be empty"));
    }
    if password.len() > MAX_PASSWORD_LEN {
        return Err(AuthError::validation("password is too long"));
    }
    Ok(())
}
