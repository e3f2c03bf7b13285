//! Password hashing and verification for gatekeep.
//!
//! Uses Argon2id with an explicit per-account salt. The digest is the raw
//! Argon2 output, so hashing the same password with the same salt and
//! parameters always yields the same bytes.

use argon2::password_hash::Output;
use argon2::{Algorithm, Argon2, Params, Version};
use rand_core::{OsRng, RngCore};
use thiserror::Error;

use crate::config::HashingConfig;

/// Password-related errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PasswordError {
    /// The configured Argon2 parameters are unusable.
    #[error("invalid hashing parameters: {0}")]
    InvalidParams(String),

    /// Password hashing failed.
    #[error("password hashing failed: {0}")]
    HashError(String),
}

/// Argon2id hasher carrying its cost parameters and salt length.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    params: Params,
    salt_len: usize,
    max_concurrent: usize,
}

impl PasswordHasher {
    /// Build a hasher from configuration.
    pub fn new(config: &HashingConfig) -> Result<Self, PasswordError> {
        let params = Params::new(
            config.memory_kib,
            config.iterations,
            config.parallelism,
            Some(config.output_len),
        )
        .map_err(|e| PasswordError::InvalidParams(e.to_string()))?;

        if config.salt_len < argon2::MIN_SALT_LEN {
            return Err(PasswordError::InvalidParams(format!(
                "salt must be at least {} bytes",
                argon2::MIN_SALT_LEN
            )));
        }

        Ok(Self {
            params,
            salt_len: config.salt_len,
            max_concurrent: config.concurrency_limit(),
        })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Length of the digests this hasher produces.
    pub fn output_len(&self) -> usize {
        self.params.output_len().unwrap_or(Params::DEFAULT_OUTPUT_LEN)
    }

    /// Number of hashes allowed to run at the same time.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Generate a fresh random salt from the OS CSPRNG.
    pub fn generate_salt(&self) -> Vec<u8> {
        let mut salt = vec![0u8; self.salt_len];
        OsRng.fill_bytes(&mut salt);
        salt
    }

    /// Hash a password with the given salt.
    ///
    /// Deterministic for a fixed password, salt and parameter set.
    pub fn hash(&self, password: &str, salt: &[u8]) -> Result<Vec<u8>, PasswordError> {
        let mut digest = vec![0u8; self.output_len()];
        self.argon2()
            .hash_password_into(password.as_bytes(), salt, &mut digest)
            .map_err(|e| PasswordError::HashError(e.to_string()))?;
        Ok(digest)
    }

    /// Verify a password against a stored digest.
    ///
    /// The recomputed digest is compared in constant time. Any hashing
    /// failure or malformed digest counts as a mismatch.
    pub fn verify(&self, password: &str, salt: &[u8], digest: &[u8]) -> bool {
        let Ok(computed) = self.hash(password, salt) else {
            return false;
        };
        match (Output::new(&computed), Output::new(digest)) {
            // `Output`'s equality is constant-time.
            (Ok(computed), Ok(stored)) => computed == stored,
            _ => false,
        }
    }
}
