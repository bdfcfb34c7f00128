//! Argon2id implementation of `CredentialHasher`.
//!
//! Hashes are PHC strings, so the cost parameters travel with each hash and
//! old hashes keep verifying after the configured costs change.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use async_trait::async_trait;
use domains::{CredentialHasher, DomainError, Result};
use tracing::warn;

#[derive(Clone, Default)]
pub struct Argon2Hasher {
    params: Params,
}

impl Argon2Hasher {
    /// Memory cost in KiB, iteration count and lane count.
    pub fn from_costs(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| DomainError::validation(format!("Invalid argon2 parameters: {e}")))?;
        Ok(Self { params })
    }

    fn engine(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

#[async_trait]
impl CredentialHasher for Argon2Hasher {
    async fn hash(&self, password: &str) -> Result<String> {
        let engine = self.engine();
        let password = password.to_owned();
        // Hashing is deliberately slow; keep it off the async workers.
        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            engine
                .hash_password(password.as_bytes(), &salt)
                .map(|hash| hash.to_string())
                .map_err(DomainError::internal)
        })
        .await
        .map_err(DomainError::internal)?
    }

    /// A hash that does not parse never verifies.
    async fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        let engine = self.engine();
        let password = password.to_owned();
        let hash = hash.to_owned();
        tokio::task::spawn_blocking(move || {
            let parsed = match PasswordHash::new(&hash) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!(error = %e, "stored password hash is malformed");
                    return false;
                }
            };
            engine.verify_password(password.as_bytes(), &parsed).is_ok()
        })
        .await
        .map_err(DomainError::internal)
    }
}
