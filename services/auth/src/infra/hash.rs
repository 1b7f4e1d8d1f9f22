use anyhow::anyhow;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngExt;

use crate::domain::repository::SecretHasher;
use crate::error::AuthServiceError;

/// Argon2id with default parameters, PHC string output.
#[derive(Clone, Default)]
pub struct Argon2Hasher {
    params: Params,
}

impl Argon2Hasher {
    /// Cheaper parameters for tests.
    pub fn with_params(params: Params) -> Self {
        Self { params }
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl SecretHasher for Argon2Hasher {
    fn hash(&self, secret: &str) -> Result<String, AuthServiceError> {
        let salt_bytes: [u8; 16] = rand::rng().random();
        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| anyhow!("failed to encode salt: {e}"))?;
        let hash = self
            .argon2()
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| anyhow!("failed to hash secret: {e}"))?;
        Ok(hash.to_string())
    }

    fn verify(&self, secret: &str, digest: &str) -> Result<bool, AuthServiceError> {
        let parsed =
            PasswordHash::new(digest).map_err(|e| anyhow!("stored hash is malformed: {e}"))?;
        // Parameters come from the PHC string, so digests from older params still verify.
        Ok(self
            .argon2()
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok())
    }
}
