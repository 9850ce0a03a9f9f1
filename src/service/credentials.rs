use argon2::{
    password_hash::{PasswordHash, SaltString},
    Argon2, PasswordHasher, PasswordVerifier,
};
use rand::RngCore;

use crate::error::AppError;

pub trait CredentialHasher: Send + Sync {
    fn hash(&self, secret: &str) -> Result<String, AppError>;
    fn verify(&self, digest: &str, secret: &str) -> bool;
}

pub struct Argon2Hasher;

impl Argon2Hasher {
    pub fn new() -> Self {
        Self
    }
}

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, secret: &str) -> Result<String, AppError> {
        let mut salt = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt);
        let salt = SaltString::encode_b64(&salt)
            .map_err(|err| AppError::Credential(err.to_string()))?;
        let hash = Argon2::default()
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|err| AppError::Credential(err.to_string()))?
            .to_string();
        Ok(hash)
    }

    fn verify(&self, digest: &str, secret: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(digest) else {
            return false;
        };
        Argon2::default()
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok()
    }
}
