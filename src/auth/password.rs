//! Argon2 credential storage for member accounts.

use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    /// Wrong password, or the account never set one.
    #[error("credentials do not match")]
    Mismatch,
    #[error("stored password hash is unreadable: {0}")]
    Unreadable(password_hash::Error),
    #[error("password hashing failed: {0}")]
    Hashing(password_hash::Error),
}

/// PHC-formatted argon2id hash with a fresh salt.
pub fn hash_password(plain: &str) -> Result<String, CredentialError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(CredentialError::Hashing)
}

/// Checks `plain` against the account's stored hash, if it has one.
pub fn check_credentials(plain: &str, stored: Option<&str>) -> Result<(), CredentialError> {
    let stored = stored.ok_or(CredentialError::Mismatch)?;
    let parsed = PasswordHash::new(stored).map_err(CredentialError::Unreadable)?;
    match Argon2::default().verify_password(plain.as_bytes(), &parsed) {
        Ok(()) => Ok(()),
        Err(password_hash::Error::Password) => Err(CredentialError::Mismatch),
        Err(e) => Err(CredentialError::Unreadable(e)),
    }
}
