//! Password hashing, isolated behind two functions so the rest of the
//! service never touches a raw argon2 type.

use crate::error::UsersError;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

/// Hash a plaintext password into a PHC-format string safe to persist.
///
/// # Errors
///
/// Returns [`UsersError::Hashing`] if the underlying KDF fails (practically
/// unreachable for well-formed input).
pub fn hash_password(plaintext: &str) -> Result<String, UsersError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| UsersError::Hashing(e.to_string()))
}

/// Verify a plaintext password against a stored PHC hash.
///
/// # Errors
///
/// Returns [`UsersError::InvalidCredentials`] if the password doesn't match
/// or the stored hash is malformed.
pub fn verify_password(plaintext: &str, stored_hash: &str) -> Result<(), UsersError> {
    let parsed = PasswordHash::new(stored_hash).map_err(|_| UsersError::InvalidCredentials)?;
    Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed)
        .map_err(|_| UsersError::InvalidCredentials)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_password_verifies_against_its_own_hash() {
        let hash = hash_password("correct-horse-battery").expect("hash");
        assert!(verify_password("correct-horse-battery", &hash).is_ok());
    }

    #[test]
    fn the_wrong_password_is_rejected() {
        let hash = hash_password("correct-horse-battery").expect("hash");
        assert!(verify_password("wrong-password", &hash).is_err());
    }
}
