//! One-way salted password hashing.
//!
//! The algorithm is a pluggable primitive behind [`CredentialHasher`];
//! [`Argon2Hasher`] (Argon2id, default parameters, PHC string output) is the
//! one the server uses.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

use crate::account::CredentialHash;
use crate::error::Error;

/// Hashes and verifies local passwords.
///
/// Both calls are CPU-bound; async callers should run them on a blocking thread.
pub trait CredentialHasher: Send + Sync + 'static {
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the primitive fails.
    fn hash(&self, plaintext: &str) -> Result<CredentialHash, Error>;

    /// `Ok(false)` on mismatch; `Err` only when `hash` is unreadable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the stored hash cannot be parsed.
    fn verify(&self, plaintext: &str, hash: &CredentialHash) -> Result<bool, Error>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Argon2Hasher;

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, plaintext: &str) -> Result<CredentialHash, Error> {
        let salt = SaltString::generate(&mut OsRng);
        let phc = Argon2::default()
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| Error::Store(format!("failed to hash password: {e}")))?;
        Ok(CredentialHash::new(phc.to_string()))
    }

    fn verify(&self, plaintext: &str, hash: &CredentialHash) -> Result<bool, Error> {
        let parsed = PasswordHash::new(hash.as_str())
            .map_err(|e| Error::Store(format!("invalid password hash: {e}")))?;
        Ok(Argon2::default()
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_verifies_only_the_original() {
        let hasher = Argon2Hasher;
        let hash = hasher.hash("pw123").unwrap();
        assert!(hash.as_str().starts_with("$argon2id$"));
        assert!(hasher.verify("pw123", &hash).unwrap());
        assert!(!hasher.verify("pw124", &hash).unwrap());
    }

    #[test]
    fn test_hashes_are_salted() {
        let hasher = Argon2Hasher;
        let a = hasher.hash("same").unwrap();
        let b = hasher.hash("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_hash_is_an_error() {
        let hasher = Argon2Hasher;
        assert!(hasher.verify("x", &CredentialHash::new("not-a-phc")).is_err());
    }
}
