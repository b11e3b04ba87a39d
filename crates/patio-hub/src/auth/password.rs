//! Password hashing and verification using argon2id.

use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};

/// Hash a password using argon2id with a random salt.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Check a password against a stored hash. A malformed hash is an error,
/// a mismatch is `Ok(false)`.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
    let parsed = PasswordHash::new(hash)?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_never_the_cleartext() {
        let hash = hash_password("Secret_123").unwrap();
        assert_ne!(hash, "Secret_123");
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("Secret_123", &hash).unwrap());
        assert!(!verify_password("Secret_124", &hash).unwrap());
    }

    #[test]
    fn same_password_salts_differently() {
        assert_ne!(
            hash_password("Secret_123").unwrap(),
            hash_password("Secret_123").unwrap()
        );
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(verify_password("Secret_123", "plaintext").is_err());
    }
}
