/// Argon2id password hashing
use crate::error::{PortalError, PortalResult};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{Error, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use lazy_static::lazy_static;

lazy_static! {
    /// Hash compared against when the email is unknown, so both paths pay for
    /// one Argon2 verification
    static ref DUMMY_HASH: String =
        hash_password("barangay-portal-timing-equalizer").unwrap_or_default();
}

/// Hash a password into a PHC string with a fresh salt
pub fn hash_password(password: &str) -> PortalResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PortalError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against a stored PHC string
///
/// A mismatch is `Ok(false)`; a malformed hash is an error.
pub fn verify_password(password: &str, hash: &str) -> PortalResult<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| PortalError::Internal(format!("Stored password hash is invalid: {}", e)))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(Error::Password) => Ok(false),
        Err(e) => Err(PortalError::Internal(format!(
            "Password verification failed: {}",
            e
        ))),
    }
}

/// Burn one verification for an unknown account
pub fn verify_dummy(password: &str) {
    let _ = verify_password(password, &DUMMY_HASH);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));

        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_password("same").unwrap();
        let b = hash_password("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_hash_is_error() {
        assert!(matches!(
            verify_password("anything", "not-a-phc-string"),
            Err(PortalError::Internal(_))
        ));
    }

    #[test]
    fn test_dummy_verification_does_not_panic() {
        verify_dummy("whatever");
    }
}
