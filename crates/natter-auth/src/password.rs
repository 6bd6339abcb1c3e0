use argon2::{
    Argon2, PasswordHash, PasswordHasher as _, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use tracing::warn;

use crate::error::PasswordError;

/// Argon2id password hashing with a fresh salt per hash.
///
/// Default Argon2 parameters (19 MiB, 2 passes) put each call in the tens of
/// milliseconds. Run it off the async runtime.
#[derive(Debug, Clone, Default)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl PasswordHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash a password into a PHC string (algorithm, params, salt and hash).
    pub fn hash(&self, plaintext: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| PasswordError::Hashing(e.to_string()))?;
        Ok(hash.to_string())
    }

    /// Check a password against a stored PHC string.
    ///
    /// A mismatch is `false`, not an error. The comparison inside argon2 is
    /// constant-time.
    pub fn verify(&self, hashed: &str, plaintext: &str) -> bool {
        let parsed = match PasswordHash::new(hashed) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Stored password hash is unparseable: {}", e);
                return false;
            }
        };

        self.argon2
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok()
    }

    /// Burn the same work as a real verification for a login against an
    /// unknown username. Always returns `false`.
    pub fn verify_dummy(&self, plaintext: &str) -> bool {
        let _ = self.hash(plaintext);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hasher = PasswordHasher::new();
        let hash = hasher.hash("correct horse battery").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify(&hash, "correct horse battery"));
        assert!(!hasher.verify(&hash, "correct horse batterz"));
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let hasher = PasswordHasher::new();
        let a = hasher.hash("hunter22").unwrap();
        let b = hasher.hash("hunter22").unwrap();
        assert_ne!(a, b);
        assert!(hasher.verify(&a, "hunter22"));
        assert!(hasher.verify(&b, "hunter22"));
    }

    #[test]
    fn garbage_hash_is_a_mismatch() {
        let hasher = PasswordHasher::new();
        assert!(!hasher.verify("not-a-phc-string", "whatever"));
        assert!(!hasher.verify("", ""));
    }

    #[test]
    fn dummy_verification_never_succeeds() {
        assert!(!PasswordHasher::new().verify_dummy("anything"));
    }
}
