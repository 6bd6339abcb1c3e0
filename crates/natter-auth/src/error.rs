use thiserror::Error;

/// Failures of token verification (and, rarely, issuance).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Malformed token, wrong key, tampered or truncated ciphertext, or a token
    /// presented before its not-before time.
    #[error("invalid token")]
    InvalidToken,

    #[error("token expired")]
    Expired,

    #[error("failed to issue token: {0}")]
    Issue(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("no token key configured")]
    Missing,

    #[error("token key is not valid base64")]
    Malformed,

    #[error("token key must be {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("failed to hash password: {0}")]
    Hashing(String),
}
