//! Natter authentication core.
//!
//! - `password`: Argon2id hashing and verification of user passwords.
//! - `keys`: the process-wide 256-bit token key and how it is resolved from configuration.
//! - `token`: issue and verify AES-256-GCM sealed session tokens with an
//!   authenticated validity window.

pub mod error;
pub mod keys;
pub mod password;
pub mod token;

pub use error::{AuthError, KeyError, PasswordError};
pub use keys::{SigningKey, resolve_signing_key};
pub use password::PasswordHasher;
pub use token::TokenService;
