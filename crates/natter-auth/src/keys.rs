use std::fmt;

use aes_gcm::aead::OsRng;
use aes_gcm::aead::rand_core::RngCore;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use tracing::warn;

use crate::error::KeyError;

/// AES-256-GCM key length.
pub const KEY_LEN: usize = 32;

/// Symmetric key every session token is sealed under.
///
/// Built once at startup and handed to [`crate::TokenService`]; there is no
/// global lookup. Rotating it invalidates every outstanding token.
#[derive(Clone)]
pub struct SigningKey {
    bytes: [u8; KEY_LEN],
}

impl SigningKey {
    /// Generate a random 256-bit key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let bytes: [u8; KEY_LEN] = bytes.try_into().map_err(|_| KeyError::InvalidLength {
            expected: KEY_LEN,
            actual: bytes.len(),
        })?;
        Ok(Self { bytes })
    }

    /// Decode a base64 key.
    pub fn from_base64(encoded: &str) -> Result<Self, KeyError> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|_| KeyError::Malformed)?;
        Self::from_bytes(&bytes)
    }

    /// Encode the key to base64, e.g. for a generated `.env` entry.
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.bytes)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey").field("bytes", &"[REDACTED]").finish()
    }
}

/// Resolve the token key from configuration.
///
/// A missing or invalid key is an error unless `allow_ephemeral` is set, in
/// which case a random key is generated for this process only.
pub fn resolve_signing_key(
    configured: Option<&str>,
    allow_ephemeral: bool,
) -> Result<SigningKey, KeyError> {
    let result = match configured {
        Some(encoded) if !encoded.trim().is_empty() => SigningKey::from_base64(encoded),
        _ => Err(KeyError::Missing),
    };

    match result {
        Ok(key) => Ok(key),
        Err(e) if allow_ephemeral => {
            warn!(
                "Token key unusable ({}); generated an EPHEMERAL key. Every token issued \
                 before this restart, and every token from other instances, will be rejected.",
                e
            );
            Ok(SigningKey::generate())
        }
        Err(e) => Err(e),
    }
}
