//! Sealed session tokens.
//!
//! Wire format: `natter.v1.local.` followed by base64url (unpadded) of
//! `nonce (12 bytes) || ciphertext || tag (16 bytes)`.
//!
//! The plaintext is a JSON envelope carrying `iat`, `nbf` and `exp` next to
//! the serialized [`TokenPayload`]. The header is bound in as associated data.
//! Because the window lives inside the authenticated ciphertext, a holder
//! cannot read or extend it; the window is enforced as soon as the envelope
//! opens, and the payload's own `expire_at` is checked again afterwards.

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit, OsRng, Payload, rand_core::RngCore},
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD as B64URL};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use natter_types::api::TokenPayload;

use crate::error::AuthError;
use crate::keys::SigningKey;

const HEADER: &str = "natter.v1.local.";
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

#[derive(Serialize, Deserialize)]
struct Envelope {
    iat: DateTime<Utc>,
    nbf: DateTime<Utc>,
    exp: DateTime<Utc>,
    data: String,
}

/// Issues and verifies session tokens under one [`SigningKey`].
///
/// Holds no mutable state, so a single instance is shared across all requests.
#[derive(Debug, Clone)]
pub struct TokenService {
    key: SigningKey,
    lifetime: Duration,
}

impl TokenService {
    /// `lifetime` must be positive.
    pub fn new(key: SigningKey, lifetime: Duration) -> Self {
        Self { key, lifetime }
    }

    /// Lifetimes too large for a `Duration` saturate; `issue` then fails with
    /// `AuthError::Issue` instead of producing a token.
    pub fn with_lifetime_hours(key: SigningKey, hours: i64) -> Self {
        Self::new(key, Duration::try_hours(hours).unwrap_or(Duration::MAX))
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    pub fn issue(&self, user_id: i64, username: &str) -> Result<(String, TokenPayload), AuthError> {
        self.issue_at(Utc::now(), user_id, username)
    }

    /// Issue a token as if the current time were `now`.
    pub fn issue_at(
        &self,
        now: DateTime<Utc>,
        user_id: i64,
        username: &str,
    ) -> Result<(String, TokenPayload), AuthError> {
        let expire_at = now
            .checked_add_signed(self.lifetime)
            .ok_or_else(|| AuthError::Issue("token lifetime overflows the clock".into()))?;
        let payload = TokenPayload {
            user_id,
            username: username.to_string(),
            issued_at: now,
            expire_at,
        };

        let envelope = Envelope {
            iat: now,
            nbf: now,
            exp: payload.expire_at,
            data: serde_json::to_string(&payload).map_err(|e| AuthError::Issue(e.to_string()))?,
        };
        let plaintext =
            serde_json::to_vec(&envelope).map_err(|e| AuthError::Issue(e.to_string()))?;

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(self.key.as_bytes()));

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);

        let ciphertext = cipher
            .encrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload { msg: &plaintext, aad: HEADER.as_bytes() },
            )
            .map_err(|e| AuthError::Issue(e.to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);

        Ok((format!("{}{}", HEADER, B64URL.encode(sealed)), payload))
    }

    pub fn verify(&self, token: &str) -> Result<TokenPayload, AuthError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify a token as if the current time were `now`.
    ///
    /// Authentication runs before any time check: a forged or truncated
    /// token is always `InvalidToken`, never `Expired`.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<TokenPayload, AuthError> {
        let encoded = token.strip_prefix(HEADER).ok_or(AuthError::InvalidToken)?;
        let sealed = B64URL.decode(encoded).map_err(|_| AuthError::InvalidToken)?;
        if sealed.len() < NONCE_LEN + TAG_LEN {
            return Err(AuthError::InvalidToken);
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(self.key.as_bytes()));
        let plaintext = cipher
            .decrypt(
                Nonce::from_slice(nonce_bytes),
                Payload { msg: ciphertext, aad: HEADER.as_bytes() },
            )
            .map_err(|_| AuthError::InvalidToken)?;

        let envelope: Envelope =
            serde_json::from_slice(&plaintext).map_err(|_| AuthError::InvalidToken)?;
        if now < envelope.nbf {
            return Err(AuthError::InvalidToken);
        }
        if now > envelope.exp {
            return Err(AuthError::Expired);
        }

        let payload: TokenPayload =
            serde_json::from_str(&envelope.data).map_err(|_| AuthError::InvalidToken)?;
        if now > payload.expire_at {
            return Err(AuthError::Expired);
        }

        Ok(payload)
    }
}
