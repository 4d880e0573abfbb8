//! Signed session tokens.
//!
//! Identity claims are stamped once at sign-in and reused until the token
//! expires or is renewed; nothing here touches storage. A renewal keeps
//! the claim snapshot and only moves the time window.

use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::db::User;

/// Session lifetime: 30 days.
pub const SESSION_MAX_AGE_SECS: i64 = 30 * 24 * 60 * 60;

/// Sliding-renewal threshold: re-issue the cookie once the token is more
/// than 24 hours old.
pub const RENEWAL_THRESHOLD_SECS: i64 = 24 * 60 * 60;

/// Identity claims embedded in the session cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    pub username: String,
    /// Whether the account has a password credential. Snapshotted at
    /// login; the middleware's password-setup gate keys off this.
    pub has_password: bool,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    /// Stamp identity claims for a freshly signed-in user.
    pub fn for_user(user: &User) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            picture: user.image.clone(),
            username: user.username.clone(),
            has_password: user.hashed_password.is_some(),
            iat: now,
            exp: now + SESSION_MAX_AGE_SECS,
        }
    }

    /// True once the token is old enough for sliding renewal.
    pub fn needs_renewal(&self) -> bool {
        Utc::now().timestamp() - self.iat > RENEWAL_THRESHOLD_SECS
    }

    /// Same claim snapshot, fresh time window.
    pub fn renewed(&self) -> Self {
        let now = Utc::now().timestamp();
        Self {
            iat: now,
            exp: now + SESSION_MAX_AGE_SECS,
            ..self.clone()
        }
    }
}

/// Encode claims into a signed token.
pub fn encode_session_token(
    claims: &Claims,
    secret: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Decode and verify a session token. Invalid signature, malformed input,
/// and expiry all collapse to `None` — the caller treats them as "no
/// session".
pub fn decode_session_token(token: &str, secret: &str) -> Option<Claims> {
    let validation = Validation::default();
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: "u1".to_string(),
            email: "alice@example.com".to_string(),
            name: Some("Alice".to_string()),
            username: "alice".to_string(),
            image: None,
            hashed_password: Some("$argon2id$stub".to_string()),
            email_verified: None,
            created_at: "2025-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_round_trip() {
        let claims = Claims::for_user(&sample_user());
        let token = encode_session_token(&claims, "secret").unwrap();
        let decoded = decode_session_token(&token, "secret").unwrap();
        assert_eq!(decoded.sub, "u1");
        assert_eq!(decoded.username, "alice");
        assert!(decoded.has_password);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let claims = Claims::for_user(&sample_user());
        let token = encode_session_token(&claims, "secret").unwrap();
        assert!(decode_session_token(&token, "other-secret").is_none());
    }

    #[test]
    fn test_expired_token_rejected() {
        let mut claims = Claims::for_user(&sample_user());
        claims.iat -= 2 * SESSION_MAX_AGE_SECS;
        claims.exp -= 2 * SESSION_MAX_AGE_SECS;
        let token = encode_session_token(&claims, "secret").unwrap();
        assert!(decode_session_token(&token, "secret").is_none());
    }

    #[test]
    fn test_renewal_preserves_claims() {
        let mut claims = Claims::for_user(&sample_user());
        claims.iat -= RENEWAL_THRESHOLD_SECS + 60;
        assert!(claims.needs_renewal());
        let renewed = claims.renewed();
        assert_eq!(renewed.sub, claims.sub);
        assert_eq!(renewed.has_password, claims.has_password);
        assert!(renewed.iat > claims.iat);
        assert!(!renewed.needs_renewal());
    }

    #[test]
    fn test_fresh_token_not_renewed() {
        let claims = Claims::for_user(&sample_user());
        assert!(!claims.needs_renewal());
    }
}
