//! Account-recovery token flows.
//!
//! One engine behind three flows: password reset, password setup for
//! OAuth-only accounts, and username recovery. A token is 32 random
//! bytes, hex-encoded; only its sha256 digest is stored. At most one
//! token is live per (user, purpose) — issuing a new one displaces the
//! old. Redemption checks expiry and consumes the row by deletion, so a
//! token can never be replayed.

use chrono::{Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::config::Config;
use crate::db::{IdentityStore, RecoveryToken};
use crate::notifications::Mailer;

use super::adapter::{canonical_timestamp, parse_timestamp_str};
use super::password::hash_password;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryPurpose {
    PasswordReset,
    PasswordSetup,
}

impl RecoveryPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryPurpose::PasswordReset => "password_reset",
            RecoveryPurpose::PasswordSetup => "password_setup",
        }
    }

    /// Token lifetime. The reset and setup windows differ on purpose:
    /// each is a product decision, configurable independently.
    fn ttl_minutes(&self, config: &Config) -> i64 {
        match self {
            RecoveryPurpose::PasswordReset => config.auth.reset_token_ttl_minutes,
            RecoveryPurpose::PasswordSetup => config.auth.setup_token_ttl_minutes,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RecoveryError {
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
    #[error("invalid or expired token")]
    InvalidOrExpired,
    #[error("account already has a password")]
    AlreadyHasPassword,
    #[error("password hashing failed")]
    Hash,
    #[error("email delivery failed: {0}")]
    Email(anyhow::Error),
}

/// Generate a random token
pub fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

/// Hash a token for storage
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Issue a token for (user, purpose), displacing any prior one. Returns
/// the raw token; only its digest was persisted.
pub(crate) async fn issue_token(
    store: &IdentityStore,
    config: &Config,
    user_id: &str,
    purpose: RecoveryPurpose,
) -> Result<String, sqlx::Error> {
    let token = generate_token();
    let now = Utc::now();
    store
        .replace_recovery_token(&RecoveryToken {
            token_hash: hash_token(&token),
            user_id: user_id.to_string(),
            purpose: purpose.as_str().to_string(),
            expires_at: canonical_timestamp(&(now + Duration::minutes(purpose.ttl_minutes(config)))),
            created_at: canonical_timestamp(&now),
        })
        .await?;
    Ok(token)
}

/// Start a password reset. An unknown email returns Ok without sending
/// anything, so the endpoint reveals nothing about account existence.
pub async fn begin_password_reset(
    store: &IdentityStore,
    mailer: &Mailer,
    config: &Config,
    email: &str,
) -> Result<(), RecoveryError> {
    let email = email.trim().to_lowercase();
    let user = match store.find_user_by_email(&email).await? {
        Some(user) => user,
        None => {
            debug!("Password reset requested for unknown email");
            return Ok(());
        }
    };

    let token = issue_token(store, config, &user.id, RecoveryPurpose::PasswordReset).await?;
    let url = format!("{}/reset-password?token={}", config.base_origin(), token);
    mailer
        .send_password_reset(&user.email, &url, config.auth.reset_token_ttl_minutes)
        .await
        .map_err(RecoveryError::Email)?;
    info!(user_id = %user.id, "Issued password reset token");
    Ok(())
}

/// Start password setup for an OAuth-only account. An account that
/// already has a password gets a specific rejection so it is routed to
/// the reset flow instead of quietly acquiring a second one.
pub async fn begin_password_setup(
    store: &IdentityStore,
    mailer: &Mailer,
    config: &Config,
    email: &str,
) -> Result<(), RecoveryError> {
    let email = email.trim().to_lowercase();
    let user = match store.find_user_by_email(&email).await? {
        Some(user) => user,
        None => {
            debug!("Password setup requested for unknown email");
            return Ok(());
        }
    };
    if user.hashed_password.is_some() {
        return Err(RecoveryError::AlreadyHasPassword);
    }

    let token = issue_token(store, config, &user.id, RecoveryPurpose::PasswordSetup).await?;
    let url = format!("{}/set-password?token={}", config.base_origin(), token);
    mailer
        .send_password_setup(&user.email, &url, config.auth.setup_token_ttl_minutes)
        .await
        .map_err(RecoveryError::Email)?;
    info!(user_id = %user.id, "Issued password setup token");
    Ok(())
}

/// Redeem a recovery token: hash the presented token, check the row and
/// its expiry, set the new password, and delete the row. Absent and
/// expired are one indistinguishable error.
pub async fn redeem_password_token(
    store: &IdentityStore,
    purpose: RecoveryPurpose,
    token: &str,
    new_password: &str,
) -> Result<(), RecoveryError> {
    let row = store
        .find_recovery_token(&hash_token(token), purpose.as_str())
        .await?
        .ok_or(RecoveryError::InvalidOrExpired)?;

    let expires = parse_timestamp_str(&row.expires_at).ok_or(RecoveryError::InvalidOrExpired)?;
    if Utc::now() >= expires {
        return Err(RecoveryError::InvalidOrExpired);
    }

    let hashed = hash_password(new_password).map_err(|_| RecoveryError::Hash)?;
    store.set_user_password(&row.user_id, &hashed).await?;
    store.delete_recovery_token(&row.token_hash).await?;
    info!(user_id = %row.user_id, purpose = purpose.as_str(), "Recovery token redeemed");
    Ok(())
}

/// Email the account's username. No token involved; an unknown email is
/// indistinguishable from a known one.
pub async fn recover_username(
    store: &IdentityStore,
    mailer: &Mailer,
    email: &str,
) -> Result<(), RecoveryError> {
    let email = email.trim().to_lowercase();
    let user = match store.find_user_by_email(&email).await? {
        Some(user) => user,
        None => {
            debug!("Username recovery requested for unknown email");
            return Ok(());
        }
    };
    mailer
        .send_username_recovery(&user.email, &user.username)
        .await
        .map_err(RecoveryError::Email)?;
    Ok(())
}
