//! One-time token rows.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Adapter-contract verification token (sign-in links, email
/// verification). Consumed by deletion.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct VerificationToken {
    pub identifier: String,
    pub token: String,
    pub expires: String,
}

/// Account-recovery token. Only the sha256 digest of the token is stored;
/// a row is valid iff it exists and has not expired, and redemption
/// deletes it.
#[derive(Debug, Clone, FromRow)]
pub struct RecoveryToken {
    pub token_hash: String,
    pub user_id: String,
    pub purpose: String,
    pub expires_at: String,
    pub created_at: String,
}
