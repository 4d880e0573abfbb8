//! External OAuth account links.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Links one user to one external OAuth identity. The (provider,
/// provider_account_id) pair is unique; token material is write-once.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: String,
    pub user_id: String,
    pub provider: String,
    pub provider_account_id: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<String>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
    pub id_token: Option<String>,
}
