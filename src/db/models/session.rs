//! Server-side session rows.
//!
//! The deployed session strategy is a signed cookie; these rows back the
//! adapter's database-session mode and are not read on the request path.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub id: String,
    pub session_token: String,
    pub user_id: String,
    pub expires: String,
}
