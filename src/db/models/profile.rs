//! Profile models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Public-facing companion to a user row, 1:1 by user_id.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub id: String,
    pub user_id: String,
    pub username: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileResponse {
    pub username: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
}

impl From<Profile> for ProfileResponse {
    fn from(profile: Profile) -> Self {
        Self {
            username: profile.username,
            avatar_url: profile.avatar_url,
            bio: profile.bio,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeUsernameRequest {
    #[serde(rename = "newUsername")]
    pub new_username: String,
}

#[derive(Debug, Serialize)]
pub struct ChangeUsernameResponse {
    pub success: bool,
    pub username: String,
}
