//! Profile endpoints. The read path lazily creates a missing profile for
//! an existing user, which self-heals the best-effort creation at signup.

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::auth::middleware::SessionUser;
use crate::auth::policy::ensure_profile;
use crate::db::{ProfileResponse, UpdateProfileRequest};
use crate::AppState;

use super::error::ApiError;

/// Fetch a public profile by username
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> Result<Json<ProfileResponse>, ApiError> {
    if let Some(profile) = state.store.find_profile_by_username(&username).await? {
        return Ok(Json(profile.into()));
    }

    // No profile row, but the user may exist: create the missing profile
    // on first visit (tolerating a concurrent winner).
    let user = state
        .store
        .find_user_by_username(&username)
        .await?
        .ok_or_else(|| ApiError::not_found("Profile not found"))?;
    let profile = ensure_profile(&state.store, &user).await?;
    Ok(Json(profile.into()))
}

/// Update the caller's bio and avatar
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    user: SessionUser,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>, ApiError> {
    if let Some(bio) = &request.bio {
        if bio.len() > 500 {
            return Err(ApiError::validation_field("bio", "Bio is too long (max 500 characters)"));
        }
    }

    let record = state
        .store
        .find_user_by_id(&user.id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Account no longer exists"))?;
    ensure_profile(&state.store, &record).await?;

    state
        .store
        .update_profile(&record.id, &request.bio, &request.avatar_url)
        .await?;

    let profile = state
        .store
        .find_profile_by_user_id(&record.id)
        .await?
        .ok_or_else(|| ApiError::internal("Profile disappeared during update"))?;
    Ok(Json(profile.into()))
}
