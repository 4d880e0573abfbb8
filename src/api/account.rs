//! Account management endpoints: username change, authenticated password
//! setup, the admin probe, and the admin user-delete path.

use axum::{
    extract::{Path, State},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::auth::adapter::IdentityAdapter;
use crate::auth::cookies;
use crate::auth::jwt::{encode_session_token, Claims};
use crate::auth::middleware::{require_admin, SessionUser};
use crate::auth::password::hash_password;
use crate::db::{ChangeUsernameRequest, ChangeUsernameResponse};
use crate::AppState;

use super::error::ApiError;
use super::validation::{validate_password, validate_username};

/// Change the caller's username. The denormalized copy on the profile row
/// and the user row must never diverge, so both updates run in one
/// transaction. The JWT keeps the old username until the next login —
/// claims are snapshotted at sign-in.
pub async fn change_username(
    State(state): State<Arc<AppState>>,
    user: SessionUser,
    Json(request): Json<ChangeUsernameRequest>,
) -> Result<Json<ChangeUsernameResponse>, ApiError> {
    let new_username = request.new_username.trim().to_string();
    validate_username(&new_username).map_err(|e| ApiError::validation_field("newUsername", e))?;

    // Both tables must independently reject a collision.
    if state
        .store
        .find_user_by_username(&new_username)
        .await?
        .is_some()
    {
        return Err(ApiError::conflict("Username is already taken"));
    }
    if state
        .store
        .find_profile_by_username(&new_username)
        .await?
        .is_some()
    {
        return Err(ApiError::conflict("Username is already taken"));
    }

    let mut tx = state.db.begin().await?;
    sqlx::query("UPDATE users SET username = ? WHERE id = ?")
        .bind(&new_username)
        .bind(&user.id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE profiles SET username = ? WHERE user_id = ?")
        .bind(&new_username)
        .bind(&user.id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!(user_id = %user.id, username = %new_username, "Username changed");

    Ok(Json(ChangeUsernameResponse {
        success: true,
        username: new_username,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SetPasswordRequest {
    pub password: String,
}

/// Set a password on the authenticated account. Only valid while the
/// account has no password credential; established accounts go through
/// the reset flow. Re-issues the session cookie so the password-setup
/// gate opens immediately.
pub async fn set_password(
    State(state): State<Arc<AppState>>,
    user: SessionUser,
    jar: CookieJar,
    Json(request): Json<SetPasswordRequest>,
) -> Result<(CookieJar, Json<Value>), ApiError> {
    validate_password(&request.password).map_err(|e| ApiError::validation_field("password", e))?;

    let record = state
        .store
        .find_user_by_id(&user.id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Account no longer exists"))?;
    if record.hashed_password.is_some() {
        return Err(ApiError::bad_request(
            "This account already has a password. Use password reset instead.",
        ));
    }

    let hashed = hash_password(&request.password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {e}")))?;
    state.store.set_user_password(&record.id, &hashed).await?;

    // Fresh claim snapshot: has_password is now true.
    let record = state
        .store
        .find_user_by_id(&record.id)
        .await?
        .ok_or_else(|| ApiError::internal("Account disappeared during update"))?;
    let token = encode_session_token(&Claims::for_user(&record), &state.config.auth.session_secret)
        .map_err(|e| ApiError::internal(format!("Failed to issue session token: {e}")))?;
    let jar = jar.add(cookies::session_cookie(token, state.config.secure_cookies()));

    info!(user_id = %record.id, "Password set on authenticated account");
    Ok((jar, Json(json!({ "ok": true }))))
}

/// Admin probe. 401 without a session, 404 without a profile, 403 for a
/// non-admin, 200 for an admin. The flag is read per request, never from
/// the JWT.
pub async fn check_admin(
    State(state): State<Arc<AppState>>,
    user: Option<SessionUser>,
) -> Result<Json<Value>, ApiError> {
    let user = user.ok_or_else(|| ApiError::unauthorized("Authentication required"))?;
    let profile = state
        .store
        .find_profile_by_user_id(&user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Profile not found"))?;
    if !profile.is_admin {
        return Err(ApiError::forbidden("Admin access required"));
    }
    Ok(Json(json!({ "isAdmin": true })))
}

/// Admin-only user delete; cascades through the adapter.
pub async fn admin_delete_user(
    State(state): State<Arc<AppState>>,
    caller: SessionUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &caller.id).await?;

    if state.store.find_user_by_id(&id).await?.is_none() {
        return Err(ApiError::not_found("User not found"));
    }
    state.adapter.delete_user(&id).await?;
    info!(user_id = %id, deleted_by = %caller.id, "User deleted by admin");
    Ok(Json(json!({ "ok": true })))
}
