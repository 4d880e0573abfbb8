//! Session-establishment and account-recovery endpoints.

use axum::{
    extract::{Query, State},
    response::Redirect,
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::info;

use crate::auth::adapter::{IdentityAdapter, NewUser};
use crate::auth::cookies::{
    self, OAUTH_CALLBACK_COOKIE, OAUTH_STATE_COOKIE,
};
use crate::auth::jwt::{encode_session_token, Claims};
use crate::auth::middleware::SessionUser;
use crate::auth::recovery::{
    self, generate_token, RecoveryPurpose,
};
use crate::auth::{oauth, policy};
use crate::db::{LoginRequest, LoginResponse, SignupRequest, UserResponse};
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_email, validate_password};

/// Register a password-based account. Reusing an email that already has a
/// password is a conflict; reusing an OAuth-only email attaches the
/// password to the existing identity instead of creating a duplicate.
pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SignupRequest>,
) -> Result<Json<Value>, ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Err(e) = validate_email(request.email.trim()) {
        errors.add("email", e);
    }
    if let Err(e) = validate_password(&request.password) {
        errors.add("password", e);
    }
    errors.finish()?;

    let email = request.email.trim().to_lowercase();
    let hashed = crate::auth::password::hash_password(&request.password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {e}")))?;

    match state.store.find_user_by_email(&email).await? {
        Some(user) if user.hashed_password.is_some() => {
            return Err(ApiError::conflict("An account with this email already exists"));
        }
        Some(user) => {
            // OAuth-only account: attach the password, no new row.
            state.store.set_user_password(&user.id, &hashed).await?;
            info!(user_id = %user.id, "Attached password to OAuth-only account");
        }
        None => {
            let created = state
                .adapter
                .create_user(NewUser {
                    email,
                    ..Default::default()
                })
                .await?;
            state.store.set_user_password(&created.id, &hashed).await?;
            info!(user_id = %created.id, "Created user via signup");
        }
    }

    Ok(Json(json!({ "ok": true })))
}

/// Password login. The identifier may be an email or a username. All
/// failure modes share one message.
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), ApiError> {
    let user = policy::authorize_credentials(&state.store, &request.login, &request.password)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Incorrect login or password"))?;

    let token = encode_session_token(&Claims::for_user(&user), &state.config.auth.session_secret)
        .map_err(|e| ApiError::internal(format!("Failed to issue session token: {e}")))?;
    let jar = jar.add(cookies::session_cookie(token, state.config.secure_cookies()));

    Ok((
        jar,
        Json(LoginResponse {
            user: UserResponse::from(user),
        }),
    ))
}

/// Clear the session cookie.
pub async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> (CookieJar, Json<Value>) {
    let jar = jar.add(cookies::clear_session_cookie(state.config.secure_cookies()));
    (jar, Json(json!({ "ok": true })))
}

/// Current session user, or null.
pub async fn session(user: Option<SessionUser>) -> Json<Value> {
    Json(json!({ "user": user }))
}

#[derive(Debug, Deserialize)]
pub struct OAuthBeginParams {
    #[serde(rename = "callbackUrl")]
    pub callback_url: Option<String>,
}

/// Start the Google OAuth round trip.
pub async fn oauth_begin(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<OAuthBeginParams>,
) -> Result<(CookieJar, Redirect), ApiError> {
    let google = state
        .config
        .oauth
        .google
        .as_ref()
        .ok_or_else(|| ApiError::not_found("Google OAuth is not configured"))?;

    let nonce = generate_token();
    let callback = params.callback_url.unwrap_or_else(|| "/".to_string());
    let secure = state.config.secure_cookies();

    let jar = jar
        .add(cookies::oauth_cookie(OAUTH_STATE_COOKIE, nonce.clone(), secure))
        .add(cookies::oauth_cookie(OAUTH_CALLBACK_COOKIE, callback, secure));

    let url = oauth::authorize_url(google, &state.config.google_redirect_uri(), &nonce);
    Ok((jar, Redirect::temporary(&url)))
}

#[derive(Debug, Deserialize)]
pub struct OAuthCallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Complete the Google OAuth round trip: verify the state nonce, exchange
/// the code, run the sign-in decision, and establish the session.
pub async fn oauth_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<OAuthCallbackParams>,
) -> Result<(CookieJar, Redirect), ApiError> {
    let google = state
        .config
        .oauth
        .google
        .as_ref()
        .ok_or_else(|| ApiError::not_found("Google OAuth is not configured"))?;

    if let Some(error) = &params.error {
        info!(error = %error, "OAuth sign-in denied by provider");
        return Ok((jar, Redirect::temporary("/login?error=oauth")));
    }
    let code = params
        .code
        .as_deref()
        .ok_or_else(|| ApiError::bad_request("Missing authorization code"))?;

    // The state parameter must match the nonce cookie set at the start of
    // the round trip.
    let expected = jar
        .get(OAUTH_STATE_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or_else(|| ApiError::bad_request("Missing OAuth state"))?;
    let received = params.state.as_deref().unwrap_or("");
    if expected.len() != received.len()
        || !bool::from(expected.as_bytes().ct_eq(received.as_bytes()))
    {
        return Err(ApiError::bad_request("OAuth state mismatch"));
    }

    let tokens = oauth::exchange_code(&state.http, google, &state.config.google_redirect_uri(), code)
        .await
        .map_err(|e| {
            tracing::error!("OAuth code exchange failed: {}", e);
            ApiError::external("OAuth sign-in failed")
        })?;
    let profile = oauth::fetch_profile(&state.http, &tokens.access_token)
        .await
        .map_err(|e| {
            tracing::error!("OAuth userinfo fetch failed: {}", e);
            ApiError::external("OAuth sign-in failed")
        })?;

    let user = policy::handle_oauth_sign_in(&state.store, &state.adapter, &profile, &tokens).await?;

    let token = encode_session_token(&Claims::for_user(&user), &state.config.auth.session_secret)
        .map_err(|e| ApiError::internal(format!("Failed to issue session token: {e}")))?;

    let target = jar
        .get(OAUTH_CALLBACK_COOKIE)
        .map(|c| c.value().to_string())
        .unwrap_or_else(|| "/".to_string());
    let destination = policy::resolve_redirect(&target, &state.config.base_origin());

    let secure = state.config.secure_cookies();
    let jar = jar
        .add(cookies::session_cookie(token, secure))
        .add(cookies::clear_oauth_cookie(OAUTH_STATE_COOKIE, secure))
        .add(cookies::clear_oauth_cookie(OAUTH_CALLBACK_COOKIE, secure));

    Ok((jar, Redirect::temporary(&destination)))
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct RedeemTokenRequest {
    pub token: String,
    pub password: String,
}

/// Request a password-reset link. Always answers ok so the endpoint
/// cannot be used to probe for accounts.
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EmailRequest>,
) -> Result<Json<Value>, ApiError> {
    recovery::begin_password_reset(&state.store, &state.mailer, &state.config, &request.email)
        .await?;
    Ok(Json(json!({ "ok": true })))
}

/// Redeem a password-reset token.
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RedeemTokenRequest>,
) -> Result<Json<Value>, ApiError> {
    validate_password(&request.password).map_err(|e| ApiError::validation_field("password", e))?;
    recovery::redeem_password_token(
        &state.store,
        RecoveryPurpose::PasswordReset,
        &request.token,
        &request.password,
    )
    .await?;
    Ok(Json(json!({ "ok": true })))
}

/// Request a password-setup link for an OAuth-only account.
pub async fn request_set_password(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EmailRequest>,
) -> Result<Json<Value>, ApiError> {
    recovery::begin_password_setup(&state.store, &state.mailer, &state.config, &request.email)
        .await?;
    Ok(Json(json!({ "ok": true })))
}

/// Redeem a password-setup token.
pub async fn set_password_with_token(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RedeemTokenRequest>,
) -> Result<Json<Value>, ApiError> {
    validate_password(&request.password).map_err(|e| ApiError::validation_field("password", e))?;
    recovery::redeem_password_token(
        &state.store,
        RecoveryPurpose::PasswordSetup,
        &request.token,
        &request.password,
    )
    .await?;
    Ok(Json(json!({ "ok": true })))
}

/// Email the account's username.
pub async fn forgot_username(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EmailRequest>,
) -> Result<Json<Value>, ApiError> {
    recovery::recover_username(&state.store, &state.mailer, &request.email).await?;
    Ok(Json(json!({ "ok": true })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::routing::post;
    use axum::Router;
    use tower::ServiceExt;

    use crate::config::Config;

    async fn test_state() -> Arc<AppState> {
        let pool = crate::db::init_in_memory().await.unwrap();
        Arc::new(AppState::new(Config::default(), pool))
    }

    fn auth_router(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/signup", post(signup))
            .route("/login", post(login))
            .with_state(state)
    }

    fn json_request(path: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_signup_creates_user_and_profile() {
        let state = test_state().await;
        let response = auth_router(state.clone())
            .oneshot(json_request(
                "/signup",
                json!({"email": "Fresh@Example.com", "password": "longenough"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let user = state
            .store
            .find_user_by_email("fresh@example.com")
            .await
            .unwrap()
            .expect("user row created");
        assert!(user.hashed_password.is_some());

        let profile = state
            .store
            .find_profile_by_user_id(&user.id)
            .await
            .unwrap()
            .expect("profile row created");
        assert_eq!(profile.username, user.username);
    }

    #[tokio::test]
    async fn test_signup_duplicate_email_conflicts() {
        let state = test_state().await;
        let router = auth_router(state.clone());
        let body = json!({"email": "dup@example.com", "password": "longenough"});

        let first = router
            .clone()
            .oneshot(json_request("/signup", body.clone()))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = router.oneshot(json_request("/signup", body)).await.unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_signup_attaches_password_to_oauth_only_account() {
        let state = test_state().await;
        let existing = state
            .adapter
            .create_user(NewUser {
                email: "linked@example.com".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let response = auth_router(state.clone())
            .oneshot(json_request(
                "/signup",
                json!({"email": "linked@example.com", "password": "longenough"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Same identity, now with a password credential.
        let user = state
            .store
            .find_user_by_email("linked@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.id, existing.id);
        assert!(user.hashed_password.is_some());
    }

    #[tokio::test]
    async fn test_signup_rejects_weak_input() {
        let state = test_state().await;
        let response = auth_router(state)
            .oneshot(json_request(
                "/signup",
                json!({"email": "bad", "password": "short"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_login_sets_session_cookie() {
        let state = test_state().await;
        let router = auth_router(state.clone());
        router
            .clone()
            .oneshot(json_request(
                "/signup",
                json!({"email": "carol@example.com", "password": "correct-horse"}),
            ))
            .await
            .unwrap();

        let response = router
            .oneshot(json_request(
                "/login",
                json!({"login": "carol@example.com", "password": "correct-horse"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .expect("session cookie set")
            .to_str()
            .unwrap();
        assert!(set_cookie.starts_with(cookies::SESSION_COOKIE));
        assert!(set_cookie.contains("HttpOnly"));
    }

    #[tokio::test]
    async fn test_login_failure_is_generic_401() {
        let state = test_state().await;
        let router = auth_router(state);
        router
            .clone()
            .oneshot(json_request(
                "/signup",
                json!({"email": "dave@example.com", "password": "correct-horse"}),
            ))
            .await
            .unwrap();

        let wrong_password = router
            .clone()
            .oneshot(json_request(
                "/login",
                json!({"login": "dave@example.com", "password": "wrong"}),
            ))
            .await
            .unwrap();
        let unknown_user = router
            .oneshot(json_request(
                "/login",
                json!({"login": "nobody@example.com", "password": "whatever"}),
            ))
            .await
            .unwrap();

        assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(unknown_user.status(), StatusCode::UNAUTHORIZED);
    }
}
