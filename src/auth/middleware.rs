//! Request authorization.
//!
//! Runs before any route handler: decodes the session cookie (purely
//! cryptographic, no storage call), enforces the path-prefix policy, and
//! funnels OAuth-only accounts to password setup. Admin checks are NOT
//! done here — they re-query the profile row per request so a flag
//! toggle applies without re-login.

use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, Request},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::AppState;

use super::cookies::{self, SESSION_COOKIE};
use super::jwt::{self, Claims};
use super::oauth::url_encode;

/// The outward session object consumed by route handlers: the claim
/// snapshot taken at login, nothing fresher.
#[derive(Debug, Clone, Serialize)]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
    pub username: String,
    pub has_password: bool,
}

impl From<&Claims> for SessionUser {
    fn from(claims: &Claims) -> Self {
        Self {
            id: claims.sub.clone(),
            email: claims.email.clone(),
            name: claims.name.clone(),
            image: claims.picture.clone(),
            username: claims.username.clone(),
            has_password: claims.has_password,
        }
    }
}

/// Paths that require a session: the profile area, the admin area, and
/// the admin API.
fn requires_session(path: &str) -> bool {
    path == "/profile"
        || path.starts_with("/profile/")
        || path == "/admin"
        || path.starts_with("/admin/")
        || path == "/api/admin"
        || path.starts_with("/api/admin/")
}

/// Paths excluded from the password-setup gate: the setup page itself
/// (no redirect loop), the API prefix, and framework asset paths.
fn exempt_from_password_gate(path: &str) -> bool {
    path == "/set-password"
        || path.starts_with("/api/")
        || path.starts_with("/_assets/")
        || path == "/favicon.ico"
}

fn decode_claims(jar: &CookieJar, secret: &str) -> Option<Claims> {
    jar.get(SESSION_COOKIE)
        .and_then(|cookie| jwt::decode_session_token(cookie.value(), secret))
}

/// Per-request authorization gate.
pub async fn authorize_request(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let claims = decode_claims(&jar, &state.config.auth.session_secret);

    if requires_session(&path) && claims.is_none() {
        if path.starts_with("/api/") {
            return ApiError::unauthorized("Authentication required").into_response();
        }
        return Redirect::temporary(&format!("/login?callbackUrl={}", url_encode(&path)))
            .into_response();
    }

    if let Some(claims) = &claims {
        // OAuth-only accounts cannot use the rest of the app until they
        // establish a password credential. Query strings do not survive
        // the redirect.
        if !claims.has_password && !exempt_from_password_gate(&path) {
            return Redirect::temporary("/set-password").into_response();
        }
    }

    let mut response = next.run(request).await;

    // Sliding renewal: re-issue the cookie once the token is a day old so
    // an active user never ages out of the 30-day window.
    if let Some(claims) = claims {
        if claims.needs_renewal() {
            if let Ok(token) =
                jwt::encode_session_token(&claims.renewed(), &state.config.auth.session_secret)
            {
                let cookie = cookies::session_cookie(token, state.config.secure_cookies());
                if let Ok(value) = cookie.to_string().parse() {
                    response.headers_mut().append(header::SET_COOKIE, value);
                }
            }
        }
    }

    response
}

/// Extractor for the current session user. Rejects with 401 when the
/// cookie is absent or the token does not verify.
#[async_trait]
impl FromRequestParts<Arc<AppState>> for SessionUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let claims = decode_claims(&jar, &state.config.auth.session_secret)
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;
        Ok(SessionUser::from(&claims))
    }
}

/// Admin gate for API handlers. Reads `profiles.is_admin` on every call;
/// absence of a profile and a false flag are both 403.
pub async fn require_admin(state: &AppState, user_id: &str) -> Result<(), ApiError> {
    match state.store.find_profile_by_user_id(user_id).await? {
        Some(profile) if profile.is_admin => Ok(()),
        _ => Err(ApiError::forbidden("Admin access required")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Router};
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::db::User;

    async fn test_state() -> Arc<AppState> {
        let pool = crate::db::init_in_memory().await.unwrap();
        Arc::new(AppState::new(Config::default(), pool))
    }

    fn test_router(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/", get(|| async { "home" }))
            .route("/profile", get(|| async { "profile" }))
            .route("/set-password", get(|| async { "setup" }))
            .route("/api/admin/ping", get(|| async { "pong" }))
            .layer(axum::middleware::from_fn_with_state(
                state.clone(),
                authorize_request,
            ))
            .with_state(state)
    }

    fn token_for(state: &AppState, has_password: bool) -> String {
        let user = User {
            id: "u1".to_string(),
            email: "gate@example.com".to_string(),
            name: None,
            username: "gate".to_string(),
            image: None,
            hashed_password: has_password.then(|| "$argon2id$stub".to_string()),
            email_verified: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        jwt::encode_session_token(&Claims::for_user(&user), &state.config.auth.session_secret)
            .unwrap()
    }

    fn request(path: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(path);
        if let Some(token) = cookie {
            builder = builder.header("cookie", format!("{SESSION_COOKIE}={token}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_open_path_passes_without_token() {
        let state = test_state().await;
        let response = test_router(state).oneshot(request("/", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_profile_redirects_to_login_without_token() {
        let state = test_state().await;
        let response = test_router(state)
            .oneshot(request("/profile", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        let location = response.headers().get("location").unwrap().to_str().unwrap();
        assert_eq!(location, "/login?callbackUrl=%2Fprofile");
    }

    #[tokio::test]
    async fn test_admin_api_is_401_without_token() {
        let state = test_state().await;
        let response = test_router(state)
            .oneshot(request("/api/admin/ping", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_profile_passes_with_token() {
        let state = test_state().await;
        let token = token_for(&state, true);
        let response = test_router(state)
            .oneshot(request("/profile", Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_garbage_token_is_no_session() {
        let state = test_state().await;
        let response = test_router(state)
            .oneshot(request("/profile", Some("not-a-jwt")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    }

    #[tokio::test]
    async fn test_passwordless_account_forced_to_setup() {
        let state = test_state().await;
        let token = token_for(&state, false);
        let response = test_router(state)
            .oneshot(request("/profile?tab=posts", Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        // Query string stripped from the redirect target.
        let location = response.headers().get("location").unwrap().to_str().unwrap();
        assert_eq!(location, "/set-password");
    }

    #[tokio::test]
    async fn test_no_redirect_loop_on_setup_page() {
        let state = test_state().await;
        let token = token_for(&state, false);
        let response = test_router(state)
            .oneshot(request("/set-password", Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_api_paths_exempt_from_password_gate() {
        let state = test_state().await;
        let token = token_for(&state, false);
        let response = test_router(state)
            .oneshot(request("/api/admin/ping", Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_require_admin_distinguishes_403() {
        let state = test_state().await;
        let user = User {
            id: "plain".to_string(),
            email: "plain@example.com".to_string(),
            name: None,
            username: "plain".to_string(),
            image: None,
            hashed_password: Some("$argon2id$stub".to_string()),
            email_verified: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        state.store.insert_user(&user).await.unwrap();

        // No profile row: forbidden.
        let err = require_admin(&state, "plain").await.unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        crate::auth::policy::ensure_profile(&state.store, &user)
            .await
            .unwrap();
        // Profile exists but is_admin is false: still forbidden.
        let err = require_admin(&state, "plain").await.unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        sqlx::query("UPDATE profiles SET is_admin = 1 WHERE user_id = ?")
            .bind("plain")
            .execute(&state.db)
            .await
            .unwrap();
        // Flag toggle takes effect on the next check, no re-login needed.
        require_admin(&state, "plain").await.unwrap();
    }
}
