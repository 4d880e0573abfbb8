mod account;
mod articles;
pub mod auth;
pub mod error;
mod forum;
mod profiles;
pub mod rate_limit;
mod validation;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::auth::middleware::authorize_request;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Session establishment and recovery (auth rate-limit tier)
    let auth_routes = Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/session", get(auth::session))
        .route("/oauth/google", get(auth::oauth_begin))
        .route("/oauth/google/callback", get(auth::oauth_callback))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password))
        .route("/request-set-password", post(auth::request_set_password))
        .route("/set-password", post(auth::set_password_with_token))
        .route("/forgot-username", post(auth::forgot_username))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_auth,
        ));

    // General API surface
    let api_routes = Router::new()
        .route("/account/change-username", post(account::change_username))
        .route("/account/set-password", post(account::set_password))
        .route("/check-admin", get(account::check_admin))
        .route("/profile", put(profiles::update_profile))
        .route("/profiles/:username", get(profiles::get_profile))
        // Insights
        .route("/articles", get(articles::list_articles))
        .route("/articles/:slug", get(articles::get_article))
        // Forum
        .route("/forum/threads", get(forum::list_threads))
        .route("/forum/threads", post(forum::create_thread))
        .route("/forum/threads/:id", get(forum::get_thread))
        .route("/forum/threads/:id", delete(forum::delete_thread))
        .route("/forum/threads/:id/replies", post(forum::create_reply))
        .route("/forum/replies/:id", delete(forum::delete_reply))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_api,
        ));

    // Admin API: the middleware requires a session for /api/admin, and
    // every handler re-checks the profile flag.
    let admin_routes = Router::new()
        .route("/articles", get(articles::list_all_articles))
        .route("/articles", post(articles::create_article))
        .route("/articles/:id", put(articles::update_article))
        .route("/articles/:id", delete(articles::delete_article))
        .route("/users/:id", delete(account::admin_delete_user))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_api,
        ));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/auth", auth_routes)
        .nest("/api/admin", admin_routes)
        .nest("/api", api_routes)
        .layer(middleware::from_fn_with_state(state.clone(), authorize_request))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
