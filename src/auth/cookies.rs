//! Session and OAuth cookie policy.

use axum_extra::extract::cookie::{Cookie, SameSite};

use super::jwt::SESSION_MAX_AGE_SECS;

/// Name of the cookie carrying the signed session token.
pub const SESSION_COOKIE: &str = "atrium_session";

/// Short-lived cookies used during the OAuth round trip.
pub const OAUTH_STATE_COOKIE: &str = "atrium_oauth_state";
pub const OAUTH_CALLBACK_COOKIE: &str = "atrium_oauth_callback";

const OAUTH_COOKIE_MAX_AGE_SECS: i64 = 10 * 60;

/// Build the session cookie: HTTP-only, SameSite=Lax, scoped to `/`,
/// Secure outside local development, 30-day max age.
pub fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .secure(secure)
        .max_age(time::Duration::seconds(SESSION_MAX_AGE_SECS))
        .build()
}

/// An expired session cookie, for sign-out.
pub fn clear_session_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .secure(secure)
        .max_age(time::Duration::ZERO)
        .build()
}

pub fn oauth_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .secure(secure)
        .max_age(time::Duration::seconds(OAUTH_COOKIE_MAX_AGE_SECS))
        .build()
}

pub fn clear_oauth_cookie(name: &'static str, secure: bool) -> Cookie<'static> {
    Cookie::build((name, ""))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .secure(secure)
        .max_age(time::Duration::ZERO)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("tok".to_string(), true);
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(
            cookie.max_age(),
            Some(time::Duration::seconds(SESSION_MAX_AGE_SECS))
        );
    }

    #[test]
    fn test_insecure_in_local_dev() {
        let cookie = session_cookie("tok".to_string(), false);
        assert_eq!(cookie.secure(), Some(false));
    }

    #[test]
    fn test_clear_cookie_expires_immediately() {
        let cookie = clear_session_cookie(true);
        assert_eq!(cookie.max_age(), Some(time::Duration::ZERO));
        assert_eq!(cookie.value(), "");
    }
}
