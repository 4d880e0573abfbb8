//! Google OAuth provider plumbing: authorize-URL construction, the
//! authorization-code exchange, and the userinfo fetch. Only
//! `{id, email, name, picture}` is consumed from the provider profile;
//! raw token material is passed through for storage.

use serde::Deserialize;

use crate::config::OAuthProviderConfig;

pub const GOOGLE_PROVIDER: &str = "google";

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
const SCOPES: &str = "openid email profile";

#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("token exchange failed: {0}")]
    Exchange(String),
    #[error("userinfo fetch failed: {0}")]
    Userinfo(String),
}

/// Token material returned by the code exchange, stored verbatim on the
/// account link.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleTokens {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleProfile {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

/// URL-encode a string for use in query parameters
pub fn url_encode(s: &str) -> String {
    let mut encoded = String::new();
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char);
            }
            _ => {
                encoded.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    encoded
}

/// Build the provider authorize URL for the start of the round trip.
pub fn authorize_url(config: &OAuthProviderConfig, redirect_uri: &str, state: &str) -> String {
    format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}&access_type=offline",
        AUTHORIZE_URL,
        url_encode(&config.client_id),
        url_encode(redirect_uri),
        url_encode(SCOPES),
        url_encode(state),
    )
}

/// Exchange an authorization code for token material.
pub async fn exchange_code(
    client: &reqwest::Client,
    config: &OAuthProviderConfig,
    redirect_uri: &str,
    code: &str,
) -> Result<GoogleTokens, OAuthError> {
    let response = client
        .post(TOKEN_URL)
        .form(&[
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
        ])
        .send()
        .await
        .map_err(|e| OAuthError::Exchange(e.to_string()))?;

    if !response.status().is_success() {
        return Err(OAuthError::Exchange(format!(
            "provider returned {}",
            response.status()
        )));
    }

    response
        .json()
        .await
        .map_err(|e| OAuthError::Exchange(format!("failed to parse token response: {e}")))
}

/// Fetch the provider profile for a freshly exchanged access token.
pub async fn fetch_profile(
    client: &reqwest::Client,
    access_token: &str,
) -> Result<GoogleProfile, OAuthError> {
    let response = client
        .get(USERINFO_URL)
        .bearer_auth(access_token)
        .send()
        .await
        .map_err(|e| OAuthError::Userinfo(e.to_string()))?;

    if !response.status().is_success() {
        return Err(OAuthError::Userinfo(format!(
            "provider returned {}",
            response.status()
        )));
    }

    response
        .json()
        .await
        .map_err(|e| OAuthError::Userinfo(format!("failed to parse userinfo: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_encode() {
        assert_eq!(url_encode("a b&c"), "a%20b%26c");
        assert_eq!(url_encode("safe-chars_1.2~"), "safe-chars_1.2~");
    }

    #[test]
    fn test_authorize_url_carries_state_and_scopes() {
        let config = OAuthProviderConfig {
            client_id: "client-1".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: None,
        };
        let url = authorize_url(&config, "http://localhost:8080/cb", "nonce-42");
        assert!(url.starts_with(AUTHORIZE_URL));
        assert!(url.contains("client_id=client-1"));
        assert!(url.contains("state=nonce-42"));
        assert!(url.contains("scope=openid%20email%20profile"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Fcb"));
    }
}
