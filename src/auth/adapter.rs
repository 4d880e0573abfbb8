//! Identity adapter.
//!
//! Implements the session-framework lifecycle contract on top of the
//! credential store. The framework speaks camelCase field names and is
//! sloppy about timestamp representations (RFC 3339 strings, epoch
//! seconds, epoch milliseconds); storage speaks snake_case columns and
//! one canonical RFC 3339 string. This module owns both translations.
//!
//! Absence is `Ok(None)`, never an error — callers interpret "no existing
//! identity" as a signal to create one. Storage failures propagate.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::db::{Account, IdentityStore, Profile, Session, User, VerificationToken};

pub type AdapterResult<T> = Result<T, AdapterError>;

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

// ── framework vocabulary ─────────────────────────────────────────────

/// Candidate user handed in by the framework on first sign-in.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    #[serde(default)]
    pub id: Option<String>,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub email_verified: Option<DateTime<Utc>>,
}

/// User as the framework sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterUser {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub username: String,
    pub image: Option<String>,
    pub email_verified: Option<DateTime<Utc>>,
}

/// External account link handed in by the framework after an OAuth
/// exchange. `expires_at` arrives in whatever shape the provider used.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterAccount {
    #[serde(default)]
    pub id: Option<String>,
    pub user_id: String,
    pub provider: String,
    pub provider_account_id: String,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<Value>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSession {
    pub session_token: String,
    pub user_id: String,
    pub expires: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterSession {
    pub session_token: String,
    pub user_id: String,
    pub expires: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdapterVerificationToken {
    pub identifier: String,
    pub token: String,
    pub expires: DateTime<Utc>,
}

// ── timestamp normalization ──────────────────────────────────────────

/// Parse a timestamp from any shape the framework produces: RFC 3339,
/// SQLite's `datetime('now')` format, epoch seconds, or epoch
/// milliseconds.
pub fn normalize_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_timestamp_str(s),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                from_epoch(i)
            } else {
                n.as_f64().and_then(|f| from_epoch(f as i64))
            }
        }
        _ => None,
    }
}

pub fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    s.trim().parse::<i64>().ok().and_then(from_epoch)
}

fn from_epoch(n: i64) -> Option<DateTime<Utc>> {
    // Anything past the year 5138 in seconds is epoch milliseconds.
    if n.abs() >= 100_000_000_000 {
        Utc.timestamp_millis_opt(n).single()
    } else {
        Utc.timestamp_opt(n, 0).single()
    }
}

/// The one persisted form.
pub fn canonical_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

/// Session tokens the framework passes through verbatim on logout or
/// stale clients. These short-circuit to "no session" without a query.
fn is_sentinel_token(token: &str) -> bool {
    matches!(token.trim(), "" | "null" | "undefined")
}

// ── row mapping ──────────────────────────────────────────────────────

fn adapter_user_from_row(row: &User) -> AdapterUser {
    AdapterUser {
        id: row.id.clone(),
        email: row.email.clone(),
        name: row.name.clone(),
        username: row.username.clone(),
        image: row.image.clone(),
        email_verified: row.email_verified.as_deref().and_then(parse_timestamp_str),
    }
}

fn adapter_session_from_row(row: &Session) -> Option<AdapterSession> {
    Some(AdapterSession {
        session_token: row.session_token.clone(),
        user_id: row.user_id.clone(),
        expires: parse_timestamp_str(&row.expires)?,
    })
}

fn account_row_from_adapter(account: AdapterAccount) -> Account {
    let expires_at = account
        .expires_at
        .as_ref()
        .and_then(normalize_timestamp)
        .map(|dt| canonical_timestamp(&dt));
    Account {
        id: account
            .id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        user_id: account.user_id,
        provider: account.provider,
        provider_account_id: account.provider_account_id,
        access_token: account.access_token,
        refresh_token: account.refresh_token,
        expires_at,
        token_type: account.token_type,
        scope: account.scope,
        id_token: account.id_token,
    }
}

/// Derive a username from the local part of an email address.
pub fn username_from_email(email: &str) -> String {
    let local = email.split('@').next().unwrap_or("");
    let cleaned: String = local
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    let cleaned = cleaned.to_lowercase();
    if cleaned.is_empty() {
        "user".to_string()
    } else {
        cleaned
    }
}

fn random_suffix() -> String {
    use rand::Rng;
    let mut rng = rand::rng();
    let bytes: [u8; 3] = rng.random();
    hex::encode(bytes)
}

// ── the lifecycle contract ───────────────────────────────────────────

#[async_trait]
pub trait IdentityAdapter: Send + Sync {
    async fn create_user(&self, candidate: NewUser) -> AdapterResult<AdapterUser>;
    async fn get_user(&self, id: &str) -> AdapterResult<Option<AdapterUser>>;
    async fn get_user_by_email(&self, email: &str) -> AdapterResult<Option<AdapterUser>>;
    async fn get_user_by_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> AdapterResult<Option<AdapterUser>>;
    async fn update_user(&self, partial: &Value) -> AdapterResult<Option<AdapterUser>>;
    async fn delete_user(&self, id: &str) -> AdapterResult<()>;
    async fn link_account(&self, account: AdapterAccount) -> AdapterResult<()>;
    async fn unlink_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> AdapterResult<()>;
    async fn create_session(&self, session: NewSession) -> AdapterResult<AdapterSession>;
    async fn get_session_and_user(
        &self,
        session_token: &str,
    ) -> AdapterResult<Option<(AdapterSession, AdapterUser)>>;
    async fn update_session(
        &self,
        session_token: &str,
        expires: &Value,
    ) -> AdapterResult<Option<AdapterSession>>;
    async fn delete_session(&self, session_token: &str) -> AdapterResult<()>;
    async fn create_verification_token(
        &self,
        identifier: &str,
        token: &str,
        expires: DateTime<Utc>,
    ) -> AdapterResult<()>;
    async fn use_verification_token(
        &self,
        identifier: &str,
        token: &str,
    ) -> AdapterResult<Option<AdapterVerificationToken>>;
}

/// Storage-backed adapter over [`IdentityStore`].
#[derive(Debug, Clone)]
pub struct SqlIdentityAdapter {
    store: IdentityStore,
}

impl SqlIdentityAdapter {
    pub fn new(store: IdentityStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl IdentityAdapter for SqlIdentityAdapter {
    async fn create_user(&self, candidate: NewUser) -> AdapterResult<AdapterUser> {
        let id = candidate
            .id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let email = candidate.email.trim().to_lowercase();

        let mut username = candidate
            .username
            .unwrap_or_else(|| username_from_email(&email));
        if self.store.find_user_by_username(&username).await?.is_some() {
            username = format!("{}_{}", username, random_suffix());
        }

        let row = User {
            id,
            email,
            name: candidate.name,
            username,
            image: candidate.image,
            hashed_password: None,
            email_verified: candidate.email_verified.map(|dt| canonical_timestamp(&dt)),
            created_at: canonical_timestamp(&Utc::now()),
        };
        self.store.insert_user(&row).await?;

        // Best-effort companion profile. A failure here does not roll the
        // user back; the lazy profile-creation path self-heals it.
        let profile = Profile {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: row.id.clone(),
            username: row.username.clone(),
            avatar_url: row.image.clone(),
            bio: None,
            is_admin: false,
        };
        if let Err(e) = self.store.insert_profile(&profile).await {
            warn!(user_id = %row.id, error = %e, "Failed to create profile for new user");
        }

        Ok(adapter_user_from_row(&row))
    }

    async fn get_user(&self, id: &str) -> AdapterResult<Option<AdapterUser>> {
        let row = self.store.find_user_by_id(id).await?;
        Ok(row.as_ref().map(adapter_user_from_row))
    }

    async fn get_user_by_email(&self, email: &str) -> AdapterResult<Option<AdapterUser>> {
        let row = self
            .store
            .find_user_by_email(&email.trim().to_lowercase())
            .await?;
        Ok(row.as_ref().map(adapter_user_from_row))
    }

    async fn get_user_by_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> AdapterResult<Option<AdapterUser>> {
        let account = match self.store.find_account(provider, provider_account_id).await? {
            Some(account) => account,
            None => return Ok(None),
        };
        let row = self.store.find_user_by_id(&account.user_id).await?;
        Ok(row.as_ref().map(adapter_user_from_row))
    }

    async fn update_user(&self, partial: &Value) -> AdapterResult<Option<AdapterUser>> {
        let id = match partial.get("id").and_then(Value::as_str) {
            Some(id) => id,
            None => return Ok(None),
        };

        // Whitelist mapping from framework fields to columns; anything
        // unrecognized is silently dropped before SQL is built.
        let mut fields: Vec<(&str, Option<String>)> = Vec::new();
        if let Some(value) = partial.get("email") {
            if let Some(s) = value.as_str() {
                fields.push(("email", Some(s.trim().to_lowercase())));
            }
        }
        if let Some(value) = partial.get("name") {
            fields.push(("name", value.as_str().map(str::to_string)));
        }
        if let Some(value) = partial.get("username") {
            if let Some(s) = value.as_str() {
                fields.push(("username", Some(s.to_string())));
            }
        }
        if let Some(value) = partial.get("image") {
            fields.push(("image", value.as_str().map(str::to_string)));
        }
        if let Some(value) = partial.get("emailVerified") {
            fields.push((
                "email_verified",
                normalize_timestamp(value).map(|dt| canonical_timestamp(&dt)),
            ));
        }
        if let Some(value) = partial.get("hashedPassword") {
            fields.push(("hashed_password", value.as_str().map(str::to_string)));
        }

        self.store.update_user_fields(id, &fields).await?;
        let row = self.store.find_user_by_id(id).await?;
        Ok(row.as_ref().map(adapter_user_from_row))
    }

    async fn delete_user(&self, id: &str) -> AdapterResult<()> {
        // Manual cascade: accounts, then sessions, then the user row.
        self.store.delete_accounts_for_user(id).await?;
        self.store.delete_sessions_for_user(id).await?;
        self.store.delete_user(id).await?;
        Ok(())
    }

    async fn link_account(&self, account: AdapterAccount) -> AdapterResult<()> {
        let row = account_row_from_adapter(account);
        self.store.insert_account(&row).await?;
        Ok(())
    }

    async fn unlink_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> AdapterResult<()> {
        self.store.delete_account(provider, provider_account_id).await?;
        Ok(())
    }

    async fn create_session(&self, session: NewSession) -> AdapterResult<AdapterSession> {
        let expires = normalize_timestamp(&session.expires)
            .unwrap_or_else(|| Utc::now() + chrono::Duration::seconds(super::jwt::SESSION_MAX_AGE_SECS));
        let row = Session {
            id: uuid::Uuid::new_v4().to_string(),
            session_token: session.session_token,
            user_id: session.user_id,
            expires: canonical_timestamp(&expires),
        };
        self.store.insert_session(&row).await?;
        Ok(AdapterSession {
            session_token: row.session_token,
            user_id: row.user_id,
            expires,
        })
    }

    async fn get_session_and_user(
        &self,
        session_token: &str,
    ) -> AdapterResult<Option<(AdapterSession, AdapterUser)>> {
        if is_sentinel_token(session_token) {
            return Ok(None);
        }
        let row = match self.store.find_session(session_token).await? {
            Some(row) => row,
            None => return Ok(None),
        };
        let session = match adapter_session_from_row(&row) {
            Some(session) => session,
            None => return Ok(None),
        };
        // Expired sessions are treated as absent, not purged inline.
        if session.expires <= Utc::now() {
            return Ok(None);
        }
        let user = match self.store.find_user_by_id(&session.user_id).await? {
            Some(user) => user,
            None => return Ok(None),
        };
        Ok(Some((session, adapter_user_from_row(&user))))
    }

    async fn update_session(
        &self,
        session_token: &str,
        expires: &Value,
    ) -> AdapterResult<Option<AdapterSession>> {
        if is_sentinel_token(session_token) {
            return Ok(None);
        }
        let expires = match normalize_timestamp(expires) {
            Some(dt) => dt,
            None => return Ok(None),
        };
        self.store
            .update_session_expiry(session_token, &canonical_timestamp(&expires))
            .await?;
        let row = self.store.find_session(session_token).await?;
        Ok(row.as_ref().and_then(adapter_session_from_row))
    }

    async fn delete_session(&self, session_token: &str) -> AdapterResult<()> {
        if is_sentinel_token(session_token) {
            return Ok(());
        }
        self.store.delete_session(session_token).await?;
        Ok(())
    }

    async fn create_verification_token(
        &self,
        identifier: &str,
        token: &str,
        expires: DateTime<Utc>,
    ) -> AdapterResult<()> {
        self.store
            .insert_verification_token(&VerificationToken {
                identifier: identifier.to_string(),
                token: token.to_string(),
                expires: canonical_timestamp(&expires),
            })
            .await?;
        Ok(())
    }

    async fn use_verification_token(
        &self,
        identifier: &str,
        token: &str,
    ) -> AdapterResult<Option<AdapterVerificationToken>> {
        let row = match self.store.take_verification_token(identifier, token).await? {
            Some(row) => row,
            None => return Ok(None),
        };
        let expires = match parse_timestamp_str(&row.expires) {
            Some(dt) => dt,
            None => return Ok(None),
        };
        Ok(Some(AdapterVerificationToken {
            identifier: row.identifier,
            token: row.token,
            expires,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn test_adapter() -> SqlIdentityAdapter {
        let pool = crate::db::init_in_memory().await.unwrap();
        SqlIdentityAdapter::new(IdentityStore::new(pool))
    }

    fn candidate(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_user_derives_username_and_profile() {
        let adapter = test_adapter().await;
        let user = adapter
            .create_user(candidate("Alice.Smith@Example.COM"))
            .await
            .unwrap();

        assert_eq!(user.email, "alice.smith@example.com");
        assert_eq!(user.username, "alicesmith");

        let profile = adapter
            .store
            .find_profile_by_user_id(&user.id)
            .await
            .unwrap()
            .expect("profile created alongside user");
        assert_eq!(profile.username, user.username);
        assert!(!profile.is_admin);
    }

    #[tokio::test]
    async fn test_create_user_uniquifies_colliding_username() {
        let adapter = test_adapter().await;
        let first = adapter.create_user(candidate("bob@one.com")).await.unwrap();
        let second = adapter.create_user(candidate("bob@two.com")).await.unwrap();
        assert_eq!(first.username, "bob");
        assert_ne!(second.username, "bob");
        assert!(second.username.starts_with("bob_"));
    }

    #[tokio::test]
    async fn test_duplicate_email_is_an_error() {
        let adapter = test_adapter().await;
        adapter.create_user(candidate("dup@example.com")).await.unwrap();
        let err = adapter.create_user(candidate("dup@example.com")).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn test_lookups_return_none_not_error() {
        let adapter = test_adapter().await;
        assert!(adapter.get_user("missing").await.unwrap().is_none());
        assert!(adapter
            .get_user_by_email("nobody@example.com")
            .await
            .unwrap()
            .is_none());
        assert!(adapter
            .get_user_by_account("google", "missing")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_link_account_and_lookup() {
        let adapter = test_adapter().await;
        let user = adapter.create_user(candidate("carol@example.com")).await.unwrap();
        adapter
            .link_account(AdapterAccount {
                id: None,
                user_id: user.id.clone(),
                provider: "google".to_string(),
                provider_account_id: "g-123".to_string(),
                access_token: Some("at".to_string()),
                refresh_token: None,
                // Providers report expiry as epoch seconds.
                expires_at: Some(json!(1_900_000_000_i64)),
                token_type: Some("Bearer".to_string()),
                scope: Some("openid email".to_string()),
                id_token: None,
            })
            .await
            .unwrap();

        let found = adapter
            .get_user_by_account("google", "g-123")
            .await
            .unwrap()
            .expect("account links back to user");
        assert_eq!(found.id, user.id);

        let row = adapter
            .store
            .find_account("google", "g-123")
            .await
            .unwrap()
            .unwrap();
        let expires = parse_timestamp_str(row.expires_at.as_deref().unwrap()).unwrap();
        assert_eq!(expires.timestamp(), 1_900_000_000);
    }

    #[tokio::test]
    async fn test_duplicate_provider_pair_is_an_error() {
        let adapter = test_adapter().await;
        let a = adapter.create_user(candidate("a@example.com")).await.unwrap();
        let b = adapter.create_user(candidate("b@example.com")).await.unwrap();
        let link = |user_id: String| AdapterAccount {
            id: None,
            user_id,
            provider: "google".to_string(),
            provider_account_id: "same".to_string(),
            access_token: None,
            refresh_token: None,
            expires_at: None,
            token_type: None,
            scope: None,
            id_token: None,
        };
        adapter.link_account(link(a.id)).await.unwrap();
        assert!(adapter.link_account(link(b.id)).await.is_err());
    }

    #[tokio::test]
    async fn test_update_user_whitelist_drops_unknown_fields() {
        let adapter = test_adapter().await;
        let user = adapter.create_user(candidate("dan@example.com")).await.unwrap();

        let updated = adapter
            .update_user(&json!({
                "id": user.id,
                "name": "Dan",
                "emailVerified": 1_700_000_000_000_i64,
                "isAdmin": true,
                "hackField": "ignored"
            }))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.name.as_deref(), Some("Dan"));
        assert_eq!(
            updated.email_verified.map(|dt| dt.timestamp()),
            Some(1_700_000_000)
        );

        // The unknown fields never reached storage.
        let profile = adapter
            .store
            .find_profile_by_user_id(&user.id)
            .await
            .unwrap()
            .unwrap();
        assert!(!profile.is_admin);
    }

    #[tokio::test]
    async fn test_update_user_without_id_is_none() {
        let adapter = test_adapter().await;
        assert!(adapter
            .update_user(&json!({"name": "Nobody"}))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_delete_user_cascades() {
        let adapter = test_adapter().await;
        let user = adapter.create_user(candidate("gone@example.com")).await.unwrap();
        adapter
            .link_account(AdapterAccount {
                id: None,
                user_id: user.id.clone(),
                provider: "google".to_string(),
                provider_account_id: "g-del".to_string(),
                access_token: None,
                refresh_token: None,
                expires_at: None,
                token_type: None,
                scope: None,
                id_token: None,
            })
            .await
            .unwrap();
        adapter
            .create_session(NewSession {
                session_token: "sess-del".to_string(),
                user_id: user.id.clone(),
                expires: json!("2099-01-01T00:00:00Z"),
            })
            .await
            .unwrap();

        adapter.delete_user(&user.id).await.unwrap();

        assert!(adapter.get_user(&user.id).await.unwrap().is_none());
        assert!(adapter
            .get_user_by_account("google", "g-del")
            .await
            .unwrap()
            .is_none());
        assert!(adapter
            .get_session_and_user("sess-del")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_session_expiry_normalization() {
        let adapter = test_adapter().await;
        let user = adapter.create_user(candidate("sess@example.com")).await.unwrap();

        let future = Utc::now().timestamp() + 3600;
        let session = adapter
            .create_session(NewSession {
                session_token: "tok-1".to_string(),
                user_id: user.id.clone(),
                expires: json!(future),
            })
            .await
            .unwrap();
        assert_eq!(session.expires.timestamp(), future);

        let (fetched, fetched_user) = adapter
            .get_session_and_user("tok-1")
            .await
            .unwrap()
            .expect("live session resolves");
        assert_eq!(fetched.expires.timestamp(), future);
        assert_eq!(fetched_user.id, user.id);
    }

    #[tokio::test]
    async fn test_expired_session_is_absent() {
        let adapter = test_adapter().await;
        let user = adapter.create_user(candidate("old@example.com")).await.unwrap();
        adapter
            .create_session(NewSession {
                session_token: "tok-old".to_string(),
                user_id: user.id,
                expires: json!("2001-01-01T00:00:00Z"),
            })
            .await
            .unwrap();
        assert!(adapter
            .get_session_and_user("tok-old")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_sentinel_tokens_short_circuit() {
        let adapter = test_adapter().await;
        for token in ["", "null", "undefined", "  "] {
            assert!(adapter.get_session_and_user(token).await.unwrap().is_none());
            assert!(adapter
                .update_session(token, &json!("2099-01-01T00:00:00Z"))
                .await
                .unwrap()
                .is_none());
            adapter.delete_session(token).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_update_session_rewrites_expiry() {
        let adapter = test_adapter().await;
        let user = adapter.create_user(candidate("upd@example.com")).await.unwrap();
        adapter
            .create_session(NewSession {
                session_token: "tok-upd".to_string(),
                user_id: user.id,
                expires: json!("2099-01-01T00:00:00Z"),
            })
            .await
            .unwrap();

        let updated = adapter
            .update_session("tok-upd", &json!(1_950_000_000_i64))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.expires.timestamp(), 1_950_000_000);
    }

    #[tokio::test]
    async fn test_verification_token_single_use() {
        let adapter = test_adapter().await;
        let expires = Utc::now() + chrono::Duration::minutes(30);
        adapter
            .create_verification_token("alice@example.com", "vt-1", expires)
            .await
            .unwrap();

        let first = adapter
            .use_verification_token("alice@example.com", "vt-1")
            .await
            .unwrap();
        assert!(first.is_some());

        // Consumption deleted the row; a replay finds nothing.
        let second = adapter
            .use_verification_token("alice@example.com", "vt-1")
            .await
            .unwrap();
        assert!(second.is_none());
    }

    #[test]
    fn test_normalize_timestamp_shapes() {
        let rfc = normalize_timestamp(&json!("2030-06-01T12:00:00+00:00")).unwrap();
        assert_eq!(rfc.timestamp(), 1_906_545_600);

        let sqlite = normalize_timestamp(&json!("2030-06-01 12:00:00")).unwrap();
        assert_eq!(sqlite, rfc);

        let seconds = normalize_timestamp(&json!(1_906_545_600_i64)).unwrap();
        assert_eq!(seconds, rfc);

        let millis = normalize_timestamp(&json!(1_906_545_600_000_i64)).unwrap();
        assert_eq!(millis, rfc);

        let digit_string = normalize_timestamp(&json!("1906545600")).unwrap();
        assert_eq!(digit_string, rfc);

        assert!(normalize_timestamp(&json!(null)).is_none());
        assert!(normalize_timestamp(&json!("not a date")).is_none());
        assert!(normalize_timestamp(&json!({"nested": true})).is_none());
    }

    #[test]
    fn test_username_from_email() {
        assert_eq!(username_from_email("jo.hn+tag@example.com"), "johntag");
        assert_eq!(username_from_email("ALL_CAPS@example.com"), "all_caps");
        assert_eq!(username_from_email("@example.com"), "user");
    }
}
