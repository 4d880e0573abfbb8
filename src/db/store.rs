//! Credential store gateway.
//!
//! Thin, logic-free data access over the identity tables. Lookups that
//! find nothing return `Ok(None)`; storage failures propagate as errors
//! and are never swallowed here. All decisions (expiry, linking,
//! uniqueness recovery) belong to the callers.

use sqlx::SqlitePool;

use super::models::{Account, Profile, RecoveryToken, Session, User, VerificationToken};

#[derive(Debug, Clone)]
pub struct IdentityStore {
    pool: SqlitePool,
}

impl IdentityStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ── users ──────────────────────────────────────────────────────

    pub async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn insert_user(&self, user: &User) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO users (id, email, name, username, image, hashed_password, email_verified, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.username)
        .bind(&user.image)
        .bind(&user.hashed_password)
        .bind(&user.email_verified)
        .bind(&user.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Update the named columns on a user row. Callers are responsible
    /// for passing only real column names.
    pub async fn update_user_fields(
        &self,
        id: &str,
        fields: &[(&str, Option<String>)],
    ) -> Result<(), sqlx::Error> {
        if fields.is_empty() {
            return Ok(());
        }
        let assignments: Vec<String> = fields.iter().map(|(col, _)| format!("{col} = ?")).collect();
        let sql = format!("UPDATE users SET {} WHERE id = ?", assignments.join(", "));
        let mut query = sqlx::query(&sql);
        for (_, value) in fields {
            query = query.bind(value);
        }
        query.bind(id).execute(&self.pool).await?;
        Ok(())
    }

    pub async fn set_user_password(&self, id: &str, hashed: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET hashed_password = ? WHERE id = ?")
            .bind(hashed)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_user(&self, id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ── profiles ───────────────────────────────────────────────────

    pub async fn find_profile_by_user_id(
        &self,
        user_id: &str,
    ) -> Result<Option<Profile>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM profiles WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn find_profile_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Profile>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM profiles WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn insert_profile(&self, profile: &Profile) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO profiles (id, user_id, username, avatar_url, bio, is_admin)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&profile.id)
        .bind(&profile.user_id)
        .bind(&profile.username)
        .bind(&profile.avatar_url)
        .bind(&profile.bio)
        .bind(profile.is_admin)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_profile(
        &self,
        user_id: &str,
        bio: &Option<String>,
        avatar_url: &Option<String>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE profiles SET bio = COALESCE(?, bio), avatar_url = COALESCE(?, avatar_url)
             WHERE user_id = ?",
        )
        .bind(bio)
        .bind(avatar_url)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ── accounts ───────────────────────────────────────────────────

    pub async fn find_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<Option<Account>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM accounts WHERE provider = ? AND provider_account_id = ?")
            .bind(provider)
            .bind(provider_account_id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn insert_account(&self, account: &Account) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO accounts (id, user_id, provider, provider_account_id, access_token,
                                   refresh_token, expires_at, token_type, scope, id_token)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&account.id)
        .bind(&account.user_id)
        .bind(&account.provider)
        .bind(&account.provider_account_id)
        .bind(&account.access_token)
        .bind(&account.refresh_token)
        .bind(&account.expires_at)
        .bind(&account.token_type)
        .bind(&account.scope)
        .bind(&account.id_token)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM accounts WHERE provider = ? AND provider_account_id = ?")
            .bind(provider)
            .bind(provider_account_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_accounts_for_user(&self, user_id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM accounts WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ── sessions ───────────────────────────────────────────────────

    pub async fn find_session(&self, session_token: &str) -> Result<Option<Session>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM sessions WHERE session_token = ?")
            .bind(session_token)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn insert_session(&self, session: &Session) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO sessions (id, session_token, user_id, expires) VALUES (?, ?, ?, ?)")
            .bind(&session.id)
            .bind(&session.session_token)
            .bind(&session.user_id)
            .bind(&session.expires)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn update_session_expiry(
        &self,
        session_token: &str,
        expires: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE sessions SET expires = ? WHERE session_token = ?")
            .bind(expires)
            .bind(session_token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_session(&self, session_token: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM sessions WHERE session_token = ?")
            .bind(session_token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_sessions_for_user(&self, user_id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ── verification tokens ────────────────────────────────────────

    pub async fn insert_verification_token(
        &self,
        token: &VerificationToken,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO verification_tokens (identifier, token, expires) VALUES (?, ?, ?)")
            .bind(&token.identifier)
            .bind(&token.token)
            .bind(&token.expires)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete-and-return. The returned row is the proof of single-use
    /// consumption; `None` means the token was invalid or already used.
    pub async fn take_verification_token(
        &self,
        identifier: &str,
        token: &str,
    ) -> Result<Option<VerificationToken>, sqlx::Error> {
        sqlx::query_as(
            "DELETE FROM verification_tokens WHERE identifier = ? AND token = ?
             RETURNING identifier, token, expires",
        )
        .bind(identifier)
        .bind(token)
        .fetch_optional(&self.pool)
        .await
    }

    // ── recovery tokens ────────────────────────────────────────────

    /// Insert a recovery token, displacing any prior token for the same
    /// (user, purpose).
    pub async fn replace_recovery_token(&self, token: &RecoveryToken) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM recovery_tokens WHERE user_id = ? AND purpose = ?")
            .bind(&token.user_id)
            .bind(&token.purpose)
            .execute(&self.pool)
            .await?;
        sqlx::query(
            "INSERT INTO recovery_tokens (token_hash, user_id, purpose, expires_at, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&token.token_hash)
        .bind(&token.user_id)
        .bind(&token.purpose)
        .bind(&token.expires_at)
        .bind(&token.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_recovery_token(
        &self,
        token_hash: &str,
        purpose: &str,
    ) -> Result<Option<RecoveryToken>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM recovery_tokens WHERE token_hash = ? AND purpose = ?")
            .bind(token_hash)
            .bind(purpose)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn delete_recovery_token(&self, token_hash: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM recovery_tokens WHERE token_hash = ?")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
