/// Session registry backed by the user_sessions table
use crate::{
    config::ServerConfig,
    db::models::{Account, UserSession},
    error::{ApiError, ApiResult},
    session::{SessionAccount, SessionCreated, SessionInfo, SessionSummary, VerifiedSession},
};
use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

pub struct SessionRegistry {
    db: SqlitePool,
    config: Arc<ServerConfig>,
}

impl SessionRegistry {
    pub fn new(db: SqlitePool, config: Arc<ServerConfig>) -> Self {
        Self { db, config }
    }

    /// Open a session for a device
    pub async fn create(
        &self,
        user_id: i64,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> ApiResult<SessionCreated> {
        let token = Uuid::new_v4().to_string();
        let now = Utc::now();
        let expires_at = now + Duration::days(self.config.authentication.session_validity_days);

        sqlx::query(
            "INSERT INTO user_sessions (user_id, token, ip_address, user_agent, created_at, expires_at, last_activity)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(user_id)
        .bind(&token)
        .bind(&ip_address)
        .bind(&user_agent)
        .bind(now)
        .bind(expires_at)
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(ApiError::Database)?;

        Ok(SessionCreated { token, expires_at })
    }

    /// Verify an opaque session token
    ///
    /// The one verification path with a side effect: a successful check bumps
    /// `last_activity`. A record past its expiry is treated as dead even if
    /// the purge has not removed it yet.
    pub async fn verify(&self, token: &str) -> ApiResult<VerifiedSession> {
        let session = sqlx::query_as::<_, UserSession>(
            "SELECT * FROM user_sessions WHERE token = ?1 AND expires_at > ?2",
        )
        .bind(token)
        .bind(Utc::now())
        .fetch_optional(&self.db)
        .await
        .map_err(ApiError::Database)?
        .ok_or(ApiError::InvalidOrExpired)?;

        let account = sqlx::query_as::<_, Account>("SELECT * FROM users WHERE id = ?1")
            .bind(session.user_id)
            .fetch_optional(&self.db)
            .await
            .map_err(ApiError::Database)?
            .ok_or(ApiError::InvalidOrExpired)?;

        if !account.is_active {
            return Err(ApiError::AccountDisabled);
        }

        let now = Utc::now();
        sqlx::query("UPDATE user_sessions SET last_activity = ?1 WHERE id = ?2")
            .bind(now)
            .bind(session.id)
            .execute(&self.db)
            .await
            .map_err(ApiError::Database)?;

        Ok(VerifiedSession {
            user: SessionAccount {
                id: account.id,
                pseudo: account.pseudo,
                role: account.role,
            },
            session: SessionSummary {
                expires_at: session.expires_at,
                last_activity: now,
            },
        })
    }

    /// End one session, only if the caller owns it
    ///
    /// Ownership is part of the lookup, so a foreign token reports NotFound
    /// instead of leaking that the record exists.
    pub async fn end(&self, token: &str, user_id: i64) -> ApiResult<()> {
        let result = sqlx::query("DELETE FROM user_sessions WHERE token = ?1 AND user_id = ?2")
            .bind(token)
            .bind(user_id)
            .execute(&self.db)
            .await
            .map_err(ApiError::Database)?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("Session not found.".to_string()));
        }

        Ok(())
    }

    /// End every session of the caller except the current one
    pub async fn end_all_others(&self, user_id: i64, current_token: &str) -> ApiResult<u64> {
        let result = sqlx::query("DELETE FROM user_sessions WHERE user_id = ?1 AND token != ?2")
            .bind(user_id)
            .bind(current_token)
            .execute(&self.db)
            .await
            .map_err(ApiError::Database)?;

        Ok(result.rows_affected())
    }

    /// List the caller's live sessions
    pub async fn list_for_user(&self, user_id: i64) -> ApiResult<Vec<SessionInfo>> {
        let sessions = sqlx::query_as::<_, UserSession>(
            "SELECT * FROM user_sessions WHERE user_id = ?1 AND expires_at > ?2
             ORDER BY last_activity DESC",
        )
        .bind(user_id)
        .bind(Utc::now())
        .fetch_all(&self.db)
        .await
        .map_err(ApiError::Database)?;

        Ok(sessions
            .into_iter()
            .map(|s| SessionInfo {
                id: s.id,
                ip_address: s.ip_address,
                user_agent: s.user_agent,
                created_at: s.created_at,
                last_activity: s.last_activity,
                expires_at: s.expires_at,
            })
            .collect())
    }

    /// Bulk-delete expired sessions; returns the number removed
    pub async fn cleanup_expired(&self) -> ApiResult<u64> {
        let result = sqlx::query("DELETE FROM user_sessions WHERE expires_at < ?1")
            .bind(Utc::now())
            .execute(&self.db)
            .await
            .map_err(ApiError::Database)?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_support::test_config;

    async fn setup() -> SessionRegistry {
        let db = SqlitePool::connect(":memory:").await.unwrap();

        sqlx::query(
            r#"
            CREATE TABLE users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                pseudo TEXT NOT NULL UNIQUE,
                email TEXT,
                password TEXT,
                role TEXT NOT NULL DEFAULT 'user',
                created_at DATETIME NOT NULL,
                last_login DATETIME NOT NULL,
                is_active BOOLEAN NOT NULL DEFAULT 1,
                anonymized_at DATETIME,
                reset_token TEXT,
                reset_token_expires DATETIME,
                reactivation_token TEXT,
                reactivation_token_expires DATETIME
            )
            "#,
        )
        .execute(&db)
        .await
        .unwrap();

        sqlx::query(
            r#"
            CREATE TABLE user_sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id),
                token TEXT NOT NULL UNIQUE,
                ip_address TEXT,
                user_agent TEXT,
                created_at DATETIME NOT NULL,
                expires_at DATETIME NOT NULL,
                last_activity DATETIME NOT NULL
            )
            "#,
        )
        .execute(&db)
        .await
        .unwrap();

        SessionRegistry::new(db, Arc::new(test_config()))
    }

    async fn seed_user(registry: &SessionRegistry, id: i64, pseudo: &str, active: bool) {
        sqlx::query(
            "INSERT INTO users (id, pseudo, email, password, role, created_at, last_login, is_active)
             VALUES (?1, ?2, ?3, 'hash', 'user', ?4, ?4, ?5)",
        )
        .bind(id)
        .bind(pseudo)
        .bind(format!("{}@example.com", pseudo))
        .bind(Utc::now())
        .bind(active)
        .execute(&registry.db)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_create_and_verify_bumps_activity() {
        let registry = setup().await;
        seed_user(&registry, 2, "alice", true).await;

        let created = registry
            .create(2, Some("10.0.0.1".to_string()), Some("test-agent".to_string()))
            .await
            .unwrap();

        assert!(created.expires_at > Utc::now() + Duration::days(29));

        let first = registry.verify(&created.token).await.unwrap();
        assert_eq!(first.user.id, 2);
        assert_eq!(first.user.pseudo, "alice");

        let second = registry.verify(&created.token).await.unwrap();
        assert!(second.session.last_activity >= first.session.last_activity);
    }

    #[tokio::test]
    async fn test_verify_unknown_and_expired_tokens() {
        let registry = setup().await;
        seed_user(&registry, 2, "bob", true).await;

        let result = registry.verify("no-such-token").await;
        match result.unwrap_err() {
            ApiError::InvalidOrExpired => {}
            other => panic!("Expected InvalidOrExpired, got {:?}", other),
        }

        let created = registry.create(2, None, None).await.unwrap();
        sqlx::query("UPDATE user_sessions SET expires_at = ?1 WHERE token = ?2")
            .bind(Utc::now() - Duration::hours(1))
            .bind(&created.token)
            .execute(&registry.db)
            .await
            .unwrap();

        // Past expiry the record is logically dead even before any purge
        let result = registry.verify(&created.token).await;
        match result.unwrap_err() {
            ApiError::InvalidOrExpired => {}
            other => panic!("Expected InvalidOrExpired, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_verify_rejects_inactive_account() {
        let registry = setup().await;
        seed_user(&registry, 2, "carol", false).await;

        let created = registry.create(2, None, None).await.unwrap();

        let result = registry.verify(&created.token).await;
        match result.unwrap_err() {
            ApiError::AccountDisabled => {}
            other => panic!("Expected AccountDisabled, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_end_session_checks_ownership() {
        let registry = setup().await;
        seed_user(&registry, 2, "dave", true).await;
        seed_user(&registry, 3, "erin", true).await;

        let daves = registry.create(2, None, None).await.unwrap();

        // Another user ending dave's session sees NotFound, not a deletion
        let result = registry.end(&daves.token, 3).await;
        match result.unwrap_err() {
            ApiError::NotFound(_) => {}
            other => panic!("Expected NotFound, got {:?}", other),
        }
        assert!(registry.verify(&daves.token).await.is_ok());

        registry.end(&daves.token, 2).await.unwrap();
        assert!(registry.verify(&daves.token).await.is_err());
    }

    #[tokio::test]
    async fn test_end_all_others_keeps_current() {
        let registry = setup().await;
        seed_user(&registry, 2, "frank", true).await;

        let current = registry.create(2, None, None).await.unwrap();
        registry.create(2, None, None).await.unwrap();
        registry.create(2, None, None).await.unwrap();

        let removed = registry.end_all_others(2, &current.token).await.unwrap();
        assert_eq!(removed, 2);

        let remaining = registry.list_for_user(2).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert!(registry.verify(&current.token).await.is_ok());
    }

    #[tokio::test]
    async fn test_cleanup_expired_counts() {
        let registry = setup().await;
        seed_user(&registry, 2, "grace", true).await;

        let live = registry.create(2, None, None).await.unwrap();
        let dead = registry.create(2, None, None).await.unwrap();
        sqlx::query("UPDATE user_sessions SET expires_at = ?1 WHERE token = ?2")
            .bind(Utc::now() - Duration::days(1))
            .bind(&dead.token)
            .execute(&registry.db)
            .await
            .unwrap();

        let removed = registry.cleanup_expired().await.unwrap();
        assert_eq!(removed, 1);
        assert!(registry.verify(&live.token).await.is_ok());
    }

    #[tokio::test]
    async fn test_list_excludes_expired() {
        let registry = setup().await;
        seed_user(&registry, 2, "heidi", true).await;

        registry.create(2, None, None).await.unwrap();
        let dead = registry.create(2, None, None).await.unwrap();
        sqlx::query("UPDATE user_sessions SET expires_at = ?1 WHERE token = ?2")
            .bind(Utc::now() - Duration::days(1))
            .bind(&dead.token)
            .execute(&registry.db)
            .await
            .unwrap();

        let sessions = registry.list_for_user(2).await.unwrap();
        assert_eq!(sessions.len(), 1);
    }
}
