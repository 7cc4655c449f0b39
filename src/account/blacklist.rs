/// Revoked-token store
///
/// Consulted by the authentication gate before any cryptographic check, so a
/// logged-out token is reported as revoked rather than invalid.
use crate::error::{ApiError, ApiResult};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

pub struct TokenBlacklist {
    db: SqlitePool,
}

impl TokenBlacklist {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Record a token as revoked
    ///
    /// `expires_at` is the token's own `exp` claim; the row only needs to
    /// outlive the token itself.
    pub async fn insert(
        &self,
        token: &str,
        user_id: i64,
        expires_at: DateTime<Utc>,
    ) -> ApiResult<()> {
        sqlx::query(
            "INSERT INTO blacklisted_tokens (token, user_id, blacklisted_at, expires_at)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(token)
        .bind(user_id)
        .bind(Utc::now())
        .bind(expires_at)
        .execute(&self.db)
        .await
        .map_err(ApiError::Database)?;

        Ok(())
    }

    /// Exact string-match membership test
    pub async fn contains(&self, token: &str) -> ApiResult<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM blacklisted_tokens WHERE token = ?1")
                .bind(token)
                .fetch_one(&self.db)
                .await
                .map_err(ApiError::Database)?;

        Ok(count > 0)
    }

    /// Delete entries whose tokens have expired on their own
    ///
    /// Safe because an expired JWT no longer passes signature validation
    /// regardless of blacklist membership. Returns the number deleted.
    pub async fn purge_expired(&self) -> ApiResult<u64> {
        let result = sqlx::query("DELETE FROM blacklisted_tokens WHERE expires_at < ?1")
            .bind(Utc::now())
            .execute(&self.db)
            .await
            .map_err(ApiError::Database)?;

        Ok(result.rows_affected())
    }
}
