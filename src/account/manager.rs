/// Account manager implementation using runtime queries
///
/// Uses sqlx runtime query building instead of compile-time macros to avoid
/// needing DATABASE_URL during compilation.

use crate::{
    account::lifecycle::{anonymized_pseudo, generate_secret_token},
    config::ServerConfig,
    db::models::{Account, ANONYMOUS_USER_ID},
    error::{ApiError, ApiResult},
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Account manager service
pub struct AccountManager {
    db: SqlitePool,
    config: Arc<ServerConfig>,
}

impl AccountManager {
    /// Create a new account manager
    pub fn new(db: SqlitePool, config: Arc<ServerConfig>) -> Self {
        Self { db, config }
    }

    /// Create a new account
    pub async fn register(&self, pseudo: &str, email: &str, password: &str) -> ApiResult<Account> {
        self.validate_pseudo(pseudo)?;
        self.validate_email(email)?;
        self.validate_password(password)?;

        if self.email_in_use(email, None).await? {
            return Err(ApiError::EmailInUse);
        }

        if self.pseudo_in_use(pseudo, None).await? {
            return Err(ApiError::Validation("Pseudo already taken.".to_string()));
        }

        let password_hash = self.hash_password(password)?;
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO users (pseudo, email, password, role, created_at, last_login, is_active)
             VALUES (?1, ?2, ?3, 'user', ?4, ?5, 1)",
        )
        .bind(pseudo)
        .bind(email)
        .bind(&password_hash)
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(ApiError::Database)?;

        let id = result.last_insert_rowid();

        Ok(Account {
            id,
            pseudo: pseudo.to_string(),
            email: Some(email.to_string()),
            password: Some(password_hash),
            role: "user".to_string(),
            created_at: now,
            last_login: now,
            is_active: true,
            anonymized_at: None,
            reset_token: None,
            reset_token_expires: None,
            reactivation_token: None,
            reactivation_token_expires: None,
        })
    }

    /// Authenticate and issue a signed bearer token
    ///
    /// Unknown email and wrong password produce the same error so the
    /// endpoint cannot be used to enumerate accounts. State-based
    /// rejections are specific: the caller already holds valid credentials.
    pub async fn login(&self, email: &str, password: &str) -> ApiResult<(Account, String)> {
        let account = self
            .find_by_email(email)
            .await?
            .ok_or(ApiError::InvalidCredentials)?;

        // Anonymized before disabled: anonymization implies inactive, and the
        // caller must be pointed at the reactivation flow, not a dead end.
        if account.anonymized_at.is_some() {
            return Err(ApiError::AccountAnonymized);
        }

        if !account.is_active {
            return Err(ApiError::AccountDisabled);
        }

        if account.id == ANONYMOUS_USER_ID {
            return Err(ApiError::Forbidden(
                "Anonymous user cannot authenticate.".to_string(),
            ));
        }

        let hash = account
            .password
            .as_deref()
            .ok_or(ApiError::InvalidCredentials)?;
        if !self.verify_password(password, hash)? {
            return Err(ApiError::InvalidCredentials);
        }

        let now = Utc::now();
        sqlx::query("UPDATE users SET last_login = ?1 WHERE id = ?2")
            .bind(now)
            .bind(account.id)
            .execute(&self.db)
            .await
            .map_err(ApiError::Database)?;

        let token = self.generate_token(&account)?;

        let account = Account {
            last_login: now,
            ..account
        };

        Ok((account, token))
    }

    /// Get account by id
    pub async fn find_by_id(&self, id: i64) -> ApiResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>("SELECT * FROM users WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .map_err(ApiError::Database)?;

        Ok(account)
    }

    /// Get account by email
    ///
    /// Anonymized accounts hold a NULL email, so they are invisible here.
    pub async fn find_by_email(&self, email: &str) -> ApiResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>("SELECT * FROM users WHERE email = ?1")
            .bind(email)
            .fetch_optional(&self.db)
            .await
            .map_err(ApiError::Database)?;

        Ok(account)
    }

    /// Generate a password-reset token and store it on the account
    ///
    /// Returns the token and the account so the caller can dispatch the mail.
    pub async fn forgot_password(&self, email: &str) -> ApiResult<(String, Account)> {
        let account = self
            .find_by_email(email)
            .await?
            .ok_or_else(|| ApiError::NotFound("User not found.".to_string()))?;

        let token = generate_secret_token();
        let expires =
            Utc::now() + Duration::minutes(self.config.authentication.reset_token_validity_minutes);

        sqlx::query("UPDATE users SET reset_token = ?1, reset_token_expires = ?2 WHERE id = ?3")
            .bind(&token)
            .bind(expires)
            .bind(account.id)
            .execute(&self.db)
            .await
            .map_err(ApiError::Database)?;

        Ok((token, account))
    }

    /// Reset the password using a previously issued reset token
    pub async fn reset_password(&self, token: &str, new_password: &str) -> ApiResult<()> {
        self.validate_password(new_password)?;

        let account = sqlx::query_as::<_, Account>(
            "SELECT * FROM users WHERE reset_token = ?1 AND reset_token_expires > ?2",
        )
        .bind(token)
        .bind(Utc::now())
        .fetch_optional(&self.db)
        .await
        .map_err(ApiError::Database)?
        .ok_or(ApiError::BadToken("reset"))?;

        let password_hash = self.hash_password(new_password)?;

        sqlx::query(
            "UPDATE users SET password = ?1, reset_token = NULL, reset_token_expires = NULL
             WHERE id = ?2",
        )
        .bind(&password_hash)
        .bind(account.id)
        .execute(&self.db)
        .await
        .map_err(ApiError::Database)?;

        tracing::info!(user_id = account.id, "Password reset completed");

        Ok(())
    }

    /// Scrub PII from a long-inactive account and issue a reactivation token
    ///
    /// Returns `None` when the account was no longer eligible at write time
    /// (a login raced the sweep); the caller must then skip the notification.
    /// Owned content stays attached to the account id.
    pub async fn anonymize(&self, account: &Account) -> ApiResult<Option<String>> {
        let token = generate_secret_token();
        let now = Utc::now();
        let expires = now + Duration::days(self.config.lifecycle.reactivation_validity_days);
        let placeholder = anonymized_pseudo(account.id);

        // The is_active and last_login re-checks keep a concurrent login from
        // being clobbered between the sweep's read and this write.
        let result = sqlx::query(
            "UPDATE users SET email = NULL, pseudo = ?1, password = NULL, is_active = 0,
                    anonymized_at = ?2, reactivation_token = ?3, reactivation_token_expires = ?4
             WHERE id = ?5 AND is_active = 1 AND last_login <= ?6",
        )
        .bind(&placeholder)
        .bind(now)
        .bind(&token)
        .bind(expires)
        .bind(account.id)
        .bind(account.last_login)
        .execute(&self.db)
        .await
        .map_err(ApiError::Database)?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        tracing::info!(user_id = account.id, "Account anonymized");

        Ok(Some(token))
    }

    /// Check a reactivation token without mutating anything
    pub async fn verify_reactivation_token(&self, token: &str) -> ApiResult<DateTime<Utc>> {
        let account = self
            .find_by_reactivation_token(token)
            .await?
            .ok_or(ApiError::BadToken("reactivation"))?;

        // The predicate guarantees the expiry is present
        account
            .reactivation_token_expires
            .ok_or(ApiError::BadToken("reactivation"))
    }

    /// Restore an anonymized account; the only transition out of that state
    pub async fn reactivate(
        &self,
        token: &str,
        new_email: Option<&str>,
        new_password: &str,
    ) -> ApiResult<Account> {
        self.validate_password(new_password)?;

        let account = self
            .find_by_reactivation_token(token)
            .await?
            .ok_or(ApiError::BadToken("reactivation"))?;

        if let Some(email) = new_email {
            self.validate_email(email)?;
            // Uniqueness only matters among accounts still holding an email;
            // anonymized rows are NULL and cannot collide.
            if self.email_in_use(email, Some(account.id)).await? {
                return Err(ApiError::EmailInUse);
            }
        }

        let password_hash = self.hash_password(new_password)?;
        let now = Utc::now();

        sqlx::query(
            "UPDATE users SET email = ?1, password = ?2, last_login = ?3, is_active = 1,
                    anonymized_at = NULL, reactivation_token = NULL,
                    reactivation_token_expires = NULL
             WHERE id = ?4",
        )
        .bind(new_email)
        .bind(&password_hash)
        .bind(now)
        .bind(account.id)
        .execute(&self.db)
        .await
        .map_err(ApiError::Database)?;

        tracing::info!(user_id = account.id, "Account reactivated");

        self.find_by_id(account.id)
            .await?
            .ok_or_else(|| ApiError::Internal("Reactivated account vanished".to_string()))
    }

    /// Accounts the lifecycle sweep examines: ordinary active users
    pub async fn sweep_candidates(&self) -> ApiResult<Vec<Account>> {
        let accounts = sqlx::query_as::<_, Account>(
            "SELECT * FROM users WHERE role = 'user' AND is_active = 1",
        )
        .fetch_all(&self.db)
        .await
        .map_err(ApiError::Database)?;

        Ok(accounts)
    }

    async fn find_by_reactivation_token(&self, token: &str) -> ApiResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT * FROM users WHERE reactivation_token = ?1
             AND reactivation_token_expires >= ?2",
        )
        .bind(token)
        .bind(Utc::now())
        .fetch_optional(&self.db)
        .await
        .map_err(ApiError::Database)?;

        Ok(account)
    }

    /// Check if an email is held by another account
    async fn email_in_use(&self, email: &str, exclude_id: Option<i64>) -> ApiResult<bool> {
        let count: i64 = match exclude_id {
            Some(id) => {
                sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ?1 AND id != ?2")
                    .bind(email)
                    .bind(id)
                    .fetch_one(&self.db)
                    .await
            }
            None => sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ?1")
                .bind(email)
                .fetch_one(&self.db)
                .await,
        }
        .map_err(ApiError::Database)?;

        Ok(count > 0)
    }

    async fn pseudo_in_use(&self, pseudo: &str, exclude_id: Option<i64>) -> ApiResult<bool> {
        let count: i64 = match exclude_id {
            Some(id) => {
                sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE pseudo = ?1 AND id != ?2")
                    .bind(pseudo)
                    .bind(id)
                    .fetch_one(&self.db)
                    .await
            }
            None => sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE pseudo = ?1")
                .bind(pseudo)
                .fetch_one(&self.db)
                .await,
        }
        .map_err(ApiError::Database)?;

        Ok(count > 0)
    }

    /// Hash a password with Argon2id
    fn hash_password(&self, password: &str) -> ApiResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| ApiError::Internal(format!("Password hashing failed: {}", e)))?;

        Ok(hash.to_string())
    }

    /// Verify a password against a stored hash
    fn verify_password(&self, password: &str, hash: &str) -> ApiResult<bool> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| ApiError::Internal(format!("Stored hash is malformed: {}", e)))?;

        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }

    /// Generate the signed bearer token embedding id and role
    fn generate_token(&self, account: &Account) -> ApiResult<String> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        use serde::Serialize;

        #[derive(Debug, Serialize)]
        struct Claims {
            sub: i64,
            role: String,
            iat: i64,
            exp: i64,
        }

        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: account.id,
            role: account.role.clone(),
            iat: now,
            exp: now + self.config.authentication.token_validity_days * 24 * 3600,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.authentication.jwt_secret.as_bytes()),
        )
        .map_err(|e| ApiError::Jwt(format!("Failed to generate token: {}", e)))?;

        Ok(token)
    }

    fn validate_pseudo(&self, pseudo: &str) -> ApiResult<()> {
        if pseudo.len() < 3 {
            return Err(ApiError::Validation(
                "Pseudo must be at least 3 characters".to_string(),
            ));
        }

        if pseudo.len() > 50 {
            return Err(ApiError::Validation("Pseudo too long".to_string()));
        }

        if !pseudo
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ApiError::Validation(
                "Pseudo contains invalid characters".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_email(&self, email: &str) -> ApiResult<()> {
        if !email.contains('@') || email.len() > 255 {
            return Err(ApiError::Validation("Invalid email format".to_string()));
        }

        Ok(())
    }

    fn validate_password(&self, password: &str) -> ApiResult<()> {
        if password.len() < 8 {
            return Err(ApiError::Validation(
                "Password must be at least 8 characters".to_string(),
            ));
        }

        Ok(())
    }
}
