/// Authentication extractors and token utilities
use crate::{
    account::Role,
    api::middleware::extract_bearer_token,
    context::AppContext,
    db::models::ANONYMOUS_USER_ID,
    error::ApiError,
};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use chrono::{DateTime, TimeZone, Utc};

/// The authenticated principal attached to a request
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub role: Role,
    pub pseudo: String,
}

/// Authenticated context - validates the bearer token on extraction
///
/// The checks run in a fixed order: blacklist before signature, so a revoked
/// token is reported as revoked even though it would still verify; account
/// state only after the cryptographic check. Extraction is a pure guard and
/// never writes.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user: AuthUser,
    /// Raw bearer token, kept for logout blacklisting
    pub token: String,
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers).ok_or(ApiError::Unauthenticated)?;

        if state.blacklist.contains(&token).await? {
            return Err(ApiError::Revoked);
        }

        let token_data = verify_jwt_token(&token, &state.config.authentication.jwt_secret)?;
        let user_id = token_data
            .claims
            .get("sub")
            .and_then(|v| v.as_i64())
            .ok_or(ApiError::InvalidOrExpired)?;

        let account = state
            .accounts
            .find_by_id(user_id)
            .await?
            .ok_or(ApiError::AccountNoLongerValid)?;

        if !account.is_active || account.anonymized_at.is_some() {
            return Err(ApiError::AccountNoLongerValid);
        }

        if account.id == ANONYMOUS_USER_ID {
            return Err(ApiError::Forbidden(
                "Anonymous user cannot authenticate.".to_string(),
            ));
        }

        Ok(AuthContext {
            user: AuthUser {
                id: account.id,
                role: Role::parse(&account.role),
                pseudo: account.pseudo,
            },
            token,
        })
    }
}

/// Admin authentication context - requires the admin role
#[derive(Debug, Clone)]
pub struct AdminAuthContext {
    pub user: AuthUser,
    pub token: String,
}

#[async_trait]
impl FromRequestParts<AppContext> for AdminAuthContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let auth = AuthContext::from_request_parts(parts, state).await?;

        if auth.user.role != Role::Admin {
            return Err(ApiError::Forbidden("Admin role required.".to_string()));
        }

        Ok(AdminAuthContext {
            user: auth.user,
            token: auth.token,
        })
    }
}

/// Verify a JWT token with full validation
///
/// This performs:
/// 1. JWT signature verification
/// 2. Expiration checking
pub fn verify_jwt_token(
    token: &str,
    jwt_secret: &str,
) -> Result<jsonwebtoken::TokenData<serde_json::Value>, ApiError> {
    use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

    let decoding_key = DecodingKey::from_secret(jwt_secret.as_bytes());
    let validation = Validation::new(Algorithm::HS256);

    decode::<serde_json::Value>(token, &decoding_key, &validation).map_err(|e| {
        tracing::debug!("JWT verification failed: {}", e);
        ApiError::InvalidOrExpired
    })
}

/// Read the `exp` claim of an already-verified token
///
/// Logout copies this into the blacklist row so the entry lives exactly as
/// long as the token it bans.
pub fn token_expiry(token: &str, jwt_secret: &str) -> Result<DateTime<Utc>, ApiError> {
    let token_data = verify_jwt_token(token, jwt_secret)?;

    let exp = token_data
        .claims
        .get("exp")
        .and_then(|v| v.as_i64())
        .ok_or(ApiError::InvalidOrExpired)?;

    Utc.timestamp_opt(exp, 0)
        .single()
        .ok_or(ApiError::InvalidOrExpired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        account::{AccountManager, TokenBlacklist},
        config::test_support::test_config,
        mailer::Mailer,
        session::SessionRegistry,
    };
    use chrono::Duration;
    use sqlx::SqlitePool;
    use std::sync::Arc;

    async fn create_test_context() -> AppContext {
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
            CREATE TABLE blacklisted_tokens (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                token TEXT NOT NULL UNIQUE,
                user_id INTEGER NOT NULL,
                blacklisted_at DATETIME NOT NULL,
                expires_at DATETIME NOT NULL
            )
            "#,
        )
        .execute(&db)
        .await
        .unwrap();

        // Reserved anonymous account
        sqlx::query(
            "INSERT INTO users (id, pseudo, email, password, role, created_at, last_login, is_active, anonymized_at)
             VALUES (1, 'Anonymous', NULL, NULL, 'user', ?1, ?1, 0, ?1)",
        )
        .bind(Utc::now())
        .execute(&db)
        .await
        .unwrap();

        let config = Arc::new(test_config());

        AppContext {
            config: Arc::clone(&config),
            db: db.clone(),
            accounts: Arc::new(AccountManager::new(db.clone(), Arc::clone(&config))),
            sessions: Arc::new(SessionRegistry::new(db.clone(), Arc::clone(&config))),
            blacklist: Arc::new(TokenBlacklist::new(db)),
            mailer: Arc::new(Mailer::new(None).unwrap()),
        }
    }

    fn request_parts(token: Option<&str>) -> Parts {
        let mut builder = axum::http::Request::builder().uri("/");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let (parts, _body) = builder.body(()).unwrap().into_parts();
        parts
    }

    fn forge_token(ctx: &AppContext, user_id: i64, role: &str, exp_offset_secs: i64) -> String {
        use jsonwebtoken::{encode, EncodingKey, Header};

        let now = Utc::now().timestamp();
        let claims = serde_json::json!({
            "sub": user_id,
            "role": role,
            "iat": now,
            "exp": now + exp_offset_secs,
        });

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(ctx.config.authentication.jwt_secret.as_bytes()),
        )
        .unwrap()
    }

    async fn register_and_login(ctx: &AppContext, pseudo: &str) -> (i64, String) {
        let account = ctx
            .accounts
            .register(pseudo, &format!("{}@example.com", pseudo), "password123")
            .await
            .unwrap();
        let (_account, token) = ctx
            .accounts
            .login(&format!("{}@example.com", pseudo), "password123")
            .await
            .unwrap();
        (account.id, token)
    }

    #[tokio::test]
    async fn test_gate_missing_token() {
        let ctx = create_test_context().await;
        let mut parts = request_parts(None);

        let result = AuthContext::from_request_parts(&mut parts, &ctx).await;
        match result.unwrap_err() {
            ApiError::Unauthenticated => {}
            other => panic!("Expected Unauthenticated, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_gate_accepts_valid_token() {
        let ctx = create_test_context().await;
        let (id, token) = register_and_login(&ctx, "alice").await;

        let mut parts = request_parts(Some(&token));
        let auth = AuthContext::from_request_parts(&mut parts, &ctx)
            .await
            .unwrap();

        assert_eq!(auth.user.id, id);
        assert_eq!(auth.user.pseudo, "alice");
        assert_eq!(auth.user.role, Role::User);
        assert_eq!(auth.token, token);
    }

    #[tokio::test]
    async fn test_gate_blacklist_wins_over_signature() {
        let ctx = create_test_context().await;

        // A token that would never verify is still reported as revoked,
        // because the blacklist is consulted before the signature
        ctx.blacklist
            .insert("not.even.a-jwt", 2, Utc::now() + Duration::days(1))
            .await
            .unwrap();

        let mut parts = request_parts(Some("not.even.a-jwt"));
        let result = AuthContext::from_request_parts(&mut parts, &ctx).await;
        match result.unwrap_err() {
            ApiError::Revoked => {}
            other => panic!("Expected Revoked, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_gate_rejects_logged_out_token_as_revoked() {
        let ctx = create_test_context().await;
        let (id, token) = register_and_login(&ctx, "bob").await;

        // Logout path: blacklist the token with its own expiry
        let expires_at = token_expiry(&token, &ctx.config.authentication.jwt_secret).unwrap();
        ctx.blacklist.insert(&token, id, expires_at).await.unwrap();

        let mut parts = request_parts(Some(&token));
        let result = AuthContext::from_request_parts(&mut parts, &ctx).await;
        match result.unwrap_err() {
            ApiError::Revoked => {}
            other => panic!("Expected Revoked, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_gate_rejects_garbled_token() {
        let ctx = create_test_context().await;

        let mut parts = request_parts(Some("garbage"));
        let result = AuthContext::from_request_parts(&mut parts, &ctx).await;
        match result.unwrap_err() {
            ApiError::InvalidOrExpired => {}
            other => panic!("Expected InvalidOrExpired, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_gate_rejects_expired_token() {
        let ctx = create_test_context().await;
        let (id, _token) = register_and_login(&ctx, "carol").await;

        let expired = forge_token(&ctx, id, "user", -3600);

        let mut parts = request_parts(Some(&expired));
        let result = AuthContext::from_request_parts(&mut parts, &ctx).await;
        match result.unwrap_err() {
            ApiError::InvalidOrExpired => {}
            other => panic!("Expected InvalidOrExpired, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_gate_rejects_stale_account_states() {
        let ctx = create_test_context().await;
        let (id, token) = register_and_login(&ctx, "dave").await;

        // Deleted account
        let ghost = forge_token(&ctx, 9999, "user", 3600);
        let mut parts = request_parts(Some(&ghost));
        let result = AuthContext::from_request_parts(&mut parts, &ctx).await;
        match result.unwrap_err() {
            ApiError::AccountNoLongerValid => {}
            other => panic!("Expected AccountNoLongerValid, got {:?}", other),
        }

        // Disabled account, cryptographically valid token
        sqlx::query("UPDATE users SET is_active = 0 WHERE id = ?1")
            .bind(id)
            .execute(&ctx.db)
            .await
            .unwrap();

        let mut parts = request_parts(Some(&token));
        let result = AuthContext::from_request_parts(&mut parts, &ctx).await;
        match result.unwrap_err() {
            ApiError::AccountNoLongerValid => {}
            other => panic!("Expected AccountNoLongerValid, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_gate_blocks_reserved_anonymous_account() {
        let ctx = create_test_context().await;

        // Even a well-signed token naming the reserved account is refused;
        // force the row active to prove the guard alone is enough
        sqlx::query("UPDATE users SET is_active = 1, anonymized_at = NULL WHERE id = 1")
            .execute(&ctx.db)
            .await
            .unwrap();

        let token = forge_token(&ctx, 1, "user", 3600);
        let mut parts = request_parts(Some(&token));
        let result = AuthContext::from_request_parts(&mut parts, &ctx).await;
        match result.unwrap_err() {
            ApiError::Forbidden(_) => {}
            other => panic!("Expected Forbidden, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_admin_context_requires_admin_role() {
        let ctx = create_test_context().await;
        let (id, token) = register_and_login(&ctx, "erin").await;

        let mut parts = request_parts(Some(&token));
        let result = AdminAuthContext::from_request_parts(&mut parts, &ctx).await;
        match result.unwrap_err() {
            ApiError::Forbidden(_) => {}
            other => panic!("Expected Forbidden, got {:?}", other),
        }

        sqlx::query("UPDATE users SET role = 'admin' WHERE id = ?1")
            .bind(id)
            .execute(&ctx.db)
            .await
            .unwrap();

        let mut parts = request_parts(Some(&token));
        let admin = AdminAuthContext::from_request_parts(&mut parts, &ctx)
            .await
            .unwrap();
        assert_eq!(admin.user.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_token_expiry_matches_claim() {
        let ctx = create_test_context().await;
        let token = forge_token(&ctx, 2, "user", 7 * 24 * 3600);

        let expiry = token_expiry(&token, &ctx.config.authentication.jwt_secret).unwrap();

        let delta = expiry - Utc::now();
        assert!(delta > Duration::days(6));
        assert!(delta <= Duration::days(7));
    }
}
