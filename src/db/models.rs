/// Database models for the credential store, session registry, and blacklist
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// The reserved account receiving content orphaned by hard deletion.
/// It never authenticates and is never removed.
pub const ANONYMOUS_USER_ID: i64 = 1;

/// User account record
///
/// `email` and `password` are nullable on purpose: both are cleared when the
/// lifecycle sweep anonymizes the account, and `anonymized_at` is set in the
/// same statement so the three fields move together.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub pseudo: String,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub last_login: DateTime<Utc>,
    pub is_active: bool,
    pub anonymized_at: Option<DateTime<Utc>>,
    pub reset_token: Option<String>,
    pub reset_token_expires: Option<DateTime<Utc>>,
    pub reactivation_token: Option<String>,
    pub reactivation_token_expires: Option<DateTime<Utc>>,
}

/// Device session record, keyed by its own opaque token
///
/// Independent of the JWT blacklist: this is the "see and revoke my other
/// devices" concept, not the bearer credential itself.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserSession {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

/// Revoked JWT record
///
/// `expires_at` is copied from the token's own `exp` claim; once that passes,
/// the row is safe to purge because the signature check would reject the
/// token anyway.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct BlacklistedToken {
    pub id: i64,
    pub token: String,
    pub user_id: i64,
    pub blacklisted_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
