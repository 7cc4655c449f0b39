/// Device session tracking
///
/// A secondary, application-level record of logged-in devices keyed by its
/// own opaque token, independent of the bearer JWT. Backs the "see and
/// revoke my other devices" flows.

mod registry;

pub use registry::SessionRegistry;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Response for session creation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCreated {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Account summary returned by session verification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionAccount {
    pub id: i64,
    pub pseudo: String,
    pub role: String,
}

/// Session summary returned by session verification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub expires_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

/// Verification response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiedSession {
    pub user: SessionAccount,
    pub session: SessionSummary,
}

/// One entry in the device list
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: i64,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
