/// Configuration management for the BiblioTech service
use crate::error::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authentication: AuthConfig,
    pub lifecycle: LifecycleConfig,
    pub email: Option<EmailConfig>,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    /// Public base URL embedded in reset/reactivation links
    pub public_url: Option<String>,
    pub version: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database: PathBuf,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Bearer token validity window in days
    pub token_validity_days: i64,
    /// Opaque device-session validity window in days
    pub session_validity_days: i64,
    /// Password reset token validity in minutes
    pub reset_token_validity_minutes: i64,
}

/// Inactivity lifecycle configuration
///
/// The sweep derives each account's stage from `last_login` arithmetic, so
/// these four durations fully describe the state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Days of inactivity before anonymization
    pub inactivity_days: i64,
    /// Days before the deadline at which the first warning fires
    pub first_warning_days: i64,
    /// Days before the deadline at which the final warning fires
    pub final_warning_days: i64,
    /// Validity of the reactivation token issued at anonymization, in days
    pub reactivation_validity_days: i64,
    /// Seconds between sweep runs
    pub sweep_interval_secs: u64,
}

/// Email configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_url: String,
    pub from_address: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> ApiResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("BIBLIOTECH_HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("BIBLIOTECH_PORT")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .map_err(|_| ApiError::Validation("Invalid port number".to_string()))?;
        let public_url = env::var("BIBLIOTECH_PUBLIC_URL").ok();
        let version = env::var("BIBLIOTECH_VERSION").unwrap_or_else(|_| "0.1.0".to_string());

        let data_directory: PathBuf = env::var("BIBLIOTECH_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let database = env::var("BIBLIOTECH_DB_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("bibliotech.sqlite"));

        let jwt_secret = env::var("BIBLIOTECH_JWT_SECRET")
            .map_err(|_| ApiError::Validation("JWT secret required".to_string()))?;
        let token_validity_days = env::var("BIBLIOTECH_TOKEN_VALIDITY_DAYS")
            .unwrap_or_else(|_| "7".to_string())
            .parse()
            .unwrap_or(7);
        let session_validity_days = env::var("BIBLIOTECH_SESSION_VALIDITY_DAYS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .unwrap_or(30);
        let reset_token_validity_minutes = env::var("BIBLIOTECH_RESET_TOKEN_VALIDITY_MINUTES")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .unwrap_or(60);

        let inactivity_days = env::var("BIBLIOTECH_INACTIVITY_DAYS")
            .unwrap_or_else(|_| "1095".to_string())
            .parse()
            .unwrap_or(1095);
        let first_warning_days = env::var("BIBLIOTECH_FIRST_WARNING_DAYS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .unwrap_or(30);
        let final_warning_days = env::var("BIBLIOTECH_FINAL_WARNING_DAYS")
            .unwrap_or_else(|_| "7".to_string())
            .parse()
            .unwrap_or(7);
        let reactivation_validity_days = env::var("BIBLIOTECH_REACTIVATION_VALIDITY_DAYS")
            .unwrap_or_else(|_| "7".to_string())
            .parse()
            .unwrap_or(7);
        let sweep_interval_secs = env::var("BIBLIOTECH_SWEEP_INTERVAL_SECS")
            .unwrap_or_else(|_| "86400".to_string())
            .parse()
            .unwrap_or(86400);

        let email = if let Ok(smtp_url) = env::var("BIBLIOTECH_EMAIL_SMTP_URL") {
            Some(EmailConfig {
                smtp_url,
                from_address: env::var("BIBLIOTECH_EMAIL_FROM_ADDRESS")
                    .unwrap_or_else(|_| format!("noreply@{}", hostname)),
            })
        } else {
            None
        };

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                public_url,
                version,
            },
            storage: StorageConfig {
                data_directory,
                database,
            },
            authentication: AuthConfig {
                jwt_secret,
                token_validity_days,
                session_validity_days,
                reset_token_validity_minutes,
            },
            lifecycle: LifecycleConfig {
                inactivity_days,
                first_warning_days,
                final_warning_days,
                reactivation_validity_days,
                sweep_interval_secs,
            },
            email,
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> ApiResult<()> {
        if self.service.hostname.is_empty() {
            return Err(ApiError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.authentication.jwt_secret.len() < 32 {
            return Err(ApiError::Validation(
                "JWT secret must be at least 32 characters".to_string(),
            ));
        }

        if self.lifecycle.first_warning_days <= self.lifecycle.final_warning_days {
            return Err(ApiError::Validation(
                "First warning must precede the final warning".to_string(),
            ));
        }

        if self.lifecycle.inactivity_days <= self.lifecycle.first_warning_days {
            return Err(ApiError::Validation(
                "Inactivity threshold must exceed the warning lead times".to_string(),
            ));
        }

        Ok(())
    }

    /// Base URL for links embedded in outgoing mail
    pub fn base_url(&self) -> String {
        self.service
            .public_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.service.hostname, self.service.port))
    }
}
