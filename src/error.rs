/// Unified error types for the BiblioTech service
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the service
#[derive(Error, Debug)]
pub enum ApiError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Missing or garbled bearer token
    #[error("Unauthorized.")]
    Unauthenticated,

    /// Token present in the blacklist
    #[error("Token has been revoked.")]
    Revoked,

    /// Bad signature or past expiry, JWT or opaque session token alike
    #[error("Invalid or expired token.")]
    InvalidOrExpired,

    /// Account deleted, disabled, or anonymized at auth time
    #[error("Account no longer valid.")]
    AccountNoLongerValid,

    /// Credential mismatch; deliberately indistinguishable from unknown email
    #[error("Invalid credentials.")]
    InvalidCredentials,

    /// Account exists but is deactivated
    #[error("Account disabled.")]
    AccountDisabled,

    /// Account was anonymized; the reactivation flow is the way back in
    #[error("Account anonymized. Use your reactivation link to restore access.")]
    AccountAnonymized,

    /// Authorization errors, including the reserved-account guard
    #[error("Access denied: {0}")]
    Forbidden(String),

    /// Reset or reactivation token rejected
    #[error("Invalid or expired {0} token.")]
    BadToken(&'static str),

    /// Email already held by an active account
    #[error("Email already in use.")]
    EmailInUse,

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JWT errors
    #[error("JWT error: {0}")]
    Jwt(String),

    /// Mail dispatch errors
    #[error("Mail error: {0}")]
    Mail(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Convert ApiError to HTTP response
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "Unauthenticated",
                self.to_string(),
            ),
            ApiError::Revoked => (
                StatusCode::UNAUTHORIZED,
                "TokenRevoked",
                self.to_string(),
            ),
            ApiError::InvalidOrExpired => (
                StatusCode::UNAUTHORIZED,
                "InvalidToken",
                self.to_string(),
            ),
            ApiError::AccountNoLongerValid => (
                StatusCode::UNAUTHORIZED,
                "AccountNoLongerValid",
                self.to_string(),
            ),
            ApiError::InvalidCredentials => (
                StatusCode::BAD_REQUEST,
                "InvalidCredentials",
                self.to_string(),
            ),
            ApiError::AccountDisabled => (
                StatusCode::FORBIDDEN,
                "AccountDisabled",
                self.to_string(),
            ),
            ApiError::AccountAnonymized => (
                StatusCode::FORBIDDEN,
                "AccountAnonymized",
                self.to_string(),
            ),
            ApiError::Forbidden(_) => (
                StatusCode::FORBIDDEN,
                "Forbidden",
                self.to_string(),
            ),
            ApiError::BadToken(_) => (
                StatusCode::BAD_REQUEST,
                "InvalidToken",
                self.to_string(),
            ),
            ApiError::EmailInUse => (
                StatusCode::BAD_REQUEST,
                "EmailInUse",
                self.to_string(),
            ),
            ApiError::Validation(_) => (
                StatusCode::BAD_REQUEST,
                "InvalidRequest",
                self.to_string(),
            ),
            ApiError::NotFound(_) => (
                StatusCode::NOT_FOUND,
                "NotFound",
                self.to_string(),
            ),
            ApiError::Database(_)
            | ApiError::Io(_)
            | ApiError::Jwt(_)
            | ApiError::Mail(_)
            | ApiError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "InternalServerError",
                "Internal server error".to_string(), // Don't leak details
            ),
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for service operations
pub type ApiResult<T> = Result<T, ApiError>;
