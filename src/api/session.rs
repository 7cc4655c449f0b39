/// Device session endpoints
use crate::{
    api::{middleware::extract_user_agent, MessageResponse},
    auth::{AdminAuthContext, AuthContext},
    context::AppContext,
    error::ApiResult,
    session::{SessionCreated, SessionInfo, VerifiedSession},
};
use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Build session routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/sessions", post(create_session).get(list_sessions))
        .route("/api/sessions/verify/:token", get(verify_session))
        .route("/api/sessions/revoke-others", delete(end_all_others))
        .route("/api/sessions/cleanup", delete(cleanup_expired))
        .route("/api/sessions/:token", delete(end_session))
}

/// Device list response
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionInfo>,
}

/// Bulk revocation response
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionsRemoved {
    pub removed: u64,
}

/// Expired-session cleanup response
#[derive(Debug, Serialize, Deserialize)]
pub struct CleanupResponse {
    pub deleted: u64,
}

#[derive(Debug, Deserialize)]
struct RevokeOthersParams {
    /// The opaque token of the session the caller wants to keep
    current: String,
}

/// Create a session for the calling device
async fn create_session(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> ApiResult<(StatusCode, Json<SessionCreated>)> {
    let created = ctx
        .sessions
        .create(
            auth.user.id,
            Some(addr.ip().to_string()),
            extract_user_agent(&headers),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(created)))
}

/// List the caller's live sessions
async fn list_sessions(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> ApiResult<Json<SessionListResponse>> {
    let sessions = ctx.sessions.list_for_user(auth.user.id).await?;

    Ok(Json(SessionListResponse { sessions }))
}

/// Verify an opaque session token
async fn verify_session(
    State(ctx): State<AppContext>,
    Path(token): Path<String>,
) -> ApiResult<Json<VerifiedSession>> {
    let verified = ctx.sessions.verify(&token).await?;

    Ok(Json(verified))
}

/// End one of the caller's sessions
async fn end_session(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(token): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    ctx.sessions.end(&token, auth.user.id).await?;

    Ok(Json(MessageResponse::new("Session ended successfully.")))
}

/// End every session of the caller except the one it names
async fn end_all_others(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Query(params): Query<RevokeOthersParams>,
) -> ApiResult<Json<SessionsRemoved>> {
    let removed = ctx
        .sessions
        .end_all_others(auth.user.id, &params.current)
        .await?;

    Ok(Json(SessionsRemoved { removed }))
}

/// Purge expired sessions (admin only)
async fn cleanup_expired(
    State(ctx): State<AppContext>,
    _admin: AdminAuthContext,
) -> ApiResult<Json<CleanupResponse>> {
    let deleted = ctx.sessions.cleanup_expired().await?;

    tracing::info!(deleted, "Expired sessions cleaned up");

    Ok(Json(CleanupResponse { deleted }))
}
