/// Authentication and account lifecycle endpoints
use crate::{
    account::{
        ForgotPasswordRequest, LoginRequest, LoginResponse, PublicProfile, ReactivateRequest,
        ReactivationTokenInfo, RegisterRequest, ResetPasswordRequest, Role,
    },
    api::MessageResponse,
    auth::{token_expiry, AuthContext},
    context::AppContext,
    error::ApiResult,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

/// Build auth routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/forgot-password", post(forgot_password))
        .route("/api/auth/reset-password/:token", post(reset_password))
        .route("/api/auth/verify-reactivate/:token", get(verify_reactivate))
        .route("/api/auth/reactivate/:token", post(reactivate))
}

/// Register endpoint
async fn register(
    State(ctx): State<AppContext>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    ctx.accounts
        .register(&req.pseudo, &req.email, &req.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("Account created successfully.")),
    ))
}

/// Login endpoint
async fn login(
    State(ctx): State<AppContext>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let (account, token) = ctx.accounts.login(&req.email, &req.password).await?;

    Ok(Json(LoginResponse {
        token,
        user: PublicProfile {
            id: account.id,
            pseudo: account.pseudo,
            role: Role::parse(&account.role),
        },
    }))
}

/// Logout endpoint
///
/// Writes the presented token into the blacklist with its own expiry. A
/// replayed token never reaches this handler again: the gate rejects it as
/// revoked first.
async fn logout(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> ApiResult<Json<MessageResponse>> {
    let expires_at = token_expiry(&auth.token, &ctx.config.authentication.jwt_secret)?;

    ctx.blacklist
        .insert(&auth.token, auth.user.id, expires_at)
        .await?;

    Ok(Json(MessageResponse::new("Logged out successfully.")))
}

/// Forgot-password endpoint
async fn forgot_password(
    State(ctx): State<AppContext>,
    Json(req): Json<ForgotPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let (token, account) = ctx.accounts.forgot_password(&req.email).await?;

    // The state mutation already happened; a mail failure is logged, not
    // surfaced, matching the lifecycle notifications.
    if ctx.mailer.is_configured() {
        if let Some(email) = account.email.as_deref() {
            if let Err(e) = ctx
                .mailer
                .send_password_reset_email(email, &account.pseudo, &token, &ctx.base_url())
                .await
            {
                tracing::warn!(user_id = account.id, "Failed to send reset email: {}", e);
            }
        }
    } else {
        tracing::warn!("Email not configured, reset token generated but not sent");
    }

    Ok(Json(MessageResponse::new(
        "A password reset link has been sent to your email address.",
    )))
}

/// Reset-password endpoint
async fn reset_password(
    State(ctx): State<AppContext>,
    Path(token): Path<String>,
    Json(req): Json<ResetPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    ctx.accounts.reset_password(&token, &req.new_password).await?;

    Ok(Json(MessageResponse::new("Password reset successfully.")))
}

/// Reactivation token probe endpoint
///
/// Read-only: lets the client display the remaining validity before asking
/// for new credentials.
async fn verify_reactivate(
    State(ctx): State<AppContext>,
    Path(token): Path<String>,
) -> ApiResult<Json<ReactivationTokenInfo>> {
    let expires_at = ctx.accounts.verify_reactivation_token(&token).await?;

    Ok(Json(ReactivationTokenInfo {
        valid: true,
        expires_at,
    }))
}

/// Reactivation endpoint
async fn reactivate(
    State(ctx): State<AppContext>,
    Path(token): Path<String>,
    Json(req): Json<ReactivateRequest>,
) -> ApiResult<Json<MessageResponse>> {
    ctx.accounts
        .reactivate(&token, req.new_email.as_deref(), &req.new_password)
        .await?;

    Ok(Json(MessageResponse::new(
        "Account reactivated successfully.",
    )))
}
