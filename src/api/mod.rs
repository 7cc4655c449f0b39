/// API routes and handlers
pub mod auth;
pub mod middleware;
pub mod session;

use crate::context::AppContext;
use axum::Router;
use serde::{Deserialize, Serialize};

/// Plain confirmation envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new().merge(auth::routes()).merge(session::routes())
}
