/// BiblioTech account lifecycle and session service
///
/// Handles registration, login, token revocation, multi-device sessions, and
/// the inactivity anonymization machinery behind the BiblioTech library
/// platform.

mod account;
mod api;
mod auth;
mod config;
mod context;
mod db;
mod error;
mod jobs;
mod mailer;
mod server;
mod session;

use config::ServerConfig;
use context::AppContext;
use error::ApiResult;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ApiResult<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bibliotech=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    print_banner();

    // Load configuration
    let config = ServerConfig::from_env()?;

    // Create application context
    let ctx = AppContext::new(config).await?;
    let ctx = Arc::new(ctx);

    // Start background jobs
    let scheduler = Arc::new(jobs::JobScheduler::new(Arc::clone(&ctx)));
    scheduler.start();

    // Start server
    server::serve((*ctx).clone()).await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
    ____  _ __    ___      ______          __
   / __ )(_) /_  / (_)___ /_  __/__  _____/ /_
  / __  / / __ \/ / / __ \ / / / _ \/ ___/ __ \
 / /_/ / / /_/ / / / /_/ // / /  __/ /__/ / / /
/_____/_/_.___/_/_/\____//_/  \___/\___/_/ /_/

        Account & Session Service v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
