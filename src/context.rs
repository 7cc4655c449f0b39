/// Application context and dependency injection
use crate::{
    account::{AccountManager, TokenBlacklist},
    config::ServerConfig,
    db,
    error::ApiResult,
    mailer::Mailer,
    session::SessionRegistry,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub accounts: Arc<AccountManager>,
    pub sessions: Arc<SessionRegistry>,
    pub blacklist: Arc<TokenBlacklist>,
    pub mailer: Arc<Mailer>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> ApiResult<Self> {
        config.validate()?;

        let config = Arc::new(config);

        // Initialize database and run embedded migrations
        let pool = db::create_pool(&config.storage.database, db::DatabaseOptions::default()).await?;
        db::run_migrations(&pool).await?;
        db::test_connection(&pool).await?;

        let accounts = Arc::new(AccountManager::new(pool.clone(), Arc::clone(&config)));
        let sessions = Arc::new(SessionRegistry::new(pool.clone(), Arc::clone(&config)));
        let blacklist = Arc::new(TokenBlacklist::new(pool.clone()));
        let mailer = Arc::new(Mailer::new(config.email.clone())?);

        Ok(Self {
            config,
            db: pool,
            accounts,
            sessions,
            blacklist,
            mailer,
        })
    }

    /// Base URL for links embedded in outgoing mail
    pub fn base_url(&self) -> String {
        self.config.base_url()
    }
}
