use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{error, info};

pub mod tasks;

/// Job scheduler for background tasks
///
/// Owns the periodic state explicitly instead of hiding a last-run timestamp
/// in process-global state, so several instances behave the same way.
pub struct JobScheduler {
    context: Arc<crate::context::AppContext>,
}

impl JobScheduler {
    pub fn new(context: Arc<crate::context::AppContext>) -> Self {
        Self { context }
    }

    /// Start all background jobs
    pub fn start(self: Arc<Self>) {
        info!("Starting background job scheduler");

        tokio::spawn(Self::lifecycle_sweep_job(Arc::clone(&self)));
        tokio::spawn(Self::blacklist_cleanup_job(Arc::clone(&self)));

        info!("Background jobs started");
    }

    /// Inactivity lifecycle sweep (runs daily by default)
    async fn lifecycle_sweep_job(scheduler: Arc<Self>) {
        let period = scheduler.context.config.lifecycle.sweep_interval_secs;
        let mut interval = interval(Duration::from_secs(period));

        loop {
            interval.tick().await;
            info!("Running inactivity lifecycle sweep");

            match tasks::run_lifecycle_sweep(&scheduler.context).await {
                Ok(stats) => {
                    info!(
                        examined = stats.examined,
                        first_warnings = stats.first_warnings,
                        final_warnings = stats.final_warnings,
                        anonymized = stats.anonymized,
                        skipped = stats.skipped,
                        "Lifecycle sweep finished"
                    );
                }
                Err(e) => error!("Lifecycle sweep failed: {}", e),
            }
        }
    }

    /// Cleanup expired blacklist entries (runs every hour)
    async fn blacklist_cleanup_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(3600)); // Every hour

        loop {
            interval.tick().await;

            match tasks::purge_expired_blacklist(&scheduler.context).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Cleaned up {} expired blacklisted tokens", count);
                    }
                }
                Err(e) => error!("Failed to cleanup blacklisted tokens: {}", e),
            }
        }
    }
}
