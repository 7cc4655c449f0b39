/// Background task implementations
use crate::{
    account::lifecycle::{sweep_action, SweepAction},
    context::AppContext,
    error::ApiResult,
    mailer::WarningTier,
};
use chrono::Utc;

/// Outcome of one lifecycle sweep run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    pub examined: u64,
    pub first_warnings: u64,
    pub final_warnings: u64,
    pub anonymized: u64,
    /// Accounts whose anonymization was abandoned because a login raced it
    pub skipped: u64,
}

/// Inactivity lifecycle sweep
///
/// Derives each active user account's stage from `last_login` and either
/// warns, anonymizes, or moves on. Failures are contained per account: a
/// mail or database error is logged and the loop continues, and a failed
/// notification never rolls back the state mutation it follows.
pub async fn run_lifecycle_sweep(ctx: &AppContext) -> ApiResult<SweepStats> {
    let now = Utc::now();
    let accounts = ctx.accounts.sweep_candidates().await?;

    let mut stats = SweepStats::default();

    for account in accounts {
        stats.examined += 1;

        match sweep_action(account.last_login, now, &ctx.config.lifecycle) {
            SweepAction::None => {}
            SweepAction::WarnFirst => {
                stats.first_warnings += 1;
                if let Some(email) = account.email.as_deref() {
                    if let Err(e) = ctx
                        .mailer
                        .send_inactivity_warning(email, &account.pseudo, WarningTier::OneMonth)
                        .await
                    {
                        tracing::warn!(
                            user_id = account.id,
                            "Failed to send one-month warning: {}",
                            e
                        );
                    }
                }
            }
            SweepAction::WarnFinal => {
                stats.final_warnings += 1;
                if let Some(email) = account.email.as_deref() {
                    if let Err(e) = ctx
                        .mailer
                        .send_inactivity_warning(email, &account.pseudo, WarningTier::OneWeek)
                        .await
                    {
                        tracing::warn!(
                            user_id = account.id,
                            "Failed to send one-week warning: {}",
                            e
                        );
                    }
                }
            }
            SweepAction::Anonymize => {
                // The address must be captured before the column is cleared
                let email = account.email.clone();

                match ctx.accounts.anonymize(&account).await {
                    Ok(Some(token)) => {
                        stats.anonymized += 1;
                        if let Some(email) = email {
                            if let Err(e) = ctx
                                .mailer
                                .send_reactivation_email(&email, &token, &ctx.base_url())
                                .await
                            {
                                tracing::warn!(
                                    user_id = account.id,
                                    "Failed to send reactivation link: {}",
                                    e
                                );
                            }
                        }
                    }
                    Ok(None) => {
                        stats.skipped += 1;
                        tracing::info!(
                            user_id = account.id,
                            "Anonymization skipped, account no longer eligible"
                        );
                    }
                    Err(e) => {
                        tracing::error!(user_id = account.id, "Failed to anonymize: {}", e);
                    }
                }
            }
        }
    }

    Ok(stats)
}

/// Cleanup expired blacklisted tokens
pub async fn purge_expired_blacklist(ctx: &AppContext) -> ApiResult<u64> {
    ctx.blacklist.purge_expired().await
}
