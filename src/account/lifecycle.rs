/// Inactivity lifecycle arithmetic
///
/// Stages are never stored; each sweep derives them from `last_login`. Every
/// check uses a window exactly one sweep period wide so that re-running the
/// sweep within the same day fires each tier at most once: an account whose
/// first-warning window matched is short-circuited before the tighter
/// windows are even considered. If the sweep skips more than a day, an
/// account can skip a warning tier entirely; the deadline window itself is
/// open-ended so anonymization is never missed.
use crate::config::LifecycleConfig;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use uuid::Uuid;

/// Action the sweep takes for one account on one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepAction {
    None,
    WarnFirst,
    WarnFinal,
    Anonymize,
}

/// Derive the action for an account from its last login time
pub fn sweep_action(
    last_login: DateTime<Utc>,
    now: DateTime<Utc>,
    config: &LifecycleConfig,
) -> SweepAction {
    let window = Duration::days(1);
    let deadline = last_login + Duration::days(config.inactivity_days);
    let first_warning = deadline - Duration::days(config.first_warning_days);
    let final_warning = deadline - Duration::days(config.final_warning_days);

    if now >= first_warning && now < first_warning + window {
        SweepAction::WarnFirst
    } else if now >= final_warning && now < final_warning + window {
        SweepAction::WarnFinal
    } else if now >= deadline {
        SweepAction::Anonymize
    } else {
        SweepAction::None
    }
}

/// Collision-safe placeholder pseudo for an anonymized account
///
/// Embeds the account id plus a random suffix so repeated anonymizations
/// can never violate the unique pseudo constraint.
pub fn anonymized_pseudo(user_id: i64) -> String {
    format!("anonymized_{}_{}", user_id, Uuid::new_v4().simple())
}

/// High-entropy opaque token for reactivation and password-reset links
pub fn generate_secret_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
