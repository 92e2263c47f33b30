use crate::domain::models::email_job::EmailJob;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Clamp on the backoff exponent; `2^16 * base` is already far beyond any
/// realistic retry ceiling and keeps the shift well inside i32 range.
const MAX_BACKOFF_EXPONENT: i32 = 16;

/// Exponential backoff keyed by how many attempts the job has consumed:
/// `base * 2^n`, so with the default 2-minute base the schedule runs
/// 2, 4, 8, ... minutes.
pub fn backoff_delay(retry_count: i32, base: Duration) -> Duration {
    let exp = retry_count.clamp(0, MAX_BACKOFF_EXPONENT) as u32;
    base * 2_i32.pow(exp)
}

/// Which staleness sweep is asking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StalenessRule {
    /// General staleness: pending, past any scheduled retry window.
    Stalled,
    /// The narrower "never picked up at all" sweep.
    NeverAttempted,
}

/// The single staleness definition shared by the monitor and the reaper.
///
/// A job is only ever stale when it is still pending, already due, and older
/// than `threshold`; the rule then adds its own condition on top.
pub fn is_stale(
    job: &EmailJob,
    rule: StalenessRule,
    threshold: Duration,
    now: DateTime<Utc>,
) -> bool {
    if !job.status.is_pending() || !job.is_due(now) {
        return false;
    }
    if job.created_at + threshold >= now {
        return false;
    }
    match rule {
        StalenessRule::Stalled => job.next_retry_at.is_none_or(|t| t < now),
        StalenessRule::NeverAttempted => job.retry_count == 0 || job.last_attempt_at.is_none(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

/// Coarse queue-health classification for the monitor report.
pub fn classify_health(stuck_count: usize, oldest_pending_age: Option<Duration>) -> HealthStatus {
    let oldest = oldest_pending_age.unwrap_or_else(Duration::zero);
    if stuck_count > 10 || oldest > Duration::minutes(60) {
        HealthStatus::Critical
    } else if stuck_count <= 5 && oldest <= Duration::minutes(30) {
        HealthStatus::Healthy
    } else {
        HealthStatus::Warning
    }
}
