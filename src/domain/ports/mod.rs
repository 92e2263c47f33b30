use crate::domain::models::email_job::EmailJob;
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Aggregate view of the pending backlog, used for sweep health reporting.
#[derive(Debug, Clone, FromRow)]
pub struct PendingStats {
    pub pending_count: i64,
    pub oldest_created_at: Option<DateTime<Utc>>,
}

/// Durable queue store for email jobs.
///
/// Writers never hold locks: every mutation is a single conditional update
/// scoped by job id, checking the current status opportunistically. `claim`
/// is the only operation that registers a processing attempt.
#[async_trait]
pub trait EmailJobRepository: Send + Sync {
    async fn create(&self, job: &EmailJob) -> Result<EmailJob, AppError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<EmailJob>, AppError>;
    async fn list_recent(&self, limit: i32) -> Result<Vec<EmailJob>, AppError>;

    /// Registers a processing attempt in one conditional update: increments
    /// `retry_count` and stamps `last_attempt_at` iff the job is still
    /// pending and due. Returns the claimed row, or `None` when there is
    /// nothing to do (terminal, cancelled, unknown, or future-scheduled).
    ///
    /// This is not an exclusive lock: two concurrent claims on the same
    /// pending row both succeed. Duplicate sends are an accepted outcome.
    async fn claim(&self, id: &str, now: DateTime<Utc>) -> Result<Option<EmailJob>, AppError>;

    async fn mark_sent(&self, id: &str, now: DateTime<Utc>) -> Result<(), AppError>;

    /// Records the error of an already-claimed attempt; the job stays pending.
    async fn record_failure(&self, id: &str, error: &str, now: DateTime<Utc>)
        -> Result<(), AppError>;

    /// Terminal `failed` write without touching `retry_count`.
    async fn dead_letter(&self, id: &str, error: &str, now: DateTime<Utc>)
        -> Result<(), AppError>;

    /// Schedules the next attempt window without registering an attempt.
    async fn schedule_retry(
        &self,
        id: &str,
        next_retry_at: DateTime<Utc>,
        note: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AppError>;

    /// Registers a failed attempt (increment) and schedules its backoff.
    async fn record_failed_attempt(
        &self,
        id: &str,
        next_retry_at: DateTime<Utc>,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AppError>;

    /// Registers a failed attempt (increment) and dead-letters in one write.
    async fn dead_letter_attempt(&self, id: &str, error: &str, now: DateTime<Utc>)
        -> Result<(), AppError>;

    /// Pending -> cancelled; returns false when the job was not cancellable.
    async fn cancel(&self, id: &str, now: DateTime<Utc>) -> Result<bool, AppError>;

    /// Pending jobs past their retry window and older than `created_before`.
    async fn find_stalled(
        &self,
        created_before: DateTime<Utc>,
        now: DateTime<Utc>,
        limit: i32,
    ) -> Result<Vec<EmailJob>, AppError>;

    /// Pending jobs that were never picked up at all.
    async fn find_never_attempted(
        &self,
        created_before: DateTime<Utc>,
        now: DateTime<Utc>,
        limit: i32,
    ) -> Result<Vec<EmailJob>, AppError>;

    async fn pending_stats(&self) -> Result<PendingStats, AppError>;
}

/// Outbound transport for one delivery attempt.
///
/// No retry logic lives here; callers own backoff and attempt accounting and
/// must not call `send` more than once per logical attempt.
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// False when no provider credential is available. Callers check this
    /// before mutating any job row so a misconfigured service leaves the
    /// queue untouched.
    fn is_configured(&self) -> bool {
        true
    }

    async fn send(&self, job: &EmailJob) -> Result<(), AppError>;
}
