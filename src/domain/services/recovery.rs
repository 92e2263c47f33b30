use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::domain::models::email_job::{EmailJob, EmailStatus};
use crate::domain::ports::{EmailJobRepository, EmailSender};
use crate::domain::services::delivery::{DeliveryOutcome, DeliveryService};
use crate::domain::services::schedule::{
    backoff_delay, classify_health, is_stale, HealthStatus, StalenessRule,
};
use crate::error::AppError;

/// Upper bound per sweep; anything beyond it is picked up by the next run.
const SWEEP_BATCH_LIMIT: i32 = 100;

#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    pub stale_after: Duration,
    pub unattempted_after: Duration,
    pub retry_base: Duration,
    pub reaper_delay: StdDuration,
}

impl RecoveryConfig {
    pub fn from_app_config(config: &Config) -> Self {
        Self {
            stale_after: Duration::seconds(config.stale_after_secs),
            unattempted_after: Duration::seconds(config.unattempted_after_secs),
            retry_base: Duration::seconds(config.retry_base_secs),
            reaper_delay: StdDuration::from_millis(config.reaper_delay_ms),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StuckEmail {
    pub id: String,
    pub recipient_email: String,
    pub retry_count: i32,
    pub age_minutes: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetriedEmail {
    pub id: String,
    pub attempt: i32,
    pub max_retries: i32,
    pub next_retry_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorMetrics {
    pub pending_count: i64,
    pub stuck_count: usize,
    pub retried_count: usize,
    pub dead_lettered_count: usize,
    pub oldest_pending_age_minutes: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorReport {
    pub timestamp: DateTime<Utc>,
    pub stuck_emails: Vec<StuckEmail>,
    pub retried_emails: Vec<RetriedEmail>,
    pub dead_lettered: Vec<String>,
    pub health_status: HealthStatus,
    pub metrics: MonitorMetrics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryMethod {
    Webhook,
    Direct,
    None,
}

#[derive(Debug, Serialize)]
pub struct ReaperDetail {
    pub id: String,
    pub recipient_email: String,
    pub method: RecoveryMethod,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReaperReport {
    pub success: bool,
    pub message: String,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub details: Vec<ReaperDetail>,
}

/// Periodic recovery over the queue store, invoked one-shot by external
/// triggers. Two strategies share the same claim/backoff/dead-letter
/// primitives: the broad staleness sweep and the narrower never-attempted
/// sweep with its direct-send fallback.
pub struct RecoveryService {
    jobs: Arc<dyn EmailJobRepository>,
    sender: Arc<dyn EmailSender>,
    delivery: Arc<DeliveryService>,
    config: RecoveryConfig,
}

impl RecoveryService {
    pub fn new(
        jobs: Arc<dyn EmailJobRepository>,
        sender: Arc<dyn EmailSender>,
        delivery: Arc<DeliveryService>,
        config: RecoveryConfig,
    ) -> Self {
        Self {
            jobs,
            sender,
            delivery,
            config,
        }
    }

    /// Staleness sweep: dead-letter exhausted jobs, schedule backoff for the
    /// rest and re-trigger delivery. One job's failure never aborts the
    /// sweep for its siblings.
    pub async fn sweep_stale(&self) -> Result<MonitorReport, AppError> {
        if !self.sender.is_configured() {
            return Err(AppError::Configuration(
                "no provider API key is set".to_string(),
            ));
        }

        let now = Utc::now();
        let created_before = now - self.config.stale_after;
        let candidates = self
            .jobs
            .find_stalled(created_before, now, SWEEP_BATCH_LIMIT)
            .await?;
        let stuck: Vec<EmailJob> = candidates
            .into_iter()
            .filter(|job| is_stale(job, StalenessRule::Stalled, self.config.stale_after, now))
            .collect();

        let mut retried: Vec<RetriedEmail> = Vec::new();
        let mut dead_lettered: Vec<String> = Vec::new();

        for job in &stuck {
            if job.exhausted() {
                if let Err(err) = self
                    .jobs
                    .dead_letter(&job.id, "max retries exceeded", now)
                    .await
                {
                    error!(job_id = %job.id, error = %err, "failed to dead-letter exhausted job");
                    continue;
                }
                info!(
                    job_id = %job.id,
                    retry_count = job.retry_count,
                    "dead-lettered: max retries exceeded"
                );
                dead_lettered.push(job.id.clone());
                continue;
            }

            let attempt = job.retry_count + 1;
            let next_retry_at = now + backoff_delay(job.retry_count, self.config.retry_base);
            let note = format!(
                "auto-retry {}/{}: stuck email detected",
                attempt, job.max_retries
            );
            // Committed before the trigger: if the trigger hangs or the
            // process dies here, the backoff window is already in place and
            // the next sweep cannot re-attempt early.
            if let Err(err) = self
                .jobs
                .schedule_retry(&job.id, next_retry_at, &note, now)
                .await
            {
                error!(job_id = %job.id, error = %err, "failed to schedule retry");
                continue;
            }

            if let Err(err) = self.delivery.process(&job.id).await {
                warn!(job_id = %job.id, error = %err, "triggered retry attempt failed");
            }
            retried.push(RetriedEmail {
                id: job.id.clone(),
                attempt,
                max_retries: job.max_retries,
                next_retry_at,
            });
        }

        let stats = self.jobs.pending_stats().await?;
        let oldest_age = stats.oldest_created_at.map(|t| now - t);
        let health_status = classify_health(stuck.len(), oldest_age);

        info!(
            stuck = stuck.len(),
            retried = retried.len(),
            dead_lettered = dead_lettered.len(),
            health = ?health_status,
            "stuck-email sweep finished"
        );

        let stuck_emails: Vec<StuckEmail> = stuck
            .iter()
            .map(|job| StuckEmail {
                id: job.id.clone(),
                recipient_email: job.recipient_email.clone(),
                retry_count: job.retry_count,
                age_minutes: (now - job.created_at).num_minutes(),
            })
            .collect();
        let metrics = MonitorMetrics {
            pending_count: stats.pending_count,
            stuck_count: stuck_emails.len(),
            retried_count: retried.len(),
            dead_lettered_count: dead_lettered.len(),
            oldest_pending_age_minutes: oldest_age.map_or(0, |d| d.num_minutes()),
        };

        Ok(MonitorReport {
            timestamp: now,
            stuck_emails,
            retried_emails: retried,
            dead_lettered,
            health_status,
            metrics,
        })
    }

    /// Never-attempted sweep: jobs whose post-insert trigger was silently
    /// dropped. Tries the canonical delivery path first, then falls back to
    /// sending directly in-process.
    pub async fn sweep_never_attempted(&self) -> Result<ReaperReport, AppError> {
        if !self.sender.is_configured() {
            return Err(AppError::Configuration(
                "no provider API key is set".to_string(),
            ));
        }

        let now = Utc::now();
        let created_before = now - self.config.unattempted_after;
        let candidates = self
            .jobs
            .find_never_attempted(created_before, now, SWEEP_BATCH_LIMIT)
            .await?;
        let targets: Vec<EmailJob> = candidates
            .into_iter()
            .filter(|job| {
                is_stale(
                    job,
                    StalenessRule::NeverAttempted,
                    self.config.unattempted_after,
                    now,
                )
            })
            .collect();

        let mut details: Vec<ReaperDetail> = Vec::new();
        for (idx, job) in targets.iter().enumerate() {
            if idx > 0 {
                // Serializes provider calls within one sweep. A deliberate
                // throttle against the provider's global rate limit; do not
                // parallelize.
                sleep(self.config.reaper_delay).await;
            }
            details.push(self.recover_one(job).await);
        }

        let processed = details.len();
        let succeeded = details.iter().filter(|d| d.success).count();
        let failed = processed - succeeded;
        let message = format!(
            "processed {} never-attempted jobs ({} succeeded, {} failed)",
            processed, succeeded, failed
        );
        info!(processed, succeeded, failed, "backup reaper sweep finished");

        Ok(ReaperReport {
            success: true,
            message,
            processed,
            succeeded,
            failed,
            details,
        })
    }

    async fn recover_one(&self, job: &EmailJob) -> ReaperDetail {
        match self.delivery.process(&job.id).await {
            Ok(DeliveryOutcome::Sent) => detail(job, RecoveryMethod::Webhook, true, None),
            Ok(DeliveryOutcome::Skipped) => detail(job, RecoveryMethod::None, true, None),
            Err(err) => {
                warn!(
                    job_id = %job.id,
                    error = %err,
                    "webhook path failed, falling back to direct send"
                );
                self.direct_send(job).await
            }
        }
    }

    /// Fallback path: send in-process and perform the same transition write
    /// the delivery unit would have done. The failed webhook attempt already
    /// consumed this pass's retry increment, so a direct success only
    /// finalizes the row; only a direct failure registers a further attempt.
    async fn direct_send(&self, job: &EmailJob) -> ReaperDetail {
        let fresh = match self.jobs.find_by_id(&job.id).await {
            Ok(Some(fresh)) => fresh,
            Ok(None) => {
                return detail(
                    job,
                    RecoveryMethod::None,
                    false,
                    Some("job no longer exists".to_string()),
                )
            }
            Err(err) => {
                error!(job_id = %job.id, error = %err, "failed to re-read job for direct send");
                return detail(job, RecoveryMethod::None, false, Some(err.to_string()));
            }
        };

        // The webhook attempt may have dead-lettered it, or a concurrent
        // trigger may have finished it.
        if !fresh.status.is_pending() {
            let success = fresh.status == EmailStatus::Sent;
            let error = fresh.error_message.clone();
            return detail(&fresh, RecoveryMethod::None, success, error);
        }

        match self.sender.send(&fresh).await {
            Ok(()) => {
                if let Err(err) = self.jobs.mark_sent(&fresh.id, Utc::now()).await {
                    error!(job_id = %fresh.id, error = %err, "direct send succeeded but status write failed");
                    return detail(&fresh, RecoveryMethod::Direct, false, Some(err.to_string()));
                }
                info!(job_id = %fresh.id, recipient = %fresh.recipient_email, "recovered via direct send");
                detail(&fresh, RecoveryMethod::Direct, true, None)
            }
            Err(err) => {
                let message = err.to_string();
                let now = Utc::now();
                let write = if fresh.retry_count + 1 >= fresh.max_retries {
                    self.jobs.dead_letter_attempt(&fresh.id, &message, now).await
                } else {
                    let next_retry_at =
                        now + backoff_delay(fresh.retry_count, self.config.retry_base);
                    self.jobs
                        .record_failed_attempt(&fresh.id, next_retry_at, &message, now)
                        .await
                };
                if let Err(db_err) = write {
                    error!(job_id = %fresh.id, error = %db_err, "failed to record direct-send failure");
                }
                detail(&fresh, RecoveryMethod::Direct, false, Some(message))
            }
        }
    }
}

fn detail(
    job: &EmailJob,
    method: RecoveryMethod,
    success: bool,
    error: Option<String>,
) -> ReaperDetail {
    ReaperDetail {
        id: job.id.clone(),
        recipient_email: job.recipient_email.clone(),
        method,
        success,
        error,
    }
}
