use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::domain::ports::{EmailJobRepository, EmailSender};
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The job was claimed and the provider accepted the message.
    Sent,
    /// Nothing to do: unknown id, already terminal, cancelled, or not yet due.
    Skipped,
}

/// Single-attempt delivery unit behind the webhook trigger.
///
/// One call performs at most one provider send: claim the row, send, write
/// the resulting state. Retry scheduling is owned by the recovery sweeps.
pub struct DeliveryService {
    jobs: Arc<dyn EmailJobRepository>,
    sender: Arc<dyn EmailSender>,
}

impl DeliveryService {
    pub fn new(jobs: Arc<dyn EmailJobRepository>, sender: Arc<dyn EmailSender>) -> Self {
        Self { jobs, sender }
    }

    pub async fn process(&self, job_id: &str) -> Result<DeliveryOutcome, AppError> {
        // Checked before the claim so a misconfigured service leaves the job
        // untouched instead of burning a retry attempt.
        if !self.sender.is_configured() {
            return Err(AppError::Configuration(
                "no provider API key is set".to_string(),
            ));
        }

        let now = Utc::now();
        let Some(job) = self.jobs.claim(job_id, now).await? else {
            info!(job_id, "nothing to deliver (already processed or not due)");
            return Ok(DeliveryOutcome::Skipped);
        };

        match self.sender.send(&job).await {
            Ok(()) => {
                self.jobs.mark_sent(&job.id, Utc::now()).await?;
                info!(job_id = %job.id, recipient = %job.recipient_email, "email sent");
                Ok(DeliveryOutcome::Sent)
            }
            Err(err) => {
                let message = err.to_string();
                // The claim already counted this attempt; job.retry_count is
                // the post-increment value.
                if job.exhausted() {
                    warn!(
                        job_id = %job.id,
                        retry_count = job.retry_count,
                        error = %message,
                        "delivery failed, retries exhausted"
                    );
                    self.jobs.dead_letter(&job.id, &message, Utc::now()).await?;
                } else {
                    warn!(
                        job_id = %job.id,
                        attempt = job.retry_count,
                        error = %message,
                        "delivery attempt failed"
                    );
                    self.jobs.record_failure(&job.id, &message, Utc::now()).await?;
                }
                Err(err)
            }
        }
    }
}
