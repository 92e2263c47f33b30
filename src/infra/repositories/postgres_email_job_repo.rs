use crate::domain::models::email_job::EmailJob;
use crate::domain::ports::{EmailJobRepository, PendingStats};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

pub struct PostgresEmailJobRepo {
    pool: PgPool,
}

impl PostgresEmailJobRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EmailJobRepository for PostgresEmailJobRepo {
    async fn create(&self, job: &EmailJob) -> Result<EmailJob, AppError> {
        sqlx::query_as::<_, EmailJob>(
            "INSERT INTO email_jobs (id, recipient_email, subject, body, status, scheduled_at, retry_count, max_retries, next_retry_at, last_attempt_at, sent_at, error_message, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) RETURNING *",
        )
        .bind(&job.id)
        .bind(&job.recipient_email)
        .bind(&job.subject)
        .bind(&job.body)
        .bind(job.status)
        .bind(job.scheduled_at)
        .bind(job.retry_count)
        .bind(job.max_retries)
        .bind(job.next_retry_at)
        .bind(job.last_attempt_at)
        .bind(job.sent_at)
        .bind(&job.error_message)
        .bind(job.created_at)
        .bind(job.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::Database)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<EmailJob>, AppError> {
        sqlx::query_as::<_, EmailJob>("SELECT * FROM email_jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn list_recent(&self, limit: i32) -> Result<Vec<EmailJob>, AppError> {
        sqlx::query_as::<_, EmailJob>(
            "SELECT * FROM email_jobs ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)
    }

    async fn claim(&self, id: &str, now: DateTime<Utc>) -> Result<Option<EmailJob>, AppError> {
        sqlx::query_as::<_, EmailJob>(
            "UPDATE email_jobs \
             SET retry_count = retry_count + 1, last_attempt_at = $1, updated_at = $1 \
             WHERE id = $2 AND status IN ('pending', 'rate_limited') AND scheduled_at <= $1 \
             RETURNING *",
        )
        .bind(now)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)
    }

    async fn mark_sent(&self, id: &str, now: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE email_jobs \
             SET status = 'sent', sent_at = $1, error_message = NULL, next_retry_at = NULL, updated_at = $1 \
             WHERE id = $2",
        )
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(AppError::Database)?;
        Ok(())
    }

    async fn record_failure(
        &self,
        id: &str,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE email_jobs SET error_message = $1, updated_at = $2 \
             WHERE id = $3 AND status IN ('pending', 'rate_limited')",
        )
        .bind(error)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(AppError::Database)?;
        Ok(())
    }

    async fn dead_letter(&self, id: &str, error: &str, now: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE email_jobs \
             SET status = 'failed', error_message = $1, next_retry_at = NULL, updated_at = $2 \
             WHERE id = $3 AND status IN ('pending', 'rate_limited')",
        )
        .bind(error)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(AppError::Database)?;
        Ok(())
    }

    async fn schedule_retry(
        &self,
        id: &str,
        next_retry_at: DateTime<Utc>,
        note: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE email_jobs SET next_retry_at = $1, error_message = $2, updated_at = $3 \
             WHERE id = $4 AND status IN ('pending', 'rate_limited')",
        )
        .bind(next_retry_at)
        .bind(note)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(AppError::Database)?;
        Ok(())
    }

    async fn record_failed_attempt(
        &self,
        id: &str,
        next_retry_at: DateTime<Utc>,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE email_jobs \
             SET retry_count = retry_count + 1, last_attempt_at = $1, next_retry_at = $2, error_message = $3, updated_at = $1 \
             WHERE id = $4 AND status IN ('pending', 'rate_limited')",
        )
        .bind(now)
        .bind(next_retry_at)
        .bind(error)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(AppError::Database)?;
        Ok(())
    }

    async fn dead_letter_attempt(
        &self,
        id: &str,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE email_jobs \
             SET retry_count = retry_count + 1, last_attempt_at = $1, status = 'failed', next_retry_at = NULL, error_message = $2, updated_at = $1 \
             WHERE id = $3 AND status IN ('pending', 'rate_limited')",
        )
        .bind(now)
        .bind(error)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(AppError::Database)?;
        Ok(())
    }

    async fn cancel(&self, id: &str, now: DateTime<Utc>) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE email_jobs SET status = 'cancelled', updated_at = $1 \
             WHERE id = $2 AND status IN ('pending', 'rate_limited')",
        )
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(AppError::Database)?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_stalled(
        &self,
        created_before: DateTime<Utc>,
        now: DateTime<Utc>,
        limit: i32,
    ) -> Result<Vec<EmailJob>, AppError> {
        sqlx::query_as::<_, EmailJob>(
            "SELECT * FROM email_jobs \
             WHERE status IN ('pending', 'rate_limited') \
               AND (next_retry_at IS NULL OR next_retry_at < $1) \
               AND created_at < $2 \
               AND scheduled_at <= $1 \
             ORDER BY created_at ASC \
             LIMIT $3",
        )
        .bind(now)
        .bind(created_before)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)
    }

    async fn find_never_attempted(
        &self,
        created_before: DateTime<Utc>,
        now: DateTime<Utc>,
        limit: i32,
    ) -> Result<Vec<EmailJob>, AppError> {
        sqlx::query_as::<_, EmailJob>(
            "SELECT * FROM email_jobs \
             WHERE status IN ('pending', 'rate_limited') \
               AND created_at < $1 \
               AND scheduled_at <= $2 \
               AND (retry_count = 0 OR last_attempt_at IS NULL) \
             ORDER BY created_at ASC \
             LIMIT $3",
        )
        .bind(created_before)
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)
    }

    async fn pending_stats(&self) -> Result<PendingStats, AppError> {
        sqlx::query_as::<_, PendingStats>(
            "SELECT COUNT(*) AS pending_count, MIN(created_at) AS oldest_created_at \
             FROM email_jobs WHERE status IN ('pending', 'rate_limited')",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::Database)
    }
}
