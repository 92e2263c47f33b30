use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle state of a queued email.
///
/// `rate_limited` is a display label written by operator tooling; every
/// scheduling decision treats it as `pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailStatus {
    Pending,
    Sent,
    Failed,
    Cancelled,
    RateLimited,
}

impl EmailStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailStatus::Pending => "pending",
            EmailStatus::Sent => "sent",
            EmailStatus::Failed => "failed",
            EmailStatus::Cancelled => "cancelled",
            EmailStatus::RateLimited => "rate_limited",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(EmailStatus::Pending),
            "sent" => Some(EmailStatus::Sent),
            "failed" => Some(EmailStatus::Failed),
            "cancelled" => Some(EmailStatus::Cancelled),
            "rate_limited" => Some(EmailStatus::RateLimited),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EmailStatus::Sent | EmailStatus::Failed | EmailStatus::Cancelled
        )
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, EmailStatus::Pending | EmailStatus::RateLimited)
    }
}

// Stored as plain text so the SQLite and Postgres backends share one mapping.

impl<DB: sqlx::Database> sqlx::Type<DB> for EmailStatus
where
    str: sqlx::Type<DB>,
{
    fn type_info() -> DB::TypeInfo {
        <str as sqlx::Type<DB>>::type_info()
    }

    fn compatible(ty: &DB::TypeInfo) -> bool {
        <str as sqlx::Type<DB>>::compatible(ty)
    }
}

impl<'q, DB: sqlx::Database> sqlx::Encode<'q, DB> for EmailStatus
where
    &'q str: sqlx::Encode<'q, DB>,
{
    fn encode_by_ref(
        &self,
        buf: &mut DB::ArgumentBuffer<'q>,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <&str as sqlx::Encode<'q, DB>>::encode_by_ref(&self.as_str(), buf)
    }
}

impl<'r, DB: sqlx::Database> sqlx::Decode<'r, DB> for EmailStatus
where
    &'r str: sqlx::Decode<'r, DB>,
{
    fn decode(value: DB::ValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let raw = <&str as sqlx::Decode<'r, DB>>::decode(value)?;
        EmailStatus::parse(raw).ok_or_else(|| format!("unknown email status: {}", raw).into())
    }
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct EmailJob {
    pub id: String,
    pub recipient_email: String,
    pub subject: String,
    pub body: String,
    pub status: EmailStatus,
    pub scheduled_at: DateTime<Utc>,
    pub retry_count: i32,
    pub max_retries: i32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EmailJob {
    pub fn new(
        recipient_email: String,
        subject: String,
        body: String,
        scheduled_at: Option<DateTime<Utc>>,
        max_retries: i32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            recipient_email,
            subject,
            body,
            status: EmailStatus::Pending,
            scheduled_at: scheduled_at.unwrap_or(now),
            retry_count: 0,
            max_retries,
            next_retry_at: None,
            last_attempt_at: None,
            sent_at: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Future-dated jobs are inert until their scheduled time passes.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_at <= now
    }

    pub fn exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }
}
