use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Deserialize)]
pub struct ProcessEmailRequest {
    pub email_id: String,
    /// Informational fields sent by some triggers; logged, never trusted for
    /// attempt accounting (the claim owns that).
    #[serde(default)]
    pub retry_count: Option<i32>,
    #[serde(default)]
    pub manual_trigger: Option<bool>,
}

#[derive(Deserialize)]
pub struct CreateEmailJobRequest {
    pub recipient_email: String,
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub max_retries: Option<i32>,
}
