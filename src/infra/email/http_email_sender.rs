use crate::domain::models::email_job::EmailJob;
use crate::domain::ports::EmailSender;
use crate::error::AppError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::error;

/// Request timeout for the provider call; a hung provider is a normal
/// retryable failure, not a stuck sweep.
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpEmailSender {
    client: Client,
    api_url: String,
    api_key: Option<String>,
    from_address: String,
}

impl HttpEmailSender {
    pub fn new(api_url: String, api_key: Option<String>, from_address: String) -> Self {
        let client = Client::builder()
            .timeout(PROVIDER_TIMEOUT)
            .build()
            .expect("Failed to build email HTTP client");
        Self {
            client,
            api_url,
            api_key,
            from_address,
        }
    }
}

#[derive(Serialize)]
struct SendEmailPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

#[async_trait]
impl EmailSender for HttpEmailSender {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn send(&self, job: &EmailJob) -> Result<(), AppError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            AppError::Configuration("MAIL_API_KEY is not set".to_string())
        })?;

        let payload = SendEmailPayload {
            from: &self.from_address,
            to: &job.recipient_email,
            subject: &job.subject,
            html: &job.body,
        };

        let res = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                let kind = if e.is_timeout() {
                    "timeout"
                } else if e.is_connect() {
                    "connection error"
                } else {
                    "network error"
                };
                let msg = format!("email provider {}: {}", kind, e);
                error!("{}", msg);
                AppError::Provider(msg)
            })?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            // Classified for the error_message only; every provider failure
            // is equally retryable and counts against the same ceiling.
            let kind = if status == reqwest::StatusCode::UNAUTHORIZED
                || status == reqwest::StatusCode::FORBIDDEN
            {
                "rejected credentials"
            } else if status.is_client_error() {
                "rejected the message"
            } else {
                "internal error"
            };
            let msg = format!("email provider {} ({}): {}", kind, status, text);
            error!("{}", msg);
            return Err(AppError::Provider(msg));
        }

        Ok(())
    }
}
