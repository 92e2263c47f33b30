#![allow(dead_code)]

use mailqueue_backend::{
    api::router::create_router,
    config::Config,
    domain::models::email_job::EmailJob,
    domain::ports::{EmailJobRepository, EmailSender},
    domain::services::delivery::DeliveryService,
    domain::services::recovery::{RecoveryConfig, RecoveryService},
    error::AppError,
    infra::repositories::sqlite_email_job_repo::SqliteEmailJobRepo,
    state::AppState,
};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_TOKEN: &str = "test-service-token";

#[derive(Clone, Copy)]
pub enum SendBehavior {
    Succeed,
    AlwaysFail,
    /// Fail the first n sends, then succeed.
    FailTimes(u32),
}

pub struct MockEmailSender {
    behavior: SendBehavior,
    attempts: AtomicU32,
    pub sent_to: Mutex<Vec<String>>,
    configured: bool,
}

impl MockEmailSender {
    pub fn new(behavior: SendBehavior) -> Self {
        Self {
            behavior,
            attempts: AtomicU32::new(0),
            sent_to: Mutex::new(Vec::new()),
            configured: true,
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            behavior: SendBehavior::Succeed,
            attempts: AtomicU32::new(0),
            sent_to: Mutex::new(Vec::new()),
            configured: false,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmailSender for MockEmailSender {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn send(&self, job: &EmailJob) -> Result<(), AppError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        let fail = match self.behavior {
            SendBehavior::Succeed => false,
            SendBehavior::AlwaysFail => true,
            SendBehavior::FailTimes(n) => attempt < n,
        };
        if fail {
            return Err(AppError::Provider(
                "simulated provider failure".to_string(),
            ));
        }
        self.sent_to.lock().unwrap().push(job.recipient_email.clone());
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub pool: Pool<Sqlite>,
    pub db_filename: String,
    pub state: Arc<AppState>,
    pub sender: Arc<MockEmailSender>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_sender(MockEmailSender::new(SendBehavior::Succeed)).await
    }

    pub async fn with_sender(sender: MockEmailSender) -> Self {
        let db_filename = format!("test_{}.db", Uuid::new_v4());
        let db_url = format!("sqlite://{}?mode=rwc", db_filename);

        let connection_options = SqliteConnectOptions::from_str(&db_url)
            .unwrap()
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .connect_with(connection_options)
            .await
            .expect("Failed to connect to test db");

        sqlx::migrate!("./migrations/sqlite")
            .run(&pool)
            .await
            .expect("Failed to migrate test db");

        let config = Config {
            database_url: db_url.clone(),
            port: 0,
            mail_api_url: "http://localhost".to_string(),
            mail_api_key: Some("test-key".to_string()),
            mail_from: "noreply@test.local".to_string(),
            service_token: TEST_TOKEN.to_string(),
            stale_after_secs: 600,
            unattempted_after_secs: 30,
            retry_base_secs: 120,
            default_max_retries: 3,
            // Short enough to keep the throttle test fast, long enough to
            // measure.
            reaper_delay_ms: 120,
        };

        let sender = Arc::new(sender);
        let job_repo: Arc<dyn EmailJobRepository> = Arc::new(SqliteEmailJobRepo::new(pool.clone()));
        let email_sender: Arc<dyn EmailSender> = sender.clone();
        let delivery_service = Arc::new(DeliveryService::new(
            job_repo.clone(),
            email_sender.clone(),
        ));
        let recovery_service = Arc::new(RecoveryService::new(
            job_repo.clone(),
            email_sender.clone(),
            delivery_service.clone(),
            RecoveryConfig::from_app_config(&config),
        ));

        let state = Arc::new(AppState {
            config,
            job_repo,
            email_sender,
            delivery_service,
            recovery_service,
        });

        let router = create_router(state.clone());

        Self {
            router,
            pool,
            db_filename,
            state,
            sender,
        }
    }

    pub async fn insert_job(&self, recipient: &str) -> EmailJob {
        let job = EmailJob::new(
            recipient.to_string(),
            "Cadet record update".to_string(),
            "<p>Your record was updated.</p>".to_string(),
            None,
            3,
        );
        self.state.job_repo.create(&job).await.expect("insert job")
    }

    pub async fn insert_scheduled_job(
        &self,
        recipient: &str,
        scheduled_at: DateTime<Utc>,
    ) -> EmailJob {
        let job = EmailJob::new(
            recipient.to_string(),
            "Cadet record update".to_string(),
            "<p>Your record was updated.</p>".to_string(),
            Some(scheduled_at),
            3,
        );
        self.state.job_repo.create(&job).await.expect("insert job")
    }

    /// Backdates created_at so staleness thresholds can be crossed without
    /// sleeping.
    pub async fn age_job(&self, id: &str, seconds: i64) {
        let created = Utc::now() - Duration::seconds(seconds);
        sqlx::query("UPDATE email_jobs SET created_at = ? WHERE id = ?")
            .bind(created)
            .bind(id)
            .execute(&self.pool)
            .await
            .unwrap();
    }

    pub async fn set_retry_state(
        &self,
        id: &str,
        retry_count: i32,
        last_attempt_at: Option<DateTime<Utc>>,
    ) {
        sqlx::query("UPDATE email_jobs SET retry_count = ?, last_attempt_at = ? WHERE id = ?")
            .bind(retry_count)
            .bind(last_attempt_at)
            .bind(id)
            .execute(&self.pool)
            .await
            .unwrap();
    }

    pub async fn set_next_retry_at(&self, id: &str, next_retry_at: DateTime<Utc>) {
        sqlx::query("UPDATE email_jobs SET next_retry_at = ? WHERE id = ?")
            .bind(next_retry_at)
            .bind(id)
            .execute(&self.pool)
            .await
            .unwrap();
    }

    pub async fn job(&self, id: &str) -> EmailJob {
        self.state
            .job_repo
            .find_by_id(id)
            .await
            .unwrap()
            .expect("job exists")
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .header(header::AUTHORIZATION, format!("Bearer {}", TEST_TOKEN))
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        Self::into_json(response).await
    }

    pub async fn post_json_with_token(
        &self,
        uri: &str,
        body: Value,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let response = self
            .router
            .clone()
            .oneshot(builder.body(Body::from(body.to_string())).unwrap())
            .await
            .unwrap();
        Self::into_json(response).await
    }

    pub async fn post_empty(&self, uri: &str) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::AUTHORIZATION, format!("Bearer {}", TEST_TOKEN))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        Self::into_json(response).await
    }

    pub async fn post_empty_unauthed(&self, uri: &str) -> StatusCode {
        let response = self
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        response.status()
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(uri)
                    .header(header::AUTHORIZATION, format!("Bearer {}", TEST_TOKEN))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        Self::into_json(response).await
    }

    async fn into_json(response: axum::response::Response) -> (StatusCode, Value) {
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.db_filename);
    }
}
