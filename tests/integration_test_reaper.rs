mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::{MockEmailSender, SendBehavior, TestApp};
use mailqueue_backend::domain::models::email_job::EmailStatus;
use std::time::Instant;

#[tokio::test]
async fn test_never_attempted_job_recovered_via_webhook_path() {
    let app = TestApp::new().await;
    let job = app.insert_job("cadet@example.org").await;
    app.age_job(&job.id, 45).await;

    let (status, body) = app.post_empty("/api/v1/email/reaper").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["processed"], 1);
    assert_eq!(body["succeeded"], 1);
    assert_eq!(body["failed"], 0);
    assert_eq!(body["details"][0]["method"], "webhook");
    assert_eq!(body["details"][0]["success"], true);

    let fetched = app.job(&job.id).await;
    assert_eq!(fetched.status, EmailStatus::Sent);
    assert_eq!(fetched.retry_count, 1);
}

#[tokio::test]
async fn test_webhook_failure_falls_back_to_direct_send() {
    // First provider call (webhook path) fails, second (direct) succeeds.
    let app = TestApp::with_sender(MockEmailSender::new(SendBehavior::FailTimes(1))).await;
    let job = app.insert_job("cadet@example.org").await;
    app.age_job(&job.id, 45).await;

    let (_, body) = app.post_empty("/api/v1/email/reaper").await;

    assert_eq!(body["processed"], 1);
    assert_eq!(body["succeeded"], 1);
    assert_eq!(body["details"][0]["method"], "direct");
    assert_eq!(body["details"][0]["success"], true);

    let fetched = app.job(&job.id).await;
    assert_eq!(fetched.status, EmailStatus::Sent);
    // One logical recovery pass: the failed webhook attempt owns the single
    // increment; the direct success only finalizes the row.
    assert_eq!(fetched.retry_count, 1);
    assert!(fetched.sent_at.is_some());
    assert!(fetched.error_message.is_none());
    assert_eq!(app.sender.attempts(), 2);
}

#[tokio::test]
async fn test_both_paths_failing_schedules_backoff() {
    let app = TestApp::with_sender(MockEmailSender::new(SendBehavior::AlwaysFail)).await;
    let job = app.insert_job("cadet@example.org").await;
    app.age_job(&job.id, 45).await;

    let before = Utc::now();
    let (_, body) = app.post_empty("/api/v1/email/reaper").await;

    assert_eq!(body["processed"], 1);
    assert_eq!(body["failed"], 1);
    assert_eq!(body["details"][0]["method"], "direct");
    assert_eq!(body["details"][0]["success"], false);

    let fetched = app.job(&job.id).await;
    assert_eq!(fetched.status, EmailStatus::Pending);
    // Two real provider attempts happened: webhook claim + direct failure.
    assert_eq!(fetched.retry_count, 2);

    // The direct failure was scheduled with backoff(1) = 4 minutes.
    let next = fetched.next_retry_at.expect("backoff scheduled");
    assert!(next > before + Duration::minutes(3));
    assert!(next < before + Duration::minutes(5));
}

#[tokio::test]
async fn test_direct_failure_at_ceiling_dead_letters() {
    let app = TestApp::with_sender(MockEmailSender::new(SendBehavior::AlwaysFail)).await;
    let job = app.insert_job("cadet@example.org").await;
    app.age_job(&job.id, 45).await;
    // Never-attempted by timestamp, but one attempt short of the ceiling
    // after the webhook claim.
    app.set_retry_state(&job.id, 1, None).await;

    let (_, body) = app.post_empty("/api/v1/email/reaper").await;
    assert_eq!(body["processed"], 1);

    let fetched = app.job(&job.id).await;
    assert_eq!(fetched.status, EmailStatus::Failed);
    assert_eq!(fetched.retry_count, 3);
    assert!(fetched.next_retry_at.is_none());
}

#[tokio::test]
async fn test_inter_job_delay_is_applied_between_sends() {
    let app = TestApp::new().await;
    for i in 0..3 {
        let job = app.insert_job(&format!("cadet{}@example.org", i)).await;
        app.age_job(&job.id, 45).await;
    }

    let started = Instant::now();
    let (_, body) = app.post_empty("/api/v1/email/reaper").await;
    let elapsed = started.elapsed();

    assert_eq!(body["processed"], 3);
    assert_eq!(body["succeeded"], 3);
    // Three jobs means two inter-job waits of reaper_delay_ms each.
    let delay_ms = app.state.config.reaper_delay_ms;
    assert!(
        elapsed.as_millis() >= (2 * delay_ms) as u128,
        "sweep finished in {:?}, throttle not applied",
        elapsed
    );
}

#[tokio::test]
async fn test_already_attempted_jobs_are_out_of_scope() {
    let app = TestApp::new().await;
    let job = app.insert_job("cadet@example.org").await;
    app.age_job(&job.id, 45).await;
    app.set_retry_state(&job.id, 1, Some(Utc::now() - Duration::seconds(20)))
        .await;

    let (_, body) = app.post_empty("/api/v1/email/reaper").await;

    assert_eq!(body["processed"], 0);
    let fetched = app.job(&job.id).await;
    assert_eq!(fetched.status, EmailStatus::Pending);
    assert_eq!(fetched.retry_count, 1);
}

#[tokio::test]
async fn test_job_younger_than_threshold_is_left_alone() {
    let app = TestApp::new().await;
    let job = app.insert_job("cadet@example.org").await;

    let (_, body) = app.post_empty("/api/v1/email/reaper").await;

    assert_eq!(body["processed"], 0);
    let fetched = app.job(&job.id).await;
    assert_eq!(fetched.retry_count, 0);
}

#[tokio::test]
async fn test_future_scheduled_job_is_untouched() {
    let app = TestApp::new().await;
    let job = app
        .insert_scheduled_job("cadet@example.org", Utc::now() + Duration::hours(1))
        .await;
    app.age_job(&job.id, 45).await;

    let (_, body) = app.post_empty("/api/v1/email/reaper").await;

    assert_eq!(body["processed"], 0);
    let fetched = app.job(&job.id).await;
    assert_eq!(fetched.status, EmailStatus::Pending);
    assert_eq!(fetched.retry_count, 0);
    assert!(fetched.last_attempt_at.is_none());
}

#[tokio::test]
async fn test_reaper_requires_auth() {
    let app = TestApp::new().await;
    let status = app.post_empty_unauthed("/api/v1/email/reaper").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
