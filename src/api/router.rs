use axum::{
    body::Body,
    extract::Request,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;

use crate::api::handlers::{health, jobs, monitor, reaper, webhook};
use crate::state::AppState;
use tower_http::{classify::ServerErrorsFailureClass, trace::TraceLayer};
use tracing::{error, info, info_span, Span};
use uuid::Uuid;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health_check))

        // Delivery trigger (webhook)
        .route("/api/v1/email/process", post(webhook::process_email))

        // Recovery sweeps
        .route("/api/v1/email/monitor", post(monitor::run_monitor))
        .route("/api/v1/email/reaper", post(reaper::run_reaper))

        // Queue operations
        .route(
            "/api/v1/email/jobs",
            post(jobs::create_job).get(jobs::list_jobs),
        )
        .route("/api/v1/email/jobs/{job_id}", get(jobs::get_job))
        .route("/api/v1/email/jobs/{job_id}/cancel", post(jobs::cancel_job))

        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<Body>| {
                    let request_id = Uuid::new_v4().to_string();
                    info_span!(
                        "http_request",
                        request_id = %request_id,
                        method = ?request.method(),
                        uri = ?request.uri(),
                        version = ?request.version(),
                    )
                })
                .on_request(|request: &Request<Body>, _span: &Span| {
                    info!(
                        "started processing request: {} {}",
                        request.method(),
                        request.uri().path()
                    );
                })
                .on_response(
                    |response: &axum::http::Response<Body>, latency: Duration, _span: &Span| {
                        info!(
                            status = response.status().as_u16(),
                            latency_ms = latency.as_millis(),
                            "finished processing request"
                        );
                    },
                )
                .on_failure(
                    |error: ServerErrorsFailureClass, _latency: Duration, _span: &Span| {
                        error!("request failed: {:?}", error);
                    },
                ),
        )
        .with_state(state)
}
