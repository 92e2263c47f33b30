use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::info;

use crate::api::dtos::requests::CreateEmailJobRequest;
use crate::api::extractors::service_auth::ServiceAuth;
use crate::domain::models::email_job::EmailJob;
use crate::error::AppError;
use crate::state::AppState;

pub async fn create_job(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Json(payload): Json<CreateEmailJobRequest>,
) -> Result<impl IntoResponse, AppError> {
    if !payload.recipient_email.contains('@') {
        return Err(AppError::Validation(
            "recipient_email is not a valid address".to_string(),
        ));
    }
    let max_retries = payload.max_retries.unwrap_or(state.config.default_max_retries);
    if max_retries < 0 {
        return Err(AppError::Validation(
            "max_retries must not be negative".to_string(),
        ));
    }

    let job = EmailJob::new(
        payload.recipient_email,
        payload.subject,
        payload.body,
        payload.scheduled_at,
        max_retries,
    );
    let created = state.job_repo.create(&job).await?;
    info!(job_id = %created.id, recipient = %created.recipient_email, "queued email job");
    Ok(Json(created))
}

pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
) -> Result<impl IntoResponse, AppError> {
    let jobs = state.job_repo.list_recent(100).await?;
    Ok(Json(jobs))
}

pub async fn get_job(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let job = state
        .job_repo
        .find_by_id(&job_id)
        .await?
        .ok_or(AppError::NotFound(format!("Email job {} not found", job_id)))?;
    Ok(Json(job))
}

pub async fn cancel_job(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let cancelled = state.job_repo.cancel(&job_id, chrono::Utc::now()).await?;
    if !cancelled {
        return match state.job_repo.find_by_id(&job_id).await? {
            None => Err(AppError::NotFound(format!("Email job {} not found", job_id))),
            Some(_) => Err(AppError::Conflict("Job is no longer pending".to_string())),
        };
    }
    info!(job_id = %job_id, "cancelled email job");
    Ok(Json(serde_json::json!({ "status": "cancelled" })))
}
