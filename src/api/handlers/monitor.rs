use axum::{extract::State, response::IntoResponse, Json};
use std::sync::Arc;

use crate::api::extractors::service_auth::ServiceAuth;
use crate::error::AppError;
use crate::state::AppState;

/// Stuck-email monitor trigger: runs one staleness sweep and returns the
/// per-run report.
pub async fn run_monitor(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
) -> Result<impl IntoResponse, AppError> {
    let report = state.recovery_service.sweep_stale().await?;
    Ok(Json(report))
}
