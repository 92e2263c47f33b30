use axum::{extract::State, response::IntoResponse, Json};
use std::sync::Arc;

use crate::api::extractors::service_auth::ServiceAuth;
use crate::error::AppError;
use crate::state::AppState;

/// Backup reaper trigger: recovers jobs whose post-insert trigger never
/// fired, with the direct-send fallback.
pub async fn run_reaper(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
) -> Result<impl IntoResponse, AppError> {
    let report = state.recovery_service.sweep_never_attempted().await?;
    Ok(Json(report))
}
