use axum::{extract::State, response::IntoResponse, Json};
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::dtos::requests::ProcessEmailRequest;
use crate::api::dtos::responses::ProcessEmailResponse;
use crate::api::extractors::service_auth::ServiceAuth;
use crate::error::AppError;
use crate::state::AppState;

/// Webhook trigger: one delivery attempt for one job id. Failures are
/// reported in-band so the external scheduler always gets a JSON result.
pub async fn process_email(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Json(payload): Json<ProcessEmailRequest>,
) -> Result<impl IntoResponse, AppError> {
    info!(
        email_id = %payload.email_id,
        trigger_retry_count = ?payload.retry_count,
        manual = payload.manual_trigger.unwrap_or(false),
        "webhook trigger received"
    );

    match state.delivery_service.process(&payload.email_id).await {
        Ok(_) => Ok(Json(ProcessEmailResponse {
            success: true,
            error: None,
        })),
        Err(err) => {
            warn!(email_id = %payload.email_id, error = %err, "webhook delivery failed");
            Ok(Json(ProcessEmailResponse {
                success: false,
                error: Some(err.to_string()),
            }))
        }
    }
}
