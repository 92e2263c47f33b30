use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
};
use std::sync::Arc;

use crate::state::AppState;

/// Service-level bearer credential shared with the external trigger
/// scheduler. This is machine-to-machine auth, not end-user auth.
pub struct ServiceAuth;

impl<S> FromRequestParts<S> for ServiceAuth
where
    S: Send + Sync,
    Arc<AppState>: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = <Arc<AppState> as FromRef<S>>::from_ref(state);

        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(StatusCode::UNAUTHORIZED)?;

        if token != app_state.config.service_token {
            return Err(StatusCode::UNAUTHORIZED);
        }

        Ok(ServiceAuth)
    }
}
