//! Health check

use std::sync::Arc;

use axum::extract::State;
use serde::Serialize;
use utoipa::ToSchema;

use super::super::state::AppState;
use super::super::types::{ok, ApiResult};

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthData {
    pub status: &'static str,
    pub version: &'static str,
    pub database: &'static str,
}

/// Service + database health
#[utoipa::path(
    get,
    path = "/v1/health",
    responses(
        (status = 200, description = "Service healthy"),
        (status = 503, description = "Database unreachable")
    ),
    tag = "Health"
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> ApiResult<HealthData> {
    let database = match state.db.health_check().await {
        Ok(()) => "up",
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unreachable");
            return super::super::types::ApiError::service_unavailable("database unreachable")
                .into_err();
        }
    };

    ok(HealthData {
        status: "ok",
        version: env!("GIT_HASH"),
        database,
    })
}
