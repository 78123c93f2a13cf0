//! Health check handler

use std::sync::Arc;

use axum::extract::State;
use utoipa::ToSchema;

use super::super::state::AppState;
use super::super::types::{ApiError, ApiResult, ok};

#[derive(Debug, serde::Serialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "0.1.0")]
    pub version: &'static str,
    /// Short commit hash the binary was built from
    #[schema(example = "a1b2c3d")]
    pub git_hash: &'static str,
    #[schema(example = 1703494800000_i64)]
    pub timestamp_ms: i64,
}

/// Health check endpoint
///
/// - Healthy: 200 OK + {code: 0, data: {version, git_hash, timestamp_ms}}
/// - Database unreachable: 503 + {code: 5001, msg: "unavailable"}
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service healthy", body = HealthResponse),
        (status = 503, description = "Database unavailable")
    ),
    tag = "System"
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> ApiResult<HealthResponse> {
    let healthy = match state.db.as_ref() {
        Some(db) => match db.health_check().await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(error = %e, "Database health check failed");
                false
            }
        },
        None => false,
    };

    if !healthy {
        return Err(ApiError::service_unavailable("unavailable"));
    }

    ok(HealthResponse {
        version: env!("CARGO_PKG_VERSION"),
        git_hash: env!("GIT_HASH"),
        timestamp_ms: chrono::Utc::now().timestamp_millis(),
    })
}
