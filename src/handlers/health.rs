//! Health check handlers

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::config::ServiceMode;
use crate::logic::model::EngineStatus;
use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    timestamp: i64,
    mode: ServiceMode,
    engine: EngineStatus,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

/// Liveness: always 200, reports model state
pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    let engine = state.holder.status();
    let status = if state.is_ready() { "healthy" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().timestamp(),
        mode: state.config.mode,
        engine,
    })
}

/// Readiness: 503 while classification requests cannot succeed
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    if state.is_ready() {
        return (StatusCode::OK, Json(ReadyResponse { ready: true, reason: None }));
    }

    let reason = state.holder.status().unavailable_reason;
    (StatusCode::SERVICE_UNAVAILABLE, Json(ReadyResponse { ready: false, reason }))
}
