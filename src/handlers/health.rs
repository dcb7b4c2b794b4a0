use std::sync::Arc;
use axum::{extract::State, Json};
use crate::{models::HealthResponse, state::AppState};
use tracing::debug;

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health_check(State(app): State<Arc<AppState>>) -> Json<HealthResponse> {
    debug!("Health check requested");
    Json(HealthResponse {
        service: app.config.service_name.clone(),
        status: "ok".to_string(),
        message: "Server is running".to_string(),
    })
}

/// Readiness check endpoint
#[utoipa::path(
    get,
    path = "/api/ready",
    responses(
        (status = 200, description = "Service is ready", body = HealthResponse)
    )
)]
pub async fn ready_check(State(app): State<Arc<AppState>>) -> Json<HealthResponse> {
    debug!("Readiness check requested");
    // The registry lives in memory, so there is nothing external to wait on.
    Json(HealthResponse {
        service: app.config.service_name.clone(),
        status: "ok".to_string(),
        message: "Service is ready".to_string(),
    })
}
