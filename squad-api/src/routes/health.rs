//! Health endpoint.

use crate::state::AppState;
use crate::types::HealthResponse;
use axum::{extract::State, Json};

/// GET /health
pub async fn health(State(_state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION"),
    })
}
