//! Sandbox lifecycle routes.

use crate::error::{ApiError, ApiResult};
use crate::events::ControlEvent;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::json;
use squad_sandbox::{SandboxOrchestrator, SandboxStatusSummary};
use squad_store::SandboxView;
use std::sync::Arc;
use tracing::info;

fn require_orchestrator(state: &AppState) -> ApiResult<&Arc<SandboxOrchestrator>> {
    state
        .orchestrator
        .as_ref()
        .ok_or_else(|| ApiError::internal("no sandbox provider configured"))
}

/// GET /api/sandboxes - every sandbox tracking record.
pub async fn list_sandboxes(State(state): State<AppState>) -> ApiResult<Json<Vec<SandboxView>>> {
    let records = state.store.sandboxes().list().await?;
    Ok(Json(records.into_iter().map(SandboxView::from).collect()))
}

/// GET /api/sandboxes/:id - records for one sandbox (one per agent).
pub async fn get_sandbox(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<SandboxView>>> {
    let records = state.store.sandboxes().get_sandbox(&id).await?;
    if records.is_empty() {
        return Err(ApiError::not_found(format!("Sandbox {id} not found")));
    }
    Ok(Json(records.into_iter().map(SandboxView::from).collect()))
}

/// POST /api/sandboxes/:id/pause - pause the shared sandbox. Affects every
/// agent process in it.
pub async fn pause_sandbox(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    require_orchestrator(&state)?.pause_sandbox(&id).await?;
    state.ws.broadcast(ControlEvent::SandboxEvent {
        sandbox_id: id.clone(),
        action: "paused".to_string(),
    });
    Ok(Json(json!({ "sandboxId": id, "status": "paused" })))
}

/// POST /api/sandboxes/:id/resume - resume the shared sandbox.
pub async fn resume_sandbox(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    require_orchestrator(&state)?.resume_sandbox(&id).await?;
    state.ws.broadcast(ControlEvent::SandboxEvent {
        sandbox_id: id.clone(),
        action: "resumed".to_string(),
    });
    Ok(Json(json!({ "sandboxId": id, "status": "active" })))
}

/// DELETE /api/sandboxes/:id - kill one sandbox by id. Only the live
/// shared sandbox can be killed.
pub async fn delete_sandbox(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let orchestrator = require_orchestrator(&state)?;
    match orchestrator.sandbox_id().await {
        Some(current) if current == id => {}
        _ => return Err(ApiError::not_found(format!("Sandbox {id} not found"))),
    }
    orchestrator.kill_sandbox().await?;
    state.ws.broadcast(ControlEvent::SandboxEvent {
        sandbox_id: id.clone(),
        action: "killed".to_string(),
    });
    info!(sandbox_id = %id, "Sandbox deleted");
    Ok(Json(json!({ "sandboxId": id, "status": "killed" })))
}

/// DELETE /api/sandbox - kill the shared sandbox and every attached agent.
pub async fn kill_shared_sandbox(
    State(state): State<AppState>,
) -> ApiResult<Json<serde_json::Value>> {
    let orchestrator = require_orchestrator(&state)?;
    let sandbox_id = orchestrator.sandbox_id().await;
    orchestrator.kill_sandbox().await?;

    if let Some(sandbox_id) = &sandbox_id {
        state.ws.broadcast(ControlEvent::SandboxEvent {
            sandbox_id: sandbox_id.clone(),
            action: "killed".to_string(),
        });
    }
    Ok(Json(json!({ "sandboxId": sandbox_id, "status": "killed" })))
}

/// GET /api/sandbox/status - orchestrator snapshot.
pub async fn sandbox_status(State(state): State<AppState>) -> ApiResult<Json<SandboxStatusSummary>> {
    match &state.orchestrator {
        Some(orchestrator) => Ok(Json(orchestrator.status().await)),
        None => Ok(Json(SandboxStatusSummary {
            sandbox_id: None,
            is_ready: false,
            agent_count: 0,
            agents: Vec::new(),
        })),
    }
}
