//! Route composition for the control plane.

pub mod agent;
pub mod health;
pub mod message;
pub mod sandbox;
pub mod task;

use crate::state::AppState;
use crate::ws;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the full application router: REST under `/api`, the WebSocket
/// upgrade at `/ws`, and `/health`.
pub fn create_api_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/agents", get(agent::list_agents).post(agent::create_agent))
        .route("/agents/:id", delete(agent::kill_agent))
        .route("/agents/:id/status", get(agent::agent_status))
        .route("/agents/:id/task", post(agent::submit_task))
        .route("/agents/:id/restart", post(agent::restart_agent))
        .route("/sandboxes", get(sandbox::list_sandboxes))
        .route(
            "/sandboxes/:id",
            get(sandbox::get_sandbox).delete(sandbox::delete_sandbox),
        )
        .route("/sandboxes/:id/pause", post(sandbox::pause_sandbox))
        .route("/sandboxes/:id/resume", post(sandbox::resume_sandbox))
        .route("/sandbox", delete(sandbox::kill_shared_sandbox))
        .route("/sandbox/status", get(sandbox::sandbox_status))
        .route("/tasks", get(task::list_tasks))
        .route("/tasks/:id", get(task::get_task))
        .route("/messages", get(message::list_messages));

    let ws_router = Router::new()
        .route("/ws", get(ws::ws_handler))
        .with_state(state.ws.clone());

    Router::new()
        .route("/health", get(health::health))
        .nest("/api", api)
        .with_state(state)
        .merge(ws_router)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
