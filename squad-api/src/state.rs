//! Shared application state for Axum routers.

use crate::runs::AgentRunner;
use crate::ws::WsState;
use squad_sandbox::SandboxOrchestrator;
use squad_store::Store;
use std::sync::Arc;

/// Application-wide state shared across all routes and watchers.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub ws: Arc<WsState>,
    /// Present when a sandbox provider is configured
    pub orchestrator: Option<Arc<SandboxOrchestrator>>,
    pub runner: Arc<AgentRunner>,
    pub start_time: std::time::Instant,
}
