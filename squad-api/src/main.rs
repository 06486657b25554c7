//! SQUAD control-plane server entry point.
//!
//! Bootstraps configuration, connects to MongoDB, wires the event bus into
//! the sandbox orchestrator's output handler, spawns the change-stream
//! watchers, and serves the Axum router.

use squad_api::events::ControlEvent;
use squad_api::{create_api_router, AgentRunner, ApiConfig, AppState, Watchers, WsState};
use squad_llm::{AnthropicProvider, ChatProvider};
use squad_sandbox::{
    HttpSandboxProvider, OrchestratorConfig, OutputHandler, SandboxOrchestrator,
};
use squad_store::{Store, StoreConfig};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let api_config = ApiConfig::from_env();
    let store = Store::connect(&StoreConfig::from_env()).await?;
    store.ensure_schema().await?;

    let ws = Arc::new(WsState::new(api_config.ws_capacity));

    let provider: Option<Arc<dyn ChatProvider>> = match AnthropicProvider::from_env() {
        Ok(provider) => Some(Arc::new(provider)),
        Err(_) => {
            warn!("ANTHROPIC_API_KEY not set; host-side LLM runs are unavailable");
            None
        }
    };

    let orchestrator = match HttpSandboxProvider::from_env() {
        Some(sandbox_provider) => {
            let output: OutputHandler = {
                let ws = ws.clone();
                Arc::new(move |agent_id, stream, chunk| {
                    ws.broadcast(ControlEvent::AgentOutput {
                        agent_id: agent_id.to_string(),
                        stream: stream.as_str().to_string(),
                        content: chunk.to_string(),
                    });
                })
            };
            Some(Arc::new(
                SandboxOrchestrator::new(
                    Arc::new(sandbox_provider),
                    store.clone(),
                    OrchestratorConfig::from_env(),
                )
                .with_output_handler(output),
            ))
        }
        None => {
            warn!("E2B_API_KEY not set; agents run host-side");
            None
        }
    };

    let runner = Arc::new(AgentRunner::new(
        store.clone(),
        ws.clone(),
        orchestrator.clone(),
        provider,
    ));

    let watchers = Arc::new(Watchers::new(store.clone(), ws.clone(), runner.clone()));
    let watcher_handles = watchers.spawn_all();

    let state = AppState {
        store,
        ws,
        orchestrator,
        runner,
        start_time: std::time::Instant::now(),
    };
    let app = create_api_router(state);

    let addr = api_config.bind_addr()?;
    info!(%addr, "Starting SQUAD control plane");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    for handle in watcher_handles {
        handle.abort();
    }
    Ok(())
}
