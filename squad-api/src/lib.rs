//! SQUAD API - External Control Plane
//!
//! The single control-plane process: an Axum REST surface, a WebSocket
//! fan-out of the internal event bus, and the three change-stream watchers
//! that turn task assignments into running specialist processes.

pub mod config;
pub mod error;
pub mod events;
pub mod routes;
pub mod runs;
pub mod state;
pub mod types;
pub mod watchers;
pub mod ws;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use events::{ControlEvent, EventEnvelope};
pub use routes::create_api_router;
pub use runs::AgentRunner;
pub use state::AppState;
pub use watchers::Watchers;
pub use ws::WsState;
