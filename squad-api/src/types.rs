//! Request and response bodies for the REST surface.

use serde::{Deserialize, Serialize};
use squad_core::{AgentType, Specialization};

/// `POST /api/agents` body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAgentRequest {
    #[serde(rename = "type")]
    pub agent_type: AgentType,
    pub parent_id: Option<String>,
    pub specialization: Option<Specialization>,
}

/// `POST /api/agents/:id/task` body.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitTaskRequest {
    pub task: String,
}

/// `POST /api/agents/:id/task` response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskAssignedResponse {
    pub task_id: String,
    pub status: &'static str,
    pub agent_id: String,
}

/// `DELETE /api/agents/:id` response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentKilledResponse {
    pub agent_id: String,
    pub status: &'static str,
    pub checkpoint_id: Option<String>,
}

/// `POST /api/agents/:id/restart` response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRestartedResponse {
    pub agent_id: String,
    pub status: &'static str,
}

/// `GET /api/messages` query.
#[derive(Debug, Clone, Deserialize)]
pub struct ListMessagesQuery {
    pub limit: Option<i64>,
}

/// `GET /health` response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: &'static str,
}
