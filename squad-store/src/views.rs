//! JSON views of stored documents.
//!
//! Document structs serialize datetimes as BSON; these views carry the same
//! camelCase fields with RFC 3339 timestamps for REST responses, WebSocket
//! payloads, and LLM tool results. The internal `priorityRank` mirror field
//! is not exposed.

use crate::documents::{AgentDoc, CheckpointDoc, MessageDoc, SandboxDoc, TaskDoc};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use squad_core::{
    AgentSandboxStatus, AgentStatus, AgentType, CheckpointSummary, MessagePriority, MessageType,
    ResumePointer, SandboxCosts, SandboxLifecycle, SandboxMetadata, SandboxResources, SandboxState,
    Specialization, TaskStatus, TokenUsage,
};

/// Agent record as served to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentView {
    pub agent_id: String,
    #[serde(rename = "type")]
    pub agent_type: AgentType,
    pub specialization: Option<Specialization>,
    pub status: AgentStatus,
    pub sandbox_id: Option<String>,
    pub sandbox_status: AgentSandboxStatus,
    pub parent_id: Option<String>,
    pub task_id: Option<String>,
    pub session_id: Option<String>,
    pub token_usage: TokenUsage,
    pub created_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
}

impl From<AgentDoc> for AgentView {
    fn from(doc: AgentDoc) -> Self {
        Self {
            agent_id: doc.agent_id,
            agent_type: doc.agent_type,
            specialization: doc.specialization,
            status: doc.status,
            sandbox_id: doc.sandbox_id,
            sandbox_status: doc.sandbox_status,
            parent_id: doc.parent_id,
            task_id: doc.task_id,
            session_id: doc.session_id,
            token_usage: TokenUsage {
                total_input_tokens: doc.token_usage.total_input_tokens,
                total_output_tokens: doc.token_usage.total_output_tokens,
                last_updated: doc.token_usage.last_updated,
            },
            created_at: doc.created_at,
            last_heartbeat: doc.last_heartbeat,
        }
    }
}

/// Message as served to clients and tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub message_id: String,
    pub from_agent: String,
    pub to_agent: String,
    pub content: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub thread_id: String,
    pub priority: MessagePriority,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<MessageDoc> for MessageView {
    fn from(doc: MessageDoc) -> Self {
        Self {
            message_id: doc.message_id,
            from_agent: doc.from_agent,
            to_agent: doc.to_agent,
            content: doc.content,
            message_type: doc.message_type,
            thread_id: doc.thread_id,
            priority: doc.priority,
            read_at: doc.read_at,
            created_at: doc.created_at,
        }
    }
}

/// Checkpoint as served to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointView {
    pub checkpoint_id: String,
    pub agent_id: String,
    pub summary: CheckpointSummary,
    pub resume_pointer: ResumePointer,
    pub tokens_used: i64,
    pub created_at: DateTime<Utc>,
}

impl From<CheckpointDoc> for CheckpointView {
    fn from(doc: CheckpointDoc) -> Self {
        Self {
            checkpoint_id: doc.checkpoint_id,
            agent_id: doc.agent_id,
            summary: doc.summary,
            resume_pointer: doc.resume_pointer,
            tokens_used: doc.tokens_used,
            created_at: doc.created_at,
        }
    }
}

/// Task as served to clients and tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    pub task_id: String,
    pub parent_task_id: Option<String>,
    pub assigned_to: Option<String>,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub result: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TaskDoc> for TaskView {
    fn from(doc: TaskDoc) -> Self {
        Self {
            task_id: doc.task_id,
            parent_task_id: doc.parent_task_id,
            assigned_to: doc.assigned_to,
            title: doc.title,
            description: doc.description,
            status: doc.status,
            result: doc.result,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        }
    }
}

/// Sandbox tracking record as served to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxView {
    pub sandbox_id: String,
    pub agent_id: String,
    pub status: SandboxState,
    pub metadata: SandboxMetadata,
    pub lifecycle: SandboxLifecycle,
    pub resources: SandboxResources,
    pub costs: SandboxCosts,
}

impl From<SandboxDoc> for SandboxView {
    fn from(doc: SandboxDoc) -> Self {
        Self {
            sandbox_id: doc.sandbox_id,
            agent_id: doc.agent_id,
            status: doc.status,
            metadata: doc.metadata,
            lifecycle: SandboxLifecycle {
                created_at: doc.lifecycle.created_at,
                paused_at: doc.lifecycle.paused_at,
                resumed_at: doc.lifecycle.resumed_at,
                killed_at: doc.lifecycle.killed_at,
                last_heartbeat: doc.lifecycle.last_heartbeat,
            },
            resources: doc.resources,
            costs: doc.costs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::TokenUsageDoc;

    #[test]
    fn test_agent_view_json_shape() {
        let now = Utc::now();
        let doc = AgentDoc {
            agent_id: "a1".to_string(),
            agent_type: AgentType::Director,
            specialization: None,
            status: AgentStatus::Working,
            sandbox_id: Some("sbx1".to_string()),
            sandbox_status: AgentSandboxStatus::Active,
            parent_id: None,
            task_id: Some("t1".to_string()),
            session_id: Some("session-1-abcdefghi".to_string()),
            token_usage: TokenUsageDoc {
                total_input_tokens: 10,
                total_output_tokens: 5,
                last_updated: Some(now),
            },
            created_at: now,
            last_heartbeat: now,
        };

        let json = serde_json::to_value(AgentView::from(doc)).unwrap();
        assert_eq!(json["agentId"], "a1");
        assert_eq!(json["type"], "director");
        assert_eq!(json["sandboxStatus"], "active");
        assert_eq!(json["tokenUsage"]["totalInputTokens"], 10);
        // timestamps are RFC 3339 strings, not extended-JSON dates
        assert!(json["createdAt"].is_string());
    }
}
