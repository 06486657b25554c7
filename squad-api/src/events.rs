//! Event catalogue broadcast to WebSocket subscribers.
//!
//! Wire envelopes are `{type, data, timestamp}`. Event names use the
//! `domain:action` convention; payload field names are camelCase
//! (notably `agent:output` carries `content` and `message:new` carries
//! `messageType`).

use chrono::{DateTime, Utc};
use serde::Serialize;
use squad_store::{AgentView, TaskView};
use squad_core::TaskStatus;

/// Domain events fanned out over the event bus.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ControlEvent {
    /// A new agent record was created.
    #[serde(rename = "agent:created")]
    AgentCreated(AgentView),

    /// An agent's logical status changed.
    #[serde(rename = "agent:status")]
    AgentStatus {
        #[serde(rename = "agentId")]
        agent_id: String,
        status: String,
    },

    /// A chunk of agent stdout/stderr.
    #[serde(rename = "agent:output")]
    AgentOutput {
        #[serde(rename = "agentId")]
        agent_id: String,
        stream: String,
        content: String,
    },

    /// An agent was killed.
    #[serde(rename = "agent:killed")]
    AgentKilled {
        #[serde(rename = "agentId")]
        agent_id: String,
    },

    /// A message was inserted on the bus.
    #[serde(rename = "message:new")]
    MessageNew {
        #[serde(rename = "messageId")]
        message_id: String,
        #[serde(rename = "fromAgent")]
        from_agent: String,
        #[serde(rename = "toAgent")]
        to_agent: String,
        #[serde(rename = "messageType")]
        message_type: String,
        preview: String,
    },

    /// A checkpoint was appended.
    #[serde(rename = "checkpoint:new")]
    CheckpointNew {
        #[serde(rename = "checkpointId")]
        checkpoint_id: String,
        #[serde(rename = "agentId")]
        agent_id: String,
        phase: String,
        timestamp: DateTime<Utc>,
    },

    /// A task was created.
    #[serde(rename = "task:created")]
    TaskCreated(TaskView),

    /// A task moved along the status DAG.
    #[serde(rename = "task:status")]
    TaskStatus {
        #[serde(rename = "taskId")]
        task_id: String,
        status: TaskStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<String>,
    },

    /// Sandbox lifecycle activity.
    #[serde(rename = "sandbox:event")]
    SandboxEvent {
        #[serde(rename = "sandboxId")]
        sandbox_id: String,
        action: String,
    },
}

impl ControlEvent {
    /// The wire name of this event, for logging.
    pub fn event_type(&self) -> &'static str {
        match self {
            ControlEvent::AgentCreated(_) => "agent:created",
            ControlEvent::AgentStatus { .. } => "agent:status",
            ControlEvent::AgentOutput { .. } => "agent:output",
            ControlEvent::AgentKilled { .. } => "agent:killed",
            ControlEvent::MessageNew { .. } => "message:new",
            ControlEvent::CheckpointNew { .. } => "checkpoint:new",
            ControlEvent::TaskCreated(_) => "task:created",
            ControlEvent::TaskStatus { .. } => "task:status",
            ControlEvent::SandboxEvent { .. } => "sandbox:event",
        }
    }
}

/// Wire envelope: the event plus its emission timestamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventEnvelope {
    #[serde(flatten)]
    pub event: ControlEvent,
    pub timestamp: DateTime<Utc>,
}

impl EventEnvelope {
    /// Stamp an event with the current time.
    pub fn now(event: ControlEvent) -> Self {
        Self {
            event,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_shape() {
        let envelope = EventEnvelope::now(ControlEvent::AgentOutput {
            agent_id: "a1".to_string(),
            stream: "stdout".to_string(),
            content: "hello".to_string(),
        });
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["type"], "agent:output");
        // the payload field is `content`, never `output`
        assert_eq!(json["data"]["content"], "hello");
        assert!(json["data"].get("output").is_none());
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn test_message_new_uses_message_type_field() {
        let envelope = EventEnvelope::now(ControlEvent::MessageNew {
            message_id: "m1".to_string(),
            from_agent: "a1".to_string(),
            to_agent: "a2".to_string(),
            message_type: "task".to_string(),
            preview: "do the thing".to_string(),
        });
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["type"], "message:new");
        assert_eq!(json["data"]["messageType"], "task");
        assert!(json["data"].get("type").is_none());
    }

    #[test]
    fn test_event_type_names() {
        let event = ControlEvent::TaskStatus {
            task_id: "t1".to_string(),
            status: TaskStatus::Completed,
            result: Some("done".to_string()),
        };
        assert_eq!(event.event_type(), "task:status");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "task:status");
        assert_eq!(json["data"]["status"], "completed");
    }
}
