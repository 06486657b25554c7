//! Document types for the five SQUAD collections.
//!
//! Field names are camelCase and ids are UUID-v4 strings, distinct from the
//! MongoDB `_id`. Timestamps are stored as BSON datetimes so index range
//! queries and `createdAt` ordering work server-side.

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};
use squad_core::{
    AgentSandboxStatus, AgentStatus, AgentType, CheckpointSummary, MessagePriority, MessageType,
    ResumePointer, SandboxCosts, SandboxMetadata, SandboxResources, SandboxState, Specialization,
    TaskStatus,
};

/// Serde module for `Option<DateTime<Utc>>` as an optional BSON datetime.
pub mod bson_datetime_option {
    use chrono::{DateTime, Utc};
    use mongodb::bson;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(date: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match date {
            Some(dt) => {
                let bson_dt = bson::DateTime::from_chrono(*dt);
                Serialize::serialize(&bson_dt, serializer)
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt: Option<bson::DateTime> = Option::deserialize(deserializer)?;
        Ok(opt.map(|dt| dt.to_chrono()))
    }
}

// ============================================================================
// AGENTS
// ============================================================================

/// Cumulative token counters as stored on an agent document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsageDoc {
    pub total_input_tokens: i64,
    pub total_output_tokens: i64,
    #[serde(with = "bson_datetime_option", default)]
    pub last_updated: Option<DateTime<Utc>>,
}

/// One record per logical agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDoc {
    /// UUID-v4 string; unique
    pub agent_id: String,
    #[serde(rename = "type")]
    pub agent_type: AgentType,
    pub specialization: Option<Specialization>,
    pub status: AgentStatus,
    pub sandbox_id: Option<String>,
    pub sandbox_status: AgentSandboxStatus,
    /// Director that spawned this specialist; null for directors
    pub parent_id: Option<String>,
    /// Current task, when working
    pub task_id: Option<String>,
    /// Durable session handle, assigned on first LLM run
    pub session_id: Option<String>,
    pub token_usage: TokenUsageDoc,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub last_heartbeat: DateTime<Utc>,
}

// ============================================================================
// MESSAGES
// ============================================================================

/// One coordination message. Immutable after insert except `readAt`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDoc {
    /// UUID-v4 string; unique
    pub message_id: String,
    pub from_agent: String,
    pub to_agent: String,
    pub content: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub thread_id: String,
    pub priority: MessagePriority,
    /// Numeric mirror of `priority` so the inbox can sort
    /// {priority DESC, createdAt ASC} server-side.
    pub priority_rank: i32,
    #[serde(with = "bson_datetime_option", default)]
    pub read_at: Option<DateTime<Utc>>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

/// Lightweight inbox projection: metadata plus a 50-character preview.
/// This is all the LLM-facing `checkInbox` tool ever sees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePreview {
    pub message_id: String,
    pub from_agent: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub priority: MessagePriority,
    pub preview: String,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// CHECKPOINTS
// ============================================================================

/// Append-only progress record for one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointDoc {
    /// UUID-v4 string; unique
    pub checkpoint_id: String,
    pub agent_id: String,
    pub summary: CheckpointSummary,
    pub resume_pointer: ResumePointer,
    pub tokens_used: i64,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// TASKS
// ============================================================================

/// One unit of work moving forward through the status DAG.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDoc {
    /// UUID-v4 string; unique
    pub task_id: String,
    pub parent_task_id: Option<String>,
    pub assigned_to: Option<String>,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    /// Success payload or failure reason, set when terminal
    pub result: Option<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// SANDBOX TRACKING
// ============================================================================

/// Lifecycle timestamps as stored on a sandbox record. Pause/resume/kill
/// stamps are set once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxLifecycleDoc {
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "bson_datetime_option", default)]
    pub paused_at: Option<DateTime<Utc>>,
    #[serde(with = "bson_datetime_option", default)]
    pub resumed_at: Option<DateTime<Utc>>,
    #[serde(with = "bson_datetime_option", default)]
    pub killed_at: Option<DateTime<Utc>>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub last_heartbeat: DateTime<Utc>,
}

/// One record per (sandbox, agent) pair. Every agent shares the same
/// `sandboxId` while the shared sandbox is alive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxDoc {
    pub sandbox_id: String,
    pub agent_id: String,
    pub status: SandboxState,
    pub metadata: SandboxMetadata,
    pub lifecycle: SandboxLifecycleDoc,
    pub resources: SandboxResources,
    pub costs: SandboxCosts,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson;

    #[test]
    fn test_agent_doc_bson_roundtrip() {
        let now = Utc::now();
        let doc = AgentDoc {
            agent_id: "2c8f9e4a-0000-4000-8000-000000000001".to_string(),
            agent_type: AgentType::Specialist,
            specialization: Some(Specialization::Researcher),
            status: AgentStatus::Idle,
            sandbox_id: None,
            sandbox_status: AgentSandboxStatus::None,
            parent_id: Some("2c8f9e4a-0000-4000-8000-000000000002".to_string()),
            task_id: None,
            session_id: None,
            token_usage: TokenUsageDoc::default(),
            created_at: now,
            last_heartbeat: now,
        };

        let bson_doc = bson::to_document(&doc).unwrap();
        assert_eq!(
            bson_doc.get_str("type").unwrap(),
            "specialist",
            "agent type must be stored under the `type` field"
        );
        assert_eq!(bson_doc.get_str("specialization").unwrap(), "researcher");

        let back: AgentDoc = bson::from_document(bson_doc).unwrap();
        // BSON datetimes are millisecond precision
        assert_eq!(back.agent_id, doc.agent_id);
        assert_eq!(back.agent_type, doc.agent_type);
        assert_eq!(back.status, doc.status);
    }

    #[test]
    fn test_message_doc_stores_null_read_at() {
        let doc = MessageDoc {
            message_id: "m1".to_string(),
            from_agent: "a1".to_string(),
            to_agent: "a2".to_string(),
            content: "hello".to_string(),
            message_type: MessageType::Status,
            thread_id: "t1".to_string(),
            priority: MessagePriority::Normal,
            priority_rank: MessagePriority::Normal.rank(),
            read_at: None,
            created_at: Utc::now(),
        };

        let bson_doc = bson::to_document(&doc).unwrap();
        assert!(bson_doc.get("readAt").unwrap().as_null().is_some());
        assert_eq!(bson_doc.get_i32("priorityRank").unwrap(), 2);
    }

    #[test]
    fn test_task_doc_status_string() {
        let now = Utc::now();
        let doc = TaskDoc {
            task_id: "t1".to_string(),
            parent_task_id: None,
            assigned_to: None,
            title: "Find docs".to_string(),
            description: "look things up".to_string(),
            status: TaskStatus::InProgress,
            result: None,
            created_at: now,
            updated_at: now,
        };
        let bson_doc = bson::to_document(&doc).unwrap();
        assert_eq!(bson_doc.get_str("status").unwrap(), "in_progress");
    }
}
