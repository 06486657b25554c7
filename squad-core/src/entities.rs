//! Value objects embedded in SQUAD documents and API payloads.
//!
//! These types carry no identity of their own; the owning documents live in
//! `squad-store`. All external serialization is camelCase.

use crate::{AgentType, Specialization, Timestamp, ValidationError};
use serde::{Deserialize, Serialize};

// ============================================================================
// TOKEN ACCOUNTING
// ============================================================================

/// Cumulative token counters for one agent. Monotonically non-decreasing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    /// Total input tokens across every LLM call of every session
    pub total_input_tokens: i64,
    /// Total output tokens across every LLM call of every session
    pub total_output_tokens: i64,
    /// When the counters last moved
    pub last_updated: Option<Timestamp>,
}

impl TokenUsage {
    /// Apply a delta from one LLM call.
    pub fn record(&mut self, delta: TokenDelta, at: Timestamp) {
        self.total_input_tokens += delta.input_tokens;
        self.total_output_tokens += delta.output_tokens;
        self.last_updated = Some(at);
    }

    /// Combined input + output total.
    pub fn total(&self) -> i64 {
        self.total_input_tokens + self.total_output_tokens
    }
}

/// Token delta reported by a single LLM call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TokenDelta {
    pub input_tokens: i64,
    pub output_tokens: i64,
}

impl TokenDelta {
    pub fn new(input_tokens: i64, output_tokens: i64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    /// Accumulate another call's usage into this delta.
    pub fn add(&mut self, other: TokenDelta) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

// ============================================================================
// CHECKPOINTS
// ============================================================================

/// Logical progress summary recorded in a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointSummary {
    /// The goal the agent is pursuing. Never empty.
    pub goal: String,
    /// Work items already done
    #[serde(default)]
    pub completed: Vec<String>,
    /// Work items still open
    #[serde(default)]
    pub pending: Vec<String>,
    /// Decisions taken so far
    #[serde(default)]
    pub decisions: Vec<String>,
}

impl CheckpointSummary {
    /// Create a summary with just a goal.
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            completed: Vec::new(),
            pending: Vec::new(),
            decisions: Vec::new(),
        }
    }

    /// Validate invariants (`goal` non-empty).
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.goal.trim().is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "summary.goal".to_string(),
            });
        }
        Ok(())
    }
}

/// Where a restarted agent should pick up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumePointer {
    /// The next concrete action. Never empty.
    pub next_action: String,
    /// The phase the agent was in. Never empty.
    pub phase: String,
    /// Free-form context carried across the restart
    pub current_context: Option<String>,
}

impl ResumePointer {
    /// Create a pointer for a phase with a next action.
    pub fn new(next_action: impl Into<String>, phase: impl Into<String>) -> Self {
        Self {
            next_action: next_action.into(),
            phase: phase.into(),
            current_context: None,
        }
    }

    /// Attach free-form context.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.current_context = Some(context.into());
        self
    }

    /// Validate invariants (`next_action` and `phase` non-empty).
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.next_action.trim().is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "resumePointer.nextAction".to_string(),
            });
        }
        if self.phase.trim().is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "resumePointer.phase".to_string(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// SANDBOX TRACKING
// ============================================================================

/// Descriptive metadata stored on a sandbox tracking record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxMetadata {
    pub agent_type: AgentType,
    pub specialization: Option<Specialization>,
    pub created_by: Option<String>,
}

/// Resource envelope granted to the sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxResources {
    pub cpu_count: i32,
    pub memory_mb: i32,
    pub timeout_ms: i64,
}

impl Default for SandboxResources {
    fn default() -> Self {
        Self {
            cpu_count: 2,
            memory_mb: 1024,
            timeout_ms: 600_000,
        }
    }
}

/// Accrued cost estimate for a sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SandboxCosts {
    pub estimated_cost: f64,
    pub runtime_seconds: f64,
}

/// Lifecycle timestamps for a sandbox record. Pause/resume/kill stamps are
/// set once and never overwritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxLifecycle {
    pub created_at: Timestamp,
    pub paused_at: Option<Timestamp>,
    pub resumed_at: Option<Timestamp>,
    pub killed_at: Option<Timestamp>,
    pub last_heartbeat: Timestamp,
}

impl SandboxLifecycle {
    /// Fresh lifecycle starting now.
    pub fn starting_at(now: Timestamp) -> Self {
        Self {
            created_at: now,
            paused_at: None,
            resumed_at: None,
            killed_at: None,
            last_heartbeat: now,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_token_usage_record_accumulates() {
        let mut usage = TokenUsage::default();
        let now = Utc::now();

        usage.record(TokenDelta::new(100, 40), now);
        usage.record(TokenDelta::new(50, 10), now);

        assert_eq!(usage.total_input_tokens, 150);
        assert_eq!(usage.total_output_tokens, 50);
        assert_eq!(usage.total(), 200);
        assert_eq!(usage.last_updated, Some(now));
    }

    #[test]
    fn test_summary_requires_goal() {
        let mut summary = CheckpointSummary::new("finish the report");
        assert!(summary.validate().is_ok());

        summary.goal = "   ".to_string();
        assert!(summary.validate().is_err());
    }

    #[test]
    fn test_resume_pointer_requires_fields() {
        let pointer = ResumePointer::new("aggregate results", "waiting");
        assert!(pointer.validate().is_ok());

        let bad = ResumePointer::new("", "waiting");
        assert!(bad.validate().is_err());

        let bad = ResumePointer::new("aggregate results", "");
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_camel_case_serialization() {
        let pointer = ResumePointer::new("spawn specialists", "spawning").with_context("3 subtasks");
        let json = serde_json::to_value(&pointer).unwrap();
        assert_eq!(json["nextAction"], "spawn specialists");
        assert_eq!(json["phase"], "spawning");
        assert_eq!(json["currentContext"], "3 subtasks");
    }
}
