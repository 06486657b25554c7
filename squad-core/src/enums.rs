//! Enum types for SQUAD entities
//!
//! Everything that crosses the database or CLI boundary carries explicit
//! `as_db_str`/`from_db_str` conversions so the stored strings are pinned
//! independently of serde derive behavior.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// AGENT ENUMS
// ============================================================================

/// Role of an agent in the squad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    /// Decomposes the root task and aggregates specialist results
    Director,
    /// Executes one assigned subtask
    Specialist,
}

impl AgentType {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            AgentType::Director => "director",
            AgentType::Specialist => "specialist",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, AgentTypeParseError> {
        match s.to_lowercase().as_str() {
            "director" => Ok(AgentType::Director),
            "specialist" => Ok(AgentType::Specialist),
            _ => Err(AgentTypeParseError(s.to_string())),
        }
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for AgentType {
    type Err = AgentTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

/// Error when parsing an invalid agent type string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentTypeParseError(pub String);

impl fmt::Display for AgentTypeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid agent type: {}", self.0)
    }
}

impl std::error::Error for AgentTypeParseError {}

/// Specialization of a specialist agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Specialization {
    /// Gathers sources and facts
    Researcher,
    /// Produces prose output
    Writer,
    /// Evaluates and compares findings
    Analyst,
    /// No particular specialization
    #[default]
    General,
}

impl Specialization {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Specialization::Researcher => "researcher",
            Specialization::Writer => "writer",
            Specialization::Analyst => "analyst",
            Specialization::General => "general",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, SpecializationParseError> {
        match s.to_lowercase().as_str() {
            "researcher" => Ok(Specialization::Researcher),
            "writer" => Ok(Specialization::Writer),
            "analyst" => Ok(Specialization::Analyst),
            "general" => Ok(Specialization::General),
            _ => Err(SpecializationParseError(s.to_string())),
        }
    }
}

impl fmt::Display for Specialization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for Specialization {
    type Err = SpecializationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

/// Error when parsing an invalid specialization string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecializationParseError(pub String);

impl fmt::Display for SpecializationParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid specialization: {}", self.0)
    }
}

impl std::error::Error for SpecializationParseError {}

/// Logical status of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Registered, no work in flight
    #[default]
    Idle,
    /// Executing its runtime
    Working,
    /// Blocked on peers (director waiting on specialists)
    Waiting,
    /// Runtime finished successfully
    Completed,
    /// Runtime exited with a failure
    Error,
}

impl AgentStatus {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            AgentStatus::Idle => "idle",
            AgentStatus::Working => "working",
            AgentStatus::Waiting => "waiting",
            AgentStatus::Completed => "completed",
            AgentStatus::Error => "error",
        }
    }

    /// Check if this status means the agent can still take work.
    pub fn is_available(&self) -> bool {
        matches!(
            self,
            AgentStatus::Idle | AgentStatus::Working | AgentStatus::Waiting
        )
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

/// Sandbox attachment status recorded on an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentSandboxStatus {
    /// No sandbox attached yet
    #[default]
    None,
    /// Attached to a live sandbox
    Active,
    /// The shared sandbox is paused
    Paused,
    /// The agent's process (or the sandbox) was killed
    Killed,
}

impl AgentSandboxStatus {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            AgentSandboxStatus::None => "none",
            AgentSandboxStatus::Active => "active",
            AgentSandboxStatus::Paused => "paused",
            AgentSandboxStatus::Killed => "killed",
        }
    }
}

impl fmt::Display for AgentSandboxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

// ============================================================================
// MESSAGE ENUMS
// ============================================================================

/// Type of a coordination message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Task delegation to a specialist
    Task,
    /// Result of a delegated task
    Result,
    /// Status/progress note
    Status,
    /// Error report
    Error,
}

impl MessageType {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            MessageType::Task => "task",
            MessageType::Result => "result",
            MessageType::Status => "status",
            MessageType::Error => "error",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, MessageTypeParseError> {
        match s.to_lowercase().as_str() {
            "task" => Ok(MessageType::Task),
            "result" => Ok(MessageType::Result),
            "status" => Ok(MessageType::Status),
            "error" => Ok(MessageType::Error),
            _ => Err(MessageTypeParseError(s.to_string())),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for MessageType {
    type Err = MessageTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

/// Error when parsing an invalid message type string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTypeParseError(pub String);

impl fmt::Display for MessageTypeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid message type: {}", self.0)
    }
}

impl std::error::Error for MessageTypeParseError {}

/// Priority level for messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessagePriority {
    /// Should be read first
    High,
    /// Default priority
    #[default]
    Normal,
    /// Can be delayed
    Low,
}

impl MessagePriority {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            MessagePriority::High => "high",
            MessagePriority::Normal => "normal",
            MessagePriority::Low => "low",
        }
    }

    /// Numeric rank used for inbox ordering. Higher sorts first.
    pub fn rank(&self) -> i32 {
        match self {
            MessagePriority::High => 3,
            MessagePriority::Normal => 2,
            MessagePriority::Low => 1,
        }
    }
}

impl fmt::Display for MessagePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

// ============================================================================
// TASK ENUMS
// ============================================================================

/// Status of a task. Transitions only move forward through
/// pending → assigned → in_progress → {completed, failed}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created, not yet assigned
    #[default]
    Pending,
    /// Assigned to an agent
    Assigned,
    /// The assignee is executing it
    InProgress,
    /// Finished with a result
    Completed,
    /// Finished with a failure reason
    Failed,
}

impl TaskStatus {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Assigned => "assigned",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, TaskStatusParseError> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "assigned" => Ok(TaskStatus::Assigned),
            "in_progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            _ => Err(TaskStatusParseError(s.to_string())),
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Whether a transition to `next` is allowed. Backward transitions and
    /// any transition out of a terminal state are forbidden; forward skips
    /// (e.g. assigned → completed) are allowed.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, Assigned)
                | (Pending, InProgress)
                | (Pending, Completed)
                | (Pending, Failed)
                | (Assigned, InProgress)
                | (Assigned, Completed)
                | (Assigned, Failed)
                | (InProgress, Completed)
                | (InProgress, Failed)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for TaskStatus {
    type Err = TaskStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

/// Error when parsing an invalid task status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskStatusParseError(pub String);

impl fmt::Display for TaskStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid task status: {}", self.0)
    }
}

impl std::error::Error for TaskStatusParseError {}

// ============================================================================
// SANDBOX ENUMS
// ============================================================================

/// Status of a sandbox tracking record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SandboxState {
    /// Provider request in flight
    Creating,
    /// Live and accepting processes
    Active,
    /// Suspended; resume restores every process
    Paused,
    /// Resume request in flight
    Resuming,
    /// Torn down
    Killed,
}

impl SandboxState {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            SandboxState::Creating => "creating",
            SandboxState::Active => "active",
            SandboxState::Paused => "paused",
            SandboxState::Resuming => "resuming",
            SandboxState::Killed => "killed",
        }
    }
}

impl fmt::Display for SandboxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_type_roundtrip() {
        for at in [AgentType::Director, AgentType::Specialist] {
            let s = at.as_db_str();
            let parsed = AgentType::from_db_str(s).unwrap();
            assert_eq!(at, parsed);
        }
    }

    #[test]
    fn test_specialization_roundtrip() {
        for sp in [
            Specialization::Researcher,
            Specialization::Writer,
            Specialization::Analyst,
            Specialization::General,
        ] {
            let s = sp.as_db_str();
            let parsed = Specialization::from_db_str(s).unwrap();
            assert_eq!(sp, parsed);
        }
    }

    #[test]
    fn test_message_type_roundtrip() {
        for mt in [
            MessageType::Task,
            MessageType::Result,
            MessageType::Status,
            MessageType::Error,
        ] {
            let s = mt.as_db_str();
            let parsed = MessageType::from_db_str(s).unwrap();
            assert_eq!(mt, parsed);
        }
    }

    #[test]
    fn test_priority_rank_ordering() {
        assert!(MessagePriority::High.rank() > MessagePriority::Normal.rank());
        assert!(MessagePriority::Normal.rank() > MessagePriority::Low.rank());
    }

    #[test]
    fn test_task_status_terminal() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Assigned.is_terminal());
        assert!(!TaskStatus::InProgress.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
    }

    #[test]
    fn test_task_status_forward_only() {
        use TaskStatus::*;

        assert!(Pending.can_transition_to(Assigned));
        assert!(Assigned.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));
        assert!(InProgress.can_transition_to(Failed));

        // backward transitions are forbidden
        assert!(!Assigned.can_transition_to(Pending));
        assert!(!InProgress.can_transition_to(Assigned));
        assert!(!Completed.can_transition_to(InProgress));

        // terminal states are immutable
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Completed));
    }

    #[test]
    fn test_task_status_serde_strings() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        let parsed: TaskStatus = serde_json::from_str("\"in_progress\"").unwrap();
        assert_eq!(parsed, TaskStatus::InProgress);
    }

    #[test]
    fn test_agent_status_availability() {
        assert!(AgentStatus::Idle.is_available());
        assert!(AgentStatus::Working.is_available());
        assert!(AgentStatus::Waiting.is_available());
        assert!(!AgentStatus::Completed.is_available());
        assert!(!AgentStatus::Error.is_available());
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn any_task_status() -> impl Strategy<Value = TaskStatus> {
        prop_oneof![
            Just(TaskStatus::Pending),
            Just(TaskStatus::Assigned),
            Just(TaskStatus::InProgress),
            Just(TaskStatus::Completed),
            Just(TaskStatus::Failed),
        ]
    }

    fn rank(s: TaskStatus) -> i32 {
        match s {
            TaskStatus::Pending => 0,
            TaskStatus::Assigned => 1,
            TaskStatus::InProgress => 2,
            TaskStatus::Completed | TaskStatus::Failed => 3,
        }
    }

    proptest! {
        /// Any allowed transition strictly increases the DAG rank, so no
        /// sequence of allowed transitions can ever move backward.
        #[test]
        fn prop_transitions_strictly_forward(
            from in any_task_status(),
            to in any_task_status(),
        ) {
            if from.can_transition_to(to) {
                prop_assert!(rank(to) > rank(from));
            }
        }

        /// Terminal states allow no outgoing transitions at all.
        #[test]
        fn prop_terminal_states_are_sinks(
            from in any_task_status(),
            to in any_task_status(),
        ) {
            if from.is_terminal() {
                prop_assert!(!from.can_transition_to(to));
            }
        }
    }
}
