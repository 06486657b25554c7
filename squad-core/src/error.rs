//! Error types for SQUAD operations

use crate::TaskStatus;
use thiserror::Error;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Insert failed for {entity}: {reason}")]
    InsertFailed { entity: &'static str, reason: String },

    #[error("Update failed for {entity} with id {id}: {reason}")]
    UpdateFailed {
        entity: &'static str,
        id: String,
        reason: String,
    },

    #[error("Duplicate {entity} with id {id}")]
    Duplicate { entity: &'static str, id: String },

    #[error("Storage backend error: {reason}")]
    Backend { reason: String },

    #[error("Storage unavailable: {reason}")]
    Unavailable { reason: String },
}

/// LLM provider errors. Calls are never retried by the core.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("No LLM provider configured")]
    ProviderNotConfigured,

    #[error("Invalid API key for {provider}")]
    InvalidApiKey { provider: String },

    #[error("Rate limited by {provider}")]
    RateLimited { provider: String },

    #[error("Request to {provider} failed with status {status}: {message}")]
    RequestFailed {
        provider: String,
        status: i32,
        message: String,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

/// Sandbox provider and orchestration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SandboxError {
    #[error("Sandbox creation failed: {reason}")]
    CreationFailed { reason: String },

    #[error("Sandbox not found: {sandbox_id}")]
    NotFound { sandbox_id: String },

    #[error("No sandbox is active")]
    NotReady,

    #[error("Command execution failed: {reason}")]
    CommandFailed { reason: String },

    #[error("Command timed out after {timeout_ms}ms")]
    CommandTimeout { timeout_ms: i64 },

    #[error("Sandbox provider error: {reason}")]
    ProviderError { reason: String },
}

/// Agent coordination errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AgentError {
    #[error("Agent not registered: {agent_id}")]
    NotRegistered { agent_id: String },

    #[error("Agent {agent_id} already has a running process")]
    AlreadyRunning { agent_id: String },

    #[error("Specialist {agent_id} has no parent director")]
    MissingParent { agent_id: String },

    #[error("Only directors may spawn specialists (agent {agent_id})")]
    SpawnNotAllowed { agent_id: String },
}

/// Task lifecycle errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("Task {task_id}: transition {from} -> {to} is not allowed")]
    InvalidTransition {
        task_id: String,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("Task {task_id} is terminal ({status}) and cannot change")]
    Terminal { task_id: String, status: TaskStatus },

    #[error("Task {task_id} cannot be assigned from status {status}")]
    NotAssignable { task_id: String, status: TaskStatus },
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Master error type for all SQUAD errors.
#[derive(Debug, Clone, Error)]
pub enum SquadError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Sandbox error: {0}")]
    Sandbox(#[from] SandboxError),

    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("Task error: {0}")]
    Task(#[from] TaskError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Result type alias for SQUAD operations.
pub type SquadResult<T> = Result<T, SquadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TaskError::InvalidTransition {
            task_id: "t1".to_string(),
            from: TaskStatus::Completed,
            to: TaskStatus::Pending,
        };
        assert_eq!(
            err.to_string(),
            "Task t1: transition completed -> pending is not allowed"
        );
    }

    #[test]
    fn test_master_error_from() {
        let err: SquadError = StorageError::NotFound {
            entity: "agent",
            id: "a1".to_string(),
        }
        .into();
        assert!(matches!(err, SquadError::Storage(_)));
        assert!(err.to_string().contains("agent"));
    }
}
