//! Error types for the SQUAD API
//!
//! Every handler failure is serialized as `{error, message, statusCode}`
//! with the matching HTTP status.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use squad_core::{
    AgentError, LlmError, SandboxError, SquadError, StorageError, TaskError, ValidationError,
};
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses. Each maps to one HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Unknown agent/task/sandbox/message id
    NotFound,
    /// Request failed schema-level validation
    ValidationFailed,
    /// An entity with this id already exists
    AlreadyExists,
    /// The task status DAG forbids this transition
    TransitionViolation,
    /// The agent already has a running process
    AgentAlreadyRunning,
    /// The sandbox provider rejected or failed an operation
    SandboxFailure,
    /// A sandbox command timed out
    CommandTimeout,
    /// The LLM provider failed; calls are not retried
    LlmFailure,
    /// MongoDB is unreachable or failing
    StorageUnavailable,
    /// Anything else
    InternalError,
}

impl ErrorCode {
    /// HTTP status for this code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::ValidationFailed => StatusCode::BAD_REQUEST,
            ErrorCode::AlreadyExists
            | ErrorCode::TransitionViolation
            | ErrorCode::AgentAlreadyRunning => StatusCode::CONFLICT,
            ErrorCode::SandboxFailure | ErrorCode::LlmFailure => StatusCode::BAD_GATEWAY,
            ErrorCode::CommandTimeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorCode::StorageUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ErrorCode {
    /// The wire name of this code (as serialized into the `error` field).
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ErrorCode::AlreadyExists => "ALREADY_EXISTS",
            ErrorCode::TransitionViolation => "TRANSITION_VIOLATION",
            ErrorCode::AgentAlreadyRunning => "AGENT_ALREADY_RUNNING",
            ErrorCode::SandboxFailure => "SANDBOX_FAILURE",
            ErrorCode::CommandTimeout => "COMMAND_TIMEOUT",
            ErrorCode::LlmFailure => "LLM_FAILURE",
            ErrorCode::StorageUnavailable => "STORAGE_UNAVAILABLE",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// API ERROR
// ============================================================================

/// Structured error returned by every endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code
    #[serde(rename = "error")]
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// HTTP status, mirrored into the body
    #[serde(rename = "statusCode")]
    pub status_code: u16,
}

impl ApiError {
    /// Create an error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status_code: code.status_code().as_u16(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// The HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

// ============================================================================
// DOMAIN ERROR TRANSLATION
// ============================================================================

impl From<SquadError> for ApiError {
    fn from(err: SquadError) -> Self {
        let message = err.to_string();
        let code = match &err {
            SquadError::Storage(storage) => match storage {
                StorageError::NotFound { .. } => ErrorCode::NotFound,
                StorageError::Duplicate { .. } => ErrorCode::AlreadyExists,
                StorageError::Unavailable { .. } | StorageError::Backend { .. } => {
                    ErrorCode::StorageUnavailable
                }
                _ => ErrorCode::InternalError,
            },
            SquadError::Validation(ValidationError::RequiredFieldMissing { .. })
            | SquadError::Validation(ValidationError::InvalidValue { .. }) => {
                ErrorCode::ValidationFailed
            }
            SquadError::Task(task) => match task {
                TaskError::InvalidTransition { .. } | TaskError::Terminal { .. } => {
                    ErrorCode::TransitionViolation
                }
                TaskError::NotAssignable { .. } => ErrorCode::TransitionViolation,
            },
            SquadError::Agent(agent) => match agent {
                AgentError::AlreadyRunning { .. } => ErrorCode::AgentAlreadyRunning,
                AgentError::NotRegistered { .. } => ErrorCode::NotFound,
                AgentError::MissingParent { .. } | AgentError::SpawnNotAllowed { .. } => {
                    ErrorCode::ValidationFailed
                }
            },
            SquadError::Sandbox(sandbox) => match sandbox {
                SandboxError::NotFound { .. } => ErrorCode::NotFound,
                SandboxError::CommandTimeout { .. } => ErrorCode::CommandTimeout,
                _ => ErrorCode::SandboxFailure,
            },
            SquadError::Llm(LlmError::ProviderNotConfigured) => ErrorCode::InternalError,
            SquadError::Llm(_) => ErrorCode::LlmFailure,
        };
        ApiError::new(code, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_shape() {
        let err = ApiError::not_found("Agent abc not found");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["error"], "NOT_FOUND");
        assert_eq!(json["message"], "Agent abc not found");
        assert_eq!(json["statusCode"], 404);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(ErrorCode::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ErrorCode::TransitionViolation.status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ErrorCode::CommandTimeout.status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            ErrorCode::StorageUnavailable.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_domain_translation() {
        let err: ApiError = SquadError::from(StorageError::NotFound {
            entity: "agent",
            id: "a1".to_string(),
        })
        .into();
        assert_eq!(err.code, ErrorCode::NotFound);

        let err: ApiError = SquadError::from(AgentError::AlreadyRunning {
            agent_id: "a1".to_string(),
        })
        .into();
        assert_eq!(err.code, ErrorCode::AgentAlreadyRunning);
        assert_eq!(err.status_code, 409);
    }
}
