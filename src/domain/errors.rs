//! Domain errors for the Trunkline orchestrator.

use thiserror::Error;

/// Domain-level errors that can occur across the orchestrator.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Duplicate task id: {0}")]
    DuplicateTask(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Task dependency cycle detected involving: {0}")]
    DependencyCycle(String),

    #[error("Session error: {0}")]
    SessionError(String),

    #[error("Session name already in use: {0}")]
    SessionCollision(String),

    #[error("Git operation failed: {0}")]
    GitError(String),

    #[error("File {path} is locked by {holder}")]
    LockHeld { path: String, holder: String },

    #[error("Merge blocked: {0}")]
    MergeBlocked(String),

    #[error("Conflict resolution failed for {0}")]
    ResolverFailed(String),

    #[error("Plan synthesis timed out after {0} seconds")]
    PlanTimeout(u64),

    #[error("Plan synthesis failed: {0}")]
    PlanFailed(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Corrupt task file: {0}")]
    CorruptTaskFile(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        DomainError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
