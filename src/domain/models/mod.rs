//! Domain models.

pub mod config;
pub mod coordination;
pub mod event;
pub mod project;
pub mod task;

pub use config::{Config, CoordinationConfig, LoggingConfig, OrchestratorConfig, PlannerConfig};
pub use coordination::{
    AgentRecord, CompletionNotice, CoordinationSnapshot, FileLock, FileOperation, InterfaceDef,
    Message, MessageKind, Todo, TodoStatus, LIVENESS_WINDOW_SECS, LOCK_TTL_SECS,
};
pub use event::{EventPayload, OrchestratorEvent, SequenceNumber};
pub use project::{Project, ProjectStats};
pub use task::{sanitize_identifier, Task, TaskStatus, DEFAULT_PRIORITY};
