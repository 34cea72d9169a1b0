//! Coordination store record types.
//!
//! Every value held by the coordination store is one of these tagged
//! variants rather than a free-form JSON object, so the RPC layer and the
//! scheduler agree on shape at compile time.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Heartbeats older than this mark the session stale.
pub const LIVENESS_WINDOW_SECS: i64 = 120;

/// Default TTL granted to a file lock; renewed on every heartbeat.
pub const LOCK_TTL_SECS: i64 = 300;

/// An agent registered for a `(project, session)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub session_name: String,
    pub task_id: String,
    pub branch: String,
    pub description: String,
    /// `active` while working, `merged` once the merge queue finishes
    pub status: String,
    pub started_at: DateTime<Utc>,
}

/// Status of a todo item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl TodoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// One entry of an agent's shared todo list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Todo {
    pub id: String,
    pub text: String,
    pub status: TodoStatus,
    pub priority: i64,
    pub created_at: DateTime<Utc>,
}

impl Todo {
    pub fn new(text: impl Into<String>, priority: i64) -> Self {
        Self {
            id: format!("todo-{}", Uuid::new_v4().simple()),
            text: text.into(),
            status: TodoStatus::Pending,
            priority,
            created_at: Utc::now(),
        }
    }
}

/// Operation declared when a file lock is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileOperation {
    Create,
    Modify,
    Delete,
}

impl FileOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Modify => "modify",
            Self::Delete => "delete",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "create" => Some(Self::Create),
            "modify" => Some(Self::Modify),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

/// An exclusive per-path lock with a TTL renewed on heartbeat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileLock {
    pub file_path: String,
    pub session_name: String,
    pub operation: FileOperation,
    pub description: Option<String>,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl FileLock {
    pub fn new(
        file_path: impl Into<String>,
        session_name: impl Into<String>,
        operation: FileOperation,
        description: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            file_path: file_path.into(),
            session_name: session_name.into(),
            operation,
            description,
            acquired_at: now,
            expires_at: now + Duration::seconds(LOCK_TTL_SECS),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Extend the TTL from `now`.
    pub fn renew(&mut self, now: DateTime<Utc>) {
        self.expires_at = now + Duration::seconds(LOCK_TTL_SECS);
    }
}

/// A shared type/interface definition registered by one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceDef {
    pub name: String,
    pub definition: String,
    pub registered_by: String,
    pub registered_at: DateTime<Utc>,
}

/// Kind of inter-agent message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Query,
    Response,
    Broadcast,
    Status,
}

/// A message in a session's FIFO inbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub from_session: String,
    pub kind: MessageKind,
    pub body: String,
    /// Set on responses to tie them back to the originating query
    pub in_reply_to: Option<String>,
    pub sent_at: DateTime<Utc>,
}

impl Message {
    pub fn query(from_session: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: format!("msg-{}", Uuid::new_v4().simple()),
            from_session: from_session.into(),
            kind: MessageKind::Query,
            body: body.into(),
            in_reply_to: None,
            sent_at: Utc::now(),
        }
    }

    pub fn response(
        from_session: impl Into<String>,
        body: impl Into<String>,
        query_id: impl Into<String>,
    ) -> Self {
        Self {
            id: format!("msg-{}", Uuid::new_v4().simple()),
            from_session: from_session.into(),
            kind: MessageKind::Response,
            body: body.into(),
            in_reply_to: Some(query_id.into()),
            sent_at: Utc::now(),
        }
    }

    pub fn broadcast(from_session: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: format!("msg-{}", Uuid::new_v4().simple()),
            from_session: from_session.into(),
            kind: MessageKind::Broadcast,
            body: body.into(),
            in_reply_to: None,
            sent_at: Utc::now(),
        }
    }
}

/// A completion notice written by an agent's final RPC, consumed by the
/// scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionNotice {
    pub task_id: String,
    pub session_name: String,
    pub completed_at: DateTime<Utc>,
}

/// A live snapshot of one project's coordination state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoordinationSnapshot {
    pub active_agents: usize,
    pub total_agents: usize,
    pub total_todos: usize,
    pub completed_todos: usize,
    /// file path -> holding session
    pub file_locks: Vec<FileLock>,
}
