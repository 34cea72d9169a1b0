//! Event envelope and typed payloads published on the event bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::coordination::FileLock;
use super::task::TaskStatus;

/// Monotonically increasing sequence number assigned by the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SequenceNumber(pub u64);

impl std::fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Envelope carried to every subscriber.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorEvent {
    pub id: Uuid,
    pub sequence: SequenceNumber,
    pub project_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl OrchestratorEvent {
    pub fn new(project_id: Option<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            sequence: SequenceNumber(0),
            project_id,
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// Typed event payloads; serialized as `{"type": ..., "data": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EventPayload {
    OrchestratorStarted,
    OrchestratorStopped,
    OrchestratorError {
        error: String,
    },
    TaskStatusChanged {
        task_id: String,
        status: TaskStatus,
    },
    AgentSpawned {
        task_id: String,
        session: String,
        branch: String,
    },
    AgentSpawnFailed {
        task_id: String,
        error: String,
    },
    TaskCompleted {
        task_id: String,
        branch: String,
    },
    TaskQueuedForMerge {
        task_id: String,
        title: String,
    },
    TaskMerged {
        task_id: String,
        branch: String,
    },
    MergeFailed {
        task_id: String,
        branch: String,
        reason: String,
    },
    CoordinationUpdate {
        active_agents: usize,
        total_todos: usize,
        completed_todos: usize,
    },
    FileLocksUpdate {
        locks: Vec<FileLock>,
    },
    PlanGenerated {
        task_count: usize,
        plan: Value,
    },
    ProjectReset,
}

impl EventPayload {
    /// The wire-level discriminant of this payload.
    pub fn variant_name(&self) -> &'static str {
        match self {
            Self::OrchestratorStarted => "orchestrator_started",
            Self::OrchestratorStopped => "orchestrator_stopped",
            Self::OrchestratorError { .. } => "orchestrator_error",
            Self::TaskStatusChanged { .. } => "task_status_changed",
            Self::AgentSpawned { .. } => "agent_spawned",
            Self::AgentSpawnFailed { .. } => "agent_spawn_failed",
            Self::TaskCompleted { .. } => "task_completed",
            Self::TaskQueuedForMerge { .. } => "task_queued_for_merge",
            Self::TaskMerged { .. } => "task_merged",
            Self::MergeFailed { .. } => "merge_failed",
            Self::CoordinationUpdate { .. } => "coordination_update",
            Self::FileLocksUpdate { .. } => "file_locks_update",
            Self::PlanGenerated { .. } => "plan_generated",
            Self::ProjectReset => "project_reset",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_wire_shape() {
        let event = OrchestratorEvent::new(
            Some("demo".to_string()),
            EventPayload::TaskStatusChanged {
                task_id: "1-demo".to_string(),
                status: TaskStatus::UpNext,
            },
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "task_status_changed");
        assert_eq!(json["data"]["task_id"], "1-demo");
        assert_eq!(json["data"]["status"], "up_next");
        assert_eq!(json["project_id"], "demo");
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn test_variant_names_match_serde_tags() {
        let payload = EventPayload::TaskMerged {
            task_id: "1-demo".to_string(),
            branch: "task-1".to_string(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], payload.variant_name());

        let payload = EventPayload::ProjectReset;
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], payload.variant_name());
    }
}
