//! Trait seams between the scheduler/merge queue and the outside world.
//!
//! The production implementations live in `infrastructure`; tests swap in
//! mocks so scheduling behavior can be exercised without tmux or a live
//! git checkout.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Project, Task};

/// Supervised shell sessions hosting agent processes.
#[async_trait]
pub trait SessionSupervisor: Send + Sync {
    /// Names of all live sessions.
    async fn list_sessions(&self) -> DomainResult<Vec<String>>;

    /// Whether a session with exactly this name exists.
    async fn has_session(&self, session: &str) -> DomainResult<bool>;

    /// Kill a session if it exists.
    async fn kill(&self, session: &str) -> DomainResult<()>;

    /// Tail of the session's visible output.
    async fn capture_tail(&self, session: &str) -> DomainResult<String>;
}

/// Provisions a worktree and launches an agent session for a task.
#[async_trait]
pub trait AgentSpawner: Send + Sync {
    /// Returns the session name on success.
    async fn spawn_agent(&self, project: &Project, task: &Task) -> DomainResult<String>;
}

/// Read-only git queries used for completion/failure detection and the
/// merge queue's live-lock gate.
#[async_trait]
pub trait RepoInspector: Send + Sync {
    /// Number of commits on `branch` that are not on `main`.
    async fn commits_ahead(&self, repo: &Path, branch: &str) -> DomainResult<usize>;

    /// Paths changed on `branch` relative to `main`.
    async fn changed_files(&self, repo: &Path, branch: &str) -> DomainResult<Vec<String>>;
}

/// One task suggestion produced by plan synthesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedTask {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub priority: Option<i64>,
}

/// Output of one plan synthesis call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanOutline {
    pub plan: String,
    pub suggested_tasks: Vec<SuggestedTask>,
}

/// Synthesizes a task list from a natural-language project description.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn synthesize_plan(
        &self,
        project_overview: &str,
        initial_prompt: &str,
    ) -> DomainResult<PlanOutline>;
}
