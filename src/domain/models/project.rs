//! Project domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A repository under orchestration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Stable string id, safe for filesystem and URL use
    pub id: String,
    pub name: String,
    /// Root path; must be a git repository with a `main` branch
    pub path: PathBuf,
    pub description: Option<String>,
    /// Detailed overview used for plan synthesis
    pub project_overview: Option<String>,
    /// Initial prompt used for plan synthesis
    pub initial_prompt: Option<String>,
    /// Per-project cap on concurrently running agents
    pub max_agents: usize,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(id: impl Into<String>, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            path: path.into(),
            description: None,
            project_overview: None,
            initial_prompt: None,
            max_agents: 5,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_max_agents(mut self, max_agents: usize) -> Self {
        self.max_agents = max_agents;
        self
    }

    /// Directory holding the task file and orchestrator scratch state.
    pub fn state_dir(&self) -> PathBuf {
        self.path.join(".trunkline")
    }

    /// The on-disk task file for this project.
    pub fn tasks_file(&self) -> PathBuf {
        self.state_dir().join("tasks.md")
    }

    /// Directory under which per-branch worktrees are created.
    pub fn worktrees_dir(&self) -> PathBuf {
        self.path.join("worktrees")
    }
}

/// Aggregate task/agent counts surfaced to dashboards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectStats {
    pub total_tasks: usize,
    pub unclaimed_tasks: usize,
    pub up_next_tasks: usize,
    pub in_progress_tasks: usize,
    pub completed_tasks: usize,
    pub merged_tasks: usize,
    pub active_agents: usize,
}
