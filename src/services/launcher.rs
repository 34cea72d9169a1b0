//! Agent launcher: worktree provisioning + session start as one seam.
//!
//! The scheduler only sees the [`AgentSpawner`] port; this is the
//! production implementation combining the worktree manager with the
//! tmux supervisor.

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Project, Task};
use crate::domain::ports::AgentSpawner;
use crate::infrastructure::session::{launch_agent_session, StatusFiles, TmuxSupervisor};
use crate::services::task_store::TaskStore;
use crate::services::worktree::WorktreeManager;

pub struct AgentLauncher {
    supervisor: Arc<TmuxSupervisor>,
    status_files: StatusFiles,
    agent_command: String,
    coordination_endpoint: String,
}

impl AgentLauncher {
    pub fn new(
        supervisor: Arc<TmuxSupervisor>,
        status_files: StatusFiles,
        agent_command: impl Into<String>,
        coordination_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            supervisor,
            status_files,
            agent_command: agent_command.into(),
            coordination_endpoint: coordination_endpoint.into(),
        }
    }
}

#[async_trait]
impl AgentSpawner for AgentLauncher {
    async fn spawn_agent(&self, project: &Project, task: &Task) -> DomainResult<String> {
        let worktree_manager = WorktreeManager::for_project(project);
        let all_tasks = TaskStore::for_project(project).list().await?;
        let worktree_path = worktree_manager.provision(task, &all_tasks).await?;

        launch_agent_session(
            &self.supervisor,
            &self.status_files,
            project,
            task,
            &worktree_path,
            &self.agent_command,
            &self.coordination_endpoint,
        )
        .await
    }
}
