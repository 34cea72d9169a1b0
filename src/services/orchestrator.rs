//! Orchestrator: supervises one scheduler per project.
//!
//! All components are explicit and injected; per-project loop state lives
//! in an owned map rather than process-wide globals.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Config, EventPayload, Project, TaskStatus};
use crate::domain::ports::{AgentSpawner, RepoInspector, SessionSupervisor};
use crate::infrastructure::git::{self, GitInspector};
use crate::infrastructure::session::{StatusFiles, TmuxSupervisor};
use crate::services::coordination::CoordinationStore;
use crate::services::event_bus::EventBus;
use crate::services::launcher::AgentLauncher;
use crate::services::merge_queue::{MergeQueue, MergeQueueConfig};
use crate::services::scheduler::{ProjectScheduler, SchedulerDeps};
use crate::services::task_store::TaskStore;
use crate::services::worktree::WorktreeManager;

struct RunningScheduler {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<DomainResult<()>>,
}

/// Supervises per-project schedulers and owns the shared components.
pub struct Orchestrator {
    config: Config,
    store: Arc<CoordinationStore>,
    event_bus: Arc<EventBus>,
    supervisor: Arc<TmuxSupervisor>,
    running: Mutex<HashMap<String, RunningScheduler>>,
}

impl Orchestrator {
    pub fn new(config: Config, store: Arc<CoordinationStore>, event_bus: Arc<EventBus>) -> Self {
        Self {
            config,
            store,
            event_bus,
            supervisor: Arc::new(TmuxSupervisor::new()),
            running: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<CoordinationStore> {
        &self.store
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub async fn is_running(&self, project_id: &str) -> bool {
        self.running.lock().await.contains_key(project_id)
    }

    /// Start the scheduler loop for a project.
    ///
    /// Fails fast (without touching any state) when the project repository
    /// is unusable or a scheduler is already running for it.
    pub async fn start(&self, project: Project) -> DomainResult<()> {
        let mut running = self.running.lock().await;
        if running.contains_key(&project.id) {
            return Err(DomainError::ValidationFailed(format!(
                "orchestrator already running for project {}",
                project.id
            )));
        }

        git::verify_project_repo(&project).await?;
        // A task file that cannot be parsed is fatal for this project;
        // other projects are unaffected.
        TaskStore::for_project(&project).list().await?;

        let status_files = StatusFiles::new(&self.config.orchestrator.status_dir);
        let spawner: Arc<dyn AgentSpawner> = Arc::new(AgentLauncher::new(
            self.supervisor.clone(),
            status_files,
            self.config.orchestrator.agent_command.clone(),
            self.config.coordination.endpoint.clone(),
        ));
        let inspector: Arc<dyn RepoInspector> = Arc::new(GitInspector);

        let merge_queue = MergeQueue::new(
            project.clone(),
            MergeQueueConfig::default(),
            self.store.clone(),
            self.event_bus.clone(),
            inspector.clone(),
        );

        let scheduler = ProjectScheduler::new(
            project.clone(),
            self.config.orchestrator.clone(),
            merge_queue,
            SchedulerDeps {
                store: self.store.clone(),
                event_bus: self.event_bus.clone(),
                spawner,
                supervisor: self.supervisor.clone(),
                inspector,
            },
        );

        let (stop_tx, stop_rx) = watch::channel(false);
        let project_id = project.id.clone();
        let handle = tokio::spawn(async move { scheduler.run(stop_rx).await });

        running.insert(project_id.clone(), RunningScheduler { stop_tx, handle });
        info!(project_id, "orchestrator started for project");
        Ok(())
    }

    /// Request a cooperative stop and wait for the current tick to finish.
    pub async fn stop(&self, project_id: &str) -> DomainResult<()> {
        let Some(running) = self.running.lock().await.remove(project_id) else {
            return Ok(());
        };
        let _ = running.stop_tx.send(true);
        match running.handle.await {
            Ok(result) => result,
            Err(e) => {
                warn!(project_id, error = %e, "scheduler task panicked or was cancelled");
                Ok(())
            }
        }
    }

    /// Destroy all orchestration state for a project: kill its sessions,
    /// remove its worktrees, clear its coordination namespace, and rewind
    /// non-merged tasks to `unclaimed`.
    pub async fn reset(&self, project: &Project) -> DomainResult<()> {
        self.stop(&project.id).await?;

        let task_store = TaskStore::for_project(project);
        let mut tasks = task_store.list().await?;

        // Kill any sessions still attached to tasks
        for task in &tasks {
            if let Some(session) = &task.session {
                let _ = self.supervisor.kill(session).await;
            }
        }

        // Remove worktrees before rewriting task state
        let worktrees = WorktreeManager::for_project(project);
        worktrees.cleanup_all(&tasks).await;

        for task in &mut tasks {
            if task.status != TaskStatus::Merged {
                task.status = TaskStatus::Unclaimed;
                task.session = None;
                task.completed_at = None;
            }
        }
        task_store.save(tasks).await?;

        self.store.clear_project(&project.id).await;

        let status_files = StatusFiles::new(&self.config.orchestrator.status_dir);
        status_files.clear_all().await;

        self.event_bus
            .publish(Some(project.id.clone()), EventPayload::ProjectReset);
        info!(project_id = %project.id, "project reset");
        Ok(())
    }

    /// Stop every running scheduler, waiting for all of them in parallel.
    pub async fn shutdown(&self) {
        let project_ids: Vec<String> = self.running.lock().await.keys().cloned().collect();
        let stops = project_ids.iter().map(|id| self.stop(id));
        for result in futures::future::join_all(stops).await {
            if let Err(e) = result {
                warn!(error = %e, "scheduler returned an error during shutdown");
            }
        }
    }
}
