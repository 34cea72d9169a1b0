//! Task queue scheduler.
//!
//! One periodic control loop per project: promotes tasks through the
//! queue, spawns agents up to the concurrency cap while honoring
//! dependencies, priorities, and file-conflict rules, recognizes
//! completion through a prioritized chain of signals, rewinds dead
//! agents, and drains the merge queue.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, instrument, warn};

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    EventPayload, OrchestratorConfig, Project, Task, TaskStatus,
};
use crate::domain::ports::{AgentSpawner, RepoInspector, SessionSupervisor};
use crate::infrastructure::git;
use crate::infrastructure::session::{resolve_session, StatusFiles};
use crate::services::coordination::CoordinationStore;
use crate::services::dependency::DependencyResolver;
use crate::services::event_bus::EventBus;
use crate::services::merge_queue::MergeQueue;
use crate::services::task_store::{TaskPatch, TaskStore};

/// Everything a scheduler needs from the outside world, injected so tests
/// can swap in mocks.
pub struct SchedulerDeps {
    pub store: Arc<CoordinationStore>,
    pub event_bus: Arc<EventBus>,
    pub spawner: Arc<dyn AgentSpawner>,
    pub supervisor: Arc<dyn SessionSupervisor>,
    pub inspector: Arc<dyn RepoInspector>,
}

/// Scheduler for one project.
pub struct ProjectScheduler {
    project: Project,
    config: OrchestratorConfig,
    task_store: TaskStore,
    merge_queue: MergeQueue,
    status_files: StatusFiles,
    deps: SchedulerDeps,
    resolver: DependencyResolver,
    /// Cycles already reported, keyed by their sorted member ids.
    warned_cycles: Mutex<HashSet<String>>,
    /// Tasks already reported for unknown dependency ids.
    warned_unknown_deps: Mutex<HashSet<String>>,
}

impl ProjectScheduler {
    pub fn new(
        project: Project,
        config: OrchestratorConfig,
        merge_queue: MergeQueue,
        deps: SchedulerDeps,
    ) -> Self {
        let task_store = TaskStore::for_project(&project);
        let status_files = StatusFiles::new(&config.status_dir);
        Self {
            project,
            config,
            task_store,
            merge_queue,
            status_files,
            deps,
            resolver: DependencyResolver::new(),
            warned_cycles: Mutex::new(HashSet::new()),
            warned_unknown_deps: Mutex::new(HashSet::new()),
        }
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn task_store(&self) -> &TaskStore {
        &self.task_store
    }

    fn emit(&self, payload: EventPayload) {
        self.deps.event_bus.publish(Some(self.project.id.clone()), payload);
    }

    fn emit_status_change(&self, task_id: &str, status: TaskStatus) {
        self.emit(EventPayload::TaskStatusChanged {
            task_id: task_id.to_string(),
            status,
        });
    }

    /// Effective number of agent slots for this project.
    fn target_slots(&self) -> usize {
        self.config.max_concurrent_agents.min(self.project.max_agents)
    }

    /// Run the loop until the stop signal flips. The current tick always
    /// finishes before the loop exits.
    pub async fn run(&self, mut stop_rx: watch::Receiver<bool>) -> DomainResult<()> {
        git::verify_project_repo(&self.project).await?;
        self.status_files.clear_all().await;
        self.emit(EventPayload::OrchestratorStarted);
        info!(project_id = %self.project.id, "scheduler started");

        loop {
            if *stop_rx.borrow() {
                break;
            }
            if let Err(e) = self.tick().await {
                error!(project_id = %self.project.id, error = %e, "tick failed; retrying next interval");
                self.emit(EventPayload::OrchestratorError {
                    error: e.to_string(),
                });
            }

            let sleep = tokio::time::sleep(Duration::from_secs(self.config.tick_interval_secs));
            tokio::select! {
                _ = sleep => {}
                _ = stop_rx.changed() => {
                    if *stop_rx.borrow() {
                        break;
                    }
                }
            }
        }

        self.status_files.clear_all().await;
        self.emit(EventPayload::OrchestratorStopped);
        info!(project_id = %self.project.id, "scheduler stopped");
        Ok(())
    }

    /// One full scheduler tick.
    #[instrument(skip(self), fields(project_id = %self.project.id))]
    pub async fn tick(&self) -> DomainResult<()> {
        self.manage_queue().await?;
        self.spawn_agents().await?;
        self.detect_completions().await?;
        self.drain_merges().await?;
        self.publish_coordination_stats().await;
        Ok(())
    }

    // ------------------------------------------------------------------
    // (a) Queue management
    // ------------------------------------------------------------------

    async fn manage_queue(&self) -> DomainResult<()> {
        let tasks = self.task_store.list().await?;
        let target = self.target_slots();

        let up_next: Vec<&Task> = tasks.iter().filter(|t| t.status == TaskStatus::UpNext).collect();
        let in_progress = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::InProgress)
            .count();
        debug!(
            unclaimed = tasks.iter().filter(|t| t.status == TaskStatus::Unclaimed).count(),
            up_next = up_next.len(),
            in_progress,
            target,
            "queue state"
        );

        if up_next.len() < target {
            let mut eligible = self.promotable_tasks(&tasks).await;
            eligible.sort_by(|a, b| {
                a.priority
                    .cmp(&b.priority)
                    .then(b.merge_order.cmp(&a.merge_order))
            });

            let to_promote = (target - up_next.len()).min(eligible.len());
            for task in eligible.into_iter().take(to_promote) {
                info!(task_id = %task.id, title = %task.title, "promoting to up_next");
                self.task_store
                    .update(&task.id, TaskPatch::status(TaskStatus::UpNext))
                    .await?;
                self.emit_status_change(&task.id, TaskStatus::UpNext);
            }
        } else if up_next.len() > target {
            // Queue shrank (config change); demote the lowest priority first
            let mut surplus: Vec<&Task> = up_next;
            surplus.sort_by(|a, b| {
                b.priority
                    .cmp(&a.priority)
                    .then(a.merge_order.cmp(&b.merge_order))
            });
            for task in surplus.into_iter().take(up_next_overflow(&tasks, target)) {
                info!(task_id = %task.id, "demoting back to unclaimed");
                self.task_store
                    .update(&task.id, TaskPatch::status(TaskStatus::Unclaimed))
                    .await?;
                self.emit_status_change(&task.id, TaskStatus::Unclaimed);
            }
        }

        Ok(())
    }

    /// Unclaimed tasks whose dependencies are all completed or merged,
    /// excluding tasks on dependency cycles and tasks referencing unknown
    /// dependency ids.
    async fn promotable_tasks(&self, tasks: &[Task]) -> Vec<Task> {
        let in_cycles = self.resolver.tasks_in_cycles(tasks);
        if !in_cycles.is_empty() {
            let mut key: Vec<&str> = in_cycles.iter().map(String::as_str).collect();
            key.sort_unstable();
            let key = key.join(",");
            let mut warned = self.warned_cycles.lock().await;
            if warned.insert(key.clone()) {
                error!(project_id = %self.project.id, cycle = %key, "dependency cycle detected; members will never be promoted");
            }
        }

        let mut eligible = Vec::new();
        for task in tasks {
            if task.status != TaskStatus::Unclaimed || in_cycles.contains(&task.id) {
                continue;
            }

            let unknown = self.resolver.unknown_dependencies(task, tasks);
            if !unknown.is_empty() {
                let mut warned = self.warned_unknown_deps.lock().await;
                if warned.insert(task.id.clone()) {
                    warn!(
                        task_id = %task.id,
                        unknown = %unknown.join(","),
                        "task references unknown dependencies; skipping promotion"
                    );
                }
                continue;
            }

            let deps_met = task.dependencies.iter().all(|dep_id| {
                tasks.iter().any(|t| {
                    &t.id == dep_id
                        && matches!(t.status, TaskStatus::Completed | TaskStatus::Merged)
                })
            });
            if deps_met {
                eligible.push(task.clone());
            }
        }
        eligible
    }

    // ------------------------------------------------------------------
    // (b) Agent spawning
    // ------------------------------------------------------------------

    async fn spawn_agents(&self) -> DomainResult<()> {
        let tasks = self.task_store.list().await?;
        let target = self.target_slots();
        let in_progress: Vec<&Task> = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::InProgress)
            .collect();

        let available = target.saturating_sub(in_progress.len());
        if available == 0 {
            return Ok(());
        }

        let mut candidates: Vec<&Task> = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::UpNext)
            .collect();
        candidates.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then(b.merge_order.cmp(&a.merge_order))
        });

        // A pick must not conflict with running tasks nor with the picks
        // made earlier in this same tick.
        let mut chosen: Vec<&Task> = Vec::new();
        for candidate in candidates {
            if chosen.len() == available {
                break;
            }
            let conflicting = in_progress
                .iter()
                .chain(chosen.iter())
                .any(|other| candidate.conflicts_with(other));
            if conflicting {
                debug!(task_id = %candidate.id, "skipping spawn due to file-conflict rules");
                continue;
            }
            chosen.push(candidate);
        }

        for task in chosen {
            match self.deps.spawner.spawn_agent(&self.project, task).await {
                Ok(session) => {
                    self.task_store
                        .update(
                            &task.id,
                            TaskPatch::status(TaskStatus::InProgress)
                                .with_session(Some(session.clone())),
                        )
                        .await?;
                    self.emit_status_change(&task.id, TaskStatus::InProgress);
                    self.emit(EventPayload::AgentSpawned {
                        task_id: task.id.clone(),
                        session,
                        branch: task.branch.clone(),
                    });
                    info!(task_id = %task.id, "agent spawned");
                }
                Err(e) => {
                    // Task stays up_next and retries on a later tick
                    warn!(task_id = %task.id, error = %e, "agent spawn failed");
                    self.emit(EventPayload::AgentSpawnFailed {
                        task_id: task.id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // (c) Completion + (d) failure detection
    // ------------------------------------------------------------------

    async fn detect_completions(&self) -> DomainResult<()> {
        let tasks = self.task_store.list().await?;
        let live_sessions = self.deps.supervisor.list_sessions().await.unwrap_or_default();

        for task in tasks
            .iter()
            .filter(|t| t.status == TaskStatus::InProgress)
        {
            let Some(stored_session) = task.session.clone() else {
                // In progress without a session is unrecoverable state;
                // rewind so the task can be claimed again.
                warn!(task_id = %task.id, "in_progress task has no session; rewinding");
                self.rewind(task).await?;
                continue;
            };

            let live = resolve_session(&stored_session, &task.branch, &live_sessions)
                .map(String::from);

            // Signal 1: completion notice in the coordination store.
            if let Some(notice) = self
                .deps
                .store
                .take_completion(&self.project.id, &task.id)
                .await
            {
                debug!(task_id = %task.id, session = %notice.session_name, "completion notice consumed");
                self.complete(task, live.as_deref().unwrap_or(&stored_session))
                    .await?;
                continue;
            }

            // Signal 2: terminal sentinel in the status file.
            if self.status_files.is_completed(&stored_session).await {
                debug!(task_id = %task.id, "completion sentinel found");
                self.complete(task, live.as_deref().unwrap_or(&stored_session))
                    .await?;
                continue;
            }

            // Signals 3 and 4 need the session to be gone.
            if live.is_some() {
                continue;
            }

            let commits = match self
                .deps
                .inspector
                .commits_ahead(&self.project.path, &task.branch)
                .await
            {
                Ok(commits) => commits,
                Err(e) => {
                    // Transient git failure: leave the task alone and let
                    // the next tick re-examine it.
                    warn!(task_id = %task.id, error = %e, "commit check failed; retrying next tick");
                    continue;
                }
            };

            if commits > 0 {
                // Signal 3: session gone but the branch has work on it.
                debug!(task_id = %task.id, commits, "session gone with commits; completing");
                self.complete(task, &stored_session).await?;
            } else {
                // Failure: session gone, nothing committed. Rewind.
                warn!(
                    task_id = %task.id,
                    "agent died without commits; rewinding to up_next"
                );
                self.rewind(task).await?;
            }
        }

        Ok(())
    }

    async fn complete(&self, task: &Task, session: &str) -> DomainResult<()> {
        if self.deps.supervisor.has_session(session).await.unwrap_or(false) {
            let _ = self.deps.supervisor.kill(session).await;
        }
        self.status_files.remove(session).await;

        self.task_store
            .update(&task.id, TaskPatch::status(TaskStatus::Completed))
            .await?;
        self.emit_status_change(&task.id, TaskStatus::Completed);
        self.emit(EventPayload::TaskCompleted {
            task_id: task.id.clone(),
            branch: task.branch.clone(),
        });
        info!(task_id = %task.id, "task completed");

        if self.config.auto_merge {
            let mut queued = task.clone();
            queued.status = TaskStatus::Completed;
            self.merge_queue.enqueue(queued).await;
        }
        Ok(())
    }

    async fn rewind(&self, task: &Task) -> DomainResult<()> {
        if let Some(session) = &task.session {
            self.status_files.remove(session).await;
        }
        self.task_store
            .update(
                &task.id,
                TaskPatch::status(TaskStatus::UpNext).with_session(None),
            )
            .await?;
        self.emit_status_change(&task.id, TaskStatus::UpNext);
        Ok(())
    }

    // ------------------------------------------------------------------
    // (e) Merge drain
    // ------------------------------------------------------------------

    async fn drain_merges(&self) -> DomainResult<()> {
        if !self.config.auto_merge {
            return Ok(());
        }

        // Catch completed tasks that never made it into the queue (e.g.
        // the orchestrator restarted between completion and drain).
        let tasks = self.task_store.list().await?;
        let queued = self.merge_queue.queued_ids().await;
        for task in tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed && !queued.contains(&t.id))
        {
            self.merge_queue.enqueue(task.clone()).await;
        }

        self.merge_queue.process(&self.task_store).await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Coordination stats fan-out
    // ------------------------------------------------------------------

    async fn publish_coordination_stats(&self) {
        let snapshot = self.deps.store.snapshot(&self.project.id).await;
        self.emit(EventPayload::CoordinationUpdate {
            active_agents: snapshot.active_agents,
            total_todos: snapshot.total_todos,
            completed_todos: snapshot.completed_todos,
        });
        self.emit(EventPayload::FileLocksUpdate {
            locks: snapshot.file_locks,
        });
    }
}

fn up_next_overflow(tasks: &[Task], target: usize) -> usize {
    tasks
        .iter()
        .filter(|t| t.status == TaskStatus::UpNext)
        .count()
        .saturating_sub(target)
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::services::merge_queue::MergeQueueConfig;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        scheduler: ProjectScheduler,
        spawner: Arc<MockSpawner>,
        supervisor: Arc<MockSupervisor>,
        inspector: Arc<MockInspector>,
        store: Arc<CoordinationStore>,
        bus: Arc<EventBus>,
    }

    fn fixture(max_agents: usize, auto_merge: bool) -> Fixture {
        let dir = TempDir::new().unwrap();
        let mut project = Project::new("demo", "Demo", dir.path());
        project.max_agents = max_agents;

        let store = Arc::new(CoordinationStore::new());
        let bus = Arc::new(EventBus::default());
        let supervisor = Arc::new(MockSupervisor::default());
        let spawner = Arc::new(MockSpawner::new(supervisor.clone()));
        let inspector = Arc::new(MockInspector::default());

        let config = OrchestratorConfig {
            max_concurrent_agents: max_agents,
            tick_interval_secs: 1,
            auto_merge,
            status_dir: dir.path().join("status"),
            agent_command: "true".to_string(),
        };

        let merge_queue = MergeQueue::new(
            project.clone(),
            MergeQueueConfig::default(),
            store.clone(),
            bus.clone(),
            inspector.clone(),
        );

        let deps = SchedulerDeps {
            store: store.clone(),
            event_bus: bus.clone(),
            spawner: spawner.clone(),
            supervisor: supervisor.clone(),
            inspector: inspector.clone(),
        };

        Fixture {
            scheduler: ProjectScheduler::new(project, config, merge_queue, deps),
            spawner,
            supervisor,
            inspector,
            store,
            bus,
            _dir: dir,
        }
    }

    async fn add_task(f: &Fixture, title: &str, priority: i64, deps: Vec<String>) -> Task {
        f.scheduler
            .task_store()
            .add(title, None, None, deps, Some(priority))
            .await
            .unwrap()
    }

    async fn statuses(f: &Fixture) -> Vec<(String, TaskStatus)> {
        f.scheduler
            .task_store()
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|t| (t.id, t.status))
            .collect()
    }

    #[tokio::test]
    async fn test_promotion_respects_dependencies() {
        let f = fixture(3, false);
        let t1 = add_task(&f, "first", 1, vec![]).await;
        let _t2 = add_task(&f, "second", 2, vec![t1.id.clone()]).await;

        f.scheduler.tick().await.unwrap();

        let state = statuses(&f).await;
        // t1 spawned straight through up_next -> in_progress; t2 blocked
        assert!(state.contains(&(t1.id.clone(), TaskStatus::InProgress)));
        assert_eq!(state.iter().filter(|(_, s)| *s == TaskStatus::Unclaimed).count(), 1);
    }

    #[tokio::test]
    async fn test_zero_slots_means_no_promotion_or_spawn() {
        let f = fixture(0, false);
        add_task(&f, "t", 1, vec![]).await;

        f.scheduler.tick().await.unwrap();

        let state = statuses(&f).await;
        assert!(state.iter().all(|(_, s)| *s == TaskStatus::Unclaimed));
        assert!(f.spawner.spawned.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_in_progress_never_exceeds_cap() {
        let f = fixture(2, false);
        for i in 0..5 {
            add_task(&f, &format!("t{}", i), 5, vec![]).await;
        }

        f.scheduler.tick().await.unwrap();

        let state = statuses(&f).await;
        let running = state.iter().filter(|(_, s)| *s == TaskStatus::InProgress).count();
        assert_eq!(running, 2);
    }

    #[tokio::test]
    async fn test_conflicting_exclusives_not_spawned_together() {
        let f = fixture(2, false);
        let store = f.scheduler.task_store();
        let t1 = store.add("x", None, None, vec![], Some(1)).await.unwrap();
        let t2 = store.add("y", None, None, vec![], Some(2)).await.unwrap();
        store
            .update(
                &t1.id,
                TaskPatch {
                    exclusive_files: Some(vec!["src/shared.ts".to_string()]),
                    ..TaskPatch::default()
                },
            )
            .await
            .unwrap();
        store
            .update(
                &t2.id,
                TaskPatch {
                    exclusive_files: Some(vec!["src/shared.ts".to_string()]),
                    ..TaskPatch::default()
                },
            )
            .await
            .unwrap();

        f.scheduler.tick().await.unwrap();

        let state = statuses(&f).await;
        let running: Vec<_> = state
            .iter()
            .filter(|(_, s)| *s == TaskStatus::InProgress)
            .collect();
        assert_eq!(running.len(), 1, "only one of the conflicting pair may run");
        assert_eq!(running[0].0, t1.id, "higher priority wins the slot");
    }

    #[tokio::test]
    async fn test_completion_via_notice() {
        let f = fixture(1, false);
        let t1 = add_task(&f, "t", 1, vec![]).await;

        f.scheduler.tick().await.unwrap();

        f.store.mark_task_completed("demo", "1-demo", &t1.id).await;
        f.scheduler.tick().await.unwrap();

        let state = statuses(&f).await;
        assert!(state.contains(&(t1.id.clone(), TaskStatus::Completed)));
        // Notice was consumed
        assert!(f.store.take_completion("demo", &t1.id).await.is_none());
        // Session was killed on reap
        assert!(f.supervisor.live.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_completion_via_session_gone_with_commits() {
        let f = fixture(1, false);
        let t1 = add_task(&f, "t", 1, vec![]).await;

        f.scheduler.tick().await.unwrap();
        // Agent dies after committing work
        f.supervisor.set_live(&[]);
        f.inspector
            .commits
            .lock()
            .unwrap()
            .insert(t1.branch.clone(), 2);

        f.scheduler.tick().await.unwrap();

        let state = statuses(&f).await;
        assert!(state.contains(&(t1.id, TaskStatus::Completed)));
    }

    #[tokio::test]
    async fn test_agent_death_without_commits_rewinds() {
        let f = fixture(1, false);
        let t1 = add_task(&f, "t", 1, vec![]).await;

        f.scheduler.tick().await.unwrap();
        // Session dies with zero commits on the branch
        f.supervisor.set_live(&[]);
        let mut events = f.bus.subscribe();

        f.scheduler.tick().await.unwrap();

        let task = f.scheduler.task_store().get(&t1.id).await.unwrap();
        assert_eq!(task.status, TaskStatus::UpNext);
        assert!(task.session.is_none());

        // Eligible for spawn again on the next tick
        f.scheduler.tick().await.unwrap();
        let task = f.scheduler.task_store().get(&t1.id).await.unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);

        // No task_completed event was emitted
        let mut saw_completed = false;
        while let Ok(event) = events.try_recv() {
            if event.payload.variant_name() == "task_completed" {
                saw_completed = true;
            }
        }
        assert!(!saw_completed);
    }

    #[tokio::test]
    async fn test_spawn_failure_keeps_task_up_next() {
        let f = fixture(1, false);
        let t1 = add_task(&f, "t", 1, vec![]).await;
        f.spawner.fail_for.lock().unwrap().insert(t1.id.clone());

        let mut events = f.bus.subscribe();
        f.scheduler.tick().await.unwrap();

        let task = f.scheduler.task_store().get(&t1.id).await.unwrap();
        assert_eq!(task.status, TaskStatus::UpNext);

        let mut saw_fail = false;
        while let Ok(event) = events.try_recv() {
            if event.payload.variant_name() == "agent_spawn_failed" {
                saw_fail = true;
            }
        }
        assert!(saw_fail);
    }

    #[tokio::test]
    async fn test_cycle_members_never_promoted() {
        let f = fixture(2, false);
        let store = f.scheduler.task_store();
        let t1 = store.add("a", None, None, vec![], Some(1)).await.unwrap();
        let t2 = store
            .add("b", None, None, vec![t1.id.clone()], Some(1))
            .await
            .unwrap();
        store
            .update(
                &t1.id,
                TaskPatch {
                    dependencies: Some(vec![t2.id.clone()]),
                    ..TaskPatch::default()
                },
            )
            .await
            .unwrap();

        f.scheduler.tick().await.unwrap();
        f.scheduler.tick().await.unwrap();

        let state = statuses(&f).await;
        assert!(state.iter().all(|(_, s)| *s == TaskStatus::Unclaimed));
    }

    #[tokio::test]
    async fn test_unknown_dependency_silently_skipped() {
        let f = fixture(1, false);
        let store = f.scheduler.task_store();
        let t1 = store
            .add("a", None, None, vec!["99-demo".to_string()], Some(1))
            .await
            .unwrap();

        f.scheduler.tick().await.unwrap();

        let task = store.get(&t1.id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Unclaimed);
    }

    #[tokio::test]
    async fn test_priority_orders_spawning() {
        let f = fixture(1, false);
        add_task(&f, "low", 9, vec![]).await;
        let high = add_task(&f, "high", 1, vec![]).await;

        f.scheduler.tick().await.unwrap();

        let spawned = f.spawner.spawned.lock().unwrap().clone();
        assert_eq!(spawned, vec![high.id]);
    }

    #[tokio::test]
    async fn test_status_events_follow_lifecycle_order() {
        let f = fixture(1, false);
        let mut events = f.bus.subscribe();
        let t1 = add_task(&f, "t", 1, vec![]).await;

        f.scheduler.tick().await.unwrap();
        f.store.mark_task_completed("demo", "1-demo", &t1.id).await;
        f.scheduler.tick().await.unwrap();

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let EventPayload::TaskStatusChanged { status, .. } = event.payload {
                seen.push(status);
            }
        }
        assert_eq!(
            seen,
            vec![TaskStatus::UpNext, TaskStatus::InProgress, TaskStatus::Completed]
        );
    }
}
