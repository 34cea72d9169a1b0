//! Dependency-ordered merge queue.
//!
//! A single writer integrates completed task branches into trunk. Each
//! drain walks the queue in `(merge_order asc, priority desc)` order,
//! gates on dependencies and live file locks, merges with `--no-ff`, and
//! applies structured conflict resolution before giving up on a task.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, instrument, warn};

use crate::domain::errors::DomainResult;
use crate::domain::models::{EventPayload, Project, Task, TaskStatus};
use crate::domain::ports::RepoInspector;
use crate::infrastructure::git;
use crate::services::coordination::CoordinationStore;
use crate::services::event_bus::EventBus;
use crate::services::resolvers;
use crate::services::task_store::{TaskPatch, TaskStore};
use crate::services::worktree::WorktreeManager;

/// Phrases in a negotiation reply that permit proceeding with the merge.
const AFFIRMATIVE_PHRASES: &[&str] = &["done", "finished", "released", "go ahead"];

/// Merge queue configuration.
#[derive(Debug, Clone)]
pub struct MergeQueueConfig {
    pub main_branch: String,
    /// Upper bound on one lock negotiation exchange.
    pub negotiation_timeout: Duration,
}

impl Default for MergeQueueConfig {
    fn default() -> Self {
        Self {
            main_branch: "main".to_string(),
            negotiation_timeout: Duration::from_secs(10),
        }
    }
}

/// Outcome of attempting one task's merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Merged,
    /// Soft skip; the task stays queued for the next drain.
    Skipped(String),
    /// Merge aborted; trunk untouched, task remains completed.
    Failed(String),
}

/// Serialized merger for one project.
pub struct MergeQueue {
    project: Project,
    config: MergeQueueConfig,
    store: Arc<CoordinationStore>,
    event_bus: Arc<EventBus>,
    inspector: Arc<dyn RepoInspector>,
    queue: RwLock<Vec<Task>>,
    merge_lock: Mutex<()>,
}

impl MergeQueue {
    pub fn new(
        project: Project,
        config: MergeQueueConfig,
        store: Arc<CoordinationStore>,
        event_bus: Arc<EventBus>,
        inspector: Arc<dyn RepoInspector>,
    ) -> Self {
        Self {
            project,
            config,
            store,
            event_bus,
            inspector,
            queue: RwLock::new(Vec::new()),
            merge_lock: Mutex::new(()),
        }
    }

    /// Ids of currently queued tasks.
    pub async fn queued_ids(&self) -> Vec<String> {
        self.queue.read().await.iter().map(|t| t.id.clone()).collect()
    }

    /// Append a completed task and restore queue order.
    pub async fn enqueue(&self, task: Task) {
        let mut queue = self.queue.write().await;
        if queue.iter().any(|t| t.id == task.id) {
            return;
        }
        info!(task_id = %task.id, "task queued for merge");
        self.event_bus.publish(
            Some(self.project.id.clone()),
            EventPayload::TaskQueuedForMerge {
                task_id: task.id.clone(),
                title: task.title.clone(),
            },
        );
        queue.push(task);
        sort_queue(&mut queue);
    }

    /// Drain the queue once against the current task list.
    ///
    /// Returns the ids of tasks merged this drain. Soft skips stay queued;
    /// hard failures are dequeued but their tasks remain `completed`.
    pub async fn process(&self, task_store: &TaskStore) -> DomainResult<Vec<String>> {
        let _guard = self.merge_lock.lock().await;
        let snapshot: Vec<Task> = self.queue.read().await.clone();
        if snapshot.is_empty() {
            return Ok(Vec::new());
        }

        let mut merged = Vec::new();
        let mut all_tasks = task_store.list().await?;

        for task in snapshot {
            match self.try_merge(&task, &all_tasks).await {
                MergeOutcome::Merged => {
                    self.finish_merge(&task, task_store).await?;
                    self.queue.write().await.retain(|t| t.id != task.id);
                    merged.push(task.id.clone());
                    // Later queue entries may depend on this merge
                    all_tasks = task_store.list().await?;
                }
                MergeOutcome::Skipped(reason) => {
                    info!(task_id = %task.id, reason, "merge deferred");
                }
                MergeOutcome::Failed(reason) => {
                    warn!(task_id = %task.id, reason, "merge failed; branch left for manual review");
                    self.event_bus.publish(
                        Some(self.project.id.clone()),
                        EventPayload::MergeFailed {
                            task_id: task.id.clone(),
                            branch: task.branch.clone(),
                            reason,
                        },
                    );
                    self.queue.write().await.retain(|t| t.id != task.id);
                }
            }
        }

        Ok(merged)
    }

    /// Attempt a single task's merge through the three gates.
    #[instrument(skip(self, all_tasks), fields(task_id = %task.id, branch = %task.branch))]
    async fn try_merge(&self, task: &Task, all_tasks: &[Task]) -> MergeOutcome {
        if let Err(e) = git::validate_branch_name(&task.branch) {
            return MergeOutcome::Failed(e.to_string());
        }

        // Dependency gate: merged, not merely completed.
        for dep_id in &task.dependencies {
            let dep = all_tasks.iter().find(|t| &t.id == dep_id);
            match dep {
                Some(dep) if dep.status == TaskStatus::Merged => {}
                Some(dep) => {
                    return MergeOutcome::Skipped(format!(
                        "dependency {} is {}",
                        dep_id,
                        dep.status.as_str()
                    ));
                }
                None => {
                    return MergeOutcome::Skipped(format!("dependency {} unknown", dep_id));
                }
            }
        }

        // Live-lock gate over the branch's changed files.
        match self.check_live_locks(task).await {
            Ok(true) => {}
            Ok(false) => return MergeOutcome::Skipped("file locks held by live agents".into()),
            Err(e) => return MergeOutcome::Skipped(format!("lock check failed: {}", e)),
        }

        self.run_merge(task).await
    }

    /// Check CS locks over the files the branch changed; negotiate with
    /// live holders, bounded by the negotiation timeout.
    async fn check_live_locks(&self, task: &Task) -> DomainResult<bool> {
        let changed = self
            .inspector
            .changed_files(&self.project.path, &task.branch)
            .await?;
        let own_session = task
            .session
            .clone()
            .unwrap_or_else(|| format!("{}-{}", task.task_id, self.project.id));

        for path in changed {
            let Some(lock) = self.store.lock_holder(&self.project.id, &path).await else {
                continue;
            };
            if lock.session_name == own_session {
                continue;
            }
            if !self.store.is_alive(&self.project.id, &lock.session_name).await {
                // Stale holder; the sweeper will reclaim it
                continue;
            }
            if !self.negotiate(&own_session, &lock.session_name, &path).await {
                warn!(
                    path = %path,
                    holder = %lock.session_name,
                    "merge blocked by live file lock"
                );
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Ask the lock holder about its timeline. Affirmative completion
    /// phrases permit proceeding; anything else (or silence) defers.
    async fn negotiate(&self, own_session: &str, holder: &str, path: &str) -> bool {
        let query = format!(
            "I need to merge changes to {}. When will you be done?",
            path
        );
        let query_id = self
            .store
            .send_query(&self.project.id, own_session, holder, &query)
            .await;

        let Some(reply) = self
            .store
            .wait_for_response(
                &self.project.id,
                own_session,
                &query_id,
                self.config.negotiation_timeout,
            )
            .await
        else {
            return false;
        };

        let reply = reply.body.to_lowercase();
        AFFIRMATIVE_PHRASES.iter().any(|phrase| reply.contains(phrase))
    }

    /// Perform the actual merge: checkout trunk, fast-forward from origin,
    /// merge `--no-ff`, resolving conflicts per the whitelist.
    async fn run_merge(&self, task: &Task) -> MergeOutcome {
        let repo = &self.project.path;
        let main = &self.config.main_branch;

        if let Err(e) = git::run_git(repo, &["checkout", main]).await {
            return MergeOutcome::Skipped(format!("cannot check out {}: {}", main, e));
        }
        git::fast_forward_main(repo).await;

        let message = format!("Merge branch '{}'", task.branch);
        let merge = git::run_git(
            repo,
            &["merge", "--no-ff", "-m", &message, "--", &task.branch],
        )
        .await;

        if merge.is_ok() {
            return MergeOutcome::Merged;
        }

        // Conflicts, or an outright failure with nothing to resolve.
        let conflicts = match git::conflicted_files(repo).await {
            Ok(conflicts) if !conflicts.is_empty() => conflicts,
            _ => {
                let _ = git::run_git(repo, &["merge", "--abort"]).await;
                return MergeOutcome::Failed(format!(
                    "merge of {} failed without resolvable conflicts",
                    task.branch
                ));
            }
        };

        info!(
            task_id = %task.id,
            conflicts = conflicts.len(),
            "merge conflicts detected, attempting structured resolution"
        );

        match resolvers::resolve_conflicts(repo, &conflicts).await {
            Ok(report) => {
                if let Err(e) = git::run_git(repo, &["commit", "--no-edit"]).await {
                    let _ = git::run_git(repo, &["merge", "--abort"]).await;
                    return MergeOutcome::Failed(format!("conflict commit failed: {}", e));
                }
                info!(
                    resolved = report.resolved.len(),
                    theirs = report.theirs_preferred.len(),
                    "conflicts auto-resolved"
                );
                MergeOutcome::Merged
            }
            Err(e) => {
                let _ = git::run_git(repo, &["merge", "--abort"]).await;
                MergeOutcome::Failed(e.to_string())
            }
        }
    }

    /// Post-merge bookkeeping: task file, worktree, coordination state.
    async fn finish_merge(&self, task: &Task, task_store: &TaskStore) -> DomainResult<()> {
        task_store
            .update(&task.id, TaskPatch::status(TaskStatus::Merged))
            .await?;

        let worktrees = WorktreeManager::for_project(&self.project);
        if let Err(e) = worktrees.cleanup(task).await {
            warn!(task_id = %task.id, error = %e, "worktree cleanup failed");
        }

        let session = task
            .session
            .clone()
            .unwrap_or_else(|| format!("{}-{}", task.task_id, self.project.id));
        self.store
            .release_session_locks(&self.project.id, &session)
            .await;
        self.store
            .set_agent_status(&self.project.id, &session, "merged")
            .await;

        let snapshot = self.store.snapshot(&self.project.id).await;
        self.event_bus.publish(
            Some(self.project.id.clone()),
            EventPayload::CoordinationUpdate {
                active_agents: snapshot.active_agents,
                total_todos: snapshot.total_todos,
                completed_todos: snapshot.completed_todos,
            },
        );
        self.event_bus.publish(
            Some(self.project.id.clone()),
            EventPayload::TaskMerged {
                task_id: task.id.clone(),
                branch: task.branch.clone(),
            },
        );

        info!(task_id = %task.id, branch = %task.branch, "task merged");
        Ok(())
    }
}

/// Queue order: `merge_order` ascending, ties broken by higher priority
/// value first (priority 1 is the highest urgency and merges later among
/// ties only when its merge_order says so).
fn sort_queue(queue: &mut [Task]) {
    queue.sort_by(|a, b| {
        a.merge_order
            .cmp(&b.merge_order)
            .then(b.priority.cmp(&a.priority))
    });
}
