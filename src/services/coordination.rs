//! In-process coordination store.
//!
//! Project-scoped shared state mutated by agents through the RPC surface
//! and read by the scheduler. The logical keyspace is
//! `project:<id>:<aspect>:<subkey>`; all mutations take the single store
//! lock, which makes every per-key operation linearizable and cross-key
//! bundles (unregister, sweep) atomic.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AgentRecord, CompletionNotice, CoordinationSnapshot, FileLock, FileOperation, InterfaceDef,
    Message, Todo, TodoStatus, LIVENESS_WINDOW_SECS,
};

/// Build the composite key for a store entry; used in diagnostics.
pub fn composite_key(project_id: &str, aspect: &str, subkey: &str) -> String {
    format!("project:{}:{}:{}", project_id, aspect, subkey)
}

#[derive(Debug, Default)]
struct ProjectSpace {
    agents: HashMap<String, AgentRecord>,
    heartbeats: HashMap<String, DateTime<Utc>>,
    todos: HashMap<String, Vec<Todo>>,
    locks: HashMap<String, FileLock>,
    interfaces: HashMap<String, InterfaceDef>,
    inboxes: HashMap<String, VecDeque<Message>>,
    /// query id -> asking session, for routing responses
    pending_queries: HashMap<String, String>,
    completions: HashMap<String, CompletionNotice>,
    stale: HashSet<String>,
}

/// The shared coordination store. One instance serves every project.
#[derive(Default)]
pub struct CoordinationStore {
    inner: RwLock<HashMap<String, ProjectSpace>>,
}

impl CoordinationStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Agent registry & liveness
    // ------------------------------------------------------------------

    /// Register an agent under `(project, session)`.
    ///
    /// Re-registration by the same session for the same task overwrites
    /// the record (a reaped session that reappears is the same agent); a
    /// session name already bound to a different task is rejected.
    pub async fn register_agent(
        &self,
        project_id: &str,
        session: &str,
        task_id: &str,
        branch: &str,
        description: &str,
    ) -> DomainResult<()> {
        let mut inner = self.inner.write().await;
        let space = inner.entry(project_id.to_string()).or_default();

        if let Some(existing) = space.agents.get(session) {
            if existing.task_id != task_id {
                return Err(DomainError::ValidationFailed(format!(
                    "session {} already registered for task {}",
                    session, existing.task_id
                )));
            }
        }

        space.agents.insert(
            session.to_string(),
            AgentRecord {
                session_name: session.to_string(),
                task_id: task_id.to_string(),
                branch: branch.to_string(),
                description: description.to_string(),
                status: "active".to_string(),
                started_at: Utc::now(),
            },
        );
        space.heartbeats.insert(session.to_string(), Utc::now());
        space.stale.remove(session);
        debug!(key = %composite_key(project_id, "agents", session), "agent registered");
        Ok(())
    }

    /// Remove the agent and everything it owns: record, heartbeat, todos,
    /// inbox, and all of its file locks. Atomic under the store lock.
    pub async fn unregister_agent(&self, project_id: &str, session: &str) -> DomainResult<()> {
        let mut inner = self.inner.write().await;
        let Some(space) = inner.get_mut(project_id) else {
            return Ok(());
        };
        space.agents.remove(session);
        space.heartbeats.remove(session);
        space.todos.remove(session);
        space.inboxes.remove(session);
        space.stale.remove(session);
        space.locks.retain(|_, lock| lock.session_name != session);
        space.pending_queries.retain(|_, asker| asker != session);
        debug!(key = %composite_key(project_id, "agents", session), "agent unregistered");
        Ok(())
    }

    /// Record a heartbeat and renew the TTL on the session's locks.
    ///
    /// Heartbeats from unknown sessions are accepted: the agent may
    /// heartbeat before its registration has landed.
    pub async fn heartbeat(&self, project_id: &str, session: &str) {
        let now = Utc::now();
        let mut inner = self.inner.write().await;
        let space = inner.entry(project_id.to_string()).or_default();
        space.heartbeats.insert(session.to_string(), now);
        space.stale.remove(session);
        for lock in space.locks.values_mut() {
            if lock.session_name == session {
                lock.renew(now);
            }
        }
    }

    /// Sessions whose last heartbeat is within the liveness window.
    pub async fn list_active_agents(&self, project_id: &str) -> Vec<AgentRecord> {
        let now = Utc::now();
        let inner = self.inner.read().await;
        let Some(space) = inner.get(project_id) else {
            return Vec::new();
        };
        space
            .agents
            .values()
            .filter(|agent| {
                space
                    .heartbeats
                    .get(&agent.session_name)
                    .is_some_and(|hb| now - *hb < ChronoDuration::seconds(LIVENESS_WINDOW_SECS))
            })
            .cloned()
            .collect()
    }

    /// Whether a session is currently alive by heartbeat.
    pub async fn is_alive(&self, project_id: &str, session: &str) -> bool {
        let now = Utc::now();
        let inner = self.inner.read().await;
        inner
            .get(project_id)
            .and_then(|space| space.heartbeats.get(session))
            .is_some_and(|hb| now - *hb < ChronoDuration::seconds(LIVENESS_WINDOW_SECS))
    }

    /// Update an agent's coarse status field (e.g. `merged`).
    pub async fn set_agent_status(&self, project_id: &str, session: &str, status: &str) {
        let mut inner = self.inner.write().await;
        if let Some(agent) = inner
            .get_mut(project_id)
            .and_then(|space| space.agents.get_mut(session))
        {
            agent.status = status.to_string();
        }
    }

    // ------------------------------------------------------------------
    // Todos
    // ------------------------------------------------------------------

    pub async fn add_todo(
        &self,
        project_id: &str,
        session: &str,
        text: &str,
        priority: i64,
    ) -> Todo {
        let todo = Todo::new(text, priority);
        let mut inner = self.inner.write().await;
        inner
            .entry(project_id.to_string())
            .or_default()
            .todos
            .entry(session.to_string())
            .or_default()
            .push(todo.clone());
        todo
    }

    pub async fn update_todo(
        &self,
        project_id: &str,
        session: &str,
        todo_id: &str,
        status: TodoStatus,
    ) -> DomainResult<Todo> {
        let mut inner = self.inner.write().await;
        let todo = inner
            .get_mut(project_id)
            .and_then(|space| space.todos.get_mut(session))
            .and_then(|todos| todos.iter_mut().find(|t| t.id == todo_id))
            .ok_or_else(|| DomainError::ValidationFailed(format!("todo {} not found", todo_id)))?;
        todo.status = status;
        Ok(todo.clone())
    }

    pub async fn get_todos(&self, project_id: &str, session: &str) -> Vec<Todo> {
        let inner = self.inner.read().await;
        inner
            .get(project_id)
            .and_then(|space| space.todos.get(session))
            .cloned()
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // File locks
    // ------------------------------------------------------------------

    /// Acquire (or renew, for the holder) an exclusive lock on a path.
    ///
    /// Returns the current holder when the path is locked by another live
    /// session whose lock has not expired.
    pub async fn announce_file_change(
        &self,
        project_id: &str,
        session: &str,
        file_path: &str,
        operation: FileOperation,
        description: Option<String>,
    ) -> DomainResult<FileLock> {
        let now = Utc::now();
        let mut inner = self.inner.write().await;
        let space = inner.entry(project_id.to_string()).or_default();

        if let Some(existing) = space.locks.get(file_path) {
            if existing.session_name != session && !existing.is_expired(now) {
                return Err(DomainError::LockHeld {
                    path: file_path.to_string(),
                    holder: existing.session_name.clone(),
                });
            }
        }

        let lock = FileLock::new(file_path, session, operation, description);
        space.locks.insert(file_path.to_string(), lock.clone());
        debug!(key = %composite_key(project_id, "locks", file_path), holder = session, "file lock acquired");
        Ok(lock)
    }

    /// Release a lock; a holder mismatch is a no-op.
    pub async fn release_file_lock(&self, project_id: &str, session: &str, file_path: &str) {
        let mut inner = self.inner.write().await;
        if let Some(space) = inner.get_mut(project_id) {
            if space
                .locks
                .get(file_path)
                .is_some_and(|lock| lock.session_name == session)
            {
                space.locks.remove(file_path);
                debug!(key = %composite_key(project_id, "locks", file_path), "file lock released");
            }
        }
    }

    /// Release every lock held by a session (merge cleanup).
    pub async fn release_session_locks(&self, project_id: &str, session: &str) {
        let mut inner = self.inner.write().await;
        if let Some(space) = inner.get_mut(project_id) {
            space.locks.retain(|_, lock| lock.session_name != session);
        }
    }

    /// Current unexpired lock on a path, if any.
    pub async fn lock_holder(&self, project_id: &str, file_path: &str) -> Option<FileLock> {
        let now = Utc::now();
        let inner = self.inner.read().await;
        inner
            .get(project_id)
            .and_then(|space| space.locks.get(file_path))
            .filter(|lock| !lock.is_expired(now))
            .cloned()
    }

    /// All unexpired locks for a project.
    pub async fn list_locks(&self, project_id: &str) -> Vec<FileLock> {
        let now = Utc::now();
        let inner = self.inner.read().await;
        inner
            .get(project_id)
            .map(|space| {
                space
                    .locks
                    .values()
                    .filter(|lock| !lock.is_expired(now))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Shared interfaces
    // ------------------------------------------------------------------

    /// Register a shared interface definition.
    ///
    /// The author session may re-register (idempotent) or redefine; any
    /// other session is rejected and handed the existing definition.
    pub async fn register_interface(
        &self,
        project_id: &str,
        session: &str,
        name: &str,
        definition: &str,
    ) -> Result<InterfaceDef, InterfaceDef> {
        let mut inner = self.inner.write().await;
        let space = inner.entry(project_id.to_string()).or_default();

        if let Some(existing) = space.interfaces.get(name) {
            if existing.registered_by != session {
                return Err(existing.clone());
            }
        }

        let def = InterfaceDef {
            name: name.to_string(),
            definition: definition.to_string(),
            registered_by: session.to_string(),
            registered_at: Utc::now(),
        };
        space.interfaces.insert(name.to_string(), def.clone());
        Ok(def)
    }

    pub async fn query_interface(&self, project_id: &str, name: &str) -> Option<InterfaceDef> {
        let inner = self.inner.read().await;
        inner
            .get(project_id)
            .and_then(|space| space.interfaces.get(name))
            .cloned()
    }

    pub async fn list_interfaces(&self, project_id: &str) -> Vec<InterfaceDef> {
        let inner = self.inner.read().await;
        inner
            .get(project_id)
            .map(|space| space.interfaces.values().cloned().collect())
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Messaging
    // ------------------------------------------------------------------

    /// Enqueue a query in the target session's inbox. Returns the message
    /// id used to correlate the eventual response.
    pub async fn send_query(
        &self,
        project_id: &str,
        from_session: &str,
        target_session: &str,
        query: &str,
    ) -> String {
        let message = Message::query(from_session, query);
        let id = message.id.clone();
        let mut inner = self.inner.write().await;
        let space = inner.entry(project_id.to_string()).or_default();
        space
            .pending_queries
            .insert(id.clone(), from_session.to_string());
        space
            .inboxes
            .entry(target_session.to_string())
            .or_default()
            .push_back(message);
        id
    }

    /// Route a response back to whichever session asked the query.
    pub async fn respond_to_query(
        &self,
        project_id: &str,
        session: &str,
        query_id: &str,
        response: &str,
    ) -> DomainResult<()> {
        let mut inner = self.inner.write().await;
        let space = inner
            .get_mut(project_id)
            .ok_or_else(|| DomainError::ProjectNotFound(project_id.to_string()))?;
        let asker = space.pending_queries.remove(query_id).ok_or_else(|| {
            DomainError::ValidationFailed(format!("query {} not found", query_id))
        })?;
        space
            .inboxes
            .entry(asker)
            .or_default()
            .push_back(Message::response(session, response, query_id));
        Ok(())
    }

    /// Enqueue a broadcast into every registered session's inbox except
    /// the sender's.
    pub async fn broadcast(&self, project_id: &str, from_session: &str, body: &str) -> usize {
        let mut inner = self.inner.write().await;
        let Some(space) = inner.get_mut(project_id) else {
            return 0;
        };
        let recipients: Vec<String> = space
            .agents
            .keys()
            .filter(|s| s.as_str() != from_session)
            .cloned()
            .collect();
        for recipient in &recipients {
            space
                .inboxes
                .entry(recipient.clone())
                .or_default()
                .push_back(Message::broadcast(from_session, body));
        }
        recipients.len()
    }

    /// Drain the session's inbox in FIFO order.
    pub async fn check_messages(&self, project_id: &str, session: &str) -> Vec<Message> {
        let mut inner = self.inner.write().await;
        inner
            .get_mut(project_id)
            .and_then(|space| space.inboxes.get_mut(session))
            .map(|inbox| inbox.drain(..).collect())
            .unwrap_or_default()
    }

    /// Wait for a response to `query_id` to arrive in the asker's inbox.
    ///
    /// Polls with a short interval up to `timeout`; only the matching
    /// response is removed, other messages stay queued. Returns `None` on
    /// timeout.
    pub async fn wait_for_response(
        &self,
        project_id: &str,
        asker_session: &str,
        query_id: &str,
        timeout: Duration,
    ) -> Option<Message> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            {
                let mut inner = self.inner.write().await;
                if let Some(inbox) = inner
                    .get_mut(project_id)
                    .and_then(|space| space.inboxes.get_mut(asker_session))
                {
                    if let Some(pos) = inbox
                        .iter()
                        .position(|m| m.in_reply_to.as_deref() == Some(query_id))
                    {
                        return inbox.remove(pos);
                    }
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }

    // ------------------------------------------------------------------
    // Completion notices
    // ------------------------------------------------------------------

    /// Record a completion notice for the scheduler to consume.
    pub async fn mark_task_completed(&self, project_id: &str, session: &str, task_id: &str) {
        let mut inner = self.inner.write().await;
        inner
            .entry(project_id.to_string())
            .or_default()
            .completions
            .insert(
                task_id.to_string(),
                CompletionNotice {
                    task_id: task_id.to_string(),
                    session_name: session.to_string(),
                    completed_at: Utc::now(),
                },
            );
        info!(key = %composite_key(project_id, "completed_tasks", task_id), "completion notice recorded");
    }

    /// Consume (remove and return) a completion notice.
    pub async fn take_completion(
        &self,
        project_id: &str,
        task_id: &str,
    ) -> Option<CompletionNotice> {
        let mut inner = self.inner.write().await;
        inner
            .get_mut(project_id)
            .and_then(|space| space.completions.remove(task_id))
    }

    // ------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------

    /// Live snapshot used for `coordination_update` events.
    pub async fn snapshot(&self, project_id: &str) -> CoordinationSnapshot {
        let now = Utc::now();
        let inner = self.inner.read().await;
        let Some(space) = inner.get(project_id) else {
            return CoordinationSnapshot::default();
        };
        let active = space
            .heartbeats
            .values()
            .filter(|hb| now - **hb < ChronoDuration::seconds(LIVENESS_WINDOW_SECS))
            .count();
        let (total_todos, completed_todos) = space.todos.values().flatten().fold(
            (0usize, 0usize),
            |(total, done), todo| {
                (
                    total + 1,
                    done + usize::from(todo.status == TodoStatus::Completed),
                )
            },
        );
        CoordinationSnapshot {
            active_agents: active,
            total_agents: space.agents.len(),
            total_todos,
            completed_todos,
            file_locks: space
                .locks
                .values()
                .filter(|lock| !lock.is_expired(now))
                .cloned()
                .collect(),
        }
    }

    /// Drop an entire project namespace.
    pub async fn clear_project(&self, project_id: &str) {
        let mut inner = self.inner.write().await;
        inner.remove(project_id);
        info!(project_id, "coordination namespace cleared");
    }

    /// One liveness pass: sessions past the heartbeat window are marked
    /// stale and their locks released. Todos and messages are retained
    /// until `unregister_agent`.
    pub async fn sweep(&self) -> usize {
        let now = Utc::now();
        let window = ChronoDuration::seconds(LIVENESS_WINDOW_SECS);
        let mut newly_stale = 0;
        let mut inner = self.inner.write().await;

        for (project_id, space) in inner.iter_mut() {
            let stale_sessions: Vec<String> = space
                .heartbeats
                .iter()
                .filter(|(session, hb)| {
                    now - **hb >= window && !space.stale.contains(*session)
                })
                .map(|(session, _)| session.clone())
                .collect();

            for session in stale_sessions {
                warn!(project_id, session, "session went stale; releasing its locks");
                space.locks.retain(|_, lock| lock.session_name != session);
                space.stale.insert(session);
                newly_stale += 1;
            }
        }
        newly_stale
    }

    /// Spawn the background liveness sweeper.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                store.sweep().await;
            }
        })
    }
}
