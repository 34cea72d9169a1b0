//! Task domain model.
//!
//! Tasks are discrete units of agent work, each tied to one git branch.
//! Dependencies between tasks form a DAG that gates both scheduling and
//! merging.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a task in the orchestration pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task is defined but not yet queued for an agent
    Unclaimed,
    /// Task is queued and eligible for the next free agent slot
    UpNext,
    /// An agent session is actively working on the task
    InProgress,
    /// The agent finished; the branch awaits merging
    Completed,
    /// The branch has been merged to trunk
    Merged,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Unclaimed
    }
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unclaimed => "unclaimed",
            Self::UpNext => "up_next",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Merged => "merged",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "unclaimed" => Some(Self::Unclaimed),
            "up_next" => Some(Self::UpNext),
            "in_progress" => Some(Self::InProgress),
            "completed" | "complete" => Some(Self::Completed),
            "merged" => Some(Self::Merged),
            _ => None,
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Merged)
    }

    /// Whether the task is claimable work for the scheduler.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::UpNext | Self::InProgress)
    }

    /// Valid transitions from this status.
    ///
    /// The lifecycle is linear except for the agent-death rollback
    /// `in_progress -> up_next` and queue demotion `up_next -> unclaimed`.
    pub fn valid_transitions(&self) -> &'static [TaskStatus] {
        match self {
            Self::Unclaimed => &[Self::UpNext],
            Self::UpNext => &[Self::InProgress, Self::Unclaimed],
            Self::InProgress => &[Self::Completed, Self::UpNext],
            Self::Completed => &[Self::Merged],
            Self::Merged => &[],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lowest scheduling priority; also the default when none is declared.
pub const DEFAULT_PRIORITY: i64 = 10;

/// A unit of agent work bound to a single branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Stable string id, `<task_id>-<project_id>`
    pub id: String,
    /// Densely assigned per-project integer id
    pub task_id: u64,
    /// Human-readable title
    pub title: String,
    /// Optional longer description
    pub description: Option<String>,
    /// Optional custom agent prompt (the coordination preamble is still
    /// prepended at spawn time)
    pub prompt: Option<String>,
    /// Current status
    pub status: TaskStatus,
    /// The only branch the task's agent may commit to
    pub branch: String,
    /// Supervised session name while an agent is running
    pub session: Option<String>,
    /// Task ids that must be completed/merged before this task is promoted
    pub dependencies: Vec<String>,
    /// 1 is highest, 10 is lowest
    pub priority: i64,
    /// Merge-queue tiebreaker; higher merges later
    pub merge_order: i64,
    /// Path patterns only this task may modify
    pub exclusive_files: Vec<String>,
    /// Path patterns this task may touch under coordination
    pub shared_files: Vec<String>,
    /// Tasks whose branch is the preferred worktree base
    pub initialization_deps: Vec<String>,
    /// Commands run in the worktree after creation
    pub setup_commands: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub merged_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a new task with a freshly assigned per-project integer id.
    ///
    /// The branch is derived as `task-<task_id>` and the string id as
    /// `<task_id>-<project_id>`.
    pub fn new(task_id: u64, project_id: &str, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: format!("{}-{}", task_id, project_id),
            task_id,
            title: title.into(),
            description: None,
            prompt: None,
            status: TaskStatus::default(),
            branch: format!("task-{}", task_id),
            session: None,
            dependencies: Vec::new(),
            priority: DEFAULT_PRIORITY,
            merge_order: 0,
            exclusive_files: Vec::new(),
            shared_files: Vec::new(),
            initialization_deps: Vec::new(),
            setup_commands: Vec::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
            merged_at: None,
        }
    }

    /// Set description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set custom prompt.
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// Set dependencies.
    pub fn with_dependencies(mut self, deps: Vec<String>) -> Self {
        self.dependencies = deps;
        self
    }

    /// Set priority (1 highest, 10 lowest).
    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    /// Set merge order.
    pub fn with_merge_order(mut self, merge_order: i64) -> Self {
        self.merge_order = merge_order;
        self
    }

    /// Set exclusive file patterns.
    pub fn with_exclusive_files(mut self, files: Vec<String>) -> Self {
        self.exclusive_files = files;
        self
    }

    /// Set shared file patterns.
    pub fn with_shared_files(mut self, files: Vec<String>) -> Self {
        self.shared_files = files;
        self
    }

    /// Check if the task may move to the given status.
    pub fn can_transition_to(&self, new_status: TaskStatus) -> bool {
        self.status.can_transition_to(new_status)
    }

    /// Transition to a new status, updating timestamps.
    pub fn transition_to(&mut self, new_status: TaskStatus) -> Result<(), String> {
        if !self.can_transition_to(new_status) {
            return Err(format!(
                "Cannot transition from {} to {}",
                self.status.as_str(),
                new_status.as_str()
            ));
        }

        self.status = new_status;
        self.updated_at = Utc::now();

        match new_status {
            TaskStatus::Completed => self.completed_at = Some(Utc::now()),
            TaskStatus::Merged => self.merged_at = Some(Utc::now()),
            // Rollback clears the dead session
            TaskStatus::UpNext => self.session = None,
            _ => {}
        }

        Ok(())
    }

    /// Two tasks conflict when their exclusive patterns intersect, or when
    /// either side's exclusive patterns intersect the other's shared ones.
    pub fn conflicts_with(&self, other: &Task) -> bool {
        let intersects = |a: &[String], b: &[String]| a.iter().any(|p| b.contains(p));

        intersects(&self.exclusive_files, &other.exclusive_files)
            || intersects(&self.exclusive_files, &other.shared_files)
            || intersects(&other.exclusive_files, &self.shared_files)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("Task title cannot be empty".to_string());
        }
        if self.branch.trim().is_empty() {
            return Err("Task branch cannot be empty".to_string());
        }
        if self.dependencies.contains(&self.id) {
            return Err("Task cannot depend on itself".to_string());
        }
        Ok(())
    }
}

/// Replace characters that would break branch names, file paths, or URLs.
///
/// Slashes and backslashes become dashes; ampersands become `and`.
pub fn sanitize_identifier(raw: &str) -> String {
    raw.replace(['/', '\\'], "-").replace('&', "and")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_creation_derives_ids() {
        let task = Task::new(7, "demo", "Build the header");
        assert_eq!(task.id, "7-demo");
        assert_eq!(task.task_id, 7);
        assert_eq!(task.branch, "task-7");
        assert_eq!(task.status, TaskStatus::Unclaimed);
        assert_eq!(task.priority, DEFAULT_PRIORITY);
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            TaskStatus::Unclaimed,
            TaskStatus::UpNext,
            TaskStatus::InProgress,
            TaskStatus::Completed,
            TaskStatus::Merged,
        ] {
            assert_eq!(TaskStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(TaskStatus::from_str("bogus"), None);
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut task = Task::new(1, "p", "t");

        task.transition_to(TaskStatus::UpNext).unwrap();
        task.transition_to(TaskStatus::InProgress).unwrap();
        task.session = Some("1-p".to_string());
        task.transition_to(TaskStatus::Completed).unwrap();
        assert!(task.completed_at.is_some());
        task.transition_to(TaskStatus::Merged).unwrap();
        assert!(task.merged_at.is_some());
        assert!(task.status.is_terminal());
    }

    #[test]
    fn test_rollback_clears_session() {
        let mut task = Task::new(1, "p", "t");
        task.transition_to(TaskStatus::UpNext).unwrap();
        task.transition_to(TaskStatus::InProgress).unwrap();
        task.session = Some("1-p".to_string());

        task.transition_to(TaskStatus::UpNext).unwrap();
        assert!(task.session.is_none());
    }

    #[test]
    fn test_invalid_transitions_rejected() {
        let mut task = Task::new(1, "p", "t");
        assert!(task.transition_to(TaskStatus::InProgress).is_err());
        assert!(task.transition_to(TaskStatus::Completed).is_err());
        assert!(task.transition_to(TaskStatus::Merged).is_err());

        task.transition_to(TaskStatus::UpNext).unwrap();
        assert!(task.transition_to(TaskStatus::Completed).is_err());

        task.transition_to(TaskStatus::InProgress).unwrap();
        task.transition_to(TaskStatus::Completed).unwrap();
        assert!(task.transition_to(TaskStatus::UpNext).is_err());
        task.transition_to(TaskStatus::Merged).unwrap();
        assert!(task.transition_to(TaskStatus::UpNext).is_err());
    }

    #[test]
    fn test_transition_error_message_content() {
        let mut task = Task::new(1, "p", "t");
        let err = task.transition_to(TaskStatus::Merged).unwrap_err();
        assert!(err.contains("unclaimed"), "source status missing: {}", err);
        assert!(err.contains("merged"), "target status missing: {}", err);
    }

    #[test]
    fn test_exclusive_conflict() {
        let a = Task::new(1, "p", "a")
            .with_exclusive_files(vec!["src/shared.ts".to_string()]);
        let b = Task::new(2, "p", "b")
            .with_exclusive_files(vec!["src/shared.ts".to_string()]);
        assert!(a.conflicts_with(&b));
        assert!(b.conflicts_with(&a));
    }

    #[test]
    fn test_exclusive_vs_shared_conflict() {
        let a = Task::new(1, "p", "a")
            .with_exclusive_files(vec!["index.html".to_string()]);
        let b = Task::new(2, "p", "b")
            .with_shared_files(vec!["index.html".to_string()]);
        assert!(a.conflicts_with(&b));
        assert!(b.conflicts_with(&a));
    }

    #[test]
    fn test_disjoint_tasks_do_not_conflict() {
        let a = Task::new(1, "p", "a")
            .with_exclusive_files(vec!["src/a.ts".to_string()]);
        let b = Task::new(2, "p", "b")
            .with_exclusive_files(vec!["src/b.ts".to_string()]);
        assert!(!a.conflicts_with(&b));
    }

    #[test]
    fn test_sanitize_identifier() {
        assert_eq!(sanitize_identifier("auth/login"), "auth-login");
        assert_eq!(sanitize_identifier("a\\b"), "a-b");
        assert_eq!(sanitize_identifier("cats&dogs"), "catsanddogs");
        // Round-trip stable: sanitizing twice changes nothing
        let once = sanitize_identifier("ui/theme&dark");
        assert_eq!(sanitize_identifier(&once), once);
    }

    #[test]
    fn test_validation() {
        let task = Task::new(1, "p", "  ");
        assert!(task.validate().is_err());

        let mut task = Task::new(1, "p", "ok");
        task.dependencies = vec!["1-p".to_string()];
        assert!(task.validate().is_err());

        let task = Task::new(1, "p", "ok");
        assert!(task.validate().is_ok());
    }
}
