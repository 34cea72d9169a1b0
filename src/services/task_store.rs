//! File-backed task store.
//!
//! The canonical task list lives in a line-oriented, human-editable
//! `tasks.md` per project. Every read re-parses the file; every write
//! re-sorts by `(priority asc, task_id asc)` and atomically re-serializes
//! via write-then-rename.

use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, instrument};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{sanitize_identifier, Project, Task, TaskStatus, DEFAULT_PRIORITY};

const FILE_HEADER: &str = "# tasks.md";

/// Field updates applied by [`TaskStore::update`]. `None` leaves the field
/// untouched; `session` uses a nested option so it can be cleared.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub prompt: Option<String>,
    pub status: Option<TaskStatus>,
    pub session: Option<Option<String>>,
    pub dependencies: Option<Vec<String>>,
    pub priority: Option<i64>,
    pub merge_order: Option<i64>,
    pub exclusive_files: Option<Vec<String>>,
    pub shared_files: Option<Vec<String>>,
    pub initialization_deps: Option<Vec<String>>,
    pub setup_commands: Option<Vec<String>>,
}

impl TaskPatch {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_session(mut self, session: Option<String>) -> Self {
        self.session = Some(session);
        self
    }
}

/// Store for one project's task list.
pub struct TaskStore {
    project_id: String,
    tasks_file: PathBuf,
}

impl TaskStore {
    pub fn for_project(project: &Project) -> Self {
        Self {
            project_id: project.id.clone(),
            tasks_file: project.tasks_file(),
        }
    }

    pub fn new(project_id: impl Into<String>, tasks_file: impl Into<PathBuf>) -> Self {
        Self {
            project_id: project_id.into(),
            tasks_file: tasks_file.into(),
        }
    }

    /// All tasks, sorted `(priority asc, task_id asc)`.
    pub async fn list(&self) -> DomainResult<Vec<Task>> {
        if !self.tasks_file.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.tasks_file).await?;
        let mut tasks = parse_tasks(&content, &self.project_id)?;
        sort_tasks(&mut tasks);
        Ok(tasks)
    }

    /// Fetch one task by string id.
    pub async fn get(&self, id: &str) -> DomainResult<Task> {
        self.list()
            .await?
            .into_iter()
            .find(|t| t.id == id)
            .ok_or_else(|| DomainError::TaskNotFound(id.to_string()))
    }

    /// Append a new task with the next dense `task_id` and persist.
    #[instrument(skip(self, description, prompt), fields(project_id = %self.project_id))]
    pub async fn add(
        &self,
        title: &str,
        description: Option<String>,
        prompt: Option<String>,
        dependencies: Vec<String>,
        priority: Option<i64>,
    ) -> DomainResult<Task> {
        let mut tasks = self.list().await?;
        let next_id = tasks.iter().map(|t| t.task_id).max().unwrap_or(0) + 1;

        let title = sanitize_field(title);
        let mut task = Task::new(next_id, &self.project_id, title);
        task.description = description.map(|d| sanitize_field(&d));
        task.prompt = prompt;
        task.dependencies = dependencies;
        task.priority = priority.unwrap_or(DEFAULT_PRIORITY);
        task.validate().map_err(DomainError::ValidationFailed)?;

        tasks.push(task.clone());
        self.save(tasks).await?;
        debug!(task_id = task.task_id, "task added");
        Ok(task)
    }

    /// Apply a patch to a task, refresh `updated_at`, persist.
    pub async fn update(&self, id: &str, patch: TaskPatch) -> DomainResult<Task> {
        let mut tasks = self.list().await?;
        let task = tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| DomainError::TaskNotFound(id.to_string()))?;

        if let Some(title) = patch.title {
            task.title = sanitize_field(&title);
        }
        if let Some(description) = patch.description {
            task.description = Some(sanitize_field(&description));
        }
        if let Some(prompt) = patch.prompt {
            task.prompt = Some(prompt);
        }
        if let Some(status) = patch.status {
            if task.status != status {
                task.transition_to(status).map_err(|_| {
                    DomainError::InvalidStateTransition {
                        from: task.status.as_str().to_string(),
                        to: status.as_str().to_string(),
                    }
                })?;
            }
        }
        if let Some(session) = patch.session {
            task.session = session;
        }
        if let Some(deps) = patch.dependencies {
            task.dependencies = deps;
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(merge_order) = patch.merge_order {
            task.merge_order = merge_order;
        }
        if let Some(files) = patch.exclusive_files {
            task.exclusive_files = files;
        }
        if let Some(files) = patch.shared_files {
            task.shared_files = files;
        }
        if let Some(deps) = patch.initialization_deps {
            task.initialization_deps = deps;
        }
        if let Some(cmds) = patch.setup_commands {
            task.setup_commands = cmds;
        }
        task.updated_at = chrono::Utc::now();

        let updated = task.clone();
        self.save(tasks).await?;
        Ok(updated)
    }

    /// Remove a task and persist.
    pub async fn delete(&self, id: &str) -> DomainResult<()> {
        let mut tasks = self.list().await?;
        let before = tasks.len();
        tasks.retain(|t| t.id != id);
        if tasks.len() == before {
            return Err(DomainError::TaskNotFound(id.to_string()));
        }
        self.save(tasks).await
    }

    /// Persist the full list: sort, serialize, write-then-rename.
    pub async fn save(&self, mut tasks: Vec<Task>) -> DomainResult<()> {
        sort_tasks(&mut tasks);
        let content = serialize_tasks(&tasks);

        if let Some(parent) = self.tasks_file.parent() {
            fs::create_dir_all(parent).await?;
        }
        let tmp = self.tasks_file.with_extension("md.tmp");
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, &self.tasks_file).await?;
        Ok(())
    }
}

fn sort_tasks(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.task_id.cmp(&b.task_id)));
}

/// Values are single-line; separators unsafe for branches and URLs are
/// replaced before anything lands on disk.
fn sanitize_field(raw: &str) -> String {
    sanitize_identifier(raw.replace('\n', " ").trim())
}

fn parse_list(value: &str) -> Vec<String> {
    let inner = value.trim().trim_start_matches('[').trim_end_matches(']');
    inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn format_list(items: &[String]) -> String {
    format!("[{}]", items.join(", "))
}

/// Parse a `tasks.md` document into tasks.
///
/// Unknown keys are ignored and malformed numeric values fall back to
/// defaults, so a hand-edited file degrades instead of failing. Tasks
/// missing a `task_id` get the next dense id; tasks missing a branch get
/// the derived `task-<task_id>`.
pub fn parse_tasks(content: &str, project_id: &str) -> DomainResult<Vec<Task>> {
    struct RawTask {
        title: String,
        fields: Vec<(String, String)>,
    }

    let mut raw_tasks: Vec<RawTask> = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if let Some(title) = line.strip_prefix("## Task:") {
            raw_tasks.push(RawTask {
                title: title.trim().to_string(),
                fields: Vec::new(),
            });
        } else if let Some(body) = line.strip_prefix("- ") {
            if let Some(current) = raw_tasks.last_mut() {
                if let Some((key, value)) = body.split_once(':') {
                    current
                        .fields
                        .push((key.trim().to_string(), value.trim().to_string()));
                }
            }
        }
    }

    let mut max_task_id: u64 = raw_tasks
        .iter()
        .flat_map(|r| r.fields.iter())
        .filter(|(k, _)| k == "task_id")
        .filter_map(|(_, v)| v.parse::<u64>().ok())
        .max()
        .unwrap_or(0);

    let mut tasks = Vec::with_capacity(raw_tasks.len());
    for raw in raw_tasks {
        let mut explicit_id = None;
        for (key, value) in &raw.fields {
            if key == "task_id" {
                explicit_id = value.parse::<u64>().ok();
            }
        }
        let task_id = explicit_id.unwrap_or_else(|| {
            max_task_id += 1;
            max_task_id
        });

        let mut task = Task::new(task_id, project_id, sanitize_field(&raw.title));
        for (key, value) in raw.fields {
            match key.as_str() {
                "task_id" => {}
                "status" => {
                    task.status = TaskStatus::from_str(&value).unwrap_or(TaskStatus::Unclaimed);
                }
                "branch" => {
                    if value != "null" && !value.is_empty() {
                        task.branch = sanitize_identifier(&value);
                    }
                }
                "session" => {
                    if value != "null" && !value.is_empty() {
                        task.session = Some(value);
                    }
                }
                "description" => task.description = Some(value),
                "prompt" => task.prompt = Some(value),
                "dependencies" => task.dependencies = parse_list(&value),
                "priority" => task.priority = value.parse().unwrap_or(DEFAULT_PRIORITY),
                "merge_order" => task.merge_order = value.parse().unwrap_or(0),
                "exclusive_files" => task.exclusive_files = parse_list(&value),
                "shared_files" => task.shared_files = parse_list(&value),
                "initialization_deps" => task.initialization_deps = parse_list(&value),
                "setup_commands" => task.setup_commands = parse_list(&value),
                _ => {}
            }
        }
        tasks.push(task);
    }

    // A task in progress must carry its session; the reverse is cleaned up
    // lazily by the scheduler, so only flag the hard inconsistency here.
    for task in &tasks {
        if task.task_id == 0 {
            return Err(DomainError::CorruptTaskFile(format!(
                "task '{}' has task_id 0",
                task.title
            )));
        }
    }

    Ok(tasks)
}

/// Serialize tasks into the canonical `tasks.md` document.
pub fn serialize_tasks(tasks: &[Task]) -> String {
    let mut out = vec![FILE_HEADER.to_string()];

    for task in tasks {
        out.push(String::new());
        out.push(format!("## Task: {}", task.title));
        out.push(format!("- task_id: {}", task.task_id));
        out.push(format!("- status: {}", task.status.as_str()));
        out.push(format!("- branch: {}", task.branch));
        out.push(format!(
            "- session: {}",
            task.session.as_deref().unwrap_or("null")
        ));
        if let Some(ref description) = task.description {
            out.push(format!("- description: {}", description));
        }
        if let Some(ref prompt) = task.prompt {
            out.push(format!("- prompt: {}", prompt));
        }
        if !task.dependencies.is_empty() {
            out.push(format!("- dependencies: {}", format_list(&task.dependencies)));
        }
        if task.priority != DEFAULT_PRIORITY {
            out.push(format!("- priority: {}", task.priority));
        }
        if task.merge_order != 0 {
            out.push(format!("- merge_order: {}", task.merge_order));
        }
        if !task.exclusive_files.is_empty() {
            out.push(format!(
                "- exclusive_files: {}",
                format_list(&task.exclusive_files)
            ));
        }
        if !task.shared_files.is_empty() {
            out.push(format!("- shared_files: {}", format_list(&task.shared_files)));
        }
        if !task.initialization_deps.is_empty() {
            out.push(format!(
                "- initialization_deps: {}",
                format_list(&task.initialization_deps)
            ));
        }
        if !task.setup_commands.is_empty() {
            out.push(format!(
                "- setup_commands: {}",
                format_list(&task.setup_commands)
            ));
        }
    }

    out.push(String::new());
    out.join("\n")
}
