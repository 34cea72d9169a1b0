//! Worktree provisioning.
//!
//! Each task gets an isolated working tree at
//! `<project_root>/worktrees/<branch>`, derived from the right base
//! branch, seeded with the project's agent configuration, and prepared by
//! the task's setup commands.

use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Project, Task, TaskStatus};
use crate::infrastructure::git;

/// Agent configuration file copied into every worktree.
pub const AGENT_CONFIG_FILE: &str = "CLAUDE.md";
/// Agent configuration folder copied into every worktree.
pub const AGENT_CONFIG_DIR: &str = ".claude";

/// Manages per-task git worktrees for one project.
#[derive(Debug, Clone)]
pub struct WorktreeManager {
    repo: PathBuf,
    worktrees_dir: PathBuf,
}

impl WorktreeManager {
    pub fn for_project(project: &Project) -> Self {
        Self {
            repo: project.path.clone(),
            worktrees_dir: project.worktrees_dir(),
        }
    }

    pub fn worktree_path(&self, task: &Task) -> PathBuf {
        self.worktrees_dir.join(&task.branch)
    }

    /// Pick the base branch for a new worktree: the branch of the most
    /// recently merged task among `initialization_deps`, else `main`.
    pub fn choose_base_branch(task: &Task, all_tasks: &[Task]) -> String {
        task.initialization_deps
            .iter()
            .filter_map(|dep_id| {
                all_tasks
                    .iter()
                    .find(|t| &t.id == dep_id && t.status == TaskStatus::Merged)
            })
            .max_by_key(|t| t.merged_at)
            .map(|t| t.branch.clone())
            .unwrap_or_else(|| "main".to_string())
    }

    /// Create (or reuse) the task's worktree and prepare it.
    ///
    /// Returns the worktree path. Setup-command failures are logged but do
    /// not abort the spawn; the agent may still recover.
    #[instrument(skip(self, all_tasks), fields(task_id = %task.id, branch = %task.branch))]
    pub async fn provision(&self, task: &Task, all_tasks: &[Task]) -> DomainResult<PathBuf> {
        git::validate_branch_name(&task.branch)?;
        let path = self.worktree_path(task);

        if self.is_valid_worktree(&path).await? {
            info!(path = %path.display(), "reusing existing worktree");
            return Ok(path);
        }

        fs::create_dir_all(&self.worktrees_dir).await?;

        let base = Self::choose_base_branch(task, all_tasks);
        if base != "main" {
            debug!(base = %base, "creating worktree from dependency branch");
        }
        self.create_worktree(&task.branch, &base, &path).await?;
        self.copy_agent_config(&path).await?;
        self.run_setup_commands(task, &path).await;

        info!(path = %path.display(), "worktree provisioned");
        Ok(path)
    }

    /// Remove the task's worktree and prune stale entries. Called after a
    /// successful merge.
    #[instrument(skip(self), fields(branch = %task.branch))]
    pub async fn cleanup(&self, task: &Task) -> DomainResult<()> {
        let path = self.worktree_path(task);
        if path.exists() {
            let path_str = path.display().to_string();
            let output = Command::new("git")
                .args(["worktree", "remove", "--force", &path_str])
                .current_dir(&self.repo)
                .output()
                .await
                .map_err(|e| DomainError::GitError(e.to_string()))?;
            if !output.status.success() {
                warn!(
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "worktree remove failed"
                );
            }
        }
        let _ = git::run_git(&self.repo, &["worktree", "prune"]).await;
        Ok(())
    }

    /// Remove every worktree under the project's worktree directory.
    pub async fn cleanup_all(&self, tasks: &[Task]) {
        for task in tasks {
            let _ = self.cleanup(task).await;
        }
        let _ = fs::remove_dir_all(&self.worktrees_dir).await;
        let _ = git::run_git(&self.repo, &["worktree", "prune"]).await;
    }

    /// A directory is a valid worktree when it has the `.git` link file
    /// and git recognizes it. An invalid leftover directory is removed.
    async fn is_valid_worktree(&self, path: &Path) -> DomainResult<bool> {
        if !path.exists() {
            return Ok(false);
        }
        let git_file = path.join(".git");
        if !git_file.exists() || !git_file.is_file() {
            warn!(path = %path.display(), "directory exists but is not a worktree; removing");
            fs::remove_dir_all(path).await?;
            return Ok(false);
        }
        Ok(git::git_succeeds(path, &["rev-parse", "--git-dir"]).await)
    }

    async fn create_worktree(&self, branch: &str, base: &str, path: &Path) -> DomainResult<()> {
        let path_str = path.display().to_string();
        let args: Vec<&str> = if git::branch_exists(&self.repo, branch).await {
            info!(branch, "branch already exists, attaching worktree");
            vec!["worktree", "add", &path_str, branch]
        } else {
            vec!["worktree", "add", &path_str, "-b", branch, base]
        };

        let output = Command::new("git")
            .args(&args)
            .current_dir(&self.repo)
            .output()
            .await
            .map_err(|e| DomainError::GitError(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(branch, stderr = %stderr.trim(), "worktree creation failed");
            return Err(DomainError::GitError(format!(
                "git worktree add failed: {}",
                stderr.trim()
            )));
        }
        Ok(())
    }

    /// Copy `CLAUDE.md` and `.claude/` from the project root into the
    /// worktree, replacing existing copies.
    async fn copy_agent_config(&self, worktree: &Path) -> DomainResult<()> {
        let config_file = self.repo.join(AGENT_CONFIG_FILE);
        if config_file.exists() {
            fs::copy(&config_file, worktree.join(AGENT_CONFIG_FILE)).await?;
            debug!("copied {} into worktree", AGENT_CONFIG_FILE);
        }

        let config_dir = self.repo.join(AGENT_CONFIG_DIR);
        if config_dir.is_dir() {
            let dst = worktree.join(AGENT_CONFIG_DIR);
            if dst.exists() {
                fs::remove_dir_all(&dst).await?;
            }
            copy_dir_recursive(&config_dir, &dst).await?;
            debug!("copied {} into worktree", AGENT_CONFIG_DIR);
        }
        Ok(())
    }

    /// Run the task's setup commands in the worktree, capturing output for
    /// diagnostics. A failing command is logged and skipped.
    async fn run_setup_commands(&self, task: &Task, worktree: &Path) {
        for command in &task.setup_commands {
            debug!(command, "running setup command");
            let result = Command::new("bash")
                .args(["-c", command])
                .current_dir(worktree)
                .output()
                .await;
            match result {
                Ok(output) if output.status.success() => {}
                Ok(output) => {
                    warn!(
                        command,
                        status = ?output.status.code(),
                        stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                        "setup command failed; continuing"
                    );
                }
                Err(e) => {
                    warn!(command, error = %e, "setup command could not be run");
                }
            }
        }
    }
}

/// Recursively copy a directory tree.
async fn copy_dir_recursive(src: &Path, dst: &Path) -> DomainResult<()> {
    fs::create_dir_all(dst).await?;
    let mut stack = vec![(src.to_path_buf(), dst.to_path_buf())];
    while let Some((from, to)) = stack.pop() {
        let mut entries = fs::read_dir(&from).await?;
        while let Some(entry) = entries.next_entry().await? {
            let target = to.join(entry.file_name());
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                fs::create_dir_all(&target).await?;
                stack.push((entry.path(), target));
            } else if file_type.is_file() {
                fs::copy(entry.path(), &target).await?;
            }
        }
    }
    Ok(())
}
