//! Async git plumbing shared by the worktree manager and merge queue.

use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::warn;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::Project;
use crate::domain::ports::RepoInspector;

/// Run a git command in `repo`, returning stdout on success.
pub async fn run_git(repo: &Path, args: &[&str]) -> DomainResult<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo)
        .output()
        .await
        .map_err(|e| DomainError::GitError(format!("failed to run git {:?}: {}", args, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(DomainError::GitError(format!(
            "git {} failed: {}",
            args.first().copied().unwrap_or(""),
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Run a git command, returning only whether it succeeded.
pub async fn git_succeeds(repo: &Path, args: &[&str]) -> bool {
    Command::new("git")
        .args(args)
        .current_dir(repo)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Whether `branch` exists as a local head.
pub async fn branch_exists(repo: &Path, branch: &str) -> bool {
    git_succeeds(
        repo,
        &[
            "show-ref",
            "--verify",
            "--quiet",
            &format!("refs/heads/{}", branch),
        ],
    )
    .await
}

/// Whether the path is the root of a working git checkout.
pub async fn is_git_repo(repo: &Path) -> bool {
    repo.join(".git").exists() && git_succeeds(repo, &["rev-parse", "--git-dir"]).await
}

/// Whether the repository has a remote named `origin`.
pub async fn has_origin(repo: &Path) -> bool {
    git_succeeds(repo, &["remote", "get-url", "origin"]).await
}

/// SHA of the current HEAD.
pub async fn head_sha(repo: &Path) -> DomainResult<String> {
    Ok(run_git(repo, &["rev-parse", "HEAD"]).await?.trim().to_string())
}

/// Number of commits on `branch` not reachable from `main`.
pub async fn commits_ahead_of_main(repo: &Path, branch: &str) -> DomainResult<usize> {
    let out = run_git(repo, &["log", &format!("main..{}", branch), "--oneline"]).await?;
    Ok(out.lines().filter(|l| !l.trim().is_empty()).count())
}

/// Paths changed on `branch` relative to `main`.
pub async fn files_changed_vs_main(repo: &Path, branch: &str) -> DomainResult<Vec<String>> {
    let out = run_git(repo, &["diff", "--name-only", "main", branch]).await?;
    Ok(out
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect())
}

/// Files currently in conflicted (`UU`) state.
pub async fn conflicted_files(repo: &Path) -> DomainResult<Vec<String>> {
    let out = run_git(repo, &["status", "--porcelain"]).await?;
    Ok(out
        .lines()
        .filter(|l| l.starts_with("UU "))
        .map(|l| l[3..].trim().to_string())
        .collect())
}

/// Read one of the three index stages of a conflicted file.
///
/// Stage 1 is the merge base, 2 is ours, 3 is theirs. Returns `None` when
/// the stage is absent (e.g. the file is new on one side).
pub async fn show_index_stage(repo: &Path, stage: u8, path: &str) -> Option<String> {
    let spec = format!(":{}:{}", stage, path);
    let output = Command::new("git")
        .args(["show", &spec])
        .current_dir(repo)
        .output()
        .await
        .ok()?;
    if output.status.success() {
        Some(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        None
    }
}

/// Validates a git branch name to prevent command injection.
///
/// Rejects names that could be read as git flags or revision ranges,
/// following `git check-ref-format` rules.
pub fn validate_branch_name(name: &str) -> DomainResult<()> {
    if name.is_empty() {
        return Err(DomainError::ValidationFailed(
            "Branch name cannot be empty".to_string(),
        ));
    }
    if name.starts_with('-') {
        return Err(DomainError::ValidationFailed(format!(
            "Invalid branch name '{}': must not start with '-'",
            name
        )));
    }
    if name.contains("..") {
        return Err(DomainError::ValidationFailed(format!(
            "Invalid branch name '{}': must not contain '..'",
            name
        )));
    }
    for ch in name.chars() {
        if ch.is_ascii_control() || matches!(ch, ' ' | '~' | '^' | ':' | '?' | '*' | '[' | '\\') {
            return Err(DomainError::ValidationFailed(format!(
                "Invalid branch name '{}': contains disallowed character '{}'",
                name, ch
            )));
        }
    }
    if name.ends_with(".lock") {
        return Err(DomainError::ValidationFailed(format!(
            "Invalid branch name '{}': must not end with '.lock'",
            name
        )));
    }
    Ok(())
}

/// Production [`RepoInspector`] backed by the git CLI.
#[derive(Debug, Clone, Default)]
pub struct GitInspector;

#[async_trait::async_trait]
impl RepoInspector for GitInspector {
    async fn commits_ahead(&self, repo: &Path, branch: &str) -> DomainResult<usize> {
        commits_ahead_of_main(repo, branch).await
    }

    async fn changed_files(&self, repo: &Path, branch: &str) -> DomainResult<Vec<String>> {
        files_changed_vs_main(repo, branch).await
    }
}

/// Startup checks for a project repository: root exists, is a git repo,
/// and trunk is present.
pub async fn verify_project_repo(project: &Project) -> DomainResult<()> {
    if !project.path.exists() {
        return Err(DomainError::ValidationFailed(format!(
            "Project root '{}' does not exist",
            project.path.display()
        )));
    }
    if !is_git_repo(&project.path).await {
        return Err(DomainError::ValidationFailed(format!(
            "Project root '{}' is not a git repository",
            project.path.display()
        )));
    }
    if !branch_exists(&project.path, "main").await {
        return Err(DomainError::ValidationFailed(format!(
            "Project '{}' has no 'main' branch",
            project.id
        )));
    }
    Ok(())
}

/// Best-effort fast-forward of `main` from origin; a failure is logged and
/// otherwise ignored (no remote, offline, diverged).
pub async fn fast_forward_main(repo: &Path) {
    if !has_origin(repo).await {
        return;
    }
    if let Err(e) = run_git(repo, &["pull", "--ff-only", "origin", "main"]).await {
        warn!(error = %e, "fast-forward of main from origin failed");
    }
}
