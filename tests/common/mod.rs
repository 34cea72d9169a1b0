//! Shared helpers for integration tests: throwaway git repos and mock
//! ports for the scheduler.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};

use trunkline::domain::errors::{DomainError, DomainResult};
use trunkline::domain::models::{Project, Task};
use trunkline::domain::ports::{AgentSpawner, SessionSupervisor};

/// Run a git command in `repo`, panicking on failure.
pub fn git(repo: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo)
        .output()
        .unwrap_or_else(|e| panic!("failed to run git {:?}: {}", args, e));
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Initialize a repository with a `main` branch and one commit.
pub fn init_repo(repo: &Path) {
    std::fs::create_dir_all(repo).unwrap();
    git(repo, &["init", "-b", "main"]);
    git(repo, &["config", "user.email", "orchestrator@test"]);
    git(repo, &["config", "user.name", "Test Orchestrator"]);
    git(repo, &["config", "commit.gpgsign", "false"]);
    std::fs::write(repo.join("README.md"), "# demo\n").unwrap();
    git(repo, &["add", "."]);
    git(repo, &["commit", "-m", "initial commit"]);
}

/// Create a branch from `main`, apply `files`, and commit.
pub fn commit_on_branch(repo: &Path, branch: &str, files: &[(&str, &str)], message: &str) {
    git(repo, &["checkout", "-b", branch, "main"]);
    for (path, content) in files {
        let full = repo.join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(full, content).unwrap();
    }
    git(repo, &["add", "."]);
    git(repo, &["commit", "-m", message]);
    git(repo, &["checkout", "main"]);
}

/// One-line log of `main`.
pub fn main_log(repo: &Path) -> Vec<String> {
    git(repo, &["log", "main", "--oneline"])
        .lines()
        .map(String::from)
        .collect()
}

/// Supervisor with a controllable set of live sessions.
#[derive(Default)]
pub struct FakeSupervisor {
    pub live: Mutex<Vec<String>>,
}

impl FakeSupervisor {
    pub fn kill_all(&self) {
        self.live.lock().unwrap().clear();
    }

    pub fn kill_session(&self, session: &str) {
        self.live.lock().unwrap().retain(|s| s != session);
    }
}

#[async_trait]
impl SessionSupervisor for FakeSupervisor {
    async fn list_sessions(&self) -> DomainResult<Vec<String>> {
        Ok(self.live.lock().unwrap().clone())
    }

    async fn has_session(&self, session: &str) -> DomainResult<bool> {
        Ok(self.live.lock().unwrap().iter().any(|s| s == session))
    }

    async fn kill(&self, session: &str) -> DomainResult<()> {
        self.kill_session(session);
        Ok(())
    }

    async fn capture_tail(&self, _session: &str) -> DomainResult<String> {
        Ok(String::new())
    }
}

/// Spawner that simulates an agent by committing the task's declared
/// files on its branch, then registering the session as live.
pub struct CommittingSpawner {
    pub repo: PathBuf,
    pub supervisor: Arc<FakeSupervisor>,
    pub fail_for: Mutex<HashSet<String>>,
    /// Tasks whose "agent" makes no commits (simulating early death)
    pub no_commit_for: Mutex<HashSet<String>>,
}

impl CommittingSpawner {
    pub fn new(repo: impl Into<PathBuf>, supervisor: Arc<FakeSupervisor>) -> Self {
        Self {
            repo: repo.into(),
            supervisor,
            fail_for: Mutex::new(HashSet::new()),
            no_commit_for: Mutex::new(HashSet::new()),
        }
    }
}

#[async_trait]
impl AgentSpawner for CommittingSpawner {
    async fn spawn_agent(&self, project: &Project, task: &Task) -> DomainResult<String> {
        if self.fail_for.lock().unwrap().contains(&task.id) {
            return Err(DomainError::SessionError("refused by test".to_string()));
        }

        if !self.no_commit_for.lock().unwrap().contains(&task.id) {
            let file = format!("work/{}.txt", task.branch);
            commit_on_branch(
                &self.repo,
                &task.branch,
                &[(file.as_str(), "agent output\n")],
                &format!("work for {}", task.title),
            );
        } else {
            // Branch exists but holds nothing beyond main
            git(&self.repo, &["branch", &task.branch, "main"]);
        }

        let session = format!("{}-{}", task.task_id, project.id);
        self.supervisor.live.lock().unwrap().push(session.clone());
        Ok(session)
    }
}
