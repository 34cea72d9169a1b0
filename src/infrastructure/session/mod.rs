//! Session supervision: named detached tmux sessions hosting agents.

pub mod script;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Project, Task};
use crate::domain::ports::SessionSupervisor;

pub use script::{SENTINEL_COMPLETED, SENTINEL_RUNNING};

/// Session name for a task: `<task_id>-<project_id>`, unique per active
/// task.
pub fn session_name(task: &Task, project: &Project) -> String {
    format!("{}-{}", task.task_id, project.id)
}

/// Resolve a stored session name against the live session list.
///
/// Exact match first; otherwise a prefix match (tmux may truncate long
/// names) verified by the task's branch appearing in the candidate.
pub fn resolve_session<'a>(
    stored: &str,
    branch: &str,
    live_sessions: &'a [String],
) -> Option<&'a str> {
    if let Some(found) = live_sessions.iter().find(|s| s.as_str() == stored) {
        return Some(found);
    }
    let prefix: String = stored.chars().take(20).collect();
    live_sessions
        .iter()
        .find(|s| s.starts_with(&prefix) && s.contains(branch))
        .map(String::as_str)
}

/// Per-session status sentinel files.
///
/// `<dir>/<session>.status` holds exactly one line: `RUNNING` while the
/// agent works, `COMPLETED` once the wrapper exits.
#[derive(Debug, Clone)]
pub struct StatusFiles {
    dir: PathBuf,
}

impl StatusFiles {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, session: &str) -> PathBuf {
        self.dir.join(format!("{}.status", session))
    }

    /// Path of the prompt file written next to the status file.
    pub fn prompt_path(&self, session: &str) -> PathBuf {
        self.dir.join(format!("{}.prompt", session))
    }

    /// Path of the generated wrapper script.
    pub fn script_path(&self, session: &str) -> PathBuf {
        self.dir.join(format!("{}.sh", session))
    }

    pub async fn mark_running(&self, session: &str) -> DomainResult<()> {
        fs::create_dir_all(&self.dir).await?;
        fs::write(self.path(session), format!("{}\n", SENTINEL_RUNNING)).await?;
        Ok(())
    }

    /// Current sentinel, if the file exists.
    pub async fn read(&self, session: &str) -> Option<String> {
        fs::read_to_string(self.path(session))
            .await
            .ok()
            .map(|s| s.trim().to_string())
    }

    pub async fn is_completed(&self, session: &str) -> bool {
        self.read(session).await.as_deref() == Some(SENTINEL_COMPLETED)
    }

    /// Remove the session's status, prompt, and script files after reap.
    pub async fn remove(&self, session: &str) {
        for path in [
            self.path(session),
            self.prompt_path(session),
            self.script_path(session),
        ] {
            let _ = fs::remove_file(path).await;
        }
    }

    /// Remove every status file; called on orchestrator start and stop.
    pub async fn clear_all(&self) {
        let Ok(mut entries) = fs::read_dir(&self.dir).await else {
            return;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            if entry.path().extension().is_some_and(|e| e == "status") {
                let _ = fs::remove_file(entry.path()).await;
            }
        }
    }
}

/// tmux-backed [`SessionSupervisor`].
#[derive(Debug, Clone, Default)]
pub struct TmuxSupervisor;

impl TmuxSupervisor {
    pub fn new() -> Self {
        Self
    }

    async fn tmux(&self, args: &[&str]) -> DomainResult<std::process::Output> {
        Command::new("tmux")
            .args(args)
            .output()
            .await
            .map_err(|e| DomainError::SessionError(format!("failed to run tmux: {}", e)))
    }

    /// Start a named detached session in `workdir` and hand it the wrapper
    /// script. Collisions with an existing session name are rejected.
    #[instrument(skip(self, script_path), fields(session = %session))]
    pub async fn start_session(
        &self,
        session: &str,
        workdir: &Path,
        script_path: &Path,
    ) -> DomainResult<()> {
        if self.has_session(session).await? {
            return Err(DomainError::SessionCollision(session.to_string()));
        }

        let workdir_str = workdir.display().to_string();
        let output = self
            .tmux(&["new-session", "-d", "-s", session, "-c", &workdir_str])
            .await?;
        if !output.status.success() {
            return Err(DomainError::SessionError(format!(
                "tmux new-session failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let exec_line = format!("exec bash {}", script_path.display());
        let output = self
            .tmux(&["send-keys", "-t", session, &exec_line, "Enter"])
            .await?;
        if !output.status.success() {
            // The half-created session would linger otherwise
            let _ = self.kill(session).await;
            return Err(DomainError::SessionError(format!(
                "tmux send-keys failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let _ = self
            .tmux(&["set-option", "-t", session, "remain-on-exit", "off"])
            .await;

        info!("agent session started");
        Ok(())
    }
}

#[async_trait]
impl SessionSupervisor for TmuxSupervisor {
    async fn list_sessions(&self) -> DomainResult<Vec<String>> {
        let output = self
            .tmux(&["list-sessions", "-F", "#{session_name}"])
            .await?;
        if !output.status.success() {
            // No tmux server running means no sessions
            return Ok(Vec::new());
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    async fn has_session(&self, session: &str) -> DomainResult<bool> {
        let output = self.tmux(&["has-session", "-t", session]).await?;
        Ok(output.status.success())
    }

    async fn kill(&self, session: &str) -> DomainResult<()> {
        let output = self.tmux(&["kill-session", "-t", session]).await?;
        if !output.status.success() {
            debug!(session, "kill-session on absent session");
        }
        Ok(())
    }

    async fn capture_tail(&self, session: &str) -> DomainResult<String> {
        let output = self.tmux(&["capture-pane", "-t", session, "-p"]).await?;
        if !output.status.success() {
            return Err(DomainError::SessionError(format!(
                "capture-pane failed for {}",
                session
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Write the prompt and wrapper script for a session, then start it.
///
/// Returns the session name. The caller has already provisioned the
/// worktree.
#[allow(clippy::too_many_arguments)]
pub async fn launch_agent_session(
    supervisor: &TmuxSupervisor,
    status_files: &StatusFiles,
    project: &Project,
    task: &Task,
    worktree_path: &Path,
    agent_command: &str,
    coordination_endpoint: &str,
) -> DomainResult<String> {
    let session = session_name(task, project);

    status_files.mark_running(&session).await?;

    let prompt = script::build_prompt(project, task, &session);
    let prompt_path = status_files.prompt_path(&session);
    fs::write(&prompt_path, prompt).await?;

    let script = script::wrapper_script(&script::ScriptParams {
        project,
        task,
        session_name: &session,
        worktree_path,
        status_file: &status_files.path(&session),
        prompt_file: &prompt_path,
        agent_command,
        coordination_endpoint,
    });
    let script_path = status_files.script_path(&session);
    fs::write(&script_path, script).await?;
    set_executable(&script_path).await?;

    if let Err(e) = supervisor
        .start_session(&session, worktree_path, &script_path)
        .await
    {
        warn!(session, error = %e, "session start failed; cleaning up status file");
        status_files.remove(&session).await;
        return Err(e);
    }

    Ok(session)
}

/// A live agent as seen from outside: the session, its task binding, and
/// the sentinel state.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AgentView {
    pub session_name: String,
    pub task_id: String,
    pub task_title: String,
    pub branch: String,
    /// `running` while the agent works, `completed` once the sentinel
    /// lands
    pub status: String,
}

/// Combine the supervisor's session list, the task list, and the status
/// files into a view of currently attached agents.
pub async fn probe_agents(
    supervisor: &dyn SessionSupervisor,
    status_files: &StatusFiles,
    tasks: &[Task],
) -> DomainResult<Vec<AgentView>> {
    let live = supervisor.list_sessions().await?;
    let mut agents = Vec::new();

    for task in tasks {
        let Some(stored) = &task.session else {
            continue;
        };
        let Some(session) = resolve_session(stored, &task.branch, &live) else {
            continue;
        };
        let status = if status_files.is_completed(session).await {
            "completed"
        } else {
            "running"
        };
        agents.push(AgentView {
            session_name: session.to_string(),
            task_id: task.id.clone(),
            task_title: task.title.clone(),
            branch: task.branch.clone(),
            status: status.to_string(),
        });
    }
    Ok(agents)
}

#[cfg(unix)]
async fn set_executable(path: &Path) -> DomainResult<()> {
    use std::os::unix::fs::PermissionsExt;
    let metadata = fs::metadata(path).await?;
    let mut perms = metadata.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn set_executable(_path: &Path) -> DomainResult<()> {
    Ok(())
}
