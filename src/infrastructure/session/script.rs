//! Wrapper-script and prompt generation for agent sessions.
//!
//! Each session runs a generated bash script that prepares the worktree,
//! exports the coordination environment, launches the agent with the
//! assembled prompt, and writes the terminal sentinel on any exit.

use std::path::Path;

use crate::domain::models::{Project, Task};

/// Sentinel written while the agent runs.
pub const SENTINEL_RUNNING: &str = "RUNNING";
/// Sentinel written as the wrapper's final action.
pub const SENTINEL_COMPLETED: &str = "COMPLETED";

/// Parameters threaded into the wrapper script.
pub struct ScriptParams<'a> {
    pub project: &'a Project,
    pub task: &'a Task,
    pub session_name: &'a str,
    pub worktree_path: &'a Path,
    pub status_file: &'a Path,
    pub prompt_file: &'a Path,
    pub agent_command: &'a str,
    pub coordination_endpoint: &'a str,
}

/// Build the Coordination Protocol preamble.
///
/// Prepended to every prompt, custom or default: the agent must register
/// before any other action, lock files before edits, share interfaces,
/// heartbeat, and finish with `mark_task_completed`.
pub fn coordination_preamble(project: &Project, task: &Task, session_name: &str) -> String {
    format!(
        "\
# MANDATORY: Agent Coordination Protocol

You are one of several AI agents working on this repository in parallel.
Coordinate through the coordination API at the endpoint in the
COORDINATION_ENDPOINT environment variable. Identifiers are injected as
PROJECT_ID, SESSION_NAME, TASK_ID, BRANCH, TASK_TITLE.

FIRST ACTION - register yourself before doing anything else:
  register_agent(\"{project_id}\", \"{session}\", \"{task_id}\", \"{branch}\", \"{title}\")
If registration fails, stop and report the failure.

While working:
- Share your plan: add_todo(...) for each step, update_todo(...) as you progress.
- BEFORE modifying any file: announce_file_change(\"{project_id}\", \"{session}\", <path>, <operation>).
  AFTER you finish with it: release_file_lock(\"{project_id}\", \"{session}\", <path>).
  If a file is locked by another agent, work on something else or query that agent.
- Share every interface or type you create: register_interface(...). Check
  query_interface / list_interfaces before defining types others may own.
- Check your inbox regularly with check_messages and answer queries with
  respond_to_query.
- Send heartbeat(\"{project_id}\", \"{session}\") every 30-60 seconds.

Commit only to branch {branch}.

FINAL ACTION - after committing all work:
  mark_task_completed(\"{project_id}\", \"{session}\", \"{task_id}\")
",
        project_id = project.id,
        session = session_name,
        task_id = task.id,
        branch = task.branch,
        title = task.title,
    )
}

/// Build the full agent prompt: preamble, then the custom prompt when the
/// task carries one, else the default work instruction.
pub fn build_prompt(project: &Project, task: &Task, session_name: &str) -> String {
    let mut prompt = coordination_preamble(project, task, session_name);
    prompt.push('\n');

    if let Some(custom) = &task.prompt {
        prompt.push_str(custom);
        prompt.push_str(&format!("\n\nTask: {}", task.title));
        if let Some(description) = &task.description {
            prompt.push_str(&format!("\nDescription: {}", description));
        }
    } else {
        prompt.push_str(&format!("You are working on {}.\n\n", project.name));
        prompt.push_str(
            "Create a plan, review it and choose the best option, then accomplish \
             the following task and commit the changes: ",
        );
        prompt.push_str(&task.title);
        if let Some(description) = &task.description {
            prompt.push_str(&format!("\n\nDescription: {}", description));
        }
    }

    prompt
}

/// Render the wrapper script executed inside the tmux session.
pub fn wrapper_script(params: &ScriptParams<'_>) -> String {
    let task_title = params.task.title.replace('\'', "'\\''");
    format!(
        r#"#!/bin/bash
cd '{worktree}'

echo "Starting agent for task: {task_title}"
echo "Preparing environment..."

# Install ecosystem dependencies when lockfiles are present
if [ -f "package.json" ]; then
    npm install
fi
if [ -f "requirements.txt" ] || [ -f "setup.py" ] || [ -f "pyproject.toml" ]; then
    if [ ! -d "venv" ]; then
        python3 -m venv venv
    fi
    source venv/bin/activate
    if [ -f "requirements.txt" ]; then
        pip install -r requirements.txt
    fi
fi
if [ -f "Cargo.lock" ]; then
    cargo fetch
fi

# Coordination environment
export PROJECT_ID='{project_id}'
export SESSION_NAME='{session}'
export TASK_ID='{task_id}'
export BRANCH='{branch}'
export TASK_TITLE='{task_title}'
export COORDINATION_ENDPOINT='{endpoint}'

echo "Agent configuration:"
echo "  Project: $PROJECT_ID"
echo "  Session: $SESSION_NAME"
echo "  Task ID: $TASK_ID"
echo "  Branch:  $BRANCH"
echo "----------------------------------------"

{agent_command} "$(cat '{prompt_file}')"

if [ $? -eq 0 ]; then
    echo "Agent exited cleanly"
else
    echo "Agent exited with an error"
fi

# Terminal sentinel: the status file holds exactly one line
echo {completed} > '{status_file}'
"#,
        worktree = params.worktree_path.display(),
        task_title = task_title,
        project_id = params.project.id,
        session = params.session_name,
        task_id = params.task.id,
        branch = params.task.branch,
        endpoint = params.coordination_endpoint,
        agent_command = params.agent_command,
        prompt_file = params.prompt_file.display(),
        status_file = params.status_file.display(),
        completed = SENTINEL_COMPLETED,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn fixture() -> (Project, Task) {
        let project = Project::new("demo", "Demo Site", "/srv/demo");
        let task = Task::new(3, "demo", "Header Component")
            .with_description("Build the site header");
        (project, task)
    }

    #[test]
    fn test_preamble_contains_identifiers_and_protocol() {
        let (project, task) = fixture();
        let preamble = coordination_preamble(&project, &task, "3-demo");

        assert!(preamble.contains("register_agent(\"demo\", \"3-demo\", \"3-demo\", \"task-3\""));
        assert!(preamble.contains("mark_task_completed(\"demo\", \"3-demo\", \"3-demo\")"));
        assert!(preamble.contains("announce_file_change"));
        assert!(preamble.contains("register_interface"));
        assert!(preamble.contains("heartbeat(\"demo\", \"3-demo\")"));
        assert!(preamble.contains("Commit only to branch task-3"));
    }

    #[test]
    fn test_default_prompt_follows_preamble() {
        let (project, task) = fixture();
        let prompt = build_prompt(&project, &task, "3-demo");

        let preamble_pos = prompt.find("register_agent").unwrap();
        let work_pos = prompt.find("accomplish").unwrap();
        assert!(preamble_pos < work_pos, "preamble must come first");
        assert!(prompt.contains("Header Component"));
        assert!(prompt.contains("Build the site header"));
    }

    #[test]
    fn test_custom_prompt_is_appended_after_preamble() {
        let (project, mut task) = fixture();
        task.prompt = Some("Use the existing design tokens.".to_string());
        let prompt = build_prompt(&project, &task, "3-demo");

        let preamble_pos = prompt.find("register_agent").unwrap();
        let custom_pos = prompt.find("design tokens").unwrap();
        assert!(preamble_pos < custom_pos);
        assert!(prompt.contains("Task: Header Component"));
    }

    #[test]
    fn test_wrapper_script_shape() {
        let (project, task) = fixture();
        let worktree = PathBuf::from("/srv/demo/worktrees/task-3");
        let status = PathBuf::from("/tmp/trunkline-status/3-demo.status");
        let prompt = PathBuf::from("/tmp/trunkline-status/3-demo.prompt");
        let script = wrapper_script(&ScriptParams {
            project: &project,
            task: &task,
            session_name: "3-demo",
            worktree_path: &worktree,
            status_file: &status,
            prompt_file: &prompt,
            agent_command: "claude --print",
            coordination_endpoint: "http://127.0.0.1:5050",
        });

        assert!(script.starts_with("#!/bin/bash"));
        assert!(script.contains("export PROJECT_ID='demo'"));
        assert!(script.contains("export SESSION_NAME='3-demo'"));
        assert!(script.contains("export TASK_ID='3-demo'"));
        assert!(script.contains("export BRANCH='task-3'"));
        assert!(script.contains("export TASK_TITLE='Header Component'"));
        assert!(script.contains("export COORDINATION_ENDPOINT='http://127.0.0.1:5050'"));
        assert!(script.contains("npm install"));
        // Sentinel write is the final effect of the script
        assert!(script.trim_end().ends_with(&format!(
            "echo COMPLETED > '{}'",
            status.display()
        )));
    }
}
