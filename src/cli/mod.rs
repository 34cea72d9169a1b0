//! Command-line interface definitions.

pub mod commands;
pub mod display;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parallel AI coding-agent orchestrator.
#[derive(Debug, Parser)]
#[command(name = "trunkline", version, about)]
pub struct Cli {
    /// Emit machine-readable JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create the .trunkline config skeleton in the current directory
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
    /// Manage registered projects
    #[command(subcommand)]
    Project(ProjectCommands),
    /// Manage a project's tasks
    #[command(subcommand)]
    Task(TaskCommands),
    /// Synthesize a task plan for a project from its overview
    Plan {
        /// Project id
        project: String,
    },
    /// Run the coordination RPC server standalone
    Serve,
    /// Run the orchestrator for a project (embeds the coordination server)
    Start {
        /// Project id
        project: String,
    },
    /// Show task and agent statistics for a project
    Status {
        /// Project id
        project: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum ProjectCommands {
    /// Register a project
    Add {
        /// Stable project id
        id: String,
        /// Human-readable name
        name: String,
        /// Path to the git repository root
        path: PathBuf,
        /// Per-project concurrent agent cap
        #[arg(long, default_value_t = 5)]
        max_agents: usize,
    },
    /// List registered projects
    List,
    /// Remove a project from the registry (files are untouched)
    Remove { id: String },
    /// Kill sessions, remove worktrees, clear coordination state, rewind tasks
    Reset { id: String },
}

#[derive(Debug, Subcommand)]
pub enum TaskCommands {
    /// Add a task
    Add {
        /// Project id
        project: String,
        /// Task title
        title: String,
        #[arg(long)]
        description: Option<String>,
        /// Custom agent prompt
        #[arg(long)]
        prompt: Option<String>,
        /// Comma-separated dependency task ids
        #[arg(long)]
        dependencies: Option<String>,
        /// 1 is highest, 10 is lowest
        #[arg(long)]
        priority: Option<i64>,
    },
    /// List a project's tasks
    List {
        /// Project id
        project: String,
    },
    /// Show one task in full
    Show {
        /// Project id
        project: String,
        /// Task id (e.g. 3-demo)
        task_id: String,
    },
    /// Update task fields
    Update {
        /// Project id
        project: String,
        /// Task id
        task_id: String,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        priority: Option<i64>,
        #[arg(long)]
        merge_order: Option<i64>,
        /// Comma-separated dependency task ids
        #[arg(long)]
        dependencies: Option<String>,
        /// Comma-separated exclusive file patterns
        #[arg(long)]
        exclusive_files: Option<String>,
        /// Comma-separated shared file patterns
        #[arg(long)]
        shared_files: Option<String>,
    },
    /// Delete a task
    Delete {
        /// Project id
        project: String,
        /// Task id
        task_id: String,
    },
}

/// Split a comma-separated CLI list argument.
pub fn parse_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
