//! Trunkline - parallel AI coding-agent orchestration.
//!
//! Keeps a bounded fleet of agents busy on independent branches of one
//! repository: a task queue with a five-state lifecycle, per-task git
//! worktrees hosting supervised tmux sessions, a coordination store the
//! agents talk to while running, and a dependency-ordered merge queue
//! that folds finished branches back into trunk.

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{Config, Project, Task, TaskStatus};
