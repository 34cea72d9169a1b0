//! Terminal rendering helpers for CLI output.

use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use console::style;

use crate::domain::models::{Project, ProjectStats, Task, TaskStatus};

/// Colorize a task status for terminal output.
pub fn styled_status(status: TaskStatus) -> String {
    match status {
        TaskStatus::Unclaimed => style(status.as_str()).dim().to_string(),
        TaskStatus::UpNext => style(status.as_str()).cyan().to_string(),
        TaskStatus::InProgress => style(status.as_str()).yellow().to_string(),
        TaskStatus::Completed => style(status.as_str()).green().to_string(),
        TaskStatus::Merged => style(status.as_str()).green().bold().to_string(),
    }
}

/// Render the task list as a table.
pub fn task_table(tasks: &[Task]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            "ID", "Title", "Status", "Branch", "Priority", "Merge order", "Deps", "Session",
        ]);

    for task in tasks {
        table.add_row(vec![
            Cell::new(&task.id),
            Cell::new(&task.title),
            Cell::new(styled_status(task.status)),
            Cell::new(&task.branch),
            Cell::new(task.priority),
            Cell::new(task.merge_order),
            Cell::new(task.dependencies.len()),
            Cell::new(task.session.as_deref().unwrap_or("-")),
        ]);
    }
    table
}

/// Render the project list as a table.
pub fn project_table(projects: &[Project]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["ID", "Name", "Path", "Max agents", "Active"]);

    for project in projects {
        table.add_row(vec![
            Cell::new(&project.id),
            Cell::new(&project.name),
            Cell::new(project.path.display()),
            Cell::new(project.max_agents),
            Cell::new(project.active),
        ]);
    }
    table
}

/// Render project statistics as a table.
pub fn stats_table(stats: &ProjectStats) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["Metric", "Count"]);
    table.add_row(vec![Cell::new("total tasks"), Cell::new(stats.total_tasks)]);
    table.add_row(vec![Cell::new("unclaimed"), Cell::new(stats.unclaimed_tasks)]);
    table.add_row(vec![Cell::new("up next"), Cell::new(stats.up_next_tasks)]);
    table.add_row(vec![
        Cell::new("in progress"),
        Cell::new(stats.in_progress_tasks),
    ]);
    table.add_row(vec![Cell::new("completed"), Cell::new(stats.completed_tasks)]);
    table.add_row(vec![Cell::new("merged"), Cell::new(stats.merged_tasks)]);
    table.add_row(vec![
        Cell::new("active agents"),
        Cell::new(stats.active_agents),
    ]);
    table
}

/// Compute stats from a task list plus the live agent count.
pub fn compute_stats(tasks: &[Task], active_agents: usize) -> ProjectStats {
    let mut stats = ProjectStats {
        total_tasks: tasks.len(),
        active_agents,
        ..ProjectStats::default()
    };
    for task in tasks {
        match task.status {
            TaskStatus::Unclaimed => stats.unclaimed_tasks += 1,
            TaskStatus::UpNext => stats.up_next_tasks += 1,
            TaskStatus::InProgress => stats.in_progress_tasks += 1,
            TaskStatus::Completed => stats.completed_tasks += 1,
            TaskStatus::Merged => stats.merged_tasks += 1,
        }
    }
    stats
}
