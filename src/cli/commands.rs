//! CLI command handlers.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::cli::{display, parse_csv};
use crate::domain::models::{Config, Project, TaskStatus};
use crate::infrastructure::anthropic::AnthropicClient;
use crate::infrastructure::config::ProjectRegistry;
use crate::infrastructure::rpc;
use crate::infrastructure::session::{probe_agents, StatusFiles, TmuxSupervisor};
use crate::services::{
    CoordinationStore, EventBus, Orchestrator, PlannerService, TaskPatch, TaskStore,
};

const DEFAULT_CONFIG_YAML: &str = "\
# Trunkline orchestrator configuration
orchestrator:
  max_concurrent_agents: 5
  tick_interval_secs: 60
  auto_merge: false
coordination:
  bind_addr: 127.0.0.1
  port: 5050
  endpoint: http://127.0.0.1:5050
logging:
  level: info
  format: pretty
";

pub async fn handle_init(force: bool) -> Result<()> {
    let path = std::path::Path::new(".trunkline/config.yaml");
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    tokio::fs::create_dir_all(".trunkline").await?;
    tokio::fs::write(path, DEFAULT_CONFIG_YAML).await?;
    println!("Wrote {}", path.display());
    Ok(())
}

pub async fn handle_project_add(
    registry: &ProjectRegistry,
    id: String,
    name: String,
    path: std::path::PathBuf,
    max_agents: usize,
    json: bool,
) -> Result<()> {
    let project = Project::new(id, name, path).with_max_agents(max_agents);
    let project = registry.add(project).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&project)?);
    } else {
        println!("Registered project {}", project.id);
    }
    Ok(())
}

pub async fn handle_project_list(registry: &ProjectRegistry, json: bool) -> Result<()> {
    let projects = registry.list().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&projects)?);
    } else {
        println!("{}", display::project_table(&projects));
    }
    Ok(())
}

pub async fn handle_project_remove(registry: &ProjectRegistry, id: &str) -> Result<()> {
    registry.remove(id).await?;
    println!("Removed project {}", id);
    Ok(())
}

pub async fn handle_project_reset(
    registry: &ProjectRegistry,
    config: &Config,
    id: &str,
) -> Result<()> {
    let project = registry.get(id).await?;
    let store = Arc::new(CoordinationStore::new());
    let event_bus = Arc::new(EventBus::default());
    let orchestrator = Orchestrator::new(config.clone(), store, event_bus);
    orchestrator.reset(&project).await?;
    println!("Project {} reset", id);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub async fn handle_task_add(
    registry: &ProjectRegistry,
    project_id: &str,
    title: String,
    description: Option<String>,
    prompt: Option<String>,
    dependencies: Option<String>,
    priority: Option<i64>,
    json: bool,
) -> Result<()> {
    let project = registry.get(project_id).await?;
    let store = TaskStore::for_project(&project);
    let deps = dependencies.as_deref().map(parse_csv).unwrap_or_default();
    let task = store.add(&title, description, prompt, deps, priority).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&task)?);
    } else {
        println!("Added task {} ({})", task.id, task.branch);
    }
    Ok(())
}

pub async fn handle_task_list(
    registry: &ProjectRegistry,
    project_id: &str,
    json: bool,
) -> Result<()> {
    let project = registry.get(project_id).await?;
    let tasks = TaskStore::for_project(&project).list().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&tasks)?);
    } else {
        println!("{}", display::task_table(&tasks));
    }
    Ok(())
}

pub async fn handle_task_show(
    registry: &ProjectRegistry,
    project_id: &str,
    task_id: &str,
    json: bool,
) -> Result<()> {
    let project = registry.get(project_id).await?;
    let task = TaskStore::for_project(&project).get(task_id).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&task)?);
    } else {
        println!("{}", serde_yaml::to_string(&task)?);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub async fn handle_task_update(
    registry: &ProjectRegistry,
    project_id: &str,
    task_id: &str,
    status: Option<String>,
    priority: Option<i64>,
    merge_order: Option<i64>,
    dependencies: Option<String>,
    exclusive_files: Option<String>,
    shared_files: Option<String>,
    json: bool,
) -> Result<()> {
    let project = registry.get(project_id).await?;
    let store = TaskStore::for_project(&project);

    let status = match status {
        Some(raw) => Some(
            TaskStatus::from_str(&raw)
                .with_context(|| format!("unknown status '{}'", raw))?,
        ),
        None => None,
    };

    let patch = TaskPatch {
        status,
        priority,
        merge_order,
        dependencies: dependencies.as_deref().map(parse_csv),
        exclusive_files: exclusive_files.as_deref().map(parse_csv),
        shared_files: shared_files.as_deref().map(parse_csv),
        ..TaskPatch::default()
    };
    let task = store.update(task_id, patch).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&task)?);
    } else {
        println!("Updated task {} ({})", task.id, task.status.as_str());
    }
    Ok(())
}

pub async fn handle_task_delete(
    registry: &ProjectRegistry,
    project_id: &str,
    task_id: &str,
) -> Result<()> {
    let project = registry.get(project_id).await?;
    TaskStore::for_project(&project).delete(task_id).await?;
    println!("Deleted task {}", task_id);
    Ok(())
}

pub async fn handle_plan(
    registry: &ProjectRegistry,
    config: &Config,
    project_id: &str,
    json: bool,
) -> Result<()> {
    let project = registry.get(project_id).await?;
    let task_store = TaskStore::for_project(&project);
    let event_bus = Arc::new(EventBus::default());

    let client = AnthropicClient::new(&config.planner)?;
    let planner = PlannerService::new(Arc::new(client), event_bus, config.planner.timeout_secs);

    let (outline, created) = planner.generate_plan(&project, &task_store).await?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "plan": outline.plan,
                "tasks_created": created,
            }))?
        );
    } else {
        println!("{}\n", outline.plan);
        println!("Created {} tasks", created);
    }
    Ok(())
}

pub async fn handle_serve(config: &Config) -> Result<()> {
    let store = Arc::new(CoordinationStore::new());
    let _sweeper = store.spawn_sweeper(Duration::from_secs(
        config.coordination.sweep_interval_secs,
    ));
    rpc::serve(
        store,
        &config.coordination.bind_addr,
        config.coordination.port,
    )
    .await?;
    Ok(())
}

/// Run the orchestrator for one project until interrupted. The
/// coordination server and liveness sweeper run in-process.
pub async fn handle_start(
    registry: &ProjectRegistry,
    config: &Config,
    project_id: &str,
) -> Result<()> {
    let project = registry.get(project_id).await?;

    let store = Arc::new(CoordinationStore::new());
    let event_bus = Arc::new(EventBus::default());
    let _sweeper = store.spawn_sweeper(Duration::from_secs(
        config.coordination.sweep_interval_secs,
    ));

    // Serve the agent-facing RPC surface in-process; failure to bind is
    // tolerated when a standalone server already owns the port.
    let rpc_store = store.clone();
    let bind_addr = config.coordination.bind_addr.clone();
    let port = config.coordination.port;
    tokio::spawn(async move {
        if let Err(e) = rpc::serve(rpc_store, &bind_addr, port).await {
            warn!(error = %e, "coordination server not started in-process");
        }
    });

    let orchestrator = Orchestrator::new(config.clone(), store, event_bus);
    orchestrator.start(project).await?;
    info!(project_id, "orchestrator running; press Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("stop requested; finishing current tick");
    orchestrator.stop(project_id).await?;
    Ok(())
}

pub async fn handle_status(
    registry: &ProjectRegistry,
    config: &Config,
    project_id: &str,
    json: bool,
) -> Result<()> {
    let project = registry.get(project_id).await?;
    let tasks = TaskStore::for_project(&project).list().await?;

    let supervisor = TmuxSupervisor::new();
    let status_files = StatusFiles::new(&config.orchestrator.status_dir);
    let agents = probe_agents(&supervisor, &status_files, &tasks).await?;
    let running = agents.iter().filter(|a| a.status == "running").count();
    let stats = display::compute_stats(&tasks, running);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "stats": stats,
                "agents": agents,
            }))?
        );
    } else {
        println!("{}", display::stats_table(&stats));
        for agent in &agents {
            println!(
                "  {} -> {} ({}) [{}]",
                agent.session_name, agent.task_title, agent.branch, agent.status
            );
        }
    }
    Ok(())
}
