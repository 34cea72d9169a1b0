//! Trunkline CLI entry point.

use anyhow::{Context, Result};
use clap::Parser;

use trunkline::cli::{commands, Cli, Commands, ProjectCommands, TaskCommands};
use trunkline::infrastructure::config::{ConfigLoader, ProjectRegistry};
use trunkline::infrastructure::logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Init runs before configuration exists
    if let Commands::Init { force } = cli.command {
        return commands::handle_init(force).await;
    }

    let config = ConfigLoader::load().context("Failed to load configuration")?;
    let _log_guard = logging::init_tracing(&config.logging);

    let registry = ProjectRegistry::new(ProjectRegistry::default_path());

    match cli.command {
        Commands::Init { .. } => unreachable!("handled before configuration load"),

        Commands::Project(project_cmd) => match project_cmd {
            ProjectCommands::Add {
                id,
                name,
                path,
                max_agents,
            } => {
                commands::handle_project_add(&registry, id, name, path, max_agents, cli.json)
                    .await?;
            }
            ProjectCommands::List => {
                commands::handle_project_list(&registry, cli.json).await?;
            }
            ProjectCommands::Remove { id } => {
                commands::handle_project_remove(&registry, &id).await?;
            }
            ProjectCommands::Reset { id } => {
                commands::handle_project_reset(&registry, &config, &id).await?;
            }
        },

        Commands::Task(task_cmd) => match task_cmd {
            TaskCommands::Add {
                project,
                title,
                description,
                prompt,
                dependencies,
                priority,
            } => {
                commands::handle_task_add(
                    &registry,
                    &project,
                    title,
                    description,
                    prompt,
                    dependencies,
                    priority,
                    cli.json,
                )
                .await?;
            }
            TaskCommands::List { project } => {
                commands::handle_task_list(&registry, &project, cli.json).await?;
            }
            TaskCommands::Show { project, task_id } => {
                commands::handle_task_show(&registry, &project, &task_id, cli.json).await?;
            }
            TaskCommands::Update {
                project,
                task_id,
                status,
                priority,
                merge_order,
                dependencies,
                exclusive_files,
                shared_files,
            } => {
                commands::handle_task_update(
                    &registry,
                    &project,
                    &task_id,
                    status,
                    priority,
                    merge_order,
                    dependencies,
                    exclusive_files,
                    shared_files,
                    cli.json,
                )
                .await?;
            }
            TaskCommands::Delete { project, task_id } => {
                commands::handle_task_delete(&registry, &project, &task_id).await?;
            }
        },

        Commands::Plan { project } => {
            commands::handle_plan(&registry, &config, &project, cli.json).await?;
        }

        Commands::Serve => {
            commands::handle_serve(&config).await?;
        }

        Commands::Start { project } => {
            commands::handle_start(&registry, &config, &project).await?;
        }

        Commands::Status { project } => {
            commands::handle_status(&registry, &config, &project, cli.json).await?;
        }
    }

    Ok(())
}
