//! Plan synthesis service.
//!
//! Turns a project overview and initial prompt into a build plan plus a
//! set of tasks appended to the task store. The synthesis call is bounded
//! by a hard timeout surfaced as a typed error.

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{EventPayload, Project};
use crate::domain::ports::{PlanOutline, Planner};
use crate::services::event_bus::EventBus;
use crate::services::task_store::TaskStore;

pub struct PlannerService {
    planner: Arc<dyn Planner>,
    event_bus: Arc<EventBus>,
    timeout: Duration,
}

impl PlannerService {
    pub fn new(planner: Arc<dyn Planner>, event_bus: Arc<EventBus>, timeout_secs: u64) -> Self {
        Self {
            planner,
            event_bus,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Synthesize a plan for the project and append the suggested tasks.
    ///
    /// Returns the outline and the number of tasks created.
    pub async fn generate_plan(
        &self,
        project: &Project,
        task_store: &TaskStore,
    ) -> DomainResult<(PlanOutline, usize)> {
        let overview = project.project_overview.as_deref().ok_or_else(|| {
            DomainError::ValidationFailed(format!(
                "project {} has no project_overview for plan synthesis",
                project.id
            ))
        })?;
        let initial_prompt = project
            .initial_prompt
            .as_deref()
            .unwrap_or("Plan the initial implementation.");

        let outline = tokio::time::timeout(
            self.timeout,
            self.planner.synthesize_plan(overview, initial_prompt),
        )
        .await
        .map_err(|_| DomainError::PlanTimeout(self.timeout.as_secs()))??;

        // Titles from this round, so suggested dependencies can reference
        // earlier suggestions by title.
        let mut created = 0usize;
        let mut title_to_id: std::collections::HashMap<String, String> =
            std::collections::HashMap::new();

        for suggestion in &outline.suggested_tasks {
            let dependencies: Vec<String> = suggestion
                .dependencies
                .iter()
                .filter_map(|dep| title_to_id.get(dep).cloned())
                .collect();
            let task = task_store
                .add(
                    &suggestion.title,
                    suggestion.description.clone(),
                    None,
                    dependencies,
                    suggestion.priority,
                )
                .await?;
            title_to_id.insert(suggestion.title.clone(), task.id);
            created += 1;
        }

        self.event_bus.publish(
            Some(project.id.clone()),
            EventPayload::PlanGenerated {
                task_count: created,
                plan: serde_json::json!({ "plan": outline.plan }),
            },
        );
        info!(project_id = %project.id, tasks = created, "plan generated");

        Ok((outline, created))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::SuggestedTask;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct FixedPlanner {
        outline: PlanOutline,
        delay: Duration,
    }

    #[async_trait]
    impl Planner for FixedPlanner {
        async fn synthesize_plan(
            &self,
            _overview: &str,
            _prompt: &str,
        ) -> DomainResult<PlanOutline> {
            tokio::time::sleep(self.delay).await;
            Ok(self.outline.clone())
        }
    }

    fn outline() -> PlanOutline {
        PlanOutline {
            plan: "Two-step build".to_string(),
            suggested_tasks: vec![
                SuggestedTask {
                    title: "Scaffold".to_string(),
                    description: Some("Set up the skeleton".to_string()),
                    dependencies: vec![],
                    priority: Some(1),
                },
                SuggestedTask {
                    title: "Feature".to_string(),
                    description: None,
                    dependencies: vec!["Scaffold".to_string()],
                    priority: Some(3),
                },
            ],
        }
    }

    fn project(dir: &TempDir) -> Project {
        let mut project = Project::new("demo", "Demo", dir.path());
        project.project_overview = Some("A demo site".to_string());
        project.initial_prompt = Some("Build a landing page".to_string());
        project
    }

    #[tokio::test]
    async fn test_plan_appends_tasks_with_dependencies() {
        let dir = TempDir::new().unwrap();
        let project = project(&dir);
        let task_store = TaskStore::for_project(&project);
        let bus = Arc::new(EventBus::default());
        let mut events = bus.subscribe();

        let service = PlannerService::new(
            Arc::new(FixedPlanner {
                outline: outline(),
                delay: Duration::ZERO,
            }),
            bus,
            120,
        );

        let (result, created) = service.generate_plan(&project, &task_store).await.unwrap();
        assert_eq!(created, 2);
        assert_eq!(result.plan, "Two-step build");

        let tasks = task_store.list().await.unwrap();
        assert_eq!(tasks.len(), 2);
        let feature = tasks.iter().find(|t| t.title == "Feature").unwrap();
        let scaffold = tasks.iter().find(|t| t.title == "Scaffold").unwrap();
        assert_eq!(feature.dependencies, vec![scaffold.id.clone()]);

        let event = events.recv().await.unwrap();
        assert_eq!(event.payload.variant_name(), "plan_generated");
    }

    #[tokio::test]
    async fn test_timeout_surfaces_typed_error() {
        let dir = TempDir::new().unwrap();
        let project = project(&dir);
        let task_store = TaskStore::for_project(&project);

        let service = PlannerService::new(
            Arc::new(FixedPlanner {
                outline: outline(),
                delay: Duration::from_secs(5),
            }),
            Arc::new(EventBus::default()),
            0,
        );

        let err = service.generate_plan(&project, &task_store).await.unwrap_err();
        assert!(matches!(err, DomainError::PlanTimeout(0)));
    }

    #[tokio::test]
    async fn test_missing_overview_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut project = project(&dir);
        project.project_overview = None;
        let task_store = TaskStore::for_project(&project);

        let service = PlannerService::new(
            Arc::new(FixedPlanner {
                outline: outline(),
                delay: Duration::ZERO,
            }),
            Arc::new(EventBus::default()),
            120,
        );

        let err = service.generate_plan(&project, &task_store).await.unwrap_err();
        assert!(matches!(err, DomainError::ValidationFailed(_)));
    }
}
