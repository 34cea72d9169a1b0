//! Project registry.
//!
//! Projects are registered in a JSON file; adding a project prepares its
//! `.trunkline/` state directory and an empty task file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::Project;

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    projects: Vec<Project>,
}

/// JSON-backed registry of orchestrated projects.
pub struct ProjectRegistry {
    file: PathBuf,
}

impl ProjectRegistry {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self { file: file.into() }
    }

    /// Default location, next to the orchestrator config.
    pub fn default_path() -> PathBuf {
        PathBuf::from(".trunkline/projects.json")
    }

    async fn load(&self) -> DomainResult<RegistryFile> {
        if !self.file.exists() {
            return Ok(RegistryFile::default());
        }
        let content = fs::read_to_string(&self.file).await?;
        Ok(serde_json::from_str(&content)?)
    }

    async fn persist(&self, registry: &RegistryFile) -> DomainResult<()> {
        if let Some(parent) = self.file.parent() {
            fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(registry)?;
        let tmp = self.file.with_extension("json.tmp");
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, &self.file).await?;
        Ok(())
    }

    pub async fn list(&self) -> DomainResult<Vec<Project>> {
        Ok(self.load().await?.projects)
    }

    pub async fn get(&self, project_id: &str) -> DomainResult<Project> {
        self.load()
            .await?
            .projects
            .into_iter()
            .find(|p| p.id == project_id)
            .ok_or_else(|| DomainError::ProjectNotFound(project_id.to_string()))
    }

    /// Register a project, creating its state directory and task file.
    pub async fn add(&self, project: Project) -> DomainResult<Project> {
        let mut registry = self.load().await?;
        if registry.projects.iter().any(|p| p.id == project.id) {
            return Err(DomainError::ValidationFailed(format!(
                "project with id '{}' already exists",
                project.id
            )));
        }
        if !Path::new(&project.path).exists() {
            return Err(DomainError::ValidationFailed(format!(
                "project path '{}' does not exist",
                project.path.display()
            )));
        }

        fs::create_dir_all(project.state_dir()).await?;
        let tasks_file = project.tasks_file();
        if !tasks_file.exists() {
            fs::write(&tasks_file, "# tasks.md\n\n").await?;
        }

        registry.projects.push(project.clone());
        self.persist(&registry).await?;
        info!(project_id = %project.id, "project registered");
        Ok(project)
    }

    pub async fn update<F>(&self, project_id: &str, mutate: F) -> DomainResult<Project>
    where
        F: FnOnce(&mut Project),
    {
        let mut registry = self.load().await?;
        let project = registry
            .projects
            .iter_mut()
            .find(|p| p.id == project_id)
            .ok_or_else(|| DomainError::ProjectNotFound(project_id.to_string()))?;
        mutate(project);
        project.updated_at = chrono::Utc::now();
        let updated = project.clone();
        self.persist(&registry).await?;
        Ok(updated)
    }

    /// Remove a project from the registry; its files are left in place.
    pub async fn remove(&self, project_id: &str) -> DomainResult<()> {
        let mut registry = self.load().await?;
        let before = registry.projects.len();
        registry.projects.retain(|p| p.id != project_id);
        if registry.projects.len() == before {
            return Err(DomainError::ProjectNotFound(project_id.to_string()));
        }
        self.persist(&registry).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn registry(dir: &TempDir) -> ProjectRegistry {
        ProjectRegistry::new(dir.path().join("projects.json"))
    }

    #[tokio::test]
    async fn test_add_creates_state_dir_and_task_file() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);
        let project_root = dir.path().join("repo");
        fs::create_dir_all(&project_root).await.unwrap();

        let project = Project::new("demo", "Demo", &project_root);
        registry.add(project).await.unwrap();

        assert!(project_root.join(".trunkline/tasks.md").exists());
        let loaded = registry.get("demo").await.unwrap();
        assert_eq!(loaded.name, "Demo");
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);
        let project_root = dir.path().join("repo");
        fs::create_dir_all(&project_root).await.unwrap();

        registry
            .add(Project::new("demo", "Demo", &project_root))
            .await
            .unwrap();
        let err = registry
            .add(Project::new("demo", "Other", &project_root))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::ValidationFailed(_)));
    }

    #[tokio::test]
    async fn test_missing_path_rejected() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);
        let err = registry
            .add(Project::new("demo", "Demo", dir.path().join("nope")))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::ValidationFailed(_)));
    }

    #[tokio::test]
    async fn test_update_and_remove() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);
        let project_root = dir.path().join("repo");
        fs::create_dir_all(&project_root).await.unwrap();

        registry
            .add(Project::new("demo", "Demo", &project_root))
            .await
            .unwrap();

        let updated = registry
            .update("demo", |p| p.max_agents = 9)
            .await
            .unwrap();
        assert_eq!(updated.max_agents, 9);

        registry.remove("demo").await.unwrap();
        assert!(matches!(
            registry.get("demo").await.unwrap_err(),
            DomainError::ProjectNotFound(_)
        ));
    }
}
