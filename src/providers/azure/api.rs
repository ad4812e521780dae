use async_trait::async_trait;

use crate::error::Result;
use crate::models::{normalize_branch, Pipeline, Project, Repository, TemplateSource};

/// Read access to the Azure DevOps organization being tracked.
///
/// Implementations return freshly constructed entities; the tracker takes
/// ownership of everything they hand back.
#[async_trait]
pub trait DevOpsApi: Send + Sync {
    async fn list_projects(&self) -> Result<Vec<Project>>;

    async fn get_project(&self, project: &str) -> Result<Project>;

    /// Lists the usable (non-disabled) repositories of `project`.
    async fn list_repositories(&self, project: &str) -> Result<Vec<Repository>>;

    async fn get_repository(&self, project: &str, repository: &str) -> Result<Repository>;

    /// Lists the pipelines of `project` with their YAML content populated
    /// whenever a definition path exists.
    async fn list_pipelines(&self, project: &str) -> Result<Vec<Pipeline>>;

    async fn get_pipeline_by_id(&self, project: &str, pipeline_id: u64) -> Result<Pipeline>;

    /// Default branch name of a repository, without the `refs/heads/` prefix.
    async fn get_default_branch(&self, project: &str, repository: &str) -> Result<String> {
        let repository = self.get_repository(project, repository).await?;
        Ok(normalize_branch(&repository.default_branch).to_string())
    }
}

/// Finds candidate template files in the source repository.
#[async_trait]
pub trait TemplateScanner: Send + Sync {
    /// Returns `(path, content)` for every YAML file below the configured
    /// directories, or the whole repository when none are configured.
    async fn scan(&self, source: &TemplateSource) -> Result<Vec<(String, String)>>;
}
