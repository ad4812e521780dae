use serde::Deserialize;

use crate::models::{normalize_branch, Pipeline, Project, Repository};

/// Envelope used by every Azure DevOps list endpoint.
#[derive(Debug, Deserialize)]
pub struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub struct ProjectResponse {
    pub id: String,
    pub name: String,
}

impl From<ProjectResponse> for Project {
    fn from(response: ProjectResponse) -> Self {
        Project::new(&response.id, &response.name)
    }
}

#[derive(Debug, Deserialize)]
pub struct ProjectReference {
    pub id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryResponse {
    pub id: String,
    pub name: String,
    /// Absent for empty repositories.
    pub default_branch: Option<String>,
    pub project: Option<ProjectReference>,
    #[serde(default)]
    pub is_disabled: bool,
}

impl From<RepositoryResponse> for Repository {
    fn from(response: RepositoryResponse) -> Self {
        let default_branch = response
            .default_branch
            .as_deref()
            .map(normalize_branch)
            .unwrap_or_default();
        Repository::new(
            &response.id,
            &response.name,
            default_branch,
            response.project.as_ref().map(|p| p.id.as_str()),
        )
    }
}

/// Entry of the pipeline listing; details are fetched separately.
#[derive(Debug, Deserialize)]
pub struct PipelineReference {
    pub id: u64,
}

#[derive(Debug, Deserialize)]
pub struct PipelineResponse {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub folder: String,
    pub configuration: Option<PipelineConfiguration>,
}

#[derive(Debug, Deserialize)]
pub struct PipelineConfiguration {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub path: Option<String>,
    pub repository: Option<ConfigurationRepository>,
}

#[derive(Debug, Deserialize)]
pub struct ConfigurationRepository {
    pub id: String,
}

impl PipelineResponse {
    /// Definition path and repository id, when the pipeline is YAML based.
    pub fn yaml_definition(&self) -> Option<(&str, &str)> {
        let configuration = self.configuration.as_ref()?;
        if configuration.kind.as_deref().is_some_and(|kind| kind != "yaml") {
            return None;
        }
        let path = configuration.path.as_deref().filter(|p| !p.is_empty())?;
        let repository = configuration.repository.as_ref()?;
        Some((path, repository.id.as_str()))
    }

    pub fn into_pipeline(
        self,
        project_id: Option<String>,
        content: Option<String>,
    ) -> Pipeline {
        let definition_path = self.yaml_definition().map(|(path, _)| path.to_string());
        let repository_id = self
            .configuration
            .as_ref()
            .and_then(|c| c.repository.as_ref())
            .map(|r| r.id.clone());

        Pipeline {
            id: self.id,
            name: self.name,
            folder: self.folder.trim_start_matches('\\').to_string(),
            definition_path,
            project_id,
            repository_id,
            content,
            adoption: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemResponse {
    pub path: String,
    #[serde(default)]
    pub is_folder: bool,
    pub content: Option<String>,
}
