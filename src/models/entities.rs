use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use super::compliance::ComplianceMode;
use super::target::TargetScope;

/// A reusable pipeline fragment, identified by `(project, repository, path)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Template {
    pub name: String,
    pub path: String,
    pub repository: String,
    pub project: String,
}

impl Template {
    pub fn new(path: &str, repository: &str, project: &str) -> Self {
        let name = path.rsplit('/').next().unwrap_or(path).to_string();
        Self {
            name,
            path: path.to_string(),
            repository: repository.to_string(),
            project: project.to_string(),
        }
    }
}

/// How a pipeline consumes cataloged templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageType {
    /// The whole pipeline inherits from a template (`extends:`).
    Extend,
    /// Template fragments are inserted into stages, jobs or steps.
    Include,
}

impl fmt::Display for UsageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Extend => "extend",
            Self::Include => "include",
        })
    }
}

/// The fact, and style, of a pipeline referencing cataloged templates.
///
/// `Extend` always carries exactly one template. `Include` carries one or more,
/// in discovery order, duplicates included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Adoption {
    pub usage_type: UsageType,
    pub templates: Vec<Template>,
}

impl Adoption {
    pub fn extend(template: Template) -> Self {
        Self {
            usage_type: UsageType::Extend,
            templates: vec![template],
        }
    }

    pub fn include(templates: Vec<Template>) -> Self {
        Self {
            usage_type: UsageType::Include,
            templates,
        }
    }

    /// Templates deduplicated by `(project, repository, path)`, first occurrence kept.
    pub fn unique_templates(&self) -> Vec<&Template> {
        let mut seen = HashSet::new();
        self.templates
            .iter()
            .filter(|t| seen.insert((&t.project, &t.repository, &t.path)))
            .collect()
    }
}

/// A build/deploy pipeline definition.
#[derive(Debug, Clone, Serialize)]
pub struct Pipeline {
    pub id: u64,
    pub name: String,
    pub folder: String,
    pub definition_path: Option<String>,
    pub project_id: Option<String>,
    pub repository_id: Option<String>,
    /// Raw YAML definition fetched from the repository default branch.
    #[serde(skip_serializing)]
    pub content: Option<String>,
    pub adoption: Option<Adoption>,
}

impl Pipeline {
    /// A pipeline is compliant when it adopts at least one cataloged template.
    pub fn is_compliant(&self) -> bool {
        self.adoption.is_some()
    }

    /// Whether the pipeline has a non-blank YAML definition to analyze.
    pub fn has_content(&self) -> bool {
        self.content.as_deref().is_some_and(|c| !c.trim().is_empty())
    }

    /// Folder and name joined the way the Azure DevOps UI shows them.
    pub fn display_path(&self) -> String {
        if self.folder.is_empty() {
            self.name.clone()
        } else {
            format!("{}\\{}", self.folder, self.name)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Repository {
    pub id: String,
    pub name: String,
    pub default_branch: String,
    pub project_id: Option<String>,

    pub total_pipeline_count: usize,
    pub compliant_pipelines: Vec<Arc<Pipeline>>,
    pub non_compliant_pipelines: Vec<Arc<Pipeline>>,
}

impl Repository {
    pub fn new(id: &str, name: &str, default_branch: &str, project_id: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            default_branch: default_branch.to_string(),
            project_id: project_id.map(str::to_string),
            total_pipeline_count: 0,
            compliant_pipelines: Vec::new(),
            non_compliant_pipelines: Vec::new(),
        }
    }

    pub fn is_compliant(&self, mode: ComplianceMode) -> bool {
        mode.is_satisfied(self.compliant_pipelines.len(), self.total_pipeline_count)
    }

    pub fn pipeline_adoption_rate(&self) -> f64 {
        percentage(self.compliant_pipelines.len(), self.total_pipeline_count, 0.0)
    }

    pub fn pipeline_non_compliance_rate(&self) -> f64 {
        percentage(
            self.non_compliant_pipelines.len(),
            self.total_pipeline_count,
            100.0,
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Project {
    pub id: String,
    pub name: String,

    pub total_repository_count: usize,
    pub compliant_repositories: Vec<Arc<Repository>>,
    pub non_compliant_repositories: Vec<Arc<Repository>>,

    pub total_pipeline_count: usize,
    pub compliant_pipelines: Vec<Arc<Pipeline>>,
    pub non_compliant_pipelines: Vec<Arc<Pipeline>>,
}

impl Project {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            total_repository_count: 0,
            compliant_repositories: Vec::new(),
            non_compliant_repositories: Vec::new(),
            total_pipeline_count: 0,
            compliant_pipelines: Vec::new(),
            non_compliant_pipelines: Vec::new(),
        }
    }

    pub fn is_compliant(&self, mode: ComplianceMode) -> bool {
        mode.is_satisfied(
            self.compliant_repositories.len(),
            self.total_repository_count,
        )
    }

    /// All repositories of the project, compliant ones first.
    pub fn repositories(&self) -> impl Iterator<Item = &Arc<Repository>> {
        self.compliant_repositories
            .iter()
            .chain(&self.non_compliant_repositories)
    }

    pub fn repository_adoption_rate(&self) -> f64 {
        percentage(
            self.compliant_repositories.len(),
            self.total_repository_count,
            0.0,
        )
    }

    pub fn repository_non_compliance_rate(&self) -> f64 {
        percentage(
            self.non_compliant_repositories.len(),
            self.total_repository_count,
            100.0,
        )
    }

    pub fn pipeline_adoption_rate(&self) -> f64 {
        percentage(self.compliant_pipelines.len(), self.total_pipeline_count, 0.0)
    }

    pub fn pipeline_non_compliance_rate(&self) -> f64 {
        percentage(
            self.non_compliant_pipelines.len(),
            self.total_pipeline_count,
            100.0,
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Organization {
    pub name: String,

    pub total_project_count: usize,
    pub compliant_projects: Vec<Arc<Project>>,
    pub non_compliant_projects: Vec<Arc<Project>>,

    pub total_repository_count: usize,
    pub compliant_repositories: Vec<Arc<Repository>>,
    pub non_compliant_repositories: Vec<Arc<Repository>>,

    pub total_pipeline_count: usize,
    pub compliant_pipelines: Vec<Arc<Pipeline>>,
    pub non_compliant_pipelines: Vec<Arc<Pipeline>>,
}

impl Organization {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            total_project_count: 0,
            compliant_projects: Vec::new(),
            non_compliant_projects: Vec::new(),
            total_repository_count: 0,
            compliant_repositories: Vec::new(),
            non_compliant_repositories: Vec::new(),
            total_pipeline_count: 0,
            compliant_pipelines: Vec::new(),
            non_compliant_pipelines: Vec::new(),
        }
    }

    pub fn is_compliant(&self, mode: ComplianceMode) -> bool {
        mode.is_satisfied(self.compliant_projects.len(), self.total_project_count)
    }

    /// All projects of the organization, compliant ones first.
    pub fn projects(&self) -> impl Iterator<Item = &Arc<Project>> {
        self.compliant_projects
            .iter()
            .chain(&self.non_compliant_projects)
    }

    pub fn project_adoption_rate(&self) -> f64 {
        percentage(self.compliant_projects.len(), self.total_project_count, 0.0)
    }

    pub fn project_non_compliance_rate(&self) -> f64 {
        percentage(
            self.non_compliant_projects.len(),
            self.total_project_count,
            100.0,
        )
    }

    pub fn repository_adoption_rate(&self) -> f64 {
        percentage(
            self.compliant_repositories.len(),
            self.total_repository_count,
            0.0,
        )
    }

    pub fn repository_non_compliance_rate(&self) -> f64 {
        percentage(
            self.non_compliant_repositories.len(),
            self.total_repository_count,
            100.0,
        )
    }

    pub fn pipeline_adoption_rate(&self) -> f64 {
        percentage(self.compliant_pipelines.len(), self.total_pipeline_count, 0.0)
    }

    pub fn pipeline_non_compliance_rate(&self) -> f64 {
        percentage(
            self.non_compliant_pipelines.len(),
            self.total_pipeline_count,
            100.0,
        )
    }
}

/// Outcome of a tracking run, shaped by the target scope.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "scope", content = "result", rename_all = "lowercase")]
pub enum AdoptionResult {
    Organization(Organization),
    Project(Arc<Project>),
    Repository(Arc<Repository>),
    Pipeline(Arc<Pipeline>),
}

impl AdoptionResult {
    pub fn scope(&self) -> TargetScope {
        match self {
            Self::Organization(_) => TargetScope::Organization,
            Self::Project(_) => TargetScope::Project,
            Self::Repository(_) => TargetScope::Repository,
            Self::Pipeline(_) => TargetScope::Pipeline,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Organization(o) => &o.name,
            Self::Project(p) => &p.name,
            Self::Repository(r) => &r.name,
            Self::Pipeline(p) => &p.name,
        }
    }

    /// Pipelines use the leaf predicate; aggregates use `mode`.
    pub fn is_compliant(&self, mode: ComplianceMode) -> bool {
        match self {
            Self::Organization(o) => o.is_compliant(mode),
            Self::Project(p) => p.is_compliant(mode),
            Self::Repository(r) => r.is_compliant(mode),
            Self::Pipeline(p) => p.is_compliant(),
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn percentage(part: usize, total: usize, when_empty: f64) -> f64 {
    if total == 0 {
        when_empty
    } else {
        (part as f64 / total as f64) * 100.0
    }
}
