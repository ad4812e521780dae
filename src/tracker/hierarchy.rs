use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use crate::error::{Result, TrackerError};
use crate::models::{
    AdoptionResult, ComplianceMode, Organization, Pipeline, Project, Repository, TargetScope,
};

/// Compliant/non-compliant split of one kind of child entity.
#[derive(Debug)]
struct Tally<T> {
    total: usize,
    compliant: Vec<Arc<T>>,
    non_compliant: Vec<Arc<T>>,
}

impl<T> Default for Tally<T> {
    fn default() -> Self {
        Self {
            total: 0,
            compliant: Vec::new(),
            non_compliant: Vec::new(),
        }
    }
}

impl<T> Tally<T> {
    fn add(&mut self, item: Arc<T>, compliant: bool) {
        self.total += 1;
        if compliant {
            self.compliant.push(item);
        } else {
            self.non_compliant.push(item);
        }
    }
}

/// Everything loaded for the tracked scope, with pipelines already processed.
#[derive(Debug, Default)]
pub struct ScopeEntities {
    pub projects: Vec<Project>,
    pub repositories: Vec<Repository>,
    pub pipelines: Vec<Pipeline>,
}

/// Rolls pipeline adoption up into the result object for `scope`.
///
/// Entities are linked through id-indexed tables in a single pass over each
/// level, then frozen bottom-up so parents share their children.
pub fn build_hierarchy(
    scope: TargetScope,
    organization: &str,
    mode: ComplianceMode,
    entities: ScopeEntities,
) -> Result<AdoptionResult> {
    let ScopeEntities {
        projects,
        repositories,
        pipelines,
    } = entities;

    match scope {
        TargetScope::Pipeline => {
            let pipeline = single(pipelines, "pipeline")?;
            Ok(AdoptionResult::Pipeline(Arc::new(pipeline)))
        }
        TargetScope::Repository => {
            let mut repository = single(repositories, "repository")?;
            let mut tally = Tally::default();
            for pipeline in pipelines {
                let compliant = pipeline.is_compliant();
                tally.add(Arc::new(pipeline), compliant);
            }
            assign_pipelines(&mut repository, tally);
            Ok(AdoptionResult::Repository(Arc::new(repository)))
        }
        TargetScope::Project => {
            let project = single(projects, "project")?;
            let mut rollup = Rollup::new(mode, vec![project], repositories, pipelines, true);
            let project = rollup.projects.pop().ok_or_else(|| {
                TrackerError::Initialization("project disappeared during roll-up".into())
            })?;
            Ok(AdoptionResult::Project(project))
        }
        TargetScope::Organization => {
            let rollup = Rollup::new(mode, projects, repositories, pipelines, false);
            let mut org = Organization::new(organization);
            org.total_project_count = rollup.project_tally.total;
            org.compliant_projects = rollup.project_tally.compliant;
            org.non_compliant_projects = rollup.project_tally.non_compliant;
            org.total_repository_count = rollup.repository_tally.total;
            org.compliant_repositories = rollup.repository_tally.compliant;
            org.non_compliant_repositories = rollup.repository_tally.non_compliant;
            org.total_pipeline_count = rollup.pipeline_tally.total;
            org.compliant_pipelines = rollup.pipeline_tally.compliant;
            org.non_compliant_pipelines = rollup.pipeline_tally.non_compliant;
            debug!(
                "hierarchy: organization '{organization}' has {} projects, {} repositories, {} pipelines",
                org.total_project_count, org.total_repository_count, org.total_pipeline_count
            );
            Ok(AdoptionResult::Organization(org))
        }
    }
}

/// Frozen projects plus organization-wide tallies.
struct Rollup {
    projects: Vec<Arc<Project>>,
    project_tally: Tally<Project>,
    repository_tally: Tally<Repository>,
    pipeline_tally: Tally<Pipeline>,
}

impl Rollup {
    /// With `single_project`, every repository and pipeline belongs to the
    /// only project regardless of the project id it carries.
    fn new(
        mode: ComplianceMode,
        projects: Vec<Project>,
        repositories: Vec<Repository>,
        pipelines: Vec<Pipeline>,
        single_project: bool,
    ) -> Self {
        let only_project = if single_project {
            projects.first().map(|p| p.id.clone())
        } else {
            None
        };
        let project_key = |project_id: Option<&str>| -> Option<String> {
            if single_project {
                only_project.clone()
            } else {
                project_id.map(str::to_string)
            }
        };

        let mut pipelines_by_repository: HashMap<String, Tally<Pipeline>> = repositories
            .iter()
            .map(|r| (r.id.clone(), Tally::default()))
            .collect();
        let mut pipelines_by_project: HashMap<String, Tally<Pipeline>> = HashMap::new();
        let mut repositories_by_project: HashMap<String, Tally<Repository>> = HashMap::new();
        let mut pipeline_tally = Tally::default();
        let mut repository_tally = Tally::default();
        let mut project_tally = Tally::default();

        for pipeline in pipelines {
            let compliant = pipeline.is_compliant();
            let repository_id = pipeline.repository_id.clone();
            let project_id = project_key(pipeline.project_id.as_deref());
            let pipeline = Arc::new(pipeline);

            // Pipelines of the excluded source repository only count at project level.
            if let Some(tally) = repository_id
                .as_ref()
                .and_then(|id| pipelines_by_repository.get_mut(id))
            {
                tally.add(Arc::clone(&pipeline), compliant);
            }
            if let Some(project_id) = project_id {
                pipelines_by_project
                    .entry(project_id)
                    .or_default()
                    .add(Arc::clone(&pipeline), compliant);
            }
            pipeline_tally.add(pipeline, compliant);
        }

        for mut repository in repositories {
            if let Some(tally) = pipelines_by_repository.remove(&repository.id) {
                assign_pipelines(&mut repository, tally);
            }
            let compliant = repository.is_compliant(mode);
            let project_id = project_key(repository.project_id.as_deref());
            let repository = Arc::new(repository);

            if let Some(project_id) = project_id {
                repositories_by_project
                    .entry(project_id)
                    .or_default()
                    .add(Arc::clone(&repository), compliant);
            }
            repository_tally.add(repository, compliant);
        }

        let mut frozen = Vec::with_capacity(projects.len());
        for mut project in projects {
            if let Some(tally) = repositories_by_project.remove(&project.id) {
                project.total_repository_count = tally.total;
                project.compliant_repositories = tally.compliant;
                project.non_compliant_repositories = tally.non_compliant;
            }
            if let Some(tally) = pipelines_by_project.remove(&project.id) {
                project.total_pipeline_count = tally.total;
                project.compliant_pipelines = tally.compliant;
                project.non_compliant_pipelines = tally.non_compliant;
            }
            let compliant = project.is_compliant(mode);
            let project = Arc::new(project);
            frozen.push(Arc::clone(&project));
            project_tally.add(project, compliant);
        }

        Self {
            projects: frozen,
            project_tally,
            repository_tally,
            pipeline_tally,
        }
    }
}

fn assign_pipelines(repository: &mut Repository, tally: Tally<Pipeline>) {
    repository.total_pipeline_count = tally.total;
    repository.compliant_pipelines = tally.compliant;
    repository.non_compliant_pipelines = tally.non_compliant;
}

fn single<T>(items: Vec<T>, kind: &str) -> Result<T> {
    let count = items.len();
    let mut items = items.into_iter();
    match (items.next(), count) {
        (Some(item), 1) => Ok(item),
        _ => Err(TrackerError::Initialization(format!(
            "expected exactly one {kind}, found {count}"
        ))),
    }
}
