//! Template adoption tracking.
//!
//! [`TemplateAdoptionTracker`] loads the template catalog and the target scope
//! once, then on each [`track`](TemplateAdoptionTracker::track) resolves every
//! pipeline, rolls compliance up the hierarchy and collects usage metrics.

mod catalog;
mod hierarchy;
mod metrics;
mod processor;
mod resolver;

use std::collections::HashMap;
use std::time::Instant;

use futures::future::try_join_all;
use log::{debug, info, warn};

use crate::error::{Result, TrackerError};
use crate::models::{
    normalize_branch, AdoptionMetrics, AdoptionResult, AdoptionTarget, ComplianceMode, Pipeline,
    Project, Repository, TargetScope, TemplateSource,
};
use crate::output::{Phase, PhaseProgress};
use crate::providers::{DevOpsApi, TemplateScanner};

use hierarchy::{build_hierarchy, ScopeEntities};
use resolver::ReferenceResolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Uninitialized,
    Initialized,
    Complete,
}

/// Scope data as loaded during setup. Never mutated afterwards.
#[derive(Debug)]
struct LoadedScope {
    source_default_branch: String,
    project_names: HashMap<String, String>,
    projects: Vec<Project>,
    repositories: Vec<Repository>,
    pipelines: Vec<Pipeline>,
}

pub struct TemplateAdoptionTracker<'a, C, S>
where
    C: DevOpsApi,
    S: TemplateScanner,
{
    client: &'a C,
    scanner: &'a S,
    source: TemplateSource,
    target: AdoptionTarget,
    compliance_mode: ComplianceMode,
    show_progress: bool,
    state: TrackerState,
    scope: Option<LoadedScope>,
}

impl<'a, C, S> TemplateAdoptionTracker<'a, C, S>
where
    C: DevOpsApi,
    S: TemplateScanner,
{
    pub fn new(
        client: &'a C,
        scanner: &'a S,
        source: TemplateSource,
        target: AdoptionTarget,
        compliance_mode: ComplianceMode,
    ) -> Self {
        Self {
            client,
            scanner,
            source,
            target,
            compliance_mode,
            show_progress: true,
            state: TrackerState::Uninitialized,
            scope: None,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    /// The template source, with its catalog once set up.
    pub fn source(&self) -> &TemplateSource {
        &self.source
    }

    pub fn target(&self) -> &AdoptionTarget {
        &self.target
    }

    pub fn compliance_mode(&self) -> ComplianceMode {
        self.compliance_mode
    }

    /// Resolves the catalog and loads the target scope. Does nothing once initialized.
    ///
    /// # Errors
    ///
    /// `Initialization` when loading fails or the scope does not hold exactly
    /// the entities it names. Authentication failures are passed through.
    pub async fn setup(&mut self) -> Result<()> {
        if self.state != TrackerState::Uninitialized {
            return Ok(());
        }

        let progress = PhaseProgress::start(Phase::Loading, self.show_progress);
        match self.load().await {
            Ok(scope) => {
                progress.finish(&format!(
                    "Loaded {} templates and {} pipelines",
                    self.source.resolved_templates.len(),
                    scope.pipelines.len()
                ));
                self.scope = Some(scope);
                self.state = TrackerState::Initialized;
                Ok(())
            }
            Err(e) => {
                progress.abandon();
                warn!("tracker: failed to initialize: {e}");
                Err(into_initialization(e))
            }
        }
    }

    async fn load(&mut self) -> Result<LoadedScope> {
        let client = self.client;
        let source = &self.source;
        let (source_repository, catalog) = tokio::try_join!(
            client.get_repository(&source.project, &source.repository),
            catalog::resolve_catalog(self.scanner, source),
        )?;
        let source_default_branch =
            normalize_branch(&source_repository.default_branch).to_string();

        if catalog.is_empty() {
            warn!(
                "tracker: no templates found in {}/{}@{}",
                source.project, source.repository, source.branch
            );
        } else {
            info!("tracker: found {} templates in source repository", catalog.len());
        }
        self.source.resolved_templates = catalog;

        let scope = self.target.scope();
        let (projects, mut repositories, mut pipelines) = match scope {
            TargetScope::Organization => {
                let projects = client.list_projects().await?;
                let loaded = try_join_all(projects.iter().map(|project| async move {
                    tokio::try_join!(
                        client.list_pipelines(&project.name),
                        client.list_repositories(&project.name),
                    )
                }))
                .await?;

                let (pipelines, repositories): (Vec<_>, Vec<_>) = loaded.into_iter().unzip();
                (
                    projects,
                    repositories.into_iter().flatten().collect(),
                    pipelines.into_iter().flatten().collect(),
                )
            }
            TargetScope::Project => {
                let project_name = self.target_project()?;
                let (project, pipelines, repositories) = tokio::try_join!(
                    client.get_project(project_name),
                    client.list_pipelines(project_name),
                    client.list_repositories(project_name),
                )?;
                (vec![project], repositories, pipelines)
            }
            TargetScope::Repository => {
                let project_name = self.target_project()?;
                let repository_name = self.target.repository.as_deref().unwrap_or_default();
                let (repository, pipelines) = tokio::try_join!(
                    client.get_repository(project_name, repository_name),
                    client.list_pipelines(project_name),
                )?;

                if repository.id == source_repository.id {
                    return Err(TrackerError::Initialization(
                        "target repository cannot be the same as source repository".into(),
                    ));
                }

                let pipelines = pipelines
                    .into_iter()
                    .filter(|p| p.repository_id.as_deref() == Some(repository.id.as_str()))
                    .collect();
                (Vec::new(), vec![repository], pipelines)
            }
            TargetScope::Pipeline => {
                let project_name = self.target_project()?;
                let pipeline_id = self.target.pipeline_id.unwrap_or_default();
                let pipeline = client.get_pipeline_by_id(project_name, pipeline_id).await?;
                (Vec::new(), Vec::new(), vec![pipeline])
            }
        };

        repositories.retain(|r| r.id != source_repository.id);

        let loaded = pipelines.len();
        pipelines.retain(|p| {
            if !p.has_content() {
                debug!("tracker: skipping pipeline '{}' without content", p.name);
            }
            p.has_content()
        });
        info!(
            "tracker: loaded {} projects, {} repositories, {} of {loaded} pipelines with content",
            projects.len(),
            repositories.len(),
            pipelines.len()
        );

        validate_scope(scope, &self.target, &projects, &repositories, &pipelines)?;

        let project_names = projects
            .iter()
            .map(|p| (p.id.clone(), p.name.clone()))
            .collect();

        Ok(LoadedScope {
            source_default_branch,
            project_names,
            projects,
            repositories,
            pipelines,
        })
    }

    fn target_project(&self) -> Result<&str> {
        self.target.project.as_deref().ok_or_else(|| {
            TrackerError::TargetConfiguration(format!(
                "{} scope requires a project",
                self.target.scope()
            ))
        })
    }

    /// Runs a full tracking pass over the loaded scope.
    ///
    /// Each call starts from the loaded entities, so repeated calls yield the
    /// same result.
    ///
    /// # Errors
    ///
    /// Only the errors of [`setup`](Self::setup); pipeline level problems never fail a run.
    pub async fn track(&mut self) -> Result<(AdoptionResult, AdoptionMetrics)> {
        self.setup().await?;
        let Some(scope) = &self.scope else {
            return Err(TrackerError::Initialization(
                "tracker has no loaded scope".into(),
            ));
        };

        let started = Instant::now();
        let progress = PhaseProgress::start(Phase::Processing, self.show_progress);

        let mut pipelines = scope.pipelines.clone();
        let resolver = ReferenceResolver::new(
            &self.source,
            &scope.source_default_branch,
            &scope.project_names,
            self.target.project.as_deref(),
        );
        processor::process_pipelines(&resolver, &mut pipelines).await;

        let adopted = pipelines.iter().filter(|p| p.is_compliant()).count();
        progress.finish(&format!(
            "Processed {} pipelines, {adopted} adopting",
            pipelines.len()
        ));

        let progress = PhaseProgress::start(Phase::Reporting, self.show_progress);
        let entities = ScopeEntities {
            projects: scope.projects.clone(),
            repositories: scope.repositories.clone(),
            pipelines,
        };
        let result = build_hierarchy(
            self.target.scope(),
            &self.target.organization,
            self.compliance_mode,
            entities,
        )?;
        let processing_time = started.elapsed().as_secs_f64();

        let mut metrics = metrics::collect_metrics(&result, &self.target, self.compliance_mode);
        metrics.processing_time = processing_time;
        progress.finish(&format!(
            "{} '{}' is {}",
            result.scope(),
            result.name(),
            if result.is_compliant(self.compliance_mode) {
                "compliant"
            } else {
                "not compliant"
            }
        ));

        self.state = TrackerState::Complete;
        Ok((result, metrics))
    }
}

fn validate_scope(
    scope: TargetScope,
    target: &AdoptionTarget,
    projects: &[Project],
    repositories: &[Repository],
    pipelines: &[Pipeline],
) -> Result<()> {
    let fail = |message: String| Err(TrackerError::Initialization(message));
    match scope {
        TargetScope::Organization => Ok(()),
        TargetScope::Project if projects.len() != 1 => fail(format!(
            "expected exactly one project for project scope, found {}",
            projects.len()
        )),
        TargetScope::Repository if repositories.len() != 1 => fail(format!(
            "expected exactly one repository for repository scope, found {}",
            repositories.len()
        )),
        TargetScope::Pipeline if pipelines.is_empty() => fail(format!(
            "pipeline {} has no YAML content to analyze",
            target.pipeline_id.unwrap_or_default()
        )),
        TargetScope::Pipeline if pipelines.len() != 1 => fail(format!(
            "expected exactly one pipeline for pipeline scope, found {}",
            pipelines.len()
        )),
        TargetScope::Project | TargetScope::Repository | TargetScope::Pipeline => Ok(()),
    }
}

fn into_initialization(error: TrackerError) -> TrackerError {
    match error {
        e @ (TrackerError::Initialization(_) | TrackerError::Authentication) => e,
        e if e.is_configuration() => e,
        e => TrackerError::Initialization(e.to_string()),
    }
}
