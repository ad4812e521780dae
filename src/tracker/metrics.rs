use std::collections::HashMap;
use std::sync::Arc;

use crate::models::{AdoptionMetrics, AdoptionResult, AdoptionTarget, ComplianceMode, Pipeline};

/// Names of the entities reachable from the result, by id.
#[derive(Default)]
struct Names<'r> {
    projects: HashMap<&'r str, &'r str>,
    repositories: HashMap<&'r str, &'r str>,
}

/// Derives template usage and coverage from the tracked subtree only.
pub fn collect_metrics(
    result: &AdoptionResult,
    target: &AdoptionTarget,
    mode: ComplianceMode,
) -> AdoptionMetrics {
    let mut metrics = AdoptionMetrics::new(target.clone(), mode);
    let mut names = Names::default();

    let pipelines: &[Arc<Pipeline>] = match result {
        AdoptionResult::Pipeline(pipeline) => {
            record(&mut metrics, &names, pipeline);
            return metrics;
        }
        AdoptionResult::Repository(repository) => {
            names.repositories.insert(&repository.id, &repository.name);
            &repository.compliant_pipelines
        }
        AdoptionResult::Project(project) => {
            names.projects.insert(&project.id, &project.name);
            for repository in project.repositories() {
                names.repositories.insert(&repository.id, &repository.name);
            }
            &project.compliant_pipelines
        }
        AdoptionResult::Organization(org) => {
            for project in org.projects() {
                names.projects.insert(&project.id, &project.name);
            }
            for repository in org
                .compliant_repositories
                .iter()
                .chain(&org.non_compliant_repositories)
            {
                names.repositories.insert(&repository.id, &repository.name);
            }
            &org.compliant_pipelines
        }
    };

    for pipeline in pipelines {
        record(&mut metrics, &names, pipeline);
    }
    metrics
}

fn record(metrics: &mut AdoptionMetrics, names: &Names<'_>, pipeline: &Pipeline) {
    let Some(adoption) = &pipeline.adoption else {
        return;
    };

    let project = pipeline
        .project_id
        .as_deref()
        .and_then(|id| names.projects.get(id).copied());
    // The source repository is not part of the hierarchy and has no name here.
    let repository = pipeline
        .repository_id
        .as_deref()
        .and_then(|id| names.repositories.get(id).copied());

    for template in &adoption.templates {
        metrics.add_template_usage(&template.path, project, repository, Some(&pipeline.name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Adoption, Organization, Project, Repository, Template};

    fn pipeline(id: u64, repository_id: &str, templates: &[&str]) -> Arc<Pipeline> {
        let templates: Vec<Template> = templates
            .iter()
            .map(|p| Template::new(p, "tpl", "Lib"))
            .collect();
        Arc::new(Pipeline {
            id,
            name: format!("pipeline-{id}"),
            folder: String::new(),
            definition_path: None,
            project_id: Some("p-app".into()),
            repository_id: Some(repository_id.into()),
            content: None,
            adoption: (!templates.is_empty()).then(|| Adoption::include(templates)),
        })
    }

    fn target() -> AdoptionTarget {
        AdoptionTarget::new("Contoso", Some("App".into()), None, None).unwrap()
    }

    #[test]
    fn test_pipeline_scope_counts_every_occurrence() {
        let result = AdoptionResult::Pipeline(pipeline(1, "r-web", &["build.yaml", "build.yaml"]));
        let metrics = collect_metrics(&result, &target(), ComplianceMode::Any);

        assert_eq!(metrics.template_usage_count("build.yaml"), 2);
        assert_eq!(metrics.template_pipeline_count("build.yaml"), 1);
        assert_eq!(metrics.template_repository_count("build.yaml"), 0);
    }

    #[test]
    fn test_project_scope_coverage() {
        let mut web = Repository::new("r-web", "web", "main", Some("p-app"));
        web.total_pipeline_count = 2;
        web.compliant_pipelines = vec![
            pipeline(1, "r-web", &["build.yaml", "test.yaml"]),
            pipeline(2, "r-web", &["build.yaml"]),
        ];
        let mut project = Project::new("p-app", "App");
        project.total_repository_count = 1;
        project.total_pipeline_count = 3;
        project.compliant_pipelines = web.compliant_pipelines.clone();
        project
            .compliant_pipelines
            .push(pipeline(3, "r-source", &["build.yaml"]));
        project.compliant_repositories = vec![Arc::new(web)];

        let result = AdoptionResult::Project(Arc::new(project));
        let metrics = collect_metrics(&result, &target(), ComplianceMode::Any);

        assert_eq!(metrics.template_usage_count("build.yaml"), 3);
        assert_eq!(metrics.template_usage_count("test.yaml"), 1);
        assert_eq!(metrics.template_project_count("build.yaml"), 1);
        assert_eq!(metrics.template_repository_count("build.yaml"), 1);
        assert_eq!(metrics.template_pipeline_count("build.yaml"), 3);
        assert_eq!(metrics.templates_by_usage()[0], ("build.yaml", 3));
    }

    #[test]
    fn test_organization_without_adoption() {
        let mut org = Organization::new("Contoso");
        org.total_pipeline_count = 1;
        org.non_compliant_pipelines = vec![pipeline(1, "r-web", &[])];

        let result = AdoptionResult::Organization(org);
        let metrics = collect_metrics(&result, &target(), ComplianceMode::All);

        assert!(metrics.template_usage.is_empty());
        assert_eq!(metrics.compliance_mode, ComplianceMode::All);
    }
}
