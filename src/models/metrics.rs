use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;

use super::compliance::ComplianceMode;
use super::target::AdoptionTarget;

/// Distinct consumers of a single template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TemplateCoverage {
    pub projects: BTreeSet<String>,
    pub repositories: BTreeSet<String>,
    pub pipelines: BTreeSet<String>,
}

/// Usage volume and coverage breadth of each cataloged template.
#[derive(Debug, Clone, Serialize)]
pub struct AdoptionMetrics {
    pub target: AdoptionTarget,
    pub compliance_mode: ComplianceMode,
    /// References per template path, in first-seen order.
    pub template_usage: IndexMap<String, usize>,
    pub template_coverage: IndexMap<String, TemplateCoverage>,
    /// Seconds spent processing pipelines and building the hierarchy.
    pub processing_time: f64,
    pub collected_at: DateTime<Utc>,
}

impl AdoptionMetrics {
    pub fn new(target: AdoptionTarget, compliance_mode: ComplianceMode) -> Self {
        Self {
            target,
            compliance_mode,
            template_usage: IndexMap::new(),
            template_coverage: IndexMap::new(),
            processing_time: 0.0,
            collected_at: Utc::now(),
        }
    }

    /// Records one reference to `template` and whoever made it.
    pub fn add_template_usage(
        &mut self,
        template: &str,
        project: Option<&str>,
        repository: Option<&str>,
        pipeline: Option<&str>,
    ) {
        *self.template_usage.entry(template.to_string()).or_insert(0) += 1;

        let coverage = self
            .template_coverage
            .entry(template.to_string())
            .or_default();
        if let Some(project) = project {
            coverage.projects.insert(project.to_string());
        }
        if let Some(repository) = repository {
            coverage.repositories.insert(repository.to_string());
        }
        if let Some(pipeline) = pipeline {
            coverage.pipelines.insert(pipeline.to_string());
        }
    }

    pub fn template_usage_count(&self, template: &str) -> usize {
        self.template_usage.get(template).copied().unwrap_or(0)
    }

    pub fn template_project_count(&self, template: &str) -> usize {
        self.template_coverage
            .get(template)
            .map_or(0, |c| c.projects.len())
    }

    pub fn template_repository_count(&self, template: &str) -> usize {
        self.template_coverage
            .get(template)
            .map_or(0, |c| c.repositories.len())
    }

    pub fn template_pipeline_count(&self, template: &str) -> usize {
        self.template_coverage
            .get(template)
            .map_or(0, |c| c.pipelines.len())
    }

    /// Templates sorted by usage (most used first), ties broken by path.
    pub fn templates_by_usage(&self) -> Vec<(&str, usize)> {
        let mut templates: Vec<(&str, usize)> = self
            .template_usage
            .iter()
            .map(|(path, count)| (path.as_str(), *count))
            .collect();
        templates.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        templates
    }

    pub fn total_template_references(&self) -> usize {
        self.template_usage.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> AdoptionMetrics {
        let target = AdoptionTarget::new("Contoso", None, None, None).unwrap();
        AdoptionMetrics::new(target, ComplianceMode::Any)
    }

    #[test]
    fn test_usage_counts_every_reference() {
        let mut metrics = metrics();
        metrics.add_template_usage("build.yaml", None, None, Some("ci"));
        metrics.add_template_usage("build.yaml", None, None, Some("ci"));
        metrics.add_template_usage("deploy.yaml", None, None, Some("cd"));

        assert_eq!(metrics.template_usage_count("build.yaml"), 2);
        assert_eq!(metrics.template_usage_count("deploy.yaml"), 1);
        assert_eq!(metrics.template_usage_count("missing.yaml"), 0);
        assert_eq!(metrics.total_template_references(), 3);
    }

    #[test]
    fn test_coverage_is_distinct() {
        let mut metrics = metrics();
        metrics.add_template_usage("build.yaml", Some("App"), Some("web"), Some("ci"));
        metrics.add_template_usage("build.yaml", Some("App"), Some("web"), Some("ci"));
        metrics.add_template_usage("build.yaml", Some("App"), Some("api"), Some("ci-api"));

        assert_eq!(metrics.template_project_count("build.yaml"), 1);
        assert_eq!(metrics.template_repository_count("build.yaml"), 2);
        assert_eq!(metrics.template_pipeline_count("build.yaml"), 2);
        assert_eq!(metrics.template_pipeline_count("other.yaml"), 0);
    }

    #[test]
    fn test_templates_by_usage_sorts_descending() {
        let mut metrics = metrics();
        metrics.add_template_usage("b.yaml", None, None, None);
        metrics.add_template_usage("a.yaml", None, None, None);
        metrics.add_template_usage("c.yaml", None, None, None);
        metrics.add_template_usage("c.yaml", None, None, None);

        assert_eq!(
            metrics.templates_by_usage(),
            vec![("c.yaml", 2), ("a.yaml", 1), ("b.yaml", 1)]
        );
    }
}
