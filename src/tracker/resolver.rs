//! Detects whether a pipeline definition adopts cataloged templates.
//!
//! A pipeline adopts a template when it declares the source repository as a
//! `resources.repositories` entry at the configured branch and then references
//! a cataloged path through that entry's alias, either as the single
//! `extends.template` or as any number of nested `template:` fields.

use std::collections::HashMap;

use log::{debug, warn};
use serde_yaml::{Mapping, Value};

use crate::error::Result;
use crate::models::{normalize_branch, normalize_path, Adoption, Pipeline, Template, TemplateSource};

const ALIAS_SEPARATOR: char = '@';

/// The `resources.repositories` entry that points at the template source.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SourceReference {
    alias: String,
    project: String,
    repository: String,
}

/// Resolves pipeline content against the template catalog.
///
/// Holds only borrowed, read-only run state and can be shared by any number
/// of concurrent resolutions.
pub struct ReferenceResolver<'a> {
    source: &'a TemplateSource,
    /// Branch assumed for repository entries without an explicit `ref`.
    source_default_branch: &'a str,
    /// Project names by id, for entries whose `name` has no project prefix.
    project_names: &'a HashMap<String, String>,
    fallback_project: Option<&'a str>,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(
        source: &'a TemplateSource,
        source_default_branch: &'a str,
        project_names: &'a HashMap<String, String>,
        fallback_project: Option<&'a str>,
    ) -> Self {
        Self {
            source,
            source_default_branch,
            project_names,
            fallback_project,
        }
    }

    /// Adoption of `pipeline`, if any.
    ///
    /// # Errors
    ///
    /// Only when the content is not valid YAML. Every other shortcoming of the
    /// definition means "no adoption".
    pub fn resolve(&self, pipeline: &Pipeline) -> Result<Option<Adoption>> {
        let Some(content) = pipeline.content.as_deref() else {
            return Ok(None);
        };

        let root: Value = serde_yaml::from_str(content)?;
        let Some(definition) = root.as_mapping() else {
            debug!(
                "resolver: pipeline '{}' definition is not a mapping",
                pipeline.name
            );
            return Ok(None);
        };

        let own_project = pipeline
            .project_id
            .as_ref()
            .and_then(|id| self.project_names.get(id))
            .map(String::as_str)
            .or(self.fallback_project);

        let Some(reference) = self.find_source_reference(definition, &pipeline.name, own_project)
        else {
            debug!(
                "resolver: pipeline '{}' does not reference {}/{}",
                pipeline.name, self.source.project, self.source.repository
            );
            return Ok(None);
        };

        if let Some(extends) = definition.get("extends").and_then(Value::as_mapping) {
            if let Some(candidate) = extends.get("template") {
                return Ok(candidate
                    .as_str()
                    .and_then(|candidate| self.accept(candidate, &reference))
                    .map(Adoption::extend));
            }
        }

        let mut candidates = Vec::new();
        collect_template_references(&root, &mut candidates);

        let templates: Vec<Template> = candidates
            .into_iter()
            .filter_map(|candidate| self.accept(candidate, &reference))
            .collect();

        if templates.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Adoption::include(templates)))
        }
    }

    /// First git entry naming the source repository at the configured branch.
    fn find_source_reference(
        &self,
        definition: &Mapping,
        pipeline_name: &str,
        own_project: Option<&str>,
    ) -> Option<SourceReference> {
        let repositories = definition
            .get("resources")?
            .as_mapping()?
            .get("repositories")?
            .as_sequence()?;

        for entry in repositories.iter().filter_map(Value::as_mapping) {
            if entry.get("type").and_then(Value::as_str) != Some("git") {
                continue;
            }
            let Some(name) = entry.get("name").and_then(Value::as_str).filter(|n| !n.is_empty())
            else {
                continue;
            };

            let (project, repository) = match name.split_once('/') {
                Some((project, repository)) => (project, repository),
                None => (own_project.unwrap_or_default(), name),
            };
            if project != self.source.project || repository != self.source.repository {
                continue;
            }

            let reference = entry
                .get("ref")
                .and_then(Value::as_str)
                .unwrap_or(self.source_default_branch);
            if normalize_branch(reference) != normalize_branch(&self.source.branch) {
                warn!(
                    "resolver: pipeline '{pipeline_name}' references template repository '{name}' \
                     but uses a different branch: {reference} vs {}",
                    self.source.branch
                );
                continue;
            }

            let alias = entry
                .get("repository")
                .and_then(Value::as_str)
                .unwrap_or_default();
            return Some(SourceReference {
                alias: alias.to_string(),
                project: project.to_string(),
                repository: repository.to_string(),
            });
        }

        None
    }

    /// Turns `path@alias` into a template when both parts check out.
    fn accept(&self, candidate: &str, reference: &SourceReference) -> Option<Template> {
        let Some((path, alias)) = candidate.split_once(ALIAS_SEPARATOR) else {
            debug!("resolver: skipping template without repository reference: {candidate}");
            return None;
        };

        if !self.source.contains(path) {
            debug!("resolver: skipping template not found in source: {path}");
            return None;
        }
        if alias != reference.alias {
            warn!("resolver: no repository reference found for alias '{alias}'");
            return None;
        }

        Some(Template::new(
            normalize_path(path),
            &reference.repository,
            &reference.project,
        ))
    }
}

/// Collects every string `template` value that carries an alias, depth first.
fn collect_template_references<'v>(node: &'v Value, found: &mut Vec<&'v str>) {
    match node {
        Value::Mapping(mapping) => {
            if let Some(candidate) = mapping.get("template").and_then(Value::as_str) {
                if candidate.contains(ALIAS_SEPARATOR) {
                    found.push(candidate);
                }
            }
            for value in mapping.values() {
                collect_template_references(value, found);
            }
        }
        Value::Sequence(items) => {
            for item in items {
                collect_template_references(item, found);
            }
        }
        Value::Tagged(tagged) => collect_template_references(&tagged.value, found),
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {}
    }
}
