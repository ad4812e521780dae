use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};

/// File extensions accepted for template files.
pub const VALID_EXTENSIONS: [&str; 2] = [".yml", ".yaml"];

/// Directory list meaning "scan the whole repository".
pub const ROOT_DIRECTORY: &str = "/";

/// The template catalog to measure adoption of.
///
/// Either a single explicit template path, or every template-shaped YAML file
/// found below `directories` in `repository` at `branch`. The resolved catalog
/// is filled in once per run by the catalog resolver and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSource {
    pub project: String,
    pub repository: String,
    pub branch: String,
    pub template_path: Option<String>,
    pub directories: Vec<String>,
    #[serde(default)]
    pub resolved_templates: BTreeSet<String>,
}

impl TemplateSource {
    /// Creates a validated template source.
    ///
    /// An empty `directories` list means the whole repository.
    ///
    /// # Errors
    ///
    /// - `SourceConfiguration` if the project or repository is blank, or if an
    ///   explicit template path is combined with directory filters
    /// - `InvalidTemplatePath` if the explicit path is not a YAML file
    pub fn new(
        project: impl Into<String>,
        repository: impl Into<String>,
        branch: impl Into<String>,
        template_path: Option<String>,
        directories: Vec<String>,
    ) -> Result<Self> {
        let project = project.into();
        let repository = repository.into();

        if repository.trim().is_empty() {
            return Err(TrackerError::SourceConfiguration(
                "source repository must not be empty".into(),
            ));
        }
        if project.trim().is_empty() {
            return Err(TrackerError::SourceConfiguration(
                "source project must not be empty".into(),
            ));
        }

        let directories = if directories.is_empty() {
            vec![ROOT_DIRECTORY.to_string()]
        } else {
            directories
        };
        let template_path = template_path.filter(|p| !p.trim().is_empty());

        if let Some(path) = &template_path {
            if directories.iter().any(|d| d != ROOT_DIRECTORY) {
                return Err(TrackerError::SourceConfiguration(
                    "cannot specify both a template path and directories".into(),
                ));
            }
            if !is_valid_template_path(path) {
                return Err(TrackerError::InvalidTemplatePath { path: path.clone() });
            }
        }

        Ok(Self {
            project,
            repository,
            branch: normalize_branch(&branch.into()).to_string(),
            template_path: template_path.map(|p| normalize_path(&p).to_string()),
            directories,
            resolved_templates: BTreeSet::new(),
        })
    }

    /// Whether the scan covers the whole repository rather than selected directories.
    pub fn scans_whole_repository(&self) -> bool {
        self.directories
            .iter()
            .all(|d| d.trim_matches('/').is_empty())
    }

    /// Whether `path` belongs to the resolved catalog.
    pub fn contains(&self, path: &str) -> bool {
        self.resolved_templates.contains(normalize_path(path))
    }
}

pub fn is_valid_template_path(path: &str) -> bool {
    VALID_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Strips the `refs/heads/` prefix from a branch reference.
pub fn normalize_branch(branch: &str) -> &str {
    branch.strip_prefix("refs/heads/").unwrap_or(branch)
}

/// Repository paths are compared without their leading slash.
pub fn normalize_path(path: &str) -> &str {
    path.trim_start_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_whole_repository() {
        let source = TemplateSource::new("Lib", "tpl", "main", None, vec![]).unwrap();
        assert_eq!(source.directories, vec!["/".to_string()]);
        assert!(source.scans_whole_repository());
        assert!(source.resolved_templates.is_empty());
    }

    #[test]
    fn test_directories_are_kept() {
        let source = TemplateSource::new(
            "Lib",
            "tpl",
            "main",
            None,
            vec!["/build".into(), "deploy/".into()],
        )
        .unwrap();
        assert!(!source.scans_whole_repository());
    }

    #[test]
    fn test_blank_repository_is_rejected() {
        let err = TemplateSource::new("Lib", " ", "main", None, vec![]).unwrap_err();
        assert!(matches!(err, TrackerError::SourceConfiguration(_)));
    }

    #[test]
    fn test_template_path_and_directories_are_exclusive() {
        let err = TemplateSource::new(
            "Lib",
            "tpl",
            "main",
            Some("templates/build.yaml".into()),
            vec!["/templates".into()],
        )
        .unwrap_err();
        assert!(matches!(err, TrackerError::SourceConfiguration(_)));
    }

    #[test]
    fn test_template_path_needs_yaml_extension() {
        let err = TemplateSource::new("Lib", "tpl", "main", Some("build.json".into()), vec![])
            .unwrap_err();
        assert!(matches!(err, TrackerError::InvalidTemplatePath { .. }));

        let source =
            TemplateSource::new("Lib", "tpl", "main", Some("/build.yml".into()), vec![]).unwrap();
        assert_eq!(source.template_path.as_deref(), Some("build.yml"));
    }

    #[test]
    fn test_branch_is_normalized() {
        let source = TemplateSource::new("Lib", "tpl", "refs/heads/release", None, vec![]).unwrap();
        assert_eq!(source.branch, "release");
    }

    #[test]
    fn test_contains_ignores_leading_slash() {
        let mut source = TemplateSource::new("Lib", "tpl", "main", None, vec![]).unwrap();
        source
            .resolved_templates
            .insert("templates/steps/build.yaml".into());
        assert!(source.contains("templates/steps/build.yaml"));
        assert!(source.contains("/templates/steps/build.yaml"));
        assert!(!source.contains("templates/steps/test.yaml"));
    }
}
