use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};

/// Granularity at which adoption is measured.
///
/// Never stored: always derived from the identifiers set on an [`AdoptionTarget`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetScope {
    Organization,
    Project,
    Repository,
    Pipeline,
}

impl FromStr for TargetScope {
    type Err = TrackerError;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "organization" => Ok(Self::Organization),
            "project" => Ok(Self::Project),
            "repository" => Ok(Self::Repository),
            "pipeline" => Ok(Self::Pipeline),
            _ => Err(TrackerError::TargetConfiguration(format!(
                "Invalid target scope: {value}. Must be one of: organization, project, repository, pipeline"
            ))),
        }
    }
}

impl fmt::Display for TargetScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Organization => "ORGANIZATION",
            Self::Project => "PROJECT",
            Self::Repository => "REPOSITORY",
            Self::Pipeline => "PIPELINE",
        };
        f.write_str(name)
    }
}

/// Where to look for template adoption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdoptionTarget {
    pub organization: String,
    pub project: Option<String>,
    pub repository: Option<String>,
    pub pipeline_id: Option<u64>,
}

impl AdoptionTarget {
    /// Creates a target, rejecting identifiers that cannot be located.
    ///
    /// # Errors
    ///
    /// Returns `TargetConfiguration` when the organization is blank, or when a
    /// repository or pipeline id is given without the project that owns it.
    pub fn new(
        organization: impl Into<String>,
        project: Option<String>,
        repository: Option<String>,
        pipeline_id: Option<u64>,
    ) -> Result<Self> {
        let organization = organization.into();
        if organization.trim().is_empty() {
            return Err(TrackerError::TargetConfiguration(
                "organization must not be empty".into(),
            ));
        }

        let project = project.filter(|p| !p.trim().is_empty());
        let repository = repository.filter(|r| !r.trim().is_empty());

        if project.is_none() && (repository.is_some() || pipeline_id.is_some()) {
            return Err(TrackerError::TargetConfiguration(
                "a target repository or pipeline requires a target project".into(),
            ));
        }

        Ok(Self {
            organization,
            project,
            repository,
            pipeline_id,
        })
    }

    pub fn scope(&self) -> TargetScope {
        if self.pipeline_id.is_some() {
            TargetScope::Pipeline
        } else if self.repository.is_some() {
            TargetScope::Repository
        } else if self.project.is_some() {
            TargetScope::Project
        } else {
            TargetScope::Organization
        }
    }
}
