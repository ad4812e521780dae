mod compliance;
mod entities;
mod metrics;
mod source;
mod target;

pub use compliance::ComplianceMode;
pub use entities::{
    Adoption, AdoptionResult, Organization, Pipeline, Project, Repository, Template, UsageType,
};
pub use metrics::{AdoptionMetrics, TemplateCoverage};
pub use source::{
    is_valid_template_path, normalize_branch, normalize_path, TemplateSource, ROOT_DIRECTORY,
};
pub use target::{AdoptionTarget, TargetScope};
