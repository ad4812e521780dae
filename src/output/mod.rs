mod exports;
mod progress;
mod styling;
mod summary;
mod tables;

pub use exports::export_report;
pub use progress::{Phase, PhaseProgress};
pub use styling::{dim, magenta_bold};

use crate::models::{AdoptionMetrics, AdoptionResult, TemplateSource};
use crate::providers::WebLinks;

/// Read-only view over a finished tracking run.
pub struct Report<'a> {
    pub result: &'a AdoptionResult,
    pub metrics: &'a AdoptionMetrics,
    pub source: &'a TemplateSource,
    pub links: &'a WebLinks,
}

impl Report<'_> {
    /// Project used in web links of an entity: its own, else the tracked one.
    fn project_reference<'s>(&'s self, project_id: Option<&'s str>) -> Option<&'s str> {
        project_id.or(self.metrics.target.project.as_deref())
    }
}

/// Prints the `AdoptLens` banner to stderr.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("🧩 AdoptLens"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("Pipeline Template Adoption Tracker")
    );
}
