use std::fmt::{self, Write};
use std::sync::Arc;

use super::styling::{bright, bright_green, bright_red, dim, paint};
use super::tables::{rate_entry, ratio_entry, section_table, status_entry, Entry, Section, Tone};
use super::Report;
use crate::config::ViewMode;
use crate::models::{AdoptionResult, Organization, Pipeline, Project, Repository};

/// Renders the selected view of the report as terminal tables.
///
/// Color coding of adoption rates:
/// - Green: 80% and above
/// - Yellow: 50% to 80%
/// - Red: below 50%
pub fn render_summary(
    report: &Report<'_>,
    view: ViewMode,
    colored: bool,
) -> Result<String, fmt::Error> {
    let mut output = String::new();
    let mode = report.metrics.compliance_mode;
    let compliant = report.result.is_compliant(mode);

    let verdict = if compliant {
        paint(bright_green("✓ compliant"), colored)
    } else {
        paint(bright_red("✗ not compliant"), colored)
    };
    writeln!(
        output,
        "{} {} '{}' is {verdict} {}",
        paint(bright("🎯"), colored),
        report.result.scope(),
        report.result.name(),
        paint(dim(format!("(compliance mode {mode})")), colored),
    )?;
    writeln!(
        output,
        "   {}\n",
        paint(
            dim(format!(
                "Templates from {}/{}@{}, processed in {:.2}s",
                report.source.project,
                report.source.repository,
                report.source.branch,
                report.metrics.processing_time
            )),
            colored
        )
    )?;

    let sections = build_sections(report, view);
    if sections.iter().all(|s| s.rows.is_empty()) {
        writeln!(output, "{}", paint(dim("Nothing to report."), colored))?;
        return Ok(output);
    }

    for section in sections.iter().filter(|s| !s.rows.is_empty()) {
        writeln!(
            output,
            "{} {}",
            paint(bright(section.emoji), colored),
            paint(bright(&section.title).underlined(), colored)
        )?;
        writeln!(output, "{}\n", section_table(section, colored))?;
    }

    Ok(output)
}

/// Tables making up `view`, in display order.
pub fn build_sections(report: &Report<'_>, view: ViewMode) -> Vec<Section> {
    match view {
        ViewMode::Target => target_sections(report),
        ViewMode::Source => source_sections(report),
        ViewMode::Overview => vec![overview_section(report)],
        ViewMode::NonCompliant => non_compliant_sections(report),
    }
}

fn target_sections(report: &Report<'_>) -> Vec<Section> {
    match report.result {
        AdoptionResult::Organization(org) => vec![project_section(report, org)],
        AdoptionResult::Project(project) => vec![
            repository_section(report, project.repositories()),
            pipeline_section(
                report,
                "Pipelines",
                project
                    .compliant_pipelines
                    .iter()
                    .chain(&project.non_compliant_pipelines),
            ),
        ],
        AdoptionResult::Repository(repository) => vec![pipeline_section(
            report,
            "Pipelines",
            repository
                .compliant_pipelines
                .iter()
                .chain(&repository.non_compliant_pipelines),
        )],
        AdoptionResult::Pipeline(pipeline) => vec![pipeline_section(
            report,
            "Pipeline",
            std::iter::once(pipeline),
        )],
    }
}

fn project_section(report: &Report<'_>, org: &Organization) -> Section {
    let mode = report.metrics.compliance_mode;
    let mut section = Section::new(
        "🏢",
        "Projects",
        vec!["Project", "Status", "Repositories", "Pipelines", "Adoption"],
    );
    for project in org.projects() {
        section.push(vec![
            Entry::from(project.name.as_str()).with_link(report.links.project(&project.name)),
            status_entry(project.is_compliant(mode)),
            ratio_entry(
                project.compliant_repositories.len(),
                project.total_repository_count,
            ),
            ratio_entry(project.compliant_pipelines.len(), project.total_pipeline_count),
            rate_entry(project.pipeline_adoption_rate()),
        ]);
    }
    section
}

fn repository_section<'r>(
    report: &Report<'_>,
    repositories: impl Iterator<Item = &'r Arc<Repository>>,
) -> Section {
    let mode = report.metrics.compliance_mode;
    let mut section = Section::new(
        "📦",
        "Repositories",
        vec!["Repository", "Status", "Pipelines", "Adoption"],
    );
    for repository in repositories {
        section.push(vec![
            repository_entry(report, repository),
            status_entry(repository.is_compliant(mode)),
            ratio_entry(
                repository.compliant_pipelines.len(),
                repository.total_pipeline_count,
            ),
            rate_entry(repository.pipeline_adoption_rate()),
        ]);
    }
    section
}

fn pipeline_section<'p>(
    report: &Report<'_>,
    title: &str,
    pipelines: impl Iterator<Item = &'p Arc<Pipeline>>,
) -> Section {
    let mut section = Section::new("🔧", title, vec!["Pipeline", "Status", "Usage", "Templates"]);
    for pipeline in pipelines {
        let (usage, templates) = match &pipeline.adoption {
            Some(adoption) => (
                adoption.usage_type.to_string(),
                adoption
                    .unique_templates()
                    .iter()
                    .map(|t| t.path.as_str())
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            None => ("-".to_string(), "-".to_string()),
        };
        section.push(vec![
            pipeline_entry(report, pipeline),
            status_entry(pipeline.is_compliant()),
            Entry::from(usage),
            Entry::from(templates),
        ]);
    }
    section
}

fn source_sections(report: &Report<'_>) -> Vec<Section> {
    let metrics = report.metrics;
    let mut used = Section::new(
        "📚",
        "Template Usage",
        vec!["Template", "Uses", "Projects", "Repositories", "Pipelines"],
    );
    for (template, uses) in metrics.templates_by_usage() {
        used.push(vec![
            Entry::from(template).with_link(report.links.template(
                &report.source.project,
                &report.source.repository,
                template,
                &report.source.branch,
            )),
            Entry::from(uses),
            Entry::from(metrics.template_project_count(template)),
            Entry::from(metrics.template_repository_count(template)),
            Entry::from(metrics.template_pipeline_count(template)),
        ]);
    }

    let mut unused = Section::new("💤", "Unused Templates", vec!["Template"]);
    for template in &report.source.resolved_templates {
        if metrics.template_usage_count(template) == 0 {
            unused.push(vec![Entry::new(template.as_str(), Tone::Warning)]);
        }
    }

    vec![used, unused]
}

fn overview_section(report: &Report<'_>) -> Section {
    let mode = report.metrics.compliance_mode;
    let mut section = Section::new(
        "📊",
        "Overview",
        vec!["Level", "Total", "Compliant", "Non-compliant", "Adoption"],
    );
    let mut level = |name: &str, total: usize, compliant: usize, non_compliant: usize, rate: f64| {
        section.push(vec![
            Entry::from(name),
            Entry::from(total),
            Entry::new(compliant.to_string(), Tone::Good),
            Entry::new(non_compliant.to_string(), Tone::Bad),
            rate_entry(rate),
        ]);
    };

    match report.result {
        AdoptionResult::Organization(org) => {
            level(
                "Projects",
                org.total_project_count,
                org.compliant_projects.len(),
                org.non_compliant_projects.len(),
                org.project_adoption_rate(),
            );
            level(
                "Repositories",
                org.total_repository_count,
                org.compliant_repositories.len(),
                org.non_compliant_repositories.len(),
                org.repository_adoption_rate(),
            );
            level(
                "Pipelines",
                org.total_pipeline_count,
                org.compliant_pipelines.len(),
                org.non_compliant_pipelines.len(),
                org.pipeline_adoption_rate(),
            );
        }
        AdoptionResult::Project(project) => {
            level(
                "Repositories",
                project.total_repository_count,
                project.compliant_repositories.len(),
                project.non_compliant_repositories.len(),
                project.repository_adoption_rate(),
            );
            level(
                "Pipelines",
                project.total_pipeline_count,
                project.compliant_pipelines.len(),
                project.non_compliant_pipelines.len(),
                project.pipeline_adoption_rate(),
            );
        }
        AdoptionResult::Repository(repository) => level(
            "Pipelines",
            repository.total_pipeline_count,
            repository.compliant_pipelines.len(),
            repository.non_compliant_pipelines.len(),
            repository.pipeline_adoption_rate(),
        ),
        AdoptionResult::Pipeline(pipeline) => {
            let compliant = usize::from(pipeline.is_compliant());
            level(
                "Pipelines",
                1,
                compliant,
                1 - compliant,
                if compliant == 1 { 100.0 } else { 0.0 },
            );
        }
    }

    section.push(vec![
        Entry::from(format!("Result ({mode})")),
        Entry::from(""),
        Entry::from(""),
        Entry::from(""),
        status_entry(report.result.is_compliant(mode)),
    ]);
    section
}

fn non_compliant_sections(report: &Report<'_>) -> Vec<Section> {
    match report.result {
        AdoptionResult::Organization(org) => vec![
            non_compliant_projects(report, &org.non_compliant_projects),
            repository_section(report, org.non_compliant_repositories.iter()),
            pipeline_section(report, "Pipelines", org.non_compliant_pipelines.iter()),
        ],
        AdoptionResult::Project(project) => vec![
            repository_section(report, project.non_compliant_repositories.iter()),
            pipeline_section(report, "Pipelines", project.non_compliant_pipelines.iter()),
        ],
        AdoptionResult::Repository(repository) => vec![pipeline_section(
            report,
            "Pipelines",
            repository.non_compliant_pipelines.iter(),
        )],
        AdoptionResult::Pipeline(pipeline) => {
            let pipelines = (!pipeline.is_compliant()).then_some(pipeline);
            vec![pipeline_section(report, "Pipeline", pipelines.into_iter())]
        }
    }
}

fn non_compliant_projects(report: &Report<'_>, projects: &[Arc<Project>]) -> Section {
    let mut section = Section::new(
        "🏢",
        "Projects",
        vec!["Project", "Repositories", "Pipelines", "Adoption"],
    );
    for project in projects {
        section.push(vec![
            Entry::from(project.name.as_str()).with_link(report.links.project(&project.name)),
            ratio_entry(
                project.compliant_repositories.len(),
                project.total_repository_count,
            ),
            ratio_entry(project.compliant_pipelines.len(), project.total_pipeline_count),
            rate_entry(project.pipeline_adoption_rate()),
        ]);
    }
    section
}

fn repository_entry(report: &Report<'_>, repository: &Repository) -> Entry {
    let entry = Entry::from(repository.name.as_str());
    match report.project_reference(repository.project_id.as_deref()) {
        Some(project) => entry.with_link(report.links.repository(project, &repository.name)),
        None => entry,
    }
}

fn pipeline_entry(report: &Report<'_>, pipeline: &Pipeline) -> Entry {
    let entry = Entry::from(pipeline.display_path());
    match report.project_reference(pipeline.project_id.as_deref()) {
        Some(project) => entry.with_link(report.links.pipeline(project, pipeline.id)),
        None => entry,
    }
}
