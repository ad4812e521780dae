use anyhow::Result;
use serde_json::json;
use std::io::Write;

use super::summary::{build_sections, render_summary};
use super::tables::Section;
use super::Report;
use crate::config::{OutputFormat, ViewMode};

/// Writes the report in `format` to `output`.
///
/// - Summary / Plain: terminal tables of the selected view
/// - JSON: the full result and metrics, regardless of view
/// - Markdown: the selected view as Markdown tables with web links
pub fn export_report(
    report: &Report<'_>,
    format: OutputFormat,
    view: ViewMode,
    pretty: bool,
    output: &mut dyn Write,
) -> Result<()> {
    match format {
        OutputFormat::Summary => write!(output, "{}", render_summary(report, view, true)?)?,
        OutputFormat::Plain => write!(output, "{}", render_summary(report, view, false)?)?,
        OutputFormat::Json => export_json(report, pretty, output)?,
        OutputFormat::Markdown => export_markdown(report, view, output)?,
    }
    Ok(())
}

fn export_json(report: &Report<'_>, pretty: bool, output: &mut dyn Write) -> Result<()> {
    let mode = report.metrics.compliance_mode;
    let document = json!({
        "organization": report.metrics.target.organization,
        "scope": report.result.scope(),
        "compliance_mode": mode,
        "compliant": report.result.is_compliant(mode),
        "source": {
            "project": report.source.project,
            "repository": report.source.repository,
            "branch": report.source.branch,
            "templates": report.source.resolved_templates,
        },
        "result": report.result,
        "metrics": report.metrics,
    });

    let json = if pretty {
        serde_json::to_string_pretty(&document)?
    } else {
        serde_json::to_string(&document)?
    };
    writeln!(output, "{json}")?;
    Ok(())
}

fn export_markdown(report: &Report<'_>, view: ViewMode, output: &mut dyn Write) -> Result<()> {
    let mode = report.metrics.compliance_mode;
    let verdict = if report.result.is_compliant(mode) {
        "✅ Compliant"
    } else {
        "❌ Not compliant"
    };

    writeln!(output, "# Template Adoption Report\n")?;
    writeln!(
        output,
        "**{} `{}`**: {verdict} (compliance mode `{mode}`)\n",
        report.result.scope(),
        report.result.name()
    )?;
    writeln!(
        output,
        "- Organization: `{}`",
        report.metrics.target.organization
    )?;
    writeln!(
        output,
        "- Template source: `{}/{}` at `{}` ({} templates)",
        report.source.project,
        report.source.repository,
        report.source.branch,
        report.source.resolved_templates.len()
    )?;
    writeln!(
        output,
        "- Collected: {} in {:.2}s\n",
        report.metrics.collected_at.format("%Y-%m-%d %H:%M:%S UTC"),
        report.metrics.processing_time
    )?;

    let sections = build_sections(report, view);
    for section in sections.iter().filter(|s| !s.rows.is_empty()) {
        write_markdown_section(section, output)?;
    }
    Ok(())
}

fn write_markdown_section(section: &Section, output: &mut dyn Write) -> Result<()> {
    writeln!(output, "## {} {}\n", section.emoji, section.title)?;
    writeln!(output, "| {} |", section.headers.join(" | "))?;
    writeln!(
        output,
        "|{}",
        section.headers.iter().map(|_| " --- |").collect::<String>()
    )?;

    for row in &section.rows {
        let cells: Vec<String> = row
            .iter()
            .map(|entry| {
                let text = escape_markdown(&entry.text);
                match &entry.link {
                    Some(link) => format!("[{text}]({link})"),
                    None => text,
                }
            })
            .collect();
        writeln!(output, "| {} |", cells.join(" | "))?;
    }
    writeln!(output)?;
    Ok(())
}

fn escape_markdown(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', "<br>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::test_support::sample_report;

    fn export(report: &Report<'_>, format: OutputFormat, view: ViewMode) -> String {
        let mut buffer = Vec::new();
        export_report(report, format, view, true, &mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_json_export() {
        sample_report(|report| {
            let text = export(report, OutputFormat::Json, ViewMode::Target);
            let value: serde_json::Value = serde_json::from_str(&text).unwrap();

            assert_eq!(value["organization"], "Contoso");
            assert_eq!(value["scope"], "project");
            assert_eq!(value["compliance_mode"], "any");
            assert_eq!(value["compliant"], true);
            assert_eq!(value["source"]["templates"].as_array().unwrap().len(), 2);
            assert_eq!(value["result"]["scope"], "project");
            assert_eq!(value["result"]["result"]["total_pipeline_count"], 3);
            assert_eq!(
                value["metrics"]["template_usage"]["templates/build.yaml"],
                2
            );
        });
    }

    #[test]
    fn test_markdown_export_links_entities() {
        sample_report(|report| {
            let text = export(report, OutputFormat::Markdown, ViewMode::Target);

            assert!(text.starts_with("# Template Adoption Report"));
            assert!(text.contains("**PROJECT `App`**: ✅ Compliant"));
            assert!(text.contains("| Repository | Status | Pipelines | Adoption |"));
            assert!(text.contains("[web](https://dev.azure.com/Contoso/p-app/_git/web)"));
            assert!(text.contains(
                "[nightly\\pipeline-3](https://dev.azure.com/Contoso/p-app/_build?definitionId=3)"
            ));
        });
    }

    #[test]
    fn test_plain_export_has_no_colour() {
        sample_report(|report| {
            let text = export(report, OutputFormat::Plain, ViewMode::Overview);
            assert!(text.contains("Overview"));
            assert!(!text.contains('\u{1b}'));
        });
    }

    #[test]
    fn test_escape_markdown() {
        assert_eq!(escape_markdown("a|b\nc"), "a\\|b<br>c");
    }
}
