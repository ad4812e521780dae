use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use log::{info, LevelFilter};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::auth::Token;
use crate::config::{Config, OutputFormat, ViewMode};
use crate::error::TrackerError;
use crate::models::{AdoptionTarget, ComplianceMode, TemplateSource};
use crate::output::{export_report, Report};
use crate::providers::{AzureDevOpsClient, RepositoryScanner, WebLinks};
use crate::tracker::TemplateAdoptionTracker;

#[derive(Parser)]
#[command(name = "adoptlens")]
#[command(author, version, about = "Pipeline Template Adoption Tracker", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./adoptlens.{toml,json,yaml,yml})
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v warn, -vv info, -vvv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Silence logs, banner and progress
    #[arg(short, long, global = true, default_value_t = false)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Measure how widely the source templates are adopted in the target scope
    Track(TrackArgs),
}

#[derive(Args)]
struct TrackArgs {
    /// Azure DevOps organization
    #[arg(long)]
    organization: Option<String>,

    /// Personal access token
    #[arg(long, env = "AZURE_DEVOPS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[arg(long)]
    base_url: Option<String>,

    /// Project holding the template repository
    #[arg(long)]
    source_project: Option<String>,

    /// Template repository
    #[arg(long)]
    source_repository: Option<String>,

    #[arg(long)]
    source_branch: Option<String>,

    /// Track a single template file instead of scanning directories
    #[arg(long)]
    source_template: Option<String>,

    /// Directories to scan for templates
    #[arg(long, value_delimiter = ',')]
    source_directories: Vec<String>,

    /// Limit tracking to a project
    #[arg(long)]
    target_project: Option<String>,

    /// Limit tracking to a repository of the target project
    #[arg(long)]
    target_repository: Option<String>,

    /// Limit tracking to a pipeline of the target project
    #[arg(long)]
    target_pipeline_id: Option<u64>,

    /// any, majority or all
    #[arg(long)]
    compliance_mode: Option<ComplianceMode>,

    /// summary, plain, json, markdown (comma separated)
    #[arg(long, value_delimiter = ',')]
    output_format: Vec<OutputFormat>,

    /// target, source, overview or non-compliant
    #[arg(long)]
    view: Option<ViewMode>,

    /// Write the report to this file (single format only)
    #[arg(short, long)]
    output_file: Option<PathBuf>,

    #[arg(short, long, default_value_t = false)]
    pretty: bool,

    /// Hide progress spinners
    #[arg(long, default_value_t = false)]
    no_progress: bool,
}

/// Fully merged settings of one tracking run.
#[derive(Debug)]
struct Settings {
    organization: String,
    token: Option<Token>,
    base_url: String,
    source: TemplateSource,
    target: AdoptionTarget,
    compliance_mode: ComplianceMode,
    formats: Vec<OutputFormat>,
    view: ViewMode,
    pretty: bool,
    output_file: Option<PathBuf>,
}

impl Cli {
    pub fn quiet(&self) -> bool {
        self.quiet
    }

    /// Initializes `env_logger` from the verbosity flags, or `RUST_LOG` when none is given.
    pub fn init_logging(&self) {
        let mut builder = env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or("error"),
        );
        if self.quiet {
            builder.filter_level(LevelFilter::Off);
        } else if self.verbose > 0 {
            builder.filter_level(match self.verbose {
                1 => LevelFilter::Warn,
                2 => LevelFilter::Info,
                _ => LevelFilter::Debug,
            });
        }
        builder.init();
    }

    pub async fn execute(&self) -> Result<()> {
        let config = Config::load(self.config.as_deref())?;

        match &self.command {
            Commands::Track(args) => {
                let settings = args.merge(config)?;
                self.execute_track(settings, !args.no_progress).await
            }
        }
    }

    async fn execute_track(&self, settings: Settings, progress: bool) -> Result<()> {
        info!(
            "Tracking adoption of {}/{} templates in {}",
            settings.source.project, settings.source.repository, settings.organization
        );

        let client =
            AzureDevOpsClient::new(&settings.base_url, &settings.organization, settings.token)?;
        let scanner = RepositoryScanner::new(&client);
        let links = WebLinks::new(client.base_url(), client.organization());

        let mut tracker = TemplateAdoptionTracker::new(
            &client,
            &scanner,
            settings.source,
            settings.target,
            settings.compliance_mode,
        )
        .with_progress(progress && !self.quiet);

        let (result, metrics) = tracker
            .track()
            .await
            .context("Failed to track template adoption")?;

        let report = Report {
            result: &result,
            metrics: &metrics,
            source: tracker.source(),
            links: &links,
        };
        write_outputs(
            &report,
            &settings.formats,
            settings.view,
            settings.pretty,
            settings.output_file.as_deref(),
        )
    }
}

impl TrackArgs {
    /// Command-line values take precedence over the configuration file.
    fn merge(&self, config: Config) -> Result<Settings> {
        let Config {
            azure,
            source,
            target,
            tracking,
            output,
        } = config;

        let organization = self
            .organization
            .clone()
            .or(azure.organization)
            .ok_or_else(|| {
                TrackerError::Config(
                    "an Azure DevOps organization is required (--organization)".into(),
                )
            })?;
        let token = self.token.clone().or(azure.token).map(Token::from);

        let directories = if self.source_directories.is_empty() {
            source.directories
        } else {
            self.source_directories.clone()
        };
        let template_source = TemplateSource::new(
            self.source_project
                .clone()
                .or(source.project)
                .unwrap_or_default(),
            self.source_repository
                .clone()
                .or(source.repository)
                .unwrap_or_default(),
            self.source_branch.clone().unwrap_or(source.branch),
            self.source_template.clone().or(source.template),
            directories,
        )?;

        let adoption_target = AdoptionTarget::new(
            organization.clone(),
            self.target_project.clone().or(target.project),
            self.target_repository.clone().or(target.repository),
            self.target_pipeline_id.or(target.pipeline_id),
        )?;

        let mut formats = if self.output_format.is_empty() {
            output.formats
        } else {
            self.output_format.clone()
        };
        let mut seen = Vec::with_capacity(formats.len());
        formats.retain(|f| {
            let first = !seen.contains(f);
            seen.push(*f);
            first
        });
        if formats.is_empty() {
            formats.push(OutputFormat::default());
        }

        Ok(Settings {
            organization,
            token,
            base_url: self.base_url.clone().unwrap_or(azure.base_url),
            source: template_source,
            target: adoption_target,
            compliance_mode: self.compliance_mode.unwrap_or(tracking.compliance_mode),
            formats,
            view: self.view.unwrap_or(output.view),
            pretty: self.pretty || output.pretty,
            output_file: self.output_file.clone().or(output.file),
        })
    }
}

/// Writes every requested format.
///
/// A single format goes to `output_file` or stdout. With several formats,
/// documents go to their default report files and terminal formats to stdout.
fn write_outputs(
    report: &Report<'_>,
    formats: &[OutputFormat],
    view: ViewMode,
    pretty: bool,
    output_file: Option<&Path>,
) -> Result<()> {
    if let [format] = formats {
        return match output_file {
            Some(path) => write_file(report, *format, view, pretty, path),
            None => write_stdout(report, *format, view, pretty),
        };
    }

    for &format in formats {
        match format.default_file_name() {
            Some(name) => write_file(report, format, view, pretty, Path::new(name))?,
            None => write_stdout(report, format, view, pretty)?,
        }
    }
    Ok(())
}

fn write_stdout(report: &Report<'_>, format: OutputFormat, view: ViewMode, pretty: bool) -> Result<()> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    export_report(report, format, view, pretty, &mut handle)?;
    handle.flush()?;
    Ok(())
}

fn write_file(
    report: &Report<'_>,
    format: OutputFormat,
    view: ViewMode,
    pretty: bool,
    path: &Path,
) -> Result<()> {
    // Colour codes make no sense in a file
    let format = match format {
        OutputFormat::Summary => OutputFormat::Plain,
        other => other,
    };

    let mut file = File::create(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
    export_report(report, format, view, pretty, &mut file)?;
    info!("Report ({format}) written to: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> TrackArgs {
        let mut argv = vec!["adoptlens", "track"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Track(args) => args,
        }
    }

    fn file_config() -> Config {
        toml::from_str(
            r#"
[azure]
organization = "Contoso"
token = "from-file"

[source]
project = "Lib"
repository = "tpl"

[target]
project = "App"

[output]
formats = ["json"]
view = "overview"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_flags_override_file() {
        let args = parse(&[
            "--token",
            "from-flag",
            "--target-repository",
            "web",
            "--compliance-mode",
            "majority",
            "--output-format",
            "summary,markdown,summary",
            "--source-directories",
            "templates/steps,templates/jobs",
        ]);

        let settings = args.merge(file_config()).unwrap();
        assert_eq!(settings.organization, "Contoso");
        assert_eq!(settings.token.as_ref().map(Token::as_str), Some("from-flag"));
        assert_eq!(settings.target.repository.as_deref(), Some("web"));
        assert_eq!(settings.target.project.as_deref(), Some("App"));
        assert_eq!(settings.compliance_mode, ComplianceMode::Majority);
        assert_eq!(
            settings.formats,
            vec![OutputFormat::Summary, OutputFormat::Markdown]
        );
        assert_eq!(settings.view, ViewMode::Overview);
        assert_eq!(settings.source.directories.len(), 2);
        assert_eq!(settings.base_url, "https://dev.azure.com");
    }

    #[test]
    fn test_file_values_are_used_without_flags() {
        let settings = parse(&[]).merge(file_config()).unwrap();
        assert_eq!(settings.formats, vec![OutputFormat::Json]);
        assert_eq!(settings.source.branch, "main");
        assert_eq!(settings.compliance_mode, ComplianceMode::Any);
    }

    #[test]
    fn test_missing_organization() {
        let err = parse(&["--source-project", "Lib", "--source-repository", "tpl"])
            .merge(Config::default())
            .unwrap_err();
        assert!(err.to_string().contains("organization"));
    }

    #[test]
    fn test_missing_source_repository() {
        let err = parse(&["--organization", "Contoso", "--source-project", "Lib"])
            .merge(Config::default())
            .unwrap_err();
        let err = err.downcast::<TrackerError>().unwrap();
        assert!(matches!(err, TrackerError::SourceConfiguration(_)));
    }

    #[test]
    fn test_invalid_compliance_mode_is_rejected_by_parser() {
        let result = Cli::try_parse_from(["adoptlens", "track", "--compliance-mode", "most"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_verbosity_flags() {
        let cli = Cli::try_parse_from(["adoptlens", "-vv", "track"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(!cli.quiet());
    }
}
