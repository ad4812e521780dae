use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::TrackerError;
use crate::models::ComplianceMode;

/// Configuration file structure for `AdoptLens`.
///
/// Lets teams keep the template source and their usual target in a file and
/// override single values from the command line.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub azure: AzureConfig,

    /// Template catalog to measure
    #[serde(default)]
    pub source: SourceConfig,

    /// Where to look for adoption
    #[serde(default)]
    pub target: TargetConfig,

    #[serde(default)]
    pub tracking: TrackingConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AzureConfig {
    /// Azure DevOps organization name
    pub organization: Option<String>,

    /// Personal access token
    pub token: Option<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SourceConfig {
    pub project: Option<String>,

    pub repository: Option<String>,

    #[serde(default = "default_branch")]
    pub branch: String,

    /// A single template file; excludes `directories`
    pub template: Option<String>,

    /// Directories to scan for templates (whole repository when empty)
    #[serde(default)]
    pub directories: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TargetConfig {
    pub project: Option<String>,
    pub repository: Option<String>,
    pub pipeline_id: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TrackingConfig {
    #[serde(default)]
    pub compliance_mode: ComplianceMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    #[serde(default = "default_formats")]
    pub formats: Vec<OutputFormat>,

    #[serde(default)]
    pub view: ViewMode,

    /// Pretty-print JSON output
    #[serde(default)]
    pub pretty: bool,

    /// Write the report here instead of stdout (single format only)
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Coloured terminal tables
    #[default]
    Summary,
    /// Terminal tables without colour
    Plain,
    Json,
    Markdown,
}

impl OutputFormat {
    /// Formats rendered for a terminal rather than exported as a document.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Summary | Self::Plain)
    }

    /// Report file used when several formats are requested at once.
    pub fn default_file_name(self) -> Option<&'static str> {
        match self {
            Self::Json => Some("adoption-report.json"),
            Self::Markdown => Some("adoption-report.md"),
            Self::Summary | Self::Plain => None,
        }
    }
}

impl FromStr for OutputFormat {
    type Err = TrackerError;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "summary" => Ok(Self::Summary),
            "plain" => Ok(Self::Plain),
            "json" => Ok(Self::Json),
            "markdown" | "md" => Ok(Self::Markdown),
            _ => Err(TrackerError::InvalidOutputFormat(value.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Summary => "summary",
            Self::Plain => "plain",
            Self::Json => "json",
            Self::Markdown => "markdown",
        })
    }
}

/// Which part of the report to present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ViewMode {
    /// The hierarchy of the tracked scope
    #[default]
    Target,
    /// Per-template usage and coverage
    Source,
    /// Adoption rates and compliance status
    Overview,
    /// Only the entities failing the compliance mode
    NonCompliant,
}

impl FromStr for ViewMode {
    type Err = TrackerError;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_lowercase().replace('_', "-").as_str() {
            "target" => Ok(Self::Target),
            "source" => Ok(Self::Source),
            "overview" => Ok(Self::Overview),
            "non-compliant" => Ok(Self::NonCompliant),
            _ => Err(TrackerError::InvalidViewMode(value.to_string())),
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Target => "target",
            Self::Source => "source",
            Self::Overview => "overview",
            Self::NonCompliant => "non-compliant",
        })
    }
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            organization: None,
            token: None,
            base_url: default_base_url(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            project: None,
            repository: None,
            branch: default_branch(),
            template: None,
            directories: Vec::new(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            formats: default_formats(),
            view: ViewMode::default(),
            pretty: false,
            file: None,
        }
    }
}

fn default_base_url() -> String {
    crate::providers::DEFAULT_BASE_URL.to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_formats() -> Vec<OutputFormat> {
    vec![OutputFormat::Summary]
}

const CANDIDATES: [&str; 4] = [
    "adoptlens.toml",
    "adoptlens.json",
    "adoptlens.yaml",
    "adoptlens.yml",
];

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./adoptlens.toml, ./adoptlens.json, ./adoptlens.yaml, ./adoptlens.yml
    /// 3. `<config dir>/adoptlens/config.toml`
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        let user_config = dirs::config_dir().map(|dir| dir.join("adoptlens").join("config.toml"));
        let found = CANDIDATES
            .iter()
            .map(PathBuf::from)
            .chain(user_config)
            .find(|path| path.exists());

        match found {
            Some(path) => Self::load_from_path(&path),
            None => Ok(Self::default()),
        }
    }

    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.azure.base_url, "https://dev.azure.com");
        assert_eq!(config.source.branch, "main");
        assert!(config.source.directories.is_empty());
        assert_eq!(config.tracking.compliance_mode, ComplianceMode::Any);
        assert_eq!(config.output.formats, vec![OutputFormat::Summary]);
        assert_eq!(config.output.view, ViewMode::Target);
    }

    #[test]
    fn test_load_toml_config() {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        let toml_content = r#"
[azure]
organization = "Contoso"
token = "pat-from-file"

[source]
project = "Lib"
repository = "tpl"
branch = "release"
directories = ["templates/steps", "templates/stages"]

[target]
project = "App"
pipeline-id = 42

[tracking]
compliance-mode = "majority"

[output]
formats = ["summary", "json"]
view = "non-compliant"
pretty = true
"#;
        write!(temp_file, "{toml_content}").unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.azure.organization.as_deref(), Some("Contoso"));
        assert_eq!(config.azure.base_url, "https://dev.azure.com");
        assert_eq!(config.source.branch, "release");
        assert_eq!(config.source.directories.len(), 2);
        assert_eq!(config.target.pipeline_id, Some(42));
        assert_eq!(config.tracking.compliance_mode, ComplianceMode::Majority);
        assert_eq!(
            config.output.formats,
            vec![OutputFormat::Summary, OutputFormat::Json]
        );
        assert_eq!(config.output.view, ViewMode::NonCompliant);
        assert!(config.output.pretty);
    }

    #[test]
    fn test_load_yaml_config() {
        let mut temp_file = NamedTempFile::with_suffix(".yaml").unwrap();
        let yaml_content = r"
azure:
  organization: Contoso
  base-url: https://ado.example.com
source:
  project: Lib
  repository: tpl
  template: templates/build.yaml
output:
  formats: [markdown]
";
        write!(temp_file, "{yaml_content}").unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.azure.base_url, "https://ado.example.com");
        assert_eq!(
            config.source.template.as_deref(),
            Some("templates/build.yaml")
        );
        assert_eq!(config.output.formats, vec![OutputFormat::Markdown]);
    }

    #[test]
    fn test_load_json_config() {
        let mut temp_file = NamedTempFile::with_suffix(".json").unwrap();
        let json_content = r#"{
  "azure": {"organization": "Contoso"},
  "target": {"project": "App", "repository": "web"}
}"#;
        write!(temp_file, "{json_content}").unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.target.repository.as_deref(), Some("web"));
        assert_eq!(config.output.formats, vec![OutputFormat::Summary]);
    }

    #[test]
    fn test_invalid_compliance_mode_in_file() {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        write!(temp_file, "[tracking]\ncompliance-mode = \"most\"\n").unwrap();
        assert!(Config::load_from_path(temp_file.path()).is_err());
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        assert!(Config::load(Some(Path::new("does-not-exist.toml"))).is_err());
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("md".parse::<OutputFormat>().unwrap(), OutputFormat::Markdown);
        assert!(matches!(
            "csv".parse::<OutputFormat>(),
            Err(TrackerError::InvalidOutputFormat(_))
        ));
        assert_eq!(
            OutputFormat::Markdown.default_file_name(),
            Some("adoption-report.md")
        );
        assert!(OutputFormat::Plain.is_terminal());
    }

    #[test]
    fn test_view_mode_from_str() {
        assert_eq!("overview".parse::<ViewMode>().unwrap(), ViewMode::Overview);
        assert_eq!(
            "non_compliant".parse::<ViewMode>().unwrap(),
            ViewMode::NonCompliant
        );
        let err = "everything".parse::<ViewMode>().unwrap_err();
        assert!(err.is_configuration());
    }
}
