use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid source configuration: {0}")]
    SourceConfiguration(String),

    #[error("Invalid target configuration: {0}")]
    TargetConfiguration(String),

    #[error("Template path must end with one of: .yml, .yaml (got '{path}')")]
    InvalidTemplatePath { path: String },

    #[error("Invalid compliance mode: {0}. Must be one of: any, majority, all")]
    InvalidComplianceMode(String),

    #[error("Invalid view mode: {0}. Must be one of: target, source, overview, non-compliant")]
    InvalidViewMode(String),

    #[error("Invalid output format: {0}. Must be one of: summary, plain, json, markdown")]
    InvalidOutputFormat(String),

    #[error("Failed to authenticate with Azure DevOps")]
    Authentication,

    #[error("Failed to initialize tracker: {0}")]
    Initialization(String),

    #[error("Azure DevOps API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Azure DevOps API error (status {status}) after {retries} retries")]
    ApiErrorAfterRetries { status: u16, retries: u32 },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TrackerError {
    /// Whether the error was raised while validating user supplied configuration.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::SourceConfiguration(_)
                | Self::TargetConfiguration(_)
                | Self::InvalidTemplatePath { .. }
                | Self::InvalidComplianceMode(_)
                | Self::InvalidViewMode(_)
                | Self::InvalidOutputFormat(_)
                | Self::Authentication
        )
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
