mod azure;

pub use azure::{
    AzureDevOpsClient, DevOpsApi, RepositoryScanner, TemplateScanner, WebLinks, DEFAULT_BASE_URL,
};
