mod api;
mod client;
mod links;
mod scanner;
mod types;

pub use api::{DevOpsApi, TemplateScanner};
pub use client::{AzureDevOpsClient, DEFAULT_BASE_URL};
pub use links::WebLinks;
pub use scanner::RepositoryScanner;
