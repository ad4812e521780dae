use async_trait::async_trait;
use futures::future::join_all;
use log::{debug, warn};

use super::api::TemplateScanner;
use super::client::AzureDevOpsClient;
use crate::error::Result;
use crate::models::{is_valid_template_path, normalize_path, TemplateSource};

/// Lists YAML files of the source repository and fetches their content.
pub struct RepositoryScanner<'a> {
    client: &'a AzureDevOpsClient,
}

impl<'a> RepositoryScanner<'a> {
    pub fn new(client: &'a AzureDevOpsClient) -> Self {
        Self { client }
    }

    /// YAML file paths below `scope_path` (or the whole repository).
    async fn yaml_paths(&self, source: &TemplateSource, scope_path: Option<&str>) -> Vec<String> {
        let items = match self
            .client
            .list_items(
                &source.project,
                &source.repository,
                &source.branch,
                scope_path,
            )
            .await
        {
            Ok(items) => items,
            Err(e) => {
                warn!(
                    "scanner: failed to list '{}' in {}/{}: {e}",
                    scope_path.unwrap_or("/"),
                    source.project,
                    source.repository
                );
                return Vec::new();
            }
        };

        items
            .into_iter()
            .filter(|item| !item.is_folder && is_valid_template_path(&item.path))
            .map(|item| item.path)
            .collect()
    }
}

#[async_trait]
impl TemplateScanner for RepositoryScanner<'_> {
    async fn scan(&self, source: &TemplateSource) -> Result<Vec<(String, String)>> {
        let mut paths = Vec::new();
        if source.scans_whole_repository() {
            paths.extend(self.yaml_paths(source, None).await);
        } else {
            for directory in &source.directories {
                let scope_path = format!("/{}", directory.trim_matches('/'));
                paths.extend(self.yaml_paths(source, Some(&scope_path)).await);
            }
        }
        paths.sort();
        paths.dedup();
        debug!(
            "scanner: found {} YAML files in {}/{}@{}",
            paths.len(),
            source.project,
            source.repository,
            source.branch
        );

        let contents = join_all(paths.iter().map(|path| {
            self.client
                .get_file_content(&source.project, &source.repository, path, &source.branch)
        }))
        .await;

        let files = paths
            .iter()
            .zip(contents)
            .filter_map(|(path, content)| match content {
                Ok(content) => Some((normalize_path(path).to_string(), content)),
                Err(e) => {
                    warn!("scanner: failed to read '{path}': {e}");
                    None
                }
            })
            .collect();

        Ok(files)
    }
}
