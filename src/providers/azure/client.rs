use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use log::{debug, info, warn};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;
use url::Url;

use super::api::DevOpsApi;
use super::types::{
    ItemResponse, ListResponse, PipelineReference, PipelineResponse, ProjectResponse,
    RepositoryResponse,
};
use crate::auth::Token;
use crate::error::{Result, TrackerError};
use crate::models::{Pipeline, Project, Repository};

pub const DEFAULT_BASE_URL: &str = "https://dev.azure.com";
const API_VERSION: &str = "7.1";
const MAX_RETRIES: u32 = 3;
const RETRY_BASE_DELAY_MS: u64 = 1000;
const MAX_RETRY_DELAY_MS: u64 = 10_000;
const MAX_CONCURRENT_REQUESTS: usize = 50;
const REQUEST_TIMEOUT_SECONDS: u64 = 30;
const BATCH_SIZE: usize = 100;
const BATCH_DELAY_MS: u64 = 100;

/// REST client for a single Azure DevOps organization.
#[derive(Debug)]
pub struct AzureDevOpsClient {
    client: Client,
    base_url: Url,
    organization: String,
    token: Token,
    retry_delay: Duration,
    semaphore: Arc<Semaphore>,
}

impl AzureDevOpsClient {
    /// Creates a client for `organization` hosted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `Authentication` when no token is available, and `Config` when
    /// the HTTP client or base URL cannot be built.
    pub fn new(base_url: &str, organization: &str, token: Option<Token>) -> Result<Self> {
        let token = token
            .filter(|t| !t.as_str().is_empty())
            .ok_or(TrackerError::Authentication)?;

        let client = Client::builder()
            .user_agent(concat!("AdoptLens/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECONDS))
            .build()
            .map_err(|e| TrackerError::Config(format!("Failed to create HTTP client: {e}")))?;

        let base_url = Url::parse(base_url)
            .map_err(|e| TrackerError::Config(format!("Invalid base URL: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(TrackerError::Config(format!(
                "Invalid base URL: {base_url}"
            )));
        }

        Ok(Self {
            client,
            base_url,
            organization: organization.to_string(),
            token,
            retry_delay: Duration::from_millis(RETRY_BASE_DELAY_MS),
            semaphore: Arc::new(Semaphore::new(MAX_CONCURRENT_REQUESTS)),
        })
    }

    #[cfg(test)]
    pub(crate) fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn organization(&self) -> &str {
        &self.organization
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Builds `{base}/{organization}/{segments...}?api-version=...`.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push(&self.organization).extend(segments);
        }
        url.query_pairs_mut().append_pair("api-version", API_VERSION);
        url
    }

    /// GET with retries on throttling, server errors and transient network failures.
    async fn get_json<T>(&self, url: Url) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| TrackerError::Config(format!("Request pool closed: {e}")))?;

        let mut retry_count = 0;
        loop {
            let request = self
                .client
                .get(url.clone())
                .bearer_auth(self.token.as_str())
                .header(reqwest::header::ACCEPT, "application/json");

            let response = match request.send().await {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    if retry_count >= MAX_RETRIES {
                        return Err(e.into());
                    }
                    let delay = self.backoff(retry_count);
                    warn!(
                        "client: network error ({e}), retrying in {}ms ({}/{MAX_RETRIES})...",
                        delay.as_millis(),
                        retry_count + 1,
                    );
                    tokio::time::sleep(delay).await;
                    retry_count += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let status = response.status();

            if status == StatusCode::UNAUTHORIZED {
                return Err(TrackerError::Authentication);
            }

            if is_retryable(status) {
                if retry_count >= MAX_RETRIES {
                    return Err(TrackerError::ApiErrorAfterRetries {
                        status: status.as_u16(),
                        retries: MAX_RETRIES,
                    });
                }
                let delay = self.backoff(retry_count);
                warn!(
                    "client: Azure DevOps API error (status {status}). Waiting {}ms before retry {}/{MAX_RETRIES}...",
                    delay.as_millis(),
                    retry_count + 1,
                );
                tokio::time::sleep(delay).await;
                retry_count += 1;
                continue;
            }

            if !status.is_success() {
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unable to read error response".to_string());
                warn!("client: [{status}] {url}");
                return Err(TrackerError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            return Ok(response.json().await?);
        }
    }

    fn backoff(&self, retry_count: u32) -> Duration {
        let delay = self.retry_delay.saturating_mul(2u32.saturating_pow(retry_count));
        delay.min(Duration::from_millis(MAX_RETRY_DELAY_MS))
    }

    async fn fetch_projects(&self) -> Result<Vec<Project>> {
        let url = self.endpoint(&["_apis", "projects"]);
        let data: ListResponse<ProjectResponse> = self.get_json(url).await?;
        Ok(data.value.into_iter().map(Project::from).collect())
    }

    async fn fetch_project(&self, project: &str) -> Result<Project> {
        let url = self.endpoint(&["_apis", "projects", project]);
        let data: ProjectResponse = self.get_json(url).await?;
        Ok(data.into())
    }

    async fn fetch_repositories(&self, project: &str) -> Result<Vec<Repository>> {
        let url = self.endpoint(&[project, "_apis", "git", "repositories"]);
        let data: ListResponse<RepositoryResponse> = self.get_json(url).await?;

        Ok(data
            .value
            .into_iter()
            .filter(|repo| {
                if repo.is_disabled {
                    debug!("client: skipping disabled repository '{}'", repo.name);
                }
                !repo.is_disabled
            })
            .map(Repository::from)
            .collect())
    }

    async fn fetch_repository(&self, project: &str, repository: &str) -> Result<Repository> {
        let url = self.endpoint(&[project, "_apis", "git", "repositories", repository]);
        let data: RepositoryResponse = self.get_json(url).await?;
        Ok(data.into())
    }

    async fn fetch_pipeline(&self, project: &str, pipeline_id: u64) -> Result<Pipeline> {
        let id = pipeline_id.to_string();
        let url = self.endpoint(&[project, "_apis", "pipelines", &id]);
        let data: PipelineResponse = self.get_json(url).await?;

        let Some((path, repository_id)) = data.yaml_definition() else {
            debug!(
                "client: pipeline '{}' has no YAML definition, skipping content",
                data.name
            );
            return Ok(data.into_pipeline(None, None));
        };

        let (project_id, content) = match self.fetch_repository(project, repository_id).await {
            Ok(repository) => {
                debug!(
                    "client: using default branch '{}' for pipeline '{}' in repository '{}'",
                    repository.default_branch, data.name, repository.name
                );
                let content = self
                    .get_file_content(project, &repository.id, path, &repository.default_branch)
                    .await
                    .inspect_err(|e| {
                        warn!("client: failed to get content of pipeline '{}': {e}", data.name);
                    })
                    .ok();
                (repository.project_id, content)
            }
            Err(e) => {
                warn!(
                    "client: failed to get repository of pipeline '{}': {e}",
                    data.name
                );
                (None, None)
            }
        };

        Ok(data.into_pipeline(project_id, content))
    }

    async fn fetch_pipelines(&self, project: &str) -> Result<Vec<Pipeline>> {
        let url = self.endpoint(&[project, "_apis", "pipelines"]);
        let data: ListResponse<PipelineReference> = self.get_json(url).await?;
        let pipeline_ids: Vec<u64> = data.value.into_iter().map(|p| p.id).collect();

        let batch_count = pipeline_ids.len().div_ceil(BATCH_SIZE);
        let mut pipelines = Vec::with_capacity(pipeline_ids.len());

        for (batch_num, batch) in pipeline_ids.chunks(BATCH_SIZE).enumerate() {
            info!(
                "client: fetching batch {}/{batch_count} ({} pipelines) for project '{project}'",
                batch_num + 1,
                batch.len()
            );

            let results = join_all(batch.iter().map(|&id| self.fetch_pipeline(project, id))).await;

            for (id, result) in batch.iter().zip(results) {
                match result {
                    Ok(pipeline) => pipelines.push(pipeline),
                    Err(e) => warn!("client: failed to fetch pipeline {id} in '{project}': {e}"),
                }
            }

            if batch_num + 1 < batch_count {
                tokio::time::sleep(Duration::from_millis(BATCH_DELAY_MS)).await;
            }
        }

        Ok(pipelines)
    }

    /// Raw content of a file at the tip of `branch`.
    pub async fn get_file_content(
        &self,
        project: &str,
        repository: &str,
        path: &str,
        branch: &str,
    ) -> Result<String> {
        let mut url = self.endpoint(&[project, "_apis", "git", "repositories", repository, "items"]);
        url.query_pairs_mut()
            .append_pair("path", path)
            .append_pair("versionDescriptor.version", branch)
            .append_pair("versionDescriptor.versionType", "branch")
            .append_pair("includeContent", "true")
            .append_pair("$format", "json");

        let item: ItemResponse = self.get_json(url).await?;
        Ok(item.content.unwrap_or_default())
    }

    /// Recursively lists the items of a repository at `branch`, optionally below `scope_path`.
    pub async fn list_items(
        &self,
        project: &str,
        repository: &str,
        branch: &str,
        scope_path: Option<&str>,
    ) -> Result<Vec<ItemResponse>> {
        let mut url = self.endpoint(&[project, "_apis", "git", "repositories", repository, "items"]);
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("recursionLevel", "full")
                .append_pair("versionDescriptor.version", branch)
                .append_pair("versionDescriptor.versionType", "branch");
            if let Some(scope_path) = scope_path {
                query.append_pair("scopePath", scope_path);
            }
        }

        let data: ListResponse<ItemResponse> = self.get_json(url).await?;
        Ok(data.value)
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

#[async_trait]
impl DevOpsApi for AzureDevOpsClient {
    async fn list_projects(&self) -> Result<Vec<Project>> {
        self.fetch_projects().await
    }

    async fn get_project(&self, project: &str) -> Result<Project> {
        self.fetch_project(project).await
    }

    async fn list_repositories(&self, project: &str) -> Result<Vec<Repository>> {
        self.fetch_repositories(project).await
    }

    async fn get_repository(&self, project: &str, repository: &str) -> Result<Repository> {
        self.fetch_repository(project, repository).await
    }

    async fn list_pipelines(&self, project: &str) -> Result<Vec<Pipeline>> {
        self.fetch_pipelines(project).await
    }

    async fn get_pipeline_by_id(&self, project: &str, pipeline_id: u64) -> Result<Pipeline> {
        self.fetch_pipeline(project, pipeline_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn client_for(server: &Server) -> AzureDevOpsClient {
        AzureDevOpsClient::new(&server.url(), "Contoso", Some(Token::from("pat")))
            .unwrap()
            .with_retry_delay(Duration::from_millis(1))
    }

    #[test]
    fn test_missing_token_is_an_authentication_error() {
        let err = AzureDevOpsClient::new(DEFAULT_BASE_URL, "Contoso", None).unwrap_err();
        assert!(matches!(err, TrackerError::Authentication));

        let err = AzureDevOpsClient::new(DEFAULT_BASE_URL, "Contoso", Some(Token::from(" ")))
            .unwrap_err();
        assert!(matches!(err, TrackerError::Authentication));
    }

    #[test]
    fn test_invalid_base_url() {
        let err = AzureDevOpsClient::new("not a url", "Contoso", Some(Token::from("pat")))
            .unwrap_err();
        assert!(matches!(err, TrackerError::Config(_)));
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let client =
            AzureDevOpsClient::new(DEFAULT_BASE_URL, "Contoso", Some(Token::from("pat"))).unwrap();
        let url = client.endpoint(&["My Project", "_apis", "git", "repositories"]);
        assert_eq!(
            url.as_str(),
            "https://dev.azure.com/Contoso/My%20Project/_apis/git/repositories?api-version=7.1"
        );
    }

    #[tokio::test]
    async fn test_list_projects() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/Contoso/_apis/projects")
            .match_query(Matcher::UrlEncoded("api-version".into(), API_VERSION.into()))
            .match_header("authorization", "Bearer pat")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"count": 2, "value": [{"id": "p-1", "name": "App"}, {"id": "p-2", "name": "Lib"}]}"#)
            .create_async()
            .await;

        let projects = client_for(&server).list_projects().await.unwrap();

        mock.assert_async().await;
        assert_eq!(projects.len(), 2);
        assert_eq!(projects[1].name, "Lib");
        assert_eq!(projects[1].total_pipeline_count, 0);
    }

    #[tokio::test]
    async fn test_list_repositories_skips_disabled() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/Contoso/App/_apis/git/repositories")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"value": [
                    {"id": "r-1", "name": "web", "defaultBranch": "refs/heads/main", "project": {"id": "p-1"}},
                    {"id": "r-2", "name": "old", "defaultBranch": "refs/heads/master", "project": {"id": "p-1"}, "isDisabled": true}
                ]}"#,
            )
            .create_async()
            .await;

        let repositories = client_for(&server).list_repositories("App").await.unwrap();

        assert_eq!(repositories.len(), 1);
        assert_eq!(repositories[0].name, "web");
        assert_eq!(repositories[0].default_branch, "main");
    }

    #[tokio::test]
    async fn test_get_default_branch_strips_prefix() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/Contoso/Lib/_apis/git/repositories/tpl")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"id": "r-9", "name": "tpl", "defaultBranch": "refs/heads/develop", "project": {"id": "p-2"}}"#)
            .create_async()
            .await;

        let branch = client_for(&server)
            .get_default_branch("Lib", "tpl")
            .await
            .unwrap();
        assert_eq!(branch, "develop");
    }

    #[tokio::test]
    async fn test_get_pipeline_by_id_fetches_content() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/Contoso/App/_apis/pipelines/7")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"id": 7, "name": "ci", "folder": "\\",
                    "configuration": {"type": "yaml", "path": "/azure-pipelines.yml", "repository": {"id": "r-1"}}}"#,
            )
            .create_async()
            .await;
        server
            .mock("GET", "/Contoso/App/_apis/git/repositories/r-1")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"id": "r-1", "name": "web", "defaultBranch": "refs/heads/main", "project": {"id": "p-1"}}"#)
            .create_async()
            .await;
        let content_mock = server
            .mock("GET", "/Contoso/App/_apis/git/repositories/r-1/items")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("path".into(), "/azure-pipelines.yml".into()),
                Matcher::UrlEncoded("versionDescriptor.version".into(), "main".into()),
                Matcher::UrlEncoded("includeContent".into(), "true".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"path": "/azure-pipelines.yml", "content": "steps:\n- script: echo hi\n"}"#)
            .create_async()
            .await;

        let pipeline = client_for(&server).get_pipeline_by_id("App", 7).await.unwrap();

        content_mock.assert_async().await;
        assert_eq!(pipeline.id, 7);
        assert_eq!(pipeline.project_id.as_deref(), Some("p-1"));
        assert_eq!(pipeline.repository_id.as_deref(), Some("r-1"));
        assert_eq!(
            pipeline.content.as_deref(),
            Some("steps:\n- script: echo hi\n")
        );
    }

    #[tokio::test]
    async fn test_failed_content_fetch_leaves_content_absent() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/Contoso/App/_apis/pipelines/8")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"id": 8, "name": "cd", "folder": "\\",
                    "configuration": {"type": "yaml", "path": "/cd.yml", "repository": {"id": "r-1"}}}"#,
            )
            .create_async()
            .await;
        server
            .mock("GET", "/Contoso/App/_apis/git/repositories/r-1")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"id": "r-1", "name": "web", "defaultBranch": "refs/heads/main", "project": {"id": "p-1"}}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/Contoso/App/_apis/git/repositories/r-1/items")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body("not found")
            .create_async()
            .await;

        let pipeline = client_for(&server).get_pipeline_by_id("App", 8).await.unwrap();
        assert!(pipeline.content.is_none());
        assert_eq!(pipeline.project_id.as_deref(), Some("p-1"));
    }

    #[tokio::test]
    async fn test_list_pipelines_skips_failed_details() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/Contoso/App/_apis/pipelines")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"value": [{"id": 1}, {"id": 2}]}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/Contoso/App/_apis/pipelines/1")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"id": 1, "name": "classic", "folder": "\\", "configuration": {"type": "designerJson"}}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/Contoso/App/_apis/pipelines/2")
            .match_query(Matcher::Any)
            .with_status(403)
            .with_body("forbidden")
            .create_async()
            .await;

        let pipelines = client_for(&server).list_pipelines("App").await.unwrap();
        assert_eq!(pipelines.len(), 1);
        assert_eq!(pipelines[0].name, "classic");
        assert!(pipelines[0].content.is_none());
    }

    #[tokio::test]
    async fn test_unauthorized_maps_to_authentication_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/Contoso/_apis/projects")
            .match_query(Matcher::Any)
            .with_status(401)
            .create_async()
            .await;

        let err = client_for(&server).list_projects().await.unwrap_err();
        assert!(matches!(err, TrackerError::Authentication));
    }

    #[tokio::test]
    async fn test_server_errors_are_retried_then_reported() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/Contoso/_apis/projects")
            .match_query(Matcher::Any)
            .with_status(503)
            .expect(MAX_RETRIES as usize + 1)
            .create_async()
            .await;

        let err = client_for(&server).list_projects().await.unwrap_err();

        mock.assert_async().await;
        assert!(matches!(
            err,
            TrackerError::ApiErrorAfterRetries { status: 503, retries: MAX_RETRIES }
        ));
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/Contoso/_apis/projects/Missing")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body("project not found")
            .expect(1)
            .create_async()
            .await;

        let err = client_for(&server).get_project("Missing").await.unwrap_err();

        mock.assert_async().await;
        match err {
            TrackerError::Api { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "project not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
