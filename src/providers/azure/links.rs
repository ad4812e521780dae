use url::Url;

/// Builds clickable Azure DevOps web URLs for report output.
#[derive(Debug, Clone)]
pub struct WebLinks {
    base_url: String,
    organization: String,
}

impl WebLinks {
    pub fn new(base_url: &Url, organization: &str) -> Self {
        Self {
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
            organization: organization.to_string(),
        }
    }

    /// Project landing page (e.g., <https://dev.azure.com/Contoso/App>)
    pub fn project(&self, project: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.organization, encode(project))
    }

    /// Repository browser (e.g., <https://dev.azure.com/Contoso/App/_git/web>)
    pub fn repository(&self, project: &str, repository: &str) -> String {
        format!("{}/_git/{}", self.project(project), encode(repository))
    }

    /// Pipeline definition page (e.g., <https://dev.azure.com/Contoso/App/_build?definitionId=7>)
    pub fn pipeline(&self, project: &str, pipeline_id: u64) -> String {
        format!("{}/_build?definitionId={pipeline_id}", self.project(project))
    }

    /// Template file at a branch of the source repository.
    pub fn template(&self, project: &str, repository: &str, path: &str, branch: &str) -> String {
        format!(
            "{}?path=/{}&version=GB{}",
            self.repository(project, repository),
            path.trim_start_matches('/'),
            encode(branch)
        )
    }
}

fn encode(segment: &str) -> String {
    // Spaces are common in Azure DevOps project names
    segment.replace(' ', "%20")
}
