//! GitHub Actions run source

use async_trait::async_trait;
use openapi_client::models::{JobList, WorkflowRun, WorkflowRunList};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;
use url::Url;

use crate::errors::{DashboardError, UpstreamError};
use crate::http::client::HttpClient;
use crate::storage::settings::GithubSettings;

/// Read access to a CI provider's run history
#[async_trait]
pub trait RunSource: Send + Sync {
    /// Most recent runs, newest first, at most `limit`
    async fn list_recent_runs(&self, limit: u32) -> Result<Vec<WorkflowRun>, UpstreamError>;

    /// Jobs and steps of a run
    async fn get_job_detail(&self, run: &WorkflowRun) -> Result<JobList, UpstreamError>;

    /// Raw log text of a job
    async fn get_raw_log(&self, job_id: u64) -> Result<String, UpstreamError>;
}

/// GitHub REST implementation of [`RunSource`]
pub struct GithubRunSource {
    http_client: HttpClient,
    owner: String,
    repo: String,
}

impl GithubRunSource {
    pub fn new(
        settings: &GithubSettings,
        token: Option<&SecretString>,
    ) -> Result<Self, DashboardError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github.v3+json"),
        );

        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("token {}", token.expose_secret()))
                .map_err(|_| {
                    DashboardError::ConfigError("GITHUB_TOKEN contains invalid characters".into())
                })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        } else {
            debug!("No GITHUB_TOKEN configured, using unauthenticated GitHub requests");
        }

        Ok(Self {
            http_client: HttpClient::new(&settings.api_base_url, headers)?,
            owner: settings.owner.clone(),
            repo: settings.repo.clone(),
        })
    }

    /// `{base}/repos/{owner}/{repo}/actions/{tail...}`
    fn actions_url(&self, tail: &[&str]) -> Result<Url, UpstreamError> {
        let mut url = self.http_client.base_url().clone();
        url.path_segments_mut()
            .map_err(|_| UpstreamError::InvalidUrl("GitHub API base cannot carry a path".into()))?
            .pop_if_empty()
            .extend(["repos", self.owner.as_str(), self.repo.as_str(), "actions"])
            .extend(tail);
        Ok(url)
    }
}

#[async_trait]
impl RunSource for GithubRunSource {
    async fn list_recent_runs(&self, limit: u32) -> Result<Vec<WorkflowRun>, UpstreamError> {
        let mut url = self.actions_url(&["runs"])?;
        url.query_pairs_mut()
            .append_pair("per_page", &limit.to_string());

        let list: WorkflowRunList = self.http_client.get_json(url).await?;
        Ok(list.workflow_runs)
    }

    async fn get_job_detail(&self, run: &WorkflowRun) -> Result<JobList, UpstreamError> {
        let url = self.http_client.resolve(&run.jobs_url)?;
        self.http_client.get_json(url).await
    }

    async fn get_raw_log(&self, job_id: u64) -> Result<String, UpstreamError> {
        let url = self.actions_url(&["jobs", &job_id.to_string(), "logs"])?;
        self.http_client.get_text(url).await
    }
}
