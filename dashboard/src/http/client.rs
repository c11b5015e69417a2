//! HTTP client implementation

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, warn};
use url::Url;

use crate::errors::{DashboardError, UpstreamError};

/// Request timeout applied to every outbound call
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// HTTP client for an upstream JSON API
pub struct HttpClient {
    client: Client,
    base_url: Url,
}

impl HttpClient {
    /// Create a new HTTP client sending `headers` with every request
    pub fn new(base_url: &str, mut headers: HeaderMap) -> Result<Self, DashboardError> {
        let base_url = Url::parse(base_url).map_err(|e| {
            DashboardError::ConfigError(format!("Invalid base URL {}: {}", base_url, e))
        })?;

        headers
            .entry(USER_AGENT)
            .or_insert(HeaderValue::from_static(concat!("deploylog/", env!("CARGO_PKG_VERSION"))));

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .default_headers(headers)
            .build()
            .map_err(|e| DashboardError::ConfigError(format!("HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve a path against the base URL; absolute URLs pass through
    pub fn resolve(&self, path_or_url: &str) -> Result<Url, UpstreamError> {
        match Url::parse(path_or_url) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => self
                .base_url
                .join(path_or_url)
                .map_err(|e| UpstreamError::InvalidUrl(format!("{}: {}", path_or_url, e))),
            Err(e) => Err(UpstreamError::InvalidUrl(format!("{}: {}", path_or_url, e))),
        }
    }

    /// Make a GET request and decode the JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, UpstreamError> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    /// Make a GET request and return the body as text
    pub async fn get_text(&self, url: Url) -> Result<String, UpstreamError> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        let response = check_status(response).await?;
        Ok(response.text().await?)
    }

    /// Make a POST request with a JSON body and decode the JSON response
    pub async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        url: Url,
        body: &B,
    ) -> Result<T, UpstreamError> {
        debug!("POST {}", url.path());
        let response = self.client.post(url).json(body).send().await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }
}

/// Turn non-success responses into classified errors
async fn check_status(response: Response) -> Result<Response, UpstreamError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let path = response.url().path().to_string();
    let quota_exhausted = response
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim() == "0");
    let body = response.text().await.unwrap_or_default();

    match status {
        StatusCode::NOT_FOUND => {
            warn!("HTTP {} not found", path);
            Err(UpstreamError::NotFound(path))
        }
        StatusCode::TOO_MANY_REQUESTS => {
            warn!("HTTP {} rate limited", path);
            Err(UpstreamError::RateLimited(body))
        }
        StatusCode::FORBIDDEN if quota_exhausted => {
            warn!("HTTP {} rate limit exhausted", path);
            Err(UpstreamError::RateLimited(body))
        }
        _ => {
            error!("HTTP request failed: {} - {}", status, body);
            Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }
}
