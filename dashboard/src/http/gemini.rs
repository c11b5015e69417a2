//! Gemini log analysis client

use async_trait::async_trait;
use openapi_client::models::{GenerateContentRequest, GenerateContentResponse};
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};

use crate::errors::{AnalysisError, DashboardError, UpstreamError};
use crate::http::client::HttpClient;
use crate::storage::settings::AnalysisSettings;
use crate::utils::truncate_chars;

/// Free-text analysis of CI logs
#[async_trait]
pub trait LogAnalyzer: Send + Sync {
    /// Analyze `logs` for a deployment whose status is `status_hint`,
    /// returning markdown
    async fn analyze(&self, logs: &str, status_hint: &str) -> Result<String, AnalysisError>;
}

/// Build the analysis prompt. Only the first `max_chars` characters of the
/// logs are included.
pub fn build_prompt(logs: &str, status_hint: &str, max_chars: usize) -> String {
    let logs = truncate_chars(logs, max_chars);
    let status = status_hint.trim().to_lowercase();

    if status == "failed" || status == "error" {
        format!(
            "Analyze the following CI/CD deployment logs and explain why it failed.\n\
             Provide a concise summary of the error and suggest 2-3 actionable steps to fix it.\n\
             Format the response in Markdown.\n\n\
             Logs:\n{logs}\n"
        )
    } else {
        format!(
            "Analyze the following CI/CD deployment logs for a successful build.\n\
             Provide a summary of what was deployed, any warnings or optimizations noted, and the total time if available.\n\
             Format the response in Markdown with sections for 'Summary', 'Warnings/Notes', and 'Optimization Tips'.\n\n\
             Logs:\n{logs}\n"
        )
    }
}

/// Gemini `generateContent` implementation of [`LogAnalyzer`]
pub struct GeminiAnalyzer {
    http_client: HttpClient,
    model: String,
    max_log_chars: usize,
}

impl GeminiAnalyzer {
    pub fn new(settings: &AnalysisSettings, api_key: &SecretString) -> Result<Self, DashboardError> {
        let mut key = HeaderValue::from_str(api_key.expose_secret()).map_err(|_| {
            DashboardError::ConfigError("GEMINI_API_KEY contains invalid characters".into())
        })?;
        key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert("x-goog-api-key", key);

        Ok(Self {
            http_client: HttpClient::new(&settings.api_base_url, headers)?,
            model: settings.model.trim_start_matches("models/").to_string(),
            max_log_chars: settings.max_log_chars,
        })
    }
}

#[async_trait]
impl LogAnalyzer for GeminiAnalyzer {
    async fn analyze(&self, logs: &str, status_hint: &str) -> Result<String, AnalysisError> {
        if logs.trim().is_empty() {
            return Err(AnalysisError::NoLogs);
        }

        let prompt = build_prompt(logs, status_hint, self.max_log_chars);
        let request = GenerateContentRequest::from_prompt(prompt);
        let url = self
            .http_client
            .resolve(&format!("/v1beta/models/{}:generateContent", self.model))
            .map_err(|e| AnalysisError::Other(e.to_string()))?;

        debug!("Requesting analysis from model {}", self.model);
        let response: GenerateContentResponse = self
            .http_client
            .post_json(url, &request)
            .await
            .map_err(|e| match e {
                UpstreamError::RateLimited(body) => AnalysisError::RateLimited(body),
                other => AnalysisError::Other(other.to_string()),
            })?;

        let text = response
            .text()
            .ok_or_else(|| AnalysisError::Other("Model returned no text".to_string()))?;

        info!("Received analysis ({} chars)", text.len());
        Ok(text)
    }
}
