//! Error types for the DeployLog dashboard

use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use openapi_server::models::ErrorResponse;
use thiserror::Error;

/// Main error type for the dashboard
#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Sync error: {0}")]
    SyncError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure talking to an external HTTP collaborator.
///
/// Always carries enough information to tell "not found", "rate limited" and
/// "server error" apart.
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl UpstreamError {
    /// HTTP status reported by the upstream, if the request got that far
    pub fn status(&self) -> Option<u16> {
        match self {
            UpstreamError::NotFound(_) => Some(404),
            UpstreamError::RateLimited(_) => Some(429),
            UpstreamError::Status { status, .. } => Some(*status),
            UpstreamError::Transport(e) => e.status().map(|s| s.as_u16()),
            UpstreamError::InvalidUrl(_) => None,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, UpstreamError::RateLimited(_))
    }
}

/// Failure kinds of the log analysis service
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("No logs available for this deployment")]
    NoLogs,

    #[error("Analysis quota exceeded, try again later: {0}")]
    RateLimited(String),

    #[error("{0}")]
    Other(String),
}

impl DashboardError {
    /// HTTP status used when the error reaches an API client
    pub fn status_code(&self) -> StatusCode {
        match self {
            DashboardError::ValidationError(_) => StatusCode::BAD_REQUEST,
            DashboardError::InvalidTransition { .. } => StatusCode::CONFLICT,
            DashboardError::NotFound(_) => StatusCode::NOT_FOUND,
            DashboardError::Analysis(AnalysisError::NoLogs) => StatusCode::BAD_REQUEST,
            DashboardError::Analysis(AnalysisError::RateLimited(_)) => {
                StatusCode::TOO_MANY_REQUESTS
            }
            DashboardError::Analysis(AnalysisError::Other(_)) => StatusCode::BAD_GATEWAY,
            DashboardError::Upstream(e) if e.is_rate_limited() => StatusCode::TOO_MANY_REQUESTS,
            DashboardError::Upstream(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to API clients
    pub fn public_message(&self) -> String {
        match self {
            DashboardError::ValidationError(msg) => msg.clone(),
            DashboardError::NotFound(what) => format!("{what} not found"),
            DashboardError::InvalidTransition { .. } => self.to_string(),
            DashboardError::Analysis(AnalysisError::Other(msg)) => format!("AI Error: {msg}"),
            DashboardError::Analysis(e) => e.to_string(),
            DashboardError::Upstream(e) if e.is_rate_limited() => {
                "GitHub rate limit reached, try again later".to_string()
            }
            DashboardError::Upstream(_) => "Failed to fetch from GitHub".to_string(),
            DashboardError::ConfigError(msg) => msg.clone(),
            _ => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        let body = ErrorResponse {
            error: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}
