//! Settings file management

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::DashboardError;
use crate::filesys::file::File;
use crate::logs::LogLevel;

/// Dashboard settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit JSON formatted logs
    #[serde(default)]
    pub log_json: bool,

    /// Also write logs to daily rolling files under the logs directory
    #[serde(default)]
    pub log_to_file: bool,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerSettings,

    /// GitHub Actions run source
    #[serde(default)]
    pub github: GithubSettings,

    /// Log analysis service
    #[serde(default)]
    pub analysis: AnalysisSettings,

    /// Periodic sync worker
    #[serde(default)]
    pub poller: PollerSettings,

    /// Interval between stage snapshots on the watch stream, in milliseconds
    #[serde(default = "default_watch_interval_ms")]
    pub watch_interval_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_watch_interval_ms() -> u64 {
    2000
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_json: false,
            log_to_file: false,
            server: ServerSettings::default(),
            github: GithubSettings::default(),
            analysis: AnalysisSettings::default(),
            poller: PollerSettings::default(),
            watch_interval_ms: default_watch_interval_ms(),
        }
    }
}

impl Settings {
    /// Load settings from `file`, falling back to defaults when it is absent
    pub async fn load(file: &File) -> Result<Self, DashboardError> {
        if !file.exists().await {
            info!(
                "No settings file at {}, using defaults",
                file.path().display()
            );
            return Ok(Self::default());
        }

        file.read_json().await.map_err(|e| {
            DashboardError::ConfigError(format!(
                "Unable to read settings file {}: {}",
                file.path().display(),
                e
            ))
        })
    }

    /// Apply `GITHUB_REPO_OWNER` / `GITHUB_REPO_NAME` overrides
    pub fn apply_env_overrides(&mut self) {
        if let Some(owner) = non_empty_env("GITHUB_REPO_OWNER") {
            debug!("GITHUB_REPO_OWNER override: {}", owner);
            self.github.owner = owner;
        }
        if let Some(repo) = non_empty_env("GITHUB_REPO_NAME") {
            debug!("GITHUB_REPO_NAME override: {}", repo);
            self.github.repo = repo;
        }
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// GitHub Actions settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubSettings {
    /// Base URL of the GitHub REST API
    #[serde(default = "default_github_api")]
    pub api_base_url: String,

    #[serde(default = "default_owner")]
    pub owner: String,

    #[serde(default = "default_repo")]
    pub repo: String,

    /// Number of most recent runs examined per sync pass
    #[serde(default = "default_run_window")]
    pub run_window: u32,
}

fn default_github_api() -> String {
    "https://api.github.com".to_string()
}

fn default_owner() -> String {
    "Jay061205".to_string()
}

fn default_repo() -> String {
    "deploylog".to_string()
}

fn default_run_window() -> u32 {
    10
}

impl Default for GithubSettings {
    fn default() -> Self {
        Self {
            api_base_url: default_github_api(),
            owner: default_owner(),
            repo: default_repo(),
            run_window: default_run_window(),
        }
    }
}

/// Log analysis settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSettings {
    #[serde(default = "default_gemini_api")]
    pub api_base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Only this many leading characters of the logs are analyzed
    #[serde(default = "default_max_log_chars")]
    pub max_log_chars: usize,
}

fn default_gemini_api() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_model() -> String {
    "gemini-pro-latest".to_string()
}

fn default_max_log_chars() -> usize {
    10_000
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            api_base_url: default_gemini_api(),
            model: default_model(),
            max_log_chars: default_max_log_chars(),
        }
    }
}

/// Periodic sync settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,

    #[serde(default = "default_initial_delay")]
    pub initial_delay_secs: u64,
}

fn default_poll_interval() -> u64 {
    30
}

fn default_initial_delay() -> u64 {
    5
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_poll_interval(),
            initial_delay_secs: default_initial_delay(),
        }
    }
}

/// Credentials for external collaborators, read from the environment only
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    /// `GITHUB_TOKEN`; optional, raises rate limits and unlocks private logs
    pub github_token: Option<SecretString>,

    /// `GEMINI_API_KEY`; required for log analysis
    pub gemini_api_key: Option<SecretString>,
}

impl Credentials {
    pub fn from_env() -> Self {
        Self {
            github_token: non_empty_env("GITHUB_TOKEN").map(SecretString::from),
            gemini_api_key: non_empty_env("GEMINI_API_KEY").map(SecretString::from),
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
