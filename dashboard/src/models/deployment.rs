//! Deployment models

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Project label for manually created deployments
pub const DEFAULT_PROJECT_NAME: &str = "DeployLog";

/// Project label for records created by GitHub sync
pub const SYNCED_PROJECT_NAME: &str = "DeployLog (GitHub)";

pub const DEFAULT_BRANCH: &str = "main";

/// Sentinel commit hash used when none is given
pub const DEFAULT_COMMIT_HASH: &str = "HEAD";

pub const DEFAULT_COMMIT_MESSAGE: &str = "Manual deployment";

/// Pipeline status of a deployment.
///
/// Stored as a free-form string. Values outside the recognized set survive
/// a round trip as [`DeploymentStatus::Other`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DeploymentStatus {
    #[default]
    Queued,
    Running,
    Linting,
    Testing,
    Building,
    Deploying,
    Success,
    Failed,
    Error,
    Other(String),
}

impl DeploymentStatus {
    /// Parse a status string, case-insensitively. Never fails.
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_lowercase();
        match normalized.as_str() {
            "queued" => DeploymentStatus::Queued,
            "running" => DeploymentStatus::Running,
            "linting" => DeploymentStatus::Linting,
            "testing" => DeploymentStatus::Testing,
            "building" => DeploymentStatus::Building,
            "deploying" => DeploymentStatus::Deploying,
            "success" => DeploymentStatus::Success,
            "failed" => DeploymentStatus::Failed,
            "error" => DeploymentStatus::Error,
            _ => DeploymentStatus::Other(normalized),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            DeploymentStatus::Queued => "queued",
            DeploymentStatus::Running => "running",
            DeploymentStatus::Linting => "linting",
            DeploymentStatus::Testing => "testing",
            DeploymentStatus::Building => "building",
            DeploymentStatus::Deploying => "deploying",
            DeploymentStatus::Success => "success",
            DeploymentStatus::Failed => "failed",
            DeploymentStatus::Error => "error",
            DeploymentStatus::Other(s) => s,
        }
    }

    /// `success` and `failed` end a deployment and carry an `ended_at`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeploymentStatus::Success | DeploymentStatus::Failed)
    }

    /// Terminal statuses plus `error`; nothing further happens to the run
    pub fn is_finished(&self) -> bool {
        self.is_terminal() || matches!(self, DeploymentStatus::Error)
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, DeploymentStatus::Other(_))
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for DeploymentStatus {
    fn from(value: String) -> Self {
        DeploymentStatus::parse(&value)
    }
}

impl From<DeploymentStatus> for String {
    fn from(value: DeploymentStatus) -> Self {
        value.as_str().to_string()
    }
}

/// A persisted deployment record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    /// Local UUID or the GitHub run id
    pub id: String,

    pub project_name: String,

    pub status: DeploymentStatus,

    pub branch: String,

    pub commit_hash: String,

    #[serde(default)]
    pub commit_message: Option<String>,

    /// Raw CI output
    #[serde(default)]
    pub logs: Option<String>,

    /// Markdown produced by the last successful analysis
    #[serde(default)]
    pub ai_analysis: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// Set iff `status` is terminal
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
}

impl Deployment {
    /// Build a record from creation input, stamping it at `now`
    pub fn from_new(id: String, new: NewDeployment, now: DateTime<Utc>) -> Self {
        let ended_at = new.status.is_terminal().then_some(now);
        Self {
            id,
            project_name: new.project_name,
            status: new.status,
            branch: new.branch,
            commit_hash: new.commit_hash,
            commit_message: new.commit_message,
            logs: None,
            ai_analysis: None,
            created_at: now,
            updated_at: now,
            ended_at,
        }
    }

    /// Logs as a string slice, empty when absent
    pub fn logs_str(&self) -> &str {
        self.logs.as_deref().unwrap_or("")
    }

    pub fn has_logs(&self) -> bool {
        !self.logs_str().trim().is_empty()
    }

    /// Apply a partial update.
    ///
    /// `updated_at` always moves (to the patch's timestamp or `now`). A status
    /// write re-derives `ended_at`: terminal keeps the existing end time when
    /// the status is unchanged, otherwise takes the patch's or `now`;
    /// non-terminal clears it.
    pub fn apply_patch(&mut self, patch: DeploymentPatch, now: DateTime<Utc>) {
        let stamp = patch.updated_at.unwrap_or(now);

        if let Some(status) = patch.status {
            self.ended_at = if status.is_terminal() {
                let kept = if self.status == status { self.ended_at } else { None };
                Some(patch.ended_at.or(kept).unwrap_or(stamp))
            } else {
                None
            };
            self.status = status;
        }

        if let Some(logs) = patch.logs {
            self.logs = Some(logs);
        }

        if let Some(analysis) = patch.ai_analysis {
            self.ai_analysis = Some(analysis);
        }

        self.updated_at = stamp;
    }
}

/// Input for a user-triggered "new deployment"
#[derive(Debug, Clone, PartialEq)]
pub struct NewDeployment {
    pub project_name: String,
    pub status: DeploymentStatus,
    pub branch: String,
    pub commit_hash: String,
    pub commit_message: Option<String>,
}

impl Default for NewDeployment {
    fn default() -> Self {
        Self {
            project_name: DEFAULT_PROJECT_NAME.to_string(),
            status: DeploymentStatus::Queued,
            branch: DEFAULT_BRANCH.to_string(),
            commit_hash: DEFAULT_COMMIT_HASH.to_string(),
            commit_message: Some(DEFAULT_COMMIT_MESSAGE.to_string()),
        }
    }
}

/// Partial update of a deployment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeploymentPatch {
    pub status: Option<DeploymentStatus>,

    pub logs: Option<String>,

    pub ai_analysis: Option<String>,

    /// Explicit modification time; `now` when absent
    pub updated_at: Option<DateTime<Utc>>,

    /// Explicit end time, only used when `status` is terminal
    pub ended_at: Option<DateTime<Utc>>,
}

impl DeploymentPatch {
    pub fn status(status: DeploymentStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn with_logs(mut self, logs: impl Into<String>) -> Self {
        self.logs = Some(logs.into());
        self
    }
}
