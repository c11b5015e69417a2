//! GitHub Actions REST models
//!
//! Only the fields DeployLog reads are modelled; everything else in the
//! payloads is ignored by serde.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Response of `GET /repos/{owner}/{repo}/actions/runs`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowRunList {
    #[serde(default)]
    pub total_count: u64,

    #[serde(default)]
    pub workflow_runs: Vec<WorkflowRun>,
}

/// A single workflow run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRun {
    /// Native numeric run id
    pub id: u64,

    #[serde(default)]
    pub name: Option<String>,

    /// "queued", "in_progress", "completed", "waiting", "requested", "pending"
    pub status: String,

    /// "success", "failure", "cancelled", "neutral", "skipped", "timed_out", ...
    #[serde(default)]
    pub conclusion: Option<String>,

    #[serde(default)]
    pub head_branch: Option<String>,

    pub head_sha: String,

    #[serde(default)]
    pub head_commit: Option<HeadCommit>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Absolute URL of the run's jobs listing
    pub jobs_url: String,
}

impl WorkflowRun {
    pub fn is_completed(&self) -> bool {
        self.status == "completed"
    }

    pub fn is_in_progress(&self) -> bool {
        self.status == "in_progress"
    }

    /// Commit message of the head commit, if GitHub reported one
    pub fn commit_message(&self) -> Option<&str> {
        self.head_commit.as_ref().map(|c| c.message.as_str())
    }
}

/// Head commit summary embedded in a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadCommit {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub message: String,
}

/// Response of a run's `jobs_url`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobList {
    #[serde(default)]
    pub total_count: u64,

    #[serde(default)]
    pub jobs: Vec<Job>,
}

/// A job within a workflow run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: u64,

    #[serde(default)]
    pub name: String,

    pub status: String,

    #[serde(default)]
    pub conclusion: Option<String>,

    #[serde(default)]
    pub steps: Vec<Step>,
}

/// A step within a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub name: String,

    pub status: String,

    #[serde(default)]
    pub conclusion: Option<String>,

    #[serde(default)]
    pub number: u32,
}

impl Step {
    pub fn is_in_progress(&self) -> bool {
        self.status == "in_progress"
    }
}
