//! Reconciliation of GitHub workflow runs into deployment records

use std::sync::Arc;

use openapi_client::models::{JobList, WorkflowRun};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::errors::{DashboardError, UpstreamError};
use crate::http::github::RunSource;
use crate::models::deployment::{
    Deployment, DeploymentPatch, DeploymentStatus, DEFAULT_BRANCH, SYNCED_PROJECT_NAME,
};
use crate::storage::store::DeploymentStore;
use crate::utils::tail_chars;

/// Logs of a run that has not been fetched yet
pub const FETCHING_LOGS: &str = "Fetching logs...";

pub const NO_JOBS_LOGS: &str = "No jobs were reported for this run; logs are unavailable.";

pub const FETCH_ERROR_LOGS: &str = "Error retrieving logs from GitHub.";

/// Longer logs keep only their end, where failures are reported
pub const MAX_STORED_LOG_CHARS: usize = 200_000;

/// Commit message used when GitHub reports no head commit
pub const DEFAULT_RUN_MESSAGE: &str = "GitHub Run";

/// Placeholder for a log download rejected with HTTP `code`
pub fn http_failure_logs(code: u16) -> String {
    format!(
        "Logs could not be retrieved from GitHub (Status: {code}).\n\
         Ensure your GITHUB_TOKEN has 'repo' scope."
    )
}

/// Conclusions counted as a successful run
const SUCCESS_CONCLUSIONS: [&str; 2] = ["success", "neutral"];

/// Step name fragments and the status they indicate, first match wins
const STEP_KEYWORDS: [(&str, DeploymentStatus); 4] = [
    ("lint", DeploymentStatus::Linting),
    ("test", DeploymentStatus::Testing),
    ("build", DeploymentStatus::Building),
    ("docker", DeploymentStatus::Building),
];

/// Status derived from the run summary alone
pub fn base_status(run: &WorkflowRun) -> DeploymentStatus {
    if run.is_completed() {
        let success = run
            .conclusion
            .as_deref()
            .is_some_and(|c| SUCCESS_CONCLUSIONS.contains(&c));
        if success {
            DeploymentStatus::Success
        } else {
            DeploymentStatus::Failed
        }
    } else if run.is_in_progress() {
        DeploymentStatus::Running
    } else {
        DeploymentStatus::Queued
    }
}

/// Classify a step name, case-insensitively
pub fn classify_step(name: &str) -> Option<DeploymentStatus> {
    let name = name.to_lowercase();
    STEP_KEYWORDS
        .iter()
        .find(|(keyword, _)| name.contains(keyword))
        .map(|(_, status)| status.clone())
}

/// Refine `running` from the first in-progress step across all jobs
pub fn refine_running(jobs: &JobList) -> DeploymentStatus {
    jobs.jobs
        .iter()
        .flat_map(|job| job.steps.iter())
        .find(|step| step.is_in_progress())
        .and_then(|step| classify_step(&step.name))
        .unwrap_or(DeploymentStatus::Running)
}

/// Outcome of a log download attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFetch {
    /// Raw log text
    Fetched(String),

    /// Placeholder explaining why no logs could be downloaded
    Unavailable(String),

    /// Not attempted in this pass
    Skipped,
}

impl LogFetch {
    fn from_error(err: &UpstreamError) -> Self {
        match err.status() {
            Some(code) => LogFetch::Unavailable(http_failure_logs(code)),
            None => LogFetch::Unavailable(FETCH_ERROR_LOGS.to_string()),
        }
    }

    /// Logs stored on a newly created record
    fn initial_logs(&self) -> String {
        match self {
            LogFetch::Fetched(text) if text.trim().is_empty() => FETCHING_LOGS.to_string(),
            LogFetch::Fetched(text) | LogFetch::Unavailable(text) => text.clone(),
            LogFetch::Skipped => FETCHING_LOGS.to_string(),
        }
    }

    /// Logs written over an existing record, if any.
    ///
    /// Fetched text replaces anything. A placeholder only fills in logs that
    /// are missing or still pending, so real logs are never erased.
    fn replacement_logs(&self, existing: Option<&str>) -> Option<String> {
        match self {
            LogFetch::Fetched(text) if !text.trim().is_empty() => Some(text.clone()),
            LogFetch::Unavailable(placeholder) => {
                let pending = existing
                    .is_none_or(|logs| logs.trim().is_empty() || logs == FETCHING_LOGS);
                pending.then(|| placeholder.clone())
            }
            _ => None,
        }
    }
}

/// Summary of one reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Runs returned by the source
    pub fetched: usize,

    pub created: usize,

    pub updated: usize,

    /// Runs skipped because of a per-run error
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Created,
    Updated,
}

/// Maps workflow runs onto deployment records
pub struct Reconciler {
    store: Arc<dyn DeploymentStore>,
    source: Arc<dyn RunSource>,
    run_window: u32,
}

impl Reconciler {
    pub fn new(store: Arc<dyn DeploymentStore>, source: Arc<dyn RunSource>, run_window: u32) -> Self {
        Self {
            store,
            source,
            run_window,
        }
    }

    /// Fetch the most recent runs and reconcile each of them.
    ///
    /// Fails only when the run list itself cannot be fetched, in which case
    /// nothing is written. Errors on individual runs are counted in the
    /// report.
    pub async fn sync_pass(&self) -> Result<SyncReport, DashboardError> {
        let runs = self.source.list_recent_runs(self.run_window).await?;
        info!("Fetched {} workflow runs from GitHub", runs.len());

        let mut report = SyncReport {
            fetched: runs.len(),
            ..Default::default()
        };

        for run in &runs {
            match self.reconcile_run(run).await {
                Ok(RunOutcome::Created) => report.created += 1,
                Ok(RunOutcome::Updated) => report.updated += 1,
                Err(e) => {
                    error!("Failed to reconcile run {}: {}", run.id, e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "Sync pass done: {} created, {} updated, {} failed",
            report.created, report.updated, report.failed
        );
        Ok(report)
    }

    /// Create or update the deployment mirroring `run`
    pub async fn reconcile_run(&self, run: &WorkflowRun) -> Result<RunOutcome, DashboardError> {
        let id = run.id.to_string();
        let status = self.resolve_status(run).await;
        let logs = if run.is_completed() {
            self.fetch_logs(run).await
        } else {
            LogFetch::Skipped
        };

        let existing = self.store.get(&id).await?;
        let ended_at = status.is_terminal().then_some(run.updated_at);

        let create = Deployment {
            id: id.clone(),
            project_name: SYNCED_PROJECT_NAME.to_string(),
            status: status.clone(),
            branch: run
                .head_branch
                .clone()
                .filter(|b| !b.is_empty())
                .unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
            commit_hash: run.head_sha.clone(),
            commit_message: Some(
                run.commit_message()
                    .unwrap_or(DEFAULT_RUN_MESSAGE)
                    .to_string(),
            ),
            logs: Some(logs.initial_logs()),
            ai_analysis: None,
            created_at: run.created_at,
            updated_at: run.updated_at,
            ended_at,
        };

        let update = DeploymentPatch {
            status: Some(status),
            logs: logs.replacement_logs(existing.as_ref().and_then(|d| d.logs.as_deref())),
            ai_analysis: None,
            updated_at: Some(run.updated_at),
            ended_at,
        };

        let saved = self.store.upsert(create, update).await?;
        debug!("Reconciled run {} as {}", id, saved.status);

        Ok(if existing.is_some() {
            RunOutcome::Updated
        } else {
            RunOutcome::Created
        })
    }

    async fn resolve_status(&self, run: &WorkflowRun) -> DeploymentStatus {
        let status = base_status(run);
        if status != DeploymentStatus::Running {
            return status;
        }

        match self.source.get_job_detail(run).await {
            Ok(jobs) => refine_running(&jobs),
            Err(e) => {
                warn!("Could not fetch jobs of run {}: {}", run.id, e);
                status
            }
        }
    }

    async fn fetch_logs(&self, run: &WorkflowRun) -> LogFetch {
        let jobs = match self.source.get_job_detail(run).await {
            Ok(jobs) => jobs,
            Err(e) => {
                warn!("Could not fetch jobs of run {}: {}", run.id, e);
                return LogFetch::from_error(&e);
            }
        };

        let Some(job) = jobs.jobs.first() else {
            warn!("Run {} reported no jobs", run.id);
            return LogFetch::Unavailable(NO_JOBS_LOGS.to_string());
        };

        match self.source.get_raw_log(job.id).await {
            Ok(text) if text.chars().count() > MAX_STORED_LOG_CHARS => {
                debug!(
                    "Keeping the last {} characters of job {} logs",
                    MAX_STORED_LOG_CHARS, job.id
                );
                LogFetch::Fetched(tail_chars(&text, MAX_STORED_LOG_CHARS).to_string())
            }
            Ok(text) => LogFetch::Fetched(text),
            Err(e) => {
                warn!("Could not fetch logs of job {}: {}", job.id, e);
                LogFetch::from_error(&e)
            }
        }
    }
}
