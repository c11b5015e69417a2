//! In-process fakes for the external collaborators

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use openapi_client::models::{HeadCommit, Job, JobList, Step, WorkflowRun};

use deploylog::errors::{AnalysisError, DashboardError, UpstreamError};
use deploylog::http::gemini::LogAnalyzer;
use deploylog::http::github::RunSource;
use deploylog::models::deployment::{Deployment, DeploymentPatch, NewDeployment};
use deploylog::storage::store::{DeploymentStore, JsonStore, RecordCheck};

/// Failure injected into a fake upstream call
#[derive(Debug, Clone, Copy)]
pub enum Failure {
    Status(u16),
    RateLimited,
    Transport,
}

impl Failure {
    fn into_error(self) -> UpstreamError {
        match self {
            Failure::Status(404) => UpstreamError::NotFound("resource".into()),
            Failure::Status(status) => UpstreamError::Status {
                status,
                body: "upstream said no".into(),
            },
            Failure::RateLimited => UpstreamError::RateLimited("API rate limit exceeded".into()),
            Failure::Transport => UpstreamError::InvalidUrl("connection reset".into()),
        }
    }
}

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap()
}

/// A workflow run created `minutes` after the base time, updated 5 minutes later
pub fn run(id: u64, status: &str, conclusion: Option<&str>, minutes: i64) -> WorkflowRun {
    let created_at = base_time() + Duration::minutes(minutes);
    WorkflowRun {
        id,
        name: Some("CI".into()),
        status: status.into(),
        conclusion: conclusion.map(str::to_string),
        head_branch: Some("main".into()),
        head_sha: format!("sha{id}"),
        head_commit: Some(HeadCommit {
            id: Some(format!("sha{id}")),
            message: format!("Commit {id}"),
        }),
        created_at,
        updated_at: created_at + Duration::minutes(5),
        jobs_url: format!("https://api.github.com/repos/o/r/actions/runs/{id}/jobs"),
    }
}

/// A job with `(name, status)` steps
pub fn job(id: u64, steps: &[(&str, &str)]) -> JobList {
    JobList {
        total_count: 1,
        jobs: vec![Job {
            id,
            name: "build".into(),
            status: "in_progress".into(),
            conclusion: None,
            steps: steps
                .iter()
                .enumerate()
                .map(|(i, (name, status))| Step {
                    name: name.to_string(),
                    status: status.to_string(),
                    conclusion: None,
                    number: i as u32 + 1,
                })
                .collect(),
        }],
    }
}

/// Scriptable [`RunSource`]
#[derive(Default)]
pub struct FakeRunSource {
    runs: Mutex<Vec<WorkflowRun>>,
    list_failure: Mutex<Option<Failure>>,
    jobs: Mutex<HashMap<u64, Result<JobList, Failure>>>,
    logs: Mutex<HashMap<u64, Result<String, Failure>>>,
    pub requested_limits: Mutex<Vec<u32>>,
}

impl FakeRunSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_runs(&self, runs: Vec<WorkflowRun>) {
        *self.runs.lock().unwrap() = runs;
    }

    pub fn fail_listing(&self, failure: Option<Failure>) {
        *self.list_failure.lock().unwrap() = failure;
    }

    pub fn set_jobs(&self, run_id: u64, jobs: Result<JobList, Failure>) {
        self.jobs.lock().unwrap().insert(run_id, jobs);
    }

    pub fn set_log(&self, job_id: u64, log: Result<&str, Failure>) {
        self.logs
            .lock()
            .unwrap()
            .insert(job_id, log.map(str::to_string));
    }
}

#[async_trait]
impl RunSource for FakeRunSource {
    async fn list_recent_runs(&self, limit: u32) -> Result<Vec<WorkflowRun>, UpstreamError> {
        self.requested_limits.lock().unwrap().push(limit);
        if let Some(failure) = *self.list_failure.lock().unwrap() {
            return Err(failure.into_error());
        }
        let runs = self.runs.lock().unwrap();
        Ok(runs.iter().take(limit as usize).cloned().collect())
    }

    async fn get_job_detail(&self, run: &WorkflowRun) -> Result<JobList, UpstreamError> {
        match self.jobs.lock().unwrap().get(&run.id) {
            Some(Ok(jobs)) => Ok(jobs.clone()),
            Some(Err(failure)) => Err(failure.into_error()),
            None => Ok(JobList::default()),
        }
    }

    async fn get_raw_log(&self, job_id: u64) -> Result<String, UpstreamError> {
        match self.logs.lock().unwrap().get(&job_id) {
            Some(Ok(text)) => Ok(text.clone()),
            Some(Err(failure)) => Err(failure.into_error()),
            None => Err(Failure::Status(404).into_error()),
        }
    }
}

/// [`LogAnalyzer`] answering with a fixed result
pub struct FakeAnalyzer {
    result: Result<String, AnalysisError>,
}

impl FakeAnalyzer {
    pub fn answering(text: &str) -> Arc<Self> {
        Arc::new(Self {
            result: Ok(text.to_string()),
        })
    }

    pub fn failing(err: AnalysisError) -> Arc<Self> {
        Arc::new(Self { result: Err(err) })
    }
}

#[async_trait]
impl LogAnalyzer for FakeAnalyzer {
    async fn analyze(&self, _logs: &str, _status_hint: &str) -> Result<String, AnalysisError> {
        self.result.clone()
    }
}

/// In-memory store whose writes fail for selected ids
pub struct FlakyStore {
    inner: JsonStore,
    failing_ids: Mutex<HashSet<String>>,
}

impl FlakyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: JsonStore::in_memory(),
            failing_ids: Mutex::new(HashSet::new()),
        })
    }

    pub fn fail_writes_for(&self, id: &str) {
        self.failing_ids.lock().unwrap().insert(id.to_string());
    }

    fn check(&self, id: &str) -> Result<(), DashboardError> {
        if self.failing_ids.lock().unwrap().contains(id) {
            return Err(DashboardError::StorageError(format!("disk full writing {id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl DeploymentStore for FlakyStore {
    async fn create(&self, new: NewDeployment) -> Result<Deployment, DashboardError> {
        self.inner.create(new).await
    }

    async fn upsert(
        &self,
        create: Deployment,
        update: DeploymentPatch,
    ) -> Result<Deployment, DashboardError> {
        self.check(&create.id)?;
        self.inner.upsert(create, update).await
    }

    async fn get(&self, id: &str) -> Result<Option<Deployment>, DashboardError> {
        self.inner.get(id).await
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<Deployment>, DashboardError> {
        self.inner.list_recent(limit).await
    }

    async fn patch_checked(
        &self,
        id: &str,
        patch: DeploymentPatch,
        check: RecordCheck<'_>,
    ) -> Result<Deployment, DashboardError> {
        self.check(id)?;
        self.inner.patch_checked(id, patch, check).await
    }
}
