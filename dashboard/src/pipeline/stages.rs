//! Pipeline stage inference
//!
//! Maps a coarse deployment status plus free-text logs onto the fixed
//! five-stage pipeline graph. Pure and total: every input, including
//! unrecognized statuses and empty logs, yields a valid sequence.
//!
//! Failure-stage detection scans the logs for well-known markers. This is a
//! best-effort heuristic; callers only see [`infer_stages`], so it can be
//! swapped for explicit per-stage reporting later.

use serde::{Deserialize, Serialize};

use crate::models::deployment::{Deployment, DeploymentStatus};

/// Stages of the pipeline graph, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Start,
    Lint,
    Test,
    Build,
    End,
}

impl Stage {
    pub const ALL: [Stage; 5] = [Stage::Start, Stage::Lint, Stage::Test, Stage::Build, Stage::End];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Start => "Start",
            Stage::Lint => "Lint",
            Stage::Test => "Test",
            Stage::Build => "Build",
            Stage::End => "End",
        }
    }
}

/// Display state of a single stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageState {
    Pending,
    Running,
    Success,
    Failed,
    Skipped,
}

impl StageState {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageState::Pending => "pending",
            StageState::Running => "running",
            StageState::Success => "success",
            StageState::Failed => "failed",
            StageState::Skipped => "skipped",
        }
    }
}

/// A stage together with its inferred state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageView {
    pub stage: Stage,
    pub state: StageState,
}

/// Log markers and the stage they fail, checked in order
const FAILURE_MARKERS: [(&str, usize); 3] = [
    ("linting failed", 1),
    ("tests failed", 2),
    ("build failed", 3),
];

/// Failure index used when no marker matches (Build)
const DEFAULT_FAILURE_INDEX: usize = 3;

/// Infer the state of every pipeline stage.
pub fn infer_stages(status: &str, logs: &str) -> [StageView; 5] {
    // Case-insensitive but otherwise exact: padded statuses are unrecognized
    let normalized = status.to_lowercase();
    let status = match DeploymentStatus::parse(&normalized) {
        parsed if parsed.as_str() == normalized => parsed,
        _ => DeploymentStatus::Other(normalized),
    };

    match status {
        DeploymentStatus::Success => build(|_| StageState::Success),
        DeploymentStatus::Failed | DeploymentStatus::Error => {
            let failed_at = failure_index(logs);
            build(|index| match index.cmp(&failed_at) {
                std::cmp::Ordering::Less => StageState::Success,
                std::cmp::Ordering::Equal => StageState::Failed,
                std::cmp::Ordering::Greater => StageState::Skipped,
            })
        }
        other => match active_index(&other) {
            Some(active) => build(|index| match index.cmp(&active) {
                std::cmp::Ordering::Less => StageState::Success,
                std::cmp::Ordering::Equal => StageState::Running,
                std::cmp::Ordering::Greater => StageState::Pending,
            }),
            None => build(|_| StageState::Pending),
        },
    }
}

/// Stages of a stored deployment
pub fn stages_for(deployment: &Deployment) -> [StageView; 5] {
    infer_stages(deployment.status.as_str(), deployment.logs_str())
}

fn build(state_at: impl Fn(usize) -> StageState) -> [StageView; 5] {
    std::array::from_fn(|index| StageView {
        stage: Stage::ALL[index],
        state: state_at(index),
    })
}

fn failure_index(logs: &str) -> usize {
    let logs = logs.to_lowercase();
    FAILURE_MARKERS
        .iter()
        .find(|(marker, _)| logs.contains(marker))
        .map(|(_, index)| *index)
        .unwrap_or(DEFAULT_FAILURE_INDEX)
}

fn active_index(status: &DeploymentStatus) -> Option<usize> {
    match status {
        DeploymentStatus::Queued => Some(0),
        DeploymentStatus::Linting => Some(1),
        DeploymentStatus::Testing => Some(2),
        DeploymentStatus::Building | DeploymentStatus::Deploying => Some(3),
        _ => None,
    }
}
