//! Status transition table for pipeline updates
//!
//! Explicit status writes (PATCH) go through [`validate_transition`]. Sync
//! does not: the CI provider is authoritative for the runs it reports.

use crate::errors::DashboardError;
use crate::models::deployment::DeploymentStatus;

/// Position of an in-flight status in the pipeline, `None` otherwise
fn progress_rank(status: &DeploymentStatus) -> Option<u8> {
    match status {
        DeploymentStatus::Queued => Some(0),
        DeploymentStatus::Running => Some(1),
        DeploymentStatus::Linting => Some(2),
        DeploymentStatus::Testing => Some(3),
        DeploymentStatus::Building => Some(4),
        DeploymentStatus::Deploying => Some(5),
        _ => None,
    }
}

/// Check that a deployment may move from `from` to `to`.
///
/// Rules:
/// - the target must be a recognized status
/// - writing the current status again is always allowed
/// - a record holding an unrecognized status may move anywhere
/// - in-flight statuses only move forward, or finish
/// - finished deployments may only be re-queued
pub fn validate_transition(
    from: &DeploymentStatus,
    to: &DeploymentStatus,
) -> Result<(), DashboardError> {
    let allowed = match (from, to) {
        (_, DeploymentStatus::Other(_)) => false,
        (from, to) if from == to => true,
        (DeploymentStatus::Other(_), _) => true,

        // From finished
        (from, DeploymentStatus::Queued) if from.is_finished() => true,
        (from, _) if from.is_finished() => false,

        // From in-flight
        (_, to) if to.is_finished() => true,
        (from, to) => match (progress_rank(from), progress_rank(to)) {
            (Some(a), Some(b)) => b > a,
            _ => false,
        },
    };

    if allowed {
        Ok(())
    } else {
        Err(DashboardError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}
