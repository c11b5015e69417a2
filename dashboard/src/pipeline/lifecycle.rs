//! Explicit deployment writes: manual creation and status updates

use tracing::info;

use crate::errors::DashboardError;
use crate::models::deployment::{
    Deployment, DeploymentPatch, DeploymentStatus, NewDeployment,
};
use crate::pipeline::transitions::validate_transition;
use crate::storage::store::DeploymentStore;
use crate::utils::validate_deployment_id;

/// Optional fields of a manual deployment
#[derive(Debug, Clone, Default)]
pub struct CreateInput {
    pub project_name: Option<String>,
    pub status: Option<String>,
    pub branch: Option<String>,
    pub commit_hash: Option<String>,
    pub commit_message: Option<String>,
}

fn parse_status(raw: &str) -> Result<DeploymentStatus, DashboardError> {
    let status = DeploymentStatus::parse(raw);
    if !status.is_recognized() {
        return Err(DashboardError::ValidationError(format!(
            "Unrecognized status: {}",
            raw.trim()
        )));
    }
    Ok(status)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Create a deployment, filling absent fields with the manual defaults
pub async fn create_deployment(
    store: &dyn DeploymentStore,
    input: CreateInput,
) -> Result<Deployment, DashboardError> {
    let defaults = NewDeployment::default();
    let status = match non_empty(input.status) {
        Some(raw) => parse_status(&raw)?,
        None => defaults.status,
    };

    let new = NewDeployment {
        project_name: non_empty(input.project_name).unwrap_or(defaults.project_name),
        status,
        branch: non_empty(input.branch).unwrap_or(defaults.branch),
        commit_hash: non_empty(input.commit_hash).unwrap_or(defaults.commit_hash),
        commit_message: non_empty(input.commit_message).or(defaults.commit_message),
    };

    let deployment = store.create(new).await?;
    info!(
        "Created deployment {} for {} [{}]",
        deployment.id, deployment.project_name, deployment.status
    );
    Ok(deployment)
}

/// Update the status and/or logs of deployment `raw_id`.
///
/// A new status must be recognized and reachable from the stored one.
pub async fn update_deployment(
    store: &dyn DeploymentStore,
    raw_id: &str,
    status: Option<&str>,
    logs: Option<String>,
) -> Result<Deployment, DashboardError> {
    let id = validate_deployment_id(raw_id)?;
    let status = status.map(parse_status).transpose()?;

    let target = status.clone();
    let patch = DeploymentPatch {
        status,
        logs,
        ..Default::default()
    };

    // Checked against the record as stored at write time
    let deployment = store
        .patch_checked(id, patch, &|current: &Deployment| match &target {
            Some(next) => validate_transition(&current.status, next),
            None => Ok(()),
        })
        .await?;
    info!("Deployment {} is now {}", deployment.id, deployment.status);
    Ok(deployment)
}
