//! On-demand log analysis of a stored deployment

use std::sync::Arc;

use tracing::{info, warn};

use crate::errors::{AnalysisError, DashboardError};
use crate::http::gemini::LogAnalyzer;
use crate::models::deployment::DeploymentPatch;
use crate::storage::store::DeploymentStore;
use crate::utils::validate_deployment_id;

/// Analyze the logs of deployment `raw_id` and cache the result on the record.
///
/// Checks run before any side effect, in order: id present and well formed,
/// analyzer configured, deployment exists, deployment has logs.
pub async fn analyze_deployment(
    store: &dyn DeploymentStore,
    analyzer: Option<&Arc<dyn LogAnalyzer>>,
    raw_id: &str,
) -> Result<String, DashboardError> {
    let id = validate_deployment_id(raw_id)?;

    let Some(analyzer) = analyzer else {
        return Err(DashboardError::ConfigError(
            "GEMINI_API_KEY is not configured".to_string(),
        ));
    };

    let deployment = store
        .get(id)
        .await?
        .ok_or_else(|| DashboardError::NotFound("Deployment".to_string()))?;

    if !deployment.has_logs() {
        return Err(AnalysisError::NoLogs.into());
    }

    info!("Analyzing logs of deployment {} ({})", id, deployment.status);
    let analysis = analyzer
        .analyze(deployment.logs_str(), deployment.status.as_str())
        .await
        .inspect_err(|e| warn!("Analysis of deployment {} failed: {}", id, e))?;

    store
        .patch(
            id,
            DeploymentPatch {
                ai_analysis: Some(analysis.clone()),
                ..Default::default()
            },
        )
        .await?;

    Ok(analysis)
}
