//! HTTP request handlers

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    Json,
};
use futures::stream::{self, Stream};
use openapi_server::models::{
    AnalyzeRequest, AnalyzeResponse, CreateDeploymentRequest, HealthResponse, StageDto,
    StagesResponse, SyncResponse, UpdateDeploymentRequest, VersionResponse,
};
use tracing::debug;

use crate::analysis::analyze_deployment;
use crate::errors::DashboardError;
use crate::models::deployment::Deployment;
use crate::pipeline::lifecycle::{create_deployment, update_deployment, CreateInput};
use crate::pipeline::stages::stages_for;
use crate::server::state::ServerState;
use crate::storage::store::DeploymentStore;
use crate::utils::{validate_deployment_id, version_info};

/// Number of deployments returned by the list endpoint
pub const LIST_LIMIT: usize = 20;

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "deploylog".to_string(),
        version: version.version,
    })
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    let version = version_info();
    Json(VersionResponse {
        version: version.version,
        git_hash: version.git_hash,
        build_time: version.build_time,
    })
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, DashboardError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| DashboardError::ValidationError(rejection.body_text()))
}

async fn load(store: &dyn DeploymentStore, raw_id: &str) -> Result<Deployment, DashboardError> {
    let id = validate_deployment_id(raw_id)?;
    store
        .get(id)
        .await?
        .ok_or_else(|| DashboardError::NotFound("Deployment".to_string()))
}

fn stages_response(deployment: &Deployment) -> StagesResponse {
    StagesResponse {
        id: deployment.id.clone(),
        status: deployment.status.to_string(),
        stages: stages_for(deployment)
            .iter()
            .map(|view| StageDto {
                name: view.stage.name().to_string(),
                status: view.state.as_str().to_string(),
            })
            .collect(),
        updated_at: deployment.updated_at,
    }
}

/// `GET /api/deployments`
pub async fn list_deployments_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<Vec<Deployment>>, DashboardError> {
    let deployments = state.store.list_recent(LIST_LIMIT).await?;
    Ok(Json(deployments))
}

/// `POST /api/deployments`
pub async fn create_deployment_handler(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<CreateDeploymentRequest>, JsonRejection>,
) -> Result<Json<Deployment>, DashboardError> {
    let request = json_body(payload)?;
    let input = CreateInput {
        project_name: request.project_name,
        status: request.status,
        branch: request.branch,
        commit_hash: request.commit_hash,
        commit_message: request.commit_message,
    };
    let deployment = create_deployment(state.store.as_ref(), input).await?;
    Ok(Json(deployment))
}

/// `GET /api/deployments/{id}`
pub async fn get_deployment_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Result<Json<Deployment>, DashboardError> {
    let deployment = load(state.store.as_ref(), &id).await?;
    Ok(Json(deployment))
}

/// `PATCH /api/deployments/{id}`
pub async fn update_deployment_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateDeploymentRequest>, JsonRejection>,
) -> Result<Json<Deployment>, DashboardError> {
    let request = json_body(payload)?;
    let deployment = update_deployment(
        state.store.as_ref(),
        &id,
        request.status.as_deref(),
        request.logs,
    )
    .await?;
    Ok(Json(deployment))
}

/// `GET /api/deployments/{id}/stages`
pub async fn stages_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Result<Json<StagesResponse>, DashboardError> {
    let deployment = load(state.store.as_ref(), &id).await?;
    Ok(Json(stages_response(&deployment)))
}

struct Watch {
    store: Arc<dyn DeploymentStore>,
    id: String,
    interval: Duration,
    started: bool,
    finished: bool,
}

impl Watch {
    async fn next_event(mut self) -> Option<(Result<Event, Infallible>, Self)> {
        if self.finished {
            return None;
        }
        if self.started {
            tokio::time::sleep(self.interval).await;
        }
        self.started = true;

        let event = match self.store.get(&self.id).await {
            Ok(Some(deployment)) => {
                self.finished = deployment.status.is_finished();
                Event::default()
                    .event("stages")
                    .json_data(stages_response(&deployment))
                    .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()))
            }
            Ok(None) => {
                self.finished = true;
                Event::default().event("error").data("Deployment not found")
            }
            Err(e) => {
                self.finished = true;
                Event::default().event("error").data(e.public_message())
            }
        };

        Some((Ok(event), self))
    }
}

/// `GET /api/deployments/{id}/watch`
///
/// Streams a `stages` event per interval until a finished status has been
/// sent. Dropped with the connection.
pub async fn watch_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, DashboardError> {
    let deployment = load(state.store.as_ref(), &id).await?;
    debug!("Watching deployment {}", deployment.id);

    let watch = Watch {
        store: state.store.clone(),
        id: deployment.id,
        interval: state.watch_interval,
        started: false,
        finished: false,
    };
    let events = stream::unfold(watch, Watch::next_event);

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// `GET|POST /api/deployments/sync`
pub async fn sync_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<SyncResponse>, DashboardError> {
    let report = state.syncer.sync_now().await?;
    Ok(Json(SyncResponse {
        success: true,
        count: report.fetched,
        created: report.created,
        updated: report.updated,
        failed: report.failed,
        message: None,
    }))
}

/// `POST /api/analyze`
pub async fn analyze_handler(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, DashboardError> {
    let request = json_body(payload)?;
    let analysis = analyze_deployment(
        state.store.as_ref(),
        state.analyzer.as_ref(),
        request.deployment_id.as_deref().unwrap_or_default(),
    )
    .await?;
    Ok(Json(AnalyzeResponse { analysis }))
}
