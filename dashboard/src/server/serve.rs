//! HTTP server setup

use std::future::Future;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::options::ServerOptions;
use crate::errors::DashboardError;
use crate::server::handlers::{
    analyze_handler, create_deployment_handler, get_deployment_handler, health_handler,
    list_deployments_handler, stages_handler, sync_handler, update_deployment_handler,
    version_handler, watch_handler,
};
use crate::server::state::ServerState;

/// Build the dashboard router
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        // Health and version
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        // Deployments
        .route(
            "/api/deployments",
            get(list_deployments_handler).post(create_deployment_handler),
        )
        .route("/api/deployments/sync", get(sync_handler).post(sync_handler))
        .route(
            "/api/deployments/{id}",
            get(get_deployment_handler).patch(update_deployment_handler),
        )
        .route("/api/deployments/{id}/stages", get(stages_handler))
        .route("/api/deployments/{id}/watch", get(watch_handler))
        // Analysis
        .route("/api/analyze", post(analyze_handler))
        // State and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server
pub async fn serve(
    options: &ServerOptions,
    state: Arc<ServerState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), DashboardError>>, DashboardError> {
    let app = router(state);

    let addr = format!("{}:{}", options.host, options.port);
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| DashboardError::ServerError(format!("Failed to bind {}: {}", addr, e)))?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| DashboardError::ServerError(e.to_string()))
    });

    Ok(handle)
}
