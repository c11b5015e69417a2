//! Main application run loop

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::app::options::{AppOptions, LifecycleOptions};
use crate::app::state::AppState;
use crate::errors::DashboardError;
use crate::pipeline::simulate::{simulate, Scenario};
use crate::server::serve::serve;
use crate::server::state::ServerState;
use crate::storage::settings::Credentials;
use crate::sync::reconciler::SyncReport;
use crate::workers::poller;

/// Pause between simulated pipeline steps
const SIMULATION_STEP_DELAY: Duration = Duration::from_secs(2);

/// Run the dashboard until `shutdown_signal` resolves.
///
/// When `scenario` is given, a simulated pipeline is played against the store
/// once the server is up.
pub async fn run(
    options: AppOptions,
    credentials: Credentials,
    scenario: Option<Scenario>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), DashboardError> {
    info!("Initializing DeployLog...");

    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let mut shutdown_manager =
        ShutdownManager::new(shutdown_tx.clone(), options.lifecycle.clone());

    if let Err(e) = init(
        &options,
        &credentials,
        scenario,
        &shutdown_tx,
        &mut shutdown_manager,
    )
    .await
    {
        error!("Failed to start DeployLog: {}", e);
        shutdown_manager.shutdown().await?;
        return Err(e);
    }

    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");

    drop(shutdown_tx);
    shutdown_manager.shutdown().await
}

/// Run a single sync pass and exit
pub async fn sync_once(
    options: &AppOptions,
    credentials: &Credentials,
) -> Result<SyncReport, DashboardError> {
    let app_state = AppState::init(&options.layout, &options.settings, credentials).await?;
    app_state.syncer.sync_now().await
}

// =============================== INITIALIZATION ================================== //

async fn init(
    options: &AppOptions,
    credentials: &Credentials,
    scenario: Option<Scenario>,
    shutdown_tx: &broadcast::Sender<()>,
    shutdown_manager: &mut ShutdownManager,
) -> Result<(), DashboardError> {
    let app_state =
        Arc::new(AppState::init(&options.layout, &options.settings, credentials).await?);

    init_server(
        options,
        app_state.clone(),
        shutdown_manager,
        shutdown_tx.subscribe(),
    )
    .await?;

    if options.enable_poller {
        init_poller_worker(
            options.poller.clone(),
            app_state.clone(),
            shutdown_manager,
            shutdown_tx.subscribe(),
        )?;
    }

    if let Some(scenario) = scenario {
        init_simulation(scenario, app_state, shutdown_manager, shutdown_tx.subscribe())?;
    }

    Ok(())
}

fn init_poller_worker(
    options: poller::Options,
    app_state: Arc<AppState>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DashboardError> {
    info!("Initializing poller worker...");

    let syncer = app_state.syncer.clone();

    let poller_handle = tokio::spawn(async move {
        poller::run(
            &options,
            syncer.as_ref(),
            tokio::time::sleep,
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    });

    shutdown_manager.with_poller_worker_handle(poller_handle)
}

fn init_simulation(
    scenario: Scenario,
    app_state: Arc<AppState>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DashboardError> {
    info!("Starting {:?} pipeline simulation...", scenario);

    let store = app_state.store.clone();

    let simulation_handle = tokio::spawn(async move {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("Simulation interrupted by shutdown");
            }
            result = simulate(store.as_ref(), scenario, SIMULATION_STEP_DELAY, tokio::time::sleep) => {
                match result {
                    Ok(deployment) => info!(
                        "Simulation finished: deployment {} is {}",
                        deployment.id, deployment.status
                    ),
                    Err(e) => error!("Simulation failed: {}", e),
                }
            }
        }
    });

    shutdown_manager.with_simulation_handle(simulation_handle)
}

async fn init_server(
    options: &AppOptions,
    app_state: Arc<AppState>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DashboardError> {
    info!("Initializing HTTP server...");

    let server_state = ServerState::new(
        app_state.store.clone(),
        app_state.syncer.clone(),
        app_state.analyzer.clone(),
        app_state.watch_interval,
    );

    let server_handle = serve(&options.server, Arc::new(server_state), async move {
        let _ = shutdown_rx.recv().await;
    })
    .await?;

    shutdown_manager.with_server_handle(server_handle)
}

// ================================= SHUTDOWN ===================================== //

struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    lifecycle_options: LifecycleOptions,
    server_handle: Option<JoinHandle<Result<(), DashboardError>>>,
    poller_worker_handle: Option<JoinHandle<()>>,
    simulation_handle: Option<JoinHandle<()>>,
}

impl ShutdownManager {
    pub fn new(shutdown_tx: broadcast::Sender<()>, lifecycle_options: LifecycleOptions) -> Self {
        Self {
            shutdown_tx,
            lifecycle_options,
            server_handle: None,
            poller_worker_handle: None,
            simulation_handle: None,
        }
    }

    pub fn with_poller_worker_handle(
        &mut self,
        handle: JoinHandle<()>,
    ) -> Result<(), DashboardError> {
        if self.poller_worker_handle.is_some() {
            return Err(DashboardError::ShutdownError(
                "poller_handle already set".to_string(),
            ));
        }
        self.poller_worker_handle = Some(handle);
        Ok(())
    }

    pub fn with_simulation_handle(&mut self, handle: JoinHandle<()>) -> Result<(), DashboardError> {
        if self.simulation_handle.is_some() {
            return Err(DashboardError::ShutdownError(
                "simulation_handle already set".to_string(),
            ));
        }
        self.simulation_handle = Some(handle);
        Ok(())
    }

    pub fn with_server_handle(
        &mut self,
        handle: JoinHandle<Result<(), DashboardError>>,
    ) -> Result<(), DashboardError> {
        if self.server_handle.is_some() {
            return Err(DashboardError::ShutdownError(
                "server_handle already set".to_string(),
            ));
        }
        self.server_handle = Some(handle);
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), DashboardError> {
        let _ = self.shutdown_tx.send(());

        match tokio::time::timeout(
            self.lifecycle_options.max_shutdown_delay,
            self.shutdown_impl(),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                error!(
                    "Shutdown timed out after {:?}, forcing shutdown...",
                    self.lifecycle_options.max_shutdown_delay
                );
                std::process::exit(1);
            }
        }
    }

    async fn shutdown_impl(&mut self) -> Result<(), DashboardError> {
        info!("Shutting down DeployLog...");

        // 1. Simulation
        if let Some(handle) = self.simulation_handle.take() {
            handle
                .await
                .map_err(|e| DashboardError::ShutdownError(e.to_string()))?;
        }

        // 2. Poller worker
        if let Some(handle) = self.poller_worker_handle.take() {
            handle
                .await
                .map_err(|e| DashboardError::ShutdownError(e.to_string()))?;
        }

        // 3. HTTP server
        if let Some(handle) = self.server_handle.take() {
            handle
                .await
                .map_err(|e| DashboardError::ShutdownError(e.to_string()))??;
        }

        info!("Shutdown complete");
        Ok(())
    }
}
