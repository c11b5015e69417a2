//! Application state management

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::errors::DashboardError;
use crate::http::gemini::{GeminiAnalyzer, LogAnalyzer};
use crate::http::github::{GithubRunSource, RunSource};
use crate::storage::layout::StorageLayout;
use crate::storage::settings::{Credentials, Settings};
use crate::storage::store::{DeploymentStore, JsonStore};
use crate::sync::reconciler::Reconciler;
use crate::sync::syncer::Syncer;

/// Main application state
pub struct AppState {
    /// Deployment records
    pub store: Arc<dyn DeploymentStore>,

    /// GitHub Actions run source
    pub run_source: Arc<dyn RunSource>,

    /// GitHub syncer
    pub syncer: Arc<Syncer>,

    /// Log analyzer, absent without `GEMINI_API_KEY`
    pub analyzer: Option<Arc<dyn LogAnalyzer>>,

    /// Delay between watch stream snapshots
    pub watch_interval: Duration,
}

impl AppState {
    /// Initialize application state
    pub async fn init(
        layout: &StorageLayout,
        settings: &Settings,
        credentials: &Credentials,
    ) -> Result<Self, DashboardError> {
        info!("Initializing application state...");

        layout.setup().await?;
        let store: Arc<dyn DeploymentStore> =
            Arc::new(JsonStore::open(Arc::new(layout.deployments_file())).await?);

        let run_source: Arc<dyn RunSource> = Arc::new(GithubRunSource::new(
            &settings.github,
            credentials.github_token.as_ref(),
        )?);
        info!(
            "Syncing runs of {}/{}",
            settings.github.owner, settings.github.repo
        );

        let reconciler = Reconciler::new(
            store.clone(),
            run_source.clone(),
            settings.github.run_window,
        );
        let syncer = Arc::new(Syncer::new(reconciler));

        let analyzer: Option<Arc<dyn LogAnalyzer>> = match &credentials.gemini_api_key {
            Some(key) => Some(Arc::new(GeminiAnalyzer::new(&settings.analysis, key)?)),
            None => {
                warn!("GEMINI_API_KEY is not set, log analysis is disabled");
                None
            }
        };

        Ok(Self {
            store,
            run_source,
            syncer,
            analyzer,
            watch_interval: Duration::from_millis(settings.watch_interval_ms),
        })
    }
}
