//! Server state

use std::sync::Arc;
use std::time::Duration;

use crate::http::gemini::LogAnalyzer;
use crate::storage::store::DeploymentStore;
use crate::sync::syncer::Syncer;

/// Server state shared across handlers
pub struct ServerState {
    pub store: Arc<dyn DeploymentStore>,
    pub syncer: Arc<Syncer>,

    /// Absent when no analysis key is configured
    pub analyzer: Option<Arc<dyn LogAnalyzer>>,

    /// Delay between snapshots on the watch stream
    pub watch_interval: Duration,
}

impl ServerState {
    pub fn new(
        store: Arc<dyn DeploymentStore>,
        syncer: Arc<Syncer>,
        analyzer: Option<Arc<dyn LogAnalyzer>>,
        watch_interval: Duration,
    ) -> Self {
        Self {
            store,
            syncer,
            analyzer,
            watch_interval,
        }
    }
}
