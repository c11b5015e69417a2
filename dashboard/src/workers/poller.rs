//! Polling worker for periodic GitHub sync

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::storage::settings::PollerSettings;
use crate::sync::syncer::{SyncOutcome, Syncer};

/// Poller worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Polling interval
    pub interval: Duration,

    /// Initial delay before first poll
    pub initial_delay: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            initial_delay: Duration::from_secs(5),
        }
    }
}

impl From<&PollerSettings> for Options {
    fn from(settings: &PollerSettings) -> Self {
        Self {
            interval: Duration::from_secs(settings.interval_secs.max(1)),
            initial_delay: Duration::from_secs(settings.initial_delay_secs),
        }
    }
}

/// Run the poller worker until `shutdown_signal` resolves
pub async fn run<S, F>(
    options: &Options,
    syncer: &Syncer,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Poller worker starting...");

    tokio::select! {
        _ = &mut shutdown_signal => {
            info!("Poller worker shutting down...");
            return;
        }
        _ = sleep_fn(options.initial_delay) => {}
    }

    loop {
        debug!("Polling GitHub for workflow runs...");

        match syncer.trigger_sync().await {
            Ok(SyncOutcome::Completed(report)) => {
                debug!(
                    "Poll synced {} runs ({} failed)",
                    report.fetched, report.failed
                );
            }
            Ok(SyncOutcome::CoolingDown) => {}
            Err(e) => {
                error!("Sync failed: {}", e);
            }
        }

        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Poller worker shutting down...");
                return;
            }
            _ = sleep_fn(options.interval) => {}
        }
    }
}
