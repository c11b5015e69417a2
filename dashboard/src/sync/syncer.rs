//! GitHub run synchronization

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::errors::DashboardError;
use crate::sync::reconciler::{Reconciler, SyncReport};
use crate::utils::{calc_exp_backoff, CooldownOptions};

/// Sync state
#[derive(Debug, Clone)]
pub struct SyncState {
    pub last_attempted_sync_at: DateTime<Utc>,
    pub last_synced_at: DateTime<Utc>,
    pub cooldown_ends_at: DateTime<Utc>,
    pub err_streak: u32,
    pub last_report: Option<SyncReport>,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            last_attempted_sync_at: DateTime::<Utc>::MIN_UTC,
            last_synced_at: DateTime::<Utc>::MIN_UTC,
            cooldown_ends_at: DateTime::<Utc>::MIN_UTC,
            err_streak: 0,
            last_report: None,
        }
    }
}

impl SyncState {
    pub fn is_in_cooldown(&self) -> bool {
        Utc::now() < self.cooldown_ends_at
    }
}

/// Result of a scheduled sync trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed(SyncReport),

    /// Skipped because a previous failure put the syncer in cooldown
    CoolingDown,
}

/// Runs reconciliation passes and tracks their health
pub struct Syncer {
    reconciler: Reconciler,
    state: RwLock<SyncState>,
    cooldown_options: CooldownOptions,
}

impl Syncer {
    pub fn new(reconciler: Reconciler) -> Self {
        Self::with_cooldown(reconciler, CooldownOptions::default())
    }

    pub fn with_cooldown(reconciler: Reconciler, cooldown_options: CooldownOptions) -> Self {
        Self {
            reconciler,
            state: RwLock::new(SyncState::default()),
            cooldown_options,
        }
    }

    /// Scheduled sync, skipped while in cooldown
    pub async fn trigger_sync(&self) -> Result<SyncOutcome, DashboardError> {
        {
            let state = self.state.read().await;
            if state.is_in_cooldown() {
                debug!("Sync in cooldown, skipping...");
                return Ok(SyncOutcome::CoolingDown);
            }
        }

        self.sync_now().await.map(SyncOutcome::Completed)
    }

    /// User-requested sync, runs regardless of cooldown
    pub async fn sync_now(&self) -> Result<SyncReport, DashboardError> {
        {
            let mut state = self.state.write().await;
            state.last_attempted_sync_at = Utc::now();
        }

        match self.reconciler.sync_pass().await {
            Ok(report) => {
                let mut state = self.state.write().await;
                state.last_synced_at = Utc::now();
                state.err_streak = 0;
                state.cooldown_ends_at = DateTime::<Utc>::MIN_UTC;
                state.last_report = Some(report);
                info!("Sync completed successfully");
                Ok(report)
            }
            Err(e) => {
                let mut state = self.state.write().await;
                state.err_streak += 1;

                let cooldown = calc_exp_backoff(&self.cooldown_options, state.err_streak);
                let cooldown = chrono::Duration::from_std(cooldown)
                    .unwrap_or_else(|_| chrono::Duration::seconds(300));
                state.cooldown_ends_at = Utc::now() + cooldown;

                error!(
                    "Sync failed (attempt {}), cooldown until {}: {}",
                    state.err_streak, state.cooldown_ends_at, e
                );
                Err(e)
            }
        }
    }

    /// Get sync state
    pub async fn get_state(&self) -> SyncState {
        self.state.read().await.clone()
    }
}
