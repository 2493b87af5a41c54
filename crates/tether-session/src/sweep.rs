//! Reclamation of expired and corrupt sessions.
//!
//! [`SessionStore::sweep`] is a batch operation independent of any single
//! session; [`Sweeper`] runs it periodically in the background. Sweeps may
//! run concurrently with request traffic: evicting a session a moment early
//! or missing one a moment late is tolerated.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::store::SessionStore;

/// Outcome of one sweep run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Session records examined.
    pub scanned: usize,
    /// Records deleted because their expiry had passed.
    pub removed_expired: usize,
    /// Records deleted because they could not be parsed.
    pub removed_corrupt: usize,
    /// Records left in place.
    pub retained: usize,
    /// Records that should have been deleted but could not be.
    pub failed: usize,
    /// Orphaned temporary files cleaned up.
    pub stale_temp_removed: usize,
}

impl SweepReport {
    /// Total records deleted.
    pub fn removed(&self) -> usize {
        self.removed_expired + self.removed_corrupt
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: &SweepReport) {
        self.scanned += other.scanned;
        self.removed_expired += other.removed_expired;
        self.removed_corrupt += other.removed_corrupt;
        self.retained += other.retained;
        self.failed += other.failed;
        self.stale_temp_removed += other.stale_temp_removed;
    }
}

/// Background task running [`SessionStore::sweep`] on an interval.
pub struct Sweeper;

impl Sweeper {
    /// Spawn a sweeper on the current Tokio runtime.
    ///
    /// The first sweep runs immediately. Ticks missed while a sweep is in
    /// progress are delayed rather than bunched up. A zero interval is
    /// rejected.
    pub fn spawn(store: Arc<dyn SessionStore>, interval: Duration) -> Result<SweeperHandle> {
        if interval.is_zero() {
            return Err(Error::Config(
                "sweep interval must be greater than zero".into(),
            ));
        }

        let token = CancellationToken::new();
        let child = token.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut totals = SweepReport::default();
            let mut runs = 0u64;

            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = ticker.tick() => {
                        let report = store.sweep().await;
                        runs += 1;
                        totals.merge(&report);
                        debug!(
                            run = runs,
                            removed = report.removed(),
                            retained = report.retained,
                            "Sweep run finished"
                        );
                    }
                }
            }

            info!(runs, removed = totals.removed(), "Session sweeper stopped");
            totals
        });

        Ok(SweeperHandle { token, task })
    }

    /// Spawn a sweeper if `config` enables one.
    ///
    /// The whole config is validated first, so settings [`SessionConfig::validate`]
    /// rejects never reach the runtime.
    pub fn from_config(
        store: Arc<dyn SessionStore>,
        config: &SessionConfig,
    ) -> Result<Option<SweeperHandle>> {
        config.validate()?;
        if !config.enable_sweep_task {
            return Ok(None);
        }
        Self::spawn(store, config.sweep_interval()).map(Some)
    }
}

/// Handle to a running [`Sweeper`].
#[derive(Debug)]
pub struct SweeperHandle {
    token: CancellationToken,
    task: JoinHandle<SweepReport>,
}

impl SweeperHandle {
    /// Stop the sweeper and wait for it, returning the accumulated totals.
    ///
    /// A sweep already in progress is allowed to finish first.
    /// If the task died, the failure is logged and empty totals are
    /// returned.
    pub async fn shutdown(self) -> SweepReport {
        self.token.cancel();
        match self.task.await {
            Ok(totals) => totals,
            Err(e) => {
                warn!(error = %e, "Session sweeper task failed");
                SweepReport::default()
            }
        }
    }

    /// Whether the background task is still running.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}
