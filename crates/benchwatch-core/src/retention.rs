// ABOUTME: Background retention sweeper dropping non-baseline runs past the window
use crate::store::HistoricStore;
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Sweep cadence; each pass deletes runs older than the retention window.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Periodic retention task. Baseline-referenced runs are never removed and
/// the sweep runs safely alongside concurrent ingest.
pub struct RetentionSweeper;

impl RetentionSweeper {
    /// Spawn the sweeper; returns `None` when retention is disabled.
    pub fn spawn(store: Arc<HistoricStore>) -> Option<JoinHandle<()>> {
        let retention_days = store.config().retention_days;
        if retention_days == 0 {
            info!("retention disabled (retention_days = 0)");
            return None;
        }

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let cutoff = Utc::now() - ChronoDuration::days(retention_days as i64);
                match store.delete_old(cutoff).await {
                    Ok(0) => {}
                    Ok(removed) => info!(removed, %cutoff, "retention sweep removed old runs"),
                    Err(e) => warn!(error = %e, "retention sweep failed; will retry next tick"),
                }
            }
        }))
    }
}
