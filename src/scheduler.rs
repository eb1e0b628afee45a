//! Fixed-interval keyword sweep.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;

use crate::config::SchedulerConfig;
use crate::signal::KeywordInsightRegenerator;

/// Run `sweep` every `sweep_interval_secs`, starting one interval from now.
/// A failed tick is logged and the loop keeps going.
pub fn spawn_sweep_scheduler(cfg: SchedulerConfig, regen: Arc<KeywordInsightRegenerator>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = Duration::from_secs(cfg.sweep_interval_secs.max(1));
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match regen.sweep(Utc::now()).await {
                Ok(report) => tracing::debug!(target: "sweep", ?report, "sweep tick"),
                Err(e) => tracing::warn!(target: "sweep", "sweep tick failed: {e:#}"),
            }
        }
    })
}
