use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use tracing::debug;

use super::{SignalLocks, SignalState};
use crate::config::SignalConfig;
use crate::model::{contains_keyword, keyword_key, Log};
use crate::store::{InterestGate, SignalStore};

/// Adds one candy per matching keyword for every created log.
///
/// Runs independently of the trigger policy: cooldowns and daily caps never
/// stop counting. Whether a switched-off user still counts is configurable.
pub struct SignalUpdater {
    cfg: SignalConfig,
    gate: Arc<dyn InterestGate>,
    signals: Arc<dyn SignalStore>,
    locks: Arc<SignalLocks>,
}

impl SignalUpdater {
    pub fn new(
        cfg: SignalConfig,
        gate: Arc<dyn InterestGate>,
        signals: Arc<dyn SignalStore>,
        locks: Arc<SignalLocks>,
    ) -> Self {
        Self {
            cfg,
            gate,
            signals,
            locks,
        }
    }

    /// Returns the states whose count changed.
    pub async fn on_log_created(&self, log: &Log, now: DateTime<Utc>) -> anyhow::Result<Vec<SignalState>> {
        if !self.cfg.count_when_gate_disabled && !self.gate.is_enabled_for_user(log.user_id).await? {
            debug!(target: "signal", user_id = log.user_id, "gate disabled; not counting");
            return Ok(Vec::new());
        }

        let keys: BTreeSet<String> = self
            .gate
            .keywords_for_user(log.user_id)
            .await?
            .iter()
            .filter(|k| contains_keyword(&log.content, k))
            .map(|k| keyword_key(k))
            .collect();

        let mut updated = Vec::with_capacity(keys.len());
        for key in keys {
            let _guard = self.locks.lock((log.user_id, key.clone())).await;
            let current = match self.signals.get(log.user_id, &key).await? {
                Some(s) => s,
                None => SignalState::new(log.user_id, key.clone(), now),
            };
            let Some(next) = current.add_candy(1, now) else {
                debug!(target: "signal", user_id = log.user_id, keyword = %key, "signal frozen; candy ignored");
                continue;
            };
            self.signals.save(next.clone()).await?;
            counter!("signal_candy_total").increment(1);
            debug!(
                target: "signal",
                user_id = log.user_id,
                keyword = %key,
                candy = next.candy_count,
                "candy added"
            );
            updated.push(next);
        }
        Ok(updated)
    }
}
