//! Keyword add/remove → signal freeze/revive plus water drops.
//!
//! Removing a keyword freezes its signal and snapshots the last insight text
//! into a water drop (once). Re-adding it revives the signal, keeping the
//! insight text and checkpoint, and consumes the drop.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use super::{SignalLocks, SignalState, WaterDrop};
use crate::model::{keyword_key, UserId};
use crate::store::SignalStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum LifecycleChange {
    Created,
    Revived { water_drop_removed: bool },
    Frozen { water_drop_created: bool },
    Unchanged,
}

pub struct KeywordLifecycle {
    signals: Arc<dyn SignalStore>,
    locks: Arc<SignalLocks>,
}

impl KeywordLifecycle {
    pub fn new(signals: Arc<dyn SignalStore>, locks: Arc<SignalLocks>) -> Self {
        Self { signals, locks }
    }

    pub async fn keyword_added(
        &self,
        user_id: UserId,
        keyword: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<LifecycleChange> {
        let key = keyword_key(keyword);
        if key.is_empty() {
            return Ok(LifecycleChange::Unchanged);
        }
        let _guard = self.locks.lock((user_id, key.clone())).await;

        let Some(current) = self.signals.get(user_id, &key).await? else {
            self.signals.save(SignalState::new(user_id, key.clone(), now)).await?;
            info!(target: "signal", user_id, keyword = %key, "signal created");
            return Ok(LifecycleChange::Created);
        };
        let Some(next) = current.revive(now) else {
            return Ok(LifecycleChange::Unchanged);
        };
        self.signals.save(next).await?;
        let water_drop_removed = self.signals.delete_water_drop(user_id, &key).await?;
        info!(target: "signal", user_id, keyword = %key, water_drop_removed, "signal revived");
        Ok(LifecycleChange::Revived { water_drop_removed })
    }

    pub async fn keyword_removed(
        &self,
        user_id: UserId,
        keyword: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<LifecycleChange> {
        let key = keyword_key(keyword);
        let _guard = self.locks.lock((user_id, key.clone())).await;

        let Some(current) = self.signals.get(user_id, &key).await? else {
            return Ok(LifecycleChange::Unchanged);
        };
        let Some(next) = current.freeze(now) else {
            return Ok(LifecycleChange::Unchanged);
        };
        self.signals.save(next.clone()).await?;

        let water_drop_created = if self.signals.find_water_drop(user_id, &key).await?.is_none() {
            self.signals.insert_water_drop(WaterDrop::snapshot(&next, now)).await?;
            true
        } else {
            false
        };
        info!(target: "signal", user_id, keyword = %key, water_drop_created, "signal frozen");
        Ok(LifecycleChange::Frozen { water_drop_created })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySignalStore;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 1, 9, 0, 0).unwrap()
    }

    fn setup() -> (KeywordLifecycle, Arc<MemorySignalStore>) {
        let signals = Arc::new(MemorySignalStore::new());
        (KeywordLifecycle::new(signals.clone(), Arc::new(SignalLocks::new())), signals)
    }

    #[tokio::test]
    async fn add_creates_an_active_signal() {
        let (lc, signals) = setup();
        assert_eq!(lc.keyword_added(1, " Coffee ", t0()).await.unwrap(), LifecycleChange::Created);
        assert!(signals.get(1, "coffee").await.unwrap().unwrap().is_active());
        assert_eq!(lc.keyword_added(1, "coffee", t0()).await.unwrap(), LifecycleChange::Unchanged);
    }

    #[tokio::test]
    async fn double_freeze_keeps_one_drop_and_first_timestamp() {
        let (lc, signals) = setup();
        lc.keyword_added(1, "coffee", t0()).await.unwrap();
        let first = lc.keyword_removed(1, "coffee", t0()).await.unwrap();
        assert_eq!(first, LifecycleChange::Frozen { water_drop_created: true });
        let second = lc
            .keyword_removed(1, "coffee", t0() + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(second, LifecycleChange::Unchanged);
        assert_eq!(signals.water_drops_for_user(1).await.unwrap().len(), 1);
        assert_eq!(signals.get(1, "coffee").await.unwrap().unwrap().frozen_at, Some(t0()));
    }

    #[tokio::test]
    async fn removing_unknown_keyword_is_a_no_op() {
        let (lc, signals) = setup();
        assert_eq!(lc.keyword_removed(1, "tea", t0()).await.unwrap(), LifecycleChange::Unchanged);
        assert!(signals.water_drops_for_user(1).await.unwrap().is_empty());
    }
}
