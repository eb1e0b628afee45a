//! Keyword signal state machine.
//!
//! ACTIVE ──freeze──▶ FROZEN ──revive──▶ ACTIVE
//!
//! Transitions return the next value (`None` when the call is a no-op) so the
//! caller decides when to persist. Candy only accumulates while ACTIVE.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalStatus {
    Active,
    Frozen,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalState {
    pub user_id: UserId,
    pub keyword_key: String,
    pub status: SignalStatus,
    pub candy_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub frozen_at: Option<DateTime<Utc>>,
    pub insight_text: Option<String>,
    pub insight_updated_at: Option<DateTime<Utc>>,
    pub insight_version: u32,
    pub insight_candy_checkpoint: u64,
}

impl SignalState {
    pub fn new(user_id: UserId, keyword_key: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            keyword_key: keyword_key.into(),
            status: SignalStatus::Active,
            candy_count: 0,
            created_at: now,
            updated_at: now,
            frozen_at: None,
            insight_text: None,
            insight_updated_at: None,
            insight_version: 0,
            insight_candy_checkpoint: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SignalStatus::Active
    }

    pub fn add_candy(&self, delta: u64, now: DateTime<Utc>) -> Option<SignalState> {
        if !self.is_active() || delta == 0 {
            return None;
        }
        let mut next = self.clone();
        next.candy_count = next.candy_count.saturating_add(delta);
        next.updated_at = now;
        Some(next)
    }

    pub fn freeze(&self, now: DateTime<Utc>) -> Option<SignalState> {
        if self.status == SignalStatus::Frozen {
            return None;
        }
        let mut next = self.clone();
        next.status = SignalStatus::Frozen;
        next.frozen_at = Some(now);
        next.updated_at = now;
        Some(next)
    }

    /// Insight text and checkpoint survive a revive.
    pub fn revive(&self, now: DateTime<Utc>) -> Option<SignalState> {
        if self.is_active() {
            return None;
        }
        let mut next = self.clone();
        next.status = SignalStatus::Active;
        next.frozen_at = None;
        next.updated_at = now;
        Some(next)
    }

    pub fn candy_since_checkpoint(&self) -> u64 {
        self.candy_count.saturating_sub(self.insight_candy_checkpoint)
    }

    pub fn should_regenerate_insight(&self, threshold_delta: u64) -> bool {
        self.is_active() && self.candy_since_checkpoint() >= threshold_delta
    }

    pub fn apply_insight(&self, text: impl Into<String>, now: DateTime<Utc>) -> SignalState {
        let mut next = self.clone();
        next.insight_text = Some(text.into());
        next.insight_updated_at = Some(now);
        next.insight_version = next.insight_version.saturating_add(1);
        next.insight_candy_checkpoint = next.candy_count;
        next.updated_at = now;
        next
    }
}

/// Permanent snapshot of a keyword's last insight, created on freeze.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaterDrop {
    pub user_id: UserId,
    pub keyword_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub snapshot_text: Option<String>,
}

impl WaterDrop {
    pub fn snapshot(state: &SignalState, now: DateTime<Utc>) -> Self {
        Self {
            user_id: state.user_id,
            keyword_key: state.keyword_key.clone(),
            created_at: now,
            updated_at: now,
            snapshot_text: state.insight_text.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn candy_only_counts_while_active() {
        let s = SignalState::new(1, "coffee", t0());
        let s = s.add_candy(1, t0()).unwrap();
        assert_eq!(s.candy_count, 1);
        assert!(s.add_candy(0, t0()).is_none());

        let frozen = s.freeze(t0()).unwrap();
        assert!(frozen.add_candy(3, t0()).is_none());
        assert_eq!(frozen.candy_count, 1);
    }

    #[test]
    fn freeze_twice_keeps_first_timestamp() {
        let s = SignalState::new(1, "coffee", t0());
        let frozen = s.freeze(t0()).unwrap();
        assert!(frozen.freeze(t0() + Duration::hours(1)).is_none());
        assert_eq!(frozen.frozen_at, Some(t0()));
    }

    #[test]
    fn revive_preserves_insight_and_checkpoint() {
        let s = SignalState::new(1, "coffee", t0())
            .add_candy(12, t0())
            .unwrap()
            .apply_insight("X", t0());
        let revived = s.freeze(t0()).unwrap().revive(t0() + Duration::days(2)).unwrap();
        assert!(revived.is_active());
        assert_eq!(revived.frozen_at, None);
        assert_eq!(revived.insight_text.as_deref(), Some("X"));
        assert_eq!(revived.insight_candy_checkpoint, 12);
        assert!(revived.revive(t0()).is_none());
    }

    #[test]
    fn regeneration_threshold_is_inclusive() {
        let mut s = SignalState::new(1, "coffee", t0());
        s.insight_candy_checkpoint = 10;
        s.candy_count = 19;
        assert!(!s.should_regenerate_insight(10));
        s.candy_count = 20;
        assert!(s.should_regenerate_insight(10));
        let frozen = s.freeze(t0()).unwrap();
        assert!(!frozen.should_regenerate_insight(10));
    }

    #[test]
    fn apply_insight_moves_checkpoint_and_version() {
        let mut s = SignalState::new(1, "coffee", t0());
        s.candy_count = 20;
        s.insight_candy_checkpoint = 10;
        s.insight_version = 3;
        let next = s.apply_insight("fresh", t0());
        assert_eq!(next.insight_candy_checkpoint, 20);
        assert_eq!(next.insight_version, 4);
        assert_eq!(next.insight_updated_at, Some(t0()));
    }
}
