// src/cooldown.rs
use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Per-user run bookkeeping for insight generation.
/// - `last_run_at` feeds `within_cooldown`.
/// - `day`/`runs_today` feed the daily cap; a new local day resets the count.
/// - State changes only via `record_run`, after a successful generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownTracker {
    last_run_at: Option<DateTime<Utc>>,
    day: Option<NaiveDate>,
    runs_today: u32,
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_run_at(&self) -> Option<DateTime<Utc>> {
        self.last_run_at
    }

    /// Runs recorded on the local day containing `now`.
    pub fn count_today(&self, now: DateTime<Utc>, offset: FixedOffset) -> u32 {
        match self.day {
            Some(d) if d == local_day(now, offset) => self.runs_today,
            _ => 0,
        }
    }

    /// Record a successful run at `at`.
    pub fn record_run(&mut self, at: DateTime<Utc>, offset: FixedOffset) {
        let today = local_day(at, offset);
        if self.day != Some(today) {
            self.day = Some(today);
            self.runs_today = 0;
        }
        self.runs_today = self.runs_today.saturating_add(1);
        self.last_run_at = Some(at);
    }
}

/// True while `now` is inside the cooldown window after `last_run_at`.
/// `cooldown_secs` <= 0 disables it.
pub fn within_cooldown(last_run_at: Option<DateTime<Utc>>, cooldown_secs: i64, now: DateTime<Utc>) -> bool {
    match last_run_at {
        None => false,
        Some(ts) => now.signed_duration_since(ts) < ChronoDuration::seconds(cooldown_secs.max(0)),
    }
}

pub fn local_day(at: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    at.with_timezone(&offset).date_naive()
}
