//! Assembles the generator input for one trigger log.
//!
//! Pure composition: a recent-logs window with the trigger guaranteed present
//! exactly once, plus recent insights inside the recency horizon.

use chrono::{DateTime, Duration, Utc};

use crate::config::ContextConfig;
use crate::model::{InsightContext, Log};
use crate::store::{InsightStore, LogStore};

pub struct ContextBuilder<'a> {
    cfg: &'a ContextConfig,
    logs: &'a dyn LogStore,
    insights: &'a dyn InsightStore,
}

impl<'a> ContextBuilder<'a> {
    pub fn new(cfg: &'a ContextConfig, logs: &'a dyn LogStore, insights: &'a dyn InsightStore) -> Self {
        Self { cfg, logs, insights }
    }

    pub async fn build(
        &self,
        trigger_log: &Log,
        matched_keyword: Option<String>,
        now: DateTime<Utc>,
    ) -> anyhow::Result<InsightContext> {
        let user_id = trigger_log.user_id;
        let window = self.cfg.recent_logs.clamp(5, 200);
        let recent = self.logs.latest_for_user(user_id, window).await?;
        let logs = merge_trigger(trigger_log, recent);

        let limit = self.cfg.recent_insights.clamp(1, 10);
        let hours = self.cfg.recent_insight_hours.clamp(6, 7 * 24);
        let since = now - Duration::hours(hours);
        let recent_insights = self.insights.latest_for_user(user_id, limit, Some(since)).await?;

        Ok(InsightContext {
            user_id,
            matched_keyword,
            trigger_log: trigger_log.clone(),
            source_log_id: trigger_log.id,
            logs,
            recent_insights,
        })
    }
}

/// Trigger plus window, deduplicated by id, most recent first.
pub fn merge_trigger(trigger: &Log, window: Vec<Log>) -> Vec<Log> {
    let mut merged: Vec<Log> = Vec::with_capacity(window.len() + 1);
    merged.push(trigger.clone());
    for log in window {
        if !merged.iter().any(|l| l.id == log.id) {
            merged.push(log);
        }
    }
    merged.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    merged
}
