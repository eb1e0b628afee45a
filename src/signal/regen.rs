//! Scheduled regeneration of keyword insight texts.
//!
//! The sweep walks every user with ACTIVE signals and refreshes the text of
//! each signal whose candy has moved `regen_threshold` past its checkpoint.
//! Provider calls happen outside the signal lock; the result is applied to a
//! fresh read under the lock so concurrent candy is never lost.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{SignalLocks, SignalState};
use crate::config::SignalConfig;
use crate::generate::{InsightGenerator, KeywordNoteRequest};
use crate::model::{contains_keyword, UserId};
use crate::store::{InsightStore, LogStore, SignalStore};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub examined: usize,
    pub regenerated: usize,
    pub skipped: usize,
    pub failed: usize,
}

enum ItemOutcome {
    Regenerated,
    Skipped,
}

pub struct KeywordInsightRegenerator {
    cfg: SignalConfig,
    signals: Arc<dyn SignalStore>,
    logs: Arc<dyn LogStore>,
    insights: Arc<dyn InsightStore>,
    generator: Arc<InsightGenerator>,
    locks: Arc<SignalLocks>,
}

impl KeywordInsightRegenerator {
    pub fn new(
        cfg: SignalConfig,
        signals: Arc<dyn SignalStore>,
        logs: Arc<dyn LogStore>,
        insights: Arc<dyn InsightStore>,
        generator: Arc<InsightGenerator>,
        locks: Arc<SignalLocks>,
    ) -> Self {
        Self {
            cfg,
            signals,
            logs,
            insights,
            generator,
            locks,
        }
    }

    /// One pass over all users. Only listing users can fail the whole sweep.
    pub async fn sweep(&self, now: DateTime<Utc>) -> anyhow::Result<SweepReport> {
        let mut report = SweepReport::default();
        for user_id in self.signals.users_with_active().await? {
            self.sweep_user(user_id, now, &mut report).await;
        }
        gauge!("sweep_last_run_ts").set(now.timestamp() as f64);
        info!(
            target: "sweep",
            examined = report.examined,
            regenerated = report.regenerated,
            skipped = report.skipped,
            failed = report.failed,
            "keyword sweep finished"
        );
        Ok(report)
    }

    async fn sweep_user(&self, user_id: UserId, now: DateTime<Utc>, report: &mut SweepReport) {
        let states = match self.signals.active_for_user(user_id).await {
            Ok(s) => s,
            Err(e) => {
                warn!(target: "sweep", user_id, error = %e, "could not load signals");
                report.failed += 1;
                return;
            }
        };
        let threshold = u64::from(self.cfg.regen_threshold);
        for state in states.iter().filter(|s| s.should_regenerate_insight(threshold)) {
            report.examined += 1;
            match self.regenerate(state, now).await {
                Ok(ItemOutcome::Regenerated) => {
                    report.regenerated += 1;
                    counter!("keyword_regen_total").increment(1);
                }
                Ok(ItemOutcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    counter!("keyword_regen_failed_total").increment(1);
                    warn!(
                        target: "sweep",
                        user_id,
                        keyword = %state.keyword_key,
                        error = %e,
                        "keyword regeneration failed"
                    );
                }
            }
        }
    }

    async fn regenerate(&self, state: &SignalState, now: DateTime<Utc>) -> anyhow::Result<ItemOutcome> {
        let user_id = state.user_id;
        let key = state.keyword_key.as_str();

        let logs: Vec<String> = self
            .logs
            .latest_for_user(user_id, self.cfg.regen_log_window)
            .await?
            .into_iter()
            .filter(|l| contains_keyword(&l.content, key))
            .take(self.cfg.regen_max_logs)
            .map(|l| l.content)
            .collect();
        if logs.is_empty() {
            debug!(target: "sweep", user_id, keyword = %key, "no recent logs for keyword");
            return Ok(ItemOutcome::Skipped);
        }
        let liked = self
            .insights
            .top_liked_for_user_and_keyword(user_id, key, self.cfg.liked_exemplars)
            .await?;

        let text = self
            .generator
            .keyword_note(&KeywordNoteRequest {
                keyword: key,
                previous: state.insight_text.as_deref(),
                logs,
                liked: &liked,
            })
            .await?;

        let _guard = self.locks.lock((user_id, key.to_string())).await;
        let Some(fresh) = self.signals.get(user_id, key).await? else {
            return Ok(ItemOutcome::Skipped);
        };
        if !fresh.is_active() {
            debug!(target: "sweep", user_id, keyword = %key, "signal frozen during regeneration");
            return Ok(ItemOutcome::Skipped);
        }
        let next = fresh.apply_insight(text, now);
        debug!(
            target: "sweep",
            user_id,
            keyword = %key,
            version = next.insight_version,
            checkpoint = next.insight_candy_checkpoint,
            "keyword insight regenerated"
        );
        self.signals.save(next).await?;
        Ok(ItemOutcome::Regenerated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeneratorConfig;
    use crate::generate::{GeneratorStrategy, MockProvider, ProviderError};
    use crate::store::{MemoryInsightStore, MemoryLogStore, MemorySignalStore};
    use chrono::{FixedOffset, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 1, 9, 0, 0).unwrap()
    }

    fn state(user: UserId, key: &str, candy: u64, checkpoint: u64) -> SignalState {
        let mut s = SignalState::new(user, key, t0());
        s.candy_count = candy;
        s.insight_candy_checkpoint = checkpoint;
        s
    }

    async fn setup(
        provider: MockProvider,
    ) -> (KeywordInsightRegenerator, Arc<MemorySignalStore>, Arc<MemoryLogStore>) {
        let signals = Arc::new(MemorySignalStore::new());
        let logs = Arc::new(MemoryLogStore::new());
        let insights = Arc::new(MemoryInsightStore::new());
        let generator = Arc::new(InsightGenerator::new(
            GeneratorConfig::default(),
            FixedOffset::east_opt(0).unwrap(),
            GeneratorStrategy::Provider(Arc::new(provider)),
        ));
        let regen = KeywordInsightRegenerator::new(
            SignalConfig::default(),
            signals.clone(),
            logs.clone(),
            insights,
            generator,
            Arc::new(SignalLocks::new()),
        );
        (regen, signals, logs)
    }

    #[tokio::test]
    async fn below_threshold_is_not_examined() {
        let (regen, signals, logs) = setup(MockProvider::fixed(r#"{"text":"note"}"#)).await;
        logs.append(1, "coffee", t0()).unwrap();
        signals.save(state(1, "coffee", 19, 10)).await.unwrap();
        let report = regen.sweep(t0()).await.unwrap();
        assert_eq!(report, SweepReport::default());
    }

    #[tokio::test]
    async fn one_failure_does_not_stop_the_sweep() {
        let provider = MockProvider::scripted(vec![
            Err(ProviderError::RateLimited),
            Ok(r#"{"text":"Tea keeps you calm."}"#.into()),
        ]);
        let (regen, signals, logs) = setup(provider).await;
        logs.append(1, "coffee at dawn", t0()).unwrap();
        logs.append(2, "tea at night", t0()).unwrap();
        signals.save(state(1, "coffee", 10, 0)).await.unwrap();
        signals.save(state(2, "tea", 30, 10)).await.unwrap();

        let report = regen.sweep(t0()).await.unwrap();
        assert_eq!(report.examined, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.regenerated, 1);

        let coffee = signals.get(1, "coffee").await.unwrap().unwrap();
        assert_eq!(coffee.insight_version, 0);
        let tea = signals.get(2, "tea").await.unwrap().unwrap();
        assert_eq!(tea.insight_text.as_deref(), Some("Tea keeps you calm."));
        assert_eq!(tea.insight_candy_checkpoint, 30);
    }

    #[tokio::test]
    async fn no_matching_logs_is_skipped() {
        let (regen, signals, logs) = setup(MockProvider::fixed(r#"{"text":"note"}"#)).await;
        logs.append(1, "nothing relevant here", t0()).unwrap();
        signals.save(state(1, "coffee", 10, 0)).await.unwrap();
        let report = regen.sweep(t0()).await.unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.regenerated, 0);
    }
}
