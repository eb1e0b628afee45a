// tests/pipeline_e2e.rs
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use diary_insights::config::InsightConfig;
use diary_insights::engine::{InsightEngine, MemoryBackend};
use diary_insights::generate::{GeneratorStrategy, HeuristicWriter, InsightGenerator, MockProvider, SeededRandom};
use diary_insights::feedback::FeedbackSubmission;
use diary_insights::model::{InsightCreatedEvent, InsightKind, Vote};
use diary_insights::notify::{ChannelEmitter, EmitterMux, NotificationEmitter};
use diary_insights::pipeline::PipelineOutcome;
use diary_insights::trigger::{SkipReason, TriggerPolicy};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 1, 9, 0, 0).unwrap()
}

fn heuristic(cfg: &InsightConfig) -> Arc<InsightGenerator> {
    Arc::new(InsightGenerator::new(
        cfg.generator.clone(),
        cfg.trigger.offset(),
        GeneratorStrategy::Heuristic(HeuristicWriter::new(Arc::new(SeededRandom::new(7)))),
    ))
}

async fn coffee_user(engine: &InsightEngine, backend: &MemoryBackend, user_id: i64) {
    backend.gate.set_enabled(user_id, true).unwrap();
    backend.gate.add_keyword(user_id, "coffee").unwrap();
    engine.keyword_added(user_id, "coffee", t0()).await.unwrap();
}

#[tokio::test]
async fn coffee_log_creates_insight_and_candy() {
    let cfg = InsightConfig::default();
    let backend = MemoryBackend::new(cfg.trigger.offset());
    let (chan, mut events) = ChannelEmitter::new();
    let engine = InsightEngine::new(
        cfg.clone(),
        backend.stores(),
        heuristic(&cfg),
        EmitterMux::new().with(Arc::new(chan)),
    );
    coffee_user(&engine, &backend, 1).await;
    assert_eq!(engine.signal(1, "coffee").await.unwrap().unwrap().candy_count, 0);

    let log = backend.logs.append(1, "Had coffee today, feeling great", t0()).unwrap();
    let decision = TriggerPolicy::new(&cfg.trigger, backend.gate.as_ref(), backend.cooldowns.as_ref())
        .decide(1, &log, t0())
        .await
        .unwrap();
    assert!(decision.should_run);
    assert_eq!(decision.matched_keyword.as_deref(), Some("coffee"));

    let outcome = engine.on_log_created(&log, t0()).await.unwrap();
    let insight = outcome.pipeline.insight().cloned().expect("insight created");
    assert_eq!(insight.source_log_id, log.id);
    assert_eq!(insight.kind, InsightKind::Reflection);
    assert_eq!(insight.keyword.as_deref(), Some("coffee"));
    assert!(!insight.title.trim().is_empty());
    assert!(!insight.body.trim().is_empty());

    assert_eq!(outcome.signals.len(), 1);
    assert_eq!(outcome.signals[0].candy_count, 1);
    assert_eq!(engine.signal(1, "coffee").await.unwrap().unwrap().candy_count, 1);

    let ev = events.recv().await.unwrap();
    assert_eq!(ev.insight_id, insight.id);
    assert_eq!(ev.title, insight.title);
}

#[tokio::test]
async fn unmatched_log_counts_no_candy_and_skips() {
    let cfg = InsightConfig::default();
    let backend = MemoryBackend::new(cfg.trigger.offset());
    let engine = InsightEngine::new(cfg.clone(), backend.stores(), heuristic(&cfg), EmitterMux::new());
    coffee_user(&engine, &backend, 1).await;

    let log = backend.logs.append(1, "Went for a long walk by the river", t0()).unwrap();
    let outcome = engine.on_log_created(&log, t0()).await.unwrap();
    assert_eq!(outcome.pipeline, PipelineOutcome::Skipped(SkipReason::NoKeywordMatch));
    assert!(outcome.signals.is_empty());
    assert_eq!(engine.signal(1, "coffee").await.unwrap().unwrap().candy_count, 0);
    assert!(backend.insights.all_for_user(1).is_empty());
}

#[tokio::test]
async fn provider_outage_still_counts_candy() {
    let cfg = InsightConfig::default();
    let backend = MemoryBackend::new(cfg.trigger.offset());
    let generator = Arc::new(InsightGenerator::new(
        cfg.generator.clone(),
        cfg.trigger.offset(),
        GeneratorStrategy::Provider(Arc::new(MockProvider::scripted(vec![Err(
            diary_insights::generate::ProviderError::RateLimited,
        )]))),
    ));
    let engine = InsightEngine::new(cfg.clone(), backend.stores(), generator, EmitterMux::new());
    coffee_user(&engine, &backend, 1).await;

    let log = backend.logs.append(1, "Had coffee today, feeling great", t0()).unwrap();
    let outcome = engine.on_log_created(&log, t0()).await.unwrap();
    assert!(matches!(outcome.pipeline, PipelineOutcome::NotGenerated(_)));
    assert_eq!(outcome.signals[0].candy_count, 1);
    assert!(backend.insights.all_for_user(1).is_empty());
}

#[tokio::test]
async fn dispatcher_keeps_per_user_order() {
    let cfg = InsightConfig::default();
    let backend = MemoryBackend::new(cfg.trigger.offset());
    let engine = InsightEngine::new(cfg.clone(), backend.stores(), heuristic(&cfg), EmitterMux::new());
    coffee_user(&engine, &backend, 1).await;
    coffee_user(&engine, &backend, 2).await;

    let (dispatcher, worker) = engine.dispatcher(16);
    let mut first_ids = Vec::new();
    for user_id in [1, 2] {
        for i in 0..3 {
            let at = t0() + Duration::minutes(i);
            let log = backend
                .logs
                .append(user_id, format!("Coffee break number {i}, quiet and warm"), at)
                .unwrap();
            if i == 0 {
                first_ids.push(log.id);
            }
            dispatcher.dispatch(log, at).await.unwrap();
        }
    }
    drop(dispatcher);
    worker.await.unwrap();

    // The first log of each user wins; the rest fall inside the cooldown.
    for (user_id, first_id) in [1, 2].into_iter().zip(first_ids) {
        let insights = backend.insights.all_for_user(user_id);
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].source_log_id, first_id);
        assert_eq!(engine.signal(user_id, "coffee").await.unwrap().unwrap().candy_count, 3);
    }
}

/// Never finishes publishing.
struct StalledEmitter;

#[async_trait::async_trait]
impl NotificationEmitter for StalledEmitter {
    async fn publish(&self, _ev: &InsightCreatedEvent) -> anyhow::Result<()> {
        std::future::pending::<()>().await;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "stalled"
    }
}

#[tokio::test]
async fn stalled_emitter_blocks_neither_logs_nor_feedback() {
    let cfg = InsightConfig::default();
    let backend = MemoryBackend::new(cfg.trigger.offset());
    let engine = InsightEngine::new(
        cfg.clone(),
        backend.stores(),
        heuristic(&cfg),
        EmitterMux::new().with(Arc::new(StalledEmitter)),
    );
    coffee_user(&engine, &backend, 1).await;

    let log = backend.logs.append(1, "Had coffee today, feeling great", t0()).unwrap();
    let outcome = tokio::time::timeout(std::time::Duration::from_secs(5), engine.on_log_created(&log, t0()))
        .await
        .expect("log handling finished")
        .unwrap();
    let insight = outcome.pipeline.insight().cloned().expect("insight created");

    let feedback = FeedbackSubmission {
        user_id: 1,
        insight_id: insight.id,
        vote: Vote::Dislike,
        reason: None,
        score: None,
        comment: None,
    };
    let profile = tokio::time::timeout(std::time::Duration::from_secs(5), engine.submit_feedback(feedback, t0()))
        .await
        .expect("feedback finished")
        .unwrap();
    assert_eq!(profile.user_id, 1);
}
