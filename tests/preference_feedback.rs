// tests/preference_feedback.rs
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use diary_insights::config::InsightConfig;
use diary_insights::engine::{InsightEngine, MemoryBackend};
use diary_insights::feedback::FeedbackSubmission;
use diary_insights::generate::{GeneratorStrategy, HeuristicWriter, InsightGenerator, SeededRandom};
use diary_insights::model::{FeedbackReason, Insight, InsightKind, NewInsight, Vote};
use diary_insights::notify::EmitterMux;
use diary_insights::preference::{PreferenceProfile, WEIGHT_MAX, WEIGHT_MIN};
use diary_insights::store::InsightStore;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 1, 9, 0, 0).unwrap()
}

fn engine() -> (InsightEngine, MemoryBackend) {
    let cfg = InsightConfig::default();
    let backend = MemoryBackend::new(cfg.trigger.offset());
    let generator = Arc::new(InsightGenerator::new(
        cfg.generator.clone(),
        cfg.trigger.offset(),
        GeneratorStrategy::Heuristic(HeuristicWriter::new(Arc::new(SeededRandom::new(1)))),
    ));
    let engine = InsightEngine::new(cfg, backend.stores(), generator, EmitterMux::new());
    (engine, backend)
}

async fn insight(backend: &MemoryBackend, kind: InsightKind) -> Insight {
    backend
        .insights
        .save(NewInsight {
            user_id: 1,
            source_log_id: 1,
            kind,
            title: "Sharp words".into(),
            body: "You keep saying yes to things you resent.".into(),
            evidence: None,
            keyword: Some("work".into()),
            created_at: t0(),
        })
        .await
        .unwrap()
}

fn vote(insight_id: i64, vote: Vote, reason: Option<FeedbackReason>) -> FeedbackSubmission {
    FeedbackSubmission {
        user_id: 1,
        insight_id,
        vote,
        reason,
        score: None,
        comment: None,
    }
}

#[tokio::test]
async fn too_sharp_dislike_on_warning() {
    let (engine, backend) = engine();
    let warning = insight(&backend, InsightKind::Warning).await;
    let baseline = PreferenceProfile::baseline(1, t0());

    let profile = engine
        .submit_feedback(vote(warning.id, Vote::Dislike, Some(FeedbackReason::TooSharp)), t0())
        .await
        .unwrap();

    let dw = profile.weight(InsightKind::Warning) - baseline.weight(InsightKind::Warning);
    let dc = profile.weight(InsightKind::Contrast) - baseline.weight(InsightKind::Contrast);
    assert!((dw + 0.45).abs() < 1e-9, "warning moved by {dw}");
    assert!((dc + 0.15).abs() < 1e-9, "contrast moved by {dc}");
    assert_eq!(profile.dislike_streak, 1);

    let stored = backend.insights.feedback_for(1, warning.id).unwrap();
    assert_eq!(stored.vote, Vote::Dislike);
    assert_eq!(stored.reason, Some(FeedbackReason::TooSharp));
}

#[tokio::test]
async fn resubmission_overwrites_the_row() {
    let (engine, backend) = engine();
    let pattern = insight(&backend, InsightKind::Pattern).await;
    engine
        .submit_feedback(vote(pattern.id, Vote::Dislike, None), t0())
        .await
        .unwrap();
    let profile = engine
        .submit_feedback(vote(pattern.id, Vote::Like, None), t0())
        .await
        .unwrap();
    assert_eq!(backend.insights.feedback_for(1, pattern.id).unwrap().vote, Vote::Like);
    assert!((profile.weight(InsightKind::Pattern) - (-0.25 + 0.15)).abs() < 1e-9);
    assert_eq!(profile.dislike_streak, 0);
}

#[tokio::test]
async fn unknown_insight_and_bad_score_are_rejected() {
    let (engine, backend) = engine();
    assert!(engine.submit_feedback(vote(999, Vote::Like, None), t0()).await.is_err());

    let pattern = insight(&backend, InsightKind::Pattern).await;
    let mut sub = vote(pattern.id, Vote::Like, None);
    sub.score = Some(6);
    assert!(engine.submit_feedback(sub, t0()).await.is_err());
    assert!(backend.insights.feedback_for(1, pattern.id).is_none());
}

#[test]
fn weights_and_streak_stay_bounded_under_any_sequence() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut profile = PreferenceProfile::baseline(1, t0());
    for _ in 0..2_000 {
        let kind = InsightKind::ALL[rng.random_range(0..InsightKind::ALL.len())];
        let v = if rng.random_bool(0.5) { Vote::Like } else { Vote::Dislike };
        let reason = rng.random_bool(0.3).then_some(FeedbackReason::TooSharp);
        profile = profile.apply_feedback(kind, v, reason.as_ref(), t0());
        for w in profile.weights.values() {
            assert!((WEIGHT_MIN..=WEIGHT_MAX).contains(w));
        }
        assert!(profile.dislike_streak <= 10);
    }
}

#[test]
fn gentle_tone_after_three_dislikes() {
    let mut profile = PreferenceProfile::baseline(1, t0());
    for _ in 0..3 {
        assert!(!profile.wants_gentle_tone());
        profile = profile.apply_feedback(InsightKind::Pattern, Vote::Dislike, None, t0());
    }
    assert!(profile.wants_gentle_tone());
    profile = profile.apply_feedback(InsightKind::Pattern, Vote::Like, None, t0());
    assert!(!profile.wants_gentle_tone());
}
