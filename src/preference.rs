//! Per-user insight-kind weights learned from feedback.
//!
//! Update rule per submission:
//!   LIKE    → weight[kind] += 0.15
//!   DISLIKE → weight[kind] -= 0.25
//!   DISLIKE with reason "too sharp" → additionally WARNING -= 0.20, CONTRAST -= 0.15
//! Every weight stays within [-1.5, 1.5]. The dislike streak counts consecutive
//! negativity: +1 per DISLIKE (max 10), -1 per LIKE (min 0).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{FeedbackReason, InsightKind, UserId, Vote};

pub const WEIGHT_MIN: f64 = -1.5;
pub const WEIGHT_MAX: f64 = 1.5;
pub const LIKE_DELTA: f64 = 0.15;
pub const DISLIKE_DELTA: f64 = -0.25;
pub const TOO_SHARP_WARNING_DELTA: f64 = -0.20;
pub const TOO_SHARP_CONTRAST_DELTA: f64 = -0.15;
pub const DISLIKE_STREAK_MAX: u32 = 10;

/// Baseline for kinds that tend to be over-produced.
const BASELINE_SUPPRESSED: f64 = -0.2;

/// Weight at or below which a kind counts as strongly disliked.
pub const STRONG_DISLIKE: f64 = -0.8;

/// Streak length from which prompts switch to a gentler tone.
pub const GENTLE_TONE_STREAK: u32 = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceProfile {
    pub user_id: UserId,
    pub weights: BTreeMap<InsightKind, f64>,
    pub dislike_streak: u32,
    pub updated_at: DateTime<Utc>,
}

impl PreferenceProfile {
    /// Fresh profile with baseline weights.
    pub fn baseline(user_id: UserId, now: DateTime<Utc>) -> Self {
        let mut weights = BTreeMap::new();
        for kind in InsightKind::ALL {
            let w = match kind {
                InsightKind::Warning | InsightKind::Question => BASELINE_SUPPRESSED,
                _ => 0.0,
            };
            weights.insert(kind, w);
        }
        Self {
            user_id,
            weights,
            dislike_streak: 0,
            updated_at: now,
        }
    }

    /// Weight for `kind`, 0.0 when absent.
    pub fn weight(&self, kind: InsightKind) -> f64 {
        self.weights.get(&kind).copied().unwrap_or(0.0)
    }

    pub fn wants_gentle_tone(&self) -> bool {
        self.dislike_streak >= GENTLE_TONE_STREAK
    }

    /// Next profile after one feedback submission on an insight of `kind`.
    pub fn apply_feedback(
        &self,
        kind: InsightKind,
        vote: Vote,
        reason: Option<&FeedbackReason>,
        now: DateTime<Utc>,
    ) -> PreferenceProfile {
        let mut next = self.clone();
        match vote {
            Vote::Like => {
                next.bump(kind, LIKE_DELTA);
                next.dislike_streak = next.dislike_streak.saturating_sub(1);
            }
            Vote::Dislike => {
                next.bump(kind, DISLIKE_DELTA);
                if matches!(reason, Some(FeedbackReason::TooSharp)) {
                    next.bump(InsightKind::Warning, TOO_SHARP_WARNING_DELTA);
                    next.bump(InsightKind::Contrast, TOO_SHARP_CONTRAST_DELTA);
                }
                next.dislike_streak = (next.dislike_streak + 1).min(DISLIKE_STREAK_MAX);
            }
        }
        next.updated_at = now;
        next
    }

    fn bump(&mut self, kind: InsightKind, delta: f64) {
        let w = (self.weight(kind) + delta).clamp(WEIGHT_MIN, WEIGHT_MAX);
        self.weights.insert(kind, w);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn baseline_suppresses_warning_and_question() {
        let p = PreferenceProfile::baseline(1, t0());
        assert!(p.weight(InsightKind::Warning) < 0.0);
        assert!(p.weight(InsightKind::Question) < 0.0);
        assert_eq!(p.weight(InsightKind::Pattern), 0.0);
    }

    #[test]
    fn too_sharp_dislike_hits_warning_twice() {
        let p = PreferenceProfile::baseline(1, t0());
        let before_w = p.weight(InsightKind::Warning);
        let before_c = p.weight(InsightKind::Contrast);
        let next = p.apply_feedback(
            InsightKind::Warning,
            Vote::Dislike,
            Some(&FeedbackReason::TooSharp),
            t0(),
        );
        assert!((next.weight(InsightKind::Warning) - (before_w - 0.45)).abs() < 1e-9);
        assert!((next.weight(InsightKind::Contrast) - (before_c - 0.15)).abs() < 1e-9);
        assert_eq!(next.dislike_streak, 1);
    }

    #[test]
    fn weights_stay_clamped_under_long_sequences() {
        let mut p = PreferenceProfile::baseline(1, t0());
        for i in 0..40 {
            let vote = if i % 7 == 0 { Vote::Like } else { Vote::Dislike };
            p = p.apply_feedback(InsightKind::Warning, vote, Some(&FeedbackReason::TooSharp), t0());
        }
        for _ in 0..40 {
            p = p.apply_feedback(InsightKind::Pattern, Vote::Like, None, t0());
        }
        for w in p.weights.values() {
            assert!((WEIGHT_MIN..=WEIGHT_MAX).contains(w), "weight {w} escaped clamp");
        }
        assert_eq!(p.weight(InsightKind::Warning), WEIGHT_MIN);
        assert_eq!(p.weight(InsightKind::Pattern), WEIGHT_MAX);
    }

    #[test]
    fn streak_is_bounded_both_ways() {
        let mut p = PreferenceProfile::baseline(1, t0());
        for _ in 0..15 {
            p = p.apply_feedback(InsightKind::Highlight, Vote::Dislike, None, t0());
        }
        assert_eq!(p.dislike_streak, DISLIKE_STREAK_MAX);
        assert!(p.wants_gentle_tone());
        for _ in 0..15 {
            p = p.apply_feedback(InsightKind::Highlight, Vote::Like, None, t0());
        }
        assert_eq!(p.dislike_streak, 0);
    }
}
