//! Feedback submission: store the vote, then adapt the user's profile.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use crate::keylock::KeyedLocks;
use crate::model::{FeedbackReason, InsightFeedback, InsightId, UserId, Vote};
use crate::preference::PreferenceProfile;
use crate::store::{FeedbackStore, InsightStore, PreferenceStore};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedbackSubmission {
    pub user_id: UserId,
    pub insight_id: InsightId,
    pub vote: Vote,
    #[serde(default)]
    pub reason: Option<FeedbackReason>,
    #[serde(default)]
    pub score: Option<u8>,
    #[serde(default)]
    pub comment: Option<String>,
}

pub struct FeedbackService {
    feedback: Arc<dyn FeedbackStore>,
    insights: Arc<dyn InsightStore>,
    preferences: Arc<dyn PreferenceStore>,
    locks: Arc<KeyedLocks<UserId>>,
}

impl FeedbackService {
    pub fn new(
        feedback: Arc<dyn FeedbackStore>,
        insights: Arc<dyn InsightStore>,
        preferences: Arc<dyn PreferenceStore>,
        locks: Arc<KeyedLocks<UserId>>,
    ) -> Self {
        Self {
            feedback,
            insights,
            preferences,
            locks,
        }
    }

    /// Upsert the feedback row and return the updated profile.
    pub async fn submit(&self, sub: FeedbackSubmission, now: DateTime<Utc>) -> anyhow::Result<PreferenceProfile> {
        if let Some(score) = sub.score {
            anyhow::ensure!((1..=5).contains(&score), "feedback score {score} outside 1..=5");
        }
        let insight = self
            .insights
            .find(sub.user_id, sub.insight_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("insight {} not found for user {}", sub.insight_id, sub.user_id))?;

        self.feedback
            .upsert(InsightFeedback {
                user_id: sub.user_id,
                insight_id: sub.insight_id,
                vote: sub.vote,
                reason: sub.reason.clone(),
                score: sub.score,
                comment: sub.comment.clone(),
                updated_at: now,
            })
            .await?;

        let _guard = self.locks.lock(sub.user_id).await;
        let current = self
            .preferences
            .get(sub.user_id)
            .await?
            .unwrap_or_else(|| PreferenceProfile::baseline(sub.user_id, now));
        let next = current.apply_feedback(insight.kind, sub.vote, sub.reason.as_ref(), now);
        self.preferences.save(next.clone()).await?;

        info!(
            target: "feedback",
            user_id = sub.user_id,
            insight_id = sub.insight_id,
            kind = %insight.kind,
            vote = ?sub.vote,
            too_sharp = matches!(sub.reason, Some(FeedbackReason::TooSharp)),
            dislike_streak = next.dislike_streak,
            "preference profile updated"
        );
        Ok(next)
    }
}
