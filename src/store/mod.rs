//! Collaborator contracts consumed by the pipeline.
//!
//! Persistence, decryption and transport live behind these traits. Errors are
//! `anyhow` so adapters can wrap whatever their backend raises; the pipeline
//! treats them as fatal for the current request.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::{
    Insight, InsightFeedback, InsightId, LikedInsight, Log, NewInsight, UserId,
};
use crate::preference::PreferenceProfile;
use crate::signal::{SignalState, WaterDrop};

pub use memory::{
    MemoryCooldownStore, MemoryInsightStore, MemoryInterestGate, MemoryLogStore,
    MemoryPreferenceStore, MemorySignalStore,
};

#[async_trait]
pub trait LogStore: Send + Sync {
    /// Most recent first.
    async fn latest_for_user(&self, user_id: UserId, limit: usize) -> anyhow::Result<Vec<Log>>;
}

#[async_trait]
pub trait InsightStore: Send + Sync {
    async fn save(&self, insight: NewInsight) -> anyhow::Result<Insight>;

    async fn find(&self, user_id: UserId, insight_id: InsightId) -> anyhow::Result<Option<Insight>>;

    /// Most recent first, optionally only those created at or after `since`.
    async fn latest_for_user(
        &self,
        user_id: UserId,
        limit: usize,
        since: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Vec<Insight>>;

    /// Liked insights for exactly this keyword, most recently liked first.
    async fn top_liked_for_user_and_keyword(
        &self,
        user_id: UserId,
        keyword: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<LikedInsight>>;
}

#[async_trait]
pub trait FeedbackStore: Send + Sync {
    /// Insert or replace the row for `(user_id, insight_id)`.
    async fn upsert(&self, feedback: InsightFeedback) -> anyhow::Result<()>;
}

#[async_trait]
pub trait InterestGate: Send + Sync {
    async fn is_enabled_for_user(&self, user_id: UserId) -> anyhow::Result<bool>;
    async fn keywords_for_user(&self, user_id: UserId) -> anyhow::Result<Vec<String>>;
}

#[async_trait]
pub trait CooldownStore: Send + Sync {
    async fn last_run_at(&self, user_id: UserId) -> anyhow::Result<Option<DateTime<Utc>>>;
    async fn mark_run(&self, user_id: UserId, at: DateTime<Utc>) -> anyhow::Result<()>;
    async fn count_today(&self, user_id: UserId, now: DateTime<Utc>) -> anyhow::Result<u32>;
}

#[async_trait]
pub trait SignalStore: Send + Sync {
    async fn get(&self, user_id: UserId, keyword_key: &str) -> anyhow::Result<Option<SignalState>>;
    async fn save(&self, state: SignalState) -> anyhow::Result<()>;
    async fn active_for_user(&self, user_id: UserId) -> anyhow::Result<Vec<SignalState>>;
    /// Users owning at least one ACTIVE signal; the sweep iterates these.
    async fn users_with_active(&self) -> anyhow::Result<Vec<UserId>>;

    async fn find_water_drop(
        &self,
        user_id: UserId,
        keyword_key: &str,
    ) -> anyhow::Result<Option<WaterDrop>>;
    async fn insert_water_drop(&self, drop: WaterDrop) -> anyhow::Result<()>;
    /// Returns whether a drop was removed.
    async fn delete_water_drop(&self, user_id: UserId, keyword_key: &str) -> anyhow::Result<bool>;
    async fn water_drops_for_user(&self, user_id: UserId) -> anyhow::Result<Vec<WaterDrop>>;
}

#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn get(&self, user_id: UserId) -> anyhow::Result<Option<PreferenceProfile>>;
    async fn save(&self, profile: PreferenceProfile) -> anyhow::Result<()>;
}
