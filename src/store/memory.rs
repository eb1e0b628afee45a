//! In-memory adapters for every collaborator trait. Used by the runner binary
//! and by tests; a database-backed deployment swaps these out.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};

use super::{
    CooldownStore, FeedbackStore, InsightStore, InterestGate, LogStore, PreferenceStore,
    SignalStore,
};
use crate::cooldown::CooldownTracker;
use crate::model::{
    keyword_key, Insight, InsightFeedback, InsightId, LikedInsight, Log, LogId, NewInsight,
    UserId, Vote,
};
use crate::preference::PreferenceProfile;
use crate::signal::{SignalState, WaterDrop};

fn guard<T>(m: &Mutex<T>) -> anyhow::Result<MutexGuard<'_, T>> {
    m.lock().map_err(|_| anyhow::anyhow!("in-memory store mutex poisoned"))
}

// ------------------------------------------------------------
// Logs
// ------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryLogStore {
    inner: Mutex<Vec<Log>>,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new log and return it with its assigned id.
    pub fn append(
        &self,
        user_id: UserId,
        content: impl Into<String>,
        at: DateTime<Utc>,
    ) -> anyhow::Result<Log> {
        let mut v = guard(&self.inner)?;
        let log = Log {
            id: v.len() as LogId + 1,
            user_id,
            content: content.into(),
            created_at: at,
        };
        v.push(log.clone());
        Ok(log)
    }
}

#[async_trait]
impl LogStore for MemoryLogStore {
    async fn latest_for_user(&self, user_id: UserId, limit: usize) -> anyhow::Result<Vec<Log>> {
        let v = guard(&self.inner)?;
        let mut out: Vec<Log> = v.iter().filter(|l| l.user_id == user_id).cloned().collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        out.truncate(limit);
        Ok(out)
    }
}

// ------------------------------------------------------------
// Insights + feedback
// ------------------------------------------------------------

#[derive(Debug, Default)]
struct InsightTables {
    insights: Vec<Insight>,
    feedback: HashMap<(UserId, InsightId), InsightFeedback>,
}

#[derive(Debug, Default)]
pub struct MemoryInsightStore {
    inner: Mutex<InsightTables>,
}

impl MemoryInsightStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all_for_user(&self, user_id: UserId) -> Vec<Insight> {
        self.inner
            .lock()
            .map(|t| t.insights.iter().filter(|i| i.user_id == user_id).cloned().collect())
            .unwrap_or_default()
    }

    pub fn feedback_for(&self, user_id: UserId, insight_id: InsightId) -> Option<InsightFeedback> {
        self.inner
            .lock()
            .ok()
            .and_then(|t| t.feedback.get(&(user_id, insight_id)).cloned())
    }
}

#[async_trait]
impl InsightStore for MemoryInsightStore {
    async fn save(&self, insight: NewInsight) -> anyhow::Result<Insight> {
        let mut t = guard(&self.inner)?;
        let saved = Insight {
            id: t.insights.len() as InsightId + 1,
            user_id: insight.user_id,
            source_log_id: insight.source_log_id,
            kind: insight.kind,
            title: insight.title,
            body: insight.body,
            evidence: insight.evidence,
            keyword: insight.keyword,
            created_at: insight.created_at,
        };
        t.insights.push(saved.clone());
        Ok(saved)
    }

    async fn find(&self, user_id: UserId, insight_id: InsightId) -> anyhow::Result<Option<Insight>> {
        let t = guard(&self.inner)?;
        Ok(t
            .insights
            .iter()
            .find(|i| i.id == insight_id && i.user_id == user_id)
            .cloned())
    }

    async fn latest_for_user(
        &self,
        user_id: UserId,
        limit: usize,
        since: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Vec<Insight>> {
        let t = guard(&self.inner)?;
        let mut out: Vec<Insight> = t
            .insights
            .iter()
            .filter(|i| i.user_id == user_id)
            .filter(|i| since.map_or(true, |s| i.created_at >= s))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        out.truncate(limit);
        Ok(out)
    }

    async fn top_liked_for_user_and_keyword(
        &self,
        user_id: UserId,
        keyword: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<LikedInsight>> {
        let key = keyword_key(keyword);
        let t = guard(&self.inner)?;
        let mut liked: Vec<(&InsightFeedback, &Insight)> = t
            .feedback
            .values()
            .filter(|f| f.user_id == user_id && f.vote == Vote::Like)
            .filter_map(|f| {
                t.insights
                    .iter()
                    .find(|i| i.id == f.insight_id && i.user_id == user_id)
                    .map(|i| (f, i))
            })
            .filter(|(_, i)| i.keyword.as_deref().map(keyword_key) == Some(key.clone()))
            .collect();
        liked.sort_by(|a, b| b.0.updated_at.cmp(&a.0.updated_at));
        Ok(liked
            .into_iter()
            .take(limit)
            .map(|(_, i)| LikedInsight {
                title: i.title.clone(),
                body: i.body.clone(),
                evidence: i.evidence.clone(),
            })
            .collect())
    }
}

#[async_trait]
impl FeedbackStore for MemoryInsightStore {
    async fn upsert(&self, feedback: InsightFeedback) -> anyhow::Result<()> {
        let mut t = guard(&self.inner)?;
        t.feedback.insert((feedback.user_id, feedback.insight_id), feedback);
        Ok(())
    }
}

// ------------------------------------------------------------
// Interest gate (feature switch + keywords)
// ------------------------------------------------------------

#[derive(Debug, Default, Clone)]
struct Interests {
    enabled: bool,
    keywords: Vec<String>,
}

#[derive(Debug, Default)]
pub struct MemoryInterestGate {
    inner: Mutex<HashMap<UserId, Interests>>,
}

impl MemoryInterestGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_enabled(&self, user_id: UserId, enabled: bool) -> anyhow::Result<()> {
        guard(&self.inner)?.entry(user_id).or_default().enabled = enabled;
        Ok(())
    }

    /// Returns false when the keyword was already registered.
    pub fn add_keyword(&self, user_id: UserId, keyword: &str) -> anyhow::Result<bool> {
        let key = keyword_key(keyword);
        if key.is_empty() {
            return Ok(false);
        }
        let mut m = guard(&self.inner)?;
        let entry = m.entry(user_id).or_default();
        if entry.keywords.iter().any(|k| keyword_key(k) == key) {
            return Ok(false);
        }
        entry.keywords.push(keyword.trim().to_string());
        Ok(true)
    }

    /// Returns false when the keyword was not registered.
    pub fn remove_keyword(&self, user_id: UserId, keyword: &str) -> anyhow::Result<bool> {
        let key = keyword_key(keyword);
        let mut m = guard(&self.inner)?;
        let Some(entry) = m.get_mut(&user_id) else {
            return Ok(false);
        };
        let before = entry.keywords.len();
        entry.keywords.retain(|k| keyword_key(k) != key);
        Ok(entry.keywords.len() != before)
    }
}

#[async_trait]
impl InterestGate for MemoryInterestGate {
    async fn is_enabled_for_user(&self, user_id: UserId) -> anyhow::Result<bool> {
        Ok(guard(&self.inner)?.get(&user_id).map(|i| i.enabled).unwrap_or(false))
    }

    async fn keywords_for_user(&self, user_id: UserId) -> anyhow::Result<Vec<String>> {
        Ok(guard(&self.inner)?
            .get(&user_id)
            .map(|i| i.keywords.clone())
            .unwrap_or_default())
    }
}

// ------------------------------------------------------------
// Cooldown
// ------------------------------------------------------------

#[derive(Debug)]
pub struct MemoryCooldownStore {
    offset: FixedOffset,
    inner: Mutex<HashMap<UserId, CooldownTracker>>,
}

impl MemoryCooldownStore {
    pub fn new(offset: FixedOffset) -> Self {
        Self {
            offset,
            inner: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl CooldownStore for MemoryCooldownStore {
    async fn last_run_at(&self, user_id: UserId) -> anyhow::Result<Option<DateTime<Utc>>> {
        Ok(guard(&self.inner)?.get(&user_id).and_then(|t| t.last_run_at()))
    }

    async fn mark_run(&self, user_id: UserId, at: DateTime<Utc>) -> anyhow::Result<()> {
        guard(&self.inner)?
            .entry(user_id)
            .or_default()
            .record_run(at, self.offset);
        Ok(())
    }

    async fn count_today(&self, user_id: UserId, now: DateTime<Utc>) -> anyhow::Result<u32> {
        Ok(guard(&self.inner)?
            .get(&user_id)
            .map(|t| t.count_today(now, self.offset))
            .unwrap_or(0))
    }
}

// ------------------------------------------------------------
// Signals + water drops
// ------------------------------------------------------------

#[derive(Debug, Default)]
struct SignalTables {
    states: BTreeMap<(UserId, String), SignalState>,
    drops: BTreeMap<(UserId, String), WaterDrop>,
}

#[derive(Debug, Default)]
pub struct MemorySignalStore {
    inner: Mutex<SignalTables>,
}

impl MemorySignalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SignalStore for MemorySignalStore {
    async fn get(&self, user_id: UserId, keyword_key: &str) -> anyhow::Result<Option<SignalState>> {
        Ok(guard(&self.inner)?
            .states
            .get(&(user_id, keyword_key.to_string()))
            .cloned())
    }

    async fn save(&self, state: SignalState) -> anyhow::Result<()> {
        guard(&self.inner)?
            .states
            .insert((state.user_id, state.keyword_key.clone()), state);
        Ok(())
    }

    async fn active_for_user(&self, user_id: UserId) -> anyhow::Result<Vec<SignalState>> {
        Ok(guard(&self.inner)?
            .states
            .values()
            .filter(|s| s.user_id == user_id && s.is_active())
            .cloned()
            .collect())
    }

    async fn users_with_active(&self) -> anyhow::Result<Vec<UserId>> {
        let t = guard(&self.inner)?;
        let mut users: Vec<UserId> = t
            .states
            .values()
            .filter(|s| s.is_active())
            .map(|s| s.user_id)
            .collect();
        users.dedup();
        Ok(users)
    }

    async fn find_water_drop(
        &self,
        user_id: UserId,
        keyword_key: &str,
    ) -> anyhow::Result<Option<WaterDrop>> {
        Ok(guard(&self.inner)?
            .drops
            .get(&(user_id, keyword_key.to_string()))
            .cloned())
    }

    async fn insert_water_drop(&self, drop: WaterDrop) -> anyhow::Result<()> {
        let mut t = guard(&self.inner)?;
        let key = (drop.user_id, drop.keyword_key.clone());
        if t.drops.contains_key(&key) {
            anyhow::bail!("water drop already exists for user {} keyword {}", key.0, key.1);
        }
        t.drops.insert(key, drop);
        Ok(())
    }

    async fn delete_water_drop(&self, user_id: UserId, keyword_key: &str) -> anyhow::Result<bool> {
        Ok(guard(&self.inner)?
            .drops
            .remove(&(user_id, keyword_key.to_string()))
            .is_some())
    }

    async fn water_drops_for_user(&self, user_id: UserId) -> anyhow::Result<Vec<WaterDrop>> {
        Ok(guard(&self.inner)?
            .drops
            .values()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect())
    }
}

// ------------------------------------------------------------
// Preference profiles
// ------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    inner: Mutex<HashMap<UserId, PreferenceProfile>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PreferenceStore for MemoryPreferenceStore {
    async fn get(&self, user_id: UserId) -> anyhow::Result<Option<PreferenceProfile>> {
        Ok(guard(&self.inner)?.get(&user_id).cloned())
    }

    async fn save(&self, profile: PreferenceProfile) -> anyhow::Result<()> {
        guard(&self.inner)?.insert(profile.user_id, profile);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 1, 9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn logs_come_back_most_recent_first() {
        let store = MemoryLogStore::new();
        store.append(1, "old", t0()).unwrap();
        store.append(2, "other user", t0()).unwrap();
        store.append(1, "new", t0() + Duration::hours(1)).unwrap();
        let got = store.latest_for_user(1, 10).await.unwrap();
        let texts: Vec<_> = got.iter().map(|l| l.content.as_str()).collect();
        assert_eq!(texts, vec!["new", "old"]);
    }

    #[tokio::test]
    async fn water_drop_is_unique_per_key() {
        let store = MemorySignalStore::new();
        let state = SignalState::new(1, "coffee", t0());
        store.insert_water_drop(WaterDrop::snapshot(&state, t0())).await.unwrap();
        assert!(store.insert_water_drop(WaterDrop::snapshot(&state, t0())).await.is_err());
        assert!(store.delete_water_drop(1, "coffee").await.unwrap());
        assert!(!store.delete_water_drop(1, "coffee").await.unwrap());
    }

    #[tokio::test]
    async fn gate_keywords_are_deduplicated_by_key() {
        let gate = MemoryInterestGate::new();
        assert!(gate.add_keyword(1, "Coffee").unwrap());
        assert!(!gate.add_keyword(1, " coffee ").unwrap());
        assert_eq!(gate.keywords_for_user(1).await.unwrap(), vec!["Coffee".to_string()]);
        assert!(gate.remove_keyword(1, "COFFEE").unwrap());
        assert!(gate.keywords_for_user(1).await.unwrap().is_empty());
    }
}
