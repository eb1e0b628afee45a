//! # Insight engine
//! Composition root: wires the stores, generator and emitters into the
//! pipeline, the signal components and the feedback service, and exposes one
//! entry point per external event.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use tokio::task::JoinHandle;

use crate::config::InsightConfig;
use crate::feedback::{FeedbackService, FeedbackSubmission};
use crate::generate::InsightGenerator;
use crate::keylock::KeyedLocks;
use crate::model::{keyword_key, Log, UserId};
use crate::notify::EmitterMux;
use crate::pipeline::{InsightPipeline, LogEventDispatcher, PipelineOutcome, PipelineStores};
use crate::preference::PreferenceProfile;
use crate::scheduler::spawn_sweep_scheduler;
use crate::signal::{
    KeywordInsightRegenerator, KeywordLifecycle, LifecycleChange, SignalLocks, SignalState, SignalUpdater,
    SweepReport, WaterDrop,
};
use crate::store::{
    CooldownStore, FeedbackStore, InsightStore, InterestGate, LogStore, MemoryCooldownStore, MemoryInsightStore,
    MemoryInterestGate, MemoryLogStore, MemoryPreferenceStore, MemorySignalStore, PreferenceStore, SignalStore,
};

/// Every collaborator the engine talks to.
#[derive(Clone)]
pub struct EngineStores {
    pub gate: Arc<dyn InterestGate>,
    pub cooldowns: Arc<dyn CooldownStore>,
    pub logs: Arc<dyn LogStore>,
    pub insights: Arc<dyn InsightStore>,
    pub feedback: Arc<dyn FeedbackStore>,
    pub signals: Arc<dyn SignalStore>,
    pub preferences: Arc<dyn PreferenceStore>,
}

/// In-memory backend with typed handles, for the runner and tests that need
/// to write logs and keyword settings directly.
#[derive(Clone)]
pub struct MemoryBackend {
    pub logs: Arc<MemoryLogStore>,
    pub insights: Arc<MemoryInsightStore>,
    pub gate: Arc<MemoryInterestGate>,
    pub cooldowns: Arc<MemoryCooldownStore>,
    pub signals: Arc<MemorySignalStore>,
    pub preferences: Arc<MemoryPreferenceStore>,
}

impl MemoryBackend {
    pub fn new(offset: FixedOffset) -> Self {
        Self {
            logs: Arc::new(MemoryLogStore::new()),
            insights: Arc::new(MemoryInsightStore::new()),
            gate: Arc::new(MemoryInterestGate::new()),
            cooldowns: Arc::new(MemoryCooldownStore::new(offset)),
            signals: Arc::new(MemorySignalStore::new()),
            preferences: Arc::new(MemoryPreferenceStore::new()),
        }
    }

    pub fn stores(&self) -> EngineStores {
        EngineStores {
            gate: self.gate.clone(),
            cooldowns: self.cooldowns.clone(),
            logs: self.logs.clone(),
            insights: self.insights.clone(),
            feedback: self.insights.clone(),
            signals: self.signals.clone(),
            preferences: self.preferences.clone(),
        }
    }
}

/// What one log-created signal did.
#[derive(Debug, Clone)]
pub struct LogOutcome {
    pub pipeline: PipelineOutcome,
    /// Signals whose candy changed.
    pub signals: Vec<SignalState>,
}

pub struct InsightEngine {
    cfg: InsightConfig,
    pipeline: Arc<InsightPipeline>,
    updater: Arc<SignalUpdater>,
    lifecycle: KeywordLifecycle,
    regen: Arc<KeywordInsightRegenerator>,
    feedback: FeedbackService,
    signals: Arc<dyn SignalStore>,
}

impl InsightEngine {
    pub fn new(cfg: InsightConfig, stores: EngineStores, generator: Arc<InsightGenerator>, emitter: EmitterMux) -> Self {
        let user_locks = Arc::new(KeyedLocks::<UserId>::new());
        let signal_locks = Arc::new(SignalLocks::new());

        let pipeline = InsightPipeline::new(
            &cfg,
            PipelineStores {
                gate: stores.gate.clone(),
                cooldowns: stores.cooldowns.clone(),
                logs: stores.logs.clone(),
                insights: stores.insights.clone(),
                preferences: stores.preferences.clone(),
            },
            generator.clone(),
            emitter,
            user_locks.clone(),
        );
        let updater = SignalUpdater::new(
            cfg.signal.clone(),
            stores.gate.clone(),
            stores.signals.clone(),
            signal_locks.clone(),
        );
        let lifecycle = KeywordLifecycle::new(stores.signals.clone(), signal_locks.clone());
        let regen = KeywordInsightRegenerator::new(
            cfg.signal.clone(),
            stores.signals.clone(),
            stores.logs.clone(),
            stores.insights.clone(),
            generator,
            signal_locks,
        );
        let feedback = FeedbackService::new(
            stores.feedback.clone(),
            stores.insights.clone(),
            stores.preferences.clone(),
            user_locks,
        );

        Self {
            cfg,
            pipeline: Arc::new(pipeline),
            updater: Arc::new(updater),
            lifecycle,
            regen: Arc::new(regen),
            feedback,
            signals: stores.signals,
        }
    }

    pub fn config(&self) -> &InsightConfig {
        &self.cfg
    }

    /// Run the pipeline and the signal updater for a committed log.
    pub async fn on_log_created(&self, log: &Log, now: DateTime<Utc>) -> anyhow::Result<LogOutcome> {
        let (pipeline, signals) = tokio::join!(
            self.pipeline.process(log, now),
            self.updater.on_log_created(log, now)
        );
        Ok(LogOutcome {
            pipeline: pipeline?,
            signals: signals?,
        })
    }

    /// Queue-based alternative to `on_log_created` for fire-and-forget callers.
    pub fn dispatcher(&self, capacity: usize) -> (LogEventDispatcher, JoinHandle<()>) {
        LogEventDispatcher::spawn(self.pipeline.clone(), self.updater.clone(), capacity)
    }

    pub async fn keyword_added(&self, user_id: UserId, keyword: &str, now: DateTime<Utc>) -> anyhow::Result<LifecycleChange> {
        self.lifecycle.keyword_added(user_id, keyword, now).await
    }

    pub async fn keyword_removed(
        &self,
        user_id: UserId,
        keyword: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<LifecycleChange> {
        self.lifecycle.keyword_removed(user_id, keyword, now).await
    }

    pub async fn submit_feedback(&self, sub: FeedbackSubmission, now: DateTime<Utc>) -> anyhow::Result<PreferenceProfile> {
        self.feedback.submit(sub, now).await
    }

    pub async fn sweep(&self, now: DateTime<Utc>) -> anyhow::Result<SweepReport> {
        self.regen.sweep(now).await
    }

    pub fn spawn_scheduler(&self) -> JoinHandle<()> {
        spawn_sweep_scheduler(self.cfg.scheduler.clone(), self.regen.clone())
    }

    pub async fn signal(&self, user_id: UserId, keyword: &str) -> anyhow::Result<Option<SignalState>> {
        self.signals.get(user_id, &keyword_key(keyword)).await
    }

    pub async fn active_signals(&self, user_id: UserId) -> anyhow::Result<Vec<SignalState>> {
        self.signals.active_for_user(user_id).await
    }

    pub async fn water_drops(&self, user_id: UserId) -> anyhow::Result<Vec<WaterDrop>> {
        self.signals.water_drops_for_user(user_id).await
    }
}
