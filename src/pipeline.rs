//! # Insight pipeline
//! One log-created signal → at most one persisted insight.
//!
//! Gated → ContextBuilt → Generated → Persisted → CooldownMarked → EventEmitted
//!
//! Any gate rejection or generation failure ends the run as a value with no
//! side effects. Store failures propagate as `Err`; the cooldown is only
//! marked after the insight row exists, and the event only goes out after
//! both. The per-user lock covers decide through cooldown mark; emission runs
//! on its own task after the lock is released.
//!
//! `LogEventDispatcher` feeds the pipeline and the signal updater from one
//! queue: per-user work is chained in arrival order, users run in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{ContextConfig, InsightConfig, TriggerConfig};
use crate::context::ContextBuilder;
use crate::generate::{GenerationError, InsightGenerator};
use crate::keylock::KeyedLocks;
use crate::model::{Insight, InsightCreatedEvent, Log, NewInsight, UserId};
use crate::notify::EmitterMux;
use crate::signal::SignalUpdater;
use crate::store::{CooldownStore, InsightStore, InterestGate, LogStore, PreferenceStore};
use crate::telemetry::anon_hash;
use crate::trigger::{SkipReason, TriggerPolicy};

/// Terminal state of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    Skipped(SkipReason),
    NotGenerated(GenerationError),
    Created(Insight),
}

impl PipelineOutcome {
    pub fn insight(&self) -> Option<&Insight> {
        match self {
            PipelineOutcome::Created(i) => Some(i),
            _ => None,
        }
    }
}

/// Collaborators the pipeline reads and writes.
#[derive(Clone)]
pub struct PipelineStores {
    pub gate: Arc<dyn InterestGate>,
    pub cooldowns: Arc<dyn CooldownStore>,
    pub logs: Arc<dyn LogStore>,
    pub insights: Arc<dyn InsightStore>,
    pub preferences: Arc<dyn PreferenceStore>,
}

pub struct InsightPipeline {
    trigger: TriggerConfig,
    context: ContextConfig,
    stores: PipelineStores,
    generator: Arc<InsightGenerator>,
    emitter: EmitterMux,
    user_locks: Arc<KeyedLocks<UserId>>,
}

impl InsightPipeline {
    pub fn new(
        cfg: &InsightConfig,
        stores: PipelineStores,
        generator: Arc<InsightGenerator>,
        emitter: EmitterMux,
        user_locks: Arc<KeyedLocks<UserId>>,
    ) -> Self {
        Self {
            trigger: cfg.trigger.clone(),
            context: cfg.context.clone(),
            stores,
            generator,
            emitter,
            user_locks,
        }
    }

    pub async fn process(&self, log: &Log, now: DateTime<Utc>) -> anyhow::Result<PipelineOutcome> {
        let user_id = log.user_id;
        // Decide and mark under one per-user lock so two logs can't both pass the cooldown.
        let guard = self.user_locks.lock(user_id).await;

        let decision = TriggerPolicy::new(&self.trigger, self.stores.gate.as_ref(), self.stores.cooldowns.as_ref())
            .decide(user_id, log, now)
            .await?;
        if let Some(reason) = decision.reason {
            counter!("insight_trigger_skipped_total", "reason" => reason.code()).increment(1);
            debug!(target: "trigger", user_id, log_id = log.id, reason = reason.code(), "skipped");
            return Ok(PipelineOutcome::Skipped(reason));
        }

        let ctx = ContextBuilder::new(&self.context, self.stores.logs.as_ref(), self.stores.insights.as_ref())
            .build(log, decision.matched_keyword, now)
            .await?;
        let profile = self.stores.preferences.get(user_id).await?;

        let generated = match self.generator.generate(&ctx, profile.as_ref()).await {
            Ok(g) => g,
            Err(e) => {
                counter!("insight_generation_failed_total", "cause" => e.cause()).increment(1);
                match &e {
                    GenerationError::InsufficientMaterial { .. } => {
                        debug!(target: "pipeline", user_id, log_id = log.id, "not enough material")
                    }
                    _ => warn!(
                        target: "pipeline",
                        user_id,
                        log_id = log.id,
                        content = %anon_hash(&log.content),
                        cause = e.cause(),
                        "generation failed: {e}"
                    ),
                }
                return Ok(PipelineOutcome::NotGenerated(e));
            }
        };

        let saved = self
            .stores
            .insights
            .save(NewInsight {
                user_id,
                source_log_id: ctx.source_log_id,
                kind: generated.kind,
                title: generated.title,
                body: generated.body,
                evidence: generated.evidence,
                keyword: generated.keyword,
                created_at: now,
            })
            .await?;
        self.stores.cooldowns.mark_run(user_id, now).await?;
        drop(guard);

        counter!("insight_generated_total").increment(1);
        info!(
            target: "pipeline",
            user_id,
            log_id = log.id,
            insight_id = saved.id,
            kind = %saved.kind,
            lang = %generated.language,
            "insight persisted"
        );

        let emitter = self.emitter.clone();
        let event = InsightCreatedEvent {
            user_id,
            insight_id: saved.id,
            title: saved.title.clone(),
        };
        tokio::spawn(async move { emitter.notify(&event).await });
        Ok(PipelineOutcome::Created(saved))
    }
}

/// Everything one log-created signal fans out to.
#[derive(Debug)]
struct LogCreated {
    log: Log,
    now: DateTime<Utc>,
}

/// Queue in front of the pipeline and the signal updater.
#[derive(Clone)]
pub struct LogEventDispatcher {
    tx: mpsc::Sender<LogCreated>,
}

impl LogEventDispatcher {
    /// Start the worker. It exits (after draining in-flight work) once every
    /// dispatcher clone is dropped.
    pub fn spawn(
        pipeline: Arc<InsightPipeline>,
        updater: Arc<SignalUpdater>,
        capacity: usize,
    ) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<LogCreated>(capacity.max(1));
        let worker = tokio::spawn(async move {
            let mut tails: HashMap<UserId, JoinHandle<()>> = HashMap::new();
            while let Some(ev) = rx.recv().await {
                tails.retain(|_, h| !h.is_finished());
                let user_id = ev.log.user_id;
                let prev = tails.remove(&user_id);
                let pipeline = pipeline.clone();
                let updater = updater.clone();
                let handle = tokio::spawn(async move {
                    if let Some(prev) = prev {
                        let _ = prev.await;
                    }
                    handle_log_created(&pipeline, &updater, &ev.log, ev.now).await;
                });
                tails.insert(user_id, handle);
            }
            for (_, h) in tails {
                let _ = h.await;
            }
        });
        (Self { tx }, worker)
    }

    pub async fn dispatch(&self, log: Log, now: DateTime<Utc>) -> anyhow::Result<()> {
        self.tx
            .send(LogCreated { log, now })
            .await
            .map_err(|_| anyhow::anyhow!("log dispatcher stopped"))
    }
}

/// Pipeline and updater run concurrently; neither failure affects the other.
async fn handle_log_created(pipeline: &InsightPipeline, updater: &SignalUpdater, log: &Log, now: DateTime<Utc>) {
    let (outcome, signals) = tokio::join!(pipeline.process(log, now), updater.on_log_created(log, now));
    if let Err(e) = outcome {
        warn!(target: "pipeline", user_id = log.user_id, log_id = log.id, "pipeline failed: {e:#}");
    }
    if let Err(e) = signals {
        warn!(target: "signal", user_id = log.user_id, log_id = log.id, "signal update failed: {e:#}");
    }
}
