//! Post-commit delivery of `InsightCreatedEvent`s.
//!
//! Publishing is fire-and-forget from the pipeline's point of view: the mux
//! logs emitter failures and never reports them upstream. Each emitter gets
//! `PUBLISH_TIMEOUT` before it is abandoned.

pub mod webhook;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::model::InsightCreatedEvent;

pub use webhook::WebhookEmitter;

pub const PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait::async_trait]
pub trait NotificationEmitter: Send + Sync {
    async fn publish(&self, ev: &InsightCreatedEvent) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Writes each event to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEmitter;

#[async_trait::async_trait]
impl NotificationEmitter for TracingEmitter {
    async fn publish(&self, ev: &InsightCreatedEvent) -> Result<()> {
        tracing::info!(
            target: "pipeline",
            user_id = ev.user_id,
            insight_id = ev.insight_id,
            "insight created"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "tracing"
    }
}

/// Forwards events into a tokio channel (runner output, tests).
#[derive(Debug, Clone)]
pub struct ChannelEmitter {
    tx: mpsc::UnboundedSender<InsightCreatedEvent>,
}

impl ChannelEmitter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<InsightCreatedEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait::async_trait]
impl NotificationEmitter for ChannelEmitter {
    async fn publish(&self, ev: &InsightCreatedEvent) -> Result<()> {
        self.tx
            .send(ev.clone())
            .map_err(|_| anyhow::anyhow!("event receiver dropped"))
    }

    fn name(&self) -> &'static str {
        "channel"
    }
}

/// Fan-out to every configured emitter.
#[derive(Clone)]
pub struct EmitterMux {
    emitters: Vec<Arc<dyn NotificationEmitter>>,
    publish_timeout: Duration,
}

impl Default for EmitterMux {
    fn default() -> Self {
        Self {
            emitters: Vec::new(),
            publish_timeout: PUBLISH_TIMEOUT,
        }
    }
}

impl EmitterMux {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, publish_timeout: Duration) -> Self {
        self.publish_timeout = publish_timeout;
        self
    }

    /// Tracing always; the webhook when `INSIGHT_WEBHOOK_URL` is set.
    pub fn from_env() -> Self {
        let mut mux = Self::new().with(Arc::new(TracingEmitter));
        let webhook = WebhookEmitter::from_env();
        if webhook.is_enabled() {
            mux = mux.with(Arc::new(webhook));
        }
        mux
    }

    pub fn with(mut self, emitter: Arc<dyn NotificationEmitter>) -> Self {
        self.emitters.push(emitter);
        self
    }

    pub fn len(&self) -> usize {
        self.emitters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emitters.is_empty()
    }

    pub async fn notify(&self, ev: &InsightCreatedEvent) {
        for e in &self.emitters {
            match timeout(self.publish_timeout, e.publish(ev)).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => tracing::warn!(
                    target: "pipeline",
                    emitter = e.name(),
                    insight_id = ev.insight_id,
                    "notify failed: {err:#}"
                ),
                Err(_) => tracing::warn!(
                    target: "pipeline",
                    emitter = e.name(),
                    insight_id = ev.insight_id,
                    timeout_ms = self.publish_timeout.as_millis() as u64,
                    "notify timed out"
                ),
            }
        }
    }
}
