use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;

use super::{NotificationEmitter, PUBLISH_TIMEOUT};
use crate::model::InsightCreatedEvent;

/// POSTs `InsightCreatedEvent` as JSON to `INSIGHT_WEBHOOK_URL`.
pub struct WebhookEmitter {
    url: Option<String>,
    client: Client,
}

fn http_client() -> Client {
    Client::builder()
        .connect_timeout(Duration::from_secs(3))
        .timeout(PUBLISH_TIMEOUT)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!("webhook client build failed, using defaults: {e}");
            Client::new()
        })
}

impl WebhookEmitter {
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("INSIGHT_WEBHOOK_URL").ok().filter(|u| !u.trim().is_empty()),
            client: http_client(),
        }
    }

    pub fn new(url: String) -> Self {
        Self {
            url: Some(url),
            client: http_client(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.url.is_some()
    }
}

#[async_trait::async_trait]
impl NotificationEmitter for WebhookEmitter {
    async fn publish(&self, ev: &InsightCreatedEvent) -> Result<()> {
        let Some(url) = &self.url else {
            tracing::debug!("webhook disabled (no INSIGHT_WEBHOOK_URL)");
            return Ok(());
        };

        self.client
            .post(url)
            .json(ev)
            .send()
            .await
            .context("webhook post")?
            .error_for_status()
            .context("webhook non-2xx")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}
