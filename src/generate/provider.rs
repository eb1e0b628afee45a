//! Text-generation provider abstraction + concrete providers.
//!
//! The pipeline only needs `generate(system, user, schema) -> raw text`.
//! Failures are categorized so callers can log them meaningfully; all of
//! them end up as "no insight" upstream.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::GeneratorConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("provider call timed out")]
    Timeout,
    #[error("provider rate limited the request")]
    RateLimited,
    #[error("provider is busy")]
    Busy,
    #[error("transient provider failure: {0}")]
    Transient(String),
    #[error("permanent provider failure: {0}")]
    Permanent(String),
}

impl ProviderError {
    /// Short label for logs and metrics.
    pub fn category(&self) -> &'static str {
        match self {
            ProviderError::Timeout => "timeout",
            ProviderError::RateLimited => "rate_limited",
            ProviderError::Busy => "busy",
            ProviderError::Transient(_) => "transient",
            ProviderError::Permanent(_) => "permanent",
        }
    }
}

/// One structured-output call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system: String,
    pub user: String,
    pub schema_name: &'static str,
    pub schema: serde_json::Value,
}

#[async_trait]
pub trait TextGenerationProvider: Send + Sync {
    async fn generate(&self, req: &GenerationRequest) -> Result<String, ProviderError>;
    /// Provider name for diagnostics.
    fn name(&self) -> &'static str;
}

pub type DynProvider = Arc<dyn TextGenerationProvider>;

/// Factory: build a provider according to config and environment variables.
///
/// * If `AI_TEST_MODE=mock`, returns a mock that always answers with a fixed insight.
/// * Else builds the OpenAI-compatible provider; a missing API key yields a
///   disabled provider so generation degrades to "no insight".
pub fn build_provider(cfg: &GeneratorConfig, api_key: Option<String>) -> anyhow::Result<DynProvider> {
    if std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Ok(Arc::new(MockProvider::fixed(
            r#"{"kind":"REFLECTION","title":"A quiet note (mock)","body":"Your recent entries share a steady rhythm (mock).","evidence":null,"keyword":null}"#,
        )));
    }
    match api_key.filter(|k| !k.trim().is_empty()) {
        Some(key) => Ok(Arc::new(OpenAiProvider::new(cfg, key)?)),
        None => {
            tracing::warn!(target: "generator", "no API key configured; provider disabled");
            Ok(Arc::new(DisabledProvider))
        }
    }
}

// ------------------------------------------------------------
// OpenAI-compatible chat completions
// ------------------------------------------------------------

pub struct OpenAiProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl OpenAiProvider {
    pub fn new(cfg: &GeneratorConfig, api_key: String) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("diary-insight-engine/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            api_key,
            model: cfg.model.clone(),
            endpoint: format!("{}/chat/completions", cfg.base_url.trim_end_matches('/')),
        })
    }
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct JsonSchemaFormat<'a> {
    name: &'a str,
    strict: bool,
    schema: &'a serde_json::Value,
}

#[derive(Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    json_schema: JsonSchemaFormat<'a>,
}

#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
    response_format: ResponseFormat<'a>,
}

#[derive(Deserialize)]
struct Resp {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}

#[derive(Deserialize)]
struct ChoiceMsg {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl TextGenerationProvider for OpenAiProvider {
    async fn generate(&self, req: &GenerationRequest) -> Result<String, ProviderError> {
        let body = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: &req.system,
                },
                Msg {
                    role: "user",
                    content: &req.user,
                },
            ],
            temperature: 0.7,
            response_format: ResponseFormat {
                kind: "json_schema",
                json_schema: JsonSchemaFormat {
                    name: req.schema_name,
                    strict: true,
                    schema: &req.schema,
                },
            },
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(map_status(status.as_u16(), &text));
        }

        let parsed: Resp = resp.json().await.map_err(map_transport_error)?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ProviderError::Permanent("empty completion".to_string()))
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

fn map_transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout
    } else if e.is_decode() {
        ProviderError::Permanent(format!("undecodable response: {e}"))
    } else {
        ProviderError::Transient(e.to_string())
    }
}

/// Map an HTTP status onto the failure categories.
pub fn map_status(status: u16, body: &str) -> ProviderError {
    let snippet: String = body.chars().take(200).collect();
    match status {
        429 => ProviderError::RateLimited,
        503 | 529 => ProviderError::Busy,
        408 | 504 => ProviderError::Timeout,
        500..=599 => ProviderError::Transient(format!("HTTP {status}: {snippet}")),
        _ => ProviderError::Permanent(format!("HTTP {status}: {snippet}")),
    }
}

// ------------------------------------------------------------
// Disabled + mock
// ------------------------------------------------------------

/// Always fails permanently; used when no credentials are configured.
pub struct DisabledProvider;

#[async_trait]
impl TextGenerationProvider for DisabledProvider {
    async fn generate(&self, _req: &GenerationRequest) -> Result<String, ProviderError> {
        Err(ProviderError::Permanent("provider disabled".to_string()))
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Scripted provider for tests/local runs. Answers are consumed in order;
/// the last one repeats once the script runs out.
pub struct MockProvider {
    script: Mutex<VecDeque<Result<String, ProviderError>>>,
    last: Mutex<Option<Result<String, ProviderError>>>,
    seen: Mutex<Vec<GenerationRequest>>,
    delay: Option<Duration>,
}

impl MockProvider {
    pub fn scripted(answers: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(answers.into()),
            last: Mutex::new(None),
            seen: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub fn fixed(answer: impl Into<String>) -> Self {
        Self::scripted(vec![Ok(answer.into())])
    }

    /// Sleep before answering (exercises caller timeouts).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.seen.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().map(|v| v.len()).unwrap_or(0)
    }
}

#[async_trait]
impl TextGenerationProvider for MockProvider {
    async fn generate(&self, req: &GenerationRequest) -> Result<String, ProviderError> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(req.clone());
        }
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        let mut last = self
            .last
            .lock()
            .map_err(|_| ProviderError::Permanent("mock poisoned".to_string()))?;
        match next {
            Some(answer) => {
                *last = Some(answer.clone());
                answer
            }
            None => last
                .clone()
                .unwrap_or_else(|| Err(ProviderError::Permanent("mock script empty".to_string()))),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
