//! Insight generation.
//!
//! `InsightGenerator` turns an `InsightContext` into one `GeneratedInsight`:
//! sanitize → select → detect language → pick a kind hint → write (heuristic
//! templates or a provider call with language enforcement) → normalize kind.
//! Every failure is a `GenerationError`; the pipeline turns all of them into
//! "no insight this time".

pub mod heuristic;
pub mod prompt;
pub mod provider;

use std::sync::Arc;
use std::time::Duration;

use chrono::FixedOffset;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::analyze::{
    choose_kind_hint, detect_language, is_compliant, normalize_kind, sanitize_log_text, select_logs,
    Language,
};
use crate::config::{GeneratorConfig, GeneratorMode, InsightConfig, LanguageFallback};
use crate::model::{InsightContext, InsightKind, LikedInsight, Log};
use crate::preference::PreferenceProfile;

pub use heuristic::{HeuristicWriter, RandomSource, SeededRandom, ThreadRandom};
pub use provider::{
    build_provider, DisabledProvider, DynProvider, GenerationRequest, MockProvider, OpenAiProvider,
    ProviderError, TextGenerationProvider,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("selected logs too short ({chars} < {min} chars)")]
    InsufficientMaterial { chars: usize, min: usize },
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("unparseable generator output: {0}")]
    Parse(String),
    #[error("generator returned a blank title or body")]
    BlankOutput,
    #[error("output is not in {0}")]
    LanguageRejected(Language),
}

impl GenerationError {
    /// Label for `insight_generation_failed_total{cause}`.
    pub fn cause(&self) -> &'static str {
        match self {
            GenerationError::InsufficientMaterial { .. } => "insufficient_material",
            GenerationError::Provider(e) => e.category(),
            GenerationError::Parse(_) => "parse",
            GenerationError::BlankOutput => "blank_output",
            GenerationError::LanguageRejected(_) => "language",
        }
    }
}

/// Generator output before persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedInsight {
    pub kind: InsightKind,
    pub title: String,
    pub body: String,
    pub evidence: Option<String>,
    pub keyword: Option<String>,
    pub language: Language,
}

impl GeneratedInsight {
    fn merged_text(&self) -> String {
        let mut out = format!("{}\n{}", self.title, self.body);
        for extra in [&self.evidence, &self.keyword].into_iter().flatten() {
            out.push('\n');
            out.push_str(extra);
        }
        out
    }
}

/// Wire shape of the provider's structured answer.
#[derive(Debug, Deserialize)]
struct RawInsight {
    kind: String,
    title: String,
    body: String,
    #[serde(default)]
    evidence: Option<String>,
    #[serde(default)]
    keyword: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawKeywordNote {
    text: String,
}

/// Input for regenerating a keyword's running note.
#[derive(Debug, Clone)]
pub struct KeywordNoteRequest<'a> {
    pub keyword: &'a str,
    pub previous: Option<&'a str>,
    /// Most recent first.
    pub logs: Vec<String>,
    pub liked: &'a [LikedInsight],
}

/// How text gets written; fixed at construction.
#[derive(Clone)]
pub enum GeneratorStrategy {
    Heuristic(HeuristicWriter),
    Provider(DynProvider),
}

pub struct InsightGenerator {
    cfg: GeneratorConfig,
    offset: FixedOffset,
    strategy: GeneratorStrategy,
}

impl InsightGenerator {
    pub fn new(cfg: GeneratorConfig, offset: FixedOffset, strategy: GeneratorStrategy) -> Self {
        Self { cfg, offset, strategy }
    }

    /// Build the strategy named by `generator.mode`.
    pub fn from_config(cfg: &InsightConfig, rng: Arc<dyn RandomSource>) -> anyhow::Result<Self> {
        let strategy = match cfg.generator.mode {
            GeneratorMode::Heuristic => GeneratorStrategy::Heuristic(HeuristicWriter::new(rng)),
            GeneratorMode::Provider => {
                GeneratorStrategy::Provider(build_provider(&cfg.generator, cfg.api_key().ok())?)
            }
        };
        Ok(Self::new(cfg.generator.clone(), cfg.trigger.offset(), strategy))
    }

    pub fn strategy_name(&self) -> &'static str {
        match &self.strategy {
            GeneratorStrategy::Heuristic(_) => "heuristic",
            GeneratorStrategy::Provider(p) => p.name(),
        }
    }

    pub async fn generate(
        &self,
        ctx: &InsightContext,
        profile: Option<&PreferenceProfile>,
    ) -> Result<GeneratedInsight, GenerationError> {
        let keyword = ctx.matched_keyword.as_deref();

        let sanitized: Vec<Log> = ctx
            .logs
            .iter()
            .map(|l| Log {
                content: sanitize_log_text(&l.content),
                ..l.clone()
            })
            .collect();
        let selected = select_logs(&sanitized, keyword, self.cfg.max_selected_logs, self.offset);
        let texts: Vec<&str> = selected.iter().map(|l| l.content.as_str()).collect();

        let chars: usize = texts.iter().map(|t| t.chars().count()).sum();
        if chars < self.cfg.min_merged_chars {
            return Err(GenerationError::InsufficientMaterial {
                chars,
                min: self.cfg.min_merged_chars,
            });
        }

        let lang = detect_language(texts.iter().copied(), self.cfg.default_language);
        let hint = choose_kind_hint(&texts, keyword, profile);
        let gentle = profile.is_some_and(|p| p.wants_gentle_tone());
        debug!(
            target: "generator",
            user_id = ctx.user_id,
            selected = texts.len(),
            lang = %lang,
            hint = %hint,
            gentle,
            "generating insight"
        );

        let mut out = match &self.strategy {
            GeneratorStrategy::Heuristic(writer) => writer.write(lang, hint, keyword, &texts, gentle),
            GeneratorStrategy::Provider(provider) => {
                let user = prompt::user_prompt(&texts, hint, keyword, &ctx.recent_insights);
                self.generate_enforced(provider.as_ref(), lang, hint, gentle, user, keyword)
                    .await?
            }
        };

        out.kind = normalize_kind(out.kind, &texts, keyword, profile);
        if out.keyword.is_none() {
            out.keyword = ctx.matched_keyword.clone();
        }
        Ok(out)
    }

    /// One call, one escalated retry on a language violation, then the
    /// configured fallback.
    async fn generate_enforced(
        &self,
        provider: &dyn TextGenerationProvider,
        lang: Language,
        hint: InsightKind,
        gentle: bool,
        user: String,
        keyword: Option<&str>,
    ) -> Result<GeneratedInsight, GenerationError> {
        let first_req = GenerationRequest {
            system: prompt::system_prompt(lang, gentle),
            user,
            schema_name: prompt::INSIGHT_SCHEMA_NAME,
            schema: prompt::insight_schema(),
        };
        let first = self.call_insight(provider, &first_req, lang, hint).await?;
        if self.compliant(&first, lang, keyword) {
            return Ok(first);
        }

        warn!(target: "generator", lang = %lang, "output failed language check; retrying once");
        let retry_req = GenerationRequest {
            system: prompt::escalated_system_prompt(lang, gentle),
            ..first_req
        };
        match self.call_insight(provider, &retry_req, lang, hint).await {
            Ok(second) if self.compliant(&second, lang, keyword) => return Ok(second),
            Ok(_) => {}
            Err(e) => warn!(target: "generator", cause = e.cause(), "language retry failed"),
        }

        match self.cfg.language_fallback {
            LanguageFallback::Lenient => {
                warn!(target: "generator", lang = %lang, "keeping first non-compliant output");
                Ok(first)
            }
            LanguageFallback::Strict => Err(GenerationError::LanguageRejected(lang)),
        }
    }

    fn compliant(&self, out: &GeneratedInsight, lang: Language, keyword: Option<&str>) -> bool {
        let exempt = keyword.or(out.keyword.as_deref());
        is_compliant(&out.merged_text(), lang, exempt)
    }

    async fn call(
        &self,
        provider: &dyn TextGenerationProvider,
        req: &GenerationRequest,
    ) -> Result<String, GenerationError> {
        let limit = Duration::from_secs(self.cfg.timeout_secs);
        match tokio::time::timeout(limit, provider.generate(req)).await {
            Ok(res) => res.map_err(GenerationError::from),
            Err(_) => Err(GenerationError::Provider(ProviderError::Timeout)),
        }
    }

    async fn call_insight(
        &self,
        provider: &dyn TextGenerationProvider,
        req: &GenerationRequest,
        lang: Language,
        hint: InsightKind,
    ) -> Result<GeneratedInsight, GenerationError> {
        let raw = self.call(provider, req).await?;
        parse_insight(&raw, lang, hint)
    }

    /// Fresh running note for a keyword signal (used by the sweep).
    pub async fn keyword_note(&self, req: &KeywordNoteRequest<'_>) -> Result<String, GenerationError> {
        let logs: Vec<String> = req.logs.iter().map(|l| sanitize_log_text(l)).collect();
        let lang = detect_language(
            logs.iter().map(String::as_str).chain(req.previous),
            self.cfg.default_language,
        );
        match &self.strategy {
            GeneratorStrategy::Heuristic(writer) => {
                Ok(writer.keyword_note(lang, req.keyword, logs.len(), req.previous))
            }
            GeneratorStrategy::Provider(provider) => {
                let gen_req = GenerationRequest {
                    system: prompt::keyword_system_prompt(lang),
                    user: prompt::keyword_user_prompt(req.keyword, req.previous, &logs, req.liked),
                    schema_name: prompt::KEYWORD_SCHEMA_NAME,
                    schema: prompt::keyword_schema(),
                };
                let raw = self.call(provider.as_ref(), &gen_req).await?;
                let note: RawKeywordNote = serde_json::from_str(prompt::strip_code_fence(&raw))
                    .map_err(|e| GenerationError::Parse(e.to_string()))?;
                let text = note.text.trim();
                if text.is_empty() {
                    return Err(GenerationError::BlankOutput);
                }
                Ok(text.to_string())
            }
        }
    }
}

/// Parse the provider's JSON. An unknown `kind` falls back to the hint.
fn parse_insight(raw: &str, lang: Language, hint: InsightKind) -> Result<GeneratedInsight, GenerationError> {
    let parsed: RawInsight = serde_json::from_str(prompt::strip_code_fence(raw))
        .map_err(|e| GenerationError::Parse(e.to_string()))?;
    let title = parsed.title.trim();
    let body = parsed.body.trim();
    if title.is_empty() || body.is_empty() {
        return Err(GenerationError::BlankOutput);
    }
    let kind = parsed.kind.parse::<InsightKind>().unwrap_or_else(|_| {
        debug!(target: "generator", kind = %parsed.kind, "unknown kind from provider; using hint");
        hint
    });
    let clean = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    Ok(GeneratedInsight {
        kind,
        title: title.to_string(),
        body: body.to_string(),
        evidence: clean(parsed.evidence),
        keyword: clean(parsed.keyword),
        language: lang,
    })
}
