// src/config/insights.rs
use anyhow::Context;
use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path};

use crate::analyze::language::Language;

pub const DEFAULT_INSIGHTS_CONFIG_PATH: &str = "config/insights.toml";
pub const ENV_INSIGHTS_CONFIG_PATH: &str = "INSIGHTS_CONFIG_PATH";

/// Root configuration for the insight pipeline. Every section is optional in
/// the TOML file; missing values fall back to the defaults below.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightConfig {
    pub trigger: TriggerConfig,
    pub context: ContextConfig,
    pub generator: GeneratorConfig,
    pub signal: SignalConfig,
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    pub min_chars: usize,
    pub require_keyword_match: bool,
    pub cooldown_secs: i64,
    pub daily_limit: u32,
    /// Zone defining "today" and time-of-day quadrants, in minutes east of UTC.
    pub utc_offset_minutes: i32,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            min_chars: 10,
            require_keyword_match: true,
            cooldown_secs: 3600,
            daily_limit: 3,
            utc_offset_minutes: 0,
        }
    }
}

impl TriggerConfig {
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .unwrap_or_else(|| Utc.fix())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub recent_logs: usize,
    pub recent_insights: usize,
    pub recent_insight_hours: i64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            recent_logs: 30,
            recent_insights: 5,
            recent_insight_hours: 72,
        }
    }
}

/// Which generator strategy to build at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorMode {
    Heuristic,
    Provider,
}

/// What to do when the language-compliance retry also fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageFallback {
    /// Keep the first (non-compliant) result.
    Lenient,
    /// Discard and produce nothing.
    Strict,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub mode: GeneratorMode,
    pub max_selected_logs: usize,
    pub min_merged_chars: usize,
    pub default_language: Language,
    pub timeout_secs: u64,
    pub language_fallback: LanguageFallback,
    pub model: String,
    /// Name of the env var holding the API key.
    pub api_key_env: String,
    pub base_url: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            mode: GeneratorMode::Heuristic,
            max_selected_logs: 8,
            min_merged_chars: 20,
            default_language: Language::English,
            timeout_secs: 20,
            language_fallback: LanguageFallback::Lenient,
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    pub regen_threshold: u32,
    pub regen_log_window: usize,
    pub regen_max_logs: usize,
    pub liked_exemplars: usize,
    /// Keep counting candy for users whose insight generation is switched off.
    pub count_when_gate_disabled: bool,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            regen_threshold: 10,
            regen_log_window: 100,
            regen_max_logs: 12,
            liked_exemplars: 3,
            count_when_gate_disabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub sweep_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 3600,
        }
    }
}

impl InsightConfig {
    /// Load from `INSIGHTS_CONFIG_PATH` (or the default path). A missing file
    /// yields defaults; a malformed file is an error.
    pub fn load() -> anyhow::Result<Self> {
        let path = env::var(ENV_INSIGHTS_CONFIG_PATH)
            .unwrap_or_else(|_| DEFAULT_INSIGHTS_CONFIG_PATH.to_string());
        let path = Path::new(&path);
        if !path.exists() {
            tracing::info!(path = %path.display(), "insight config not found, using defaults");
            return Ok(Self::default().clamped());
        }
        Self::load_from_file(path)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("read insight config {}", path.display()))?;
        Self::from_toml_str(&data).with_context(|| format!("parse {}", path.display()))
    }

    pub fn from_toml_str(data: &str) -> anyhow::Result<Self> {
        let cfg: InsightConfig = toml::from_str(data)?;
        Ok(cfg.clamped())
    }

    /// Force every numeric knob into its supported range.
    pub fn clamped(mut self) -> Self {
        let t = &mut self.trigger;
        t.min_chars = t.min_chars.min(2000);
        t.cooldown_secs = t.cooldown_secs.max(0);
        t.utc_offset_minutes = t.utc_offset_minutes.clamp(-12 * 60, 14 * 60);

        let c = &mut self.context;
        c.recent_logs = c.recent_logs.clamp(5, 200);
        c.recent_insights = c.recent_insights.clamp(1, 10);
        c.recent_insight_hours = c.recent_insight_hours.clamp(6, 7 * 24);

        let g = &mut self.generator;
        g.max_selected_logs = g.max_selected_logs.clamp(1, 30);
        g.timeout_secs = g.timeout_secs.clamp(1, 120);

        let s = &mut self.signal;
        s.regen_threshold = s.regen_threshold.max(1);
        s.regen_log_window = s.regen_log_window.clamp(10, 500);
        s.regen_max_logs = s.regen_max_logs.clamp(1, 50);
        s.liked_exemplars = s.liked_exemplars.min(10);

        self.scheduler.sweep_interval_secs = self.scheduler.sweep_interval_secs.max(30);
        self
    }

    /// Resolve the provider API key from the configured env var.
    pub fn api_key(&self) -> anyhow::Result<String> {
        env::var(&self.generator.api_key_env)
            .map_err(|_| anyhow::anyhow!("Missing {} env var", self.generator.api_key_env))
    }
}
