//! # Trigger Policy
//! Decides whether a freshly created log should produce an insight.
//!
//! Checks run in a fixed order and the first failing one wins:
//! gate → length → keyword → cooldown → daily cap. Rejections are values, not
//! errors. Nothing here mutates state; the orchestrator marks the run only
//! after a successful generation.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::TriggerConfig;
use crate::cooldown::within_cooldown;
use crate::model::{keyword_key, Log, UserId};
use crate::store::{CooldownStore, InterestGate};

/// Why a log did not trigger generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    GateDisabled,
    TooShort,
    NoKeywordMatch,
    Cooldown,
    DailyLimit,
}

impl SkipReason {
    pub fn code(&self) -> &'static str {
        match self {
            SkipReason::GateDisabled => "gate_disabled",
            SkipReason::TooShort => "too_short",
            SkipReason::NoKeywordMatch => "no_keyword_match",
            SkipReason::Cooldown => "cooldown",
            SkipReason::DailyLimit => "daily_limit",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerDecision {
    pub should_run: bool,
    pub reason: Option<SkipReason>,
    pub matched_keyword: Option<String>,
}

impl TriggerDecision {
    pub fn run(matched_keyword: Option<String>) -> Self {
        Self {
            should_run: true,
            reason: None,
            matched_keyword,
        }
    }

    pub fn skip(reason: SkipReason) -> Self {
        Self {
            should_run: false,
            reason: Some(reason),
            matched_keyword: None,
        }
    }
}

/// Facts the decision is computed from, gathered from the collaborators.
#[derive(Debug, Clone)]
pub struct TriggerFacts {
    pub enabled: bool,
    pub keywords: Vec<String>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub runs_today: u32,
}

/// Same decision as `TriggerPolicy::decide`, purely functional for testing.
pub fn evaluate(cfg: &TriggerConfig, facts: &TriggerFacts, content: &str, now: DateTime<Utc>) -> TriggerDecision {
    // 1) Gate: feature on AND at least one interest keyword
    let has_keywords = facts.keywords.iter().any(|k| !keyword_key(k).is_empty());
    if !facts.enabled || !has_keywords {
        return TriggerDecision::skip(SkipReason::GateDisabled);
    }

    // 2) Minimum length on trimmed content (chars, not bytes)
    if content.trim().chars().count() < cfg.min_chars {
        return TriggerDecision::skip(SkipReason::TooShort);
    }

    // 3) Keyword match, first configured keyword wins
    let lowered = content.to_lowercase();
    let matched = facts
        .keywords
        .iter()
        .find(|k| {
            let key = keyword_key(k);
            !key.is_empty() && lowered.contains(&key)
        })
        .map(|k| k.trim().to_string());
    if cfg.require_keyword_match && matched.is_none() {
        return TriggerDecision::skip(SkipReason::NoKeywordMatch);
    }

    // 4) Cooldown
    if within_cooldown(facts.last_run_at, cfg.cooldown_secs, now) {
        return TriggerDecision::skip(SkipReason::Cooldown);
    }

    // 5) Daily cap
    if facts.runs_today >= cfg.daily_limit {
        return TriggerDecision::skip(SkipReason::DailyLimit);
    }

    TriggerDecision::run(matched)
}

/// Reads gate and cooldown state from the collaborators and evaluates.
pub struct TriggerPolicy<'a> {
    cfg: &'a TriggerConfig,
    gate: &'a dyn InterestGate,
    cooldowns: &'a dyn CooldownStore,
}

impl<'a> TriggerPolicy<'a> {
    pub fn new(cfg: &'a TriggerConfig, gate: &'a dyn InterestGate, cooldowns: &'a dyn CooldownStore) -> Self {
        Self { cfg, gate, cooldowns }
    }

    pub async fn decide(&self, user_id: UserId, log: &Log, now: DateTime<Utc>) -> anyhow::Result<TriggerDecision> {
        let enabled = self.gate.is_enabled_for_user(user_id).await?;
        let keywords = if enabled {
            self.gate.keywords_for_user(user_id).await?
        } else {
            Vec::new()
        };
        // Skip the cooldown reads when an earlier check already fails.
        let facts = TriggerFacts {
            enabled,
            keywords,
            last_run_at: None,
            runs_today: 0,
        };
        let early = evaluate(self.cfg, &facts, &log.content, now);
        if !early.should_run {
            return Ok(early);
        }

        let facts = TriggerFacts {
            last_run_at: self.cooldowns.last_run_at(user_id).await?,
            runs_today: self.cooldowns.count_today(user_id, now).await?,
            ..facts
        };
        Ok(evaluate(self.cfg, &facts, &log.content, now))
    }
}
