//! Entities flowing through the insight pipeline.
//!
//! Logs and insights are immutable once created. Feedback is upserted per
//! `(user_id, insight_id)`. Everything here is plain data with serde derives so
//! adapters can persist or ship it without extra mapping.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type UserId = i64;
pub type LogId = i64;
pub type InsightId = i64;

/// A diary entry. Content is plaintext by the time it reaches this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    pub id: LogId,
    pub user_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Category label of a generated insight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InsightKind {
    Tendency,
    Pattern,
    Highlight,
    Warning,
    Reflection,
    Contrast,
    Question,
}

impl InsightKind {
    pub const ALL: [InsightKind; 7] = [
        InsightKind::Tendency,
        InsightKind::Pattern,
        InsightKind::Highlight,
        InsightKind::Warning,
        InsightKind::Reflection,
        InsightKind::Contrast,
        InsightKind::Question,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InsightKind::Tendency => "TENDENCY",
            InsightKind::Pattern => "PATTERN",
            InsightKind::Highlight => "HIGHLIGHT",
            InsightKind::Warning => "WARNING",
            InsightKind::Reflection => "REFLECTION",
            InsightKind::Contrast => "CONTRAST",
            InsightKind::Question => "QUESTION",
        }
    }
}

impl fmt::Display for InsightKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InsightKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let up = s.trim().to_ascii_uppercase();
        InsightKind::ALL
            .into_iter()
            .find(|k| k.as_str() == up)
            .ok_or_else(|| anyhow::anyhow!("unknown insight kind: {s}"))
    }
}

/// A persisted insight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insight {
    pub id: InsightId,
    pub user_id: UserId,
    pub source_log_id: LogId,
    pub kind: InsightKind,
    pub title: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Insight fields before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInsight {
    pub user_id: UserId,
    pub source_log_id: LogId,
    pub kind: InsightKind,
    pub title: String,
    pub body: String,
    pub evidence: Option<String>,
    pub keyword: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Liked prior insight used as a few-shot exemplar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikedInsight {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub evidence: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Vote {
    Like,
    Dislike,
}

/// Why a user disliked an insight. Only `TooSharp` changes adaptation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum FeedbackReason {
    TooSharp,
    Other(String),
}

impl FromStr for FeedbackReason {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_lowercase().replace(['_', '-'], " ");
        if norm == "too sharp" {
            Ok(FeedbackReason::TooSharp)
        } else {
            Ok(FeedbackReason::Other(s.trim().to_string()))
        }
    }
}

impl TryFrom<String> for FeedbackReason {
    type Error = std::convert::Infallible;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FeedbackReason> for String {
    fn from(r: FeedbackReason) -> Self {
        match r {
            FeedbackReason::TooSharp => "TOO_SHARP".to_string(),
            FeedbackReason::Other(s) => s,
        }
    }
}

/// One row per `(user_id, insight_id)`; later submissions overwrite earlier ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsightFeedback {
    pub user_id: UserId,
    pub insight_id: InsightId,
    pub vote: Vote,
    #[serde(default)]
    pub reason: Option<FeedbackReason>,
    /// 1..=5 when present.
    #[serde(default)]
    pub score: Option<u8>,
    #[serde(default)]
    pub comment: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Exact input bundle handed to the generator. Not persisted.
#[derive(Debug, Clone)]
pub struct InsightContext {
    pub user_id: UserId,
    pub matched_keyword: Option<String>,
    pub trigger_log: Log,
    pub source_log_id: LogId,
    /// Most recent first, trigger log included exactly once.
    pub logs: Vec<Log>,
    /// Most recent first, for duplicate avoidance.
    pub recent_insights: Vec<Insight>,
}

/// Published after an insight row is committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsightCreatedEvent {
    pub user_id: UserId,
    pub insight_id: InsightId,
    pub title: String,
}

/// Canonical key for an interest keyword: trimmed and lowercased.
pub fn keyword_key(keyword: &str) -> String {
    keyword.trim().to_lowercase()
}

/// Case-insensitive substring match used by the trigger gate, the signal
/// updater and the regeneration sweep.
pub fn contains_keyword(content: &str, keyword: &str) -> bool {
    let key = keyword_key(keyword);
    !key.is_empty() && content.to_lowercase().contains(&key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parses_case_insensitively() {
        assert_eq!("pattern".parse::<InsightKind>().unwrap(), InsightKind::Pattern);
        assert_eq!(" Warning ".parse::<InsightKind>().unwrap(), InsightKind::Warning);
        assert!("insightful".parse::<InsightKind>().is_err());
    }

    #[test]
    fn too_sharp_reason_accepts_both_spellings() {
        assert_eq!("too sharp".parse::<FeedbackReason>().unwrap(), FeedbackReason::TooSharp);
        assert_eq!("TOO_SHARP".parse::<FeedbackReason>().unwrap(), FeedbackReason::TooSharp);
        assert_eq!(
            "boring".parse::<FeedbackReason>().unwrap(),
            FeedbackReason::Other("boring".into())
        );
    }

    #[test]
    fn keyword_match_ignores_case_and_padding() {
        assert!(contains_keyword("Had COFFEE today", " coffee "));
        assert!(!contains_keyword("Had tea today", "coffee"));
        assert!(!contains_keyword("anything", "   "));
    }
}
