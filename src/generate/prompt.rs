//! Prompt text and response schemas for the provider strategy.

use serde_json::{json, Value};

use crate::analyze::Language;
use crate::model::{Insight, InsightKind, LikedInsight};

pub const INSIGHT_SCHEMA_NAME: &str = "diary_insight";
pub const KEYWORD_SCHEMA_NAME: &str = "keyword_insight";

const RECENT_TITLE_CHARS: usize = 40;
const RECENT_BODY_CHARS: usize = 80;
const LOG_LINE_CHARS: usize = 400;

/// `{kind, title, body, evidence|null, keyword|null}`; strict mode requires
/// every property to be listed.
pub fn insight_schema() -> Value {
    let kinds: Vec<&str> = InsightKind::ALL.iter().map(|k| k.as_str()).collect();
    json!({
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "kind": { "type": "string", "enum": kinds },
            "title": { "type": "string" },
            "body": { "type": "string" },
            "evidence": { "type": ["string", "null"] },
            "keyword": { "type": ["string", "null"] }
        },
        "required": ["kind", "title", "body", "evidence", "keyword"]
    })
}

pub fn keyword_schema() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "properties": { "text": { "type": "string" } },
        "required": ["text"]
    })
}

fn language_directive(lang: Language) -> String {
    match lang {
        Language::Japanese => "Write every field in Japanese only (kana and kanji). Do not mix in any other language or script.".to_string(),
        other => format!(
            "Write every field in {} only. Do not mix in any other language or script.",
            other.display_name()
        ),
    }
}

fn tone_directive(gentle: bool) -> &'static str {
    if gentle {
        "The reader has found recent observations too blunt. Be soft and non-judgmental: describe, never warn or criticize."
    } else {
        "Be warm and specific. Observe; do not diagnose or give advice."
    }
}

pub fn system_prompt(lang: Language, gentle: bool) -> String {
    format!(
        "You read someone's private diary entries and write one short insight about them.\n\
         {}\n\
         {}\n\
         Title: at most 40 characters. Body: 1-3 sentences. Evidence: a short quote or paraphrase from the entries, or null.\n\
         Return only the JSON object described by the schema.",
        language_directive(lang),
        tone_directive(gentle)
    )
}

/// Second attempt after a language violation.
pub fn escalated_system_prompt(lang: Language, gentle: bool) -> String {
    format!(
        "{}\n\
         IMPORTANT: your previous answer mixed languages. {} \
         Only the user's keyword may stay as written. \
         If you cannot comply, return empty strings for title and body.",
        system_prompt(lang, gentle),
        language_directive(lang)
    )
}

/// Compact one-line-per-insight rendering of recent insights.
pub fn render_recent_insights(recent: &[Insight]) -> String {
    if recent.is_empty() {
        return "(none)".to_string();
    }
    recent
        .iter()
        .map(|i| {
            format!(
                "- [{}] {} | {} | {}",
                i.created_at.format("%Y-%m-%d %H:%M"),
                i.kind,
                truncate_chars(&i.title, RECENT_TITLE_CHARS),
                truncate_chars(&i.body, RECENT_BODY_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn user_prompt(
    logs: &[&str],
    kind_hint: InsightKind,
    keyword: Option<&str>,
    recent: &[Insight],
) -> String {
    let mut out = String::new();
    out.push_str("Diary entries (most recent first):\n");
    for (i, text) in logs.iter().enumerate() {
        out.push_str(&format!("{}. {}\n", i + 1, truncate_chars(text, LOG_LINE_CHARS)));
    }
    out.push_str(&format!("\nSuggested kind: {kind_hint}\n"));
    match keyword {
        Some(k) => out.push_str(&format!("Keyword: {k}\n")),
        None => out.push_str("Keyword: (none)\n"),
    }
    out.push_str("\nRecent insights already shown (do not repeat them):\n");
    out.push_str(&render_recent_insights(recent));
    out
}

pub fn keyword_system_prompt(lang: Language) -> String {
    format!(
        "You maintain a running one-paragraph note about one topic in someone's diary.\n\
         {}\n\
         Keep continuity with the previous note when there is one, and fold in the new entries. \
         At most 3 sentences. Return only the JSON object described by the schema.",
        language_directive(lang)
    )
}

pub fn keyword_user_prompt(
    keyword: &str,
    previous: Option<&str>,
    logs: &[String],
    liked: &[LikedInsight],
) -> String {
    let mut out = format!("Topic: {keyword}\n\nPrevious note: {}\n", previous.unwrap_or("(none)"));
    out.push_str("\nNew entries mentioning the topic (most recent first):\n");
    for (i, text) in logs.iter().enumerate() {
        out.push_str(&format!("{}. {}\n", i + 1, truncate_chars(text, LOG_LINE_CHARS)));
    }
    if !liked.is_empty() {
        out.push_str("\nInsights the user liked on this topic (match their style):\n");
        for l in liked {
            out.push_str(&format!(
                "- {} | {}\n",
                truncate_chars(&l.title, RECENT_TITLE_CHARS),
                truncate_chars(&l.body, RECENT_BODY_CHARS)
            ));
        }
    }
    out
}

/// Cut at `max` chars, appending an ellipsis when something was dropped.
pub fn truncate_chars(s: &str, max: usize) -> String {
    let trimmed = s.trim();
    if trimmed.chars().count() <= max {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(max).collect();
    out.push('…');
    out
}

/// Some models wrap JSON in a fenced block despite the schema.
pub fn strip_code_fence(raw: &str) -> &str {
    let t = raw.trim();
    let Some(inner) = t.strip_prefix("```") else {
        return t;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}
