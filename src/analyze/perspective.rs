//! Perspective selection: which kind of insight to ask for, and how to
//! correct the kind the generator actually returned.
//!
//! Four lexical scores, each roughly in 0..=4:
//! - repetition: keyword frequency (≥3 → +1, ≥6 → +2) plus the most frequent
//!   token's frequency (≥4 → +1, ≥7 → +2)
//! - change: temporal-contrast markers, capped at 4
//! - highlight: concrete-moment markers, capped at 4
//! - contrast: concessive connectives, capped at 4
//!
//! Learned preference weights are added on top before taking the argmax.

use std::collections::HashMap;

use serde::Serialize;

use super::lexicon::{count_hits, CHANGE, CONCESSIVE, HIGHLIGHT, STOPWORDS};
use crate::model::{keyword_key, InsightKind};
use crate::preference::{PreferenceProfile, STRONG_DISLIKE};

const MARKER_CAP: usize = 4;
const QUALIFY_REPETITION: u32 = 3;
const QUALIFY_MARKERS: u32 = 2;
const REFLECTION_BASE: f64 = 0.5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PerspectiveScores {
    pub repetition: u32,
    pub change: u32,
    pub highlight: u32,
    pub contrast: u32,
}

impl PerspectiveScores {
    pub fn compute<S: AsRef<str>>(logs: &[S], keyword: Option<&str>) -> Self {
        let lowered: Vec<String> = logs.iter().map(|l| l.as_ref().to_lowercase()).collect();
        let joined = lowered.join("\n");

        let mut repetition = 0u32;
        if let Some(k) = keyword.map(keyword_key).filter(|k| !k.is_empty()) {
            let freq = joined.matches(k.as_str()).count();
            repetition += match freq {
                f if f >= 6 => 2,
                f if f >= 3 => 1,
                _ => 0,
            };
        }
        repetition += match top_token_frequency(&joined) {
            f if f >= 7 => 2,
            f if f >= 4 => 1,
            _ => 0,
        };

        Self {
            repetition,
            change: count_hits(&joined, CHANGE).min(MARKER_CAP) as u32,
            highlight: count_hits(&joined, HIGHLIGHT).min(MARKER_CAP) as u32,
            contrast: count_hits(&joined, CONCESSIVE).min(MARKER_CAP) as u32,
        }
    }

    pub fn pattern_qualifies(&self) -> bool {
        self.repetition >= QUALIFY_REPETITION
    }

    pub fn highlight_qualifies(&self) -> bool {
        self.highlight >= QUALIFY_MARKERS
    }

    pub fn warning_qualifies(&self) -> bool {
        self.change >= QUALIFY_MARKERS
    }

    pub fn contrast_qualifies(&self) -> bool {
        self.contrast >= QUALIFY_MARKERS
    }
}

/// Frequency of the most common non-stopword token (2+ chars).
fn top_token_frequency(lowered: &str) -> usize {
    let mut freq: HashMap<&str, usize> = HashMap::new();
    for tok in lowered.split(|c: char| !c.is_alphanumeric()) {
        if tok.chars().count() < 2 || STOPWORDS.contains(&tok) {
            continue;
        }
        *freq.entry(tok).or_default() += 1;
    }
    freq.values().copied().max().unwrap_or(0)
}

/// Kind to suggest to the generator.
pub fn choose_kind_hint<S: AsRef<str>>(
    logs: &[S],
    keyword: Option<&str>,
    profile: Option<&PreferenceProfile>,
) -> InsightKind {
    let s = PerspectiveScores::compute(logs, keyword);
    kind_hint_from_scores(&s, profile)
}

pub fn kind_hint_from_scores(s: &PerspectiveScores, profile: Option<&PreferenceProfile>) -> InsightKind {
    let mut candidates: Vec<(InsightKind, f64)> = Vec::with_capacity(4);
    if s.pattern_qualifies() {
        candidates.push((InsightKind::Pattern, s.repetition as f64));
    }
    if s.highlight_qualifies() {
        candidates.push((InsightKind::Highlight, s.highlight as f64));
    }
    if s.warning_qualifies() {
        candidates.push((InsightKind::Warning, s.change as f64));
    }
    if s.contrast_qualifies() {
        candidates.push((InsightKind::Contrast, s.contrast as f64));
    }
    if candidates.is_empty() {
        candidates.push((InsightKind::Reflection, REFLECTION_BASE));
    }

    let weight = |k: InsightKind| profile.map(|p| p.weight(k)).unwrap_or(0.0);
    let mut best = (candidates[0].0, candidates[0].1 + weight(candidates[0].0));
    for &(kind, base) in candidates.iter().skip(1) {
        let total = base + weight(kind);
        if total > best.1 {
            best = (kind, total);
        }
    }
    best.0
}

/// Post-hoc correction of the kind a generator returned.
pub fn normalize_kind<S: AsRef<str>>(
    model_kind: InsightKind,
    logs: &[S],
    keyword: Option<&str>,
    profile: Option<&PreferenceProfile>,
) -> InsightKind {
    let s = PerspectiveScores::compute(logs, keyword);
    normalize_kind_from_scores(model_kind, &s, profile)
}

/// An unsupported WARNING is downgraded first; the strong-dislike check then
/// applies to the downgraded kind, not the one the model returned.
pub fn normalize_kind_from_scores(
    model_kind: InsightKind,
    s: &PerspectiveScores,
    profile: Option<&PreferenceProfile>,
) -> InsightKind {
    let mut kind = model_kind;

    // An unsupported WARNING is downgraded.
    if kind == InsightKind::Warning && !s.warning_qualifies() {
        kind = if s.pattern_qualifies() {
            InsightKind::Pattern
        } else if s.highlight_qualifies() {
            InsightKind::Highlight
        } else {
            InsightKind::Pattern
        };
    }

    // A strongly disliked kind is replaced.
    let disliked = |k: InsightKind| profile.map(|p| p.weight(k) <= STRONG_DISLIKE).unwrap_or(false);
    if disliked(kind) {
        kind = if s.highlight_qualifies() && !disliked(InsightKind::Highlight) {
            InsightKind::Highlight
        } else if s.pattern_qualifies() && !disliked(InsightKind::Pattern) {
            InsightKind::Pattern
        } else {
            InsightKind::Reflection
        };
    }
    kind
}
