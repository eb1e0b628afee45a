//! Log selection: pick a small, diverse, non-redundant subset of recent logs.
//!
//! Score per candidate:
//!   recency + 1.2 * emotion_shift + 0.3 * length_score
//! where recency falls linearly from 30 (newest) towards 0 (oldest),
//! emotion_shift rewards pivot words (+12) and fatigue/relief vocabulary
//! (+18 together, +6 for either alone), and length_score is chars/10 capped
//! at 200 chars.
//!
//! Selection fills a keyword-hit quota (60% of N) and a non-hit quota, each
//! greedily by score, under two constraints: no near-duplicate of anything
//! already picked, and at most one pick per (local day, time-of-day quadrant).
//! The slot constraint relaxes if it starves a quota; a final backfill tops up
//! to N from whatever is left. Output keeps the input (most-recent-first) order.

use std::collections::HashSet;

use chrono::{FixedOffset, NaiveDate, Timelike};

use super::lexicon::{has_any, FATIGUE, PIVOT, RELIEF};
use crate::model::{keyword_key, Log};

pub const KEYWORD_SHARE: f64 = 0.6;
const RECENCY_SPAN: f64 = 30.0;
const EMOTION_WEIGHT: f64 = 1.2;
const LENGTH_WEIGHT: f64 = 0.3;
const LENGTH_CAP_CHARS: usize = 200;
const PIVOT_BONUS: f64 = 12.0;
const SHIFT_BONUS: f64 = 18.0;
const SINGLE_STATE_BONUS: f64 = 6.0;

const NEAR_DUP_MIN_CHARS: usize = 40;
const NEAR_DUP_PREFIX_RATIO: f64 = 0.85;

/// Time-of-day bucket in the user's zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quadrant {
    Night,
    Am,
    Pm,
    Evening,
}

impl Quadrant {
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            0..=5 => Quadrant::Night,
            6..=11 => Quadrant::Am,
            12..=17 => Quadrant::Pm,
            _ => Quadrant::Evening,
        }
    }
}

#[derive(Debug, Clone)]
struct Candidate<'a> {
    idx: usize,
    log: &'a Log,
    norm: String,
    score: f64,
    slot: (NaiveDate, Quadrant),
}

/// Pick at most `max` logs from `candidates` (most recent first).
pub fn select_logs<'a>(
    candidates: &'a [Log],
    keyword: Option<&str>,
    max: usize,
    offset: FixedOffset,
) -> Vec<&'a Log> {
    let n = candidates.len();
    if n == 0 || max == 0 {
        return Vec::new();
    }

    let cands: Vec<Candidate<'a>> = candidates
        .iter()
        .enumerate()
        .map(|(idx, log)| {
            let local = log.created_at.with_timezone(&offset);
            Candidate {
                idx,
                log,
                norm: normalize_for_dedup(&log.content),
                score: score_candidate(idx, n, &log.content),
                slot: (local.date_naive(), Quadrant::from_hour(local.hour())),
            }
        })
        .collect();

    // 1) Partition (skipped without a keyword)
    let key = keyword.map(keyword_key).filter(|k| !k.is_empty());
    let (hit, non_hit): (Vec<usize>, Vec<usize>) = match &key {
        Some(k) => (0..n).partition(|&i| cands[i].log.content.to_lowercase().contains(k.as_str())),
        None => (Vec::new(), (0..n).collect()),
    };

    // 2) Quotas
    let hit_quota = ((max as f64 * KEYWORD_SHARE).ceil() as usize).min(hit.len());
    let non_hit_quota = (max - hit_quota).min(non_hit.len());

    // 3–4) Greedy per bucket
    let mut picked: Vec<usize> = Vec::with_capacity(max);
    let mut used_slots: HashSet<(NaiveDate, Quadrant)> = HashSet::new();
    pick_from(&cands, &hit, hit_quota, &mut picked, &mut used_slots);
    pick_from(&cands, &non_hit, non_hit_quota, &mut picked, &mut used_slots);

    // 5) Backfill, ignoring bucket origin
    if picked.len() < max {
        let rest: Vec<usize> = (0..n).filter(|i| !picked.contains(i)).collect();
        for i in by_score(&cands, &rest) {
            if picked.len() >= max {
                break;
            }
            if !is_dup_of_any(&cands, i, &picked) {
                picked.push(i);
            }
        }
    }

    // 6) Original order
    picked.sort_unstable();
    picked.into_iter().map(|i| cands[i].log).collect()
}

fn pick_from(
    cands: &[Candidate<'_>],
    bucket: &[usize],
    quota: usize,
    picked: &mut Vec<usize>,
    used_slots: &mut HashSet<(NaiveDate, Quadrant)>,
) {
    if quota == 0 {
        return;
    }
    let order = by_score(cands, bucket);
    let mut taken = 0usize;

    for &i in &order {
        if taken >= quota {
            return;
        }
        if picked.contains(&i) || is_dup_of_any(cands, i, picked) || used_slots.contains(&cands[i].slot) {
            continue;
        }
        used_slots.insert(cands[i].slot);
        picked.push(i);
        taken += 1;
    }

    // Slot constraint starved the quota: relax it, keep the duplicate check.
    for &i in &order {
        if taken >= quota {
            return;
        }
        if picked.contains(&i) || is_dup_of_any(cands, i, picked) {
            continue;
        }
        used_slots.insert(cands[i].slot);
        picked.push(i);
        taken += 1;
    }
}

/// Bucket indices sorted by score desc; ties keep the more recent first.
fn by_score(cands: &[Candidate<'_>], bucket: &[usize]) -> Vec<usize> {
    let mut order = bucket.to_vec();
    order.sort_by(|&a, &b| {
        cands[b]
            .score
            .partial_cmp(&cands[a].score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(cands[a].idx.cmp(&cands[b].idx))
    });
    order
}

fn is_dup_of_any(cands: &[Candidate<'_>], i: usize, picked: &[usize]) -> bool {
    picked.iter().any(|&p| is_near_duplicate(&cands[i].norm, &cands[p].norm))
}

fn score_candidate(idx: usize, n: usize, text: &str) -> f64 {
    let recency = RECENCY_SPAN * (n - idx) as f64 / n as f64;
    recency + EMOTION_WEIGHT * emotion_shift_score(text) + LENGTH_WEIGHT * length_score(text)
}

/// Rewards entries that describe a change of state.
pub fn emotion_shift_score(text: &str) -> f64 {
    let lowered = text.to_lowercase();
    let mut score = 0.0;
    if has_any(&lowered, PIVOT) {
        score += PIVOT_BONUS;
    }
    let fatigue = has_any(&lowered, FATIGUE);
    let relief = has_any(&lowered, RELIEF);
    if fatigue && relief {
        score += SHIFT_BONUS;
    } else if fatigue || relief {
        score += SINGLE_STATE_BONUS;
    }
    score
}

fn length_score(text: &str) -> f64 {
    text.trim().chars().count().min(LENGTH_CAP_CHARS) as f64 / 10.0
}

/// Lowercase, drop punctuation, collapse whitespace.
pub fn normalize_for_dedup(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_space = true;
    for ch in s.chars().flat_map(char::to_lowercase) {
        if ch.is_alphanumeric() {
            out.push(ch);
            last_was_space = false;
        } else if ch.is_whitespace() && !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
    }
    out.trim_end().to_string()
}

/// Exact match after normalization, or (both ≥ 40 chars) a shared prefix
/// covering ≥ 85% of the shorter one.
pub fn is_near_duplicate(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    let la = a.chars().count();
    let lb = b.chars().count();
    if la < NEAR_DUP_MIN_CHARS || lb < NEAR_DUP_MIN_CHARS {
        return false;
    }
    let shared = a.chars().zip(b.chars()).take_while(|(x, y)| x == y).count();
    shared as f64 >= NEAR_DUP_PREFIX_RATIO * la.min(lb) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 10, 20, 0, 0).unwrap()
    }

    /// Logs spaced `step_hours` apart, newest first.
    fn logs(texts: &[&str], step_hours: i64) -> Vec<Log> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Log {
                id: (texts.len() - i) as i64,
                user_id: 1,
                content: t.to_string(),
                created_at: base() - Duration::hours(step_hours * i as i64),
            })
            .collect()
    }

    #[test]
    fn normalization_collapses_case_space_and_punctuation() {
        assert_eq!(normalize_for_dedup("  Had   COFFEE, today!! "), "had coffee today");
        assert!(is_near_duplicate(
            &normalize_for_dedup("Had coffee today."),
            &normalize_for_dedup("had  coffee today")
        ));
    }

    #[test]
    fn long_shared_prefix_counts_as_duplicate() {
        let a = "i went to the same cafe near the office and ordered the usual latte again";
        let b = "i went to the same cafe near the office and ordered the usual latte again today";
        assert!(is_near_duplicate(a, b));
        let short_a = "coffee at home";
        let short_b = "coffee at home now";
        assert!(!is_near_duplicate(short_a, short_b));
    }

    #[test]
    fn identical_logs_are_picked_once() {
        let pool = logs(
            &["Had coffee today, feeling great", "had coffee today feeling great!", "Long walk by the river"],
            6,
        );
        let picked = select_logs(&pool, Some("coffee"), 3, utc());
        let coffee = picked.iter().filter(|l| l.content.to_lowercase().contains("coffee")).count();
        assert_eq!(coffee, 1);
        assert_eq!(picked.len(), 2);
    }

    #[test]
    fn output_keeps_recency_order_and_respects_max() {
        let pool = logs(
            &[
                "coffee with mina, but then I felt tired",
                "quiet evening reading",
                "coffee again this morning",
                "rainy commute, exhausted but relieved after the call",
                "coffee tasting at the new roastery downtown",
                "cleaned the apartment",
            ],
            7,
        );
        let picked = select_logs(&pool, Some("coffee"), 4, utc());
        assert_eq!(picked.len(), 4);
        let positions: Vec<usize> = picked
            .iter()
            .map(|p| pool.iter().position(|l| l.id == p.id).unwrap())
            .collect();
        let mut sorted = positions.clone();
        sorted.sort_unstable();
        assert_eq!(positions, sorted);
    }

    #[test]
    fn keyword_quota_is_sixty_percent() {
        let pool = logs(
            &[
                "coffee one is here", "walk one is here", "coffee two is here", "walk two is here",
                "coffee three is here", "walk three is here", "coffee four is here", "walk four is here",
            ],
            7,
        );
        let picked = select_logs(&pool, Some("coffee"), 5, utc());
        let hits = picked.iter().filter(|l| l.content.contains("coffee")).count();
        assert_eq!(picked.len(), 5);
        assert_eq!(hits, 3);
    }

    #[test]
    fn slot_constraint_spreads_then_relaxes() {
        // All four logs share one day and quadrant: the first pass takes one,
        // the relaxed pass fills the rest.
        let pool: Vec<Log> = (0..4)
            .map(|i| Log {
                id: 10 - i,
                user_id: 1,
                content: format!("distinct entry number {i} about the garden"),
                created_at: base() - Duration::minutes(10 * i),
            })
            .collect();
        let picked = select_logs(&pool, None, 3, utc());
        assert_eq!(picked.len(), 3);
    }

    #[test]
    fn emotion_shift_prefers_state_changes() {
        assert_eq!(emotion_shift_score("flat day"), 0.0);
        assert_eq!(emotion_shift_score("so tired"), 6.0);
        assert_eq!(emotion_shift_score("tired but relieved"), 12.0 + 18.0);
    }

    #[test]
    fn embedded_marker_words_earn_no_shift_bonus() {
        assert_eq!(emotion_shift_score("I will contribute to the fund and distribute butter"), 0.0);
        assert_eq!(emotion_shift_score("the calmness of a recalmed sea"), 0.0);
    }

    #[test]
    fn quadrants_follow_local_hours() {
        assert_eq!(Quadrant::from_hour(0), Quadrant::Night);
        assert_eq!(Quadrant::from_hour(6), Quadrant::Am);
        assert_eq!(Quadrant::from_hour(17), Quadrant::Pm);
        assert_eq!(Quadrant::from_hour(23), Quadrant::Evening);
    }
}
