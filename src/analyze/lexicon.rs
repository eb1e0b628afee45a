//! Marker vocabularies for the selection and perspective heuristics.
//!
//! Entries are lowercase. ASCII entries match whole words only ("but" does
//! not fire inside "butter"); Hangul, Kana and Han entries match as
//! substrings, so Korean stems ("피곤") also catch their inflected forms
//! ("피곤했다").

/// Contrast / pivot words: the entry describes a turn.
pub const PIVOT: &[&str] = &[
    "but", "however", "though", "instead", "suddenly", "finally", "turned out",
    "하지만", "그런데", "그래도", "근데", "갑자기", "결국", "막상",
    "でも", "しかし", "けど", "ところが", "结果", "但是", "可是",
];

pub const FATIGUE: &[&str] = &[
    "tired", "exhausted", "drained", "worn out", "burned out", "burnt out", "sleepy", "stressed",
    "피곤", "지쳤", "지친", "힘들", "녹초", "스트레스",
    "疲れ", "しんどい", "累", "疲惫",
];

pub const RELIEF: &[&str] = &[
    "relieved", "relief", "better", "calm", "rested", "refreshed", "relaxed", "lighter",
    "편안", "괜찮", "개운", "안심", "후련", "나아졌",
    "ほっと", "楽になった", "すっきり", "轻松", "放松",
];

/// Temporal-contrast vocabulary behind the WARNING ("something changed") score.
pub const CHANGE: &[&str] = &[
    "lately", "these days", "recently", "used to", "anymore", "no longer", "more and more",
    "keeps getting", "again",
    "요즘", "최근", "예전", "더 이상", "점점", "또 ", "다시",
    "最近", "前は", "だんだん", "また", "最近总是", "越来越",
];

/// Vivid, concrete-moment vocabulary behind the HIGHLIGHT score.
pub const HIGHLIGHT: &[&str] = &[
    "today", "this morning", "tonight", "first time", "moment", "smell", "sound", "sunset",
    "laughed", "surprised",
    "오늘", "처음", "순간", "냄새", "소리", "노을", "웃었", "놀랐",
    "今日", "初めて", "瞬間", "匂い", "今天", "第一次",
];

/// Concessive connectives behind the CONTRAST score.
pub const CONCESSIVE: &[&str] = &[
    "but", "although", "even though", "even so", "still", "yet", "however", "on the other hand",
    "하지만", "그래도", "그런데", "지만", "는데도", "반면",
    "けど", "でも", "のに", "虽然", "不过",
];

/// Tokens too common to signal repetition.
pub const STOPWORDS: &[&str] = &[
    "the", "and", "a", "an", "to", "of", "in", "on", "for", "it", "is", "was", "i", "my", "me",
    "at", "with", "that", "this", "so", "but", "had", "have", "be", "just", "very", "today",
    "나는", "오늘", "그리고", "너무", "정말", "진짜", "좀", "것", "수", "했다",
];

/// Total occurrences of any marker in `lowered`.
pub fn count_hits(lowered: &str, markers: &[&str]) -> usize {
    markers.iter().map(|m| occurrences(lowered, m)).sum()
}

/// Whether any marker appears in `lowered`.
pub fn has_any(lowered: &str, markers: &[&str]) -> bool {
    markers.iter().any(|m| occurrences(lowered, m) > 0)
}

fn occurrences(lowered: &str, marker: &str) -> usize {
    if !marker.is_ascii() {
        return lowered.matches(marker).count();
    }
    lowered
        .match_indices(marker)
        .filter(|&(start, _)| {
            let before = lowered[..start].chars().next_back();
            let after = lowered[start + marker.len()..].chars().next();
            !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stems_match_inflections() {
        assert!(has_any("오늘 너무 피곤했다", FATIGUE));
        assert!(has_any("i feel so relieved now", RELIEF));
        assert_eq!(count_hits("but then, but again", PIVOT), 2);
    }

    #[test]
    fn latin_markers_need_word_boundaries() {
        let text = "i will contribute to the fund and distribute butter at the market";
        assert_eq!(count_hits(text, CONCESSIVE), 0);
        assert!(!has_any(text, PIVOT));
        assert!(!has_any("a stillness over the yeti exhibit", CONCESSIVE));
        assert_eq!(count_hits("the moments passed", HIGHLIGHT), 0);
        assert_eq!(count_hits("still, i stayed. yet (yet!) it was fine", CONCESSIVE), 3);
        assert!(has_any("피곤했다, but fine", PIVOT));
    }
}
