//! Dominant-script language detection and output compliance checks.
//!
//! This is a script classifier, not a language identifier: characters are
//! bucketed into Hangul, Latin, Kana and Han, and the language follows the
//! dominant bucket. Kana presence marks Japanese, whose Han characters are
//! counted with it.

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Below this many classified characters the default language applies.
pub const MIN_CLASSIFIED_CHARS: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "ko", alias = "korean")]
    Korean,
    #[serde(rename = "ja", alias = "japanese")]
    Japanese,
    #[serde(rename = "zh", alias = "chinese")]
    Chinese,
    #[serde(rename = "en", alias = "english")]
    English,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::Korean => "ko",
            Language::Japanese => "ja",
            Language::Chinese => "zh",
            Language::English => "en",
        }
    }

    /// Name used inside prompts.
    pub fn display_name(&self) -> &'static str {
        match self {
            Language::Korean => "Korean",
            Language::Japanese => "Japanese",
            Language::Chinese => "Chinese (Simplified or Traditional)",
            Language::English => "English",
        }
    }

    fn required_script(&self) -> Script {
        match self {
            Language::Korean => Script::Hangul,
            Language::Japanese => Script::Kana,
            Language::Chinese => Script::Han,
            Language::English => Script::Latin,
        }
    }

    fn allows(&self, script: Script) -> bool {
        match self {
            Language::Japanese => matches!(script, Script::Kana | Script::Han),
            other => other.required_script() == script,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Script {
    Hangul,
    Latin,
    Kana,
    Han,
}

pub fn classify(ch: char) -> Option<Script> {
    match ch as u32 {
        0xAC00..=0xD7A3 | 0x1100..=0x11FF | 0x3130..=0x318F | 0xA960..=0xA97F | 0xD7B0..=0xD7FF => {
            Some(Script::Hangul)
        }
        0x3040..=0x309F | 0x30A0..=0x30FF | 0x31F0..=0x31FF | 0xFF66..=0xFF9F => Some(Script::Kana),
        0x4E00..=0x9FFF | 0x3400..=0x4DBF | 0xF900..=0xFAFF => Some(Script::Han),
        _ if ch.is_ascii_alphabetic() => Some(Script::Latin),
        0x00C0..=0x024F if ch.is_alphabetic() => Some(Script::Latin),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScriptCounts {
    pub hangul: usize,
    pub latin: usize,
    pub kana: usize,
    pub han: usize,
}

impl ScriptCounts {
    pub fn of<'a, I: IntoIterator<Item = &'a str>>(texts: I) -> Self {
        let mut c = ScriptCounts::default();
        for t in texts {
            for ch in t.chars() {
                match classify(ch) {
                    Some(Script::Hangul) => c.hangul += 1,
                    Some(Script::Latin) => c.latin += 1,
                    Some(Script::Kana) => c.kana += 1,
                    Some(Script::Han) => c.han += 1,
                    None => {}
                }
            }
        }
        c
    }

    pub fn total(&self) -> usize {
        self.hangul + self.latin + self.kana + self.han
    }

    fn present(&self) -> Vec<Script> {
        let mut v = Vec::with_capacity(4);
        if self.hangul > 0 {
            v.push(Script::Hangul);
        }
        if self.latin > 0 {
            v.push(Script::Latin);
        }
        if self.kana > 0 {
            v.push(Script::Kana);
        }
        if self.han > 0 {
            v.push(Script::Han);
        }
        v
    }
}

/// Language of the dominant script across `texts`; ties resolve
/// Japanese > Korean > Chinese > English.
pub fn detect_language<'a, I: IntoIterator<Item = &'a str>>(texts: I, default: Language) -> Language {
    let c = ScriptCounts::of(texts);
    if c.total() < MIN_CLASSIFIED_CHARS {
        return default;
    }
    let japanese = if c.kana > 0 { c.kana + c.han } else { 0 };
    let ranked = [
        (Language::Japanese, japanese),
        (Language::Korean, c.hangul),
        (Language::Chinese, c.han),
        (Language::English, c.latin),
    ];
    let mut best = ranked[0];
    for cand in ranked.into_iter().skip(1) {
        if cand.1 > best.1 {
            best = cand;
        }
    }
    best.0
}

/// The required script is present and nothing outside the allowed set is.
/// Occurrences of `exempt` (e.g. the user's own keyword) are ignored.
pub fn is_compliant(text: &str, lang: Language, exempt: Option<&str>) -> bool {
    let scrubbed = match exempt.map(str::trim).filter(|k| !k.is_empty()) {
        Some(k) => strip_case_insensitive(text, k),
        None => text.to_string(),
    };
    let counts = ScriptCounts::of([scrubbed.as_str()]);
    let present = counts.present();
    present.contains(&lang.required_script()) && present.iter().all(|s| lang.allows(*s))
}

fn strip_case_insensitive(text: &str, needle: &str) -> String {
    match Regex::new(&format!("(?i){}", regex::escape(needle))) {
        Ok(re) => re.replace_all(text, " ").into_owned(),
        Err(_) => text.replace(needle, " "),
    }
}
