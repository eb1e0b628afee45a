// src/analyze/mod.rs
//! Text analysis used before and after generation: PII scrubbing, log
//! selection, perspective scoring and script-based language checks.

pub mod language;
pub mod lexicon;
pub mod perspective;
pub mod sanitize;
pub mod selector;

pub use language::{detect_language, is_compliant, Language};
pub use perspective::{choose_kind_hint, normalize_kind, PerspectiveScores};
pub use sanitize::sanitize_log_text;
pub use selector::{is_near_duplicate, normalize_for_dedup, select_logs};
