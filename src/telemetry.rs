//! Tracing setup, anonymized content ids and metric registration.
//!
//! Diary text never reaches the logs. Anything that needs to identify a piece
//! of content logs `anon_hash(text)` instead.

use metrics::{describe_counter, describe_gauge};
use once_cell::sync::OnceCell;
use sha2::{Digest, Sha256};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_FILTER: &str = "diary_insights=info,insight_runner=info,warn";

/// Install the global subscriber. `RUST_LOG` wins over the default filter;
/// `LOG_FORMAT=json` switches to JSON lines. Safe to call more than once.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// Short, stable, non-reversible id for a piece of text (first 6 bytes of SHA-256).
pub fn anon_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// One-time metrics registration (so series show up in any installed recorder).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "insight_trigger_skipped_total",
            "Log-created signals rejected by the trigger policy, by reason."
        );
        describe_counter!("insight_generated_total", "Insights persisted by the pipeline.");
        describe_counter!(
            "insight_generation_failed_total",
            "Generation attempts that produced nothing, by cause."
        );
        describe_counter!("signal_candy_total", "Candy increments applied to keyword signals.");
        describe_counter!("keyword_regen_total", "Keyword insight texts regenerated by the sweep.");
        describe_counter!(
            "keyword_regen_failed_total",
            "Keyword regenerations that failed and were skipped."
        );
        describe_gauge!("sweep_last_run_ts", "Unix ts when the keyword sweep last ran.");
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anon_hash_is_short_and_stable() {
        let a = anon_hash("Had coffee today");
        assert_eq!(a.len(), 12);
        assert_eq!(a, anon_hash("Had coffee today"));
        assert_ne!(a, anon_hash("Had tea today"));
    }
}
