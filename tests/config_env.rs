// tests/config_env.rs
use std::sync::Arc;
use std::{env, fs};

use diary_insights::analyze::language::Language;
use diary_insights::config::{GeneratorMode, InsightConfig, LanguageFallback};
use diary_insights::generate::{InsightGenerator, SeededRandom};

#[serial_test::serial]
#[test]
fn env_path_wins_and_values_are_clamped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("insights.toml");
    fs::write(
        &path,
        r#"
[trigger]
cooldown_secs = 600
utc_offset_minutes = 540

[generator]
default_language = "ko"
language_fallback = "strict"
max_selected_logs = 500

[signal]
regen_threshold = 0
"#,
    )
    .unwrap();

    env::set_var("INSIGHTS_CONFIG_PATH", path.display().to_string());
    let cfg = InsightConfig::load().unwrap();
    env::remove_var("INSIGHTS_CONFIG_PATH");

    assert_eq!(cfg.trigger.cooldown_secs, 600);
    assert_eq!(cfg.trigger.offset().local_minus_utc(), 540 * 60);
    // untouched keys keep their defaults
    assert_eq!(cfg.trigger.daily_limit, 3);
    assert_eq!(cfg.generator.default_language, Language::Korean);
    assert_eq!(cfg.generator.language_fallback, LanguageFallback::Strict);
    assert_eq!(cfg.generator.max_selected_logs, 30);
    assert_eq!(cfg.signal.regen_threshold, 1);
}

#[serial_test::serial]
#[test]
fn missing_file_gives_defaults_and_garbage_is_an_error() {
    let dir = tempfile::tempdir().unwrap();

    env::set_var("INSIGHTS_CONFIG_PATH", dir.path().join("nope.toml").display().to_string());
    let cfg = InsightConfig::load().unwrap();
    assert_eq!(cfg.generator.mode, GeneratorMode::Heuristic);
    assert_eq!(cfg.trigger.min_chars, 10);

    let bad = dir.path().join("bad.toml");
    fs::write(&bad, "[trigger\ncooldown_secs = ").unwrap();
    env::set_var("INSIGHTS_CONFIG_PATH", bad.display().to_string());
    assert!(InsightConfig::load().is_err());
    env::remove_var("INSIGHTS_CONFIG_PATH");
}

#[serial_test::serial]
#[test]
fn provider_mode_picks_mock_or_disabled_from_env() {
    let mut cfg = InsightConfig::default();
    cfg.generator.mode = GeneratorMode::Provider;
    cfg.generator.api_key_env = "DIARY_INSIGHTS_TEST_NO_SUCH_KEY".into();
    env::remove_var("DIARY_INSIGHTS_TEST_NO_SUCH_KEY");

    env::set_var("AI_TEST_MODE", "mock");
    let g = InsightGenerator::from_config(&cfg, Arc::new(SeededRandom::new(1))).unwrap();
    assert_eq!(g.strategy_name(), "mock");

    env::remove_var("AI_TEST_MODE");
    let g = InsightGenerator::from_config(&cfg, Arc::new(SeededRandom::new(1))).unwrap();
    assert_eq!(g.strategy_name(), "disabled");

    cfg.generator.mode = GeneratorMode::Heuristic;
    let g = InsightGenerator::from_config(&cfg, Arc::new(SeededRandom::new(1))).unwrap();
    assert_eq!(g.strategy_name(), "heuristic");
}
