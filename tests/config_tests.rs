use std::io::Write;

use arbengine::error::{ConfigError, Error};
use arbengine::infrastructure::config::Config;

#[test]
fn loads_file_with_partial_sections() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
        [exchange]
        request_timeout_secs = 15

        [resilience]
        breaker_threshold = 5
        report_dir = "reports"

        [strategies]
        enabled = ["triangular_arb", "arb"]

        [strategies.policy]
        trade_probability = 0.5

        [strategies.arb]
        min_price_diff = 0.002
        max_price_diff = 0.02
        "#
    )
    .unwrap();

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.exchange.request_timeout().as_secs(), 15);
    assert_eq!(config.resilience.breaker_threshold, 5);
    assert!(config.strategies.is_enabled("arb"));
    assert!(!config.strategies.is_enabled("scalping"));
    assert_eq!(config.strategies.policy.trade_probability, 0.5);
    assert_eq!(config.strategies.arb.max_price_diff, 0.02);
    // Untouched sections keep their defaults.
    assert_eq!(config.strategies.scalping.max_positions, 3);
    assert!(config.runtime.resume_active);
}

#[test]
fn missing_file_is_a_read_error() {
    let err = Config::load("/nonexistent/arbengine.toml").unwrap_err();
    assert!(matches!(err, Error::Config(ConfigError::ReadFile(_))));
}

#[test]
fn inverted_spread_bounds_are_rejected() {
    let err = Config::parse_toml("[strategies.arb]\nmin_price_diff = 0.02\nmax_price_diff = 0.01\n")
        .unwrap_err();
    assert!(err.to_string().contains("max_price_diff"));
}

#[test]
fn trade_probability_must_be_a_fraction() {
    assert!(Config::parse_toml("[strategies.policy]\ntrade_probability = 1.5\n").is_err());
}
