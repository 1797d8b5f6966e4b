//! Config environment variable tests
//!
//! These tests verify that Config::from_env() correctly reads and applies
//! `PRE_*` environment variable overrides and rejects inconsistent policy.
//!
//! Tests use #[serial] to prevent race conditions with shared env vars.

use path_risk_engine::config::{Config, LogFormat};
use path_risk_engine::AppError;
use serial_test::serial;
use std::env;

#[test]
#[serial]
fn test_config_from_env_loads_defaults() {
    let config = Config::from_env().unwrap();
    assert_eq!(config.engine.flexibility.history_window, 20);
    assert_eq!(config.engine.escape.safety_margin, 1.2);
    assert_eq!(config.engine.warning.history_retention, 1000);
}

#[test]
#[serial]
fn test_config_from_env_flexibility_overrides() {
    env::set_var("PRE_HISTORY_WINDOW", "5");
    env::set_var("PRE_DECAY", "0.5");

    let config = Config::from_env().unwrap();
    assert_eq!(config.engine.flexibility.history_window, 5);
    assert_eq!(config.engine.flexibility.decay, 0.5);

    env::remove_var("PRE_HISTORY_WINDOW");
    env::remove_var("PRE_DECAY");
}

#[test]
#[serial]
fn test_config_from_env_escape_overrides() {
    env::set_var("PRE_SAFETY_MARGIN", "1.5");
    env::set_var("PRE_MAX_SUCCESS", "0.9");
    env::set_var("PRE_WARNING_HISTORY_RETENTION", "50");

    let config = Config::from_env().unwrap();
    assert_eq!(config.engine.escape.safety_margin, 1.5);
    assert_eq!(config.engine.escape.max_success_probability, 0.9);
    assert_eq!(config.engine.warning.history_retention, 50);

    env::remove_var("PRE_SAFETY_MARGIN");
    env::remove_var("PRE_MAX_SUCCESS");
    env::remove_var("PRE_WARNING_HISTORY_RETENTION");
}

#[test]
#[serial]
fn test_config_from_env_invalid_number_uses_default() {
    env::set_var("PRE_STREAK_WARNING", "not-a-number");

    let config = Config::from_env().unwrap();
    assert_eq!(config.engine.sensors.streak_warning, 5);

    env::remove_var("PRE_STREAK_WARNING");
}

#[test]
#[serial]
fn test_config_from_env_rejects_unordered_bands() {
    env::set_var("PRE_BAND_WARNING", "0.5");

    let result = Config::from_env();
    assert!(matches!(result, Err(AppError::Config { .. })));

    env::remove_var("PRE_BAND_WARNING");
}

#[test]
#[serial]
fn test_config_from_env_rejects_zero_retention() {
    env::set_var("PRE_WARNING_HISTORY_RETENTION", "0");

    assert!(Config::from_env().is_err());

    env::remove_var("PRE_WARNING_HISTORY_RETENTION");
}

#[test]
#[serial]
fn test_config_from_env_rejects_negative_interaction_cap() {
    env::set_var("PRE_INTERACTION_CAP", "-0.1");

    let result = Config::from_env();
    assert!(matches!(result, Err(AppError::Config { ref message }) if message.contains("PRE_INTERACTION_CAP")));

    env::remove_var("PRE_INTERACTION_CAP");
}

#[test]
#[serial]
fn test_config_from_env_resource_weights() {
    env::set_var("PRE_WEIGHT_TIME", "0.4");
    env::set_var("PRE_WEIGHT_ATTENTION", "0.0");

    let config = Config::from_env().unwrap();
    assert_eq!(config.engine.escape.resource_weights.time, 0.4);
    assert_eq!(config.engine.escape.resource_weights.attention, 0.0);

    env::set_var("PRE_WEIGHT_TIME", "0.5");
    assert!(Config::from_env().is_err());

    env::remove_var("PRE_WEIGHT_TIME");
    env::remove_var("PRE_WEIGHT_ATTENTION");
}

#[test]
#[serial]
fn test_config_from_env_sensor_thresholds() {
    env::set_var("PRE_BARRIER_HIT", "0.9");
    env::set_var("PRE_COUPLING_WINDOW", "12");

    let config = Config::from_env().unwrap();
    assert_eq!(config.engine.sensors.barrier_hit, 0.9);
    assert_eq!(config.engine.sensors.coupling_window, 12);

    env::remove_var("PRE_BARRIER_HIT");
    env::remove_var("PRE_COUPLING_WINDOW");
}

#[test]
#[serial]
fn test_config_from_env_json_log_format() {
    env::set_var("LOG_FORMAT", "json");

    let config = Config::from_env().unwrap();
    assert_eq!(config.logging.format, LogFormat::Json);

    env::remove_var("LOG_FORMAT");
}

#[test]
#[serial]
fn test_config_from_env_log_level() {
    env::set_var("LOG_LEVEL", "debug");

    let config = Config::from_env().unwrap();
    assert_eq!(config.logging.level, "debug");

    env::remove_var("LOG_LEVEL");
}
