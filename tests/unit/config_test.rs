//! Tests for configuration validation

use std::collections::HashMap;
use std::time::Duration;

use effect_engine::config::EngineConfig;

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |key: &str| map.get(key).cloned()
}

#[test]
fn test_default_config_is_valid() {
    let config = EngineConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.stop_ceiling(), Duration::from_millis(5000));
    assert_eq!(config.stop_grace(), Duration::from_millis(250));
    assert_eq!(config.default_origin, "System");
}

#[test]
fn test_zero_ceiling_is_rejected() {
    let config = EngineConfig::new().with_stop_ceiling(Duration::ZERO);
    assert!(config.validate().is_err());
}

#[test]
fn test_grace_above_ceiling_is_rejected() {
    let config = EngineConfig::new()
        .with_stop_ceiling(Duration::from_millis(100))
        .with_stop_grace(Duration::from_millis(200));
    assert!(config.validate().is_err());
}

#[test]
fn test_small_stack_and_empty_origin_are_rejected() {
    assert!(EngineConfig::new().with_thread_stack_size(1024).validate().is_err());
    assert!(EngineConfig::new().with_default_origin("  ").validate().is_err());
    assert!(EngineConfig::new().with_event_capacity(0).validate().is_err());
}

#[test]
fn test_from_json_fills_defaults() {
    let config = EngineConfig::from_json_str(r#"{"stop_ceiling_ms": 1200}"#).unwrap();
    assert_eq!(config.stop_ceiling_ms, 1200);
    assert_eq!(config.stop_grace_ms, 250);
    assert_eq!(config.event_capacity, 64);
}

#[test]
fn test_from_json_rejects_garbage() {
    assert!(EngineConfig::from_json_str("{ not json").is_err());
}

#[test]
fn test_from_lookup_overrides() {
    let config = EngineConfig::from_lookup(lookup(&[
        ("EFFECT_ENGINE_STOP_CEILING_MS", "800"),
        ("EFFECT_ENGINE_DEFAULT_ORIGIN", "Web UI"),
    ]))
    .unwrap();
    assert_eq!(config.stop_ceiling_ms, 800);
    assert_eq!(config.default_origin, "Web UI");
    assert_eq!(config.stop_grace_ms, 250);
}

#[test]
fn test_from_lookup_reports_bad_number() {
    let err = EngineConfig::from_lookup(lookup(&[("EFFECT_ENGINE_EVENT_CAPACITY", "lots")]))
        .unwrap_err();
    assert!(err.contains("EFFECT_ENGINE_EVENT_CAPACITY"), "{err}");
}
