//! Tests for error types

use effect_engine::core::EngineError;

#[test]
fn test_unknown_effect_error() {
    let err = EngineError::UnknownEffect("plasma".to_string());
    assert_eq!(format!("{}", err), "unknown effect: plasma");
}

#[test]
fn test_invalid_arguments_error() {
    let err = EngineError::InvalidArguments {
        effect: "rainbow".to_string(),
        reason: "missing required argument `speed`".to_string(),
    };
    assert_eq!(
        format!("{}", err),
        "invalid arguments for effect `rainbow`: missing required argument `speed`"
    );
}

#[test]
fn test_launch_error() {
    let err = EngineError::Launch("script not found".to_string());
    assert_eq!(format!("{}", err), "launch error: script not found");
}

#[test]
fn test_busy_error() {
    assert_eq!(format!("{}", EngineError::Busy), "engine busy: bulk stop in progress");
}

#[test]
fn test_shut_down_error() {
    assert_eq!(format!("{}", EngineError::ShutDown), "engine shut down");
}

#[test]
fn test_catalog_and_config_errors() {
    let err = EngineError::Catalog("read /nope: denied".to_string());
    assert_eq!(format!("{}", err), "catalog error: read /nope: denied");
    let err = EngineError::InvalidConfig("event_capacity must be > 0".to_string());
    assert_eq!(format!("{}", err), "invalid configuration: event_capacity must be > 0");
}
