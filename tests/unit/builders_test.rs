//! Tests for the engine builder

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use effect_engine::builders::EngineBuilder;
use effect_engine::config::EngineConfig;
use effect_engine::core::{
    EffectDefinition, EffectExecutor, EffectLaunch, EffectRequest, EffectSource, EngineError,
    InMemoryAuditSink, StopSignal,
};
use effect_engine::infra::InMemoryEffectSource;
use parking_lot::Mutex;

#[derive(Clone)]
struct Idle;

#[async_trait]
impl EffectExecutor for Idle {
    async fn execute(&self, _launch: EffectLaunch, mut stop: StopSignal) -> Result<(), String> {
        stop.stopped().await;
        Ok(())
    }
}

struct FailingSource;

impl EffectSource for FailingSource {
    fn load(&self) -> Result<Vec<EffectDefinition>, EngineError> {
        Err(EngineError::Catalog("disk unplugged".into()))
    }
}

#[test]
fn test_builder_rejects_invalid_config() {
    let result = EngineBuilder::new(Idle)
        .with_config(EngineConfig::new().with_event_capacity(0))
        .build();
    assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
}

#[test]
fn test_builder_seeds_catalog() {
    let engine = EngineBuilder::new(Idle)
        .with_effects(vec![
            EffectDefinition::new("rainbow", "rainbow.py"),
            EffectDefinition::new("police", "police.py"),
        ])
        .build()
        .unwrap();
    let names: Vec<String> = engine.get_effects().into_iter().map(|d| d.name).collect();
    assert_eq!(names, vec!["rainbow", "police"]);
    engine.shutdown();
}

#[test]
fn test_builder_prefers_source_over_fixed_effects() {
    let source = Arc::new(InMemoryEffectSource::new(vec![EffectDefinition::new(
        "candle",
        "candle.py",
    )]));
    let engine = EngineBuilder::new(Idle)
        .with_effects(vec![EffectDefinition::new("rainbow", "rainbow.py")])
        .with_source(source)
        .build()
        .unwrap();
    let names: Vec<String> = engine.get_effects().into_iter().map(|d| d.name).collect();
    assert_eq!(names, vec!["candle"]);
    engine.shutdown();
}

#[test]
fn test_builder_surfaces_source_failure() {
    let result = EngineBuilder::new(Idle).with_source(Arc::new(FailingSource)).build();
    assert!(matches!(result, Err(EngineError::Catalog(_))));
}

#[test]
fn test_builder_wires_audit_sink() {
    let sink = Arc::new(Mutex::new(InMemoryAuditSink::new(16)));
    let engine = EngineBuilder::new(Idle)
        .with_config(EngineConfig::new().with_stop_ceiling(Duration::from_secs(2)))
        .with_effects(vec![EffectDefinition::new("rainbow", "rainbow.py")])
        .with_audit(Box::new(Arc::clone(&sink)))
        .build()
        .unwrap();

    engine.run_effect(EffectRequest::new("rainbow", 1)).unwrap();
    engine.shutdown();

    let actions: Vec<String> = sink.lock().events().into_iter().map(|e| e.action).collect();
    assert_eq!(actions.first().map(String::as_str), Some("start"));
    assert!(actions.iter().any(|a| a == "finish"), "{actions:?}");
}

#[test]
fn test_engine_new_starts_with_empty_catalog() {
    let engine = effect_engine::core::EffectEngine::new(EngineConfig::default(), Idle).unwrap();
    assert!(engine.get_effects().is_empty());
    assert!(matches!(
        engine.run_effect(EffectRequest::new("rainbow", 1)),
        Err(EngineError::UnknownEffect(_))
    ));
    engine.shutdown();
}
