//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use effect_engine::builders::EngineBuilder;
use effect_engine::config::EngineConfig;
use effect_engine::core::{
    EffectDefinition, EffectEngine, EffectExecutor, EffectLaunch, EngineEvent, StopSignal,
};
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::broadcast::{self, error::TryRecvError};

// ============================================================================
// TEST EXECUTORS
// ============================================================================

/// Renders frames until stopped, remembering every launch it saw.
#[derive(Clone, Default)]
pub struct FrameLoopExecutor {
    pub launches: Arc<Mutex<Vec<EffectLaunch>>>,
}

#[async_trait]
impl EffectExecutor for FrameLoopExecutor {
    fn prepare(&self, launch: &EffectLaunch) -> Result<(), String> {
        if launch.script.as_str() == "missing.py" {
            return Err("script not found: missing.py".into());
        }
        Ok(())
    }

    async fn execute(&self, launch: EffectLaunch, stop: StopSignal) -> Result<(), String> {
        self.launches.lock().push(launch.clone());
        if launch.script.as_str() == "broken.py" {
            tokio::time::sleep(Duration::from_millis(10)).await;
            return Err("division by zero in frame 3".into());
        }
        while !stop.is_stopped() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        Ok(())
    }
}

/// Blocks its thread without ever looking at the stop signal.
#[derive(Clone)]
pub struct StubbornExecutor {
    pub block_for: Duration,
}

#[async_trait]
impl EffectExecutor for StubbornExecutor {
    async fn execute(&self, _launch: EffectLaunch, _stop: StopSignal) -> Result<(), String> {
        std::thread::sleep(self.block_for);
        Ok(())
    }
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

pub fn catalog() -> Vec<EffectDefinition> {
    vec![
        EffectDefinition::new("rainbow", "rainbow.py"),
        EffectDefinition::new("knight rider", "knight-rider.py")
            .with_args(json!({"speed": 1.0, "color": [255, 0, 0]})),
        EffectDefinition::new("broken", "broken.py"),
        EffectDefinition::new("ghost", "missing.py"),
    ]
}

pub fn engine() -> EffectEngine<FrameLoopExecutor> {
    engine_with(FrameLoopExecutor::default(), EngineConfig::new())
}

pub fn engine_with<E: EffectExecutor>(executor: E, config: EngineConfig) -> EffectEngine<E> {
    EngineBuilder::new(executor)
        .with_config(config)
        .with_effects(catalog())
        .build()
        .expect("engine builds")
}

/// Wait until an event matching `pred` arrives or `timeout` elapses.
pub fn wait_for_event<F>(
    rx: &mut broadcast::Receiver<EngineEvent>,
    timeout: Duration,
    mut pred: F,
) -> Option<EngineEvent>
where
    F: FnMut(&EngineEvent) -> bool,
{
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        match rx.try_recv() {
            Ok(event) if pred(&event) => return Some(event),
            Ok(_) | Err(TryRecvError::Lagged(_)) => {}
            Err(TryRecvError::Empty) => std::thread::sleep(Duration::from_millis(2)),
            Err(TryRecvError::Closed) => return None,
        }
    }
    None
}

/// Wait until `cond` holds or `timeout` elapses.
pub fn eventually<F: FnMut() -> bool>(timeout: Duration, mut cond: F) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    cond()
}
