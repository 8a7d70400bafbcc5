//! Shared fixtures for in-crate unit tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use crossbeam_channel::{Receiver, Sender};

use super::effect::{ControlMessage, ThreadSettings};
use super::{Completion, Effect, EffectExecutor, EffectId, EffectLaunch, Priority, ScriptRef, StopSignal, Timeout};

/// Executor that idles until stopped.
#[derive(Clone)]
pub(crate) struct IdleExecutor;

#[async_trait]
impl EffectExecutor for IdleExecutor {
    async fn execute(&self, _launch: EffectLaunch, mut stop: StopSignal) -> Result<(), String> {
        stop.stopped().await;
        Ok(())
    }
}

pub(crate) fn control() -> (Sender<ControlMessage>, Receiver<ControlMessage>) {
    crossbeam_channel::unbounded()
}

pub(crate) fn spawn_idle(id: EffectId, priority: Priority, tx: &Sender<ControlMessage>) -> Arc<Effect> {
    let launch = EffectLaunch {
        id,
        name: "idle".into(),
        script: ScriptRef::new("idle.py"),
        args: serde_json::json!({}),
        priority,
        timeout: Timeout::Endless,
        smoothing_cfg: 0,
        image_data: None,
    };
    Effect::start(
        launch,
        "test".into(),
        None,
        IdleExecutor,
        tx.clone(),
        ThreadSettings { stack_size: 1024 * 1024 },
    )
    .expect("idle effect starts")
}

pub(crate) fn next_completion(rx: &Receiver<ControlMessage>) -> Completion {
    loop {
        match rx.recv_timeout(Duration::from_secs(5)).expect("completion arrives") {
            ControlMessage::Finished(done) => return done,
            ControlMessage::CatalogChanged | ControlMessage::Shutdown => {}
        }
    }
}
