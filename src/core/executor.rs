//! Script runtime abstraction and the launch payload handed to it.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;

use super::{EffectId, Priority, ScriptRef, SmoothingConfigId, Timeout};

/// Everything the runtime needs to run one effect.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectLaunch {
    /// Instance identifier.
    pub id: EffectId,
    /// Effect name.
    pub name: String,
    /// Script to run.
    pub script: ScriptRef,
    /// Validated arguments.
    pub args: Value,
    /// Owned priority channel.
    pub priority: Priority,
    /// Timeout of the run.
    pub timeout: Timeout,
    /// Smoothing profile for the effect's output.
    pub smoothing_cfg: SmoothingConfigId,
    /// Optional image payload.
    pub image_data: Option<String>,
}

/// Cooperative stop request observed by a running effect.
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    pub(crate) fn channel() -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        (tx, Self { rx })
    }

    /// Whether a stop was requested. Cheap enough to call every frame.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolve once a stop is requested or the owning instance is gone.
    pub async fn stopped(&mut self) {
        let _ = self.rx.wait_for(|stop| *stop).await;
    }
}

/// Runtime that executes effect scripts.
///
/// Implementations run on the effect's dedicated thread inside a
/// single-threaded tokio runtime, so blocking between awaits only delays that
/// one effect. The future is dropped at its next await point once a stop is
/// requested or the timeout expires.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use effect_engine::core::{EffectExecutor, EffectLaunch, StopSignal};
///
/// #[derive(Clone)]
/// struct Blink;
///
/// #[async_trait]
/// impl EffectExecutor for Blink {
///     async fn execute(&self, launch: EffectLaunch, stop: StopSignal) -> Result<(), String> {
///         while !stop.is_stopped() {
///             tokio::time::sleep(std::time::Duration::from_millis(40)).await;
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait EffectExecutor: Send + Sync + Clone + 'static {
    /// Check that the launch can be executed before a thread is spawned.
    ///
    /// An error here surfaces to the caller as a launch error.
    fn prepare(&self, _launch: &EffectLaunch) -> Result<(), String> {
        Ok(())
    }

    /// Run the effect until it ends on its own or is interrupted.
    ///
    /// `Err` carries the failure reason reported in the completion outcome.
    async fn execute(&self, launch: EffectLaunch, stop: StopSignal) -> Result<(), String>;
}
