//! A single running effect and its execution thread.
//!
//! Each instance owns one OS thread with a single-threaded tokio runtime.
//! The thread drives the executor future against the stop signal and the
//! timeout, records exactly one terminal state, then posts a
//! [`Completion`] to the engine's control channel.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, error};

use super::{
    ActiveEffectDefinition, EffectExecutor, EffectId, EffectLaunch, EngineError, Priority,
    ScriptRef, StopSignal, Timeout,
};

/// Lifecycle state of an effect instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectState {
    /// Thread spawned, executor not yet entered.
    Starting,
    /// Executor is running.
    Running,
    /// Ended on its own or by timeout expiry.
    Completed,
    /// Executor reported an error.
    Failed,
    /// Stopped from outside.
    Cancelled,
}

impl EffectState {
    /// Whether no further transition can happen.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// How an effect run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectOutcome {
    /// Ended normally or its timeout expired.
    Success,
    /// Executor error with reason.
    Failure(String),
    /// Stop was requested before the run ended.
    Cancelled,
}

impl EffectOutcome {
    const fn terminal_state(&self) -> EffectState {
        match self {
            Self::Success => EffectState::Completed,
            Self::Failure(_) => EffectState::Failed,
            Self::Cancelled => EffectState::Cancelled,
        }
    }
}

impl fmt::Display for EffectOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure(reason) => write!(f, "failure: {reason}"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Completion notice posted by an effect thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Finished instance.
    pub id: EffectId,
    /// Channel the instance was admitted on.
    pub priority: Priority,
    /// Terminal outcome.
    pub outcome: EffectOutcome,
}

/// Messages consumed by the engine's control thread.
#[derive(Debug)]
pub(crate) enum ControlMessage {
    Finished(Completion),
    CatalogChanged,
    Shutdown,
}

/// Thread settings for effect execution units.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ThreadSettings {
    pub stack_size: usize,
}

/// A live effect instance.
pub struct Effect {
    id: EffectId,
    definition: ActiveEffectDefinition,
    started_at: Instant,
    state: Arc<Mutex<EffectState>>,
    stop_requested: AtomicBool,
    stop_tx: watch::Sender<bool>,
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id)
            .field("name", &self.definition.name)
            .field("priority", &self.definition.priority)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Effect {
    /// Launch `launch` on a dedicated thread.
    ///
    /// The completion is posted to `control` exactly once, whatever the
    /// outcome. `script_override` is remembered so a snapshot relaunches the
    /// same script. The thread is detached.
    pub(crate) fn start<E: EffectExecutor>(
        launch: EffectLaunch,
        origin: String,
        script_override: Option<ScriptRef>,
        executor: E,
        control: Sender<ControlMessage>,
        settings: ThreadSettings,
    ) -> Result<Arc<Self>, EngineError> {
        executor.prepare(&launch).map_err(EngineError::Launch)?;

        let (stop_tx, stop) = StopSignal::channel();
        let effect = Arc::new(Self {
            id: launch.id,
            definition: ActiveEffectDefinition {
                name: launch.name.clone(),
                script: script_override,
                args: launch.args.clone(),
                priority: launch.priority,
                timeout: launch.timeout,
                origin,
                smoothing_cfg: launch.smoothing_cfg,
                image_data: launch.image_data.clone(),
            },
            started_at: Instant::now(),
            state: Arc::new(Mutex::new(EffectState::Starting)),
            stop_requested: AtomicBool::new(false),
            stop_tx,
        });

        let id = launch.id;
        let priority = launch.priority;
        let state = Arc::clone(&effect.state);
        thread::Builder::new()
            .name(format!("effect-{id}"))
            .stack_size(settings.stack_size)
            .spawn(move || {
                let outcome = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => {
                        transition(&state, EffectState::Running);
                        rt.block_on(drive(executor, launch, stop))
                    }
                    Err(e) => {
                        error!(effect_id = id, error = %e, "failed to create effect runtime");
                        EffectOutcome::Failure(format!("runtime unavailable: {e}"))
                    }
                };
                if !transition(&state, outcome.terminal_state()) {
                    debug!(effect_id = id, "effect already terminated by engine");
                }
                let _ = control.send(ControlMessage::Finished(Completion {
                    id,
                    priority,
                    outcome,
                }));
            })
            .map_err(|e| EngineError::Launch(format!("failed to spawn effect thread: {e}")))?;

        Ok(effect)
    }

    /// Instance identifier.
    #[must_use]
    pub const fn id(&self) -> EffectId {
        self.id
    }

    /// Owned priority channel.
    #[must_use]
    pub const fn priority(&self) -> Priority {
        self.definition.priority
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> EffectState {
        *self.state.lock()
    }

    /// Launch parameters as configured.
    #[must_use]
    pub fn definition(&self) -> &ActiveEffectDefinition {
        &self.definition
    }

    /// Time left before the timeout expires; `None` when endless.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.definition
            .timeout
            .duration()
            .map(|d| d.saturating_sub(self.started_at.elapsed()))
    }

    /// Launch parameters with the timeout reduced to the time left.
    ///
    /// Returns `None` for a timed effect that has already expired.
    #[must_use]
    pub fn resumable_snapshot(&self) -> Option<ActiveEffectDefinition> {
        let timeout = match self.remaining() {
            None => Timeout::Endless,
            Some(left) if left.is_zero() => return None,
            Some(left) => Timeout::After(left),
        };
        Some(ActiveEffectDefinition {
            timeout,
            ..self.definition.clone()
        })
    }

    /// Ask the execution unit to stop. Idempotent and non-blocking.
    pub fn request_stop(&self) {
        if !self.stop_requested.swap(true, Ordering::AcqRel) {
            debug!(effect_id = self.id, priority = self.priority(), "stop requested");
            self.stop_tx.send_replace(true);
        }
    }

    /// Whether a stop has been requested.
    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Record forced termination for an instance that never acknowledged
    /// its stop.
    pub(crate) fn abandon(&self) {
        self.request_stop();
        transition(&self.state, EffectState::Cancelled);
    }
}

/// Move to `next` unless already terminal. Returns whether it moved.
fn transition(state: &Mutex<EffectState>, next: EffectState) -> bool {
    let mut current = state.lock();
    if current.is_terminal() {
        return false;
    }
    *current = next;
    true
}

async fn drive<E: EffectExecutor>(
    executor: E,
    launch: EffectLaunch,
    mut stop: StopSignal,
) -> EffectOutcome {
    let timeout = launch.timeout;
    let watcher = stop.clone();
    let expiry = async move {
        match timeout {
            Timeout::Endless => std::future::pending::<()>().await,
            Timeout::After(d) => tokio::time::sleep(d).await,
        }
    };

    tokio::select! {
        biased;
        () = stop.stopped() => EffectOutcome::Cancelled,
        result = executor.execute(launch, watcher.clone()) => {
            if watcher.is_stopped() {
                EffectOutcome::Cancelled
            } else {
                result.map_or_else(EffectOutcome::Failure, |()| EffectOutcome::Success)
            }
        }
        () = expiry => EffectOutcome::Success,
    }
}
