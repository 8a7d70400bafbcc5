//! The effect engine: admission, completion handling, cache/resume and
//! bounded-time bulk stop.
//!
//! # Design
//!
//! - **One lock**: the active list, the priority registry, the cached
//!   snapshots and the bulk-stop record live in a single `parking_lot::Mutex`
//!   with short critical sections.
//! - **Message-driven completion**: every effect thread posts exactly one
//!   [`Completion`] to a crossbeam channel drained by a dedicated control
//!   thread. The engine never polls effect state.
//! - **Bounded bulk stop**: `stop_all_effects` and `cache_running_effects`
//!   record the ids they wait for and sleep on a `Condvar` until the control
//!   thread has drained that set or the deadline passes. No event loop is
//!   re-entered; overlapping calls fail with [`EngineError::Busy`].

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvError, Sender};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::core::effect::{ControlMessage, ThreadSettings};
use crate::core::{
    build_audit_event, ActiveEffectDefinition, AuditSink, Completion, Effect, EffectCatalog,
    EffectDefinition, EffectExecutor, EffectId, EffectLaunch, EffectOutcome, EffectRequest,
    EffectSource, EffectState, EngineError, EngineEvent, EventBus, Priority, PriorityRegistry,
    ReleaseOutcome,
};

/// Result of a bulk stop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StopReport {
    /// Instances that reported completion before the deadline.
    pub stopped: Vec<EffectId>,
    /// Instances removed at the deadline without acknowledging the stop.
    pub forced: Vec<EffectId>,
    /// Time spent waiting.
    pub elapsed: Duration,
}

/// A live instance as seen by callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveEffect {
    /// Instance identifier.
    pub id: EffectId,
    /// Lifecycle state at the time of the snapshot.
    pub state: EffectState,
    /// Whether a stop has been requested.
    pub stopping: bool,
    /// Launch parameters.
    pub definition: ActiveEffectDefinition,
}

struct BulkStop {
    awaiting: HashSet<EffectId>,
}

#[derive(Default)]
struct EngineState {
    /// Admission order.
    active: Vec<Arc<Effect>>,
    registry: PriorityRegistry,
    cached: Vec<ActiveEffectDefinition>,
    bulk: Option<BulkStop>,
    /// Set once `shutdown` begins; no effect is admitted afterwards.
    closed: bool,
}

impl EngineState {
    fn take_active(&mut self, id: EffectId) -> Option<Arc<Effect>> {
        let pos = self.active.iter().position(|e| e.id() == id)?;
        Some(self.active.remove(pos))
    }
}

/// Components assembled into an engine.
pub(crate) struct EngineParts<E> {
    pub config: EngineConfig,
    pub executor: E,
    pub effects: Vec<EffectDefinition>,
    pub source: Option<Arc<dyn EffectSource>>,
    pub audit: Option<Box<dyn AuditSink>>,
}

struct Shared<E> {
    config: EngineConfig,
    catalog: EffectCatalog,
    source: Option<Arc<dyn EffectSource>>,
    executor: E,
    state: Mutex<EngineState>,
    stop_cv: Condvar,
    events: EventBus,
    audit: Option<Mutex<Box<dyn AuditSink>>>,
    next_id: AtomicU64,
}

/// Scheduler that runs effects on priority channels.
///
/// # Example
///
/// ```rust,ignore
/// use effect_engine::builders::EngineBuilder;
/// use effect_engine::core::{EffectDefinition, EffectRequest};
///
/// let engine = EngineBuilder::new(my_executor)
///     .with_effects(vec![EffectDefinition::new("rainbow", "rainbow.py")])
///     .build()?;
///
/// let id = engine.run_effect(EffectRequest::new("rainbow", 50))?;
/// engine.cache_running_effects()?;
/// engine.start_cached_effects()?;
/// engine.shutdown();
/// ```
pub struct EffectEngine<E: EffectExecutor> {
    shared: Arc<Shared<E>>,
    control_tx: Sender<ControlMessage>,
    control_thread: Mutex<Option<JoinHandle<()>>>,
    shut_down: AtomicBool,
}

impl<E: EffectExecutor> EffectEngine<E> {
    /// Create an engine with an empty catalog.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidConfig` if the configuration is invalid.
    pub fn new(config: EngineConfig, executor: E) -> Result<Self, EngineError> {
        Self::from_parts(EngineParts {
            config,
            executor,
            effects: Vec::new(),
            source: None,
            audit: None,
        })
    }

    pub(crate) fn from_parts(parts: EngineParts<E>) -> Result<Self, EngineError> {
        parts.config.validate().map_err(EngineError::InvalidConfig)?;

        let watch = parts.source.as_ref().and_then(|s| s.watch());
        let (control_tx, control_rx) = crossbeam_channel::unbounded();
        let shared = Arc::new(Shared {
            catalog: EffectCatalog::with_effects(parts.effects),
            events: EventBus::new(parts.config.event_capacity),
            config: parts.config,
            source: parts.source,
            executor: parts.executor,
            state: Mutex::new(EngineState::default()),
            stop_cv: Condvar::new(),
            audit: parts.audit.map(Mutex::new),
            next_id: AtomicU64::new(0),
        });

        let control_shared = Arc::clone(&shared);
        let control_thread = thread::Builder::new()
            .name("effect-engine-control".into())
            .spawn(move || control_loop(&control_shared, &control_rx, watch))
            .map_err(|e| EngineError::Launch(format!("failed to spawn control thread: {e}")))?;

        info!(
            effects = shared.catalog.len(),
            stop_ceiling_ms = shared.config.stop_ceiling_ms,
            "effect engine initialized"
        );

        Ok(Self {
            shared,
            control_tx,
            control_thread: Mutex::new(Some(control_thread)),
            shut_down: AtomicBool::new(false),
        })
    }

    /// Run a catalog effect on the request's priority channel.
    ///
    /// Any current owner of the channel is asked to stop and finishes
    /// asynchronously; this call does not wait for it. A request carrying
    /// its own script runs it under the requested name, catalog entry or not.
    ///
    /// # Errors
    ///
    /// - `EngineError::UnknownEffect` if the name is not in the catalog
    /// - `EngineError::InvalidArguments` if the arguments fail the schema
    /// - `EngineError::Launch` if the execution unit cannot be created
    /// - `EngineError::Busy` while a bulk stop is in progress
    /// - `EngineError::ShutDown` once `shutdown` was called
    pub fn run_effect(&self, request: EffectRequest) -> Result<EffectId, EngineError> {
        let shared = &self.shared;
        let name = request.name;
        let script_override = request.script;
        let (script, args) = match (&script_override, shared.catalog.find(&name)) {
            (Some(script), definition) => {
                let args = request
                    .args
                    .or_else(|| definition.map(|d| d.args))
                    .unwrap_or_else(|| Value::Object(Map::new()));
                (script.clone(), args)
            }
            (None, Some(definition)) => {
                let args = request.args.unwrap_or(definition.args);
                definition
                    .schema
                    .validate(&args)
                    .map_err(|reason| EngineError::InvalidArguments {
                        effect: definition.name.clone(),
                        reason,
                    })?;
                (definition.script, args)
            }
            (None, None) => return Err(EngineError::UnknownEffect(name)),
        };

        let origin = if request.origin.trim().is_empty() {
            shared.config.default_origin.clone()
        } else {
            request.origin
        };
        let priority = request.priority;

        let (effect, evicted) = {
            let mut state = shared.state.lock();
            if state.closed {
                return Err(EngineError::ShutDown);
            }
            if state.bulk.is_some() {
                return Err(EngineError::Busy);
            }

            let id = shared.next_id.fetch_add(1, Ordering::Relaxed) + 1;
            let launch = EffectLaunch {
                id,
                name: name.clone(),
                script,
                args,
                priority,
                timeout: request.timeout,
                smoothing_cfg: request.smoothing_cfg,
                image_data: request.image_data,
            };
            let effect = Effect::start(
                launch,
                origin,
                script_override,
                shared.executor.clone(),
                self.control_tx.clone(),
                ThreadSettings {
                    stack_size: shared.config.thread_stack_size,
                },
            )?;

            let evicted = state.registry.admit(priority, Arc::clone(&effect));
            state.active.push(Arc::clone(&effect));
            (effect, evicted)
        };

        info!(
            effect_id = effect.id(),
            effect = %name,
            priority = priority,
            origin = %effect.definition().origin,
            "effect started"
        );
        shared.record(&effect, "start", None);

        if let Some(prior) = evicted {
            info!(
                effect_id = prior.id(),
                priority = priority,
                replaced_by = effect.id(),
                "effect evicted from channel"
            );
            shared.record(&prior, "evict", Some(format!("replaced by {}", effect.id())));
        }

        shared.events.emit(EngineEvent::EffectListChanged);
        Ok(effect.id())
    }

    /// Stop whatever runs on `priority`. Returns the evicted instance id.
    pub fn channel_cleared(&self, priority: Priority) -> Option<EffectId> {
        let evicted = self.shared.state.lock().registry.clear(priority)?;
        info!(effect_id = evicted.id(), priority = priority, "channel cleared");
        self.shared.record(&evicted, "clear", None);
        self.shared.events.emit(EngineEvent::EffectListChanged);
        Some(evicted.id())
    }

    /// Clear every owned channel. Returns the evicted instance ids.
    pub fn all_channels_cleared(&self) -> Vec<EffectId> {
        let evicted: Vec<Arc<Effect>> = {
            let mut state = self.shared.state.lock();
            state
                .registry
                .priorities()
                .into_iter()
                .filter_map(|p| state.registry.clear(p))
                .collect()
        };

        for effect in &evicted {
            self.shared.record(effect, "clear", None);
        }
        if !evicted.is_empty() {
            info!(count = evicted.len(), "all channels cleared");
            self.shared.events.emit(EngineEvent::EffectListChanged);
        }
        evicted.iter().map(|e| e.id()).collect()
    }

    /// Snapshot every running effect, then stop them all and wait.
    ///
    /// Snapshots keep admission order and carry the time each effect had
    /// left. The catalog is untouched.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Busy` if another bulk stop is in progress.
    pub fn cache_running_effects(&self) -> Result<StopReport, EngineError> {
        self.bulk_stop(true)
    }

    /// Relaunch every cached snapshot in order, then clear the cache.
    ///
    /// Snapshots that can no longer start (for example because their effect
    /// left the catalog) are skipped with a warning.
    ///
    /// # Errors
    ///
    /// - `EngineError::Busy` if a bulk stop is in progress
    /// - `EngineError::ShutDown` once `shutdown` was called
    pub fn start_cached_effects(&self) -> Result<Vec<EffectId>, EngineError> {
        let cached = {
            let mut state = self.shared.state.lock();
            if state.closed {
                return Err(EngineError::ShutDown);
            }
            if state.bulk.is_some() {
                return Err(EngineError::Busy);
            }
            std::mem::take(&mut state.cached)
        };

        let mut started = Vec::with_capacity(cached.len());
        for snapshot in cached {
            match self.run_effect(snapshot.to_request()) {
                Ok(id) => started.push(id),
                Err(e) => warn!(
                    effect = %snapshot.name,
                    priority = snapshot.priority,
                    error = %e,
                    "cached effect skipped"
                ),
            }
        }
        Ok(started)
    }

    /// Stop every running effect and wait until all finished or the
    /// deadline passed.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Busy` if another bulk stop is in progress.
    pub fn stop_all_effects(&self) -> Result<StopReport, EngineError> {
        self.bulk_stop(false)
    }

    /// Launch parameters of live effects in admission order.
    ///
    /// Instances already asked to stop are excluded.
    #[must_use]
    pub fn get_active_effects(&self) -> Vec<ActiveEffectDefinition> {
        self.shared
            .state
            .lock()
            .active
            .iter()
            .filter(|e| !e.is_stop_requested())
            .map(|e| e.definition().clone())
            .collect()
    }

    /// Every tracked instance, including those still winding down.
    #[must_use]
    pub fn get_active_instances(&self) -> Vec<ActiveEffect> {
        self.shared
            .state
            .lock()
            .active
            .iter()
            .map(|e| ActiveEffect {
                id: e.id(),
                state: e.state(),
                stopping: e.is_stop_requested(),
                definition: e.definition().clone(),
            })
            .collect()
    }

    /// Id of the instance owning `priority`.
    #[must_use]
    pub fn channel_owner(&self, priority: Priority) -> Option<EffectId> {
        self.shared.state.lock().registry.owner(priority).map(|e| e.id())
    }

    /// Snapshots waiting for `start_cached_effects`.
    #[must_use]
    pub fn cached_effects(&self) -> Vec<ActiveEffectDefinition> {
        self.shared.state.lock().cached.clone()
    }

    /// Definitions currently available.
    #[must_use]
    pub fn get_effects(&self) -> Vec<EffectDefinition> {
        self.shared.catalog.get_effects()
    }

    /// Replace the catalog with definitions pushed by the host.
    pub fn set_effects(&self, effects: Vec<EffectDefinition>) -> usize {
        self.shared.install_catalog(effects)
    }

    /// Reload the catalog from the configured source.
    ///
    /// Running effects are not affected.
    ///
    /// # Errors
    ///
    /// Returns the source's error; the previous catalog stays in place.
    pub fn refresh_catalog(&self) -> Result<usize, EngineError> {
        self.shared.reload_catalog()
    }

    /// Ask the control thread to reload the catalog asynchronously.
    pub fn notify_catalog_changed(&self) {
        let _ = self.control_tx.send(ControlMessage::CatalogChanged);
    }

    /// Subscribe to engine events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.shared.events.subscribe()
    }

    /// Engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    /// Stop all effects and join the control thread.
    ///
    /// Idempotent. New effects are refused from the start of the call. A
    /// bulk stop already in progress is allowed to finish first. Effects that
    /// ignore the stop are detached once the bulk-stop deadline passes.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }

        info!("shutting down effect engine");
        self.shared.state.lock().closed = true;
        let report = loop {
            match self.bulk_stop(false) {
                Ok(report) => break report,
                Err(e) => {
                    debug!(error = %e, "waiting for running bulk stop before shutdown");
                    self.wait_for_bulk_stop();
                }
            }
        };
        if !report.forced.is_empty() {
            warn!(forced = report.forced.len(), "effects detached during shutdown");
        }

        let _ = self.control_tx.send(ControlMessage::Shutdown);
        if let Some(handle) = self.control_thread.lock().take() {
            if handle.join().is_err() {
                error!("effect engine control thread panicked");
            }
        }
        info!("effect engine shut down complete");
    }

    /// Block until no bulk stop is in progress.
    fn wait_for_bulk_stop(&self) {
        let mut state = self.shared.state.lock();
        while state.bulk.is_some() {
            self.shared.stop_cv.wait(&mut state);
        }
    }

    fn bulk_stop(&self, cache: bool) -> Result<StopReport, EngineError> {
        let shared = &self.shared;
        let started = Instant::now();
        let mut state = shared.state.lock();
        if state.bulk.is_some() {
            warn!(cache = cache, "bulk stop rejected: another one is in progress");
            return Err(EngineError::Busy);
        }

        if cache {
            let snapshots: Vec<ActiveEffectDefinition> = state
                .active
                .iter()
                .filter(|e| !e.is_stop_requested())
                .filter_map(|e| e.resumable_snapshot())
                .collect();
            debug!(count = snapshots.len(), "cached running effects");
            state.cached = snapshots;
        }

        let participants: Vec<EffectId> = state.active.iter().map(|e| e.id()).collect();
        let budget = shared.stop_budget(&state.active);
        let deadline = started + budget;
        for effect in &state.active {
            effect.request_stop();
        }
        state.bulk = Some(BulkStop {
            awaiting: participants.iter().copied().collect(),
        });
        info!(
            count = participants.len(),
            cache = cache,
            budget_ms = u64::try_from(budget.as_millis()).unwrap_or(u64::MAX),
            "bulk stop started"
        );

        while state.bulk.as_ref().is_some_and(|b| !b.awaiting.is_empty()) {
            if shared.stop_cv.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }

        let leftover = state.bulk.take().map(|b| b.awaiting).unwrap_or_default();
        shared.stop_cv.notify_all();
        let mut forced = Vec::new();
        for id in participants.iter().copied().filter(|id| leftover.contains(id)) {
            if let Some(effect) = state.take_active(id) {
                if state.registry.release(effect.priority(), id) == ReleaseOutcome::Stale {
                    debug!(effect_id = id, "forced effect no longer owned its channel");
                }
                effect.abandon();
                forced.push(effect);
            }
        }
        drop(state);

        for effect in &forced {
            warn!(
                effect_id = effect.id(),
                effect = %effect.definition().name,
                priority = effect.priority(),
                "effect did not stop before deadline; detached"
            );
            shared.record(effect, "force_stop", None);
        }

        let forced: Vec<EffectId> = forced.iter().map(|e| e.id()).collect();
        let report = StopReport {
            stopped: participants
                .into_iter()
                .filter(|id| !forced.contains(id))
                .collect(),
            forced,
            elapsed: started.elapsed(),
        };
        info!(
            stopped = report.stopped.len(),
            forced = report.forced.len(),
            elapsed_ms = u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
            "bulk stop completed"
        );

        if !report.forced.is_empty() {
            shared.events.emit(EngineEvent::EffectListChanged);
        }
        shared.events.emit(EngineEvent::StopCompleted);
        Ok(report)
    }
}

impl<E: EffectExecutor> Drop for EffectEngine<E> {
    fn drop(&mut self) {
        // Signal only; joining here could hang on effects that ignore stops.
        if !self.shut_down.swap(true, Ordering::AcqRel) {
            for effect in &self.shared.state.lock().active {
                effect.request_stop();
            }
            let _ = self.control_tx.send(ControlMessage::Shutdown);
            debug!("EffectEngine dropped without explicit shutdown - effects will be detached");
        }
    }
}

impl<E> Shared<E> {
    /// Deadline budget of a bulk stop over `active`.
    fn stop_budget(&self, active: &[Arc<Effect>]) -> Duration {
        let ceiling = self.config.stop_ceiling();
        if active.is_empty() {
            return Duration::ZERO;
        }
        let mut longest = Duration::ZERO;
        for effect in active {
            match effect.remaining() {
                None => return ceiling,
                Some(left) => longest = longest.max(left),
            }
        }
        (longest + self.config.stop_grace()).min(ceiling)
    }

    fn on_effect_finished(&self, done: Completion) {
        let (removed, release) = {
            let mut state = self.state.lock();
            let removed = state.take_active(done.id);
            let release = state.registry.release(done.priority, done.id);
            if let Some(bulk) = state.bulk.as_mut() {
                if bulk.awaiting.remove(&done.id) && bulk.awaiting.is_empty() {
                    self.stop_cv.notify_all();
                }
            }
            (removed, release)
        };

        match &done.outcome {
            EffectOutcome::Failure(reason) => warn!(
                effect_id = done.id,
                priority = done.priority,
                reason = %reason,
                "effect failed"
            ),
            outcome => info!(
                effect_id = done.id,
                priority = done.priority,
                outcome = %outcome,
                "effect finished"
            ),
        }
        if release == ReleaseOutcome::Stale {
            debug!(
                effect_id = done.id,
                priority = done.priority,
                "stale release ignored: channel already reassigned"
            );
        }

        let Some(effect) = removed else {
            debug!(effect_id = done.id, "completion for an effect no longer tracked");
            return;
        };
        self.record(&effect, "finish", Some(done.outcome.to_string()));
        self.events.emit(EngineEvent::EffectFinished {
            id: done.id,
            priority: done.priority,
            outcome: done.outcome,
        });
        self.events.emit(EngineEvent::EffectListChanged);
    }

    fn install_catalog(&self, effects: Vec<EffectDefinition>) -> usize {
        let count = self.catalog.replace(effects);
        info!(count = count, "effect catalog updated");
        self.events.emit(EngineEvent::CatalogUpdated { count });
        count
    }

    fn reload_catalog(&self) -> Result<usize, EngineError> {
        let Some(source) = self.source.as_ref() else {
            return Ok(self.catalog.len());
        };
        let effects = source.load().inspect_err(|e| {
            warn!(error = %e, "catalog reload failed; keeping previous catalog");
        })?;
        Ok(self.install_catalog(effects))
    }

    fn record(&self, effect: &Effect, action: &str, detail: Option<String>) {
        if let Some(audit) = &self.audit {
            let def = effect.definition();
            audit.lock().record(build_audit_event(
                effect.id(),
                def.name.clone(),
                def.priority,
                def.origin.clone(),
                action,
                detail,
            ));
        }
    }

    /// Apply one control message. Returns false once the loop should exit.
    fn dispatch(&self, msg: Result<ControlMessage, RecvError>) -> bool {
        match msg {
            Ok(ControlMessage::Finished(done)) => {
                self.on_effect_finished(done);
                true
            }
            Ok(ControlMessage::CatalogChanged) => {
                let _ = self.reload_catalog();
                true
            }
            Ok(ControlMessage::Shutdown) | Err(_) => false,
        }
    }
}

fn control_loop<E>(shared: &Shared<E>, rx: &Receiver<ControlMessage>, watch: Option<Receiver<()>>) {
    debug!("control thread started");
    let watch = watch.unwrap_or_else(crossbeam_channel::never);
    let mut watching = true;
    while watching {
        crossbeam_channel::select! {
            recv(rx) -> msg => {
                if !shared.dispatch(msg) {
                    debug!("control thread exiting");
                    return;
                }
            }
            recv(watch) -> tick => {
                if tick.is_ok() {
                    let _ = shared.reload_catalog();
                } else {
                    debug!("catalog watch closed");
                    watching = false;
                }
            }
        }
    }
    while shared.dispatch(rx.recv()) {}
    debug!("control thread exiting");
}
