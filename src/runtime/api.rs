//! API-facing request/response models.
//!
//! Thin serde adapters over [`EffectEngine`] for JSON command surfaces.
//! Errors are flattened to strings for transport.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{
    ActiveEffect, EffectEngine, EffectExecutor, EffectId, EffectRequest, Priority, ScriptRef,
    SmoothingConfigId, StopReport, Timeout,
};

/// Request to run an effect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEffectRequest {
    /// Catalog name.
    pub name: String,
    /// Script to run under `name` instead of the catalog one.
    #[serde(default)]
    pub script: Option<ScriptRef>,
    /// Arguments; omitted means the definition's defaults.
    #[serde(default)]
    pub args: Option<Value>,
    /// Target priority channel.
    pub priority: Priority,
    /// Timeout in milliseconds; negative or omitted means endless.
    #[serde(default)]
    pub timeout: Timeout,
    /// Requester tag.
    #[serde(default)]
    pub origin: Option<String>,
    /// Smoothing profile.
    #[serde(default)]
    pub smoothing_cfg: Option<SmoothingConfigId>,
    /// Optional image payload.
    #[serde(default)]
    pub image_data: Option<String>,
}

impl From<RunEffectRequest> for EffectRequest {
    fn from(req: RunEffectRequest) -> Self {
        let mut request = Self::new(req.name, req.priority).with_timeout(req.timeout);
        request.script = req.script;
        request.args = req.args;
        if let Some(origin) = req.origin {
            request.origin = origin;
        }
        if let Some(cfg) = req.smoothing_cfg {
            request.smoothing_cfg = cfg;
        }
        request.image_data = req.image_data;
        request
    }
}

/// Response to a run request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunEffectResponse {
    /// New instance id.
    pub id: EffectId,
}

/// Request to clear one channel, or every channel when `priority` is absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClearRequest {
    /// Channel to clear.
    #[serde(default)]
    pub priority: Option<Priority>,
}

/// Instances evicted by a clear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearResponse {
    /// Evicted instance ids.
    pub cleared: Vec<EffectId>,
}

/// Catalog listing entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectSummary {
    /// Effect name.
    pub name: String,
    /// Script reference.
    pub script: String,
    /// Default arguments.
    pub args: Value,
}

/// Outcome of a bulk stop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopResponse {
    /// Instances that acknowledged.
    pub stopped: usize,
    /// Instances detached at the deadline.
    pub forced: usize,
    /// Milliseconds spent waiting.
    pub elapsed_ms: u64,
}

impl From<StopReport> for StopResponse {
    fn from(report: StopReport) -> Self {
        Self {
            stopped: report.stopped.len(),
            forced: report.forced.len(),
            elapsed_ms: u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Instances relaunched from the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartCachedResponse {
    /// New instance ids in cache order.
    pub started: Vec<EffectId>,
}

/// Health response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    /// Healthy flag.
    pub ok: bool,
    /// Live effects.
    pub active: usize,
    /// Catalog size.
    pub effects: usize,
}

/// Run an effect from an API request.
pub fn run_effect<E: EffectExecutor>(
    engine: &EffectEngine<E>,
    req: RunEffectRequest,
) -> Result<RunEffectResponse, String> {
    engine
        .run_effect(req.into())
        .map(|id| RunEffectResponse { id })
        .map_err(|e| e.to_string())
}

/// Clear one or all channels.
pub fn clear<E: EffectExecutor>(engine: &EffectEngine<E>, req: &ClearRequest) -> ClearResponse {
    let cleared = match req.priority {
        Some(priority) => engine.channel_cleared(priority).into_iter().collect(),
        None => engine.all_channels_cleared(),
    };
    ClearResponse { cleared }
}

/// Stop every effect and report the outcome.
pub fn stop_all<E: EffectExecutor>(engine: &EffectEngine<E>) -> Result<StopResponse, String> {
    engine
        .stop_all_effects()
        .map(StopResponse::from)
        .map_err(|e| e.to_string())
}

/// List catalog entries.
pub fn list_effects<E: EffectExecutor>(engine: &EffectEngine<E>) -> Vec<EffectSummary> {
    engine
        .get_effects()
        .into_iter()
        .map(|def| EffectSummary {
            name: def.name,
            script: def.script.0,
            args: def.args,
        })
        .collect()
}

/// Snapshot running effects, stop them all and report the outcome.
pub fn cache_running<E: EffectExecutor>(engine: &EffectEngine<E>) -> Result<StopResponse, String> {
    engine
        .cache_running_effects()
        .map(StopResponse::from)
        .map_err(|e| e.to_string())
}

/// Relaunch the effects captured by [`cache_running`].
pub fn start_cached<E: EffectExecutor>(
    engine: &EffectEngine<E>,
) -> Result<StartCachedResponse, String> {
    engine
        .start_cached_effects()
        .map(|started| StartCachedResponse { started })
        .map_err(|e| e.to_string())
}

/// List live instances. Instances already asked to stop are left out.
pub fn list_active<E: EffectExecutor>(engine: &EffectEngine<E>) -> Vec<ActiveEffect> {
    engine
        .get_active_instances()
        .into_iter()
        .filter(|instance| !instance.stopping)
        .collect()
}

/// Return a health payload.
pub fn health<E: EffectExecutor>(engine: &EffectEngine<E>) -> Health {
    Health {
        ok: true,
        active: list_active(engine).len(),
        effects: engine.get_effects().len(),
    }
}
