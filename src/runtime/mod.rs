//! API surface for command and remote-control front ends.

pub mod api;

pub use api::{
    cache_running, clear, health, list_active, list_effects, run_effect, start_cached, stop_all,
    ClearRequest, ClearResponse, EffectSummary, Health, RunEffectRequest, RunEffectResponse,
    StartCachedResponse, StopResponse,
};
