//! Core scheduling abstractions: definitions, instances, channels and the engine.

pub mod audit;
pub mod catalog;
pub mod definition;
pub mod effect;
pub mod engine;
pub mod error;
pub mod events;
pub mod executor;
pub mod registry;

#[cfg(test)]
pub(crate) mod test_support;

pub use audit::{build_audit_event, AuditEvent, AuditSink, InMemoryAuditSink};
pub use catalog::{EffectCatalog, EffectSource};
pub use definition::{
    ActiveEffectDefinition, ArgKind, EffectDefinition, EffectId, EffectRequest, EffectSchema,
    Priority, ScriptRef, SmoothingConfigId, Timeout, DEFAULT_ORIGIN, SYSTEM_SMOOTHING_CFG,
};
pub use effect::{Completion, Effect, EffectOutcome, EffectState};
pub use engine::{ActiveEffect, EffectEngine, StopReport};
pub use error::{AppResult, EngineError};
pub use events::{EngineEvent, EventBus};
pub use executor::{EffectExecutor, EffectLaunch, StopSignal};
pub use registry::{PriorityRegistry, ReleaseOutcome};
