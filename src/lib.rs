//! # Effect Engine
//!
//! A priority-channel scheduler for scripted lighting effects.
//!
//! The engine admits named, parameterized effects onto integer priority
//! channels, runs each one on its own execution thread, and keeps exactly one
//! owner per channel. It can snapshot every running effect, stop them all
//! within a bounded time, and later resume identical effects.
//!
//! ## Core Problem Solved
//!
//! - **Channel ownership**: admitting an effect on an owned channel evicts
//!   the previous owner without blocking the caller
//! - **Completion vs. cancellation**: each effect reports exactly one terminal
//!   outcome over a message channel, and stale reports from evicted effects
//!   never disturb a newer owner
//! - **Bounded shutdown**: bulk stops wait on a counter with a deadline, so
//!   effects that ignore the stop request cannot hang the caller
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use effect_engine::builders::EngineBuilder;
//! use effect_engine::core::{EffectDefinition, EffectRequest, Timeout};
//! use std::time::Duration;
//!
//! let engine = EngineBuilder::new(my_executor) // implements EffectExecutor
//!     .with_effects(vec![EffectDefinition::new("rainbow", "rainbow.py")])
//!     .build()?;
//!
//! let id = engine.run_effect(
//!     EffectRequest::new("rainbow", 50).with_timeout(Timeout::after(Duration::from_secs(30))),
//! )?;
//!
//! // Pause everything, then bring the same effects back.
//! engine.cache_running_effects()?;
//! engine.start_cached_effects()?;
//!
//! engine.shutdown();
//! ```
//!
//! For complete examples, see:
//! - `tests/engine_test.rs` - admission, eviction and completion
//! - `tests/shutdown_test.rs` - bounded bulk stop and cache/resume

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling abstractions: definitions, instances, channels and the engine.
pub mod core;
/// Configuration models for the engine.
pub mod config;
/// Builders to construct an engine from configuration.
pub mod builders;
/// Infrastructure adapters for catalog sources.
pub mod infra;
/// API surface for command front ends.
pub mod runtime;
/// Shared utilities.
pub mod util;
