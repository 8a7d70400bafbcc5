//! Builder assembling an [`EffectEngine`] from configuration and collaborators.

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::core::engine::EngineParts;
use crate::core::{AuditSink, EffectDefinition, EffectEngine, EffectExecutor, EffectSource, EngineError};

/// Builder for [`EffectEngine`].
pub struct EngineBuilder<E: EffectExecutor> {
    config: EngineConfig,
    executor: E,
    effects: Vec<EffectDefinition>,
    source: Option<Arc<dyn EffectSource>>,
    audit: Option<Box<dyn AuditSink>>,
}

impl<E: EffectExecutor> EngineBuilder<E> {
    /// Start from default configuration and an empty catalog.
    pub fn new(executor: E) -> Self {
        Self {
            config: EngineConfig::default(),
            executor,
            effects: Vec::new(),
            source: None,
            audit: None,
        }
    }

    /// Use `config` instead of the defaults.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Seed the catalog with fixed definitions. Ignored when a source is set.
    #[must_use]
    pub fn with_effects(mut self, effects: Vec<EffectDefinition>) -> Self {
        self.effects = effects;
        self
    }

    /// Load the catalog from `source` and follow its change notifications.
    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn EffectSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Record lifecycle actions into `audit`.
    #[must_use]
    pub fn with_audit(mut self, audit: Box<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Validate configuration, load the catalog and start the engine.
    ///
    /// # Errors
    ///
    /// - `EngineError::InvalidConfig` if the configuration is invalid
    /// - `EngineError::Catalog` if the source fails its initial load
    pub fn build(self) -> Result<EffectEngine<E>, EngineError> {
        self.config.validate().map_err(EngineError::InvalidConfig)?;

        let effects = match &self.source {
            Some(source) => source.load()?,
            None => self.effects,
        };

        EffectEngine::from_parts(EngineParts {
            config: self.config,
            executor: self.executor,
            effects,
            source: self.source,
            audit: self.audit,
        })
    }
}
