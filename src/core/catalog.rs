//! Catalog of available effect definitions.
//!
//! The catalog is swapped wholesale on every refresh. Readers hold an `Arc`
//! to the list they observed, so a concurrent refresh never exposes a
//! partially updated catalog.

use std::collections::HashSet;
use std::sync::Arc;

use crossbeam_channel::Receiver;
use parking_lot::RwLock;
use tracing::warn;

use crate::core::{EffectDefinition, EngineError};

/// Loader that discovers effect definitions from storage.
pub trait EffectSource: Send + Sync {
    /// Load the current list of definitions.
    fn load(&self) -> Result<Vec<EffectDefinition>, EngineError>;

    /// Channel ticking whenever the underlying definitions changed.
    fn watch(&self) -> Option<Receiver<()>> {
        None
    }
}

/// Read-mostly list of effect definitions.
#[derive(Debug, Default)]
pub struct EffectCatalog {
    effects: RwLock<Arc<Vec<EffectDefinition>>>,
}

impl EffectCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog holding `effects`.
    #[must_use]
    pub fn with_effects(effects: Vec<EffectDefinition>) -> Self {
        let catalog = Self::new();
        catalog.replace(effects);
        catalog
    }

    /// Copy of the current definitions.
    #[must_use]
    pub fn get_effects(&self) -> Vec<EffectDefinition> {
        self.snapshot().as_ref().clone()
    }

    /// Shared handle to the current definitions.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Vec<EffectDefinition>> {
        Arc::clone(&self.effects.read())
    }

    /// Look up a definition by name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<EffectDefinition> {
        self.effects.read().iter().find(|d| d.name == name).cloned()
    }

    /// Number of definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.effects.read().len()
    }

    /// Whether the catalog holds no definitions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.effects.read().is_empty()
    }

    /// Atomically replace the whole catalog, returning the stored count.
    ///
    /// Later definitions sharing a name with an earlier one are dropped.
    pub fn replace(&self, effects: Vec<EffectDefinition>) -> usize {
        let mut seen = HashSet::with_capacity(effects.len());
        let unique: Vec<EffectDefinition> = effects
            .into_iter()
            .filter(|def| {
                let fresh = seen.insert(def.name.clone());
                if !fresh {
                    warn!(effect = %def.name, file = ?def.file, "duplicate effect name ignored");
                }
                fresh
            })
            .collect();
        let count = unique.len();
        *self.effects.write() = Arc::new(unique);
        count
    }
}
