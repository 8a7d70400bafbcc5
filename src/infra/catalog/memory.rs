//! In-memory catalog source with change notification.

use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;

use crate::core::{EffectDefinition, EffectSource, EngineError};

/// Catalog source backed by a vector, for development, tests and hosts that
/// push definitions themselves.
#[derive(Debug, Default)]
pub struct InMemoryEffectSource {
    effects: Mutex<Vec<EffectDefinition>>,
    watchers: Mutex<Vec<Sender<()>>>,
}

impl InMemoryEffectSource {
    /// Create a source holding `effects`.
    #[must_use]
    pub fn new(effects: Vec<EffectDefinition>) -> Self {
        Self {
            effects: Mutex::new(effects),
            watchers: Mutex::new(Vec::new()),
        }
    }

    /// Replace all definitions and notify watchers.
    pub fn replace(&self, effects: Vec<EffectDefinition>) {
        *self.effects.lock() = effects;
        self.notify();
    }

    /// Add or overwrite one definition and notify watchers.
    pub fn upsert(&self, effect: EffectDefinition) {
        {
            let mut effects = self.effects.lock();
            match effects.iter_mut().find(|e| e.name == effect.name) {
                Some(slot) => *slot = effect,
                None => effects.push(effect),
            }
        }
        self.notify();
    }

    /// Remove a definition by name and notify watchers. Returns whether it existed.
    pub fn remove(&self, name: &str) -> bool {
        let removed = {
            let mut effects = self.effects.lock();
            let before = effects.len();
            effects.retain(|e| e.name != name);
            effects.len() != before
        };
        if removed {
            self.notify();
        }
        removed
    }

    fn notify(&self) {
        // Watchers whose engine went away are dropped.
        self.watchers
            .lock()
            .retain(|tx| !matches!(tx.try_send(()), Err(TrySendError::Disconnected(()))));
    }
}

impl EffectSource for InMemoryEffectSource {
    fn load(&self) -> Result<Vec<EffectDefinition>, EngineError> {
        Ok(self.effects.lock().clone())
    }

    fn watch(&self) -> Option<Receiver<()>> {
        // One pending tick is enough: a reload always reads the latest list.
        let (tx, rx) = crossbeam_channel::bounded(1);
        self.watchers.lock().push(tx);
        Some(rx)
    }
}
