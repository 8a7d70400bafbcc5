//! Priority channel ownership.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{Effect, EffectId, Priority};

/// Result of releasing a channel on completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The finished instance owned the channel and was removed.
    Released,
    /// The channel is owned by someone else or nobody; nothing changed.
    Stale,
}

/// Map from priority channel to its single live owner.
#[derive(Debug, Default)]
pub struct PriorityRegistry {
    owners: BTreeMap<Priority, Arc<Effect>>,
}

impl PriorityRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `effect` the owner of `priority`.
    ///
    /// A previous owner is asked to stop and returned without waiting for it.
    pub fn admit(&mut self, priority: Priority, effect: Arc<Effect>) -> Option<Arc<Effect>> {
        let evicted = self.owners.insert(priority, effect);
        if let Some(prior) = &evicted {
            prior.request_stop();
        }
        evicted
    }

    /// Drop the mapping for `priority` if `id` still owns it.
    pub fn release(&mut self, priority: Priority, id: EffectId) -> ReleaseOutcome {
        match self.owners.get(&priority) {
            Some(owner) if owner.id() == id => {
                self.owners.remove(&priority);
                ReleaseOutcome::Released
            }
            _ => ReleaseOutcome::Stale,
        }
    }

    /// Evict and remove the owner of `priority`, if any.
    pub fn clear(&mut self, priority: Priority) -> Option<Arc<Effect>> {
        let evicted = self.owners.remove(&priority);
        if let Some(prior) = &evicted {
            prior.request_stop();
        }
        evicted
    }

    /// Current owner of `priority`.
    #[must_use]
    pub fn owner(&self, priority: Priority) -> Option<&Arc<Effect>> {
        self.owners.get(&priority)
    }

    /// Owned priorities in ascending order.
    #[must_use]
    pub fn priorities(&self) -> Vec<Priority> {
        self.owners.keys().copied().collect()
    }

    /// Number of owned channels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    /// Whether no channel is owned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}
