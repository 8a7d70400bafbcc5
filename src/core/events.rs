//! Observable engine notifications.

use tokio::sync::broadcast;

use super::{EffectId, EffectOutcome, Priority};

/// Notification published to engine subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The set of active effects changed.
    EffectListChanged,
    /// A bulk stop finished.
    StopCompleted,
    /// An instance reached a terminal state.
    EffectFinished {
        /// Finished instance.
        id: EffectId,
        /// Channel it was admitted on.
        priority: Priority,
        /// How it ended.
        outcome: EffectOutcome,
    },
    /// The catalog was reloaded.
    CatalogUpdated {
        /// Definitions now available.
        count: usize,
    },
}

/// Fan-out of engine events. Slow subscribers lag rather than block the engine.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    /// Create a bus retaining up to `capacity` undelivered events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    /// Publish an event; dropped silently when nobody listens.
    pub fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}
