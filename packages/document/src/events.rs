//! # Change notifications
//!
//! Plugins and renderers learn about edits through `DocumentEvent`s.
//!
//! Events are queued while a collection guard is held and dispatched, in the
//! order they were raised, only after the guard has released the collection
//! lock. An observer may therefore take the lock again and edit the document
//! from inside its callback.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::keys::BlockKey;

/// Structural change to the block sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectionChange {
    Inserted { index: usize, key: BlockKey },
    Removed { index: usize, key: BlockKey },
    Cleared,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentEvent {
    /// Raised on every text mutation, including ones that leave the text as it was
    TextChanged { key: BlockKey, version: u64 },

    TypeChanged {
        key: BlockKey,
        old: String,
        new: String,
    },

    ParentChanged {
        key: BlockKey,
        old: Option<BlockKey>,
        new: Option<BlockKey>,
    },

    CollectionChanged(CollectionChange),
}

impl DocumentEvent {
    /// The block the event is about, if it concerns a single block
    pub fn key(&self) -> Option<BlockKey> {
        match self {
            DocumentEvent::TextChanged { key, .. }
            | DocumentEvent::TypeChanged { key, .. }
            | DocumentEvent::ParentChanged { key, .. } => Some(*key),
            DocumentEvent::CollectionChanged(CollectionChange::Inserted { key, .. })
            | DocumentEvent::CollectionChanged(CollectionChange::Removed { key, .. }) => Some(*key),
            DocumentEvent::CollectionChanged(CollectionChange::Cleared) => None,
        }
    }
}

/// Receiver of document events
pub trait DocumentObserver: Send + Sync {
    fn on_event(&self, event: &DocumentEvent);
}

impl<F> DocumentObserver for F
where
    F: Fn(&DocumentEvent) + Send + Sync,
{
    fn on_event(&self, event: &DocumentEvent) {
        self(event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Ordered list of observers
#[derive(Default)]
pub struct ObserverList {
    next_id: Mutex<u64>,
    observers: RwLock<Vec<(ObserverId, Arc<dyn DocumentObserver>)>>,
}

impl ObserverList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, observer: Arc<dyn DocumentObserver>) -> ObserverId {
        let id = {
            let mut next = self.next_id.lock();
            *next += 1;
            ObserverId(*next)
        };
        self.observers.write().push((id, observer));
        id
    }

    /// Returns false if the id was not registered
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver events in order to every observer, in registration order
    pub fn dispatch(&self, events: &[DocumentEvent]) {
        if events.is_empty() {
            return;
        }
        // Snapshot so observers can subscribe or unsubscribe while being notified
        let observers: Vec<_> = self
            .observers
            .read()
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();

        tracing::debug!(events = events.len(), observers = observers.len(), "Dispatching document events");
        for event in events {
            for observer in &observers {
                observer.on_event(event);
            }
        }
    }
}

impl fmt::Debug for ObserverList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverList")
            .field("observers", &self.len())
            .finish()
    }
}

/// Events raised under a lock and not yet delivered
#[derive(Debug, Default)]
pub(crate) struct EventQueue {
    pending: Mutex<Vec<DocumentEvent>>,
}

impl EventQueue {
    pub(crate) fn push(&self, event: DocumentEvent) {
        self.pending.lock().push(event);
    }

    pub(crate) fn extend(&self, events: impl IntoIterator<Item = DocumentEvent>) {
        self.pending.lock().extend(events);
    }

    pub(crate) fn take(&self) -> Vec<DocumentEvent> {
        std::mem::take(&mut *self.pending.lock())
    }
}
