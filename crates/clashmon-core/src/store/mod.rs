// ── Last-known-good entity store ──
//
// Holds the most recently published `EntitySnapshot` behind a `watch`
// channel. Publishing swaps the whole `Arc`; readers never observe a
// partially updated list.

mod snapshot;

use std::sync::Arc;

use tokio::sync::watch;

use crate::model::EntityDescriptor;
use crate::stream::EntityStream;

pub use snapshot::EntitySnapshot;

/// Reactive holder for the current entity snapshot.
pub struct EntityStore {
    snapshot: watch::Sender<Arc<EntitySnapshot>>,
}

impl EntityStore {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(EntitySnapshot::default()));
        Self { snapshot }
    }

    /// Replace the current snapshot with a freshly projected list.
    pub(crate) fn publish(&self, entities: Vec<EntityDescriptor>) -> Arc<EntitySnapshot> {
        self.update(|current| EntitySnapshot::new(entities, current.generation() + 1))
    }

    /// Publish a copy of the current snapshot with one entity replaced.
    pub(crate) fn replace_entity(&self, replacement: EntityDescriptor) -> Arc<EntitySnapshot> {
        self.update(|current| current.with_replaced(replacement, current.generation() + 1))
    }

    /// Derive the next snapshot from the current one under the channel lock.
    ///
    /// `send_modify` updates unconditionally, even with zero receivers.
    fn update(&self, derive: impl FnOnce(&EntitySnapshot) -> EntitySnapshot) -> Arc<EntitySnapshot> {
        let mut published = Arc::default();
        self.snapshot.send_modify(|current| {
            *current = Arc::new(derive(current));
            published = Arc::clone(current);
        });
        published
    }

    pub fn current(&self) -> Arc<EntitySnapshot> {
        self.snapshot.borrow().clone()
    }

    /// Whether at least one snapshot has been published.
    pub fn has_data(&self) -> bool {
        self.snapshot.borrow().generation() > 0
    }

    pub fn subscribe(&self) -> EntityStream {
        EntityStream::new(self.snapshot.subscribe())
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}
