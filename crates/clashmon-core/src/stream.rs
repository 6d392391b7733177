// ── Reactive entity streams ──
//
// Subscription handle for consuming published entity snapshots.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::store::EntitySnapshot;

/// A subscription to the coordinator's published entities.
///
/// Provides both point-in-time access and change notification via
/// `changed()` or by converting into a `Stream`.
pub struct EntityStream {
    current: Arc<EntitySnapshot>,
    receiver: watch::Receiver<Arc<EntitySnapshot>>,
}

impl EntityStream {
    pub(crate) fn new(receiver: watch::Receiver<Arc<EntitySnapshot>>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The snapshot captured at creation or at the last `changed()`.
    pub fn current(&self) -> &Arc<EntitySnapshot> {
        &self.current
    }

    /// The latest published snapshot.
    pub fn latest(&self) -> Arc<EntitySnapshot> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next publish. `None` once the coordinator is dropped.
    pub async fn changed(&mut self) -> Option<Arc<EntitySnapshot>> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = Arc::clone(&snap);
        Some(snap)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> EntityWatchStream {
        EntityWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter yielding each published snapshot.
pub struct EntityWatchStream {
    inner: WatchStream<Arc<EntitySnapshot>>,
}

impl Stream for EntityWatchStream {
    type Item = Arc<EntitySnapshot>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio_test::{assert_pending, assert_ready, task};

    use crate::model::{EntityDescriptor, EntityType};
    use crate::store::EntityStore;

    fn memory() -> Vec<EntityDescriptor> {
        vec![EntityDescriptor::new("Memory Used", EntityType::MemorySensor)]
    }

    #[test]
    fn watch_stream_yields_current_then_each_publish() {
        let store = EntityStore::new();
        let mut stream = task::spawn(store.subscribe().into_stream());

        let initial = assert_ready!(stream.poll_next()).unwrap();
        assert_eq!(initial.generation(), 0);
        assert_pending!(stream.poll_next());

        store.publish(memory());
        assert!(stream.is_woken());
        let next = assert_ready!(stream.poll_next()).unwrap();
        assert_eq!(next.generation(), 1);
        assert_eq!(next.len(), 1);
    }

    #[tokio::test]
    async fn changed_tracks_the_current_snapshot() {
        let store = EntityStore::new();
        let mut stream = store.subscribe();
        assert_eq!(stream.current().generation(), 0);

        store.publish(memory());
        store.publish(memory());

        // Intermediate publishes collapse into the latest one
        let snap = stream.changed().await.unwrap();
        assert_eq!(snap.generation(), 2);
        assert_eq!(stream.current().generation(), 2);
        assert_eq!(stream.latest().generation(), 2);
    }

    #[tokio::test]
    async fn changed_ends_when_the_store_is_dropped() {
        let store = EntityStore::new();
        let mut stream = store.subscribe();
        drop(store);
        assert!(stream.changed().await.is_none());
    }
}
