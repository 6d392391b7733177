// ── Published entity snapshot ──
//
// An immutable, indexed entity list. Each successful cycle publishes a
// fresh one; nothing inside is ever mutated after construction.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::model::EntityDescriptor;

/// One published generation of entities, indexed by unique id and name.
#[derive(Debug, Clone, Default)]
pub struct EntitySnapshot {
    entities: Vec<Arc<EntityDescriptor>>,
    by_unique_id: HashMap<String, usize>,
    /// First occurrence wins when two entities share a display name.
    by_name: HashMap<String, usize>,
    published_at: Option<DateTime<Utc>>,
    generation: u64,
}

impl EntitySnapshot {
    pub(crate) fn new(entities: Vec<EntityDescriptor>, generation: u64) -> Self {
        let entities: Vec<Arc<EntityDescriptor>> = entities.into_iter().map(Arc::new).collect();

        let mut by_unique_id = HashMap::with_capacity(entities.len());
        let mut by_name = HashMap::with_capacity(entities.len());
        for (idx, entity) in entities.iter().enumerate() {
            by_unique_id.entry(entity.unique_id.clone()).or_insert(idx);
            by_name.entry(entity.name.clone()).or_insert(idx);
        }

        Self {
            entities,
            by_unique_id,
            by_name,
            published_at: Some(Utc::now()),
            generation,
        }
    }

    pub fn entities(&self) -> &[Arc<EntityDescriptor>] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn get_by_unique_id(&self, unique_id: &str) -> Option<Arc<EntityDescriptor>> {
        self.by_unique_id
            .get(unique_id)
            .and_then(|&idx| self.entities.get(idx))
            .map(Arc::clone)
    }

    pub fn get_by_name(&self, name: &str) -> Option<Arc<EntityDescriptor>> {
        self.by_name
            .get(name)
            .and_then(|&idx| self.entities.get(idx))
            .map(Arc::clone)
    }

    /// When this generation was built. `None` only for the initial empty snapshot.
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.published_at
    }

    /// Monotonic publish counter, `0` before the first publish.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// A new generation with one entity swapped for `replacement`
    /// (matched by unique id). Other entities are shared, not copied.
    pub(crate) fn with_replaced(&self, replacement: EntityDescriptor, generation: u64) -> Self {
        let mut next = self.clone();
        if let Some(&idx) = self.by_unique_id.get(&replacement.unique_id) {
            if let Some(slot) = next.entities.get_mut(idx) {
                *slot = Arc::new(replacement);
            }
        }
        next.published_at = Some(Utc::now());
        next.generation = generation;
        next
    }
}
