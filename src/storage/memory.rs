//! In-memory knowledge store.

use crate::Result;
use crate::models::{KnowledgeObject, ObjectFilter, ObjectId};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, PoisonError, RwLock};

use super::next_created_at;
use super::traits::KnowledgeStore;

/// Knowledge store held entirely in memory.
///
/// Used by tests and by callers that embed the engine next to their own
/// persistence. Lock poisoning is recovered from, since every mutation leaves
/// the map in a consistent state.
///
/// # Example
///
/// ```rust
/// use regdedup::models::{KnowledgeObject, ObjectFilter};
/// use regdedup::storage::{InMemoryStore, KnowledgeStore};
///
/// let store = InMemoryStore::new();
/// let created = store.create(KnowledgeObject::new("draft", "Retain records for five years"));
/// assert_ne!(created.id.as_str(), "draft");
/// assert_eq!(store.count(&ObjectFilter::default())?, 1);
/// # Ok::<(), regdedup::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    objects: RwLock<BTreeMap<ObjectId, KnowledgeObject>>,
    last_created_at: Mutex<Option<DateTime<Utc>>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with `objects`, keeping their ids and timestamps.
    #[must_use]
    pub fn with_objects(objects: impl IntoIterator<Item = KnowledgeObject>) -> Self {
        let store = Self::new();
        for object in objects {
            store.insert(object);
        }
        store
    }

    /// Inserts an object as-is, replacing any object with the same id.
    pub fn insert(&self, object: KnowledgeObject) -> Option<KnowledgeObject> {
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(object.id.clone(), object)
    }

    /// Stores `draft` under a fresh id and a monotonic creation timestamp.
    pub fn create(&self, mut draft: KnowledgeObject) -> KnowledgeObject {
        let created_at = {
            let mut last = self
                .last_created_at
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let next = next_created_at(*last);
            *last = Some(next);
            next
        };
        draft.id = ObjectId::generate();
        draft.created_at = created_at;
        draft.updated_at = created_at;
        self.insert(draft.clone());
        draft
    }

    /// Returns the object with `id`.
    #[must_use]
    pub fn get(&self, id: &ObjectId) -> Option<KnowledgeObject> {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Returns the number of stored objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KnowledgeStore for InMemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn list_objects(&self, filter: &ObjectFilter) -> Result<Vec<KnowledgeObject>> {
        Ok(self
            .objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|object| filter.matches(object))
            .cloned()
            .collect())
    }

    #[allow(clippy::significant_drop_tightening)]
    fn remove_objects(&self, ids: &BTreeSet<ObjectId>) -> Result<usize> {
        let mut objects = self.objects.write().unwrap_or_else(PoisonError::into_inner);
        Ok(ids.iter().filter(|id| objects.remove(*id).is_some()).count())
    }

    fn count(&self, filter: &ObjectFilter) -> Result<usize> {
        Ok(self
            .objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|object| filter.matches(object))
            .count())
    }
}
