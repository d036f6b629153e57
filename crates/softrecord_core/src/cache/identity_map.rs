//! Request-scoped identity map.
//!
//! # Responsibility
//! - Hold one shared record handle per `(entity type, id)`.
//!
//! # Invariants
//! - Keys are disambiguated by entity type; equal ids of different types
//!   never collide.
//! - Entries are never evicted; the map lives exactly as long as its owner.
//! - The map is `!Sync`; one cache belongs to one execution scope.

use crate::model::record::{EntityId, Record, SharedRecord};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Identity map owned by one request or unit of work.
#[derive(Debug, Default)]
pub struct EntityCache {
    entries: RefCell<HashMap<String, HashMap<EntityId, SharedRecord>>>,
}

impl EntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached handle for `(entity_type, id)`.
    pub fn get(&self, entity_type: &str, id: EntityId) -> Option<SharedRecord> {
        self.entries
            .borrow()
            .get(entity_type)
            .and_then(|by_id| by_id.get(&id))
            .map(Rc::clone)
    }

    pub fn contains(&self, entity_type: &str, id: EntityId) -> bool {
        self.entries
            .borrow()
            .get(entity_type)
            .is_some_and(|by_id| by_id.contains_key(&id))
    }

    /// Stores `record` under `(entity_type, id)` and returns its shared handle.
    ///
    /// An existing entry for the same key is replaced.
    pub fn insert(&self, entity_type: &str, id: EntityId, record: Record) -> SharedRecord {
        let shared = record.into_shared();
        self.entries
            .borrow_mut()
            .entry(entity_type.to_string())
            .or_default()
            .insert(id, Rc::clone(&shared));
        shared
    }

    /// Total number of cached records across all types.
    pub fn len(&self) -> usize {
        self.entries.borrow().values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
