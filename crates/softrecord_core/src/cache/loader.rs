//! Batch entity loader backed by the identity map.
//!
//! # Responsibility
//! - Resolve a set of ids to shared records, serving hits from the cache and
//!   fetching all misses with a single bulk query.
//!
//! # Invariants
//! - At most one `find_all_by_ids` call per load, and none when every id hits.
//! - Unresolved ids are absent from the result, never placeholders.
//! - `NotFound.missing_ids` is exactly `requested - resolved`, ascending.
//! - Cache insertion is the only shared-state mutation.

use crate::cache::identity_map::EntityCache;
use crate::model::capability::Identifiable;
use crate::model::record::{EntityId, SharedRecord};
use crate::model::schema::EntitySchema;
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::query::PersistenceQuery;
use log::debug;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Loads records of one entity type through a request-scoped cache.
pub struct EntityLoader<'a, Q: PersistenceQuery> {
    query: &'a Q,
    cache: &'a EntityCache,
    schema: Arc<EntitySchema>,
}

impl<'a, Q: PersistenceQuery> EntityLoader<'a, Q> {
    pub fn new(query: &'a Q, cache: &'a EntityCache, schema: Arc<EntitySchema>) -> Self {
        Self {
            query,
            cache,
            schema,
        }
    }

    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    /// Resolves `ids` to records, optionally failing on unresolved ids.
    ///
    /// # Errors
    /// - `NotFound` when `throw_on_missing` is set and some ids stay
    ///   unresolved.
    /// - `UnsupportedOperation` when the type declares no `id` attribute.
    /// - Collaborator errors from the bulk fetch, unchanged.
    pub fn load_by_ids<I>(
        &self,
        ids: I,
        throw_on_missing: bool,
    ) -> RepoResult<BTreeMap<EntityId, SharedRecord>>
    where
        I: IntoIterator<Item = EntityId>,
    {
        let entity_type = self.schema.entity_type();
        if self.schema.id_attribute().is_none() {
            return Err(RepoError::UnsupportedOperation(format!(
                "{entity_type} does not declare an `id` attribute"
            )));
        }

        let requested: BTreeSet<EntityId> = ids.into_iter().collect();
        let mut loaded = BTreeMap::new();
        let mut misses = BTreeSet::new();
        for id in &requested {
            match self.cache.get(entity_type, *id) {
                Some(record) => {
                    loaded.insert(*id, record);
                }
                None => {
                    misses.insert(*id);
                }
            }
        }
        let hits = loaded.len();

        let mut fetched = 0_usize;
        if !misses.is_empty() {
            let miss_ids: Vec<EntityId> = misses.iter().copied().collect();
            for record in self.query.find_all_by_ids(&self.schema, &miss_ids)? {
                let id = record.id()?;
                if !misses.contains(&id) || loaded.contains_key(&id) {
                    continue;
                }
                let shared = self.cache.insert(entity_type, id, record);
                loaded.insert(id, shared);
                fetched += 1;
            }
        }

        let missing_ids: Vec<EntityId> = requested
            .iter()
            .filter(|id| !loaded.contains_key(*id))
            .copied()
            .collect();

        debug!(
            "event=entity_load module=cache status=ok entity_type={} requested={} hits={} fetched={} missing={}",
            entity_type,
            requested.len(),
            hits,
            fetched,
            missing_ids.len()
        );

        if throw_on_missing && !missing_ids.is_empty() {
            return Err(RepoError::NotFound {
                entity_type: entity_type.to_string(),
                missing_ids,
            });
        }

        Ok(loaded)
    }

    /// Strict batch load: every id must resolve.
    pub fn get_by_ids<I>(&self, ids: I) -> RepoResult<BTreeMap<EntityId, SharedRecord>>
    where
        I: IntoIterator<Item = EntityId>,
    {
        self.load_by_ids(ids, true)
    }

    /// Strict single load.
    pub fn get_by_id(&self, id: EntityId) -> RepoResult<SharedRecord> {
        self.get_by_ids([id])?
            .remove(&id)
            .ok_or_else(|| RepoError::NotFound {
                entity_type: self.schema.entity_type().to_string(),
                missing_ids: vec![id],
            })
    }
}
