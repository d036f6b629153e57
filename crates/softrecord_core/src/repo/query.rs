//! Persistence query collaborator contract.
//!
//! # Responsibility
//! - Define the bulk-fetch, conditional update, hard delete and insert
//!   operations the cache and lifecycle layers depend on.
//! - Describe update/delete targets with a storage-neutral `Condition`.
//!
//! # Invariants
//! - A `Condition` is a conjunction of attribute equality predicates.
//! - `NULL` expected values match stored `NULL`s.

use crate::model::capability::{Identifiable, OptimisticLockable};
use crate::model::record::{Attributes, EntityId, Record};
use crate::model::schema::EntitySchema;
use crate::repo::error::{RepoError, RepoResult};
use rusqlite::types::Value;
use std::sync::Arc;

/// Conjunction of `attribute == value` predicates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Condition {
    predicates: Vec<(String, Value)>,
}

impl Condition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one equality predicate.
    pub fn and_eq(mut self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.predicates.push((attribute.into(), value.into()));
        self
    }

    /// Targets the stored row behind `record`: `id = <old id>`, plus
    /// `lock = <old lock>` when the type declares a lock attribute.
    ///
    /// # Errors
    /// - `UnsupportedOperation` when the record has no identity or no
    ///   persisted snapshot.
    pub fn for_persisted(record: &Record) -> RepoResult<Self> {
        let id = record.old_primary_key()?;
        let Some(id_attribute) = record.schema().id_attribute() else {
            return Err(RepoError::UnsupportedOperation(format!(
                "{} does not declare an `id` attribute",
                record.entity_type()
            )));
        };

        let mut condition = Self::new().and_eq(id_attribute, id);
        if let Some(lock_attribute) = record.lock_attribute() {
            let expected = record.old_lock_value().cloned().unwrap_or(Value::Null);
            condition = condition.and_eq(lock_attribute, expected);
        }
        Ok(condition)
    }

    pub fn predicates(&self) -> &[(String, Value)] {
        &self.predicates
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}

/// Storage operations consumed by the loader and the lifecycle controller.
pub trait PersistenceQuery {
    /// Fetches every stored row whose id is in `ids`, in one query.
    ///
    /// Ids without a row are simply absent from the result.
    fn find_all_by_ids(
        &self,
        schema: &Arc<EntitySchema>,
        ids: &[EntityId],
    ) -> RepoResult<Vec<Record>>;

    /// Writes `values` to every row matching `condition`.
    ///
    /// Returns the number of rows updated.
    fn update_by_condition(
        &self,
        schema: &EntitySchema,
        condition: &Condition,
        values: &Attributes,
    ) -> RepoResult<usize>;

    /// Physically removes the stored row behind `record`.
    ///
    /// Returns the number of rows removed. Lock-guarded types fail with
    /// `StaleObject` when no row matched.
    fn hard_delete(&self, record: &Record) -> RepoResult<usize>;

    /// Stores a new record and refreshes its persisted snapshot.
    ///
    /// Returns the stored identity.
    fn insert(&self, record: &mut Record) -> RepoResult<EntityId>;
}
