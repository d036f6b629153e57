//! Capability traits for storage-backed entity types.
//!
//! # Responsibility
//! - Expose identity, soft-delete and optimistic lock behavior as small
//!   interfaces the lifecycle controller works against.
//! - Provide the delete hook seam that replaces overridable callbacks.

use crate::model::record::{value_as_flag, value_as_i64, EntityId, Record};
use crate::repo::error::{RepoError, RepoResult};
use rusqlite::types::Value;

/// Types with an integer identity scoped by entity type.
pub trait Identifiable {
    /// Concrete type name; ids are only unique within it.
    fn entity_type(&self) -> &str;

    /// Current identity.
    ///
    /// # Errors
    /// - `UnsupportedOperation` when the type declares no `id` attribute.
    /// - `InvalidData` when the id attribute holds no integer.
    fn id(&self) -> RepoResult<EntityId>;

    /// Identity as last persisted; the key used for update/delete conditions.
    ///
    /// # Errors
    /// - `UnsupportedOperation` when the type declares no `id` attribute or
    ///   the record has no persisted snapshot.
    fn old_primary_key(&self) -> RepoResult<EntityId>;
}

/// Types that may mark rows deleted instead of removing them.
pub trait SoftDeletable {
    /// True iff a flag attribute is configured and declared by the type.
    fn is_soft_delete_active(&self) -> bool;

    /// Current flag value; false when soft-delete is inactive.
    fn is_soft_deleted(&self) -> bool;
}

/// Types guarded by an optimistic lock token.
pub trait OptimisticLockable {
    fn lock_attribute(&self) -> Option<&str>;

    /// Lock value from the persisted snapshot.
    fn old_lock_value(&self) -> Option<&Value>;
}

/// Callbacks run around a delete.
pub trait DeleteHooks {
    /// Returning `Ok(false)` vetoes the delete.
    fn before_delete(&self, _record: &Record) -> RepoResult<bool> {
        Ok(true)
    }

    fn after_delete(&self, _record: &Record) {}
}

/// Hooks that never veto and do nothing afterwards.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl DeleteHooks for NoopHooks {}

impl Identifiable for Record {
    fn entity_type(&self) -> &str {
        self.schema().entity_type()
    }

    fn id(&self) -> RepoResult<EntityId> {
        let attribute = require_id_attribute(self)?;
        value_as_i64(self.get(attribute)).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "{} has no integer `{attribute}` value",
                self.entity_type()
            ))
        })
    }

    fn old_primary_key(&self) -> RepoResult<EntityId> {
        let attribute = require_id_attribute(self)?;
        let old = self.old_attributes().ok_or_else(|| {
            RepoError::UnsupportedOperation(format!(
                "{} is not persisted or has been deleted",
                self.entity_type()
            ))
        })?;
        value_as_i64(old.get(attribute)).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "{} snapshot has no integer `{attribute}` value",
                self.entity_type()
            ))
        })
    }
}

impl SoftDeletable for Record {
    fn is_soft_delete_active(&self) -> bool {
        self.schema().is_soft_delete_active()
    }

    fn is_soft_deleted(&self) -> bool {
        match self.schema().soft_delete_attribute() {
            Some(attribute) => value_as_flag(self.get(attribute)),
            None => false,
        }
    }
}

impl OptimisticLockable for Record {
    fn lock_attribute(&self) -> Option<&str> {
        self.schema().lock_attribute()
    }

    fn old_lock_value(&self) -> Option<&Value> {
        self.lock_attribute()
            .and_then(|attribute| self.old_attribute(attribute))
    }
}

fn require_id_attribute(record: &Record) -> RepoResult<&str> {
    record.schema().id_attribute().ok_or_else(|| {
        RepoError::UnsupportedOperation(format!(
            "{} does not declare an `id` attribute",
            record.schema().entity_type()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::{Identifiable, OptimisticLockable, SoftDeletable};
    use crate::model::record::{Attributes, Record};
    use crate::model::schema::EntitySchema;
    use crate::repo::error::RepoError;
    use rusqlite::types::Value;
    use std::sync::Arc;

    fn persisted(schema: EntitySchema, values: &[(&str, Value)]) -> Record {
        let attributes: Attributes = values
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        Record::from_persisted(Arc::new(schema), attributes)
    }

    #[test]
    fn id_access_fails_for_types_without_id() {
        let schema = EntitySchema::builder("audit_line", "audit_lines")
            .attributes(["message"])
            .without_id()
            .build()
            .unwrap();
        let record = persisted(schema, &[("message", Value::Text("x".to_string()))]);

        assert!(matches!(
            record.id(),
            Err(RepoError::UnsupportedOperation(_))
        ));
        assert!(matches!(
            record.old_primary_key(),
            Err(RepoError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn old_primary_key_requires_snapshot() {
        let schema = EntitySchema::builder("post", "posts")
            .attributes(["id"])
            .build()
            .unwrap();
        let mut record = persisted(schema, &[("id", Value::Integer(3))]);
        assert_eq!(record.old_primary_key().unwrap(), 3);

        record.clear_old_attributes();
        assert_eq!(record.id().unwrap(), 3);
        assert!(matches!(
            record.old_primary_key(),
            Err(RepoError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn soft_deleted_is_false_when_flag_not_declared() {
        let schema = EntitySchema::builder("tag", "tags")
            .attributes(["id"])
            .build()
            .unwrap();
        let record = persisted(schema, &[("id", Value::Integer(1))]);
        assert!(!record.is_soft_delete_active());
        assert!(!record.is_soft_deleted());
    }

    #[test]
    fn lock_value_comes_from_snapshot() {
        let schema = EntitySchema::builder("post", "posts")
            .attributes(["id", "version"])
            .lock_attribute("version")
            .build()
            .unwrap();
        let mut record = persisted(
            schema,
            &[("id", Value::Integer(1)), ("version", Value::Integer(4))],
        );
        record.set("version", 5_i64).unwrap();

        assert_eq!(record.lock_attribute(), Some("version"));
        assert_eq!(record.old_lock_value(), Some(&Value::Integer(4)));
    }
}
