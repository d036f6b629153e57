//! Attribute-backed entity record.
//!
//! # Responsibility
//! - Hold current attribute values for one row of a configured entity type.
//! - Keep the last persisted snapshot used for primary-key conditions,
//!   optimistic lock checks and dirty tracking.
//! - Own the validation error store filled by external validators.
//!
//! # Invariants
//! - Only attributes declared by the schema can be set.
//! - `old_attributes == None` means the record is new or no longer reflects a
//!   stored row (deleted).

use crate::model::schema::EntitySchema;
use crate::repo::error::{RepoError, RepoResult};
use crate::validation::errors::ValidationErrors;
use rusqlite::types::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;

/// Integer identity, unique within one entity type.
pub type EntityId = i64;

/// Attribute name -> value mapping.
pub type Attributes = BTreeMap<String, Value>;

/// Record handle shared by every holder within one request scope.
pub type SharedRecord = Rc<RefCell<Record>>;

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    schema: Arc<EntitySchema>,
    attributes: Attributes,
    old_attributes: Option<Attributes>,
    errors: ValidationErrors,
}

impl Record {
    /// Creates a new, not yet persisted record with no attribute values.
    pub fn new(schema: Arc<EntitySchema>) -> Self {
        Self {
            schema,
            attributes: Attributes::new(),
            old_attributes: None,
            errors: ValidationErrors::new(),
        }
    }

    /// Creates a record mirroring a stored row.
    ///
    /// The snapshot starts equal to `attributes`. Undeclared attributes are
    /// dropped.
    pub fn from_persisted(schema: Arc<EntitySchema>, attributes: Attributes) -> Self {
        let attributes: Attributes = attributes
            .into_iter()
            .filter(|(name, _)| schema.has_attribute(name))
            .collect();
        Self {
            schema,
            old_attributes: Some(attributes.clone()),
            attributes,
            errors: ValidationErrors::new(),
        }
    }

    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    /// Shared schema handle, for building sibling records of the same type.
    pub fn schema_handle(&self) -> Arc<EntitySchema> {
        Arc::clone(&self.schema)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Sets one declared attribute.
    ///
    /// # Errors
    /// - `UnsupportedOperation` when the schema does not declare `name`.
    /// - `UnsupportedOperation` when `name` is the id attribute of a
    ///   persisted record; ids are immutable once stored.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> RepoResult<()> {
        if !self.schema.has_attribute(name) {
            return Err(RepoError::UnsupportedOperation(format!(
                "{} has no attribute `{name}`",
                self.schema.entity_type()
            )));
        }
        if self.old_attributes.is_some() && self.schema.id_attribute() == Some(name) {
            return Err(RepoError::UnsupportedOperation(format!(
                "{} id is immutable once persisted",
                self.schema.entity_type()
            )));
        }
        self.attributes.insert(name.to_string(), value.into());
        Ok(())
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn old_attributes(&self) -> Option<&Attributes> {
        self.old_attributes.as_ref()
    }

    pub fn old_attribute(&self, name: &str) -> Option<&Value> {
        self.old_attributes
            .as_ref()
            .and_then(|attributes| attributes.get(name))
    }

    pub fn is_new_record(&self) -> bool {
        self.old_attributes.is_none()
    }

    /// Copies current values into the persisted snapshot.
    pub fn mark_persisted(&mut self) {
        self.old_attributes = Some(self.attributes.clone());
    }

    /// Copies one current value into the persisted snapshot, if any.
    pub(crate) fn sync_old_attribute(&mut self, name: &str) {
        if let (Some(old), Some(value)) = (self.old_attributes.as_mut(), self.attributes.get(name))
        {
            old.insert(name.to_string(), value.clone());
        }
    }

    /// Drops the persisted snapshot; the record no longer mirrors a row.
    pub fn clear_old_attributes(&mut self) {
        self.old_attributes = None;
    }

    /// Attributes whose current value differs from the persisted snapshot.
    ///
    /// Every set attribute is dirty on a new record.
    pub fn dirty_attributes(&self) -> Vec<&str> {
        self.attributes
            .iter()
            .filter(|(name, value)| {
                self.old_attributes
                    .as_ref()
                    .and_then(|old| old.get(name.as_str()))
                    != Some(*value)
            })
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn validation_errors(&self) -> &ValidationErrors {
        &self.errors
    }

    /// Entry point for external validators.
    pub fn add_error(&mut self, attribute: impl Into<String>, message: impl Into<String>) {
        self.errors.add(attribute, message);
    }

    pub fn clear_errors(&mut self, attribute: Option<&str>) {
        self.errors.clear(attribute);
    }

    pub fn has_errors(&self) -> bool {
        self.errors.has_errors()
    }

    /// Wraps this record into a shared handle.
    pub fn into_shared(self) -> SharedRecord {
        Rc::new(RefCell::new(self))
    }
}

/// Reads a stored integer, accepting only SQLite INTEGER values.
pub(crate) fn value_as_i64(value: Option<&Value>) -> Option<i64> {
    match value {
        Some(Value::Integer(number)) => Some(*number),
        _ => None,
    }
}

/// Reads a stored boolean flag; NULL/absent/non-integer values are false.
pub(crate) fn value_as_flag(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::Integer(number)) if *number != 0)
}
