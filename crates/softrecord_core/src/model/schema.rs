//! Per-type entity configuration.
//!
//! # Responsibility
//! - Describe one entity type: table, attributes, identity, soft-delete flag,
//!   optimistic lock attribute and delete transaction policy.
//! - Resolve optional behavior once at construction instead of probing the
//!   database schema at runtime.
//!
//! # Invariants
//! - Every name is a plain SQL identifier (`[A-Za-z_][A-Za-z0-9_]*`).
//! - `id_attribute` and `lock_attribute`, when set, are declared attributes.
//! - The soft-delete flag may be absent from the attribute list; soft-delete
//!   is then inactive for the type.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Default soft-delete flag attribute name.
pub const DEFAULT_SOFT_DELETE_ATTRIBUTE: &str = "is_deleted";
/// Default identity attribute name.
pub const DEFAULT_ID_ATTRIBUTE: &str = "id";

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// Schema configuration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    InvalidIdentifier(String),
    DuplicateAttribute(String),
    UndeclaredAttribute {
        role: &'static str,
        attribute: String,
    },
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidIdentifier(value) => write!(f, "invalid identifier `{value}`"),
            Self::DuplicateAttribute(value) => write!(f, "attribute declared twice: `{value}`"),
            Self::UndeclaredAttribute { role, attribute } => {
                write!(f, "{role} attribute `{attribute}` is not declared")
            }
        }
    }
}

impl Error for SchemaError {}

/// Resolved configuration for one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySchema {
    entity_type: String,
    table: String,
    attributes: Vec<String>,
    id_attribute: Option<String>,
    soft_delete_attribute: String,
    lock_attribute: Option<String>,
    transactional_delete: bool,
}

impl EntitySchema {
    /// Starts a builder for `entity_type` stored in `table`.
    pub fn builder(entity_type: impl Into<String>, table: impl Into<String>) -> EntitySchemaBuilder {
        EntitySchemaBuilder {
            entity_type: entity_type.into(),
            table: table.into(),
            attributes: Vec::new(),
            id_attribute: Some(DEFAULT_ID_ATTRIBUTE.to_string()),
            soft_delete_attribute: DEFAULT_SOFT_DELETE_ATTRIBUTE.to_string(),
            lock_attribute: None,
            transactional_delete: true,
        }
    }

    /// Type name used in cache keys and error payloads.
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Declared attributes in declaration order.
    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|attribute| attribute == name)
    }

    /// Identity attribute, `None` for types without an integer id.
    pub fn id_attribute(&self) -> Option<&str> {
        self.id_attribute.as_deref()
    }

    /// Configured flag name, even when the type does not declare it.
    pub fn configured_soft_delete_attribute(&self) -> &str {
        &self.soft_delete_attribute
    }

    /// True iff a non-empty flag name is configured and declared by the type.
    pub fn is_soft_delete_active(&self) -> bool {
        !self.soft_delete_attribute.is_empty() && self.has_attribute(&self.soft_delete_attribute)
    }

    /// Flag attribute when soft-delete is active for this type.
    pub fn soft_delete_attribute(&self) -> Option<&str> {
        self.is_soft_delete_active()
            .then_some(self.soft_delete_attribute.as_str())
    }

    /// Optimistic lock attribute, if the type declares one.
    pub fn lock_attribute(&self) -> Option<&str> {
        self.lock_attribute.as_deref()
    }

    /// Whether soft-delete runs inside an explicit transaction.
    pub fn is_transactional_delete(&self) -> bool {
        self.transactional_delete
    }
}

/// Builder for [`EntitySchema`].
#[derive(Debug, Clone)]
pub struct EntitySchemaBuilder {
    entity_type: String,
    table: String,
    attributes: Vec<String>,
    id_attribute: Option<String>,
    soft_delete_attribute: String,
    lock_attribute: Option<String>,
    transactional_delete: bool,
}

impl EntitySchemaBuilder {
    pub fn attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = attributes.into_iter().map(Into::into).collect();
        self
    }

    pub fn id_attribute(mut self, name: impl Into<String>) -> Self {
        self.id_attribute = Some(name.into());
        self
    }

    /// Declares a type without integer identity.
    pub fn without_id(mut self) -> Self {
        self.id_attribute = None;
        self
    }

    /// Sets the flag attribute name. An empty name disables soft-delete.
    pub fn soft_delete_attribute(mut self, name: impl Into<String>) -> Self {
        self.soft_delete_attribute = name.into();
        self
    }

    pub fn lock_attribute(mut self, name: impl Into<String>) -> Self {
        self.lock_attribute = Some(name.into());
        self
    }

    pub fn transactional_delete(mut self, enabled: bool) -> Self {
        self.transactional_delete = enabled;
        self
    }

    /// Validates names and produces the resolved schema.
    ///
    /// # Errors
    /// - `InvalidIdentifier` for any table/attribute name that is not a plain
    ///   SQL identifier.
    /// - `DuplicateAttribute` when an attribute is listed twice.
    /// - `UndeclaredAttribute` when the id or lock attribute is not declared.
    pub fn build(self) -> Result<EntitySchema, SchemaError> {
        ensure_identifier(&self.table)?;
        for (index, attribute) in self.attributes.iter().enumerate() {
            ensure_identifier(attribute)?;
            if self.attributes[..index].contains(attribute) {
                return Err(SchemaError::DuplicateAttribute(attribute.clone()));
            }
        }
        if !self.soft_delete_attribute.is_empty() {
            ensure_identifier(&self.soft_delete_attribute)?;
        }
        ensure_declared(&self.attributes, "id", self.id_attribute.as_deref())?;
        ensure_declared(&self.attributes, "lock", self.lock_attribute.as_deref())?;

        Ok(EntitySchema {
            entity_type: self.entity_type,
            table: self.table,
            attributes: self.attributes,
            id_attribute: self.id_attribute,
            soft_delete_attribute: self.soft_delete_attribute,
            lock_attribute: self.lock_attribute,
            transactional_delete: self.transactional_delete,
        })
    }
}

fn ensure_identifier(value: &str) -> Result<(), SchemaError> {
    if IDENTIFIER_RE.is_match(value) {
        Ok(())
    } else {
        Err(SchemaError::InvalidIdentifier(value.to_string()))
    }
}

fn ensure_declared(
    attributes: &[String],
    role: &'static str,
    name: Option<&str>,
) -> Result<(), SchemaError> {
    match name {
        Some(name) if !attributes.iter().any(|attribute| attribute == name) => {
            Err(SchemaError::UndeclaredAttribute {
                role,
                attribute: name.to_string(),
            })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::{EntitySchema, SchemaError};

    #[test]
    fn soft_delete_is_active_only_when_flag_is_declared() {
        let with_flag = EntitySchema::builder("post", "posts")
            .attributes(["id", "title", "is_deleted"])
            .build()
            .expect("valid schema");
        assert!(with_flag.is_soft_delete_active());
        assert_eq!(with_flag.soft_delete_attribute(), Some("is_deleted"));

        let without_flag = EntitySchema::builder("tag", "tags")
            .attributes(["id", "name"])
            .build()
            .expect("valid schema");
        assert!(!without_flag.is_soft_delete_active());
        assert_eq!(without_flag.soft_delete_attribute(), None);
        assert_eq!(
            without_flag.configured_soft_delete_attribute(),
            "is_deleted"
        );
    }

    #[test]
    fn empty_flag_name_disables_soft_delete() {
        let schema = EntitySchema::builder("post", "posts")
            .attributes(["id", "is_deleted"])
            .soft_delete_attribute("")
            .build()
            .expect("valid schema");
        assert!(!schema.is_soft_delete_active());
    }

    #[test]
    fn rejects_sql_unsafe_identifiers() {
        let err = EntitySchema::builder("post", "posts; DROP TABLE x")
            .attributes(["id"])
            .build()
            .expect_err("table name must be validated");
        assert_eq!(
            err,
            SchemaError::InvalidIdentifier("posts; DROP TABLE x".to_string())
        );

        let err = EntitySchema::builder("post", "posts")
            .attributes(["id", "1st"])
            .build()
            .expect_err("attribute name must be validated");
        assert_eq!(err, SchemaError::InvalidIdentifier("1st".to_string()));
    }

    #[test]
    fn rejects_undeclared_lock_and_id_attributes() {
        let err = EntitySchema::builder("post", "posts")
            .attributes(["id", "title"])
            .lock_attribute("version")
            .build()
            .expect_err("lock attribute must be declared");
        assert_eq!(
            err,
            SchemaError::UndeclaredAttribute {
                role: "lock",
                attribute: "version".to_string(),
            }
        );

        let err = EntitySchema::builder("post", "posts")
            .attributes(["title"])
            .build()
            .expect_err("default id attribute must be declared");
        assert!(matches!(err, SchemaError::UndeclaredAttribute { role: "id", .. }));
    }

    #[test]
    fn rejects_duplicate_attributes() {
        let err = EntitySchema::builder("post", "posts")
            .attributes(["id", "title", "title"])
            .build()
            .expect_err("duplicates must fail");
        assert_eq!(err, SchemaError::DuplicateAttribute("title".to_string()));
    }

    #[test]
    fn types_without_id_build_successfully() {
        let schema = EntitySchema::builder("audit_line", "audit_lines")
            .attributes(["message"])
            .without_id()
            .build()
            .expect("valid schema");
        assert_eq!(schema.id_attribute(), None);
        assert!(schema.is_transactional_delete());
    }
}
