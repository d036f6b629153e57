//! Entity model: per-type schema, attribute records and capabilities.
//!
//! # Responsibility
//! - Define the record shape every component works on.
//! - Resolve optional per-type behavior (identity, soft-delete, locking) from
//!   explicit configuration.
//!
//! # Invariants
//! - Records never outlive the meaning of their schema: a record is always
//!   read through the schema it was built with.

pub mod capability;
pub mod record;
pub mod schema;
