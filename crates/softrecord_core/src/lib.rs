//! Soft-delete, identity-map loading and validation reporting for
//! attribute-backed entity records.
//! This crate is the single source of truth for delete and cache invariants.

pub mod cache;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod validation;

pub use cache::identity_map::EntityCache;
pub use cache::loader::EntityLoader;
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::capability::{
    DeleteHooks, Identifiable, NoopHooks, OptimisticLockable, SoftDeletable,
};
pub use model::record::{Attributes, EntityId, Record, SharedRecord};
pub use model::schema::{EntitySchema, EntitySchemaBuilder, SchemaError};
pub use repo::error::{RepoError, RepoResult};
pub use repo::query::{Condition, PersistenceQuery};
pub use repo::sqlite::SqliteQueryLayer;
pub use repo::transaction::{SqliteTransactionManager, Transaction, TransactionManager};
pub use service::soft_delete::{route_delete, DeletePath, SoftDeleteController};
pub use validation::errors::ValidationErrors;
pub use validation::reporter::{render_error_message, ValidationErrorReporter, ValidationFailed};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
