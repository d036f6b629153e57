//! Repository error contract.
//!
//! # Invariants
//! - `NotFound.missing_ids` is the exact, ascending list of unresolved ids.
//! - Collaborator errors are carried unchanged; this layer never rewraps a
//!   `RepoError` it receives.

use crate::db::DbError;
use crate::model::record::EntityId;
use crate::validation::reporter::ValidationFailed;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Errors raised by loading, deleting and persisting entity records.
#[derive(Debug)]
pub enum RepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Strict load could not resolve every requested id.
    NotFound {
        entity_type: String,
        missing_ids: Vec<EntityId>,
    },
    /// Lock-guarded write matched no row: stored state moved on since load.
    StaleObject {
        entity_type: String,
        id: EntityId,
    },
    /// Operation not available for this type or record state.
    UnsupportedOperation(String),
    /// Stored or in-memory data cannot be read as expected.
    InvalidData(String),
    /// Write refused because the record carries validation errors.
    Validation(ValidationFailed),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound {
                entity_type,
                missing_ids,
            } => {
                let ids = missing_ids
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "{entity_type} not found: [{ids}]")
            }
            Self::StaleObject { entity_type, id } => write!(
                f,
                "{entity_type} {id} is outdated: the stored row was modified or deleted"
            ),
            Self::UnsupportedOperation(message) => write!(f, "unsupported operation: {message}"),
            Self::InvalidData(message) => write!(f, "invalid entity data: {message}"),
            Self::Validation(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::NotFound { .. } => None,
            Self::StaleObject { .. } => None,
            Self::UnsupportedOperation(_) => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<ValidationFailed> for RepoError {
    fn from(value: ValidationFailed) -> Self {
        Self::Validation(value)
    }
}
