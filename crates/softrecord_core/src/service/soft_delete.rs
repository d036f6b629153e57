//! Soft-delete lifecycle controller.
//!
//! # Responsibility
//! - Route a delete request to the hard or soft path.
//! - Run the soft path inside a transaction when the type requires it.
//! - Enforce optimistic lock checks on soft delete and restore.
//!
//! # Invariants
//! - `force` or an inactive flag always takes the hard path.
//! - A transactional soft delete either commits (flag stored, snapshot
//!   cleared, hooks run) or rolls back with the record left as it was.
//! - Collaborator errors reach the caller unchanged; no retries.

use crate::model::capability::{
    DeleteHooks, Identifiable, NoopHooks, OptimisticLockable, SoftDeletable,
};
use crate::model::record::{Attributes, Record};
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::query::{Condition, PersistenceQuery};
use crate::repo::transaction::{Transaction, TransactionManager};
use log::{debug, error, warn};
use rusqlite::types::Value;
use std::time::Instant;

/// Delete path selected for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletePath {
    /// Row is physically removed by the persistence layer.
    Hard,
    /// Row is kept and its flag attribute set.
    Soft,
}

impl DeletePath {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hard => "hard",
            Self::Soft => "soft",
        }
    }
}

/// Selects the delete path for `record`.
pub fn route_delete<E: SoftDeletable>(record: &E, force: bool) -> DeletePath {
    if force || !record.is_soft_delete_active() {
        DeletePath::Hard
    } else {
        DeletePath::Soft
    }
}

/// Delete/restore orchestration over query and transaction collaborators.
pub struct SoftDeleteController<'a, Q, T>
where
    Q: PersistenceQuery,
    T: TransactionManager,
{
    query: &'a Q,
    transactions: &'a T,
    hooks: Box<dyn DeleteHooks + 'a>,
}

impl<'a, Q, T> SoftDeleteController<'a, Q, T>
where
    Q: PersistenceQuery,
    T: TransactionManager,
{
    pub fn new(query: &'a Q, transactions: &'a T) -> Self {
        Self {
            query,
            transactions,
            hooks: Box::new(NoopHooks),
        }
    }

    /// Replaces the delete hooks.
    pub fn with_hooks(mut self, hooks: impl DeleteHooks + 'a) -> Self {
        self.hooks = Box::new(hooks);
        self
    }

    /// Deletes `record`, softly when the type supports it and `force` is off.
    ///
    /// Returns the number of affected rows; `0` when a before-delete hook
    /// vetoed the request.
    ///
    /// # Errors
    /// - `StaleObject` when a lock-guarded write matched no row.
    /// - `UnsupportedOperation` when the record has no persisted identity.
    /// - Any collaborator error, unchanged, after rolling back.
    pub fn delete(&self, record: &mut Record, force: bool) -> RepoResult<usize> {
        let started_at = Instant::now();
        let path = route_delete(&*record, force);
        let entity_type = record.entity_type().to_string();
        let id = record
            .id()
            .map(|id| id.to_string())
            .unwrap_or_else(|_| "none".to_string());

        let result = match path {
            DeletePath::Hard => self.hard_delete(record),
            DeletePath::Soft if record.schema().is_transactional_delete() => {
                self.soft_delete_in_transaction(record)
            }
            DeletePath::Soft => self
                .soft_delete_internal(record)
                .map(|rows| rows.unwrap_or(0)),
        };

        match &result {
            Ok(rows) => debug!(
                "event=entity_delete module=service status=ok path={} entity_type={} id={} rows={} duration_ms={}",
                path.as_str(),
                entity_type,
                id,
                rows,
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=entity_delete module=service status=error path={} entity_type={} id={} duration_ms={} error={}",
                path.as_str(),
                entity_type,
                id,
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }

    /// Clears the soft-delete flag of a previously soft-deleted row.
    ///
    /// # Errors
    /// - `UnsupportedOperation` when soft-delete is inactive for the type or
    ///   the record has no persisted snapshot.
    /// - `StaleObject` when a lock-guarded update matched no row.
    pub fn restore(&self, record: &mut Record) -> RepoResult<usize> {
        let schema = record.schema_handle();
        let Some(flag) = schema.soft_delete_attribute() else {
            return Err(RepoError::UnsupportedOperation(format!(
                "{} does not support soft delete",
                schema.entity_type()
            )));
        };

        let id = record.old_primary_key()?;
        let condition = Condition::for_persisted(record)?;
        let mut values = Attributes::new();
        values.insert(flag.to_string(), Value::Integer(0));

        let rows = self
            .query
            .update_by_condition(&schema, &condition, &values)?;
        if schema.lock_attribute().is_some() && rows == 0 {
            return Err(RepoError::StaleObject {
                entity_type: schema.entity_type().to_string(),
                id,
            });
        }

        record.set(flag, 0_i64)?;
        record.sync_old_attribute(flag);
        debug!(
            "event=entity_restore module=service status=ok entity_type={} id={} rows={}",
            schema.entity_type(),
            id,
            rows
        );
        Ok(rows)
    }

    fn hard_delete(&self, record: &mut Record) -> RepoResult<usize> {
        if !self.hooks.before_delete(record)? {
            return Ok(0);
        }
        let rows = self.query.hard_delete(record)?;
        record.clear_old_attributes();
        self.hooks.after_delete(record);
        Ok(rows)
    }

    fn soft_delete_in_transaction(&self, record: &mut Record) -> RepoResult<usize> {
        let tx = self.transactions.begin()?;
        let snapshot = record.clone();

        match self.soft_delete_internal(record) {
            Ok(Some(rows)) => match tx.commit() {
                Ok(()) => Ok(rows),
                Err(err) => {
                    *record = snapshot;
                    Err(err)
                }
            },
            Ok(None) => {
                tx.rollback()?;
                Ok(0)
            }
            Err(err) => {
                *record = snapshot;
                if let Err(rollback_err) = tx.rollback() {
                    warn!(
                        "event=entity_delete_rollback module=service status=error entity_type={} error={}",
                        record.entity_type(),
                        rollback_err
                    );
                }
                Err(err)
            }
        }
    }

    /// Runs the flag update. `Ok(None)` means a hook vetoed the delete.
    fn soft_delete_internal(&self, record: &mut Record) -> RepoResult<Option<usize>> {
        if !self.hooks.before_delete(record)? {
            return Ok(None);
        }

        let schema = record.schema_handle();
        let Some(flag) = schema.soft_delete_attribute() else {
            return Err(RepoError::UnsupportedOperation(format!(
                "{} does not support soft delete",
                schema.entity_type()
            )));
        };

        let id = record.old_primary_key()?;
        let condition = Condition::for_persisted(record)?;
        let mut values = Attributes::new();
        values.insert(flag.to_string(), Value::Integer(1));

        let rows = self
            .query
            .update_by_condition(&schema, &condition, &values)?;
        if record.lock_attribute().is_some() && rows == 0 {
            return Err(RepoError::StaleObject {
                entity_type: schema.entity_type().to_string(),
                id,
            });
        }

        record.set(flag, 1_i64)?;
        record.clear_old_attributes();
        self.hooks.after_delete(record);
        Ok(Some(rows))
    }
}
