//! Transaction collaborator contract and SQLite implementation.
//!
//! # Responsibility
//! - Let the lifecycle controller begin/commit/roll back without knowing the
//!   storage engine.
//!
//! # Invariants
//! - `commit` and `rollback` consume the transaction; each runs at most once.
//! - A SQLite transaction dropped without being finished is rolled back.
//! - Beginning inside an open SQLite transaction opens a savepoint instead.

use crate::repo::error::RepoResult;
use log::warn;
use rusqlite::{Connection, TransactionBehavior};
use std::cell::Cell;

/// One open unit of work.
pub trait Transaction {
    fn commit(self) -> RepoResult<()>;
    fn rollback(self) -> RepoResult<()>;
}

/// Factory for units of work.
pub trait TransactionManager {
    type Tx: Transaction;

    fn begin(&self) -> RepoResult<Self::Tx>;
}

/// SQLite transaction manager over one borrowed connection.
pub struct SqliteTransactionManager<'conn> {
    conn: &'conn Connection,
    savepoint_seq: Cell<u32>,
}

impl<'conn> SqliteTransactionManager<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            conn,
            savepoint_seq: Cell::new(0),
        }
    }
}

impl<'conn> TransactionManager for SqliteTransactionManager<'conn> {
    type Tx = SqliteTransaction<'conn>;

    fn begin(&self) -> RepoResult<Self::Tx> {
        if self.conn.is_autocommit() {
            let tx = rusqlite::Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
            return Ok(SqliteTransaction::Top(tx));
        }

        let seq = self.savepoint_seq.get() + 1;
        self.savepoint_seq.set(seq);
        let name = format!("softrecord_sp_{seq}");
        self.conn.execute_batch(&format!("SAVEPOINT {name};"))?;
        Ok(SqliteTransaction::Nested(NestedSavepoint {
            conn: self.conn,
            name,
            finished: false,
        }))
    }
}

/// Top-level transaction or nested savepoint.
pub enum SqliteTransaction<'conn> {
    Top(rusqlite::Transaction<'conn>),
    Nested(NestedSavepoint<'conn>),
}

impl Transaction for SqliteTransaction<'_> {
    fn commit(self) -> RepoResult<()> {
        match self {
            Self::Top(tx) => Ok(tx.commit()?),
            Self::Nested(savepoint) => savepoint.release(),
        }
    }

    fn rollback(self) -> RepoResult<()> {
        match self {
            Self::Top(tx) => Ok(tx.rollback()?),
            Self::Nested(savepoint) => savepoint.rollback(),
        }
    }
}

/// Savepoint opened inside an outer transaction.
pub struct NestedSavepoint<'conn> {
    conn: &'conn Connection,
    name: String,
    finished: bool,
}

impl NestedSavepoint<'_> {
    fn release(mut self) -> RepoResult<()> {
        self.finished = true;
        self.conn
            .execute_batch(&format!("RELEASE SAVEPOINT {};", self.name))?;
        Ok(())
    }

    fn rollback(mut self) -> RepoResult<()> {
        self.finished = true;
        self.conn.execute_batch(&format!(
            "ROLLBACK TO SAVEPOINT {name}; RELEASE SAVEPOINT {name};",
            name = self.name
        ))?;
        Ok(())
    }
}

impl Drop for NestedSavepoint<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(err) = self.conn.execute_batch(&format!(
            "ROLLBACK TO SAVEPOINT {name}; RELEASE SAVEPOINT {name};",
            name = self.name
        )) {
            warn!(
                "event=savepoint_drop module=repo status=error savepoint={} error={}",
                self.name, err
            );
        }
    }
}
