//! Persistence collaborator contracts and SQLite implementations.
//!
//! # Responsibility
//! - Define the query and transaction seams the core depends on.
//! - Isolate SQL details from caching and lifecycle orchestration.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`NotFound`, `StaleObject`) in
//!   addition to DB transport errors.

pub mod error;
pub mod query;
pub mod sqlite;
pub mod transaction;
