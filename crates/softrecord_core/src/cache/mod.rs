//! Identity-map caching and batch loading.
//!
//! # Responsibility
//! - Keep one in-memory instance per stored row within a request scope.
//! - Collapse id lookups into a single bulk query per load.
//!
//! # Invariants
//! - No process-wide cache exists; callers own and pass an `EntityCache`.
//! - Cache state is never shared across scopes, so staleness across scopes is
//!   expected and callers re-fetch when they need fresh data.

pub mod identity_map;
pub mod loader;
