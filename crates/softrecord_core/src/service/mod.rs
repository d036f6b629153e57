//! Entity lifecycle services.
//!
//! # Responsibility
//! - Orchestrate repository and transaction calls into delete/restore use
//!   cases.
//! - Keep storage details behind collaborator traits.

pub mod soft_delete;
