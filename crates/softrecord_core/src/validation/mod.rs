//! Validation error storage and reporting.
//!
//! Populating errors is the job of an external validator; this module only
//! stores and renders them.

pub mod errors;
pub mod reporter;
