//! Human-readable validation summaries.
//!
//! # Responsibility
//! - Render one stable message from an ordered validation error store.
//! - Provide an owned error snapshot for callers that surface failed writes.
//!
//! # Invariants
//! - Message shape is `Validation Errors: #<attr>: -<msg> -<msg> #<attr>: ...`.
//! - No errors renders as an empty string.
//! - `ValidationFailed` never references the record it was taken from.

use crate::model::record::Record;
use crate::validation::errors::ValidationErrors;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

const MESSAGE_PREFIX: &str = "Validation Errors:";

/// Read access to a validation error store plus the shared summary format.
pub trait ValidationErrorReporter {
    /// Full attribute -> messages mapping.
    fn errors(&self) -> &ValidationErrors;

    /// Messages for one attribute, in stored order.
    fn attribute_errors(&self, attribute: &str) -> &[String] {
        self.errors().get(attribute)
    }

    /// Renders the summary message, or `""` when there are no errors.
    fn error_message(&self) -> String {
        render_error_message(self.errors())
    }
}

/// Renders the summary message for one error store.
pub fn render_error_message(errors: &ValidationErrors) -> String {
    if !errors.has_errors() {
        return String::new();
    }

    let mut message = String::from(MESSAGE_PREFIX);
    for (attribute, messages) in errors.iter() {
        message.push_str(" #");
        message.push_str(attribute);
        message.push(':');
        for entry in messages {
            message.push_str(" -");
            message.push_str(entry);
        }
    }
    message
}

impl ValidationErrorReporter for Record {
    fn errors(&self) -> &ValidationErrors {
        self.validation_errors()
    }
}

/// Owned snapshot of a record's validation errors at failure time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationFailed {
    pub entity_type: String,
    pub errors: ValidationErrors,
}

impl ValidationFailed {
    pub fn new(entity_type: impl Into<String>, errors: ValidationErrors) -> Self {
        Self {
            entity_type: entity_type.into(),
            errors,
        }
    }

    /// Copies the current error store of `record`.
    pub fn from_record(record: &Record) -> Self {
        Self::new(
            record.schema().entity_type(),
            record.validation_errors().clone(),
        )
    }
}

impl ValidationErrorReporter for ValidationFailed {
    fn errors(&self) -> &ValidationErrors {
        &self.errors
    }
}

impl Display for ValidationFailed {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error_message())
    }
}

impl Error for ValidationFailed {}
