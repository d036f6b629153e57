//! Ordered validation error store.
//!
//! # Responsibility
//! - Hold attribute -> messages pairs produced by an external validator.
//!
//! # Invariants
//! - Attribute order is first-insertion order.
//! - Message order within one attribute is insertion order.
//! - Attributes never map to an empty message list.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

/// Attribute -> error messages mapping owned by one record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    entries: IndexMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one message for `attribute`.
    pub fn add(&mut self, attribute: impl Into<String>, message: impl Into<String>) {
        self.entries
            .entry(attribute.into())
            .or_default()
            .push(message.into());
    }

    /// Returns messages for one attribute; empty when the attribute has none.
    pub fn get(&self, attribute: &str) -> &[String] {
        self.entries
            .get(attribute)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_errors(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn has_attribute_errors(&self, attribute: &str) -> bool {
        self.entries.contains_key(attribute)
    }

    /// Number of attributes carrying at least one error.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every message for `attribute`, or all messages when `None`.
    pub fn clear(&mut self, attribute: Option<&str>) {
        match attribute {
            Some(attribute) => {
                self.entries.shift_remove(attribute);
            }
            None => self.entries.clear(),
        }
    }

    /// Iterates `(attribute, messages)` in store order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(attribute, messages)| (attribute.as_str(), messages.as_slice()))
    }
}

impl<A, M> FromIterator<(A, M)> for ValidationErrors
where
    A: Into<String>,
    M: IntoIterator,
    M::Item: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (A, M)>>(iter: T) -> Self {
        let mut errors = Self::new();
        for (attribute, messages) in iter {
            let attribute = attribute.into();
            for message in messages {
                errors.add(attribute.clone(), message);
            }
        }
        errors
    }
}

impl From<IndexMap<String, Vec<String>>> for ValidationErrors {
    fn from(entries: IndexMap<String, Vec<String>>) -> Self {
        entries.into_iter().collect()
    }
}

/// Reads the serialized mapping through `From`, so attributes with no
/// messages are dropped.
impl<'de> Deserialize<'de> for ValidationErrors {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        IndexMap::<String, Vec<String>>::deserialize(deserializer).map(Self::from)
    }
}
