// Error types for event operations

use std::collections::BTreeMap;

use thiserror::Error;
use uuid::Uuid;

use crate::store::StoreError;

/// Result type alias for event operations
pub type Result<T> = std::result::Result<T, Error>;

/// Message reported under the `overlap` key
pub const OVERLAP_MESSAGE: &str = "Event period should not overlap existing events.";

/// Field name → messages, ordered by field name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> &BTreeMap<String, Vec<String>> {
        &self.0
    }

    /// First message of the first field, used as the summary line
    pub fn first_message(&self) -> Option<&str> {
        self.0
            .values()
            .next()
            .and_then(|messages| messages.first())
            .map(String::as_str)
    }
}

impl IntoIterator for ValidationErrors {
    type Item = (String, Vec<String>);
    type IntoIter = std::collections::btree_map::IntoIter<String, Vec<String>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Errors that can occur while validating or applying event writes
#[derive(Debug, Error)]
pub enum Error {
    /// One or more fields were rejected
    #[error("validation failed")]
    Validation(ValidationErrors),

    /// Candidate window conflicts with a stored event
    #[error("{}", OVERLAP_MESSAGE)]
    Overlap,

    /// Event not found
    #[error("Event not found: {0}")]
    NotFound(Uuid),

    /// Store failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl Error {
    /// Create a single-field validation error
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation(ValidationErrors::single(field, message))
    }

    /// Map a store-level not-found onto the domain variant
    pub fn from_store(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Error::NotFound(id),
            other => Error::Store(other),
        }
    }
}
