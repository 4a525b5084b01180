//! Mapper error model.
//!
//! "Not found" and "invalid" are the only recoverable failure categories.
//! Everything else is an opaque backend failure carried unchanged.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::attrs::AttrKey;
use crate::id::EntityId;

/// Result type used across the mapper layer.
pub type MapperResult<T> = Result<T, MapperError>;

/// A single storage-layer validation failure on one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: AttrKey,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<AttrKey>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl core::fmt::Display for FieldError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} {}", self.field, self.message)
    }
}

/// Ordered list of storage-layer validation failures.
///
/// Set on an entity by a mapper after a failed persistence-layer
/// validation; an empty list means no mapper-side errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapperErrors(Vec<FieldError>);

impl MapperErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: impl Into<AttrKey>, message: impl Into<String>) {
        self.0.push(FieldError::new(field, message));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }
}

impl From<Vec<FieldError>> for MapperErrors {
    fn from(errors: Vec<FieldError>) -> Self {
        Self(errors)
    }
}

impl FromIterator<FieldError> for MapperErrors {
    fn from_iter<I: IntoIterator<Item = FieldError>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for MapperErrors {
    type Item = FieldError;
    type IntoIter = std::vec::IntoIter<FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl core::fmt::Display for MapperErrors {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.0.is_empty() {
            return f.write_str("no mapper errors recorded");
        }
        for (ix, error) in self.0.iter().enumerate() {
            if ix > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

fn describe_id(id: &Option<EntityId>) -> String {
    match id {
        Some(id) => format!("id {id}"),
        None => "no id".to_string(),
    }
}

/// Mapper-level error.
#[derive(Debug, Error)]
pub enum MapperError {
    /// No stored record matches the addressed id.
    #[error("entity not found ({})", describe_id(.id))]
    EntityNotFound { id: Option<EntityId> },

    /// Raised by the strict operation variants when the plain operation
    /// would have reported a validation failure; carries the entity's
    /// mapper errors for diagnostics.
    #[error("entity invalid: {0}")]
    EntityInvalid(MapperErrors),

    /// Unexpected storage failure (connectivity, unmodeled constraints).
    /// Carried opaque and never reinterpreted by the mapper.
    #[error("storage backend failure")]
    Backend(#[from] anyhow::Error),
}

impl MapperError {
    pub fn not_found(id: impl Into<Option<EntityId>>) -> Self {
        Self::EntityNotFound { id: id.into() }
    }

    pub fn invalid(errors: MapperErrors) -> Self {
        Self::EntityInvalid(errors)
    }
}
