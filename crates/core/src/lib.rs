//! `strata-core` — domain foundation for the data-mapper layer.
//!
//! This crate contains **pure domain** primitives (no storage concerns).

pub mod attrs;
pub mod entity;
pub mod error;
pub mod id;

pub use attrs::{AttrKey, AttrMap, AttrValue};
pub use entity::{Entity, EntityCore};
pub use error::{FieldError, MapperError, MapperErrors, MapperResult};
pub use id::EntityId;
