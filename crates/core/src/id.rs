//! Entity identifiers allocated by the backing store.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::attrs::AttrValue;

/// Identifier of a persisted entity.
///
/// Ids are allocated by the store on create and are strictly increasing
/// within one mapper. An entity has no id until its first successful create.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(i64);

impl EntityId {
    pub fn new(raw: i64) -> Self {
        Self(raw)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }

    /// Coerce an attribute value into an id.
    ///
    /// Accepts JSON integers and numeric strings (so `"3"` matches id `3`).
    /// Any other shape yields `None`; this is a boundary convenience and is
    /// deliberately not extended to further types.
    pub fn coerce(value: &AttrValue) -> Option<Self> {
        match value {
            AttrValue::Number(n) => n.as_i64().map(Self),
            AttrValue::String(s) => s.trim().parse::<i64>().ok().map(Self),
            _ => None,
        }
    }
}

impl core::fmt::Display for EntityId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<i64> for EntityId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<EntityId> for i64 {
    fn from(value: EntityId) -> Self {
        value.0
    }
}

impl FromStr for EntityId {
    type Err = core::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(Self)
    }
}
