//! Attribute bag: canonical keys, JSON values, ordered map.

use std::borrow::Borrow;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Attribute values are plain JSON values.
pub type AttrValue = serde_json::Value;

/// Ordered attribute mapping with canonical keys.
pub type AttrMap = BTreeMap<AttrKey, AttrValue>;

/// Canonical attribute key.
///
/// Normalization happens once, at construction: surrounding whitespace is
/// trimmed and a leading `:` (symbol-style input) is stripped, so `"name"`,
/// `" name"` and `":name"` all address the same attribute.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttrKey(String);

impl AttrKey {
    pub fn new(raw: impl AsRef<str>) -> Self {
        let key = raw.as_ref().trim();
        let key = key.strip_prefix(':').unwrap_or(key);
        Self(key.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for AttrKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AttrKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for AttrKey {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl Borrow<str> for AttrKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Build an [`AttrMap`] literal.
///
/// ```
/// use strata_core::attrs;
///
/// let map = attrs! { "name" => "test", "size" => 3 };
/// assert_eq!(map.len(), 2);
/// ```
#[macro_export]
macro_rules! attrs {
    () => { $crate::AttrMap::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::AttrMap::new();
        $( map.insert($crate::AttrKey::new($key), $crate::AttrValue::from($value)); )+
        map
    }};
}
