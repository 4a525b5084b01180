//! Entity contract and a ready-made base entity.

use serde::{Deserialize, Serialize};

use crate::attrs::{AttrKey, AttrMap, AttrValue};
use crate::error::MapperErrors;
use crate::id::EntityId;

/// The minimal contract a domain object must satisfy to be usable by a
/// mapper.
///
/// Mappers drive the identity, persistence flag, and mapper errors; domain
/// code owns [`EntityCore::domain_valid`]. [`EntityCore::is_valid`] is the
/// single combined validity check.
pub trait EntityCore {
    /// Identity, unset until the first successful create.
    fn id(&self) -> Option<EntityId>;

    fn set_id(&mut self, id: Option<EntityId>);

    /// Current attribute map. Stable until mutated.
    fn attributes(&self) -> &AttrMap;

    /// Merge the given attributes into the existing map: new keys
    /// overwrite, absent keys are untouched. Never a replace.
    fn merge_attributes(&mut self, attrs: AttrMap);

    /// Validation failures assigned by a mapper after a failed
    /// persistence-layer validation.
    fn mapper_errors(&self) -> &MapperErrors;

    fn set_mapper_errors(&mut self, errors: MapperErrors);

    /// Whether the entity currently corresponds to a stored record.
    /// Toggled explicitly by mappers, never inferred from id presence.
    fn is_persisted(&self) -> bool;

    fn mark_as_persisted(&mut self);

    fn mark_as_not_persisted(&mut self);

    /// Domain-specific validation; valid unless overridden.
    fn domain_valid(&self) -> bool {
        true
    }

    /// True iff domain validation passes and no mapper errors are present.
    fn is_valid(&self) -> bool {
        self.domain_valid() && self.mapper_errors().is_empty()
    }
}

/// Base entity: identity, attribute bag, mapper errors, persistence flag.
///
/// Embed it in a domain type (delegating [`EntityCore`]) or use it directly
/// when no domain-specific behavior is needed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Entity {
    id: Option<EntityId>,
    attributes: AttrMap,
    mapper_errors: MapperErrors,
    persisted: bool,
}

impl Entity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an entity with initial attributes.
    pub fn with_attributes(attrs: AttrMap) -> Self {
        let mut entity = Self::default();
        entity.merge_attributes(attrs);
        entity
    }

    /// Read a single attribute.
    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.attributes.get(AttrKey::new(key).as_str())
    }

    /// Set a single attribute.
    pub fn set(&mut self, key: impl Into<AttrKey>, value: impl Into<AttrValue>) {
        self.attributes.insert(key.into(), value.into());
    }
}

impl EntityCore for Entity {
    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn set_id(&mut self, id: Option<EntityId>) {
        self.id = id;
    }

    fn attributes(&self) -> &AttrMap {
        &self.attributes
    }

    fn merge_attributes(&mut self, attrs: AttrMap) {
        self.attributes.extend(attrs);
    }

    fn mapper_errors(&self) -> &MapperErrors {
        &self.mapper_errors
    }

    fn set_mapper_errors(&mut self, errors: MapperErrors) {
        self.mapper_errors = errors;
    }

    fn is_persisted(&self) -> bool {
        self.persisted
    }

    fn mark_as_persisted(&mut self) {
        self.persisted = true;
    }

    fn mark_as_not_persisted(&mut self) {
        self.persisted = false;
    }
}

/// Entities are equal when they are the same instance, or when both carry
/// an id and the ids match. Two id-less entities are never equal unless
/// they are the same instance.
impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        if core::ptr::eq(self, other) {
            return true;
        }
        matches!((self.id, other.id), (Some(a), Some(b)) if a == b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs;

    #[test]
    fn merging_attributes_never_drops_existing_keys() {
        let mut entity = Entity::with_attributes(attrs! { "name" => "test", "size" => 3 });
        entity.merge_attributes(attrs! { "name" => "updated" });

        assert_eq!(entity.get("name"), Some(&AttrValue::from("updated")));
        assert_eq!(entity.get("size"), Some(&AttrValue::from(3)));
    }

    #[test]
    fn symbol_style_and_plain_keys_address_the_same_attribute() {
        let mut entity = Entity::new();
        entity.set(":name", "first");
        entity.merge_attributes(attrs! { "name" => "second" });

        assert_eq!(entity.attributes().len(), 1);
        assert_eq!(entity.get("name"), Some(&AttrValue::from("second")));
    }

    #[test]
    fn equal_to_the_exact_same_instance() {
        let entity = Entity::new();
        assert_eq!(entity, entity);
    }

    #[test]
    fn equal_when_both_ids_are_present_and_match() {
        let mut a = Entity::new();
        let mut b = Entity::new();
        a.set_id(Some(EntityId::new(123)));
        b.set_id(Some(EntityId::new(123)));
        assert_eq!(a, b);

        b.set_id(Some(EntityId::new(456)));
        assert_ne!(a, b);
    }

    #[test]
    fn never_equal_without_ids() {
        let a = Entity::new();
        let b = Entity::new();
        assert_ne!(a, b);
    }

    #[test]
    fn validity_combines_domain_checks_and_mapper_errors() {
        let mut entity = Entity::new();
        assert!(entity.is_valid());

        let mut errors = MapperErrors::new();
        errors.push("email", "has already been taken");
        entity.set_mapper_errors(errors);
        assert!(!entity.is_valid());

        entity.set_mapper_errors(MapperErrors::new());
        assert!(entity.is_valid());
    }

    #[test]
    fn persistence_flag_is_explicit() {
        let mut entity = Entity::new();
        entity.set_id(Some(EntityId::new(1)));
        assert!(!entity.is_persisted());

        entity.mark_as_persisted();
        assert!(entity.is_persisted());

        entity.mark_as_not_persisted();
        assert!(!entity.is_persisted());
    }
}
