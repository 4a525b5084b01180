//! Shared behavior checks every mapper implementation must pass.
//!
//! Test support, exported so backend adapter crates can run the identical
//! suite: the in-memory mapper and any record-store-backed mapper must not
//! drift apart in observable behavior. Each check gets a fresh mapper from
//! the factory.

use strata_core::{
    AttrMap, AttrValue, Entity, EntityCore, EntityId, MapperError, MapperErrors, attrs,
};

use crate::mapper::Mapper;

/// Minimal entity used by the conformance checks: the base [`Entity`] plus
/// a switch that forces domain validation to fail.
#[derive(Debug, Clone, Default)]
pub struct SampleEntity {
    base: Entity,
    force_invalid: bool,
}

impl SampleEntity {
    /// A valid entity with `name = "test"`, the shape every check builds on.
    pub fn valid() -> Self {
        Self::named("test")
    }

    pub fn named(name: &str) -> Self {
        Self::with_attributes(attrs! { "name" => name })
    }

    pub fn with_attributes(attrs: AttrMap) -> Self {
        let mut entity = Self::default();
        entity.merge_attributes(attrs);
        entity
    }

    /// Force `domain_valid` to report false.
    pub fn make_invalid(&mut self) {
        self.force_invalid = true;
    }

    pub fn name(&self) -> Option<&str> {
        self.base.get("name").and_then(AttrValue::as_str)
    }
}

impl EntityCore for SampleEntity {
    fn id(&self) -> Option<EntityId> {
        self.base.id()
    }

    fn set_id(&mut self, id: Option<EntityId>) {
        self.base.set_id(id);
    }

    fn attributes(&self) -> &AttrMap {
        self.base.attributes()
    }

    fn merge_attributes(&mut self, attrs: AttrMap) {
        self.base.merge_attributes(attrs);
    }

    fn mapper_errors(&self) -> &MapperErrors {
        self.base.mapper_errors()
    }

    fn set_mapper_errors(&mut self, errors: MapperErrors) {
        self.base.set_mapper_errors(errors);
    }

    fn is_persisted(&self) -> bool {
        self.base.is_persisted()
    }

    fn mark_as_persisted(&mut self) {
        self.base.mark_as_persisted();
    }

    fn mark_as_not_persisted(&mut self) {
        self.base.mark_as_not_persisted();
    }

    fn domain_valid(&self) -> bool {
        !self.force_invalid
    }
}

/// Run every conformance check, giving each one a fresh mapper.
pub fn check_mapper<M, F>(new_mapper: F)
where
    M: Mapper<SampleEntity>,
    F: Fn() -> M,
{
    create_assigns_increasing_ids(&mut new_mapper());
    create_marks_the_entity_persisted(&mut new_mapper());
    create_does_not_store_by_reference(&mut new_mapper());
    create_rejects_an_invalid_entity(&mut new_mapper());
    create_strict_raises_on_an_invalid_entity(&mut new_mapper());
    find_returns_a_matching_entity(&mut new_mapper());
    find_returns_detached_copies(&mut new_mapper());
    find_fails_when_absent(&mut new_mapper());
    find_by_id_returns_none_when_absent(&mut new_mapper());
    all_is_idempotent_and_ordered(&mut new_mapper());
    all_returns_detached_copies(&mut new_mapper());
    first_and_last_follow_id_order(&mut new_mapper());
    first_and_last_are_none_when_empty(&mut new_mapper());
    count_reflects_stored_entities(&mut new_mapper());
    reload_returns_a_fresh_instance(&mut new_mapper());
    update_merges_attributes(&mut new_mapper());
    update_rejects_an_invalid_entity(&mut new_mapper());
    update_strict_raises_on_an_invalid_entity(&mut new_mapper());
    update_without_an_id_fails(&mut new_mapper());
    update_after_delete_all_fails(&mut new_mapper());
    delete_removes_and_clears_identity(&mut new_mapper());
    delete_without_an_id_fails(&mut new_mapper());
    delete_with_an_unknown_id_fails(&mut new_mapper());
    delete_by_id_removes_the_entity(&mut new_mapper());
    delete_by_id_fails_when_absent(&mut new_mapper());
    delete_all_empties_the_mapper(&mut new_mapper());
    round_trip_preserves_attributes(&mut new_mapper());
    lifecycle_scenario(&mut new_mapper());
}

pub fn create_assigns_increasing_ids<M: Mapper<SampleEntity>>(mapper: &mut M) {
    let mut first = SampleEntity::valid();
    assert_eq!(first.id(), None);
    let first_id = mapper.create(&mut first).unwrap().expect("valid entity");
    assert!(first_id.as_i64() > 0);
    assert_eq!(first.id(), Some(first_id));

    let mut second = SampleEntity::valid();
    let second_id = mapper.create(&mut second).unwrap().expect("valid entity");
    assert_eq!(second_id.as_i64(), first_id.as_i64() + 1);
}

pub fn create_marks_the_entity_persisted<M: Mapper<SampleEntity>>(mapper: &mut M) {
    let mut entity = SampleEntity::valid();
    assert!(!entity.is_persisted());
    mapper.create(&mut entity).unwrap().expect("valid entity");
    assert!(entity.is_persisted());
}

pub fn create_does_not_store_by_reference<M: Mapper<SampleEntity>>(mapper: &mut M) {
    let mut entity = SampleEntity::valid();
    mapper.create(&mut entity).unwrap().expect("valid entity");

    entity.merge_attributes(attrs! { "name" => "changed afterwards" });
    let stored = mapper.last().unwrap().expect("one entity stored");
    assert_eq!(stored.name(), Some("test"));
}

pub fn create_rejects_an_invalid_entity<M: Mapper<SampleEntity>>(mapper: &mut M) {
    let mut entity = SampleEntity::valid();
    entity.make_invalid();

    assert_eq!(mapper.create(&mut entity).unwrap(), None);
    assert_eq!(entity.id(), None);
    assert!(!entity.is_persisted());
    assert_eq!(mapper.count().unwrap(), 0);
}

pub fn create_strict_raises_on_an_invalid_entity<M: Mapper<SampleEntity>>(mapper: &mut M) {
    let mut entity = SampleEntity::valid();
    entity.make_invalid();

    let err = mapper.create_strict(&mut entity).unwrap_err();
    assert!(matches!(err, MapperError::EntityInvalid(_)));

    let mut valid = SampleEntity::valid();
    let id = mapper.create_strict(&mut valid).unwrap();
    assert!(id.as_i64() > 0);
}

pub fn find_returns_a_matching_entity<M: Mapper<SampleEntity>>(mapper: &mut M) {
    let mut entity = SampleEntity::valid();
    let id = mapper.create(&mut entity).unwrap().expect("valid entity");

    let found = mapper.find(id).unwrap();
    assert_eq!(found.id(), Some(id));
    assert_eq!(found.name(), Some("test"));
    assert!(found.is_persisted());
}

pub fn find_returns_detached_copies<M: Mapper<SampleEntity>>(mapper: &mut M) {
    let mut entity = SampleEntity::valid();
    let id = mapper.create(&mut entity).unwrap().expect("valid entity");

    let mut fetched = mapper.find(id).unwrap();
    fetched.merge_attributes(attrs! { "name" => "scribbled" });

    assert_eq!(mapper.find(id).unwrap().name(), Some("test"));
}

pub fn find_fails_when_absent<M: Mapper<SampleEntity>>(mapper: &mut M) {
    let err = mapper.find(EntityId::new(-1)).unwrap_err();
    assert!(matches!(
        err,
        MapperError::EntityNotFound { id: Some(id) } if id == EntityId::new(-1)
    ));
}

pub fn find_by_id_returns_none_when_absent<M: Mapper<SampleEntity>>(mapper: &mut M) {
    assert!(mapper.find_by_id(EntityId::new(-1)).unwrap().is_none());

    let mut entity = SampleEntity::valid();
    let id = mapper.create(&mut entity).unwrap().expect("valid entity");
    let found = mapper.find_by_id(id).unwrap().expect("present");
    assert_eq!(found.id(), Some(id));
}

pub fn all_is_idempotent_and_ordered<M: Mapper<SampleEntity>>(mapper: &mut M) {
    let mut first = SampleEntity::valid();
    let mut second = SampleEntity::valid();
    mapper.create(&mut first).unwrap().expect("valid entity");
    mapper.create(&mut second).unwrap().expect("valid entity");

    let once: Vec<_> = mapper.all().unwrap().iter().map(EntityCore::id).collect();
    let twice: Vec<_> = mapper.all().unwrap().iter().map(EntityCore::id).collect();

    assert_eq!(once, vec![first.id(), second.id()]);
    assert_eq!(once, twice);
}

pub fn all_returns_detached_copies<M: Mapper<SampleEntity>>(mapper: &mut M) {
    let mut entity = SampleEntity::valid();
    mapper.create(&mut entity).unwrap().expect("valid entity");

    let mut fetched = mapper.all().unwrap();
    fetched[0].merge_attributes(attrs! { "name" => "scribbled" });

    assert_eq!(mapper.all().unwrap()[0].name(), Some("test"));
}

pub fn first_and_last_follow_id_order<M: Mapper<SampleEntity>>(mapper: &mut M) {
    let mut first = SampleEntity::valid();
    let mut second = SampleEntity::valid();
    mapper.create(&mut first).unwrap().expect("valid entity");
    mapper.create(&mut second).unwrap().expect("valid entity");

    assert_eq!(mapper.first().unwrap().expect("non-empty").id(), first.id());
    assert_eq!(mapper.last().unwrap().expect("non-empty").id(), second.id());
}

pub fn first_and_last_are_none_when_empty<M: Mapper<SampleEntity>>(mapper: &mut M) {
    assert!(mapper.first().unwrap().is_none());
    assert!(mapper.last().unwrap().is_none());
}

pub fn count_reflects_stored_entities<M: Mapper<SampleEntity>>(mapper: &mut M) {
    assert_eq!(mapper.count().unwrap(), 0);
    let mut first = SampleEntity::valid();
    let mut second = SampleEntity::valid();
    mapper.create(&mut first).unwrap().expect("valid entity");
    mapper.create(&mut second).unwrap().expect("valid entity");
    assert_eq!(mapper.count().unwrap(), 2);
}

pub fn reload_returns_a_fresh_instance<M: Mapper<SampleEntity>>(mapper: &mut M) {
    let mut entity = SampleEntity::valid();
    mapper.create(&mut entity).unwrap().expect("valid entity");

    entity.merge_attributes(attrs! { "name" => "locally changed" });
    let reloaded = mapper.reload(&entity).unwrap();

    assert_eq!(reloaded.name(), Some("test"));
    assert_eq!(entity.name(), Some("locally changed"));
}

pub fn update_merges_attributes<M: Mapper<SampleEntity>>(mapper: &mut M) {
    let mut entity = SampleEntity::with_attributes(attrs! { "name" => "test", "size" => 3 });
    let id = mapper.create(&mut entity).unwrap().expect("valid entity");

    let mut sparse = SampleEntity::with_attributes(attrs! { "color" => "blue" });
    sparse.set_id(Some(id));
    assert!(mapper.update(&mut sparse).unwrap());

    let stored = mapper.find(id).unwrap();
    assert_eq!(stored.name(), Some("test"));
    assert_eq!(stored.attributes().get("size"), Some(&AttrValue::from(3)));
    assert_eq!(stored.attributes().get("color"), Some(&AttrValue::from("blue")));
}

pub fn update_rejects_an_invalid_entity<M: Mapper<SampleEntity>>(mapper: &mut M) {
    let mut entity = SampleEntity::valid();
    mapper.create(&mut entity).unwrap().expect("valid entity");

    entity.merge_attributes(attrs! { "name" => "updated" });
    entity.make_invalid();

    assert!(!mapper.update(&mut entity).unwrap());
    assert_eq!(mapper.last().unwrap().expect("stored").name(), Some("test"));
}

pub fn update_strict_raises_on_an_invalid_entity<M: Mapper<SampleEntity>>(mapper: &mut M) {
    let mut entity = SampleEntity::valid();
    mapper.create(&mut entity).unwrap().expect("valid entity");

    entity.make_invalid();
    let err = mapper.update_strict(&mut entity).unwrap_err();
    assert!(matches!(err, MapperError::EntityInvalid(_)));
}

pub fn update_without_an_id_fails<M: Mapper<SampleEntity>>(mapper: &mut M) {
    let mut entity = SampleEntity::valid();
    let err = mapper.update(&mut entity).unwrap_err();
    assert!(matches!(err, MapperError::EntityNotFound { .. }));
}

pub fn update_after_delete_all_fails<M: Mapper<SampleEntity>>(mapper: &mut M) {
    let mut entity = SampleEntity::valid();
    mapper.create(&mut entity).unwrap().expect("valid entity");
    mapper.delete_all().unwrap();

    let err = mapper.update(&mut entity).unwrap_err();
    assert!(matches!(err, MapperError::EntityNotFound { .. }));
}

pub fn delete_removes_and_clears_identity<M: Mapper<SampleEntity>>(mapper: &mut M) {
    let mut doomed = SampleEntity::valid();
    let mut kept = SampleEntity::valid();
    let doomed_id = mapper.create(&mut doomed).unwrap().expect("valid entity");
    mapper.create(&mut kept).unwrap().expect("valid entity");

    mapper.delete(&mut doomed).unwrap();

    assert_eq!(doomed.id(), None);
    assert!(!doomed.is_persisted());
    assert_eq!(doomed.name(), Some("test"));
    assert_eq!(mapper.count().unwrap(), 1);
    assert!(mapper.find_by_id(doomed_id).unwrap().is_none());
    assert_eq!(mapper.first().unwrap().expect("kept").id(), kept.id());
}

pub fn delete_without_an_id_fails<M: Mapper<SampleEntity>>(mapper: &mut M) {
    let mut entity = SampleEntity::valid();
    let err = mapper.delete(&mut entity).unwrap_err();
    assert!(matches!(err, MapperError::EntityNotFound { id: None }));
}

pub fn delete_with_an_unknown_id_fails<M: Mapper<SampleEntity>>(mapper: &mut M) {
    let mut entity = SampleEntity::valid();
    entity.set_id(Some(EntityId::new(-1)));
    let err = mapper.delete(&mut entity).unwrap_err();
    assert!(matches!(err, MapperError::EntityNotFound { .. }));
}

pub fn delete_by_id_removes_the_entity<M: Mapper<SampleEntity>>(mapper: &mut M) {
    let mut doomed = SampleEntity::valid();
    let mut kept = SampleEntity::valid();
    let doomed_id = mapper.create(&mut doomed).unwrap().expect("valid entity");
    mapper.create(&mut kept).unwrap().expect("valid entity");

    mapper.delete_by_id(doomed_id).unwrap();

    assert_eq!(mapper.all().unwrap().len(), 1);
    assert_eq!(mapper.first().unwrap().expect("kept").id(), kept.id());
}

pub fn delete_by_id_fails_when_absent<M: Mapper<SampleEntity>>(mapper: &mut M) {
    let err = mapper.delete_by_id(EntityId::new(-1)).unwrap_err();
    assert!(matches!(err, MapperError::EntityNotFound { .. }));
}

pub fn delete_all_empties_the_mapper<M: Mapper<SampleEntity>>(mapper: &mut M) {
    let mut entity = SampleEntity::valid();
    mapper.create(&mut entity).unwrap().expect("valid entity");

    mapper.delete_all().unwrap();
    assert!(mapper.all().unwrap().is_empty());

    // Unconditional: clearing an already-empty mapper succeeds.
    mapper.delete_all().unwrap();
}

pub fn round_trip_preserves_attributes<M: Mapper<SampleEntity>>(mapper: &mut M) {
    let mut entity = SampleEntity::valid();
    let id = mapper.create(&mut entity).unwrap().expect("valid entity");

    let found = mapper.find(id).unwrap();
    assert_eq!(found.name(), Some("test"));
    assert_eq!(found.id(), entity.id());
}

/// The full lifecycle on a fresh mapper: two creates get ids 1 and 2,
/// first/last/count line up, and deleting the first promotes the second.
pub fn lifecycle_scenario<M: Mapper<SampleEntity>>(mapper: &mut M) {
    let mut a = SampleEntity::valid();
    let mut b = SampleEntity::valid();

    assert_eq!(mapper.create(&mut a).unwrap(), Some(EntityId::new(1)));
    assert_eq!(mapper.create(&mut b).unwrap(), Some(EntityId::new(2)));

    assert_eq!(mapper.first().unwrap().expect("a").id(), Some(EntityId::new(1)));
    assert_eq!(mapper.last().unwrap().expect("b").id(), Some(EntityId::new(2)));
    assert_eq!(mapper.count().unwrap(), 2);

    mapper.delete_by_id(EntityId::new(1)).unwrap();

    assert_eq!(mapper.count().unwrap(), 1);
    assert_eq!(mapper.first().unwrap().expect("b").id(), Some(EntityId::new(2)));
}
