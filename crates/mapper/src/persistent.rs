//! Persistent mapper over a relational record store.

use std::marker::PhantomData;

use tracing::debug;

use strata_core::{AttrMap, EntityCore, EntityId, MapperError, MapperResult};

use crate::hooks::{MapperHooks, NoHooks};
use crate::mapper::Mapper;
use crate::record::{Record, RecordStore};
use crate::repository::MapperClear;

/// Bridges entities and backing-store records: copies attributes across,
/// runs store-side validation, and surfaces failures on the entity without
/// duplicating validation logic.
///
/// The entity and store types are fixed at construction — an explicit,
/// statically-declared association. Hooks are an injected strategy and
/// default to [`NoHooks`].
pub struct RecordMapper<E, S, H = NoHooks> {
    store: S,
    hooks: H,
    _entity: PhantomData<fn() -> E>,
}

impl<E, S> RecordMapper<E, S, NoHooks> {
    pub fn new(store: S) -> Self {
        Self::with_hooks(store, NoHooks)
    }
}

impl<E, S, H> RecordMapper<E, S, H> {
    pub fn with_hooks(store: S, hooks: H) -> Self {
        Self {
            store,
            hooks,
            _entity: PhantomData,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn into_store(self) -> S {
        self.store
    }
}

impl<E, S, H> RecordMapper<E, S, H>
where
    E: EntityCore + Default,
    S: RecordStore,
    H: MapperHooks<E, S::Record>,
{
    /// Entity attributes minus the ones the schema marks non-writable.
    /// Protected keys are dropped silently; they must never reach the
    /// store and never fail the operation by themselves.
    fn accessible_attributes(&self, entity: &E) -> AttrMap {
        let protected = self.store.protected_attributes();
        entity
            .attributes()
            .iter()
            .filter(|(key, _)| !protected.contains(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    fn copy_attributes_to_record(&self, record: &mut S::Record, entity: &E) {
        record.merge_attributes(self.accessible_attributes(entity));
    }

    fn validate_record_onto_entity(&self, record: &S::Record, entity: &mut E) -> MapperResult<()> {
        let errors = self.store.validate(record)?;
        entity.set_mapper_errors(errors);
        Ok(())
    }

    /// Fresh entity hydrated from a record's current attributes.
    fn entity_for(&self, record: &S::Record) -> E {
        let mut entity = E::default();
        entity.set_id(record.id());
        entity.mark_as_persisted();
        entity.merge_attributes(record.attributes().clone());
        self.hooks.after_find(&mut entity, record);
        entity
    }
}

impl<E, S, H> Mapper<E> for RecordMapper<E, S, H>
where
    E: EntityCore + Default,
    S: RecordStore,
    H: MapperHooks<E, S::Record>,
{
    fn create(&mut self, entity: &mut E) -> MapperResult<Option<EntityId>> {
        if !entity.is_valid() {
            return Ok(None);
        }

        let mut record = self.store.new_record();
        self.hooks.before_save(entity, &mut record);
        self.copy_attributes_to_record(&mut record, entity);
        self.validate_record_onto_entity(&record, entity)?;

        if !entity.is_valid() {
            return Ok(None);
        }

        let id = self.store.save(&mut record)?;
        entity.mark_as_persisted();
        entity.set_id(Some(id));
        debug!(id = id.as_i64(), "created record");
        self.hooks.after_save(entity, &record);
        self.hooks.after_create(entity, &record);
        Ok(Some(id))
    }

    fn find_by_id(&self, id: EntityId) -> MapperResult<Option<E>> {
        let record = self.store.find_record(id)?;
        Ok(record.map(|record| self.entity_for(&record)))
    }

    fn all(&self) -> MapperResult<Vec<E>> {
        let records = self.store.all_records()?;
        Ok(records.iter().map(|record| self.entity_for(record)).collect())
    }

    fn first(&self) -> MapperResult<Option<E>> {
        Ok(self
            .store
            .first_record()?
            .map(|record| self.entity_for(&record)))
    }

    fn last(&self) -> MapperResult<Option<E>> {
        Ok(self
            .store
            .last_record()?
            .map(|record| self.entity_for(&record)))
    }

    fn count(&self) -> MapperResult<u64> {
        Ok(self.store.count()?)
    }

    fn update(&mut self, entity: &mut E) -> MapperResult<bool> {
        let id = entity.id().ok_or(MapperError::not_found(None))?;
        let mut record = self
            .store
            .find_record(id)?
            .ok_or(MapperError::not_found(id))?;

        if !entity.is_valid() {
            return Ok(false);
        }

        self.hooks.before_save(entity, &mut record);
        self.copy_attributes_to_record(&mut record, entity);
        self.validate_record_onto_entity(&record, entity)?;

        if !entity.is_valid() {
            return Ok(false);
        }

        self.store.save(&mut record)?;
        debug!(id = id.as_i64(), "updated record");
        self.hooks.after_save(entity, &record);
        Ok(true)
    }

    fn delete(&mut self, entity: &mut E) -> MapperResult<()> {
        let id = entity.id().ok_or(MapperError::not_found(None))?;
        self.delete_by_id(id)?;
        entity.set_id(None);
        entity.mark_as_not_persisted();
        Ok(())
    }

    fn delete_by_id(&mut self, id: EntityId) -> MapperResult<()> {
        if self.store.delete(id)? {
            debug!(id = id.as_i64(), "deleted record");
            Ok(())
        } else {
            Err(MapperError::not_found(id))
        }
    }

    fn delete_all(&mut self) -> MapperResult<()> {
        Ok(self.store.delete_all()?)
    }
}

impl<E, S, H> MapperClear for RecordMapper<E, S, H>
where
    E: EntityCore + Default + 'static,
    S: RecordStore + 'static,
    H: MapperHooks<E, S::Record> + 'static,
{
    fn delete_all(&mut self) -> MapperResult<()> {
        Mapper::delete_all(self)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    use strata_core::{AttrKey, AttrValue, Entity, MapperErrors, attrs};

    use super::*;
    use crate::record::BackendResult;

    #[derive(Debug, Clone, Default)]
    struct FakeRecord {
        id: Option<EntityId>,
        attributes: AttrMap,
    }

    impl Record for FakeRecord {
        fn id(&self) -> Option<EntityId> {
            self.id
        }

        fn attributes(&self) -> &AttrMap {
            &self.attributes
        }

        fn merge_attributes(&mut self, attrs: AttrMap) {
            self.attributes.extend(attrs);
        }
    }

    /// Row store with a uniqueness rule and a protected-attribute list,
    /// mirroring what a relational schema would enforce.
    #[derive(Debug, Default)]
    struct FakeStore {
        rows: BTreeMap<i64, AttrMap>,
        next_id: i64,
        protected: Vec<AttrKey>,
        unique: Vec<AttrKey>,
    }

    impl FakeStore {
        fn with_unique(key: &str) -> Self {
            Self {
                unique: vec![AttrKey::new(key)],
                ..Self::default()
            }
        }

        fn with_protected(key: &str) -> Self {
            Self {
                protected: vec![AttrKey::new(key)],
                ..Self::default()
            }
        }
    }

    impl RecordStore for FakeStore {
        type Record = FakeRecord;

        fn new_record(&self) -> FakeRecord {
            FakeRecord::default()
        }

        fn find_record(&self, id: EntityId) -> BackendResult<Option<FakeRecord>> {
            Ok(self.rows.get(&id.as_i64()).map(|attrs| FakeRecord {
                id: Some(id),
                attributes: attrs.clone(),
            }))
        }

        fn validate(&self, record: &FakeRecord) -> BackendResult<MapperErrors> {
            let mut errors = MapperErrors::new();
            for key in &self.unique {
                let Some(value) = record.attributes.get(key.as_str()) else {
                    continue;
                };
                let taken = self.rows.iter().any(|(row_id, attrs)| {
                    Some(EntityId::new(*row_id)) != record.id && attrs.get(key.as_str()) == Some(value)
                });
                if taken {
                    errors.push(key.clone(), "has already been taken");
                }
            }
            Ok(errors)
        }

        fn save(&mut self, record: &mut FakeRecord) -> BackendResult<EntityId> {
            let id = match record.id {
                Some(id) => id,
                None => {
                    self.next_id += 1;
                    let id = EntityId::new(self.next_id);
                    record.id = Some(id);
                    id
                }
            };
            self.rows.insert(id.as_i64(), record.attributes.clone());
            Ok(id)
        }

        fn delete(&mut self, id: EntityId) -> BackendResult<bool> {
            Ok(self.rows.remove(&id.as_i64()).is_some())
        }

        fn all_records(&self) -> BackendResult<Vec<FakeRecord>> {
            Ok(self
                .rows
                .iter()
                .map(|(id, attrs)| FakeRecord {
                    id: Some(EntityId::new(*id)),
                    attributes: attrs.clone(),
                })
                .collect())
        }

        fn first_record(&self) -> BackendResult<Option<FakeRecord>> {
            Ok(self.all_records()?.into_iter().next())
        }

        fn last_record(&self) -> BackendResult<Option<FakeRecord>> {
            Ok(self.all_records()?.into_iter().last())
        }

        fn count(&self) -> BackendResult<u64> {
            Ok(self.rows.len() as u64)
        }

        fn delete_all(&mut self) -> BackendResult<()> {
            self.rows.clear();
            Ok(())
        }

        fn protected_attributes(&self) -> Vec<AttrKey> {
            self.protected.clone()
        }
    }

    #[derive(Default)]
    struct RecordingHooks {
        calls: RefCell<Vec<&'static str>>,
    }

    impl MapperHooks<Entity, FakeRecord> for RecordingHooks {
        fn before_save(&self, _entity: &mut Entity, _record: &mut FakeRecord) {
            self.calls.borrow_mut().push("before_save");
        }

        fn after_save(&self, _entity: &mut Entity, _record: &FakeRecord) {
            self.calls.borrow_mut().push("after_save");
        }

        fn after_create(&self, _entity: &mut Entity, _record: &FakeRecord) {
            self.calls.borrow_mut().push("after_create");
        }

        fn after_find(&self, _entity: &mut Entity, _record: &FakeRecord) {
            self.calls.borrow_mut().push("after_find");
        }
    }

    fn mapper() -> RecordMapper<Entity, FakeStore> {
        RecordMapper::new(FakeStore::default())
    }

    fn entity_with(attrs: AttrMap) -> Entity {
        Entity::with_attributes(attrs)
    }

    #[test]
    fn create_copies_uniqueness_errors_onto_entity() {
        let mut mapper = RecordMapper::new(FakeStore::with_unique("email"));

        let mut first = entity_with(attrs! { "email" => "joe@example.com" });
        mapper.create(&mut first).unwrap();
        assert!(first.mapper_errors().is_empty());

        let mut second = entity_with(attrs! { "email" => "joe@example.com" });
        assert_eq!(mapper.create(&mut second).unwrap(), None);
        assert_eq!(second.id(), None);
        assert!(!second.is_persisted());

        let errors: Vec<_> = second.mapper_errors().iter().cloned().collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, AttrKey::new("email"));
        assert_eq!(errors[0].message, "has already been taken");
    }

    #[test]
    fn create_revalidates_once_errors_are_cleared() {
        let mut mapper = RecordMapper::new(FakeStore::with_unique("email"));

        let mut first = entity_with(attrs! { "email" => "joe@example.com" });
        mapper.create(&mut first).unwrap();

        let mut second = entity_with(attrs! { "email" => "joe@example.com" });
        assert_eq!(mapper.create(&mut second).unwrap(), None);

        second.merge_attributes(attrs! { "email" => "other@example.com" });
        second.set_mapper_errors(MapperErrors::new());
        let id = mapper.create(&mut second).unwrap();
        assert!(id.is_some());
        assert!(second.is_valid());
    }

    #[test]
    fn protected_attributes_never_reach_the_store() {
        let mut mapper: RecordMapper<Entity, FakeStore> =
            RecordMapper::new(FakeStore::with_protected("visible"));

        let mut entity = entity_with(attrs! { "visible" => true, "name" => "Joe" });
        let id = mapper.create(&mut entity).unwrap().expect("valid entity");

        let stored = mapper.find(id).unwrap();
        assert_eq!(stored.get("visible"), None);
        assert_eq!(stored.get("name"), Some(&AttrValue::from("Joe")));
    }

    #[test]
    fn update_filters_protected_attributes_too() {
        let mut mapper: RecordMapper<Entity, FakeStore> =
            RecordMapper::new(FakeStore::with_protected("visible"));

        let mut entity = entity_with(attrs! { "name" => "Joe" });
        mapper.create(&mut entity).unwrap().expect("valid entity");

        entity.merge_attributes(attrs! { "visible" => true, "name" => "Jane" });
        assert!(mapper.update(&mut entity).unwrap());

        let stored = mapper.reload(&entity).unwrap();
        assert_eq!(stored.get("visible"), None);
        assert_eq!(stored.get("name"), Some(&AttrValue::from("Jane")));
    }

    #[test]
    fn create_fires_save_hooks_exactly_once_in_order() {
        let mut mapper = RecordMapper::with_hooks(FakeStore::default(), RecordingHooks::default());

        let mut entity = entity_with(attrs! { "name" => "test" });
        mapper.create(&mut entity).unwrap().expect("valid entity");

        assert_eq!(
            *mapper.hooks().calls.borrow(),
            ["before_save", "after_save", "after_create"]
        );
    }

    #[test]
    fn update_never_fires_after_create() {
        let mut mapper = RecordMapper::with_hooks(FakeStore::default(), RecordingHooks::default());

        let mut entity = entity_with(attrs! { "name" => "test" });
        mapper.create(&mut entity).unwrap().expect("valid entity");
        mapper.hooks().calls.borrow_mut().clear();

        assert!(mapper.update(&mut entity).unwrap());
        assert_eq!(*mapper.hooks().calls.borrow(), ["before_save", "after_save"]);
    }

    #[test]
    fn failed_validation_skips_after_save() {
        let mut mapper =
            RecordMapper::with_hooks(FakeStore::with_unique("email"), RecordingHooks::default());

        let mut first = entity_with(attrs! { "email" => "joe@example.com" });
        mapper.create(&mut first).unwrap();
        mapper.hooks().calls.borrow_mut().clear();

        let mut second = entity_with(attrs! { "email" => "joe@example.com" });
        assert_eq!(mapper.create(&mut second).unwrap(), None);
        assert_eq!(*mapper.hooks().calls.borrow(), ["before_save"]);
    }

    #[test]
    fn reads_fire_after_find_on_every_hydration() {
        let mut mapper = RecordMapper::with_hooks(FakeStore::default(), RecordingHooks::default());

        let mut entity = entity_with(attrs! { "name" => "test" });
        let id = mapper.create(&mut entity).unwrap().expect("valid entity");
        mapper.hooks().calls.borrow_mut().clear();

        mapper.find(id).unwrap();
        mapper.first().unwrap();
        assert_eq!(*mapper.hooks().calls.borrow(), ["after_find", "after_find"]);
    }

    #[test]
    fn hydrated_entities_are_marked_persisted() {
        let mut mapper = mapper();
        let mut entity = entity_with(attrs! { "name" => "test" });
        let id = mapper.create(&mut entity).unwrap().expect("valid entity");

        let found = mapper.find(id).unwrap();
        assert!(found.is_persisted());
        assert_eq!(found.id(), Some(id));
    }
}
