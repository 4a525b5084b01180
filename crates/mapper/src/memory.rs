//! In-memory mapper for fast, dependency-free tests.

use tracing::debug;

use strata_core::{EntityCore, EntityId, MapperError, MapperResult};

use crate::mapper::Mapper;
use crate::repository::MapperClear;

/// Behavior-equivalent substitute for the persistent mapper, backed by an
/// in-process sequence of entity snapshots plus an id counter starting
/// at 0.
///
/// Every read hands out a detached clone, so callers can never mutate
/// internal state through returned entities. That copy isolation is the
/// invariant that makes this more than a plain list.
///
/// Not safe for unsynchronized concurrent mutation: the snapshot sequence
/// and the id counter are plain mutable state, deliberately unlocked to
/// keep test runs fast. Callers sharing one instance across threads must
/// provide their own serialization.
#[derive(Debug)]
pub struct MemoryMapper<E> {
    store: Vec<E>,
    last_id: i64,
}

impl<E> MemoryMapper<E> {
    pub fn new() -> Self {
        Self {
            store: Vec::new(),
            last_id: 0,
        }
    }

    fn next_id(&mut self) -> EntityId {
        self.last_id += 1;
        EntityId::new(self.last_id)
    }
}

impl<E> Default for MemoryMapper<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: EntityCore> MemoryMapper<E> {
    fn position(&self, id: EntityId) -> Option<usize> {
        self.store.iter().position(|entity| entity.id() == Some(id))
    }
}

impl<E: EntityCore + Clone> Mapper<E> for MemoryMapper<E> {
    fn create(&mut self, entity: &mut E) -> MapperResult<Option<EntityId>> {
        if !entity.is_valid() {
            return Ok(None);
        }

        let id = self.next_id();
        entity.set_id(Some(id));
        entity.mark_as_persisted();
        self.store.push(entity.clone());
        debug!(id = id.as_i64(), "stored entity snapshot");
        Ok(Some(id))
    }

    fn find_by_id(&self, id: EntityId) -> MapperResult<Option<E>> {
        Ok(self.position(id).map(|ix| self.store[ix].clone()))
    }

    fn all(&self) -> MapperResult<Vec<E>> {
        Ok(self.store.clone())
    }

    fn first(&self) -> MapperResult<Option<E>> {
        Ok(self.store.first().cloned())
    }

    fn last(&self) -> MapperResult<Option<E>> {
        Ok(self.store.last().cloned())
    }

    fn count(&self) -> MapperResult<u64> {
        Ok(self.store.len() as u64)
    }

    fn update(&mut self, entity: &mut E) -> MapperResult<bool> {
        if !entity.is_valid() {
            return Ok(false);
        }

        let id = entity.id().ok_or(MapperError::not_found(None))?;
        let ix = self.position(id).ok_or(MapperError::not_found(id))?;
        self.store[ix].merge_attributes(entity.attributes().clone());
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
        let ix = self.position(id).ok_or(MapperError::not_found(id))?;
        self.store.remove(ix);
        Ok(())
    }

    fn delete_all(&mut self) -> MapperResult<()> {
        self.store.clear();
        Ok(())
    }
}

impl<E> MapperClear for MemoryMapper<E>
where
    E: EntityCore + Clone + 'static,
{
    fn delete_all(&mut self) -> MapperResult<()> {
        Mapper::delete_all(self)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use strata_core::{AttrValue, attrs};

    use super::*;
    use crate::conformance::{self, SampleEntity};

    #[test]
    fn conforms_to_shared_mapper_behavior() {
        conformance::check_mapper(MemoryMapper::<SampleEntity>::new);
    }

    #[test]
    fn id_counter_keeps_climbing_after_deletes() {
        let mut mapper = MemoryMapper::new();

        let mut a = SampleEntity::valid();
        mapper.create(&mut a).unwrap();
        mapper.delete(&mut a).unwrap();

        let mut b = SampleEntity::valid();
        let id = mapper.create(&mut b).unwrap().expect("valid entity");
        assert_eq!(id, EntityId::new(2));
    }

    #[test]
    fn update_merges_onto_the_stored_snapshot() {
        let mut mapper = MemoryMapper::new();

        let mut entity = SampleEntity::with_attributes(attrs! { "name" => "test", "size" => 3 });
        let id = mapper.create(&mut entity).unwrap().expect("valid entity");

        let mut sparse = SampleEntity::with_attributes(attrs! { "color" => "blue" });
        sparse.set_id(Some(id));
        assert!(mapper.update(&mut sparse).unwrap());

        let stored = mapper.find(id).unwrap();
        assert_eq!(stored.attributes().get("name"), Some(&AttrValue::from("test")));
        assert_eq!(stored.attributes().get("size"), Some(&AttrValue::from(3)));
        assert_eq!(stored.attributes().get("color"), Some(&AttrValue::from("blue")));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            ..ProptestConfig::default()
        })]

        /// Property: ids assigned by a fresh mapper are exactly 1..=n,
        /// strictly increasing, for any sequence of valid creates.
        #[test]
        fn assigned_ids_are_strictly_increasing(
            names in prop::collection::vec("[a-z]{1,8}", 1..20)
        ) {
            let mut mapper = MemoryMapper::new();
            let mut ids = Vec::new();
            for name in &names {
                let mut entity = SampleEntity::named(name);
                ids.push(mapper.create(&mut entity).unwrap().expect("valid entity"));
            }
            let expected: Vec<_> = (1..=names.len() as i64).map(EntityId::new).collect();
            prop_assert_eq!(ids, expected);
        }

        /// Property: mutating entities returned by reads never leaks back
        /// into the store.
        #[test]
        fn reads_are_copy_isolated(
            name in "[a-z]{1,8}",
            scribble in "[a-z]{1,8}"
        ) {
            let mut mapper = MemoryMapper::new();
            let mut entity = SampleEntity::named(&name);
            let id = mapper.create(&mut entity).unwrap().expect("valid entity");

            let mut fetched = mapper.find(id).unwrap();
            fetched.merge_attributes(attrs! { "name" => scribble.as_str() });

            let refetched = mapper.find(id).unwrap();
            prop_assert_eq!(refetched.name(), Some(name.as_str()));
        }
    }
}
