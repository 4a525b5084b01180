//! Mapper contract shared by every storage backend.

use strata_core::{EntityCore, EntityId, MapperError, MapperResult};

/// Entity-level persistence operations.
///
/// "Not found" and "invalid" are the only recoverable failure categories,
/// and each has both a value-returning and an error-raising entry point so
/// callers choose the idiom. Anything else surfaces as
/// [`MapperError::Backend`], carried unchanged from the storage layer.
pub trait Mapper<E: EntityCore> {
    /// Persist a new entity.
    ///
    /// Returns `Ok(None)` without touching the store when the entity is
    /// invalid; otherwise assigns the generated id, marks the entity
    /// persisted, and returns the id.
    fn create(&mut self, entity: &mut E) -> MapperResult<Option<EntityId>>;

    /// Like [`Mapper::create`], but an invalid entity produces
    /// [`MapperError::EntityInvalid`] instead of `Ok(None)`.
    fn create_strict(&mut self, entity: &mut E) -> MapperResult<EntityId> {
        match self.create(entity)? {
            Some(id) => Ok(id),
            None => Err(MapperError::invalid(entity.mapper_errors().clone())),
        }
    }

    /// Fetch the entity with the given id, failing with
    /// [`MapperError::EntityNotFound`] when absent.
    ///
    /// Returns a freshly constructed entity populated from the stored
    /// record, marked persisted.
    fn find(&self, id: EntityId) -> MapperResult<E> {
        self.find_by_id(id)?.ok_or(MapperError::not_found(id))
    }

    /// Same lookup as [`Mapper::find`], but absence is `Ok(None)`.
    fn find_by_id(&self, id: EntityId) -> MapperResult<Option<E>>;

    /// Every stored entity, in store order (ascending id).
    fn all(&self) -> MapperResult<Vec<E>>;

    /// Entity with the smallest id, or `None` when the store is empty.
    fn first(&self) -> MapperResult<Option<E>>;

    /// Entity with the largest id, or `None` when the store is empty.
    fn last(&self) -> MapperResult<Option<E>>;

    /// Total number of stored records.
    fn count(&self) -> MapperResult<u64>;

    /// Fetch a fresh instance with the entity's id. Does not mutate the
    /// passed-in entity.
    fn reload(&self, entity: &E) -> MapperResult<E> {
        match entity.id() {
            Some(id) => self.find(id),
            None => Err(MapperError::not_found(None)),
        }
    }

    /// Persist changes to an existing entity.
    ///
    /// Fails with [`MapperError::EntityNotFound`] when no record matches.
    /// Returns `Ok(false)` without changing the store when the entity is
    /// invalid. Never assigns a new id.
    fn update(&mut self, entity: &mut E) -> MapperResult<bool>;

    /// Like [`Mapper::update`], but an invalid entity produces
    /// [`MapperError::EntityInvalid`] instead of `Ok(false)`.
    fn update_strict(&mut self, entity: &mut E) -> MapperResult<()> {
        if self.update(entity)? {
            Ok(())
        } else {
            Err(MapperError::invalid(entity.mapper_errors().clone()))
        }
    }

    /// Delete the entity's record, then clear the id and persisted flag on
    /// the passed-in entity. Other attributes are untouched.
    fn delete(&mut self, entity: &mut E) -> MapperResult<()>;

    /// Delete by id, independent of any entity instance.
    fn delete_by_id(&mut self, id: EntityId) -> MapperResult<()>;

    /// Remove every record. Never fails for lack of records.
    fn delete_all(&mut self) -> MapperResult<()>;
}
