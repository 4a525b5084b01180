//! Lifecycle hooks around persistent-mapper saves.

/// Extension points around the persistent mapper's control flow, injected
/// at construction. Every method is a no-op by default.
///
/// Protocol: `before_save` runs before every attempted write; `after_save`
/// only after a successful write; `after_create` only after a successful
/// write of a new record; `after_find` on every hydration of an entity
/// from a record.
pub trait MapperHooks<E, R> {
    fn before_save(&self, _entity: &mut E, _record: &mut R) {}

    fn after_save(&self, _entity: &mut E, _record: &R) {}

    fn after_create(&self, _entity: &mut E, _record: &R) {}

    fn after_find(&self, _entity: &mut E, _record: &R) {}
}

/// The default, do-nothing hook set.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl<E, R> MapperHooks<E, R> for NoHooks {}
