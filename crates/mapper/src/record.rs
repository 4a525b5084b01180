//! Storage boundary for relational backends.
//!
//! The persistent mapper is generic over this boundary; it never talks to a
//! database driver directly.

use strata_core::{AttrKey, AttrMap, EntityId, MapperErrors};

/// Backend operations return opaque errors; the mapper wraps them in
/// [`strata_core::MapperError::Backend`] without reinterpreting them.
pub type BackendResult<T> = anyhow::Result<T>;

/// The backing store's native representation of one persisted entity.
/// Owned exclusively by the storage backend; only the mapper reads or
/// writes it.
pub trait Record {
    /// Identity, unset until the first save.
    fn id(&self) -> Option<EntityId>;

    /// Current record attributes (excluding the id).
    fn attributes(&self) -> &AttrMap;

    /// Merge attributes onto the record. Like the entity side, partial
    /// updates never drop previously-set keys.
    fn merge_attributes(&mut self, attrs: AttrMap);
}

/// Schema-level operations a relational backend must expose.
///
/// Validation lives here rather than on [`Record`] because rules such as
/// uniqueness need store access.
pub trait RecordStore {
    type Record: Record;

    /// A new, empty, unsaved record.
    fn new_record(&self) -> Self::Record;

    fn find_record(&self, id: EntityId) -> BackendResult<Option<Self::Record>>;

    /// Run the store's validation rules against the record, reporting
    /// per-field failures. An empty result means the record would save
    /// cleanly as far as modeled validation is concerned.
    fn validate(&self, record: &Self::Record) -> BackendResult<MapperErrors>;

    /// Insert (id unset) or update (id set) the record, assigning and
    /// returning its id. Failures here are unexpected backend errors,
    /// distinct from validation failures.
    fn save(&mut self, record: &mut Self::Record) -> BackendResult<EntityId>;

    /// Delete by id; `false` when no record matched.
    fn delete(&mut self, id: EntityId) -> BackendResult<bool>;

    /// All records, ordered by ascending id.
    fn all_records(&self) -> BackendResult<Vec<Self::Record>>;

    /// Record with the smallest id.
    fn first_record(&self) -> BackendResult<Option<Self::Record>>;

    /// Record with the largest id.
    fn last_record(&self) -> BackendResult<Option<Self::Record>>;

    fn count(&self) -> BackendResult<u64>;

    fn delete_all(&mut self) -> BackendResult<()>;

    /// Attribute names the schema marks non-writable. The mapper silently
    /// drops these before copying entity attributes onto a record.
    fn protected_attributes(&self) -> Vec<AttrKey>;
}
