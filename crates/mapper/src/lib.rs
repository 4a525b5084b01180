//! `strata-mapper` — the data-mapper layer.
//!
//! Decouples domain entities from their persistence mechanism: the same
//! entity and business logic run against the relational-backed
//! [`RecordMapper`] or the in-process [`MemoryMapper`] without observable
//! behavior differences. The [`conformance`] module holds the shared
//! behavior suite that keeps the two implementations honest.

pub mod conformance;
pub mod hooks;
pub mod mapper;
pub mod memory;
pub mod persistent;
pub mod record;
pub mod repository;

pub use hooks::{MapperHooks, NoHooks};
pub use mapper::Mapper;
pub use memory::MemoryMapper;
pub use persistent::RecordMapper;
pub use record::{BackendResult, Record, RecordStore};
pub use repository::{MapperClear, Repository};
