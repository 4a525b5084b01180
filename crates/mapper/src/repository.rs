//! Thin aggregator of named mapper instances.

use std::any::Any;
use std::collections::BTreeMap;

use strata_core::MapperResult;

/// The one repository-wide operation every registered mapper shares.
pub trait MapperClear: Any {
    fn delete_all(&mut self) -> MapperResult<()>;
}

/// Named mapper instances with a repository-wide bulk clear.
///
/// Mappers are registered under a name and retrieved by downcasting to
/// their concrete type; the repository itself only knows how to clear
/// them all.
#[derive(Default)]
pub struct Repository {
    mappers: BTreeMap<String, Box<dyn MapperClear>>,
}

impl Repository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build<N, I>(mappers: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = (N, Box<dyn MapperClear>)>,
    {
        let mut repository = Self::new();
        for (name, mapper) in mappers {
            repository.register(name, mapper);
        }
        repository
    }

    pub fn register(&mut self, name: impl Into<String>, mapper: Box<dyn MapperClear>) {
        self.mappers.insert(name.into(), mapper);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.mappers.keys().map(String::as_str)
    }

    /// Typed access to a registered mapper.
    pub fn get<M: MapperClear>(&self, name: &str) -> Option<&M> {
        self.mappers
            .get(name)
            .and_then(|mapper| (&**mapper as &dyn Any).downcast_ref())
    }

    pub fn get_mut<M: MapperClear>(&mut self, name: &str) -> Option<&mut M> {
        self.mappers
            .get_mut(name)
            .and_then(|mapper| (&mut **mapper as &mut dyn Any).downcast_mut())
    }

    /// Delete everything in every registered mapper.
    pub fn delete_all(&mut self) -> MapperResult<()> {
        for mapper in self.mappers.values_mut() {
            mapper.delete_all()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conformance::SampleEntity;
    use crate::mapper::Mapper;
    use crate::memory::MemoryMapper;

    fn repository() -> Repository {
        Repository::build([
            (
                "projects",
                Box::new(MemoryMapper::<SampleEntity>::new()) as Box<dyn MapperClear>,
            ),
            (
                "users",
                Box::new(MemoryMapper::<SampleEntity>::new()) as Box<dyn MapperClear>,
            ),
        ])
    }

    #[test]
    fn exposes_registered_mappers_by_name() {
        let mut repository = repository();

        let names: Vec<_> = repository.names().collect();
        assert_eq!(names, ["projects", "users"]);

        let projects = repository
            .get_mut::<MemoryMapper<SampleEntity>>("projects")
            .expect("registered");
        let mut entity = SampleEntity::valid();
        projects.create(&mut entity).unwrap().expect("valid entity");

        assert!(repository.get::<MemoryMapper<SampleEntity>>("missing").is_none());
    }

    #[test]
    fn delete_all_fans_out_to_every_mapper() {
        let mut repository = repository();

        for name in ["projects", "users"] {
            let mapper = repository
                .get_mut::<MemoryMapper<SampleEntity>>(name)
                .expect("registered");
            let mut entity = SampleEntity::valid();
            mapper.create(&mut entity).unwrap().expect("valid entity");
        }

        repository.delete_all().unwrap();

        for name in ["projects", "users"] {
            let mapper = repository
                .get::<MemoryMapper<SampleEntity>>(name)
                .expect("registered");
            assert_eq!(mapper.count().unwrap(), 0);
        }
    }
}
