//! Domain ownership for distributed execution.
//!
//! A [`Worker`] owns copies of a disjoint subset of the scene's domains.
//! Neighbour data it does not own is received at phase boundaries through
//! [`Worker::set_numerical_data`], which accepts exactly the worker's
//! dependency set.

use indexmap::{IndexMap, IndexSet};
use pstd_core::{DependencyError, DomainId, FieldState, WorkerId};
use pstd_scene::{Domain, DomainSnapshot, Scene};

use crate::phase::{FieldLookup, SlabSource};

/// An execution unit owning a subset of domains.
#[derive(Clone, Debug)]
pub struct Worker {
    id: WorkerId,
    owned: IndexMap<DomainId, Domain>,
    dependencies: IndexSet<DomainId>,
    remote: IndexMap<DomainId, DomainSnapshot>,
}

impl Worker {
    /// Worker with no domains.
    pub fn new(id: WorkerId) -> Self {
        Self {
            id,
            owned: IndexMap::new(),
            dependencies: IndexSet::new(),
            remote: IndexMap::new(),
        }
    }

    /// Take ownership of a copy of `domain`.
    pub fn assign(&mut self, domain: &Domain) {
        self.owned.insert(domain.id(), domain.clone());
        self.remote.shift_remove(&domain.id());
        self.recompute_dependencies();
    }

    fn recompute_dependencies(&mut self) {
        self.dependencies = self
            .owned
            .values()
            .flat_map(|d| d.neighbours().keys().copied())
            .filter(|id| !self.owned.contains_key(id))
            .collect();
        self.dependencies.sort();
    }

    /// Worker identifier.
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Ids of the owned domains, in assignment order.
    pub fn owned(&self) -> impl Iterator<Item = DomainId> + '_ {
        self.owned.keys().copied()
    }

    /// The owned domain `id`.
    pub fn domain(&self, id: DomainId) -> Option<&Domain> {
        self.owned.get(&id)
    }

    /// Neighbour ids referenced by owned domains but owned elsewhere,
    /// sorted ascending.
    pub fn dependencies(&self) -> &IndexSet<DomainId> {
        &self.dependencies
    }

    /// Overwrite the live arrays of owned domain `id`. Returns false if
    /// the domain is not owned, is rigid, or the shape differs.
    pub fn load(&mut self, id: DomainId, fields: &FieldState) -> bool {
        self.owned
            .get_mut(&id)
            .is_some_and(|domain| domain.load_fields(fields))
    }

    /// Current data of every owned domain, for workers depending on it.
    pub fn get_numerical_data(&self) -> IndexMap<DomainId, DomainSnapshot> {
        self.owned
            .iter()
            .map(|(&id, domain)| (id, domain.snapshot()))
            .collect()
    }

    /// Install neighbour data. The key set must equal
    /// [`dependencies`](Self::dependencies) exactly; on mismatch nothing
    /// is installed.
    pub fn set_numerical_data(
        &mut self,
        data: IndexMap<DomainId, DomainSnapshot>,
    ) -> Result<(), DependencyError> {
        let missing: Vec<DomainId> = self
            .dependencies
            .iter()
            .copied()
            .filter(|id| !data.contains_key(id))
            .collect();
        let mut unexpected: Vec<DomainId> = data
            .keys()
            .copied()
            .filter(|id| !self.dependencies.contains(id))
            .collect();
        if !missing.is_empty() || !unexpected.is_empty() {
            unexpected.sort();
            return Err(DependencyError::Mismatch {
                worker: self.id,
                missing,
                unexpected,
            });
        }
        self.remote = data;
        Ok(())
    }
}

impl FieldLookup for Worker {
    fn slab_source(&self, id: DomainId) -> Option<SlabSource<'_>> {
        if let Some(d) = self.owned.get(&id) {
            return Some(SlabSource {
                origin: d.origin(),
                shape: d.shape(),
                rho: d.rho(),
                rigid: d.is_rigid(),
                fields: d.fields(),
            });
        }
        self.remote.get(&id).map(|s| SlabSource {
            origin: s.origin,
            shape: s.shape,
            rho: s.rho,
            rigid: s.rigid,
            fields: &s.fields,
        })
    }
}

/// Assign every domain of `scene` to one of `worker_count` workers,
/// round-robin in registration order. A count of zero is treated as one.
pub fn distribute(scene: &Scene, worker_count: usize) -> Vec<Worker> {
    let count = worker_count.max(1);
    let mut workers: Vec<Worker> = (0..count)
        .map(|i| Worker::new(WorkerId(i as u32)))
        .collect();
    for (i, domain) in scene.domains().iter().enumerate() {
        workers[i % count].assign(domain);
    }
    workers
}

#[cfg(test)]
mod tests {
    use super::*;
    use pstd_test_utils::fixtures;

    #[test]
    fn strip_dependencies_are_adjacent_domains() {
        let scene = fixtures::strip(4, 2, 2);
        let workers = distribute(&scene, 2);
        // Worker 0 owns 0 and 2; both border domains of worker 1.
        let deps: Vec<_> = workers[0].dependencies().iter().copied().collect();
        assert_eq!(deps, vec![DomainId(1), DomainId(3)]);
        let deps: Vec<_> = workers[1].dependencies().iter().copied().collect();
        assert_eq!(deps, vec![DomainId(0), DomainId(2)]);
    }

    #[test]
    fn single_worker_has_no_dependencies() {
        let scene = fixtures::strip(3, 2, 2);
        let mut workers = distribute(&scene, 0);
        assert_eq!(workers.len(), 1);
        assert!(workers[0].dependencies().is_empty());
        assert!(workers[0].set_numerical_data(IndexMap::new()).is_ok());
    }

    #[test]
    fn exchange_rejects_missing_and_extra_keys() {
        let scene = fixtures::strip(3, 2, 2);
        let mut workers = distribute(&scene, 3);
        let data = workers[0].get_numerical_data();
        // Worker 1 depends on 0 and 2; give it only 0 plus its own domain.
        let mut partial = data.clone();
        partial.extend(workers[1].get_numerical_data());
        match workers[1].set_numerical_data(partial) {
            Err(DependencyError::Mismatch {
                worker,
                missing,
                unexpected,
            }) => {
                assert_eq!(worker, WorkerId(1));
                assert_eq!(missing, vec![DomainId(2)]);
                assert_eq!(unexpected, vec![DomainId(1)]);
            }
            other => panic!("expected Mismatch, got {other:?}"),
        }
    }

    #[test]
    fn lookup_prefers_owned_then_remote() {
        let scene = fixtures::strip(2, 2, 2);
        let mut workers = distribute(&scene, 2);
        assert!(workers[0].slab_source(DomainId(1)).is_none());
        let data = workers[1].get_numerical_data();
        workers[0].set_numerical_data(data).unwrap();
        assert!(workers[0].slab_source(DomainId(0)).is_some());
        assert!(workers[0].slab_source(DomainId(1)).is_some());
    }
}
