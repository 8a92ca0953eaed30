//! Process and resource registry.
//!
//! Assigns identifiers and tracks which processes and resources exist.
//! Edges are not the registry's concern; the allocation graph checks those
//! before asking the registry to forget a node.

use indexmap::IndexSet;
use waitgraph_types::{AllocationError, EntityKind, ProcessId, ResourceId};

/// Owns the set of live processes and resources.
///
/// Identifiers come from monotonic counters starting at 1 and are never
/// reused, so a stale id held by a caller can only ever produce
/// `NotFound`, never alias a newer entity.
#[derive(Debug)]
pub struct Registry {
    next_process: u64,
    next_resource: u64,
    /// Live processes in registration order.
    processes: IndexSet<ProcessId>,
    /// Live resources in registration order.
    resources: IndexSet<ResourceId>,
    max_processes: Option<usize>,
    max_resources: Option<usize>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_limits(None, None)
    }
}

impl Registry {
    /// Create an unbounded registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with optional population limits.
    ///
    /// `None` means unbounded.
    pub fn with_limits(max_processes: Option<usize>, max_resources: Option<usize>) -> Self {
        Self {
            next_process: 1,
            next_resource: 1,
            processes: IndexSet::new(),
            resources: IndexSet::new(),
            max_processes,
            max_resources,
        }
    }

    /// Register a new process.
    pub fn register_process(&mut self) -> Result<ProcessId, AllocationError> {
        if let Some(limit) = self.max_processes {
            if self.processes.len() >= limit {
                return Err(AllocationError::CapacityExceeded {
                    kind: EntityKind::Process,
                    limit,
                });
            }
        }
        let id = ProcessId(self.next_process);
        self.next_process += 1;
        self.processes.insert(id);
        Ok(id)
    }

    /// Register a new resource.
    pub fn register_resource(&mut self) -> Result<ResourceId, AllocationError> {
        if let Some(limit) = self.max_resources {
            if self.resources.len() >= limit {
                return Err(AllocationError::CapacityExceeded {
                    kind: EntityKind::Resource,
                    limit,
                });
            }
        }
        let id = ResourceId(self.next_resource);
        self.next_resource += 1;
        self.resources.insert(id);
        Ok(id)
    }

    /// Forget a process.
    pub fn unregister_process(&mut self, id: ProcessId) -> Result<(), AllocationError> {
        if self.processes.shift_remove(&id) {
            Ok(())
        } else {
            Err(AllocationError::ProcessNotFound(id))
        }
    }

    /// Forget a resource.
    pub fn unregister_resource(&mut self, id: ResourceId) -> Result<(), AllocationError> {
        if self.resources.shift_remove(&id) {
            Ok(())
        } else {
            Err(AllocationError::ResourceNotFound(id))
        }
    }

    /// Check if a process is registered.
    pub fn contains_process(&self, id: ProcessId) -> bool {
        self.processes.contains(&id)
    }

    /// Check if a resource is registered.
    pub fn contains_resource(&self, id: ResourceId) -> bool {
        self.resources.contains(&id)
    }

    /// Iterate over processes in registration order.
    pub fn processes(&self) -> impl Iterator<Item = ProcessId> + '_ {
        self.processes.iter().copied()
    }

    /// Iterate over resources in registration order.
    pub fn resources(&self) -> impl Iterator<Item = ResourceId> + '_ {
        self.resources.iter().copied()
    }

    /// Number of live processes.
    pub fn process_count(&self) -> usize {
        self.processes.len()
    }

    /// Number of live resources.
    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use waitgraph_types::ErrorKind;

    #[test]
    fn test_ids_are_unique_and_never_reused() {
        let mut registry = Registry::new();

        let p1 = registry.register_process().unwrap();
        let p2 = registry.register_process().unwrap();
        assert_eq!(p1, ProcessId(1));
        assert_eq!(p2, ProcessId(2));

        registry.unregister_process(p2).unwrap();
        let p3 = registry.register_process().unwrap();
        assert_eq!(p3, ProcessId(3), "ids must not be reused after removal");

        // Processes and resources have independent counters
        assert_eq!(registry.register_resource().unwrap(), ResourceId(1));
    }

    #[test]
    fn test_unregister_unknown() {
        let mut registry = Registry::new();

        let err = registry.unregister_process(ProcessId(42)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = registry.unregister_resource(ResourceId(42)).unwrap_err();
        assert_eq!(err, AllocationError::ResourceNotFound(ResourceId(42)));
    }

    #[test]
    fn test_capacity_limits() {
        let mut registry = Registry::with_limits(Some(2), Some(1));

        registry.register_process().unwrap();
        let p = registry.register_process().unwrap();
        assert_eq!(
            registry.register_process(),
            Err(AllocationError::CapacityExceeded {
                kind: EntityKind::Process,
                limit: 2,
            })
        );
        // Failed registration does not consume capacity or corrupt the count
        assert_eq!(registry.process_count(), 2);

        // Freeing a slot makes room again
        registry.unregister_process(p).unwrap();
        assert!(registry.register_process().is_ok());

        registry.register_resource().unwrap();
        let err = registry.register_resource().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CapacityExceeded);
    }

    #[test]
    fn test_iteration_order_is_registration_order() {
        let mut registry = Registry::new();
        let ids: Vec<_> = (0..5).map(|_| registry.register_process().unwrap()).collect();

        registry.unregister_process(ids[1]).unwrap();

        let remaining: Vec<_> = registry.processes().collect();
        assert_eq!(remaining, vec![ids[0], ids[2], ids[3], ids[4]]);
    }
}
