//! The resource allocation graph.
//!
//! Holds the held-by and wait edges between registered processes and
//! resources. Every primitive here preserves the graph invariants on its own:
//!
//! - a resource has at most one holder
//! - a process appears at most once in any wait queue
//! - a holder never waits on the resource it holds
//!
//! The primitives take `&mut self` and are meant to be driven by the
//! allocation manager while it holds the graph's write lock. They do not run
//! the acquire/release protocol: `set_holder(r, None)` frees a resource
//! without promoting its queue. The manager never exposes `&mut` access to
//! its graph, so outside callers only use these on graphs they own.

use crate::registry::Registry;
use crate::snapshot::{GraphSnapshot, ProcessSnapshot, ResourceSnapshot};
use indexmap::IndexSet;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::trace;
use waitgraph_core::WaitForGraph;
use waitgraph_types::{AllocationError, NodeRef, ProcessId, Removal, ResourceId, ResourceState};

/// Edges leaving a resource.
#[derive(Debug, Default)]
struct ResourceEntry {
    /// Held-by edge.
    holder: Option<ProcessId>,
    /// Wait edges, oldest first.
    waiters: VecDeque<ProcessId>,
}

/// Edges touching a process.
#[derive(Debug, Default)]
struct ProcessEntry {
    /// Resources this process is queued on, in the order it asked.
    waiting_for: IndexSet<ResourceId>,
    /// Reverse index of held-by edges.
    holding: IndexSet<ResourceId>,
}

impl ProcessEntry {
    fn edge_count(&self) -> usize {
        self.waiting_for.len() + self.holding.len()
    }
}

/// Bipartite process/resource graph with FIFO wait queues.
#[derive(Debug, Default)]
pub struct AllocationGraph {
    registry: Registry,
    processes: HashMap<ProcessId, ProcessEntry>,
    resources: HashMap<ResourceId, ResourceEntry>,
}

impl AllocationGraph {
    /// Create an empty, unbounded graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty graph on top of a configured registry.
    pub fn with_registry(registry: Registry) -> Self {
        Self {
            registry,
            processes: HashMap::new(),
            resources: HashMap::new(),
        }
    }

    /// The underlying registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Node lifecycle
    // ═══════════════════════════════════════════════════════════════════════════

    /// Register a process with no edges.
    pub fn add_process(&mut self) -> Result<ProcessId, AllocationError> {
        let id = self.registry.register_process()?;
        self.processes.insert(id, ProcessEntry::default());
        Ok(id)
    }

    /// Register a free resource with an empty wait queue.
    pub fn add_resource(&mut self) -> Result<ResourceId, AllocationError> {
        let id = self.registry.register_resource()?;
        self.resources.insert(id, ResourceEntry::default());
        Ok(id)
    }

    /// Remove a process.
    ///
    /// With [`Removal::Strict`] this fails with `StillReferenced` if the
    /// process waits on or holds anything. With [`Removal::Cascade`] the
    /// process is purged from every wait queue and its held resources are
    /// left free.
    ///
    /// Returns the resources that were freed, in the order they were
    /// acquired, so the caller can promote their waiters.
    pub fn remove_process(
        &mut self,
        id: ProcessId,
        removal: Removal,
    ) -> Result<Vec<ResourceId>, AllocationError> {
        let entry = self
            .processes
            .get(&id)
            .ok_or(AllocationError::ProcessNotFound(id))?;

        if removal == Removal::Strict && entry.edge_count() > 0 {
            return Err(AllocationError::StillReferenced {
                node: NodeRef::Process(id),
                edges: entry.edge_count(),
            });
        }

        self.registry.unregister_process(id)?;
        let Some(entry) = self.processes.remove(&id) else {
            return Ok(Vec::new());
        };

        for resource in &entry.waiting_for {
            if let Some(res) = self.resources.get_mut(resource) {
                res.waiters.retain(|p| *p != id);
            }
        }

        let freed: Vec<ResourceId> = entry.holding.into_iter().collect();
        for resource in &freed {
            if let Some(res) = self.resources.get_mut(resource) {
                res.holder = None;
            }
        }

        trace!(
            process = %id,
            waits_dropped = entry.waiting_for.len(),
            freed = freed.len(),
            "Removed process"
        );

        Ok(freed)
    }

    /// Remove a resource.
    ///
    /// With [`Removal::Strict`] this fails with `StillReferenced` if the
    /// resource is held or has waiters. With [`Removal::Cascade`] its holder
    /// and wait edges are dropped along with it.
    pub fn remove_resource(
        &mut self,
        id: ResourceId,
        removal: Removal,
    ) -> Result<(), AllocationError> {
        let entry = self
            .resources
            .get(&id)
            .ok_or(AllocationError::ResourceNotFound(id))?;

        let edges = entry.waiters.len() + usize::from(entry.holder.is_some());
        if removal == Removal::Strict && edges > 0 {
            return Err(AllocationError::StillReferenced {
                node: NodeRef::Resource(id),
                edges,
            });
        }

        self.registry.unregister_resource(id)?;
        let Some(entry) = self.resources.remove(&id) else {
            return Ok(());
        };

        for waiter in &entry.waiters {
            if let Some(proc) = self.processes.get_mut(waiter) {
                proc.waiting_for.shift_remove(&id);
            }
        }
        if let Some(holder) = entry.holder {
            if let Some(proc) = self.processes.get_mut(&holder) {
                proc.holding.shift_remove(&id);
            }
        }

        trace!(resource = %id, edges, "Removed resource");
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Edge primitives
    // ═══════════════════════════════════════════════════════════════════════════

    /// Append `process` to the tail of `resource`'s wait queue.
    ///
    /// Returns `false` without changing anything if the process is already
    /// queued there. Fails with `AlreadyHeld` if the process is the holder.
    pub fn enqueue_wait(
        &mut self,
        process: ProcessId,
        resource: ResourceId,
    ) -> Result<bool, AllocationError> {
        self.ensure_process(process)?;
        let res = self
            .resources
            .get_mut(&resource)
            .ok_or(AllocationError::ResourceNotFound(resource))?;

        if res.holder == Some(process) {
            return Err(AllocationError::AlreadyHeld { process, resource });
        }

        let Some(proc) = self.processes.get_mut(&process) else {
            return Err(AllocationError::ProcessNotFound(process));
        };
        if !proc.waiting_for.insert(resource) {
            return Ok(false);
        }
        res.waiters.push_back(process);
        Ok(true)
    }

    /// Remove `process` from `resource`'s wait queue.
    ///
    /// Returns whether the process was queued. Relative order of the other
    /// waiters is preserved.
    pub fn dequeue_wait(
        &mut self,
        process: ProcessId,
        resource: ResourceId,
    ) -> Result<bool, AllocationError> {
        self.ensure_process(process)?;
        let res = self
            .resources
            .get_mut(&resource)
            .ok_or(AllocationError::ResourceNotFound(resource))?;

        let Some(proc) = self.processes.get_mut(&process) else {
            return Err(AllocationError::ProcessNotFound(process));
        };
        if !proc.waiting_for.shift_remove(&resource) {
            return Ok(false);
        }
        res.waiters.retain(|p| *p != process);
        Ok(true)
    }

    /// Set or clear the holder of `resource`.
    ///
    /// If the new holder was queued on the resource it is dequeued first, so
    /// a holder never waits on itself. Returns the previous holder.
    pub fn set_holder(
        &mut self,
        resource: ResourceId,
        holder: Option<ProcessId>,
    ) -> Result<Option<ProcessId>, AllocationError> {
        if let Some(p) = holder {
            self.ensure_process(p)?;
        }
        self.ensure_resource(resource)?;

        if let Some(p) = holder {
            self.dequeue_wait(p, resource)?;
        }

        let res = self
            .resources
            .get_mut(&resource)
            .ok_or(AllocationError::ResourceNotFound(resource))?;
        let previous = std::mem::replace(&mut res.holder, holder);

        if let Some(prev) = previous {
            if let Some(proc) = self.processes.get_mut(&prev) {
                proc.holding.shift_remove(&resource);
            }
        }
        if let Some(p) = holder {
            if let Some(proc) = self.processes.get_mut(&p) {
                proc.holding.insert(resource);
            }
        }

        Ok(previous)
    }

    /// The process at the head of `resource`'s wait queue.
    pub fn peek_next_waiter(
        &self,
        resource: ResourceId,
    ) -> Result<Option<ProcessId>, AllocationError> {
        Ok(self.resource_entry(resource)?.waiters.front().copied())
    }

    /// Remove and return the head of `resource`'s wait queue.
    pub fn pop_next_waiter(
        &mut self,
        resource: ResourceId,
    ) -> Result<Option<ProcessId>, AllocationError> {
        let res = self
            .resources
            .get_mut(&resource)
            .ok_or(AllocationError::ResourceNotFound(resource))?;

        let Some(next) = res.waiters.pop_front() else {
            return Ok(None);
        };
        if let Some(proc) = self.processes.get_mut(&next) {
            proc.waiting_for.shift_remove(&resource);
        }
        Ok(Some(next))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Queries
    // ═══════════════════════════════════════════════════════════════════════════

    /// Allocation state of `resource`.
    pub fn state(&self, resource: ResourceId) -> Result<ResourceState, AllocationError> {
        Ok(self.resource_entry(resource)?.holder.into())
    }

    /// Current holder of `resource`.
    pub fn holder(&self, resource: ResourceId) -> Result<Option<ProcessId>, AllocationError> {
        Ok(self.resource_entry(resource)?.holder)
    }

    /// Wait queue of `resource`, head first.
    pub fn waiters(&self, resource: ResourceId) -> Result<Vec<ProcessId>, AllocationError> {
        Ok(self.resource_entry(resource)?.waiters.iter().copied().collect())
    }

    /// Resources `process` is queued on.
    pub fn waiting_for(&self, process: ProcessId) -> Result<Vec<ResourceId>, AllocationError> {
        Ok(self.process_entry(process)?.waiting_for.iter().copied().collect())
    }

    /// Resources `process` holds, in acquisition order.
    pub fn held_by(&self, process: ProcessId) -> Result<Vec<ResourceId>, AllocationError> {
        Ok(self.process_entry(process)?.holding.iter().copied().collect())
    }

    /// All wait edges as `(process, resource)` pairs.
    ///
    /// Grouped by resource in registration order, queue order within each.
    pub fn wait_edges(&self) -> impl Iterator<Item = (ProcessId, ResourceId)> + '_ {
        self.registry.resources().flat_map(move |r| {
            self.resources
                .get(&r)
                .into_iter()
                .flat_map(move |res| res.waiters.iter().map(move |p| (*p, r)))
        })
    }

    /// All held-by edges as `(resource, holder)` pairs.
    pub fn held_edges(&self) -> impl Iterator<Item = (ResourceId, ProcessId)> + '_ {
        self.registry.resources().filter_map(move |r| {
            self.resources
                .get(&r)
                .and_then(|res| res.holder)
                .map(|p| (r, p))
        })
    }

    /// Verify every graph invariant, including index consistency.
    ///
    /// Returns a description of the first violation found.
    pub fn check_invariants(&self) -> Result<(), String> {
        for (&r, res) in &self.resources {
            let mut seen = HashSet::new();
            for &p in &res.waiters {
                if !seen.insert(p) {
                    return Err(format!("{p} queued twice on {r}"));
                }
                if res.holder == Some(p) {
                    return Err(format!("{p} holds and waits on {r}"));
                }
                match self.processes.get(&p) {
                    Some(proc) if proc.waiting_for.contains(&r) => {}
                    _ => return Err(format!("{p} in queue of {r} but not indexed")),
                }
            }
            if let Some(h) = res.holder {
                match self.processes.get(&h) {
                    Some(proc) if proc.holding.contains(&r) => {}
                    _ => return Err(format!("{r} held by {h} but not indexed")),
                }
            }
        }

        for (&p, proc) in &self.processes {
            for r in &proc.waiting_for {
                match self.resources.get(r) {
                    Some(res) if res.waiters.contains(&p) => {}
                    _ => return Err(format!("{p} indexed as waiting on {r} but not queued")),
                }
            }
            for r in &proc.holding {
                match self.resources.get(r) {
                    Some(res) if res.holder == Some(p) => {}
                    _ => return Err(format!("{p} indexed as holding {r} but is not holder")),
                }
            }
        }

        Ok(())
    }

    /// Owned copy of the whole graph.
    pub fn snapshot(&self) -> GraphSnapshot {
        let processes = self
            .registry
            .processes()
            .filter_map(|p| {
                self.processes.get(&p).map(|proc| ProcessSnapshot {
                    id: p,
                    waiting_for: proc.waiting_for.iter().copied().collect(),
                    holding: proc.holding.iter().copied().collect(),
                })
            })
            .collect();

        let resources = self
            .registry
            .resources()
            .filter_map(|r| {
                self.resources.get(&r).map(|res| ResourceSnapshot {
                    id: r,
                    state: res.holder.into(),
                    waiters: res.waiters.iter().copied().collect(),
                })
            })
            .collect();

        GraphSnapshot {
            processes,
            resources,
        }
    }

    fn process_entry(&self, id: ProcessId) -> Result<&ProcessEntry, AllocationError> {
        self.processes
            .get(&id)
            .ok_or(AllocationError::ProcessNotFound(id))
    }

    fn resource_entry(&self, id: ResourceId) -> Result<&ResourceEntry, AllocationError> {
        self.resources
            .get(&id)
            .ok_or(AllocationError::ResourceNotFound(id))
    }

    fn ensure_process(&self, id: ProcessId) -> Result<(), AllocationError> {
        self.process_entry(id).map(|_| ())
    }

    fn ensure_resource(&self, id: ResourceId) -> Result<(), AllocationError> {
        self.resource_entry(id).map(|_| ())
    }
}

impl WaitForGraph for AllocationGraph {
    fn process_ids(&self) -> Vec<ProcessId> {
        self.registry.processes().collect()
    }

    fn for_each_successor(&self, node: NodeRef, visit: &mut dyn FnMut(NodeRef)) {
        match node {
            NodeRef::Process(p) => {
                if let Some(proc) = self.processes.get(&p) {
                    for &r in &proc.waiting_for {
                        visit(NodeRef::Resource(r));
                    }
                }
            }
            NodeRef::Resource(r) => {
                if let Some(holder) = self.resources.get(&r).and_then(|res| res.holder) {
                    visit(NodeRef::Process(holder));
                }
            }
        }
    }
}
