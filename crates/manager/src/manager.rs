//! Allocation manager: acquire/release protocol and queue promotion.

use crate::config::ManagerConfig;
use parking_lot::RwLock;
use tracing::debug;
use waitgraph_detector::{DeadlockCycle, DeadlockDetector, DetectionReport};
use waitgraph_graph::{AllocationGraph, GraphSnapshot, Registry};
use waitgraph_types::{
    AcquireOutcome, AllocationError, ProcessId, Removal, ResourceId, ResourceState,
};

/// A freed resource handed to the head of its wait queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Promotion {
    /// The resource that changed hands.
    pub resource: ResourceId,
    /// Its new holder.
    pub process: ProcessId,
}

/// Shared owner of the allocation graph.
///
/// All methods take `&self`; share it across threads with
/// `Arc<AllocationManager>`.
#[derive(Debug)]
pub struct AllocationManager {
    graph: RwLock<AllocationGraph>,
    detector: DeadlockDetector,
    config: ManagerConfig,
}

impl Default for AllocationManager {
    fn default() -> Self {
        Self::new(ManagerConfig::default())
    }
}

impl AllocationManager {
    /// Create an empty manager.
    pub fn new(config: ManagerConfig) -> Self {
        let registry = Registry::with_limits(config.max_processes, config.max_resources);
        Self {
            graph: RwLock::new(AllocationGraph::with_registry(registry)),
            detector: DeadlockDetector::new(),
            config,
        }
    }

    /// The configuration this manager was built with.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Registry
    // ═══════════════════════════════════════════════════════════════════════════

    /// Register a new process.
    pub fn register_process(&self) -> Result<ProcessId, AllocationError> {
        let id = self.graph.write().add_process()?;
        debug!(process = %id, "Registered process");
        Ok(id)
    }

    /// Register a new, free resource.
    pub fn register_resource(&self) -> Result<ResourceId, AllocationError> {
        let id = self.graph.write().add_resource()?;
        debug!(resource = %id, "Registered resource");
        Ok(id)
    }

    /// Unregister a process.
    ///
    /// With [`Removal::Cascade`] the process leaves every wait queue and each
    /// resource it held is released with normal FIFO promotion. Returns the
    /// promotions that happened.
    pub fn unregister_process(
        &self,
        process: ProcessId,
        removal: Removal,
    ) -> Result<Vec<Promotion>, AllocationError> {
        let mut graph = self.graph.write();
        let freed = graph.remove_process(process, removal)?;

        let mut promotions = Vec::new();
        for resource in freed {
            if let Some(next) = Self::promote(&mut graph, resource)? {
                promotions.push(Promotion {
                    resource,
                    process: next,
                });
            }
        }

        debug!(
            process = %process,
            promotions = promotions.len(),
            "Unregistered process"
        );
        Ok(promotions)
    }

    /// Unregister a resource.
    ///
    /// With [`Removal::Cascade`] its holder and waiters simply lose their
    /// edges to it.
    pub fn unregister_resource(
        &self,
        resource: ResourceId,
        removal: Removal,
    ) -> Result<(), AllocationError> {
        self.graph.write().remove_resource(resource, removal)?;
        debug!(resource = %resource, "Unregistered resource");
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Allocation protocol
    // ═══════════════════════════════════════════════════════════════════════════

    /// Request exclusive ownership of `resource` for `process`.
    ///
    /// - Free resource: `process` becomes the holder, returns `Granted`.
    /// - Held by another process: `process` is appended to the wait queue
    ///   (once; repeating the request keeps its position), returns `Queued`.
    /// - Already held by `process`: fails with `AlreadyHeld`.
    pub fn acquire(
        &self,
        process: ProcessId,
        resource: ResourceId,
    ) -> Result<AcquireOutcome, AllocationError> {
        let mut graph = self.graph.write();
        Self::acquire_locked(&mut graph, process, resource)
    }

    /// Give up ownership of `resource`.
    ///
    /// Fails with `NotHolder`, leaving the graph untouched, unless `process`
    /// is the current holder. Otherwise the resource is freed and, within the
    /// same critical section, granted to the head of its wait queue. Returns
    /// the promoted process, if any.
    pub fn release(
        &self,
        process: ProcessId,
        resource: ResourceId,
    ) -> Result<Option<ProcessId>, AllocationError> {
        let mut graph = self.graph.write();
        Self::release_locked(&mut graph, process, resource)
    }

    /// Release every resource `process` holds, in acquisition order.
    pub fn release_all(&self, process: ProcessId) -> Result<Vec<Promotion>, AllocationError> {
        let mut graph = self.graph.write();
        let held = graph.held_by(process)?;

        let mut promotions = Vec::new();
        for resource in held {
            if let Some(next) = Self::release_locked(&mut graph, process, resource)? {
                promotions.push(Promotion {
                    resource,
                    process: next,
                });
            }
        }
        Ok(promotions)
    }

    /// Withdraw a pending request.
    ///
    /// Returns whether `process` was queued on `resource`.
    pub fn withdraw(
        &self,
        process: ProcessId,
        resource: ResourceId,
    ) -> Result<bool, AllocationError> {
        let removed = self.graph.write().dequeue_wait(process, resource)?;
        if removed {
            debug!(process = %process, resource = %resource, "Withdrew wait");
        }
        Ok(removed)
    }

    fn acquire_locked(
        graph: &mut AllocationGraph,
        process: ProcessId,
        resource: ResourceId,
    ) -> Result<AcquireOutcome, AllocationError> {
        if !graph.registry().contains_process(process) {
            return Err(AllocationError::ProcessNotFound(process));
        }

        match graph.holder(resource)? {
            None => {
                graph.set_holder(resource, Some(process))?;
                debug!(process = %process, resource = %resource, "Granted");
                Ok(AcquireOutcome::Granted)
            }
            Some(holder) if holder == process => {
                Err(AllocationError::AlreadyHeld { process, resource })
            }
            Some(holder) => {
                let added = graph.enqueue_wait(process, resource)?;
                debug!(
                    process = %process,
                    resource = %resource,
                    holder = %holder,
                    repeated = !added,
                    "Queued"
                );
                Ok(AcquireOutcome::Queued)
            }
        }
    }

    fn release_locked(
        graph: &mut AllocationGraph,
        process: ProcessId,
        resource: ResourceId,
    ) -> Result<Option<ProcessId>, AllocationError> {
        if !graph.registry().contains_process(process) {
            return Err(AllocationError::ProcessNotFound(process));
        }

        let holder = graph.holder(resource)?;
        if holder != Some(process) {
            return Err(AllocationError::NotHolder {
                process,
                resource,
                holder,
            });
        }

        graph.set_holder(resource, None)?;
        debug!(process = %process, resource = %resource, "Released");

        Self::promote(graph, resource)
    }

    /// Hand a free resource to the head of its queue.
    ///
    /// The caller holds the write lock, so nobody can take the resource
    /// between the release and the grant.
    fn promote(
        graph: &mut AllocationGraph,
        resource: ResourceId,
    ) -> Result<Option<ProcessId>, AllocationError> {
        let Some(next) = graph.pop_next_waiter(resource)? else {
            return Ok(None);
        };

        let outcome = Self::acquire_locked(graph, next, resource)?;
        debug_assert!(outcome.is_granted(), "promotion of a free resource must grant");
        debug!(process = %next, resource = %resource, "Promoted waiter");
        Ok(Some(next))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Detection
    // ═══════════════════════════════════════════════════════════════════════════

    /// Check whether any set of processes is deadlocked.
    ///
    /// Runs under the read lock: the scan sees a frozen graph.
    pub fn detect_deadlock(&self) -> bool {
        self.detector.detect(&*self.graph.read())
    }

    /// Find one deadlock cycle, if any.
    ///
    /// The detector logs the cycle it finds.
    pub fn find_deadlock(&self) -> Option<DeadlockCycle> {
        self.detector.find_cycle(&*self.graph.read())
    }

    /// Run a full detector scan with traversal counters.
    pub fn scan(&self) -> DetectionReport {
        self.detector.scan(&*self.graph.read())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Queries
    // ═══════════════════════════════════════════════════════════════════════════

    /// Allocation state of `resource`.
    pub fn state(&self, resource: ResourceId) -> Result<ResourceState, AllocationError> {
        self.graph.read().state(resource)
    }

    /// Wait queue of `resource`, head first.
    pub fn waiters(&self, resource: ResourceId) -> Result<Vec<ProcessId>, AllocationError> {
        self.graph.read().waiters(resource)
    }

    /// Resources `process` is queued on.
    pub fn waiting_for(&self, process: ProcessId) -> Result<Vec<ResourceId>, AllocationError> {
        self.graph.read().waiting_for(process)
    }

    /// Resources `process` holds.
    pub fn held_by(&self, process: ProcessId) -> Result<Vec<ResourceId>, AllocationError> {
        self.graph.read().held_by(process)
    }

    /// Owned copy of the graph.
    pub fn snapshot(&self) -> GraphSnapshot {
        self.graph.read().snapshot()
    }

    /// Number of registered processes.
    pub fn process_count(&self) -> usize {
        self.graph.read().registry().process_count()
    }

    /// Number of registered resources.
    pub fn resource_count(&self) -> usize {
        self.graph.read().registry().resource_count()
    }

    /// Verify every graph invariant.
    pub fn check_invariants(&self) -> Result<(), String> {
        self.graph.read().check_invariants()
    }
}
