//! Owned, serializable copies of the allocation graph.

use serde::{Deserialize, Serialize};
use waitgraph_types::{ProcessId, ResourceId, ResourceState};

/// Point-in-time copy of the allocation graph.
///
/// Taken under the manager's lock, so it always satisfies the graph
/// invariants. Used by harnesses for reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    /// Processes in registration order.
    pub processes: Vec<ProcessSnapshot>,
    /// Resources in registration order.
    pub resources: Vec<ResourceSnapshot>,
}

/// Edges touching one process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSnapshot {
    pub id: ProcessId,
    pub waiting_for: Vec<ResourceId>,
    pub holding: Vec<ResourceId>,
}

/// Allocation state and wait queue of one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub id: ResourceId,
    pub state: ResourceState,
    /// Head first.
    pub waiters: Vec<ProcessId>,
}

impl GraphSnapshot {
    /// Number of wait edges.
    pub fn wait_edge_count(&self) -> usize {
        self.resources.iter().map(|r| r.waiters.len()).sum()
    }

    /// Number of held-by edges.
    pub fn held_edge_count(&self) -> usize {
        self.resources
            .iter()
            .filter(|r| r.state.holder().is_some())
            .count()
    }

    /// Whether no process holds or waits for anything.
    pub fn is_idle(&self) -> bool {
        self.wait_edge_count() == 0 && self.held_edge_count() == 0
    }
}
