//! Domain-specific identifier types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Process identifier.
///
/// Assigned by the registry from a monotonic counter and never reused.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ProcessId(pub u64);

impl ProcessId {
    /// Get the raw value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Process({})", self.0)
    }
}

/// Resource identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ResourceId(pub u64);

impl ResourceId {
    /// Get the raw value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Resource({})", self.0)
    }
}

/// A node of the wait-for graph.
///
/// Processes and resources share one node space so that cycle detection
/// can walk both edge kinds with a single traversal:
///
/// - `Process -> Resource` when the process waits for the resource
/// - `Resource -> Process` when the resource is held by the process
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum NodeRef {
    /// A process node.
    Process(ProcessId),
    /// A resource node.
    Resource(ResourceId),
}

impl NodeRef {
    /// Returns the process id if this is a process node.
    pub fn as_process(self) -> Option<ProcessId> {
        match self {
            NodeRef::Process(p) => Some(p),
            NodeRef::Resource(_) => None,
        }
    }

    /// Returns the resource id if this is a resource node.
    pub fn as_resource(self) -> Option<ResourceId> {
        match self {
            NodeRef::Resource(r) => Some(r),
            NodeRef::Process(_) => None,
        }
    }
}

impl From<ProcessId> for NodeRef {
    fn from(id: ProcessId) -> Self {
        NodeRef::Process(id)
    }
}

impl From<ResourceId> for NodeRef {
    fn from(id: ResourceId) -> Self {
        NodeRef::Resource(id)
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRef::Process(p) => p.fmt(f),
            NodeRef::Resource(r) => r.fmt(f),
        }
    }
}
