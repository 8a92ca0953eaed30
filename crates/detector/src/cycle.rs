//! Deadlock cycle representation.

use serde::Serialize;
use std::fmt;
use waitgraph_types::{NodeRef, ProcessId, ResourceId};

/// A cycle in the wait-for graph.
///
/// Nodes are listed in edge order; the last node has an edge back to the
/// first. Process and resource nodes alternate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeadlockCycle {
    nodes: Vec<NodeRef>,
}

impl DeadlockCycle {
    pub(crate) fn new(nodes: Vec<NodeRef>) -> Self {
        Self { nodes }
    }

    /// All nodes in the cycle.
    pub fn nodes(&self) -> &[NodeRef] {
        &self.nodes
    }

    /// The deadlocked processes, in cycle order.
    pub fn processes(&self) -> Vec<ProcessId> {
        self.nodes.iter().filter_map(|n| n.as_process()).collect()
    }

    /// The resources the deadlocked processes are contending for.
    pub fn resources(&self) -> Vec<ResourceId> {
        self.nodes.iter().filter_map(|n| n.as_resource()).collect()
    }

    /// Check if a process takes part in the cycle.
    pub fn contains_process(&self, process: ProcessId) -> bool {
        self.nodes.contains(&NodeRef::Process(process))
    }

    /// Number of nodes in the cycle.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the cycle is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl fmt::Display for DeadlockCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in &self.nodes {
            write!(f, "{} -> ", node)?;
        }
        match self.nodes.first() {
            Some(first) => write!(f, "{}", first),
            None => write!(f, "(empty)"),
        }
    }
}
