//! Core traits for graph traversal.

use waitgraph_types::{NodeRef, ProcessId};

/// Read-only view of a wait-for graph.
///
/// Nodes are the union of processes and resources. Edges are:
///
/// - **Wait**: `Process -> Resource` when the process is in the resource's
///   wait queue
/// - **Held-by**: `Resource -> Process` when the resource is held by the
///   process
///
/// Implementations must present a consistent view for the whole lifetime of
/// the borrow. The allocation manager guarantees this by only handing out
/// the graph while holding its lock.
///
/// # Example
///
/// ```ignore
/// fn out_degree(graph: &impl WaitForGraph, node: NodeRef) -> usize {
///     let mut n = 0;
///     graph.for_each_successor(node, &mut |_| n += 1);
///     n
/// }
/// ```
pub trait WaitForGraph {
    /// All processes, in a stable order.
    ///
    /// Used as the set of DFS roots. Every cycle in a bipartite wait-for
    /// graph passes through at least one process, so resources never need
    /// to be roots.
    fn process_ids(&self) -> Vec<ProcessId>;

    /// Visit every successor of `node`.
    ///
    /// Unknown nodes have no successors.
    fn for_each_successor(&self, node: NodeRef, visit: &mut dyn FnMut(NodeRef));

    /// Collect the successors of `node`.
    fn successors(&self, node: NodeRef) -> Vec<NodeRef> {
        let mut out = Vec::new();
        self.for_each_successor(node, &mut |n| out.push(n));
        out
    }
}
