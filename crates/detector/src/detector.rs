//! Depth-first cycle search over the wait-for graph.

use crate::cycle::DeadlockCycle;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};
use waitgraph_core::WaitForGraph;
use waitgraph_types::NodeRef;

/// Traversal color. Nodes absent from the color map are white.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    /// On the current DFS path.
    Gray,
    /// Fully explored, known not to reach a cycle.
    Black,
}

/// One level of the explicit DFS stack.
struct Frame {
    node: NodeRef,
    successors: Vec<NodeRef>,
    next: usize,
}

impl Frame {
    fn new<G: WaitForGraph + ?Sized>(node: NodeRef, graph: &G) -> Self {
        Self {
            node,
            successors: graph.successors(node),
            next: 0,
        }
    }
}

/// Counters from a single scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DetectionStats {
    /// Processes used as DFS roots (already-colored processes are skipped).
    pub roots_scanned: usize,
    /// Distinct nodes colored gray.
    pub nodes_visited: usize,
    /// Edges followed.
    pub edges_examined: usize,
}

/// Result of a scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DetectionReport {
    /// The first cycle found, if any.
    pub cycle: Option<DeadlockCycle>,
    /// Traversal counters.
    pub stats: DetectionStats,
}

impl DetectionReport {
    /// Whether a deadlock was found.
    pub fn is_deadlocked(&self) -> bool {
        self.cycle.is_some()
    }
}

/// Finds cycles in a wait-for graph.
///
/// Uses an explicit stack instead of recursion, so arbitrarily long wait
/// chains cannot overflow the native call stack. Traversal colors live in a
/// map keyed by node, so there is no bound on population or id values.
///
/// Whether a cycle is found does not depend on root order. Which cycle is
/// reported does: roots are taken in the order the graph yields them.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeadlockDetector;

impl DeadlockDetector {
    /// Create a new detector.
    pub fn new() -> Self {
        Self
    }

    /// Check whether the graph contains a deadlock.
    pub fn detect<G: WaitForGraph + ?Sized>(&self, graph: &G) -> bool {
        self.find_cycle(graph).is_some()
    }

    /// Find one deadlock cycle, if any exists.
    pub fn find_cycle<G: WaitForGraph + ?Sized>(&self, graph: &G) -> Option<DeadlockCycle> {
        self.scan(graph).cycle
    }

    /// Run a full scan, returning the first cycle and traversal counters.
    pub fn scan<G: WaitForGraph + ?Sized>(&self, graph: &G) -> DetectionReport {
        let mut colors: HashMap<NodeRef, Color> = HashMap::new();
        let mut stats = DetectionStats::default();

        for process in graph.process_ids() {
            let root = NodeRef::Process(process);
            if colors.contains_key(&root) {
                continue;
            }
            stats.roots_scanned += 1;

            if let Some(cycle) = Self::explore(graph, root, &mut colors, &mut stats) {
                warn!(
                    cycle = %cycle,
                    processes = cycle.processes().len(),
                    "Deadlock detected"
                );
                return DetectionReport {
                    cycle: Some(cycle),
                    stats,
                };
            }
        }

        debug!(
            roots = stats.roots_scanned,
            nodes = stats.nodes_visited,
            edges = stats.edges_examined,
            "No deadlock"
        );
        DetectionReport { cycle: None, stats }
    }

    /// DFS from a single white root.
    fn explore<G: WaitForGraph + ?Sized>(
        graph: &G,
        root: NodeRef,
        colors: &mut HashMap<NodeRef, Color>,
        stats: &mut DetectionStats,
    ) -> Option<DeadlockCycle> {
        colors.insert(root, Color::Gray);
        stats.nodes_visited += 1;
        let mut stack = vec![Frame::new(root, graph)];

        while let Some(frame) = stack.last_mut() {
            let Some(&next) = frame.successors.get(frame.next) else {
                let done = frame.node;
                colors.insert(done, Color::Black);
                stack.pop();
                continue;
            };
            frame.next += 1;
            stats.edges_examined += 1;

            match colors.get(&next).copied() {
                None => {
                    colors.insert(next, Color::Gray);
                    stats.nodes_visited += 1;
                    stack.push(Frame::new(next, graph));
                }
                Some(Color::Gray) => {
                    // Gray nodes are exactly the nodes on the stack
                    let start = stack.iter().position(|f| f.node == next).unwrap_or(0);
                    let nodes = stack[start..].iter().map(|f| f.node).collect();
                    return Some(DeadlockCycle::new(nodes));
                }
                Some(Color::Black) => {}
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;
    use waitgraph_graph::AllocationGraph;
    use waitgraph_types::{ProcessId, ResourceId};

    fn graph_with(
        processes: usize,
        resources: usize,
    ) -> (AllocationGraph, Vec<ProcessId>, Vec<ResourceId>) {
        let mut graph = AllocationGraph::new();
        let ps = (0..processes).map(|_| graph.add_process().unwrap()).collect();
        let rs = (0..resources).map(|_| graph.add_resource().unwrap()).collect();
        (graph, ps, rs)
    }

    /// P[i] holds R[i] and waits on R[i+1]; the last one optionally closes the ring.
    fn ring(n: usize, closed: bool) -> (AllocationGraph, Vec<ProcessId>, Vec<ResourceId>) {
        let (mut graph, p, r) = graph_with(n, n);
        for i in 0..n {
            graph.set_holder(r[i], Some(p[i])).unwrap();
        }
        for i in 0..n - 1 {
            graph.enqueue_wait(p[i], r[i + 1]).unwrap();
        }
        if closed {
            graph.enqueue_wait(p[n - 1], r[0]).unwrap();
        }
        (graph, p, r)
    }

    #[traced_test]
    #[test]
    fn test_abba_deadlock() {
        let (graph, p, r) = ring(2, true);
        let detector = DeadlockDetector::new();

        assert!(detector.detect(&graph));

        let cycle = detector.find_cycle(&graph).unwrap();
        assert_eq!(cycle.len(), 4);
        assert!(cycle.contains_process(p[0]));
        assert!(cycle.contains_process(p[1]));
        assert_eq!(cycle.resources().len(), 2);
        assert!(cycle.resources().contains(&r[0]));
        assert!(logs_contain("Deadlock detected"));
    }

    #[test]
    fn test_cycle_is_in_edge_order() {
        let (graph, p, r) = ring(3, true);
        let cycle = DeadlockDetector::new().find_cycle(&graph).unwrap();

        // Roots are taken in registration order, so the cycle starts at P1
        assert_eq!(
            cycle.nodes(),
            &[
                NodeRef::Process(p[0]),
                NodeRef::Resource(r[1]),
                NodeRef::Process(p[1]),
                NodeRef::Resource(r[2]),
                NodeRef::Process(p[2]),
                NodeRef::Resource(r[0]),
            ]
        );
    }

    #[test]
    fn test_open_chain_is_not_a_deadlock() {
        let (graph, _, _) = ring(5, false);
        assert!(!DeadlockDetector::new().detect(&graph));
    }

    #[test]
    fn test_empty_and_idle_graphs() {
        let detector = DeadlockDetector::new();
        assert!(!detector.detect(&AllocationGraph::new()));

        let (graph, _, _) = graph_with(10, 10);
        let report = detector.scan(&graph);
        assert!(!report.is_deadlocked());
        assert_eq!(report.stats.roots_scanned, 10);
        assert_eq!(report.stats.edges_examined, 0);
    }

    #[test]
    fn test_wait_on_free_resource_is_not_a_deadlock() {
        // P1 waits on R1 held by P2, P2 waits on R2 which nobody holds
        let (mut graph, p, r) = graph_with(2, 2);
        graph.set_holder(r[0], Some(p[1])).unwrap();
        graph.enqueue_wait(p[0], r[0]).unwrap();
        graph.enqueue_wait(p[1], r[1]).unwrap();

        assert!(!DeadlockDetector::new().detect(&graph));
    }

    #[test]
    fn test_cycle_found_from_any_root_order() {
        // A tail process leads into the cycle; the cycle is still found when
        // the tail is the first root explored.
        let (mut graph, p, r) = graph_with(3, 3);
        graph.set_holder(r[1], Some(p[1])).unwrap();
        graph.set_holder(r[2], Some(p[2])).unwrap();
        graph.enqueue_wait(p[0], r[1]).unwrap();
        graph.enqueue_wait(p[1], r[2]).unwrap();
        graph.enqueue_wait(p[2], r[1]).unwrap();

        let cycle = DeadlockDetector::new().find_cycle(&graph).unwrap();
        assert!(!cycle.contains_process(p[0]), "tail is not part of the cycle");
        assert_eq!(cycle.processes().len(), 2);
    }

    #[test]
    fn test_shared_subgraph_is_explored_once() {
        // Many processes wait on one resource whose holder waits on nothing
        let (mut graph, p, r) = graph_with(50, 1);
        graph.set_holder(r[0], Some(p[0])).unwrap();
        for &proc in &p[1..] {
            graph.enqueue_wait(proc, r[0]).unwrap();
        }

        let report = DeadlockDetector::new().scan(&graph);
        assert!(!report.is_deadlocked());
        // 50 processes + 1 resource, each colored exactly once
        assert_eq!(report.stats.nodes_visited, 51);
        // 49 wait edges + 1 held-by edge, each followed exactly once
        assert_eq!(report.stats.edges_examined, 50);
    }

    #[test]
    fn test_long_chain_does_not_overflow_stack() {
        let (graph, _, _) = ring(20_000, false);
        assert!(!DeadlockDetector::new().detect(&graph));

        let (graph, p, _) = ring(20_000, true);
        let cycle = DeadlockDetector::new().find_cycle(&graph).unwrap();
        assert_eq!(cycle.processes().len(), p.len());
    }

    #[test]
    fn test_large_ids_beyond_fixed_capacity() {
        let mut graph = AllocationGraph::new();
        // Burn ids well past any fixed-size table
        for _ in 0..300 {
            let p = graph.add_process().unwrap();
            graph
                .remove_process(p, waitgraph_types::Removal::Strict)
                .unwrap();
        }
        let p1 = graph.add_process().unwrap();
        let p2 = graph.add_process().unwrap();
        let r1 = graph.add_resource().unwrap();
        let r2 = graph.add_resource().unwrap();
        assert!(p1.get() > 300);

        graph.set_holder(r1, Some(p1)).unwrap();
        graph.set_holder(r2, Some(p2)).unwrap();
        graph.enqueue_wait(p1, r2).unwrap();
        graph.enqueue_wait(p2, r1).unwrap();

        assert!(DeadlockDetector::new().detect(&graph));
    }
}
