//! Deadlock detection for the resource allocation graph.
//!
//! A deadlock is a cycle in the wait-for graph, where processes point at the
//! resources they wait for and resources point at the process holding them.
//! The [`DeadlockDetector`] finds such a cycle with a white/gray/black
//! depth-first search.
//!
//! The detector is stateless between scans and never mutates the graph. It
//! reads through the [`WaitForGraph`](waitgraph_core::WaitForGraph) trait,
//! so callers are responsible for handing it a consistent view (the
//! allocation manager runs it under its read lock).

mod cycle;
mod detector;

pub use cycle::DeadlockCycle;
pub use detector::{DeadlockDetector, DetectionReport, DetectionStats};
