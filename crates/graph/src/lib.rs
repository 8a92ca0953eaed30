//! Process/resource registry and allocation graph.
//!
//! # Components
//!
//! - [`Registry`] - Identifier assignment and membership
//! - [`AllocationGraph`] - Held-by edges, FIFO wait queues, and the
//!   invariant-preserving primitives the allocation manager is built on
//! - [`GraphSnapshot`] - Owned copy for reporting

mod graph;
mod registry;
mod snapshot;

pub use graph::AllocationGraph;
pub use registry::Registry;
pub use snapshot::{GraphSnapshot, ProcessSnapshot, ResourceSnapshot};
