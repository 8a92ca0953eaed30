//! Core traits for the wait-for graph.
//!
//! The detector only needs to walk edges, so it depends on the
//! [`WaitForGraph`] trait rather than on the concrete allocation graph.

mod traits;

pub use traits::WaitForGraph;
