//! Core types for the resource allocation graph.
//!
//! Identifiers, allocation outcomes and the error enum shared by every
//! crate in the workspace.

mod allocation;
mod error;
mod identifiers;

pub use allocation::{AcquireOutcome, Removal, ResourceState};
pub use error::{AllocationError, EntityKind, ErrorKind};
pub use identifiers::{NodeRef, ProcessId, ResourceId};
