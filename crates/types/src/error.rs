//! Error types for allocation graph operations.

use crate::{NodeRef, ProcessId, ResourceId};
use thiserror::Error;

/// Errors returned by registry, allocation and removal operations.
///
/// Every variant is a caller-correctable precondition violation. None of them
/// leave the graph modified.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    /// The process id is not registered.
    #[error("{0} not found")]
    ProcessNotFound(ProcessId),

    /// The resource id is not registered.
    #[error("{0} not found")]
    ResourceNotFound(ResourceId),

    /// Removing the node would leave dangling edges.
    #[error("{node} is still referenced by {edges} edge(s)")]
    StillReferenced {
        /// The node whose removal was refused.
        node: NodeRef,
        /// Number of wait and held-by edges touching the node.
        edges: usize,
    },

    /// Release attempted by a process that does not hold the resource.
    #[error("{process} does not hold {resource} (holder: {holder:?})")]
    NotHolder {
        /// The process that attempted the release.
        process: ProcessId,
        /// The resource being released.
        resource: ResourceId,
        /// The actual holder, if any.
        holder: Option<ProcessId>,
    },

    /// Reentrant acquire of a resource the process already holds.
    #[error("{process} already holds {resource}")]
    AlreadyHeld {
        /// The acquiring process.
        process: ProcessId,
        /// The resource it already holds.
        resource: ResourceId,
    },

    /// A registry limit was reached.
    #[error("{kind} capacity exceeded (limit {limit})")]
    CapacityExceeded {
        /// Which entity kind hit its limit.
        kind: EntityKind,
        /// The configured limit.
        limit: usize,
    },
}

impl AllocationError {
    /// Coarse classification of the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AllocationError::ProcessNotFound(_) | AllocationError::ResourceNotFound(_) => {
                ErrorKind::NotFound
            }
            AllocationError::StillReferenced { .. } => ErrorKind::StillReferenced,
            AllocationError::NotHolder { .. } => ErrorKind::NotHolder,
            AllocationError::AlreadyHeld { .. } => ErrorKind::AlreadyHeld,
            AllocationError::CapacityExceeded { .. } => ErrorKind::CapacityExceeded,
        }
    }
}

/// Classification of [`AllocationError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unknown id.
    NotFound,
    /// Unsafe removal.
    StillReferenced,
    /// Release by non-owner.
    NotHolder,
    /// Reentrant acquire.
    AlreadyHeld,
    /// Registry limit reached.
    CapacityExceeded,
}

/// The two kinds of registered entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// Processes.
    Process,
    /// Resources.
    Resource,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Process => write!(f, "process"),
            EntityKind::Resource => write!(f, "resource"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind() {
        assert_eq!(
            AllocationError::ProcessNotFound(ProcessId(1)).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            AllocationError::ResourceNotFound(ResourceId(1)).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            AllocationError::NotHolder {
                process: ProcessId(1),
                resource: ResourceId(1),
                holder: None,
            }
            .kind(),
            ErrorKind::NotHolder
        );
        assert_eq!(
            AllocationError::CapacityExceeded {
                kind: EntityKind::Process,
                limit: 2,
            }
            .kind(),
            ErrorKind::CapacityExceeded
        );
    }

    #[test]
    fn test_error_messages() {
        let err = AllocationError::StillReferenced {
            node: NodeRef::Process(ProcessId(3)),
            edges: 2,
        };
        assert_eq!(err.to_string(), "Process(3) is still referenced by 2 edge(s)");

        let err = AllocationError::CapacityExceeded {
            kind: EntityKind::Resource,
            limit: 10,
        };
        assert_eq!(err.to_string(), "resource capacity exceeded (limit 10)");
    }
}
