//! Allocation value types shared by the graph, manager and harness.

use crate::ProcessId;
use serde::{Deserialize, Serialize};

/// Outcome of an acquire attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquireOutcome {
    /// The process now holds the resource.
    Granted,
    /// The process was appended to the resource's wait queue.
    ///
    /// The caller is responsible for waiting until it is promoted.
    Queued,
}

impl AcquireOutcome {
    /// Whether ownership was granted immediately.
    pub fn is_granted(self) -> bool {
        matches!(self, AcquireOutcome::Granted)
    }
}

/// Allocation state of a single resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceState {
    /// No holder.
    #[default]
    Free,
    /// Held exclusively by one process.
    Held(ProcessId),
}

impl ResourceState {
    /// The current holder, if any.
    pub fn holder(self) -> Option<ProcessId> {
        match self {
            ResourceState::Free => None,
            ResourceState::Held(p) => Some(p),
        }
    }

    /// Whether the resource is free.
    pub fn is_free(self) -> bool {
        matches!(self, ResourceState::Free)
    }
}

impl From<Option<ProcessId>> for ResourceState {
    fn from(holder: Option<ProcessId>) -> Self {
        match holder {
            Some(p) => ResourceState::Held(p),
            None => ResourceState::Free,
        }
    }
}

/// How to treat edges when unregistering a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Removal {
    /// Refuse removal while any edge touches the node.
    #[default]
    Strict,
    /// Remove every edge touching the node along with it.
    Cascade,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_state_holder() {
        assert_eq!(ResourceState::Free.holder(), None);
        assert_eq!(ResourceState::Held(ProcessId(2)).holder(), Some(ProcessId(2)));
        assert!(ResourceState::default().is_free());
        assert_eq!(
            ResourceState::from(Some(ProcessId(5))),
            ResourceState::Held(ProcessId(5))
        );
    }
}
