//! Configuration for the allocation manager.

use serde::{Deserialize, Serialize};

/// Default population limit for processes and resources.
pub const DEFAULT_MAX_ENTITIES: usize = 4096;

/// Population limits enforced at registration.
///
/// Registration beyond a limit fails with `CapacityExceeded` instead of
/// growing the graph. `None` means unbounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Maximum number of live processes.
    pub max_processes: Option<usize>,

    /// Maximum number of live resources.
    pub max_resources: Option<usize>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_processes: Some(DEFAULT_MAX_ENTITIES),
            max_resources: Some(DEFAULT_MAX_ENTITIES),
        }
    }
}

impl ManagerConfig {
    /// Create a config with no population limits.
    pub fn unbounded() -> Self {
        Self {
            max_processes: None,
            max_resources: None,
        }
    }

    /// Set the process limit.
    pub fn with_max_processes(mut self, max: usize) -> Self {
        self.max_processes = Some(max);
        self
    }

    /// Set the resource limit.
    pub fn with_max_resources(mut self, max: usize) -> Self {
        self.max_resources = Some(max);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders() {
        let config = ManagerConfig::unbounded().with_max_processes(8);
        assert_eq!(config.max_processes, Some(8));
        assert_eq!(config.max_resources, None);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: ManagerConfig = toml::from_str("max_processes = 16").unwrap();
        assert_eq!(config.max_processes, Some(16));
        assert_eq!(config.max_resources, Some(DEFAULT_MAX_ENTITIES));
    }
}
