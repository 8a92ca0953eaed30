//! Configuration types for the simulator.

use crate::error::SimulatorError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use waitgraph_manager::ManagerConfig;

/// Configuration for a concurrent workload run.
///
/// Every field has a default, so a TOML file only needs the keys it
/// changes:
///
/// ```toml
/// workers = 16
/// resources = 4
/// seed = 7
///
/// [manager]
/// max_processes = 64
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Number of worker threads, one process each.
    pub workers: usize,

    /// Number of shared resources.
    pub resources: usize,

    /// Operations each worker performs before shutting down.
    pub ops_per_worker: usize,

    /// Maximum resources a worker holds at once.
    pub max_holds_per_worker: usize,

    /// Probability that an operation is an acquire rather than a release
    /// (when both are possible).
    pub acquire_ratio: f64,

    /// How often the checker thread scans for deadlocks, in milliseconds.
    pub check_interval_ms: u64,

    /// How long a queued worker waits for promotion before giving up, in
    /// milliseconds.
    pub max_wait_ms: u64,

    /// Random seed. Worker `i` uses `seed + i`.
    pub seed: u64,

    /// Limits for the allocation manager.
    pub manager: ManagerConfig,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            resources: 3,
            ops_per_worker: 200,
            max_holds_per_worker: 2,
            acquire_ratio: 0.6,
            check_interval_ms: 5,
            max_wait_ms: 50,
            seed: 12345,
            manager: ManagerConfig::default(),
        }
    }
}

impl SimulatorConfig {
    /// Create a configuration with the given population.
    pub fn new(workers: usize, resources: usize) -> Self {
        Self {
            workers,
            resources,
            ..Default::default()
        }
    }

    /// Parse a configuration from TOML and validate it.
    pub fn from_toml_str(s: &str) -> Result<Self, SimulatorError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the values the builders would otherwise clamp.
    ///
    /// Fields are public and TOML bypasses the builders, so the workload
    /// runs this again before spawning any thread.
    pub fn validate(&self) -> Result<(), SimulatorError> {
        if !(0.0..=1.0).contains(&self.acquire_ratio) {
            return Err(SimulatorError::InvalidConfig(format!(
                "acquire_ratio must be within [0, 1], got {}",
                self.acquire_ratio
            )));
        }
        if self.max_holds_per_worker == 0 {
            return Err(SimulatorError::InvalidConfig(
                "max_holds_per_worker must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Load a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SimulatorError> {
        let path = path.as_ref();
        let contents =
            std::fs::read_to_string(path).map_err(|source| SimulatorError::ConfigRead {
                path: path.display().to_string(),
                source,
            })?;
        Self::from_toml_str(&contents)
    }

    /// Set the operations per worker.
    pub fn with_ops_per_worker(mut self, ops: usize) -> Self {
        self.ops_per_worker = ops;
        self
    }

    /// Set the maximum simultaneous holds per worker.
    pub fn with_max_holds(mut self, holds: usize) -> Self {
        self.max_holds_per_worker = holds.max(1);
        self
    }

    /// Set the acquire ratio. NaN is left for [`validate`](Self::validate)
    /// to reject.
    pub fn with_acquire_ratio(mut self, ratio: f64) -> Self {
        self.acquire_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    /// Set the checker interval.
    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Set the promotion wait limit.
    pub fn with_max_wait(mut self, wait: Duration) -> Self {
        self.max_wait_ms = wait.as_millis() as u64;
        self
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the manager limits.
    pub fn with_manager(mut self, manager: ManagerConfig) -> Self {
        self.manager = manager;
        self
    }

    /// Checker interval as a duration.
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    /// Promotion wait limit as a duration.
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml() {
        let config = SimulatorConfig::from_toml_str(
            r#"
            workers = 16
            seed = 7

            [manager]
            max_processes = 64
            "#,
        )
        .unwrap();

        assert_eq!(config.workers, 16);
        assert_eq!(config.seed, 7);
        assert_eq!(config.resources, SimulatorConfig::default().resources);
        assert_eq!(config.manager.max_processes, Some(64));
    }

    #[test]
    fn test_invalid_toml() {
        let err = SimulatorConfig::from_toml_str("workers = \"many\"").unwrap_err();
        assert!(matches!(err, SimulatorError::ConfigParse(_)));
    }

    #[test]
    fn test_out_of_range_toml_is_rejected() {
        let err = SimulatorConfig::from_toml_str(
            "workers = 2\nresources = 2\nacquire_ratio = 1.5\nops_per_worker = 20",
        )
        .unwrap_err();
        assert!(matches!(err, SimulatorError::InvalidConfig(_)));

        let err = SimulatorConfig::from_toml_str("acquire_ratio = nan").unwrap_err();
        assert!(matches!(err, SimulatorError::InvalidConfig(_)));

        let err = SimulatorConfig::from_toml_str("max_holds_per_worker = 0").unwrap_err();
        assert!(matches!(err, SimulatorError::InvalidConfig(_)));

        assert!(SimulatorConfig::from_toml_str("acquire_ratio = 1.0").is_ok());
    }

    #[test]
    fn test_validate_catches_direct_field_writes() {
        let mut config = SimulatorConfig::default();
        assert!(config.validate().is_ok());

        config.acquire_ratio = -0.1;
        assert!(matches!(
            config.validate(),
            Err(SimulatorError::InvalidConfig(_))
        ));

        let config = SimulatorConfig::default().with_acquire_ratio(f64::NAN);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builders_clamp() {
        let config = SimulatorConfig::new(2, 2)
            .with_acquire_ratio(3.0)
            .with_max_holds(0)
            .with_check_interval(Duration::from_millis(20));

        assert_eq!(config.acquire_ratio, 1.0);
        assert_eq!(config.max_holds_per_worker, 1);
        assert_eq!(config.check_interval(), Duration::from_millis(20));
    }
}
