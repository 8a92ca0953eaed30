//! Error types for the simulator.

use thiserror::Error;
use waitgraph_types::AllocationError;

/// Errors while configuring or running a simulation.
#[derive(Debug, Error)]
pub enum SimulatorError {
    /// Configuration file could not be read.
    #[error("Failed to read config {path}: {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid TOML for [`SimulatorConfig`](crate::SimulatorConfig).
    #[error("Invalid config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// A configuration value is out of range.
    #[error("Invalid config value: {0}")]
    InvalidConfig(String),

    /// The allocation manager rejected an operation the simulator relies on.
    #[error("Allocation failed: {0}")]
    Allocation(#[from] AllocationError),

    /// A scenario step names a process or resource outside its population.
    #[error("Step out of range: {0}")]
    StepOutOfRange(String),

    /// Unknown scenario name.
    #[error("Unknown scenario: {0}")]
    UnknownScenario(String),

    /// A worker thread panicked.
    #[error("Worker {0} panicked")]
    WorkerPanicked(usize),
}
