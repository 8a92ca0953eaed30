//! Waitgraph Simulator
//!
//! Drives the allocation manager with scripted scenarios and concurrent
//! workloads, and reports what the deadlock detector saw.
//!
//! # Architecture
//!
//! - **Scenarios**: fixed step scripts (`abba`, `ring`, `chain`) replayed
//!   against a fresh manager, one result recorded per step
//! - **Workloads**: worker threads doing random acquire/release operations,
//!   plus a checker thread scanning for deadlocks and asking a victim to
//!   back off
//! - **Metrics**: lock-free counters frozen into a [`SimulationReport`]
//! - **Configuration**: TOML-loadable [`SimulatorConfig`]
//!
//! # Example
//!
//! ```ignore
//! use waitgraph_simulator::{SimulatorConfig, WorkloadSimulator};
//!
//! let config = SimulatorConfig::new(8, 4).with_seed(7);
//! let report = WorkloadSimulator::new(config).run()?;
//!
//! println!("Deadlocks found: {}", report.deadlocks);
//! assert_eq!(report.leaked_edges, 0);
//! ```

pub mod config;
pub mod error;
pub mod report;
pub mod scenario;
pub mod workload;

pub use config::SimulatorConfig;
pub use error::SimulatorError;
pub use report::{MetricsCollector, SimulationReport};
pub use scenario::{Scenario, ScenarioOutcome, Step, StepResult};
pub use workload::WorkloadSimulator;
