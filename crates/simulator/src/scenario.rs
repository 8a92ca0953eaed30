//! Scripted allocation scenarios.
//!
//! A scenario registers a fixed population, replays a list of steps against
//! a fresh manager, records what each step returned, and tears everything
//! down with cascading removal.

use crate::error::SimulatorError;
use serde::Serialize;
use std::fmt;
use tracing::info;
use waitgraph_detector::DeadlockCycle;
use waitgraph_graph::GraphSnapshot;
use waitgraph_manager::{AllocationManager, ManagerConfig};
use waitgraph_types::{AcquireOutcome, ProcessId, Removal, ResourceId};

/// One scripted operation. Indices refer to the scenario's population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Acquire { process: usize, resource: usize },
    Release { process: usize, resource: usize },
    Detect,
}

/// What a step returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum StepResult {
    Acquired { outcome: AcquireOutcome },
    Released { promoted: Option<ProcessId> },
    Detected { cycle: Option<DeadlockCycle> },
    Failed { error: String },
}

impl fmt::Display for StepResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepResult::Acquired { outcome } => write!(f, "{:?}", outcome),
            StepResult::Released {
                promoted: Some(next),
            } => write!(f, "released, promoted {}", next),
            StepResult::Released { promoted: None } => write!(f, "released"),
            StepResult::Detected { cycle: Some(cycle) } => write!(f, "deadlock: {}", cycle),
            StepResult::Detected { cycle: None } => write!(f, "no deadlock"),
            StepResult::Failed { error } => write!(f, "error: {}", error),
        }
    }
}

/// A named script over a fixed population.
#[derive(Debug, Clone)]
pub struct Scenario {
    name: String,
    processes: usize,
    resources: usize,
    steps: Vec<Step>,
}

/// Record of a scenario run.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioOutcome {
    pub name: String,
    pub processes: Vec<ProcessId>,
    pub resources: Vec<ResourceId>,
    pub steps: Vec<(Step, StepResult)>,
    /// Graph state after the last step, before teardown.
    pub final_graph: GraphSnapshot,
}

impl ScenarioOutcome {
    /// Results of the `Detect` steps, in order.
    pub fn detections(&self) -> Vec<bool> {
        self.steps
            .iter()
            .filter_map(|(_, result)| match result {
                StepResult::Detected { cycle } => Some(cycle.is_some()),
                _ => None,
            })
            .collect()
    }

    /// Print a human-readable transcript.
    pub fn print(&self) {
        println!("Scenario: {}", self.name);
        for (i, (step, result)) in self.steps.iter().enumerate() {
            println!("  {:>2}. {:<40} {}", i + 1, self.describe(step), result);
        }
    }

    fn describe(&self, step: &Step) -> String {
        let name = |process: usize, resource: usize| {
            match lookup(&self.processes, &self.resources, process, resource) {
                Ok((p, r)) => format!("{p}, {r}"),
                Err(_) => format!("#{process}, #{resource}"),
            }
        };
        match *step {
            Step::Acquire { process, resource } => format!("acquire({})", name(process, resource)),
            Step::Release { process, resource } => format!("release({})", name(process, resource)),
            Step::Detect => "detect_deadlock()".to_string(),
        }
    }
}

/// Resolve a step's population indices.
fn lookup(
    processes: &[ProcessId],
    resources: &[ResourceId],
    process: usize,
    resource: usize,
) -> Result<(ProcessId, ResourceId), SimulatorError> {
    let p = processes.get(process).copied().ok_or_else(|| {
        SimulatorError::StepOutOfRange(format!(
            "process #{process} of {}",
            processes.len()
        ))
    })?;
    let r = resources.get(resource).copied().ok_or_else(|| {
        SimulatorError::StepOutOfRange(format!(
            "resource #{resource} of {}",
            resources.len()
        ))
    })?;
    Ok((p, r))
}

impl Scenario {
    /// Create an empty scenario.
    pub fn new(name: impl Into<String>, processes: usize, resources: usize) -> Self {
        Self {
            name: name.into(),
            processes,
            resources,
            steps: Vec::new(),
        }
    }

    /// Append an acquire step.
    pub fn acquire(mut self, process: usize, resource: usize) -> Self {
        self.steps.push(Step::Acquire { process, resource });
        self
    }

    /// Append a release step.
    pub fn release(mut self, process: usize, resource: usize) -> Self {
        self.steps.push(Step::Release { process, resource });
        self
    }

    /// Append a detection step.
    pub fn detect(mut self) -> Self {
        self.steps.push(Step::Detect);
        self
    }

    /// Two processes acquire two resources in opposite order, deadlock,
    /// then one of them releases and the cycle is gone.
    pub fn abba() -> Self {
        Self::new("abba", 2, 2)
            .acquire(0, 0)
            .acquire(1, 1)
            .acquire(0, 1)
            .acquire(1, 0)
            .detect()
            .release(1, 1)
            .detect()
    }

    /// `n` processes each hold one resource and wait on the next one round
    /// the ring.
    pub fn ring(n: usize) -> Self {
        let n = n.max(2);
        let mut scenario = Self::new(format!("ring-{n}"), n, n);
        for i in 0..n {
            scenario = scenario.acquire(i, i);
        }
        for i in 0..n {
            scenario = scenario.acquire(i, (i + 1) % n);
        }
        scenario.detect()
    }

    /// Like [`Scenario::ring`] without the closing edge. Never deadlocks.
    pub fn chain(n: usize) -> Self {
        let n = n.max(2);
        let mut scenario = Self::new(format!("chain-{n}"), n, n);
        for i in 0..n {
            scenario = scenario.acquire(i, i);
        }
        for i in 0..n - 1 {
            scenario = scenario.acquire(i, i + 1);
        }
        scenario.detect()
    }

    /// Look up a built-in scenario by name.
    pub fn by_name(name: &str, size: usize) -> Result<Self, SimulatorError> {
        match name {
            "abba" => Ok(Self::abba()),
            "ring" => Ok(Self::ring(size)),
            "chain" => Ok(Self::chain(size)),
            other => Err(SimulatorError::UnknownScenario(other.to_string())),
        }
    }

    /// The scenario name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The scripted steps.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Replay the scenario against a fresh manager.
    ///
    /// Step failures are recorded, not returned. Only registration and
    /// teardown failures abort the run.
    pub fn run(&self, config: &ManagerConfig) -> Result<ScenarioOutcome, SimulatorError> {
        let manager = AllocationManager::new(config.clone());
        let processes = (0..self.processes)
            .map(|_| manager.register_process())
            .collect::<Result<Vec<_>, _>>()?;
        let resources = (0..self.resources)
            .map(|_| manager.register_resource())
            .collect::<Result<Vec<_>, _>>()?;

        let mut steps = Vec::with_capacity(self.steps.len());
        for &step in &self.steps {
            let result = match step {
                Step::Acquire { process, resource } => {
                    match lookup(&processes, &resources, process, resource)
                        .and_then(|(p, r)| Ok(manager.acquire(p, r)?))
                    {
                        Ok(outcome) => StepResult::Acquired { outcome },
                        Err(e) => StepResult::Failed {
                            error: e.to_string(),
                        },
                    }
                }
                Step::Release { process, resource } => {
                    match lookup(&processes, &resources, process, resource)
                        .and_then(|(p, r)| Ok(manager.release(p, r)?))
                    {
                        Ok(promoted) => StepResult::Released { promoted },
                        Err(e) => StepResult::Failed {
                            error: e.to_string(),
                        },
                    }
                }
                Step::Detect => {
                    let cycle = manager.find_deadlock();
                    if cycle.is_none() {
                        info!(scenario = %self.name, "No deadlock detected");
                    }
                    StepResult::Detected { cycle }
                }
            };
            steps.push((step, result));
        }

        let final_graph = manager.snapshot();

        for &p in &processes {
            manager.unregister_process(p, Removal::Cascade)?;
        }
        for &r in &resources {
            manager.unregister_resource(r, Removal::Cascade)?;
        }

        Ok(ScenarioOutcome {
            name: self.name.clone(),
            processes,
            resources,
            steps,
            final_graph,
        })
    }
}
