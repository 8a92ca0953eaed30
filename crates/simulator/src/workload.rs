//! Concurrent workload with a periodic deadlock checker.
//!
//! Each worker thread owns one process and randomly acquires and releases
//! shared resources. A queued worker polls until it is promoted, gives up
//! after `max_wait`, or is told to back off.
//!
//! The checker thread scans for deadlocks every `check_interval`. On a hit
//! it picks the most recently registered process in the cycle and tells it
//! to release everything. That victim policy belongs to this harness only;
//! the allocation manager itself just reports cycles.

use crate::config::SimulatorConfig;
use crate::error::SimulatorError;
use crate::report::{MetricsCollector, SimulationReport};
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use waitgraph_manager::AllocationManager;
use waitgraph_types::{AcquireOutcome, ProcessId, Removal, ResourceId};

/// Poll interval for queued workers.
const WAIT_POLL: Duration = Duration::from_micros(200);

/// State shared by the workers and the checker for one run.
struct Shared<'a> {
    config: &'a SimulatorConfig,
    manager: &'a AllocationManager,
    resources: &'a [ResourceId],
    metrics: &'a MetricsCollector,
    /// Processes the checker wants to back off.
    victims: &'a Mutex<HashSet<ProcessId>>,
}

impl Shared<'_> {
    fn take_victim_flag(&self, process: ProcessId) -> bool {
        self.victims.lock().remove(&process)
    }
}

/// Runs a concurrent workload against a fresh allocation manager.
pub struct WorkloadSimulator {
    config: SimulatorConfig,
}

impl WorkloadSimulator {
    /// Create a simulator.
    pub fn new(config: SimulatorConfig) -> Self {
        Self { config }
    }

    /// The simulator configuration.
    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Run every worker to completion and return the collected metrics.
    pub fn run(&self) -> Result<SimulationReport, SimulatorError> {
        let config = &self.config;
        config.validate()?;
        let manager = AllocationManager::new(config.manager.clone());

        let resources = (0..config.resources)
            .map(|_| manager.register_resource())
            .collect::<Result<Vec<_>, _>>()?;
        let processes = (0..config.workers)
            .map(|_| manager.register_process())
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            workers = config.workers,
            resources = config.resources,
            ops_per_worker = config.ops_per_worker,
            seed = config.seed,
            "Starting workload"
        );

        let metrics = MetricsCollector::default();
        let victims = Mutex::new(HashSet::new());
        let sample_cycle: Mutex<Option<String>> = Mutex::new(None);
        let done = AtomicBool::new(false);
        let shared = Shared {
            config,
            manager: &manager,
            resources: &resources,
            metrics: &metrics,
            victims: &victims,
        };

        let start = Instant::now();
        let result = thread::scope(|s| {
            let checker = s.spawn(|| check_loop(&shared, &sample_cycle, &done));

            let workers: Vec<_> = processes
                .iter()
                .enumerate()
                .map(|(index, &process)| {
                    let shared = &shared;
                    s.spawn(move || run_worker(shared, index, process))
                })
                .collect();

            let mut result = Ok(());
            for (index, handle) in workers.into_iter().enumerate() {
                let joined = handle
                    .join()
                    .map_err(|_| SimulatorError::WorkerPanicked(index))
                    .and_then(|r| r);
                if let Err(e) = joined {
                    warn!(worker = index, error = %e, "Worker failed");
                    if result.is_ok() {
                        result = Err(e);
                    }
                }
            }

            done.store(true, Ordering::Release);
            if checker.join().is_err() {
                warn!("Deadlock checker panicked");
            }
            result
        });
        let elapsed = start.elapsed();
        result?;

        let snapshot = manager.snapshot();
        let leaked_edges = snapshot.wait_edge_count() + snapshot.held_edge_count();
        if leaked_edges > 0 {
            warn!(leaked_edges, "Edges left after workers finished");
        }

        for &p in &processes {
            manager.unregister_process(p, Removal::Cascade)?;
        }
        for &r in &resources {
            manager.unregister_resource(r, Removal::Cascade)?;
        }

        let sample_cycle = sample_cycle.into_inner();
        Ok(metrics.report(
            config.workers,
            config.resources,
            elapsed,
            sample_cycle,
            leaked_edges,
        ))
    }
}

/// Scan for deadlocks until every worker has finished.
fn check_loop(shared: &Shared<'_>, sample_cycle: &Mutex<Option<String>>, done: &AtomicBool) {
    let interval = shared.config.check_interval();

    while !done.load(Ordering::Acquire) {
        let cycle = shared.manager.find_deadlock();
        shared.metrics.record_check(cycle.is_some());

        if let Some(cycle) = cycle {
            if let Some(victim) = cycle.processes().into_iter().max() {
                debug!(victim = %victim, "Asking process to back off");
                shared.victims.lock().insert(victim);
            }
            sample_cycle.lock().get_or_insert_with(|| cycle.to_string());
        }

        thread::sleep(interval);
    }
}

/// One worker: a process doing random acquire/release operations.
fn run_worker(
    shared: &Shared<'_>,
    index: usize,
    process: ProcessId,
) -> Result<(), SimulatorError> {
    let config = shared.config;
    let manager = shared.manager;
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed.wrapping_add(index as u64));

    for _ in 0..config.ops_per_worker {
        if shared.take_victim_flag(process) {
            back_off(shared, process, None)?;
        }

        let held = manager.held_by(process)?;
        let can_acquire =
            held.len() < config.max_holds_per_worker && held.len() < shared.resources.len();

        if can_acquire && (held.is_empty() || rng.gen_bool(config.acquire_ratio)) {
            let candidates: Vec<ResourceId> = shared
                .resources
                .iter()
                .copied()
                .filter(|r| !held.contains(r))
                .collect();
            let resource = candidates[rng.gen_range(0..candidates.len())];

            match manager.acquire(process, resource)? {
                AcquireOutcome::Granted => shared.metrics.record_acquire(true),
                AcquireOutcome::Queued => {
                    shared.metrics.record_acquire(false);
                    wait_for_grant(shared, process, resource)?;
                }
            }
        } else if !held.is_empty() {
            let resource = held[rng.gen_range(0..held.len())];
            let promoted = manager.release(process, resource)?;
            shared.metrics.record_release(promoted.is_some());
        }
    }

    // Drop any leftover victim flag so shutdown is a plain release
    shared.take_victim_flag(process);
    let released = manager.held_by(process)?.len();
    let promotions = manager.release_all(process)?;
    shared.metrics.record_release_all(released, promotions.len());
    debug!(
        process = %process,
        released,
        promotions = promotions.len(),
        "Worker finished"
    );
    Ok(())
}

/// Poll until `resource` is granted, the wait limit passes, or the checker
/// picks this process as a victim.
fn wait_for_grant(
    shared: &Shared<'_>,
    process: ProcessId,
    resource: ResourceId,
) -> Result<(), SimulatorError> {
    let manager = shared.manager;
    let deadline = Instant::now() + shared.config.max_wait();

    loop {
        if manager.state(resource)?.holder() == Some(process) {
            shared.metrics.record_promoted_wait();
            return Ok(());
        }

        if shared.take_victim_flag(process) {
            return back_off(shared, process, Some(resource));
        }

        if Instant::now() >= deadline {
            // The withdraw can race a promotion; whichever wins decides
            if manager.withdraw(process, resource)? {
                shared.metrics.record_wait_timeout();
            } else {
                shared.metrics.record_promoted_wait();
            }
            return Ok(());
        }

        thread::sleep(WAIT_POLL);
    }
}

/// Withdraw the pending request, if any, then release everything held.
fn back_off(
    shared: &Shared<'_>,
    process: ProcessId,
    pending: Option<ResourceId>,
) -> Result<(), SimulatorError> {
    let manager = shared.manager;
    if let Some(resource) = pending {
        manager.withdraw(process, resource)?;
    }

    // Not queued anywhere now, so the held set cannot grow under us
    let released = manager.held_by(process)?.len();
    let promotions = manager.release_all(process)?;
    shared.metrics.record_backoff(released, promotions.len());

    debug!(
        process = %process,
        released,
        promotions = promotions.len(),
        "Backed off"
    );
    Ok(())
}
