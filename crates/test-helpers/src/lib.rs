//! Test helpers for waitgraph.
//!
//! Builds common allocation shapes on a fresh [`AllocationManager`] through
//! its public API, so fixtures exercise the same acquire/release paths as
//! real callers.
//!
//! These helpers panic on unexpected results; they are only meant for tests.

use waitgraph_manager::{AllocationManager, ManagerConfig};
use waitgraph_types::{AcquireOutcome, ProcessId, ResourceId};

/// A manager plus the ids registered on it.
pub struct Fixture {
    pub manager: AllocationManager,
    pub processes: Vec<ProcessId>,
    pub resources: Vec<ResourceId>,
}

impl Fixture {
    /// Register `processes` processes and `resources` free resources on an
    /// unbounded manager.
    pub fn new(processes: usize, resources: usize) -> Self {
        let manager = AllocationManager::new(ManagerConfig::unbounded());
        let processes = (0..processes)
            .map(|_| manager.register_process().expect("register process"))
            .collect();
        let resources = (0..resources)
            .map(|_| manager.register_resource().expect("register resource"))
            .collect();
        Self {
            manager,
            processes,
            resources,
        }
    }

    /// Process `i`.
    pub fn p(&self, i: usize) -> ProcessId {
        self.processes[i]
    }

    /// Resource `i`.
    pub fn r(&self, i: usize) -> ResourceId {
        self.resources[i]
    }

    /// Acquire and assert the outcome.
    pub fn acquire_expect(&self, process: usize, resource: usize, expected: AcquireOutcome) {
        let outcome = self
            .manager
            .acquire(self.p(process), self.r(resource))
            .expect("acquire");
        assert_eq!(
            outcome,
            expected,
            "acquire({}, {})",
            self.p(process),
            self.r(resource)
        );
    }
}

/// The classic two-process deadlock.
///
/// P1 holds R1 and waits on R2; P2 holds R2 and waits on R1.
pub fn abba() -> Fixture {
    let fx = Fixture::new(2, 2);
    fx.acquire_expect(0, 0, AcquireOutcome::Granted);
    fx.acquire_expect(1, 1, AcquireOutcome::Granted);
    fx.acquire_expect(0, 1, AcquireOutcome::Queued);
    fx.acquire_expect(1, 0, AcquireOutcome::Queued);
    fx
}

/// `n` processes in a ring: process `i` holds resource `i` and waits on
/// resource `(i + 1) % n`. Deadlocked for any `n >= 2`.
pub fn ring(n: usize) -> Fixture {
    let fx = chain(n);
    if n >= 2 {
        fx.acquire_expect(n - 1, 0, AcquireOutcome::Queued);
    }
    fx
}

/// `n` processes in an open chain: process `i` holds resource `i` and, except
/// for the last, waits on resource `i + 1`. Never deadlocked.
pub fn chain(n: usize) -> Fixture {
    let fx = Fixture::new(n, n);
    for i in 0..n {
        fx.acquire_expect(i, i, AcquireOutcome::Granted);
    }
    for i in 0..n.saturating_sub(1) {
        fx.acquire_expect(i, i + 1, AcquireOutcome::Queued);
    }
    fx
}
