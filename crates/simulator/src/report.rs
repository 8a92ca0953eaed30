//! Metrics collection and reporting for workload runs.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Lock-free counters shared by workers and the checker.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    acquires: AtomicU64,
    granted: AtomicU64,
    queued: AtomicU64,
    releases: AtomicU64,
    promotions: AtomicU64,
    promoted_waits: AtomicU64,
    wait_timeouts: AtomicU64,
    backoffs: AtomicU64,
    checks: AtomicU64,
    deadlocks: AtomicU64,
}

impl MetricsCollector {
    pub fn record_acquire(&self, granted: bool) {
        self.acquires.fetch_add(1, Ordering::Relaxed);
        if granted {
            self.granted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.queued.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_release(&self, promoted: bool) {
        self.releases.fetch_add(1, Ordering::Relaxed);
        if promoted {
            self.promotions.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// A worker released everything it held in one call.
    pub fn record_release_all(&self, released: usize, promotions: usize) {
        self.releases.fetch_add(released as u64, Ordering::Relaxed);
        self.promotions.fetch_add(promotions as u64, Ordering::Relaxed);
    }

    /// The checker told a worker to back off.
    pub fn record_backoff(&self, released: usize, promotions: usize) {
        self.backoffs.fetch_add(1, Ordering::Relaxed);
        self.record_release_all(released, promotions);
    }

    pub fn record_promoted_wait(&self) {
        self.promoted_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_wait_timeout(&self) {
        self.wait_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_check(&self, deadlocked: bool) {
        self.checks.fetch_add(1, Ordering::Relaxed);
        if deadlocked {
            self.deadlocks.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Freeze the counters into a report.
    pub fn report(
        &self,
        workers: usize,
        resources: usize,
        elapsed: Duration,
        sample_cycle: Option<String>,
        leaked_edges: usize,
    ) -> SimulationReport {
        SimulationReport {
            workers,
            resources,
            elapsed_ms: elapsed.as_millis() as u64,
            acquires: self.acquires.load(Ordering::Relaxed),
            granted: self.granted.load(Ordering::Relaxed),
            queued: self.queued.load(Ordering::Relaxed),
            releases: self.releases.load(Ordering::Relaxed),
            promotions: self.promotions.load(Ordering::Relaxed),
            promoted_waits: self.promoted_waits.load(Ordering::Relaxed),
            wait_timeouts: self.wait_timeouts.load(Ordering::Relaxed),
            backoffs: self.backoffs.load(Ordering::Relaxed),
            checks: self.checks.load(Ordering::Relaxed),
            deadlocks: self.deadlocks.load(Ordering::Relaxed),
            sample_cycle,
            leaked_edges,
        }
    }
}

/// Summary of a workload run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SimulationReport {
    pub workers: usize,
    pub resources: usize,
    pub elapsed_ms: u64,
    /// Acquire calls that returned `Granted` or `Queued`.
    pub acquires: u64,
    pub granted: u64,
    pub queued: u64,
    /// Successful releases, including back-off releases.
    pub releases: u64,
    /// Resources handed to a queue head.
    pub promotions: u64,
    /// Queued requests that were eventually granted.
    pub promoted_waits: u64,
    /// Queued requests abandoned after the wait limit.
    pub wait_timeouts: u64,
    /// Workers told by the checker to drop everything.
    pub backoffs: u64,
    /// Detector scans run by the checker.
    pub checks: u64,
    /// Scans that found a cycle.
    pub deadlocks: u64,
    /// The first cycle found, rendered as text.
    pub sample_cycle: Option<String>,
    /// Edges left in the graph after every worker shut down. Always zero
    /// unless a worker failed.
    pub leaked_edges: usize,
}

impl SimulationReport {
    /// Fraction of acquires granted immediately.
    pub fn grant_rate(&self) -> f64 {
        if self.acquires == 0 {
            0.0
        } else {
            self.granted as f64 / self.acquires as f64
        }
    }

    /// Print a human-readable summary.
    pub fn print(&self) {
        println!("\n=== Simulation Report ===");
        println!("Workers:         {}", self.workers);
        println!("Resources:       {}", self.resources);
        println!("Elapsed:         {} ms", self.elapsed_ms);
        println!();
        println!("Acquires:        {}", self.acquires);
        println!(
            "  Granted:       {} ({:.1}%)",
            self.granted,
            self.grant_rate() * 100.0
        );
        println!("  Queued:        {}", self.queued);
        println!("  Promoted:      {}", self.promoted_waits);
        println!("  Timed out:     {}", self.wait_timeouts);
        println!("Releases:        {}", self.releases);
        println!("Promotions:      {}", self.promotions);
        println!();
        println!("Deadlock checks: {}", self.checks);
        println!("Deadlocks found: {}", self.deadlocks);
        println!("Back-offs:       {}", self.backoffs);
        if let Some(cycle) = &self.sample_cycle {
            println!("Sample cycle:    {}", cycle);
        }
    }
}
