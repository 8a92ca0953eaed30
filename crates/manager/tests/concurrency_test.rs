//! Randomized and multi-threaded tests of the allocation protocol.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use waitgraph_manager::{AllocationManager, ManagerConfig};
use waitgraph_test_helpers::Fixture;
use waitgraph_types::{AcquireOutcome, AllocationError, ErrorKind, ProcessId, ResourceId};

/// Straightforward model of a single resource.
#[derive(Default, Clone)]
struct ModelResource {
    holder: Option<ProcessId>,
    queue: VecDeque<ProcessId>,
}

#[test]
fn test_random_operations_match_model() {
    for seed in 0..20u64 {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let fx = Fixture::new(6, 4);
        let mut model: HashMap<ResourceId, ModelResource> = fx
            .resources
            .iter()
            .map(|&r| (r, ModelResource::default()))
            .collect();

        for _ in 0..500 {
            let p = fx.p(rng.gen_range(0..fx.processes.len()));
            let r = fx.r(rng.gen_range(0..fx.resources.len()));
            let entry = model.get_mut(&r).unwrap();

            if rng.gen_bool(0.5) {
                let result = fx.manager.acquire(p, r);
                match entry.holder {
                    None => {
                        assert_eq!(result, Ok(AcquireOutcome::Granted));
                        entry.holder = Some(p);
                    }
                    Some(h) if h == p => {
                        assert_eq!(result.unwrap_err().kind(), ErrorKind::AlreadyHeld);
                    }
                    Some(_) => {
                        assert_eq!(result, Ok(AcquireOutcome::Queued));
                        if !entry.queue.contains(&p) {
                            entry.queue.push_back(p);
                        }
                    }
                }
            } else {
                let result = fx.manager.release(p, r);
                if entry.holder == Some(p) {
                    let next = entry.queue.pop_front();
                    assert_eq!(result, Ok(next));
                    entry.holder = next;
                } else {
                    assert_eq!(
                        result,
                        Err(AllocationError::NotHolder {
                            process: p,
                            resource: r,
                            holder: entry.holder,
                        })
                    );
                }
            }

            fx.manager.check_invariants().unwrap();
            for (&res, expected) in &model {
                assert_eq!(fx.manager.state(res).unwrap().holder(), expected.holder);
                assert_eq!(
                    fx.manager.waiters(res).unwrap(),
                    expected.queue.iter().copied().collect::<Vec<_>>()
                );
            }
        }
    }
}

#[test]
fn test_concurrent_workers_keep_graph_consistent() {
    const WORKERS: usize = 8;
    const RESOURCES: usize = 5;
    const OPS: usize = 2_000;

    let manager = Arc::new(AllocationManager::new(ManagerConfig::default()));
    let resources: Vec<ResourceId> = (0..RESOURCES)
        .map(|_| manager.register_resource().unwrap())
        .collect();
    let done = Arc::new(AtomicBool::new(false));
    let scans = Arc::new(AtomicUsize::new(0));

    let checker = {
        let manager = Arc::clone(&manager);
        let done = Arc::clone(&done);
        let scans = Arc::clone(&scans);
        thread::spawn(move || {
            while !done.load(Ordering::Relaxed) {
                // A scan always sees a consistent graph
                manager.check_invariants().unwrap();
                let _ = manager.detect_deadlock();
                scans.fetch_add(1, Ordering::Relaxed);
                thread::yield_now();
            }
        })
    };

    let workers: Vec<_> = (0..WORKERS)
        .map(|i| {
            let manager = Arc::clone(&manager);
            let resources = resources.clone();
            thread::spawn(move || {
                let mut rng = ChaCha8Rng::seed_from_u64(i as u64);
                let me = manager.register_process().unwrap();
                for _ in 0..OPS {
                    let r = resources[rng.gen_range(0..resources.len())];
                    if rng.gen_bool(0.5) {
                        match manager.acquire(me, r) {
                            Ok(_) => {}
                            Err(AllocationError::AlreadyHeld { .. }) => {}
                            Err(e) => panic!("unexpected acquire error: {e}"),
                        }
                    } else {
                        match manager.release(me, r) {
                            Ok(_) => {}
                            Err(AllocationError::NotHolder { .. }) => {}
                            Err(e) => panic!("unexpected release error: {e}"),
                        }
                    }
                    // Give up pending requests now and then so queues drain
                    if rng.gen_ratio(1, 10) {
                        for waiting in manager.waiting_for(me).unwrap() {
                            manager.withdraw(me, waiting).unwrap();
                        }
                    }
                }
                manager.release_all(me).unwrap();
                for waiting in manager.waiting_for(me).unwrap() {
                    manager.withdraw(me, waiting).unwrap();
                }
                me
            })
        })
        .collect();

    let processes: Vec<ProcessId> = workers.into_iter().map(|w| w.join().unwrap()).collect();
    done.store(true, Ordering::Relaxed);
    checker.join().unwrap();

    manager.check_invariants().unwrap();
    assert!(scans.load(Ordering::Relaxed) > 0);

    // A worker's final release_all may have promoted a still-running worker,
    // so clean up with cascade and check everything is free afterwards.
    for p in processes {
        manager
            .unregister_process(p, waitgraph_types::Removal::Cascade)
            .unwrap();
    }
    assert!(manager.snapshot().is_idle());
    assert!(!manager.detect_deadlock());
}
