//! End-to-end allocation scenarios through the public manager API.

use waitgraph_test_helpers::{abba, chain, ring, Fixture};
use waitgraph_types::{AcquireOutcome, NodeRef, Removal, ResourceState};

#[test]
fn test_abba_deadlock_is_detected() {
    let fx = abba();

    assert!(fx.manager.detect_deadlock());

    let cycle = fx.manager.find_deadlock().unwrap();
    assert_eq!(cycle.processes(), vec![fx.p(0), fx.p(1)]);
    assert_eq!(cycle.nodes()[0], NodeRef::Process(fx.p(0)));
}

#[test]
fn test_releasing_one_edge_breaks_the_cycle() {
    let fx = abba();

    // P2 releases R2, which is granted to P1 per FIFO
    assert_eq!(fx.manager.release(fx.p(1), fx.r(1)), Ok(Some(fx.p(0))));
    assert_eq!(fx.manager.state(fx.r(1)), Ok(ResourceState::Held(fx.p(0))));
    assert!(!fx.manager.detect_deadlock());

    // P2 is still waiting on R1, now held by P1, which waits on nothing
    assert_eq!(fx.manager.waiting_for(fx.p(1)).unwrap(), vec![fx.r(0)]);
    assert!(fx.manager.waiting_for(fx.p(0)).unwrap().is_empty());
}

#[test]
fn test_ring_deadlock_includes_every_process() {
    let fx = ring(8);

    let cycle = fx.manager.find_deadlock().unwrap();
    assert_eq!(cycle.processes().len(), 8);
    assert_eq!(cycle.resources().len(), 8);
    for &p in &fx.processes {
        assert!(cycle.contains_process(p));
    }
}

#[test]
fn test_chain_is_not_deadlocked() {
    let fx = chain(8);
    assert!(!fx.manager.detect_deadlock());

    // Unwinding from the tail promotes down the chain
    for i in (1..8).rev() {
        assert_eq!(fx.manager.release(fx.p(i), fx.r(i)), Ok(Some(fx.p(i - 1))));
    }
    fx.manager.check_invariants().unwrap();
}

#[test]
fn test_wait_on_unheld_chain_is_not_deadlocked() {
    // P1 waits on R1 held by P2; P2 waits on R2 held by P3; P3 waits on nothing
    let fx = Fixture::new(3, 2);
    fx.acquire_expect(1, 0, AcquireOutcome::Granted);
    fx.acquire_expect(2, 1, AcquireOutcome::Granted);
    fx.acquire_expect(0, 0, AcquireOutcome::Queued);
    fx.acquire_expect(1, 1, AcquireOutcome::Queued);

    let report = fx.manager.scan();
    assert!(!report.is_deadlocked());
    assert_eq!(report.stats.nodes_visited, 5);
}

#[test]
fn test_deadlock_survives_unrelated_activity() {
    let fx = Fixture::new(4, 4);
    fx.acquire_expect(0, 0, AcquireOutcome::Granted);
    fx.acquire_expect(1, 1, AcquireOutcome::Granted);
    fx.acquire_expect(0, 1, AcquireOutcome::Queued);
    fx.acquire_expect(1, 0, AcquireOutcome::Queued);

    // Unrelated processes churn on their own resources
    for _ in 0..10 {
        fx.acquire_expect(2, 2, AcquireOutcome::Granted);
        fx.acquire_expect(3, 2, AcquireOutcome::Queued);
        assert_eq!(fx.manager.release(fx.p(2), fx.r(2)), Ok(Some(fx.p(3))));
        assert_eq!(fx.manager.release(fx.p(3), fx.r(2)), Ok(None));
        assert!(fx.manager.detect_deadlock());
    }
}

#[test]
fn test_teardown_with_cascade_leaves_empty_graph() {
    let fx = ring(5);

    for &p in &fx.processes {
        fx.manager.unregister_process(p, Removal::Cascade).unwrap();
        fx.manager.check_invariants().unwrap();
    }
    for &r in &fx.resources {
        fx.manager.unregister_resource(r, Removal::Strict).unwrap();
    }

    assert_eq!(fx.manager.process_count(), 0);
    assert_eq!(fx.manager.resource_count(), 0);
    assert!(fx.manager.snapshot().is_idle());
}
