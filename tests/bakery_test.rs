/*!
 * Bakery Lock Integration Tests
 *
 * Mutual exclusion and service order under real thread contention
 */

use bakery_sim::core::limits::OBSERVER_ID_BASE;
use bakery_sim::{BakeryCell, BakeryError, BakeryLock, SpinConfig};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

fn wait_for_ticket(lock: &BakeryLock, id: u64) -> u64 {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let ticket = lock.ticket(id).unwrap();
        if ticket != 0 {
            return ticket;
        }
        assert!(Instant::now() < deadline, "participant {} never drew a ticket", id);
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn test_occupancy_never_exceeds_one() {
    let lock = Arc::new(BakeryLock::with_spin(16, SpinConfig::yielding()));
    let inside = Arc::new(AtomicUsize::new(0));
    let max_inside = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (1..=8u64)
        .map(|id| {
            lock.register(id).unwrap();
            let lock = Arc::clone(&lock);
            let inside = Arc::clone(&inside);
            let max_inside = Arc::clone(&max_inside);
            thread::spawn(move || {
                for _ in 0..200 {
                    let _ticket = lock.lock(id).unwrap();
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_inside.fetch_max(now, Ordering::SeqCst);
                    thread::yield_now();
                    inside.fetch_sub(1, Ordering::SeqCst);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    assert_eq!(lock.stats().acquisitions, 8 * 200);
    assert!(lock.is_quiescent());
}

#[test]
fn test_cell_counter_is_exact() {
    let cell = Arc::new(BakeryCell::new(BakeryLock::new(8), 0u64));
    let handles: Vec<_> = (1..=4u64)
        .map(|id| {
            cell.raw().register(id).unwrap();
            let cell = Arc::clone(&cell);
            thread::spawn(move || {
                for _ in 0..500 {
                    let mut value = cell.lock(id).unwrap();
                    let read = *value;
                    thread::yield_now();
                    *value = read + 1;
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(*cell.lock(1).unwrap(), 2_000);
}

#[test]
fn test_waiters_are_served_in_ticket_order() {
    let lock = Arc::new(BakeryLock::new(8));
    for id in [1, 2, 3] {
        lock.register(id).unwrap();
    }
    let order = Arc::new(Mutex::new(Vec::new()));

    let holder = lock.lock(1).unwrap();

    let spawn_waiter = |id: u64| {
        let lock = Arc::clone(&lock);
        let order = Arc::clone(&order);
        thread::spawn(move || {
            let ticket = lock.lock(id).unwrap();
            order.lock().unwrap().push((id, ticket.number()));
        })
    };

    // Participant 3 arrives first, so it is served before 2 despite the larger id
    let third = spawn_waiter(3);
    let third_ticket = wait_for_ticket(&lock, 3);
    let second = spawn_waiter(2);
    let second_ticket = wait_for_ticket(&lock, 2);
    assert!(third_ticket < second_ticket);

    drop(holder);
    third.join().unwrap();
    second.join().unwrap();

    let served: Vec<_> = order.lock().unwrap().iter().map(|(id, _)| *id).collect();
    assert_eq!(served, vec![3, 2]);
}

#[test]
fn test_waiter_keeps_lock_busy() {
    let lock = Arc::new(BakeryLock::new(4));
    lock.register(1).unwrap();
    lock.register(2).unwrap();

    let holder = lock.lock(1).unwrap();
    let waiter = {
        let lock = Arc::clone(&lock);
        thread::spawn(move || lock.lock(2).map(|ticket| ticket.number()))
    };
    wait_for_ticket(&lock, 2);

    assert_eq!(lock.unregister(2), Err(BakeryError::ParticipantBusy(2)));
    assert!(matches!(lock.reset(), Err(BakeryError::ParticipantBusy(_))));

    drop(holder);
    assert!(waiter.join().unwrap().is_ok());
    lock.reset().unwrap();
    assert!(lock.is_empty());
}

#[test]
fn test_observer_identities_do_not_collide_with_pids() {
    let lock = BakeryLock::new(4);
    lock.register(1).unwrap();
    lock.register(OBSERVER_ID_BASE).unwrap();
    assert_eq!(lock.participants(), vec![1, OBSERVER_ID_BASE]);
}

#[test]
fn test_slots_are_reused_after_unregister() {
    let lock = BakeryLock::new(2);
    lock.register(1).unwrap();
    lock.register(2).unwrap();
    assert_eq!(
        lock.register(3),
        Err(BakeryError::CapacityExhausted { capacity: 2 })
    );

    lock.unregister(1).unwrap();
    lock.register(3).unwrap();
    let ticket = lock.lock(3).unwrap();
    assert_eq!(ticket.number(), 1);
}
