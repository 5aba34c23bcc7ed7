/*!
 * State Manager Tests
 *
 * Transition legality, event ordering and snapshots with concurrent callers
 */

use bakery_sim::{
    participant_of, ChannelSink, DispatchPolicy, FanoutSink, ProcessRecord, ProcessState,
    StateError, StateManager, TransitionEvent, TransitionSink,
};
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

/// Counts events and remembers the highest sequence number seen
#[derive(Default)]
struct CountingSink {
    events: AtomicU64,
    last_seq: AtomicU64,
}

impl TransitionSink for CountingSink {
    fn on_transition(&self, event: &TransitionEvent) {
        self.events.fetch_add(1, Ordering::SeqCst);
        self.last_seq.fetch_max(event.seq, Ordering::SeqCst);
    }
}

fn events_by_pid(events: &[TransitionEvent]) -> BTreeMap<u32, Vec<(ProcessState, ProcessState)>> {
    let mut by_pid: BTreeMap<_, Vec<_>> = BTreeMap::new();
    for event in events {
        by_pid
            .entry(event.pid)
            .or_default()
            .push((event.from, event.to));
    }
    by_pid
}

#[test]
fn test_concurrent_lifecycles_are_legal_and_totally_ordered() {
    let (channel, rx) = ChannelSink::channel();
    let counter = Arc::new(CountingSink::default());
    let sink = FanoutSink::new()
        .with(Arc::new(channel))
        .with(counter.clone());
    let manager = Arc::new(
        StateManager::builder()
            .with_policy(DispatchPolicy::AnyReady)
            .with_sink(Arc::new(sink))
            .build(),
    );

    let handles: Vec<_> = (1..=12u32)
        .map(|pid| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                let me = participant_of(pid);
                manager.register(me).unwrap();
                manager.admit(me, ProcessRecord::new(pid, ms(3))).unwrap();
                manager.dispatch(me, pid).unwrap();
                while !manager.progress(me, pid, ms(1)).unwrap().is_zero() {}
                manager.terminate(me, pid).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let events: Vec<_> = rx.try_iter().collect();
    let seqs: Vec<_> = events.iter().map(|e| e.seq).collect();
    assert_eq!(seqs, (1..=36).collect::<Vec<u64>>());
    assert_eq!(counter.events.load(Ordering::SeqCst), 36);
    assert_eq!(counter.last_seq.load(Ordering::SeqCst), 36);

    let lifecycle = vec![
        (ProcessState::New, ProcessState::Ready),
        (ProcessState::Ready, ProcessState::Running),
        (ProcessState::Running, ProcessState::Terminated),
    ];
    for (pid, steps) in events_by_pid(&events) {
        assert_eq!(steps, lifecycle, "process {}", pid);
    }

    let snapshot = manager.snapshot().unwrap();
    let mut terminated = snapshot.terminated_ids();
    terminated.sort_unstable();
    assert_eq!(terminated, (1..=12).collect::<Vec<_>>());
    assert!(snapshot.is_consistent());
}

#[test]
fn test_snapshots_during_activity_are_consistent() {
    let manager = Arc::new(
        StateManager::builder()
            .with_policy(DispatchPolicy::AnyReady)
            .build(),
    );
    let done = Arc::new(AtomicBool::new(false));

    let observers: Vec<_> = (0..3)
        .map(|_| {
            let manager = Arc::clone(&manager);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut taken = 0;
                while !done.load(Ordering::SeqCst) {
                    let snapshot = manager.snapshot().unwrap();
                    snapshot.verify().unwrap();
                    assert!(snapshot.resident() <= 8);
                    taken += 1;
                }
                taken
            })
        })
        .collect();

    let workers: Vec<_> = (1..=8u32)
        .map(|pid| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                let me = participant_of(pid);
                manager.register(me).unwrap();
                manager.admit(me, ProcessRecord::new(pid, ms(2))).unwrap();
                manager.dispatch(me, pid).unwrap();
                thread::sleep(ms(2));
                manager.progress(me, pid, ms(2)).unwrap();
                manager.terminate(me, pid).unwrap();
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    done.store(true, Ordering::SeqCst);
    for observer in observers {
        assert!(observer.join().unwrap() > 0);
    }

    // Observer identities never outlive their snapshot
    assert_eq!(manager.participant_count(), 8);
}

#[test]
fn test_snapshot_reports_live_remaining_time() {
    let manager = StateManager::new();
    manager.register(1).unwrap();
    manager.register(2).unwrap();
    manager.admit(1, ProcessRecord::new(1, ms(50))).unwrap();
    manager
        .admit(2, ProcessRecord::new(2, ms(30)).with_priority(4))
        .unwrap();
    manager.dispatch(1, 1).unwrap();
    manager.progress(1, 1, ms(20)).unwrap();

    let snapshot = manager.snapshot().unwrap();
    assert_eq!(snapshot.running[0].remaining, ms(30));
    assert_eq!(snapshot.running[0].burst, ms(50));
    assert_eq!(snapshot.ready[0].priority, Some(4));
    assert_eq!(snapshot.ready[0].ticket, None);
    assert_eq!(snapshot.transitions, 3);

    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json["running"][0]["remaining_ms"], 30);
    assert_eq!(json["ready"][0]["state"], "ready");
}

#[test]
fn test_errors_name_current_state() {
    let manager = StateManager::new();
    manager.register(1).unwrap();
    manager.register(2).unwrap();
    manager.admit(1, ProcessRecord::new(1, ms(5))).unwrap();

    assert_eq!(
        manager.terminate(1, 1),
        Err(StateError::NotRunning {
            pid: 1,
            state: Some(ProcessState::Ready)
        })
    );
    assert_eq!(
        manager.progress(2, 2, ms(1)),
        Err(StateError::NotRunning {
            pid: 2,
            state: None
        })
    );
    manager.dispatch(1, 1).unwrap();
    assert_eq!(
        manager.dispatch(1, 1),
        Err(StateError::NotReady {
            pid: 1,
            state: Some(ProcessState::Running)
        })
    );
}

#[test]
fn test_strict_fifo_head_error_is_retryable() {
    let manager = StateManager::new();
    for pid in 1..=3 {
        manager.register(pid).unwrap();
        manager
            .admit(pid, ProcessRecord::new(pid as u32, ms(1)))
            .unwrap();
    }

    let err = manager.dispatch(3, 3).unwrap_err();
    assert!(err.is_retryable());
    assert!(!manager.dispatch(3, 9).unwrap_err().is_retryable());

    for pid in 1..=3u32 {
        manager.dispatch(participant_of(pid), pid).unwrap();
    }
    assert_eq!(manager.snapshot().unwrap().running_ids(), vec![1, 2, 3]);
}

#[test]
fn test_reset_mid_lifecycle_allows_readmission() {
    let manager = StateManager::new();
    manager.register(1).unwrap();
    manager.register(2).unwrap();
    manager.admit(1, ProcessRecord::new(1, ms(5))).unwrap();
    manager.admit(2, ProcessRecord::new(2, ms(5))).unwrap();
    manager.dispatch(1, 1).unwrap();

    manager.reset().unwrap();
    assert_eq!(manager.snapshot().unwrap().resident(), 0);
    assert!(!manager.is_registered(1));
    assert_eq!(
        manager.admit(1, ProcessRecord::new(1, ms(5))),
        Err(StateError::Lock(bakery_sim::BakeryError::UnknownParticipant(1)))
    );

    manager.register(1).unwrap();
    manager.admit(1, ProcessRecord::new(1, ms(5))).unwrap();
    assert_eq!(manager.snapshot().unwrap().transitions, 1);
}
