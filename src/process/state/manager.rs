/*!
 * State Manager
 *
 * Sole mutation path for the shared queues. Every operation enters the Bakery
 * critical section under the caller's participant identity, checks its
 * preconditions, mutates, emits the transition event and leaves. Nothing is
 * modified before all preconditions hold, so a failed operation leaves the
 * queues untouched.
 */

use super::queues::{SharedQueues, Snapshot};
use crate::core::errors::{BakeryError, StateError, StateResult};
use crate::core::limits::{DEFAULT_MAX_PARTICIPANTS, DEFAULT_OBSERVER_SLOTS, OBSERVER_ID_BASE};
use crate::core::sync::{BakeryCell, BakeryLock, BakeryStats, SpinBackoff, SpinConfig};
use crate::core::types::{participant_of, ParticipantId, Pid, Timestamp};
use crate::process::config::{DispatchPolicy, SimulationConfig};
use crate::process::events::{NullSink, TransitionSink};
use crate::process::types::{ProcessRecord, ProcessState, TransitionEvent};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Owner of the ready queue, running set and terminated list
pub struct StateManager {
    shared: BakeryCell<SharedQueues>,
    sink: Arc<dyn TransitionSink>,
    policy: DispatchPolicy,
    spin: SpinConfig,
    epoch: Instant,
    next_observer: AtomicU64,
}

impl StateManager {
    /// Manager with default capacity, strict FIFO dispatch and no event sink
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> StateManagerBuilder {
        StateManagerBuilder::new()
    }

    // ---------------------------------------------------------------------
    // Participants
    // ---------------------------------------------------------------------

    pub fn register(&self, participant: ParticipantId) -> StateResult<()> {
        Ok(self.shared.raw().register(participant)?)
    }

    pub fn unregister(&self, participant: ParticipantId) -> StateResult<()> {
        Ok(self.shared.raw().unregister(participant)?)
    }

    #[inline]
    pub fn is_registered(&self, participant: ParticipantId) -> bool {
        self.shared.raw().is_registered(participant)
    }

    #[inline]
    pub fn participant_count(&self) -> usize {
        self.shared.raw().len()
    }

    /// Registered participants, excluding temporary observers
    pub fn process_participant_count(&self) -> usize {
        self.shared
            .raw()
            .participants()
            .into_iter()
            .filter(|id| *id < OBSERVER_ID_BASE)
            .count()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.shared.raw().capacity()
    }

    #[inline]
    pub fn lock_stats(&self) -> BakeryStats {
        self.shared.raw().stats()
    }

    #[inline]
    pub fn policy(&self) -> DispatchPolicy {
        self.policy
    }

    // ---------------------------------------------------------------------
    // Transitions
    // ---------------------------------------------------------------------

    /// NEW -> READY: append to the ready queue
    pub fn admit(&self, participant: ParticipantId, record: ProcessRecord) -> StateResult<()> {
        let mut queues = self.shared.lock(participant)?;
        let pid = record.pid();
        if record.state() != ProcessState::New {
            return Err(StateError::NotNew {
                pid,
                state: record.state(),
            });
        }
        if queues.contains(pid) {
            return Err(StateError::DuplicateProcess(pid));
        }

        let mut record = record;
        record.set_state(ProcessState::Ready);
        queues.ready.push_back(record);
        self.emit(&mut queues, pid, ProcessState::New, ProcessState::Ready);
        Ok(())
    }

    /// READY -> RUNNING: move from the ready queue to the running set
    pub fn dispatch(&self, participant: ParticipantId, pid: Pid) -> StateResult<()> {
        let mut queues = self.shared.lock(participant)?;
        let position = queues
            .ready
            .iter()
            .position(|record| record.pid() == pid)
            .ok_or_else(|| StateError::NotReady {
                pid,
                state: queues.state_of(pid),
            })?;

        if self.policy == DispatchPolicy::StrictFifo && position != 0 {
            let head = queues.head().unwrap_or(pid);
            return Err(StateError::NotAtHead { pid, head });
        }

        let Some(mut record) = queues.ready.remove(position) else {
            return Err(StateError::NotReady { pid, state: None });
        };
        record.set_state(ProcessState::Running);
        queues.running.insert(pid, record);
        self.emit(&mut queues, pid, ProcessState::Ready, ProcessState::Running);
        Ok(())
    }

    /// Account `elapsed` work of a running process; returns the remaining work
    pub fn progress(
        &self,
        participant: ParticipantId,
        pid: Pid,
        elapsed: Duration,
    ) -> StateResult<Duration> {
        let mut queues = self.shared.lock(participant)?;
        if let Some(record) = queues.running.get_mut(&pid) {
            return Ok(record.consume(elapsed));
        }
        Err(StateError::NotRunning {
            pid,
            state: queues.state_of(pid),
        })
    }

    /// RUNNING -> TERMINATED: move from the running set to the terminated list
    pub fn terminate(&self, participant: ParticipantId, pid: Pid) -> StateResult<()> {
        let mut queues = self.shared.lock(participant)?;
        let Some(mut record) = queues.running.remove(&pid) else {
            return Err(StateError::NotRunning {
                pid,
                state: queues.state_of(pid),
            });
        };
        record.set_state(ProcessState::Terminated);
        queues.terminated.push(record);
        self.emit(
            &mut queues,
            pid,
            ProcessState::Running,
            ProcessState::Terminated,
        );
        Ok(())
    }

    fn emit(&self, queues: &mut SharedQueues, pid: Pid, from: ProcessState, to: ProcessState) {
        let event = TransitionEvent {
            seq: queues.next_seq(),
            pid,
            from,
            to,
            timestamp_ns: self.now(),
        };
        self.sink.on_transition(&event);
    }

    #[inline]
    fn now(&self) -> Timestamp {
        self.epoch.elapsed().as_nanos() as Timestamp
    }

    // ---------------------------------------------------------------------
    // Observation and reset
    // ---------------------------------------------------------------------

    /// Copy of every collection, taken under a temporary observer identity
    ///
    /// Safe to call from any thread while a run is in progress. Observers
    /// use the lock's reserve slots; when all of them are taken the call
    /// waits for one to free up.
    pub fn snapshot(&self) -> StateResult<Snapshot> {
        let observer = self.register_observer()?;
        let snapshot = self.snapshot_as(observer);
        let unregistered = self.unregister(observer);
        let snapshot = snapshot?;
        unregistered?;
        Ok(snapshot)
    }

    /// Copy of every collection, taken as an already registered participant
    pub fn snapshot_as(&self, participant: ParticipantId) -> StateResult<Snapshot> {
        let queues = self.shared.lock(participant)?;
        let lock = queues.lock();
        let view = |record: &ProcessRecord| {
            let ticket = lock
                .ticket(participant_of(record.pid()))
                .ok()
                .filter(|ticket| *ticket != 0);
            record.view(ticket)
        };

        Ok(Snapshot {
            ready: queues.ready().map(view).collect(),
            running: queues.running().map(view).collect(),
            terminated: queues.terminated().map(view).collect(),
            transitions: queues.transitions(),
            lock: lock.stats(),
            taken_at_ns: self.now(),
        })
    }

    /// Clear all collections and every lock registration
    ///
    /// Only valid between runs. Fails without changing anything while a
    /// participant is inside or waiting. A participant that starts waiting
    /// after the queues were cleared makes the final registration reset
    /// fail; the queues then stay empty and the registrations stay in place.
    pub fn reset(&self) -> StateResult<()> {
        let lock = self.shared.raw();
        if let Some(busy) = lock.busy_participant(None) {
            return Err(BakeryError::ParticipantBusy(busy).into());
        }

        let observer = self.register_observer()?;
        let cleared = self.clear_as(observer);
        let unregistered = self.unregister(observer);
        let cleared = cleared?;
        unregistered?;

        lock.reset()?;
        info!(cleared, "state manager reset");
        Ok(())
    }

    /// Empty the queues from inside the critical section, unless another
    /// participant is choosing or waiting
    fn clear_as(&self, observer: ParticipantId) -> StateResult<usize> {
        let mut queues = self.shared.lock(observer)?;
        if let Some(busy) = queues.lock().busy_participant(Some(observer)) {
            return Err(BakeryError::ParticipantBusy(busy).into());
        }
        let cleared = queues.resident();
        queues.clear();
        Ok(cleared)
    }

    /// Register a fresh observer identity, waiting while the reserve is full
    fn register_observer(&self) -> StateResult<ParticipantId> {
        let observer = self.observer_id();
        let mut backoff = SpinBackoff::new(self.spin);
        loop {
            match self.register(observer) {
                Ok(()) => return Ok(observer),
                Err(StateError::Lock(BakeryError::CapacityExhausted { .. })) => {
                    backoff.snooze()
                }
                Err(err) => return Err(err),
            }
        }
    }

    #[inline]
    fn observer_id(&self) -> ParticipantId {
        OBSERVER_ID_BASE + self.next_observer.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for StateManager
pub struct StateManagerBuilder {
    capacity: usize,
    observer_slots: usize,
    spin: SpinConfig,
    policy: DispatchPolicy,
    sink: Arc<dyn TransitionSink>,
}

impl StateManagerBuilder {
    pub fn new() -> Self {
        Self {
            capacity: DEFAULT_MAX_PARTICIPANTS,
            observer_slots: DEFAULT_OBSERVER_SLOTS,
            spin: SpinConfig::default(),
            policy: DispatchPolicy::default(),
            sink: Arc::new(NullSink),
        }
    }

    /// Builder sized and tuned for a simulation configuration
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self::new()
            .with_capacity(config.max_participants)
            .with_spin(config.spin)
            .with_policy(config.dispatch_policy)
    }

    /// Number of Bakery participant slots
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Reserve slots for snapshot and reset observers (at least one)
    pub fn with_observer_slots(mut self, slots: usize) -> Self {
        self.observer_slots = slots.max(1);
        self
    }

    pub fn with_spin(mut self, spin: SpinConfig) -> Self {
        self.spin = spin;
        self
    }

    pub fn with_policy(mut self, policy: DispatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Observer of every transition
    pub fn with_sink(mut self, sink: Arc<dyn TransitionSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn build(self) -> StateManager {
        debug!(
            capacity = self.capacity,
            observer_slots = self.observer_slots,
            policy = self.policy.as_str(),
            "state manager initialized"
        );
        StateManager {
            shared: BakeryCell::new(
                BakeryLock::with_layout(self.capacity, self.observer_slots, self.spin),
                SharedQueues::new(),
            ),
            sink: self.sink,
            policy: self.policy,
            spin: self.spin,
            epoch: Instant::now(),
            next_observer: AtomicU64::new(0),
        }
    }
}

impl Default for StateManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
