/*!
 * Scheduler
 *
 * Orchestrates a simulation run: one named OS thread per simulated process,
 * each driving its record NEW -> READY -> RUNNING -> TERMINATED through the
 * state manager. Units spin inside the Bakery protocol, so they need real
 * threads rather than tasks on a cooperative executor.
 */

use super::config::{validate_process_count, SimulationConfig, WorkProfile};
use super::state::{Snapshot, StateManager, StateManagerBuilder};
use super::types::ProcessRecord;
use crate::core::errors::{SimulationError, SimulationResult, UnitError};
use crate::core::limits::DEFAULT_PRIORITY;
use crate::core::serde::{duration_millis, is_empty_vec};
use crate::core::sync::{SpinBackoff, SpinConfig};
use crate::core::types::{participant_of, ParticipantId, Pid};
use crate::monitoring::generate_run_id;
use crate::process::events::TransitionSink;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, debug_span, error, info, info_span, warn, Span};
use uuid::Uuid;

/// Failure of one execution unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitFailure {
    pub pid: Pid,
    pub error: UnitError,
}

/// Outcome of a simulation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    pub run_id: Uuid,
    pub process_count: usize,
    /// Terminated pids in termination order
    pub terminated: Vec<Pid>,
    #[serde(skip_serializing_if = "is_empty_vec", default)]
    pub failures: Vec<UnitFailure>,
    #[serde(rename = "elapsed_ms", with = "duration_millis")]
    pub elapsed: Duration,
    /// State at the end of the run
    pub snapshot: Snapshot,
}

impl SimulationReport {
    /// Every process terminated and no unit failed
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.terminated.len() == self.process_count
    }
}

/// Simulation driver
pub struct Scheduler {
    manager: Arc<StateManager>,
    config: SimulationConfig,
    in_progress: AtomicBool,
}

impl Scheduler {
    pub fn new(manager: Arc<StateManager>, config: SimulationConfig) -> Self {
        Self {
            manager,
            config,
            in_progress: AtomicBool::new(false),
        }
    }

    /// Validate `config` and build a matching state manager around `sink`
    pub fn from_config(
        config: SimulationConfig,
        sink: Arc<dyn TransitionSink>,
    ) -> SimulationResult<Self> {
        config.validate()?;
        let manager = StateManagerBuilder::from_config(&config)
            .with_sink(sink)
            .build();
        Ok(Self::new(Arc::new(manager), config))
    }

    #[inline]
    pub fn manager(&self) -> &Arc<StateManager> {
        &self.manager
    }

    #[inline]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    /// Run with the configured process count and work profile
    pub fn run(&self) -> SimulationResult<SimulationReport> {
        self.run_simulation(self.config.process_count, &self.config.work)
    }

    /// Simulate `count` processes, blocking until every unit has been joined
    pub fn run_simulation(
        &self,
        count: usize,
        work: &WorkProfile,
    ) -> SimulationResult<SimulationReport> {
        validate_process_count(count, self.manager.capacity())?;
        work.validate()?;

        if self.in_progress.swap(true, Ordering::SeqCst) {
            return Err(SimulationError::RunInProgress);
        }
        let _in_progress = InProgress(&self.in_progress);

        let before = self.manager.snapshot()?;
        let participants = self.manager.process_participant_count();
        if before.resident() > 0 || participants > 0 {
            return Err(SimulationError::NotReset {
                resident: before.resident(),
                participants,
            });
        }

        let run_id = generate_run_id();
        let span = info_span!("simulation", run_id = %run_id, processes = count);
        let _entered = span.enter();
        let started = Instant::now();
        info!(policy = self.manager.policy().as_str(), "simulation starting");

        // Every record is READY, in pid order, before any unit starts
        let bursts = work.bursts(count);
        let mut units = Vec::with_capacity(count);
        let abort = Arc::new(AtomicBool::new(false));
        for (pid, burst) in (1..).zip(bursts) {
            let participant = participant_of(pid);
            self.manager.register(participant)?;
            let record = ProcessRecord::new(pid, burst).with_priority(DEFAULT_PRIORITY);
            self.manager.admit(participant, record)?;
            units.push(Unit {
                pid,
                participant,
                burst,
                quantum: work.quantum(),
                spin: self.config.spin,
                debug: self.config.debug,
                manager: Arc::clone(&self.manager),
                abort: Arc::clone(&abort),
                parent: span.clone(),
            });
        }

        let mut handles = Vec::with_capacity(count);
        let mut spawn_error = None;
        for unit in units {
            let pid = unit.pid;
            match thread::Builder::new()
                .name(format!("pcb-{}", pid))
                .spawn(move || unit.run())
            {
                Ok(handle) => handles.push((pid, handle)),
                Err(source) => {
                    error!(pid, error = %source, "failed to launch execution unit");
                    abort.store(true, Ordering::SeqCst);
                    spawn_error = Some(SimulationError::Spawn { pid, source });
                    break;
                }
            }
        }

        let mut failures = Vec::new();
        for (pid, handle) in handles {
            let outcome = match handle.join() {
                Ok(outcome) => outcome,
                Err(panic) => Err(UnitError::Panicked(panic_message(panic.as_ref()))),
            };
            if let Err(error) = outcome {
                warn!(pid, error = %error, "execution unit did not complete");
                failures.push(UnitFailure { pid, error });
            }
        }
        if let Some(err) = spawn_error {
            return Err(err);
        }

        let snapshot = self.manager.snapshot()?;
        let report = SimulationReport {
            run_id,
            process_count: count,
            terminated: snapshot.terminated_ids(),
            failures,
            elapsed: started.elapsed(),
            snapshot,
        };
        info!(
            terminated = report.terminated.len(),
            failures = report.failures.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "all processes finished"
        );
        Ok(report)
    }

    /// Clear the state manager for the next run
    pub fn reset(&self) -> SimulationResult<()> {
        if self.is_running() {
            return Err(SimulationError::RunInProgress);
        }
        self.manager.reset()?;
        Ok(())
    }
}

/// Clears the in-progress flag on every exit path of a run
struct InProgress<'a>(&'a AtomicBool);

impl Drop for InProgress<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// One simulated process's execution unit
struct Unit {
    pid: Pid,
    participant: ParticipantId,
    burst: Duration,
    quantum: Duration,
    spin: SpinConfig,
    debug: bool,
    manager: Arc<StateManager>,
    abort: Arc<AtomicBool>,
    parent: Span,
}

impl Unit {
    fn run(self) -> Result<(), UnitError> {
        let span = debug_span!(parent: &self.parent, "unit", pid = self.pid);
        let _entered = span.enter();

        self.await_dispatch()?;
        if self.debug {
            debug!(
                pid = self.pid,
                thread = thread::current().name().unwrap_or("unnamed"),
                "process executing"
            );
        }

        let mut remaining = self.burst;
        while !remaining.is_zero() {
            let slice = remaining.min(self.quantum);
            thread::sleep(slice);
            remaining = self.manager.progress(self.participant, self.pid, slice)?;
        }

        self.manager.terminate(self.participant, self.pid)?;
        if self.debug {
            debug!(pid = self.pid, "process finished execution");
        }
        Ok(())
    }

    /// Dispatch, waiting for this unit's turn under strict FIFO
    fn await_dispatch(&self) -> Result<(), UnitError> {
        let mut backoff = SpinBackoff::new(self.spin);
        loop {
            if self.abort.load(Ordering::SeqCst) {
                return Err(UnitError::Aborted);
            }
            match self.manager.dispatch(self.participant, self.pid) {
                Ok(()) => return Ok(()),
                Err(err) if err.is_retryable() => backoff.snooze(),
                Err(err) => return Err(err.into()),
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::events::{ChannelSink, NullSink};
    use crate::process::types::ProcessState;

    fn short_work() -> WorkProfile {
        WorkProfile::fixed(vec![20, 10, 15]).with_quantum(5)
    }

    fn scheduler() -> Scheduler {
        Scheduler::from_config(SimulationConfig::default(), Arc::new(NullSink)).unwrap()
    }

    #[test]
    fn test_three_processes_terminate() {
        let scheduler = scheduler();
        let report = scheduler.run_simulation(3, &short_work()).unwrap();

        let mut terminated = report.terminated.clone();
        terminated.sort_unstable();
        assert_eq!(terminated, vec![1, 2, 3]);
        assert!(report.is_complete());
        assert!(report.snapshot.ready.is_empty());
        assert!(report.snapshot.running.is_empty());
        assert!(report.snapshot.is_consistent());
        assert!(!scheduler.is_running());
    }

    #[test]
    fn test_rerun_requires_reset() {
        let scheduler = scheduler();
        scheduler.run_simulation(2, &short_work()).unwrap();
        assert!(matches!(
            scheduler.run_simulation(2, &short_work()),
            Err(SimulationError::NotReset { resident: 2, .. })
        ));

        scheduler.reset().unwrap();
        let report = scheduler.run_simulation(2, &short_work()).unwrap();
        assert!(report.is_complete());
    }

    #[test]
    fn test_zero_processes_rejected() {
        assert!(matches!(
            scheduler().run_simulation(0, &short_work()),
            Err(SimulationError::Config(_))
        ));
    }

    #[test]
    fn test_strict_fifo_dispatch_follows_admission() {
        let (sink, rx) = ChannelSink::channel();
        let scheduler = Scheduler::from_config(SimulationConfig::default(), Arc::new(sink)).unwrap();
        scheduler
            .run_simulation(4, &WorkProfile::fixed(vec![5]).with_quantum(5))
            .unwrap();

        let dispatched: Vec<_> = rx
            .try_iter()
            .filter(|e| e.to == ProcessState::Running)
            .map(|e| e.pid)
            .collect();
        assert_eq!(dispatched, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_zero_burst_terminates_immediately() {
        let report = scheduler()
            .run_simulation(2, &WorkProfile::fixed(vec![0]))
            .unwrap();
        assert!(report.is_complete());
        assert!(report
            .snapshot
            .terminated
            .iter()
            .all(|view| view.remaining.is_zero()));
    }

    #[test]
    fn test_panic_message_extraction() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
        let boxed: Box<dyn Any + Send> = Box::new(5u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic payload");
    }
}
