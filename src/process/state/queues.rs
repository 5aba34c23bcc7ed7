/*!
 * Shared Queues
 * The collections a process moves through, and point-in-time copies of them
 */

use crate::core::sync::BakeryStats;
use crate::core::types::{Pid, Timestamp};
use crate::process::types::{ProcessRecord, ProcessState, RecordView};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use thiserror::Error;

/// Queue invariant violation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("queue invariant violated: {0}")]
pub struct InvariantViolation(pub String);

/// Collections owned by the state manager
///
/// Records are moved by value between collections, so a record can only ever
/// be resident in one of them.
#[derive(Debug, Default)]
pub struct SharedQueues {
    pub(super) ready: VecDeque<ProcessRecord>,
    pub(super) running: BTreeMap<Pid, ProcessRecord>,
    pub(super) terminated: Vec<ProcessRecord>,
    last_seq: u64,
}

impl SharedQueues {
    pub fn new() -> Self {
        Self::default()
    }

    /// State of a resident record
    pub fn state_of(&self, pid: Pid) -> Option<ProcessState> {
        if self.running.contains_key(&pid) {
            return Some(ProcessState::Running);
        }
        self.ready
            .iter()
            .chain(self.terminated.iter())
            .find(|record| record.pid() == pid)
            .map(ProcessRecord::state)
    }

    #[inline]
    pub fn contains(&self, pid: Pid) -> bool {
        self.state_of(pid).is_some()
    }

    /// Number of records across all collections
    #[inline]
    pub fn resident(&self) -> usize {
        self.ready.len() + self.running.len() + self.terminated.len()
    }

    #[inline]
    pub fn head(&self) -> Option<Pid> {
        self.ready.front().map(ProcessRecord::pid)
    }

    pub fn ready(&self) -> impl Iterator<Item = &ProcessRecord> {
        self.ready.iter()
    }

    pub fn running(&self) -> impl Iterator<Item = &ProcessRecord> {
        self.running.values()
    }

    pub fn terminated(&self) -> impl Iterator<Item = &ProcessRecord> {
        self.terminated.iter()
    }

    /// Sequence number for the next transition event
    #[inline]
    pub(super) fn next_seq(&mut self) -> u64 {
        self.last_seq += 1;
        self.last_seq
    }

    #[inline]
    pub fn transitions(&self) -> u64 {
        self.last_seq
    }

    pub(super) fn clear(&mut self) {
        *self = Self::default();
    }

    /// Check disjointness and per-collection state agreement
    pub fn verify(&self) -> Result<(), InvariantViolation> {
        check_collections(
            self.ready.iter().map(|r| (r.pid(), r.state())),
            self.running.values().map(|r| (r.pid(), r.state())),
            self.terminated.iter().map(|r| (r.pid(), r.state())),
        )
    }
}

fn check_collections(
    ready: impl Iterator<Item = (Pid, ProcessState)>,
    running: impl Iterator<Item = (Pid, ProcessState)>,
    terminated: impl Iterator<Item = (Pid, ProcessState)>,
) -> Result<(), InvariantViolation> {
    let mut seen = BTreeSet::new();
    let collections = [
        ("ready", ProcessState::Ready, ready.collect::<Vec<_>>()),
        ("running", ProcessState::Running, running.collect()),
        ("terminated", ProcessState::Terminated, terminated.collect()),
    ];
    for (name, expected, members) in collections {
        for (pid, state) in members {
            if state != expected {
                return Err(InvariantViolation(format!(
                    "process {} is {} in the {} collection",
                    pid, state, name
                )));
            }
            if !seen.insert(pid) {
                return Err(InvariantViolation(format!(
                    "process {} is resident more than once",
                    pid
                )));
            }
        }
    }
    Ok(())
}

/// Point-in-time copy of the shared queues for status display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub ready: Vec<RecordView>,
    pub running: Vec<RecordView>,
    pub terminated: Vec<RecordView>,
    /// Transitions made since the last reset
    pub transitions: u64,
    pub lock: BakeryStats,
    pub taken_at_ns: Timestamp,
}

impl Snapshot {
    #[inline]
    pub fn resident(&self) -> usize {
        self.ready.len() + self.running.len() + self.terminated.len()
    }

    pub fn ready_ids(&self) -> Vec<Pid> {
        self.ready.iter().map(|v| v.pid).collect()
    }

    pub fn running_ids(&self) -> Vec<Pid> {
        self.running.iter().map(|v| v.pid).collect()
    }

    /// Terminated pids in termination order
    pub fn terminated_ids(&self) -> Vec<Pid> {
        self.terminated.iter().map(|v| v.pid).collect()
    }

    pub fn verify(&self) -> Result<(), InvariantViolation> {
        check_collections(
            self.ready.iter().map(|v| (v.pid, v.state)),
            self.running.iter().map(|v| (v.pid, v.state)),
            self.terminated.iter().map(|v| (v.pid, v.state)),
        )
    }

    #[inline]
    pub fn is_consistent(&self) -> bool {
        self.verify().is_ok()
    }
}
