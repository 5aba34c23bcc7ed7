/*!
 * Process Types
 * Process control block, lifecycle states and transition events
 */

use crate::core::serde::{duration_millis, is_none};
use crate::core::types::{Pid, Priority, Ticket, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Process state
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    /// Created, not yet admitted
    New,
    /// Waiting in the ready queue
    Ready,
    /// Dispatched and doing work
    Running,
    /// Finished; terminal
    Terminated,
}

impl ProcessState {
    /// The only state this one may move to
    #[inline]
    pub const fn successor(self) -> Option<ProcessState> {
        match self {
            Self::New => Some(Self::Ready),
            Self::Ready => Some(Self::Running),
            Self::Running => Some(Self::Terminated),
            Self::Terminated => None,
        }
    }

    #[inline]
    pub fn can_transition_to(self, to: ProcessState) -> bool {
        self.successor() == Some(to)
    }

    #[inline(always)]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Ready => "READY",
            Self::Running => "RUNNING",
            Self::Terminated => "TERMINATED",
        }
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process control block
///
/// Only the state manager moves a record through its states, so the state
/// setter is crate-private.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRecord {
    pid: Pid,
    state: ProcessState,
    burst: Duration,
    remaining: Duration,
    priority: Option<Priority>,
}

impl ProcessRecord {
    /// Create a NEW record
    pub fn new(pid: Pid, burst: Duration) -> Self {
        Self {
            pid,
            state: ProcessState::New,
            burst,
            remaining: burst,
            priority: None,
        }
    }

    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    #[inline]
    pub fn pid(&self) -> Pid {
        self.pid
    }

    #[inline]
    pub fn state(&self) -> ProcessState {
        self.state
    }

    #[inline]
    pub fn burst(&self) -> Duration {
        self.burst
    }

    #[inline]
    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    #[inline]
    pub fn priority(&self) -> Option<Priority> {
        self.priority
    }

    #[inline]
    pub(crate) fn set_state(&mut self, state: ProcessState) {
        debug_assert!(self.state.can_transition_to(state));
        self.state = state;
    }

    /// Account finished work; returns what is left
    #[inline]
    pub(crate) fn consume(&mut self, elapsed: Duration) -> Duration {
        self.remaining = self.remaining.saturating_sub(elapsed);
        self.remaining
    }

    /// Reporting view; `ticket` is read from the lock by the caller
    pub fn view(&self, ticket: Option<Ticket>) -> RecordView {
        RecordView {
            pid: self.pid,
            state: self.state,
            burst: self.burst,
            remaining: self.remaining,
            priority: self.priority,
            ticket,
        }
    }
}

/// Serializable copy of a record for status display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordView {
    pub pid: Pid,
    pub state: ProcessState,
    #[serde(rename = "burst_ms", with = "duration_millis")]
    pub burst: Duration,
    #[serde(rename = "remaining_ms", with = "duration_millis")]
    pub remaining: Duration,
    #[serde(skip_serializing_if = "is_none", default)]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "is_none", default)]
    pub ticket: Option<Ticket>,
}

/// One state transition, emitted inside the critical section that made it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionEvent {
    /// Position in the total order of transitions (starts at 1 per run)
    pub seq: u64,
    pub pid: Pid,
    pub from: ProcessState,
    pub to: ProcessState,
    /// Nanoseconds since the state manager was created
    pub timestamp_ns: Timestamp,
}

impl fmt::Display for TransitionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[PCB] {}: {} -> {}", self.pid, self.from, self.to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_only() {
        assert!(ProcessState::New.can_transition_to(ProcessState::Ready));
        assert!(ProcessState::Ready.can_transition_to(ProcessState::Running));
        assert!(ProcessState::Running.can_transition_to(ProcessState::Terminated));
        assert!(!ProcessState::New.can_transition_to(ProcessState::Running));
        assert!(!ProcessState::Running.can_transition_to(ProcessState::Ready));
        assert_eq!(ProcessState::Terminated.successor(), None);
    }

    #[test]
    fn test_new_record() {
        let record = ProcessRecord::new(4, Duration::from_millis(300)).with_priority(2);
        assert_eq!(record.state(), ProcessState::New);
        assert_eq!(record.remaining(), record.burst());
        assert_eq!(record.priority(), Some(2));
    }

    #[test]
    fn test_consume_saturates() {
        let mut record = ProcessRecord::new(1, Duration::from_millis(150));
        assert_eq!(record.consume(Duration::from_millis(100)), Duration::from_millis(50));
        assert_eq!(record.consume(Duration::from_millis(100)), Duration::ZERO);
    }

    #[test]
    fn test_view_serialization() {
        let view = ProcessRecord::new(2, Duration::from_millis(400)).view(None);
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["pid"], 2);
        assert_eq!(json["state"], "new");
        assert_eq!(json["burst_ms"], 400);
        assert!(json.get("ticket").is_none());
    }

    #[test]
    fn test_event_display() {
        let event = TransitionEvent {
            seq: 1,
            pid: 3,
            from: ProcessState::Ready,
            to: ProcessState::Running,
            timestamp_ns: 0,
        };
        assert_eq!(event.to_string(), "[PCB] 3: READY -> RUNNING");
    }
}
