/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use super::types::{ParticipantId, Pid};
use crate::process::types::ProcessState;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bakery lock misuse errors
///
/// These are programming errors: correct scheduler usage never produces them.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum BakeryError {
    #[error("Participant {0} is already registered")]
    #[diagnostic(
        code(bakery::duplicate_participant),
        help("Each participant identity may be registered once per run.")
    )]
    DuplicateParticipant(ParticipantId),

    #[error("Participant {0} is not registered")]
    #[diagnostic(
        code(bakery::unknown_participant),
        help("Register the participant before acquiring or releasing.")
    )]
    UnknownParticipant(ParticipantId),

    #[error("Participant id {0} is reserved")]
    #[diagnostic(
        code(bakery::reserved_participant),
        help("Id 0 marks a free slot. Use positive identities.")
    )]
    ReservedParticipant(ParticipantId),

    #[error("All {capacity} participant slots are in use")]
    #[diagnostic(
        code(bakery::capacity_exhausted),
        help("Raise max_participants or unregister idle participants.")
    )]
    CapacityExhausted { capacity: usize },

    #[error("Participant {0} is choosing or holds a ticket")]
    #[diagnostic(
        code(bakery::participant_busy),
        help("Wait until every critical section has been released.")
    )]
    ParticipantBusy(ParticipantId),

    #[error("Participant {0} already holds or is acquiring the lock")]
    #[diagnostic(
        code(bakery::already_held),
        help("A participant identity must not be used by two callers at once.")
    )]
    AlreadyHeld(ParticipantId),
}

pub type BakeryResult<T> = Result<T, BakeryError>;

/// State transition errors
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum StateError {
    #[error("Process {pid} is not ready (state: {state:?})")]
    #[diagnostic(
        code(state::not_ready),
        help("Only admitted processes waiting in the ready queue can be dispatched.")
    )]
    NotReady {
        pid: Pid,
        state: Option<ProcessState>,
    },

    #[error("Process {pid} is not running (state: {state:?})")]
    #[diagnostic(
        code(state::not_running),
        help("Only dispatched processes can make progress or terminate.")
    )]
    NotRunning {
        pid: Pid,
        state: Option<ProcessState>,
    },

    #[error("Process {pid} is not at the head of the ready queue (head: {head})")]
    #[diagnostic(
        code(state::not_at_head),
        help("Strict FIFO dispatch serves the queue head first. Retry later.")
    )]
    NotAtHead { pid: Pid, head: Pid },

    #[error("Process {pid} cannot be admitted from state {state:?}")]
    #[diagnostic(code(state::not_new), help("Only NEW processes can be admitted."))]
    NotNew { pid: Pid, state: ProcessState },

    #[error("Process {0} is already resident")]
    #[diagnostic(
        code(state::duplicate_process),
        help("Reset the state manager before reusing process ids.")
    )]
    DuplicateProcess(Pid),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Lock(#[from] BakeryError),
}

impl StateError {
    /// Whether the error only means "not your turn yet"
    #[inline]
    pub fn is_retryable(&self) -> bool {
        matches!(self, StateError::NotAtHead { .. })
    }
}

pub type StateResult<T> = Result<T, StateError>;

/// Configuration errors
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    #[diagnostic(code(config::invalid))]
    Invalid(String),

    #[error("Invalid value for {var}: {reason}")]
    #[diagnostic(
        code(config::env),
        help("Check the BAKERY_SIM_* environment variables.")
    )]
    Env { var: String, reason: String },

    #[error("Failed to parse configuration: {0}")]
    #[diagnostic(code(config::parse), help("Configuration files are JSON."))]
    Parse(String),

    #[error("Failed to read configuration file {path}: {reason}")]
    #[diagnostic(code(config::io))]
    Io { path: String, reason: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Failure of a single execution unit
///
/// Recorded in the simulation report; other units are unaffected.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum UnitError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    State(#[from] StateError),

    #[error("Execution unit panicked: {0}")]
    #[diagnostic(code(unit::panicked))]
    Panicked(String),

    #[error("Execution unit aborted before dispatch")]
    #[diagnostic(
        code(unit::aborted),
        help("Another unit could not be launched, so the run was abandoned.")
    )]
    Aborted,
}

/// Simulation-level errors
#[derive(Error, Debug, Diagnostic)]
pub enum SimulationError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error("State manager still holds {resident} records and {participants} participants")]
    #[diagnostic(
        code(simulation::not_reset),
        help("Call reset() between simulation runs.")
    )]
    NotReset { resident: usize, participants: usize },

    #[error("A simulation run is in progress")]
    #[diagnostic(
        code(simulation::run_in_progress),
        help("Reset is only permitted once every execution unit has been joined.")
    )]
    RunInProgress,

    #[error(transparent)]
    #[diagnostic(transparent)]
    State(#[from] StateError),

    #[error("Failed to launch execution unit for process {pid}: {source}")]
    #[diagnostic(code(simulation::spawn))]
    Spawn {
        pid: Pid,
        #[source]
        source: std::io::Error,
    },
}

impl From<BakeryError> for SimulationError {
    fn from(err: BakeryError) -> Self {
        SimulationError::State(StateError::Lock(err))
    }
}

pub type SimulationResult<T> = Result<T, SimulationError>;
