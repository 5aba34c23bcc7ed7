/*!
 * Bakery Process Simulator Library
 * Process lifecycle simulation guarded by Lamport's Bakery Algorithm
 */

pub mod core;
pub mod monitoring;
pub mod process;

// Re-exports
pub use crate::core::errors::{
    BakeryError, BakeryResult, ConfigError, ConfigResult, SimulationError, SimulationResult,
    StateError, StateResult, UnitError,
};
pub use crate::core::sync::{
    BakeryCell, BakeryCellGuard, BakeryLock, BakeryStats, BakeryTicket, SpinBackoff, SpinConfig,
};
pub use crate::core::types::{participant_of, ParticipantId, Pid, Priority, Ticket, Timestamp};
pub use monitoring::{generate_run_id, init_tracing};
pub use process::{
    ChannelSink, DispatchPolicy, FanoutSink, NullSink, ProcessRecord, ProcessState, RecordView,
    Scheduler, SimulationConfig, SimulationReport, Snapshot, StateManager, StateManagerBuilder,
    TracingSink, TransitionEvent, TransitionSink, UnitFailure, WorkProfile,
};
