/*!
 * Process Module
 * Process records, the state manager and the thread-per-process scheduler
 */

pub mod config;
pub mod events;
pub mod scheduler;
pub mod state;
pub mod types;

// Re-export for convenience
pub use config::{DispatchPolicy, SimulationConfig, WorkProfile};
pub use events::{ChannelSink, FanoutSink, NullSink, TracingSink, TransitionSink};
pub use scheduler::{Scheduler, SimulationReport, UnitFailure};
pub use state::{InvariantViolation, SharedQueues, Snapshot, StateManager, StateManagerBuilder};
pub use types::{ProcessRecord, ProcessState, RecordView, TransitionEvent};
