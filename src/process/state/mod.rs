/*!
 * Process State Management
 * Shared queues and the Bakery-serialized transitions between them
 */

mod manager;
mod queues;

pub use manager::{StateManager, StateManagerBuilder};
pub use queues::{InvariantViolation, SharedQueues, Snapshot};
