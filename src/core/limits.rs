/*!
 * System Limits and Constants
 *
 * Centralized location for simulator-wide limits, defaults, and magic numbers.
 * Performance-critical constants are marked with [PERF].
 */

use std::time::Duration;

// =============================================================================
// BAKERY LOCK
// =============================================================================

/// Default number of participant slots
/// Every acquire scans all slots, so this bounds the cost of one entry
/// [PERF] Scan is linear in capacity
pub const DEFAULT_MAX_PARTICIPANTS: usize = 64;

/// Participant id that marks a free slot; never registrable
pub const FREE_SLOT: u64 = 0;

/// First identity handed to snapshot observers
/// Kept far above the pid range so observers never collide with processes
pub const OBSERVER_ID_BASE: u64 = 1 << 40;

/// Slots reserved behind the participant slots for observer identities
/// More concurrent observers than this wait for a free reserve slot
pub const DEFAULT_OBSERVER_SLOTS: usize = 8;

// =============================================================================
// SPIN WAIT
// =============================================================================

/// Iterations of tight `spin_loop` before yielding
/// [PERF] Best for waits under ~100ns
pub const DEFAULT_SPIN_LIMIT: u32 = 10;

/// Iterations (cumulative) of `yield_now` before sleeping
pub const DEFAULT_YIELD_LIMIT: u32 = 50;

/// Cap for the exponential sleep phase
pub const DEFAULT_MAX_SLEEP: Duration = Duration::from_micros(200);

// =============================================================================
// SIMULATION
// =============================================================================

/// Processes created by a default run
pub const DEFAULT_PROCESS_COUNT: usize = 3;

/// Per-process bursts of a default run, in milliseconds
pub const DEFAULT_BURSTS_MS: [u64; 3] = [500, 300, 400];

/// Lower bound of the uniform burst range, in milliseconds
pub const DEFAULT_WORK_MIN_MS: u64 = 100;

/// Upper bound of the uniform burst range, in milliseconds
pub const DEFAULT_WORK_MAX_MS: u64 = 500;

/// Work slice between two progress reports, in milliseconds
pub const DEFAULT_QUANTUM_MS: u64 = 100;

/// Priority assigned to every simulated process
pub const DEFAULT_PRIORITY: u8 = 1;
