/*!
 * Core Types
 * Common types used across the simulator
 */

/// Simulated process ID type
pub type Pid = u32;

/// Bakery participant identity
///
/// Processes register under their pid widened to this type; snapshot
/// observers draw identities from a range above any pid.
pub type ParticipantId = u64;

/// Bakery ticket number (0 means "not waiting")
pub type Ticket = u64;

/// Informational priority hint (higher is more important)
pub type Priority = u8;

/// Nanoseconds since the owning manager was created
pub type Timestamp = u64;

/// Participant identity of a simulated process
#[inline(always)]
pub const fn participant_of(pid: Pid) -> ParticipantId {
    pid as ParticipantId
}
