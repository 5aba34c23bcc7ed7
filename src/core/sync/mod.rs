/*!
 * Synchronization Primitives
 *
 * Mutual exclusion without native blocking primitives:
 * - `BakeryLock`: Lamport's Bakery Algorithm over registered participants
 * - `BakeryCell`: value that can only be reached inside a Bakery critical section
 * - `SpinBackoff`: bounded spin with cooperative yield used by every wait loop
 */

mod bakery;
mod cell;
mod spinwait;

pub use bakery::{BakeryLock, BakeryStats, BakeryTicket};
pub use cell::{BakeryCell, BakeryCellGuard};
pub use spinwait::{SpinBackoff, SpinConfig};
