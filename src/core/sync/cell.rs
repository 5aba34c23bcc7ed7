/*!
 * Bakery-Protected Cell
 *
 * Owns a value and only exposes it inside a Bakery critical section. The
 * guard releases the participant's ticket on drop, so every exit path out of
 * the critical section (return, `?`, panic unwind) releases it.
 */

use super::bakery::{BakeryLock, BakeryTicket};
use crate::core::errors::BakeryResult;
use crate::core::types::{ParticipantId, Ticket};
use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};

/// Value guarded by a [`BakeryLock`]
pub struct BakeryCell<T> {
    lock: BakeryLock,
    value: UnsafeCell<T>,
}

// SAFETY: access to `value` only happens through `BakeryCellGuard`, which
// exists only while its participant is inside the Bakery critical section.
// Mutual exclusion of the protocol makes that access exclusive.
unsafe impl<T: Send> Sync for BakeryCell<T> {}

impl<T> BakeryCell<T> {
    pub fn new(lock: BakeryLock, value: T) -> Self {
        Self {
            lock,
            value: UnsafeCell::new(value),
        }
    }

    /// Enter the critical section as `participant`
    pub fn lock(&self, participant: ParticipantId) -> BakeryResult<BakeryCellGuard<'_, T>> {
        let ticket = self.lock.lock(participant)?;
        Ok(BakeryCellGuard { cell: self, ticket })
    }

    /// The underlying lock, for registration and inspection
    #[inline]
    pub fn raw(&self) -> &BakeryLock {
        &self.lock
    }

    /// Exclusive access without the protocol; `&mut self` proves no guard exists
    #[inline]
    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }

    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

impl<T: Default> Default for BakeryCell<T> {
    fn default() -> Self {
        Self::new(BakeryLock::default(), T::default())
    }
}

/// Access to a [`BakeryCell`] value inside the critical section
#[must_use = "the critical section ends as soon as the guard is dropped"]
pub struct BakeryCellGuard<'a, T> {
    cell: &'a BakeryCell<T>,
    ticket: BakeryTicket<'a>,
}

impl<T> BakeryCellGuard<'_, T> {
    #[inline]
    pub fn participant(&self) -> ParticipantId {
        self.ticket.participant()
    }

    /// Ticket number this critical section was entered under
    #[inline]
    pub fn ticket(&self) -> Ticket {
        self.ticket.number()
    }

    /// The lock, for reading other participants' state while inside
    #[inline]
    pub fn lock(&self) -> &BakeryLock {
        &self.cell.lock
    }
}

impl<T> Deref for BakeryCellGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the guard's ticket grants exclusive access
        unsafe { &*self.cell.value.get() }
    }
}

impl<T> DerefMut for BakeryCellGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the guard's ticket grants exclusive access
        unsafe { &mut *self.cell.value.get() }
    }
}
