/*!
 * Bakery Lock
 *
 * Lamport's Bakery Algorithm over a dynamically registered set of
 * participants.
 *
 * # Architecture
 *
 * - **Slots**: a fixed-capacity table of `(owner, choosing, ticket)` atomics.
 *   A free slot has owner 0, is never choosing and holds ticket 0, so
 *   scanning it is a no-op for waiters. Registration claims a slot, it never
 *   grows the table, which keeps every waiter's scan complete.
 * - **Observer reserve**: identities at or above `OBSERVER_ID_BASE` claim
 *   slots from a separate region behind the participant slots, so short-lived
 *   observers never compete with participants for capacity.
 * - **Directory**: `DashMap` from participant id to slot index. Only used to
 *   find a slot and to reject duplicate registration; the exclusion decision
 *   reads nothing but the slot atomics.
 * - **Waiting**: bounded spin escalating to cooperative yield and short
 *   sleeps (`SpinBackoff`), never a native mutex or condvar.
 *
 * # Ordering
 *
 * Every atomic access is `SeqCst`. The algorithm relies on a total order over
 * the `choosing`/`ticket` stores and loads of all participants; weaker
 * orderings allow two participants to miss each other's tickets.
 */

use crate::core::errors::{BakeryError, BakeryResult};
use crate::core::limits::{
    DEFAULT_MAX_PARTICIPANTS, DEFAULT_OBSERVER_SLOTS, FREE_SLOT, OBSERVER_ID_BASE,
};
use crate::core::sync::spinwait::{SpinBackoff, SpinConfig};
use crate::core::types::{ParticipantId, Ticket};
use ahash::RandomState;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{
    AtomicBool, AtomicU64,
    Ordering::{Relaxed, SeqCst},
};
use tracing::trace;

/// One participant's protocol state
///
/// Cache-line aligned so spinning on one slot does not bounce its neighbours.
#[repr(C, align(64))]
struct Slot {
    owner: AtomicU64,
    choosing: AtomicBool,
    ticket: AtomicU64,
}

impl Slot {
    fn free() -> Self {
        Self {
            owner: AtomicU64::new(FREE_SLOT),
            choosing: AtomicBool::new(false),
            ticket: AtomicU64::new(0),
        }
    }

    #[inline]
    fn is_idle(&self) -> bool {
        !self.choosing.load(SeqCst) && self.ticket.load(SeqCst) == 0
    }
}

/// Lock statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BakeryStats {
    pub acquisitions: u64,
    pub contended_acquisitions: u64,
    pub spin_steps: u64,
    pub registered: usize,
    pub capacity: usize,
}

/// Bakery Algorithm mutual exclusion
pub struct BakeryLock {
    slots: Box<[Slot]>,
    /// Participant slots; the rest of `slots` is the observer reserve
    capacity: usize,
    directory: DashMap<ParticipantId, usize, RandomState>,
    spin: SpinConfig,
    acquisitions: AtomicU64,
    contended: AtomicU64,
    spin_steps: AtomicU64,
}

impl BakeryLock {
    /// Create a lock with `capacity` participant slots
    pub fn new(capacity: usize) -> Self {
        Self::with_spin(capacity, SpinConfig::default())
    }

    /// Create a lock with a custom wait strategy
    pub fn with_spin(capacity: usize, spin: SpinConfig) -> Self {
        Self::with_layout(capacity, DEFAULT_OBSERVER_SLOTS, spin)
    }

    /// Create a lock with `capacity` participant slots and `observer_slots`
    /// reserved for observer identities
    pub fn with_layout(capacity: usize, observer_slots: usize, spin: SpinConfig) -> Self {
        let capacity = capacity.max(1);
        let slots = (0..capacity + observer_slots)
            .map(|_| Slot::free())
            .collect();
        Self {
            slots,
            capacity,
            directory: DashMap::with_hasher(RandomState::new()),
            spin,
            acquisitions: AtomicU64::new(0),
            contended: AtomicU64::new(0),
            spin_steps: AtomicU64::new(0),
        }
    }

    /// Add a participant with ticket 0
    pub fn register(&self, id: ParticipantId) -> BakeryResult<()> {
        if id == FREE_SLOT {
            return Err(BakeryError::ReservedParticipant(id));
        }
        match self.directory.entry(id) {
            Entry::Occupied(_) => Err(BakeryError::DuplicateParticipant(id)),
            Entry::Vacant(vacant) => {
                let index = self.claim_slot(id)?;
                vacant.insert(index);
                trace!(participant = id, slot = index, "bakery participant registered");
                Ok(())
            }
        }
    }

    fn claim_slot(&self, id: ParticipantId) -> BakeryResult<usize> {
        let (first, region) = if id >= OBSERVER_ID_BASE {
            (self.capacity, &self.slots[self.capacity..])
        } else {
            (0, &self.slots[..self.capacity])
        };
        region
            .iter()
            .position(|slot| {
                slot.owner
                    .compare_exchange(FREE_SLOT, id, SeqCst, SeqCst)
                    .is_ok()
            })
            .map(|offset| first + offset)
            .ok_or(BakeryError::CapacityExhausted {
                capacity: region.len(),
            })
    }

    /// Remove an idle participant and free its slot
    pub fn unregister(&self, id: ParticipantId) -> BakeryResult<()> {
        let index = self.slot_index(id)?;
        let removed = self
            .directory
            .remove_if(&id, |_, index| self.slots[*index].is_idle());
        if removed.is_none() {
            return Err(BakeryError::ParticipantBusy(id));
        }
        self.slots[index].owner.store(FREE_SLOT, SeqCst);
        trace!(participant = id, slot = index, "bakery participant unregistered");
        Ok(())
    }

    #[inline]
    fn slot_index(&self, id: ParticipantId) -> BakeryResult<usize> {
        self.directory
            .get(&id)
            .map(|entry| *entry.value())
            .ok_or(BakeryError::UnknownParticipant(id))
    }

    /// Enter the critical section, spinning until it is this participant's turn
    ///
    /// Returns the ticket the participant was served under. The caller must
    /// call [`BakeryLock::release`] on every exit path; prefer
    /// [`BakeryLock::lock`] which does so on drop.
    pub fn acquire(&self, id: ParticipantId) -> BakeryResult<Ticket> {
        let index = self.slot_index(id)?;
        self.enter(index, id)
    }

    /// Enter the critical section and hold it until the returned guard drops
    pub fn lock(&self, id: ParticipantId) -> BakeryResult<BakeryTicket<'_>> {
        let index = self.slot_index(id)?;
        let ticket = self.enter(index, id)?;
        Ok(BakeryTicket {
            lock: self,
            index,
            participant: id,
            ticket,
        })
    }

    fn enter(&self, index: usize, id: ParticipantId) -> BakeryResult<Ticket> {
        let me = &self.slots[index];

        // Claiming `choosing` is the only way into the doorway, so two callers
        // sharing an identity cannot both draw a ticket into this slot
        if me
            .choosing
            .compare_exchange(false, true, SeqCst, SeqCst)
            .is_err()
        {
            return Err(BakeryError::AlreadyHeld(id));
        }
        if me.ticket.load(SeqCst) != 0 {
            me.choosing.store(false, SeqCst);
            return Err(BakeryError::AlreadyHeld(id));
        }

        // Doorway
        let max = self
            .slots
            .iter()
            .map(|slot| slot.ticket.load(SeqCst))
            .max()
            .unwrap_or(0);
        let ticket = max + 1;
        me.ticket.store(ticket, SeqCst);
        me.choosing.store(false, SeqCst);

        let steps = self.wait_turn(index, id, ticket);
        self.acquisitions.fetch_add(1, Relaxed);
        if steps > 0 {
            self.contended.fetch_add(1, Relaxed);
            self.spin_steps.fetch_add(steps, Relaxed);
        }
        Ok(ticket)
    }

    /// Waiting room: spin until no other slot is choosing or ahead of
    /// `(ticket, id)`; returns the number of backoff steps taken
    fn wait_turn(&self, index: usize, id: ParticipantId, ticket: Ticket) -> u64 {
        let mut steps = 0u64;
        for (j, other) in self.slots.iter().enumerate() {
            if j == index {
                continue;
            }

            let mut backoff = SpinBackoff::new(self.spin);
            while other.choosing.load(SeqCst) {
                backoff.snooze();
            }

            loop {
                let their_ticket = other.ticket.load(SeqCst);
                if their_ticket == 0 {
                    break;
                }
                let their_id = other.owner.load(SeqCst);
                if (their_ticket, their_id) > (ticket, id) {
                    break;
                }
                backoff.snooze();
            }
            steps += u64::from(backoff.steps());
        }
        steps
    }

    /// Leave the critical section
    pub fn release(&self, id: ParticipantId) -> BakeryResult<()> {
        let index = self.slot_index(id)?;
        self.release_slot(index);
        Ok(())
    }

    #[inline]
    fn release_slot(&self, index: usize) {
        self.slots[index].ticket.store(0, SeqCst);
    }

    /// Current ticket of a participant (0 when not waiting or inside)
    pub fn ticket(&self, id: ParticipantId) -> BakeryResult<Ticket> {
        let index = self.slot_index(id)?;
        Ok(self.slots[index].ticket.load(SeqCst))
    }

    #[inline]
    pub fn is_registered(&self, id: ParticipantId) -> bool {
        self.directory.contains_key(&id)
    }

    /// Registered participant ids, ascending
    pub fn participants(&self) -> Vec<ParticipantId> {
        let mut ids: Vec<_> = self.directory.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.directory.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.directory.is_empty()
    }

    /// Participant slots, not counting the observer reserve
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn observer_slots(&self) -> usize {
        self.slots.len() - self.capacity
    }

    /// No participant is choosing or holding a ticket
    pub fn is_quiescent(&self) -> bool {
        self.slots.iter().all(Slot::is_idle)
    }

    /// A participant other than `except` that is choosing or holds a ticket
    pub fn busy_participant(&self, except: Option<ParticipantId>) -> Option<ParticipantId> {
        self.slots
            .iter()
            .filter(|slot| !slot.is_idle())
            .map(|slot| slot.owner.load(SeqCst))
            .find(|owner| Some(*owner) != except)
    }

    pub fn stats(&self) -> BakeryStats {
        BakeryStats {
            acquisitions: self.acquisitions.load(Relaxed),
            contended_acquisitions: self.contended.load(Relaxed),
            spin_steps: self.spin_steps.load(Relaxed),
            registered: self.len(),
            capacity: self.capacity(),
        }
    }

    /// Drop every registration
    ///
    /// Fails without changing anything if a participant is still inside or
    /// waiting.
    pub fn reset(&self) -> BakeryResult<()> {
        if let Some(busy) = self.busy_participant(None) {
            return Err(BakeryError::ParticipantBusy(busy));
        }
        self.directory.clear();
        for slot in self.slots.iter() {
            slot.owner.store(FREE_SLOT, SeqCst);
        }
        self.acquisitions.store(0, Relaxed);
        self.contended.store(0, Relaxed);
        self.spin_steps.store(0, Relaxed);
        Ok(())
    }
}

impl Default for BakeryLock {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PARTICIPANTS)
    }
}

impl std::fmt::Debug for BakeryLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BakeryLock")
            .field("capacity", &self.capacity())
            .field("observer_slots", &self.observer_slots())
            .field("registered", &self.len())
            .field("spin", &self.spin)
            .finish()
    }
}

/// Critical-section guard; releases the ticket on drop
#[must_use = "the critical section ends as soon as the ticket is dropped"]
pub struct BakeryTicket<'a> {
    lock: &'a BakeryLock,
    index: usize,
    participant: ParticipantId,
    ticket: Ticket,
}

impl BakeryTicket<'_> {
    #[inline]
    pub fn participant(&self) -> ParticipantId {
        self.participant
    }

    /// Ticket number this entry was served under
    #[inline]
    pub fn number(&self) -> Ticket {
        self.ticket
    }
}

impl Drop for BakeryTicket<'_> {
    fn drop(&mut self) {
        self.lock.release_slot(self.index);
    }
}
