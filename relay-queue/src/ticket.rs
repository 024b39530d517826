use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use relay::atomic::cas_usize;
use relay::pad::{CacheAligned, FalseShared};
use relay_sync::turn::TurnBroker;

// Spin-cutoff adaptation runs on every 128th ticket.
const SPIN_UPDATE_FREQ_SHIFT: u32 = 7;
const SPIN_UPDATE_MASK: usize = (1 << SPIN_UPDATE_FREQ_SHIFT) - 1;

/// One cell of the ticket ring: a turn broker gating its own slot.
struct TicketSlot<T> {
    broker: TurnBroker,
    value: UnsafeCell<MaybeUninit<T>>,
}

impl<T> TicketSlot<T> {
    fn may_enqueue(&self, turn: usize) -> bool {
        self.broker.is_turn(turn.wrapping_mul(2))
    }

    fn may_dequeue(&self, turn: usize) -> bool {
        self.broker.is_turn(turn.wrapping_mul(2).wrapping_add(1))
    }

    fn enqueue(&self, turn: usize, value: T, spin_cutoff: &AtomicU32, update_spin: bool) {
        self.broker
            .wait_for(turn.wrapping_mul(2), spin_cutoff, update_spin);
        unsafe {
            self.value.get().write(MaybeUninit::new(value));
        }
        self.broker.complete_turn(turn.wrapping_mul(2));
    }

    fn dequeue(&self, turn: usize, spin_cutoff: &AtomicU32, update_spin: bool) -> T {
        self.broker
            .wait_for(turn.wrapping_mul(2).wrapping_add(1), spin_cutoff, update_spin);
        let value = unsafe { self.value.get().read().assume_init() };
        self.broker
            .complete_turn(turn.wrapping_mul(2).wrapping_add(1));
        value
    }
}

/// A bounded blocking multi-producer multi-consumer queue.
///
/// Producers and consumers claim monotonically increasing tickets; ticket
/// `k` maps to slot `k % capacity` and to turn `2 * (k / capacity)` on the
/// enqueue side, `2 * (k / capacity) + 1` on the dequeue side. Each slot's
/// [`TurnBroker`] admits operations in strict ticket order, spinning up to an
/// adaptive cutoff before parking, so [`TicketQueue::push`] and
/// [`TicketQueue::pop`] block for as long as the queue stays full or empty.
///
/// [`TicketQueue::try_push`] and [`TicketQueue::try_pop`] claim a ticket only
/// when the slot at the head already permits the operation, so they never
/// block for a whole queue lap - at worst they ride out the short window
/// between a partner's claim and its publication.
pub struct TicketQueue<T> {
    lg_size: u32,
    mask: usize,
    buffer: Box<[CacheAligned<TicketSlot<T>>]>,
    push_ticket: FalseShared<AtomicUsize>,
    pop_ticket: FalseShared<AtomicUsize>,
    push_spin_cutoff: FalseShared<AtomicU32>,
    pop_spin_cutoff: FalseShared<AtomicU32>,
}

unsafe impl<T: Send> Send for TicketQueue<T> {}
unsafe impl<T: Send> Sync for TicketQueue<T> {}

impl<T> TicketQueue<T> {
    /// Creates a queue holding at least `capacity` values, rounded up to the
    /// next power of two.
    pub fn new(capacity: usize) -> TicketQueue<T> {
        let capacity = if capacity < 1 {
            1
        } else {
            capacity.next_power_of_two()
        };
        let mut buffer = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            buffer.push(CacheAligned::new(TicketSlot {
                broker: TurnBroker::new(),
                value: UnsafeCell::new(MaybeUninit::uninit()),
            }));
        }
        TicketQueue {
            lg_size: capacity.trailing_zeros(),
            mask: capacity - 1,
            buffer: buffer.into_boxed_slice(),
            push_ticket: FalseShared::new(AtomicUsize::new(0)),
            pop_ticket: FalseShared::new(AtomicUsize::new(0)),
            push_spin_cutoff: FalseShared::new(AtomicU32::new(0)),
            pop_spin_cutoff: FalseShared::new(AtomicU32::new(0)),
        }
    }

    /// Pushes a value, blocking while the queue is full.
    pub fn push(&self, value: T) {
        let ticket = self.push_ticket.fetch_add(1, Ordering::SeqCst);
        self.enqueue_with_ticket(ticket, value);
    }

    /// Pushes a value only if it can complete without waiting on a full
    /// queue, handing the value back otherwise.
    pub fn try_push(&self, value: T) -> Result<(), T> {
        match self.try_push_ticket() {
            Some(ticket) => {
                self.enqueue_with_ticket(ticket, value);
                Ok(())
            }
            None => Err(value),
        }
    }

    /// Pops a value, blocking while the queue is empty.
    pub fn pop(&self) -> T {
        let ticket = self.pop_ticket.fetch_add(1, Ordering::SeqCst);
        self.dequeue_with_ticket(ticket)
    }

    /// Pops a value only if one is ready, `None` otherwise.
    pub fn try_pop(&self) -> Option<T> {
        self.try_pop_ticket()
            .map(|ticket| self.dequeue_with_ticket(ticket))
    }

    /// Claims a push ticket whose enqueue will not block.
    fn try_push_ticket(&self) -> Option<usize> {
        let mut cur = self.push_ticket.load(Ordering::SeqCst);
        loop {
            let slot = &self.buffer[cur & self.mask];
            if !slot.may_enqueue(cur >> self.lg_size) {
                // Enqueueing with this ticket would block, but the ticket we
                // loaded may be stale. One reload under contention tells the
                // difference between "full" and "racing".
                let prev = cur;
                cur = self.push_ticket.load(Ordering::SeqCst);
                if prev == cur {
                    // Checked and failed twice: the queue is full.
                    return None;
                }
            } else {
                let (fresh, swapped) = cas_usize(&self.push_ticket, cur, cur.wrapping_add(1));
                if swapped {
                    return Some(cur);
                }
                cur = fresh;
            }
        }
    }

    fn try_pop_ticket(&self) -> Option<usize> {
        let mut cur = self.pop_ticket.load(Ordering::SeqCst);
        loop {
            let slot = &self.buffer[cur & self.mask];
            if !slot.may_dequeue(cur >> self.lg_size) {
                let prev = cur;
                cur = self.pop_ticket.load(Ordering::SeqCst);
                if prev == cur {
                    return None;
                }
            } else {
                let (fresh, swapped) = cas_usize(&self.pop_ticket, cur, cur.wrapping_add(1));
                if swapped {
                    return Some(cur);
                }
                cur = fresh;
            }
        }
    }

    fn enqueue_with_ticket(&self, ticket: usize, value: T) {
        let slot = &self.buffer[ticket & self.mask];
        let turn = ticket >> self.lg_size;
        let update_spin = ticket & SPIN_UPDATE_MASK == 0;
        slot.enqueue(turn, value, &self.push_spin_cutoff, update_spin);
    }

    fn dequeue_with_ticket(&self, ticket: usize) -> T {
        let slot = &self.buffer[ticket & self.mask];
        let turn = ticket >> self.lg_size;
        let update_spin = ticket & SPIN_UPDATE_MASK == 0;
        slot.dequeue(turn, &self.pop_spin_cutoff, update_spin)
    }

    /// Returns the queue's capacity.
    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// Number of values in the queue. Racy: a moment-in-time approximation.
    pub fn len(&self) -> usize {
        let push = self.push_ticket.load(Ordering::Relaxed);
        let pop = self.pop_ticket.load(Ordering::Relaxed);
        push.wrapping_sub(pop)
    }

    /// Whether the queue is empty. As racy as [`TicketQueue::len`].
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Drop for TicketQueue<T> {
    fn drop(&mut self) {
        // Exclusive access means every claimed ticket has completed, so the
        // values still in flight are exactly the unpopped tickets.
        let mut pos = self.pop_ticket.load(Ordering::Relaxed);
        let end = self.push_ticket.load(Ordering::Relaxed);
        while pos != end {
            let slot = &self.buffer[pos & self.mask];
            unsafe {
                (*slot.value.get()).assume_init_drop();
            }
            pos = pos.wrapping_add(1);
        }
    }
}
