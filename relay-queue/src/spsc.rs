use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

use relay::pad::FalseShared;

use crate::slot::{drop_range, ring, Slot};

/// A bounded single-producer single-consumer queue.
///
/// [`MpmcQueue`](crate::MpmcQueue) whittled down assuming at most one
/// enqueue concurrent with one dequeue: both positions are bare increments,
/// private to their side, and the only synchronization left is the slot
/// sequence numbers. Each side must only ever be driven by one thread at a
/// time; sharing a side is a data race.
pub struct SpscQueue<T> {
    mask: usize,
    buffer: Box<[FalseShared<Slot<T>>]>,
    enq_pos: FalseShared<AtomicUsize>,
    deq_pos: FalseShared<AtomicUsize>,
}

unsafe impl<T: Send> Send for SpscQueue<T> {}
unsafe impl<T: Send> Sync for SpscQueue<T> {}

impl<T> SpscQueue<T> {
    /// Creates a queue holding at least `capacity` values, rounded up to the
    /// next power of two.
    pub fn new(capacity: usize) -> SpscQueue<T> {
        let (buffer, mask) = ring(capacity);
        SpscQueue {
            mask,
            buffer,
            enq_pos: FalseShared::new(AtomicUsize::new(0)),
            deq_pos: FalseShared::new(AtomicUsize::new(0)),
        }
    }

    #[cfg(test)]
    fn with_base(capacity: usize, base: usize) -> SpscQueue<T> {
        let (buffer, mask) = crate::slot::ring_at(capacity, base);
        SpscQueue {
            mask,
            buffer,
            enq_pos: FalseShared::new(AtomicUsize::new(base)),
            deq_pos: FalseShared::new(AtomicUsize::new(base)),
        }
    }

    /// Pushes a value, or hands it back if the queue is full.
    pub fn push(&self, value: T) -> Result<(), T> {
        let pos = self.enq_pos.load(Ordering::Relaxed);
        let slot = &self.buffer[pos & self.mask];
        let seq = slot.seq.load(Ordering::Acquire);
        if (seq.wrapping_sub(pos) as isize) < 0 {
            return Err(value);
        }
        self.enq_pos.store(pos.wrapping_add(1), Ordering::Relaxed);
        unsafe {
            slot.value.get().write(MaybeUninit::new(value));
        }
        slot.seq.store(pos.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// Pops a value, or `None` if the queue is empty.
    pub fn pop(&self) -> Option<T> {
        let pos = self.deq_pos.load(Ordering::Relaxed);
        let slot = &self.buffer[pos & self.mask];
        let seq = slot.seq.load(Ordering::Acquire);
        if (seq.wrapping_sub(pos.wrapping_add(1)) as isize) < 0 {
            return None;
        }
        self.deq_pos.store(pos.wrapping_add(1), Ordering::Relaxed);
        let value = unsafe { slot.value.get().read().assume_init() };
        slot.seq
            .store(pos.wrapping_add(self.mask).wrapping_add(1), Ordering::Release);
        Some(value)
    }

    /// Returns the queue's capacity.
    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// Number of values in the queue. Racy: a moment-in-time approximation.
    pub fn len(&self) -> usize {
        let enq = self.enq_pos.load(Ordering::Relaxed);
        let deq = self.deq_pos.load(Ordering::Relaxed);
        enq.wrapping_sub(deq)
    }

    /// Whether the queue is empty. As racy as [`SpscQueue::len`].
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Drop for SpscQueue<T> {
    fn drop(&mut self) {
        let deq = self.deq_pos.load(Ordering::Relaxed);
        let enq = self.enq_pos.load(Ordering::Relaxed);
        unsafe {
            drop_range(&self.buffer, self.mask, deq, enq);
        }
    }
}
