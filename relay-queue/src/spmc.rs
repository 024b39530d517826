use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

use relay::atomic::cas_usize;
use relay::pad::FalseShared;

use crate::slot::{drop_range, ring, Slot};

/// A bounded single-producer multi-consumer queue.
///
/// [`MpmcQueue`](crate::MpmcQueue) whittled down assuming one enqueuer runs
/// concurrently with many dequeuers: the enqueue position is a bare increment
/// private to the producer. The producer side must only ever be driven by
/// one thread at a time; sharing it is a data race.
///
/// Within the single producer, consumers observe values in enqueue order.
/// Which consumer gets which value is unordered.
pub struct SpmcQueue<T> {
    mask: usize,
    buffer: Box<[FalseShared<Slot<T>>]>,
    enq_pos: FalseShared<AtomicUsize>,
    deq_pos: FalseShared<AtomicUsize>,
}

unsafe impl<T: Send> Send for SpmcQueue<T> {}
unsafe impl<T: Send> Sync for SpmcQueue<T> {}

impl<T> SpmcQueue<T> {
    /// Creates a queue holding at least `capacity` values, rounded up to the
    /// next power of two.
    pub fn new(capacity: usize) -> SpmcQueue<T> {
        let (buffer, mask) = ring(capacity);
        SpmcQueue {
            mask,
            buffer,
            enq_pos: FalseShared::new(AtomicUsize::new(0)),
            deq_pos: FalseShared::new(AtomicUsize::new(0)),
        }
    }

    /// Pushes a value, or hands it back if the queue is full. Single
    /// producer only.
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
        let mut pos = self.deq_pos.load(Ordering::Relaxed);
        let slot;
        loop {
            let s = &self.buffer[pos & self.mask];
            let seq = s.seq.load(Ordering::Acquire);
            let cmp = seq.wrapping_sub(pos.wrapping_add(1)) as isize;
            if cmp == 0 {
                let (fresh, swapped) = cas_usize(&self.deq_pos, pos, pos.wrapping_add(1));
                pos = fresh;
                if swapped {
                    slot = s;
                    break;
                }
                continue;
            }
            if cmp < 0 {
                return None;
            }
            pos = self.deq_pos.load(Ordering::Relaxed);
        }
        let value = unsafe { slot.value.get().read().assume_init() };
        slot.seq.store(pos.wrapping_add(self.mask), Ordering::Release);
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

    /// Whether the queue is empty. As racy as [`SpmcQueue::len`].
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Drop for SpmcQueue<T> {
    fn drop(&mut self) {
        let deq = self.deq_pos.load(Ordering::Relaxed);
        let enq = self.enq_pos.load(Ordering::Relaxed);
        unsafe {
            drop_range(&self.buffer, self.mask, deq, enq);
        }
    }
}
