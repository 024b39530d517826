use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

use relay::atomic::cas_usize;
use relay::pad::FalseShared;

use crate::slot::{drop_range, ring, Slot};

/// A bounded multi-producer multi-consumer queue.
///
/// Both endpoints are fail-fast: [`MpmcQueue::push`] returns the value back
/// when the queue is full and [`MpmcQueue::pop`] returns `None` when it is
/// empty. Neither blocks nor allocates. Callers that retry must back off
/// (spin hint, yield, or a [`Blocking`](crate::blocking::Blocking) wrapper)
/// or risk livelocking the queue under contention.
///
/// Claiming a position and publishing into it are separate steps, so the
/// queue is not linearizable across producers: a consumer may observe a
/// later producer's value before an earlier one's. Per-slot handoff is still
/// exact - nothing is lost, duplicated, or reordered within one slot.
pub struct MpmcQueue<T> {
    mask: usize,
    buffer: Box<[FalseShared<Slot<T>>]>,
    enq_pos: FalseShared<AtomicUsize>,
    deq_pos: FalseShared<AtomicUsize>,
}

unsafe impl<T: Send> Send for MpmcQueue<T> {}
unsafe impl<T: Send> Sync for MpmcQueue<T> {}

impl<T> MpmcQueue<T> {
    /// Creates a queue holding at least `capacity` values, rounded up to the
    /// next power of two.
    pub fn new(capacity: usize) -> MpmcQueue<T> {
        let (buffer, mask) = ring(capacity);
        MpmcQueue {
            mask,
            buffer,
            enq_pos: FalseShared::new(AtomicUsize::new(0)),
            deq_pos: FalseShared::new(AtomicUsize::new(0)),
        }
    }

    #[cfg(test)]
    fn with_base(capacity: usize, base: usize) -> MpmcQueue<T> {
        let (buffer, mask) = crate::slot::ring_at(capacity, base);
        MpmcQueue {
            mask,
            buffer,
            enq_pos: FalseShared::new(AtomicUsize::new(base)),
            deq_pos: FalseShared::new(AtomicUsize::new(base)),
        }
    }

    /// Pushes a value, or hands it back if the queue is full.
    pub fn push(&self, value: T) -> Result<(), T> {
        let mut pos = self.enq_pos.load(Ordering::Relaxed);
        let slot;
        loop {
            let s = &self.buffer[pos & self.mask];
            let seq = s.seq.load(Ordering::Acquire);
            // Signed so the comparison survives position wraparound.
            let cmp = seq.wrapping_sub(pos) as isize;
            if cmp == 0 {
                // The slot is ours to claim; the CAS hands back the fresh
                // position either way.
                let (fresh, swapped) = cas_usize(&self.enq_pos, pos, pos.wrapping_add(1));
                pos = fresh;
                if swapped {
                    slot = s;
                    break;
                }
                continue;
            }
            if cmp < 0 {
                // Still holding last lap's value: full.
                return Err(value);
            }
            // Somebody advanced the slot under us; our position is stale.
            pos = self.enq_pos.load(Ordering::Relaxed);
        }
        // pos is the claimed position plus one, which is exactly the
        // publication value the dequeuer is gating on.
        unsafe {
            slot.value.get().write(MaybeUninit::new(value));
        }
        slot.seq.store(pos, Ordering::Release);
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
                // Nothing published here yet: empty.
                return None;
            }
            pos = self.deq_pos.load(Ordering::Relaxed);
        }
        let value = unsafe { slot.value.get().read().assume_init() };
        // Re-arm the slot for its enqueuer one lap ahead.
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

    /// Whether the queue is empty. As racy as [`MpmcQueue::len`].
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Drop for MpmcQueue<T> {
    fn drop(&mut self) {
        let deq = self.deq_pos.load(Ordering::Relaxed);
        let enq = self.enq_pos.load(Ordering::Relaxed);
        unsafe {
            drop_range(&self.buffer, self.mask, deq, enq);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_rounds_up() {
        let q = MpmcQueue::<u32>::new(5);
        assert_eq!(q.capacity(), 8);
        let q = MpmcQueue::<u32>::new(0);
        assert_eq!(q.capacity(), 1);
    }

    #[test]
    fn full_and_empty_conditions() {
        let q = MpmcQueue::new(2);
        assert_eq!(q.pop(), None);
        assert!(q.push(1).is_ok());
        assert!(q.push(2).is_ok());
        assert_eq!(q.push(3), Err(3));
        assert_eq!(q.pop(), Some(1));
        assert_eq!(q.pop(), Some(2));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn survives_the_wrap_boundary() {
        // Start three positions shy of the wrap so pushes and pops cross it.
        let q = MpmcQueue::with_base(4, usize::MAX - 2);
        for lap in 0..3u64 {
            for i in 0..4 {
                assert!(q.push(lap * 10 + i).is_ok());
            }
            assert!(q.push(99).is_err());
            for i in 0..4 {
                assert_eq!(q.pop(), Some(lap * 10 + i));
            }
            assert_eq!(q.pop(), None);
        }
    }

    #[test]
    fn drops_in_flight_values() {
        use std::sync::atomic::AtomicUsize;
        use std::sync::Arc;

        struct Counted(Arc<AtomicUsize>);
        impl Drop for Counted {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let drops = Arc::new(AtomicUsize::new(0));
        let q = MpmcQueue::new(8);
        for _ in 0..5 {
            assert!(q.push(Counted(drops.clone())).is_ok());
        }
        drop(q.pop());
        drop(q);
        assert_eq!(drops.load(Ordering::SeqCst), 5);
    }
}
