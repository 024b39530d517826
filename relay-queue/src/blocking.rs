use relay_sync::Block;

use crate::{MpmcQueue, MpscQueue, SpmcQueue, SpscQueue, TicketQueue};

/// A queue with fail-fast endpoints, as implemented by every queue in this
/// crate. The blanket seam [`Blocking`] builds on.
pub trait TryQueue {
    /// The transported value type.
    type Item;

    /// Pushes a value, or hands it back if the queue is full.
    fn try_push(&self, value: Self::Item) -> Result<(), Self::Item>;

    /// Pops a value, or `None` if the queue is empty.
    fn try_pop(&self) -> Option<Self::Item>;
}

impl<T> TryQueue for MpmcQueue<T> {
    type Item = T;

    fn try_push(&self, value: T) -> Result<(), T> {
        self.push(value)
    }

    fn try_pop(&self) -> Option<T> {
        self.pop()
    }
}

impl<T> TryQueue for MpscQueue<T> {
    type Item = T;

    fn try_push(&self, value: T) -> Result<(), T> {
        self.push(value)
    }

    fn try_pop(&self) -> Option<T> {
        self.pop()
    }
}

impl<T> TryQueue for SpmcQueue<T> {
    type Item = T;

    fn try_push(&self, value: T) -> Result<(), T> {
        self.push(value)
    }

    fn try_pop(&self) -> Option<T> {
        self.pop()
    }
}

impl<T> TryQueue for SpscQueue<T> {
    type Item = T;

    fn try_push(&self, value: T) -> Result<(), T> {
        self.push(value)
    }

    fn try_pop(&self) -> Option<T> {
        self.pop()
    }
}

impl<T> TryQueue for TicketQueue<T> {
    type Item = T;

    fn try_push(&self, value: T) -> Result<(), T> {
        TicketQueue::try_push(self, value)
    }

    fn try_pop(&self) -> Option<T> {
        TicketQueue::try_pop(self)
    }
}

/// Blocking semantics around any [`TryQueue`].
///
/// One [`Block`] per side turns the fail-fast endpoints into blocking
/// [`Blocking::push`] / [`Blocking::pop`] calls: a failed try primes the
/// side's block, retries once, and only then waits; every successful
/// operation signals the opposite side's block. The single-producer /
/// single-consumer constraints of the wrapped queue still apply.
pub struct Blocking<Q> {
    queue: Q,
    push_block: Block,
    pop_block: Block,
}

impl<Q: TryQueue> Blocking<Q> {
    /// Wraps `queue` with a block per side.
    pub fn new(queue: Q) -> Blocking<Q> {
        Blocking {
            queue,
            push_block: Block::new(),
            pop_block: Block::new(),
        }
    }

    /// The wrapped queue.
    pub fn queue(&self) -> &Q {
        &self.queue
    }

    /// Pushes a value, blocking while the queue is full.
    pub fn push(&self, value: Q::Item) {
        let mut value = value;
        loop {
            // Fast path that never touches the block.
            value = match self.queue.try_push(value) {
                Ok(()) => {
                    self.pop_block.signal();
                    return;
                }
                Err(v) => v,
            };
            let mut primer = 0;
            loop {
                let (p, primed) = self.push_block.prime(primer);
                primer = p;
                value = match self.queue.try_push(value) {
                    Ok(()) => {
                        if primed {
                            self.push_block.cancel();
                        }
                        self.pop_block.signal();
                        return;
                    }
                    Err(v) => v,
                };
                if primed {
                    break;
                }
            }
            // Still full after priming; park until a dequeue signals us.
            self.push_block.wait(primer);
        }
    }

    /// Pops a value, blocking while the queue is empty.
    pub fn pop(&self) -> Q::Item {
        loop {
            if let Some(value) = self.queue.try_pop() {
                self.push_block.signal();
                return value;
            }
            let mut primer = 0;
            loop {
                let (p, primed) = self.pop_block.prime(primer);
                primer = p;
                if let Some(value) = self.queue.try_pop() {
                    if primed {
                        self.pop_block.cancel();
                    }
                    self.push_block.signal();
                    return value;
                }
                if primed {
                    break;
                }
            }
            self.pop_block.wait(primer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_through_when_uncontended() {
        let q = Blocking::new(MpmcQueue::new(4));
        q.push(1);
        q.push(2);
        assert_eq!(q.pop(), 1);
        assert_eq!(q.pop(), 2);
        assert!(q.queue().is_empty());
    }
}
