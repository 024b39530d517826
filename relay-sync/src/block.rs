use std::collections::LinkedList;
use std::sync::atomic::{AtomicI32, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, Thread};

use relay::atomic::cas_u32;
use relay::pad::FalseShared;

const HIGH_BIT: u32 = 1 << 31;

/// A parked thread waiting for one notify. Registered under the block's
/// reader lock, drained under its writer lock.
struct Signal {
    state: AtomicUsize,
    thread: Thread,
}

impl Signal {
    fn new() -> Self {
        Signal {
            state: AtomicUsize::new(0),
            thread: thread::current(),
        }
    }

    fn wait(&self) {
        while self.state.load(Ordering::Acquire) == 0 {
            thread::park();
        }
    }

    fn notify(&self) {
        self.state.store(1, Ordering::Release);
        self.thread.unpark();
    }
}

/// A spinning writer/reader lock with try-lock semantics.
///
/// At most one writer holds the lock and at most one more may be pending; a
/// third concurrent `try_lock` fails outright. Readers are refused as soon as
/// any writer holds the lock, which is what lets the signal path make
/// deterministic progress.
struct Lock {
    write: FalseShared<AtomicU32>,
    read: FalseShared<AtomicU32>,
}

impl Lock {
    const fn new() -> Self {
        Lock {
            write: FalseShared {
                data: AtomicU32::new(0),
            },
            read: FalseShared {
                data: AtomicU32::new(0),
            },
        }
    }

    /// Takes the lock as a writer, waiting in the single pending slot if the
    /// lock is held. Fails if both the lock and the pending slot are taken.
    fn try_lock(&self) -> bool {
        let mut write;
        loop {
            // Add our lock desire, checking the state in the process.
            write = self.write.fetch_add(1, Ordering::SeqCst).wrapping_add(1);
            if write & HIGH_BIT == 0 {
                break;
            }
            // High bit set: an unlock is in flight. Once it lands we may be
            // either the first or the pending locker, so go around.
            thread::yield_now();
        }

        match write {
            1 => {
                // We were the first to grab this lock - signal readers to
                // exit and wait for them to drain.
                let mut read = self.read.fetch_add(HIGH_BIT, Ordering::SeqCst) + HIGH_BIT;
                while read != HIGH_BIT {
                    thread::yield_now();
                    read = self.read.load(Ordering::SeqCst);
                }
                true
            }
            2 => {
                // We were the second: wait for the holder's unlock to flip
                // the high bit, then put the lock back into the held state.
                let mut write = write;
                while write & HIGH_BIT == 0 {
                    thread::yield_now();
                    write = self.write.load(Ordering::SeqCst);
                }
                self.write.store(1, Ordering::SeqCst);
                true
            }
            _ => false,
        }
    }

    /// Relinquishes the writer lock.
    fn wunlock(&self) {
        let write = self
            .write
            .fetch_add(HIGH_BIT, Ordering::SeqCst)
            .wrapping_add(HIGH_BIT);
        if (write & !HIGH_BIT) > 1 {
            // A pending locker is spinning on our high bit and takes over
            // from here.
            return;
        }
        // Let readers back in first, then reset the writer word.
        self.read.store(0, Ordering::SeqCst);
        self.write.store(0, Ordering::SeqCst);
    }

    /// Grabs a reader lock, failing if any writer holds or wants the lock.
    fn try_rlock(&self) -> bool {
        let mut read = self.read.load(Ordering::SeqCst);
        loop {
            if read & HIGH_BIT != 0 {
                return false;
            }
            let (fresh, swapped) = cas_u32(&self.read, read, read + 1);
            if swapped {
                return true;
            }
            read = fresh;
        }
    }

    /// Releases one reader.
    fn runlock(&self) {
        self.read.fetch_sub(1, Ordering::SeqCst);
    }

    fn write_word(&self) -> u32 {
        self.write.load(Ordering::SeqCst)
    }
}

/// A blocking primitive to wrap around try-operations.
///
/// `Block` turns a fail-fast operation into a blocking one without missed
/// signals: a waiter *primes* the block, retries the operation once more, and
/// only then parks; the other side calls [`Block::signal`] after every
/// operation that could un-wait someone. The block assumes parking is worse
/// than spinning and aborts the transition to waiting whenever it sees any
/// sign of forward progress, so it burns CPU in exchange for throughput.
///
/// The flow on the failing side:
///
/// ```rust
/// # use relay_sync::Block;
/// # let block = Block::new();
/// # let mut attempts = 0;
/// # let mut try_op = || { attempts += 1; attempts > 1 };
/// loop {
///     if try_op() {
///         break;
///     }
///     let mut primer = 0;
///     let mut primed = false;
///     let mut done = false;
///     while !primed && !done {
///         (primer, primed) = block.prime(primer);
///         done = try_op();
///     }
///     if done {
///         if primed {
///             block.cancel();
///         }
///         break;
///     }
///     block.wait(primer);
/// }
/// ```
///
/// while the partner runs `op(); block.signal()`.
pub struct Block {
    waiters: FalseShared<AtomicI32>,
    counter: FalseShared<AtomicUsize>,
    lock: Lock,
    sleepers: Mutex<LinkedList<Arc<Signal>>>,
}

impl Default for Block {
    fn default() -> Self {
        Self::new()
    }
}

impl Block {
    /// Creates an unsignalled block.
    pub fn new() -> Self {
        Block {
            waiters: FalseShared::new(AtomicI32::new(0)),
            counter: FalseShared::new(AtomicUsize::new(0)),
            lock: Lock::new(),
            sleepers: Mutex::new(LinkedList::new()),
        }
    }

    /// Announces the intent to wait, returning the primer to later pass to
    /// [`Block::wait`] and whether priming took.
    ///
    /// `last` is the primer from the caller's previous failed round (zero to
    /// start). Priming fails when the counter has moved since - the partner
    /// made progress, so the caller should retry its operation instead of
    /// waiting. A caller whose prime took but who then decides not to wait
    /// must call [`Block::cancel`].
    pub fn prime(&self, last: usize) -> (usize, bool) {
        let primer = self.counter.load(Ordering::SeqCst);
        if primer != last {
            return (primer, false);
        }
        thread::yield_now();
        let primer = self.counter.load(Ordering::SeqCst);
        if primer != last || self.lock.write_word() != 0 {
            return (primer, false);
        }
        self.waiters.fetch_add(1, Ordering::SeqCst);
        (primer, true)
    }

    /// Cancels one primed call. Must be called iff a prime took and the
    /// caller is not going to wait.
    pub fn cancel(&self) {
        self.waiters.fetch_sub(1, Ordering::SeqCst);
    }

    /// Blocks until the block is signalled past `primer`.
    ///
    /// This may return early; the assumption is that re-checking an operation
    /// that may fail is cheaper than staying parked.
    pub fn wait(&self, primer: usize) {
        loop {
            loop {
                thread::yield_now();
                if self.counter.load(Ordering::SeqCst) != primer {
                    self.waiters.fetch_sub(1, Ordering::SeqCst);
                    return;
                }
                if self.lock.try_rlock() {
                    break;
                }
            }
            if self.counter.load(Ordering::SeqCst) != primer {
                self.waiters.fetch_sub(1, Ordering::SeqCst);
                self.lock.runlock();
                return;
            }
            // Register while still holding the reader lock: a signaler can
            // only bump the counter and broadcast under the writer lock,
            // which cannot be taken until we let go.
            let signal = Arc::new(Signal::new());
            self.sleepers.lock().unwrap().push_back(signal.clone());
            self.lock.runlock();
            signal.wait();
            // Waking up does not grab any lock; go around and re-check.
        }
    }

    /// Awakens all block waiters. To be called after every operation that
    /// can un-wait one.
    pub fn signal(&self) {
        if self.waiters.load(Ordering::SeqCst) == 0 {
            return;
        }
        // We either get the lock, wait in the pending slot until we get it,
        // or leave because somebody else already holds pending. One pending
        // signal is enough: every prime that raced past the active signal
        // will observe the pending one's increment, so collapsing all
        // simultaneous signals into one pending loses nothing.
        if !self.lock.try_lock() {
            return;
        }
        self.counter.fetch_add(1, Ordering::SeqCst);
        let sleepers = std::mem::take(&mut *self.sleepers.lock().unwrap());
        for signal in sleepers {
            signal.notify();
        }
        self.lock.wunlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn lock_allows_one_pending_writer() {
        let lock = Arc::new(Lock::new());
        assert!(lock.try_lock());

        let pending = lock.clone();
        let t = thread::spawn(move || pending.try_lock());
        thread::sleep(Duration::from_millis(10));
        assert_eq!(lock.write_word(), 2, "expected a parked pending locker");

        // First and pending slots are taken; a third writer bounces.
        assert!(!lock.try_lock());

        lock.wunlock();
        assert!(t.join().unwrap(), "pending locker should take the lock over");
        assert_eq!(lock.write_word(), 1);
        lock.wunlock();
        assert_eq!(lock.write_word(), 0);
    }

    #[test]
    fn lock_refuses_readers_while_written() {
        let lock = Lock::new();
        assert!(lock.try_rlock());
        assert!(lock.try_rlock());
        lock.runlock();

        let writer = Arc::new(Lock::new());
        assert!(writer.try_lock());
        assert!(!writer.try_rlock());
        writer.wunlock();
        assert!(writer.try_rlock());
    }

    #[test]
    fn cancel_undoes_prime() {
        let block = Block::new();
        assert_eq!(block.waiters.load(Ordering::SeqCst), 0);

        let (primer, primed) = block.prime(0);
        assert_eq!(primer, 0);
        assert!(primed);
        assert_eq!(block.waiters.load(Ordering::SeqCst), 1);

        block.cancel();
        assert_eq!(block.waiters.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn prime_fails_on_stale_primer() {
        let block = Block::new();
        let (_, primed) = block.prime(0);
        assert!(primed);
        block.cancel();

        // Move the counter; priming against the old observation must fail
        // and hand back the fresh counter.
        block.counter.fetch_add(1, Ordering::SeqCst);
        let (primer, primed) = block.prime(0);
        assert!(!primed);
        assert_eq!(primer, 1);
        let (_, primed) = block.prime(primer);
        assert!(primed);
        block.cancel();
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn waiters_drain_after_racing_signals() {
        let block = Arc::new(Block::new());
        let stop = Arc::new(AtomicUsize::new(0));
        let mut handles = vec![];

        for _ in 0..4 {
            let block = block.clone();
            let stop = stop.clone();
            handles.push(thread::spawn(move || {
                let mut primer = 0;
                while stop.load(Ordering::Relaxed) == 0 {
                    let (p, primed) = block.prime(primer);
                    primer = p;
                    if primed {
                        block.wait(primer);
                    }
                }
            }));
        }
        for _ in 0..4 {
            let block = block.clone();
            let stop = stop.clone();
            handles.push(thread::spawn(move || {
                while stop.load(Ordering::Relaxed) == 0 {
                    thread::yield_now();
                    block.signal();
                }
            }));
        }

        thread::sleep(Duration::from_millis(200));
        stop.store(1, Ordering::Relaxed);
        // A waiter can still park right after seeing stop unset; keep
        // signalling until every thread is out.
        let done = Arc::new(AtomicUsize::new(0));
        let pumper = {
            let block = block.clone();
            let done = done.clone();
            thread::spawn(move || {
                while done.load(Ordering::Relaxed) == 0 {
                    block.signal();
                    thread::yield_now();
                }
            })
        };
        for h in handles {
            h.join().unwrap();
        }
        done.store(1, Ordering::Relaxed);
        pumper.join().unwrap();
        assert_eq!(block.waiters.load(Ordering::SeqCst), 0);
    }
}
