use std::cell::Cell;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};

use once_cell::sync::Lazy;

const NUM_BUCKETS: usize = 4096;

/// One parking spot per hash of a futex key. Every futex maps to exactly one
/// bucket for its whole lifetime.
struct Bucket {
    waiters: Mutex<WaiterList>,
}

static BUCKETS: Lazy<Vec<Bucket>> = Lazy::new(|| {
    (0..NUM_BUCKETS)
        .map(|_| Bucket {
            waiters: Mutex::new(WaiterList {
                head: ptr::null_mut(),
                tail: ptr::null_mut(),
            }),
        })
        .collect()
});

static NEXT_KEY: AtomicUsize = AtomicUsize::new(1);

// Thomas Wang's 64-bit integer mix.
fn twhash(mut key: u64) -> u64 {
    key = (!key).wrapping_add(key << 21); // key *= (1 << 21) - 1; key -= 1;
    key = key ^ (key >> 24);
    key = key.wrapping_add(key << 3).wrapping_add(key << 8); // key *= 1 + (1 << 3) + (1 << 8)
    key = key ^ (key >> 14);
    key = key.wrapping_add(key << 2).wrapping_add(key << 4); // key *= 1 + (1 << 2) + (1 << 4)
    key = key ^ (key >> 28);
    key.wrapping_add(key << 31) // key *= 1 + (1 << 31)
}

/// The outcome of a [`Futex::wait`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitResult {
    /// The state word no longer held the expected value by the time `wait`
    /// looked; the caller did not park.
    ValueChanged,
    /// The caller parked and a `wake` call released it.
    Awoken,
}

/// A waiter parked on one futex. Lives on the waiting thread's stack; it is
/// linked into the bucket under the bucket lock and unlinked by the waker
/// before the waiter can return, so the pointer never dangles.
struct WaitNode {
    // Link fields are only touched under the owning bucket's lock.
    prev: Cell<*mut WaitNode>,
    next: Cell<*mut WaitNode>,

    key: usize,
    wait_mask: usize,
    signalled: Mutex<bool>,
    cond: Condvar,
}

// Safety: the Cell link fields are guarded by the bucket lock, everything
// else is either immutable or its own sync primitive.
unsafe impl Sync for WaitNode {}

struct WaiterList {
    head: *mut WaitNode,
    tail: *mut WaitNode,
}

// Safety: raw node pointers are only dereferenced under the bucket lock that
// owns this list.
unsafe impl Send for WaiterList {}

impl WaiterList {
    /// Caller must keep `node` alive until it is unlinked.
    unsafe fn push_back(&mut self, node: *mut WaitNode) {
        let node_ref = &*node;
        node_ref.prev.set(self.tail);
        node_ref.next.set(ptr::null_mut());
        if self.tail.is_null() {
            self.head = node;
        } else {
            (*self.tail).next.set(node);
        }
        self.tail = node;
    }

    unsafe fn unlink(&mut self, node: *mut WaitNode) {
        let node_ref = &*node;
        let prev = node_ref.prev.get();
        let next = node_ref.next.get();
        if prev.is_null() {
            self.head = next;
        } else {
            (*prev).next.set(next);
        }
        if next.is_null() {
            self.tail = prev;
        } else {
            (*next).prev.set(prev);
        }
    }
}

/// A user-space futex: a state word plus address-keyed park/unpark with wait
/// masks.
///
/// Waiting is performed against an expected state; if the word has already
/// moved on, [`Futex::wait`] returns without parking. The semantic encoding
/// of the state word is the caller's business - the futex only ever compares
/// it for equality.
pub struct Futex {
    state: AtomicUsize,
    key: usize,
    bucket: &'static Bucket,
}

impl Default for Futex {
    fn default() -> Self {
        Self::new()
    }
}

impl Futex {
    /// Creates a futex with state zero.
    ///
    /// Each futex gets a process-unique key; a Thomas Wang mix of the key
    /// picks its bucket, fixed for the futex's lifetime.
    pub fn new() -> Self {
        let key = NEXT_KEY.fetch_add(1, Ordering::Relaxed);
        Futex {
            state: AtomicUsize::new(0),
            key,
            bucket: &BUCKETS[(twhash(key as u64) % NUM_BUCKETS as u64) as usize],
        }
    }

    /// The state word. Callers load, store, and CAS it directly.
    pub fn state(&self) -> &AtomicUsize {
        &self.state
    }

    /// Parks the caller until a matching [`Futex::wake`], unless the state
    /// word no longer equals `expect_state`. `wait_mask` must not be zero;
    /// only `wake` calls whose mask intersects it will release us.
    pub fn wait(&self, expect_state: usize, wait_mask: usize) -> WaitResult {
        debug_assert!(wait_mask != 0);
        let node = WaitNode {
            prev: Cell::new(ptr::null_mut()),
            next: Cell::new(ptr::null_mut()),
            key: self.key,
            wait_mask,
            signalled: Mutex::new(false),
            cond: Condvar::new(),
        };

        {
            // Lock before enqueueing. If the state just changed, the matching
            // wake is about to scan this bucket; holding the lock here means
            // we either observe the change and skip parking, or we are linked
            // in before the wake's scan starts.
            let mut list = self.bucket.waiters.lock().unwrap();
            if self.state.load(Ordering::SeqCst) != expect_state {
                return WaitResult::ValueChanged;
            }
            unsafe {
                list.push_back(&node as *const WaitNode as *mut WaitNode);
            }
        }

        // Wait to be signalled.
        let mut signalled = node.signalled.lock().unwrap();
        while !*signalled {
            signalled = node.cond.wait(signalled).unwrap();
        }

        WaitResult::Awoken
    }

    /// Wakes up to `count` waiters whose wait mask intersects `wait_mask`,
    /// returning how many were awoken.
    pub fn wake(&self, count: u32, wait_mask: usize) -> u32 {
        let mut list = self.bucket.waiters.lock().unwrap();

        let mut num_awoken = 0u32;
        let mut iter = list.head;
        while num_awoken < count && !iter.is_null() {
            let node = unsafe { &*iter };
            let next = node.next.get();
            if node.key == self.key && node.wait_mask & wait_mask != 0 {
                num_awoken += 1;
                unsafe {
                    list.unlink(iter);
                }

                // Take the node lock so the waiter is either still before its
                // flag check, or already parked on the condvar - never in
                // between. After we drop the lock the node may be gone.
                let mut signalled = node.signalled.lock().unwrap();
                *signalled = true;
                node.cond.notify_one();
            }
            iter = next;
        }

        num_awoken
    }
}
