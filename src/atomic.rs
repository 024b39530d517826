use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

/// Compare-and-swap on a `usize`, returning the freshest observed value and
/// whether the swap took.
///
/// On failure the returned value is the one that beat us, so retry loops do
/// not need a second load before the next attempt. On success it is `new`.
#[inline]
pub fn cas_usize(addr: &AtomicUsize, old: usize, new: usize) -> (usize, bool) {
    match addr.compare_exchange(old, new, Ordering::SeqCst, Ordering::SeqCst) {
        Ok(_) => (new, true),
        Err(fresh) => (fresh, false),
    }
}

/// `cas_usize` for `u32` words.
#[inline]
pub fn cas_u32(addr: &AtomicU32, old: u32, new: u32) -> (u32, bool) {
    match addr.compare_exchange(old, new, Ordering::SeqCst, Ordering::SeqCst) {
        Ok(_) => (new, true),
        Err(fresh) => (fresh, false),
    }
}

/// Tells the CPU we are in a contended spin loop (x86 `PAUSE` or the target's
/// equivalent). Required for forward progress under heavy contention.
#[inline]
pub fn pause() {
    std::hint::spin_loop();
}
