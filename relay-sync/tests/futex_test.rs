use relay_sync::futex::{Futex, WaitResult};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn wait_returns_value_changed_without_parking() {
    let futex = Futex::new();
    futex.state().store(7, Ordering::SeqCst);

    // Expected state is stale, so this must come back immediately.
    assert_eq!(futex.wait(5, 0xF), WaitResult::ValueChanged);
}

#[test]
#[cfg_attr(miri, ignore)]
fn wake_only_matches_overlapping_masks() {
    let futex = Arc::new(Futex::new());

    let low = {
        let futex = futex.clone();
        thread::spawn(move || futex.wait(0, 0b01))
    };
    let high = {
        let futex = futex.clone();
        thread::spawn(move || futex.wait(0, 0b10))
    };
    thread::sleep(Duration::from_millis(50));

    // Waking the high channel must never touch the low waiter.
    let mut awoken = 0;
    while awoken == 0 {
        awoken = futex.wake(u32::MAX, 0b10);
        thread::yield_now();
    }
    assert_eq!(awoken, 1);
    assert_eq!(high.join().unwrap(), WaitResult::Awoken);
    assert!(!low.is_finished());

    awoken = 0;
    while awoken == 0 {
        awoken = futex.wake(u32::MAX, 0b01);
        thread::yield_now();
    }
    assert_eq!(awoken, 1);
    assert_eq!(low.join().unwrap(), WaitResult::Awoken);
}

#[test]
#[cfg_attr(miri, ignore)]
fn wake_caps_at_count() {
    let futex = Arc::new(Futex::new());

    let handles: Vec<_> = (0..3)
        .map(|_| {
            let futex = futex.clone();
            thread::spawn(move || futex.wait(0, 0b1))
        })
        .collect();
    thread::sleep(Duration::from_millis(50));

    let mut first = 0;
    while first < 2 {
        first += futex.wake(2 - first, 0b1);
        thread::yield_now();
    }
    assert_eq!(first, 2);

    // Exactly one waiter must still be parked.
    let mut rest = 0;
    while rest == 0 {
        rest = futex.wake(u32::MAX, 0b1);
        thread::yield_now();
    }
    assert_eq!(rest, 1);

    for h in handles {
        assert_eq!(h.join().unwrap(), WaitResult::Awoken);
    }
}

#[test]
#[cfg_attr(miri, ignore)]
fn wake_is_scoped_to_its_own_futex() {
    let near = Futex::new();
    let far = Arc::new(Futex::new());

    let waiter = {
        let far = far.clone();
        thread::spawn(move || far.wait(0, !0))
    };
    thread::sleep(Duration::from_millis(50));

    // Another futex's wake never matches our waiter, bucket collision or not.
    assert_eq!(near.wake(u32::MAX, !0), 0);

    let mut awoken = 0;
    while awoken == 0 {
        awoken = far.wake(u32::MAX, !0);
        thread::yield_now();
    }
    assert_eq!(waiter.join().unwrap(), WaitResult::Awoken);
}
