use std::sync::atomic::{AtomicU32, Ordering};

use relay::atomic::{cas_usize, pause};

use crate::futex::Futex;

const TURN_SHIFT: u32 = 6;
const TURN_WAIT_MASK: usize = (1 << TURN_SHIFT) - 1;

/// The lowest spin count a cutoff will be adapted down to.
pub const MIN_SPINS: u32 = 4;
/// The highest spin count a cutoff will be adapted up to, and the count used
/// when probing for an update.
pub const MAX_SPINS: u32 = 2000;

/// Ticketed ordering over one futex word.
///
/// The word packs `(turn_number << 6) | waiter_count`; waiters block on a
/// specific turn number with an adaptive spin before parking, and
/// [`TurnBroker::complete_turn`] advances the turn and releases them. The
/// waiter count saturates at 63 - it only needs to distinguish "nobody is
/// parked" from "somebody may be".
pub struct TurnBroker {
    futex: Futex,
}

impl Default for TurnBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnBroker {
    /// Creates a broker at turn zero.
    pub fn new() -> Self {
        TurnBroker {
            futex: Futex::new(),
        }
    }

    /// Whether the broker is currently at `turn`.
    pub fn is_turn(&self, turn: usize) -> bool {
        turn_number(self.futex.state().load(Ordering::SeqCst)) == turn
    }

    /// Blocks until the broker reaches `turn`, spinning up to the cutoff
    /// before parking on the futex.
    ///
    /// When `update_spin_cutoff` is set (or the cutoff is still zero), the
    /// observed try count feeds back into `spin_cutoff` so the spin adapts to
    /// the partner's rate.
    ///
    /// # Panics
    ///
    /// Panics if `turn` has already been completed; waiting on a past turn
    /// would park forever.
    pub fn wait_for(&self, turn: usize, spin_cutoff: &AtomicU32, update_spin_cutoff: bool) {
        let given_spin_count = spin_cutoff.load(Ordering::Relaxed);
        let mut spin_count = given_spin_count;
        if update_spin_cutoff || given_spin_count == 0 {
            spin_count = MAX_SPINS;
        }

        let mut tries: u32 = 0;
        let mut state = self.futex.state().load(Ordering::SeqCst);
        loop {
            let cur_turn = turn_number(state);
            if cur_turn == turn {
                break;
            }

            let waiting_for = turn.wrapping_sub(cur_turn);
            assert!(
                waiting_for < (u32::MAX as usize) >> (TURN_SHIFT + 1),
                "turn is in the past"
            );

            if tries < spin_count {
                pause();
                state = self.futex.state().load(Ordering::SeqCst);
            } else {
                let cur_waiting_for = turn_wait(state);
                let new_state = if waiting_for <= cur_waiting_for {
                    // A later turn is already being waited for - we hop on
                    // that bandwagon and wait with it.
                    state
                } else {
                    let encoded = encode_turn(cur_turn, waiting_for);
                    if state != encoded {
                        let (fresh, swapped) = cas_usize(self.futex.state(), state, encoded);
                        state = fresh;
                        if !swapped {
                            tries = tries.wrapping_add(1);
                            continue;
                        }
                    }
                    encoded
                };
                self.futex.wait(new_state, futex_channel(turn));
                state = self.futex.state().load(Ordering::SeqCst);
            }

            tries = tries.wrapping_add(1);
        }

        if update_spin_cutoff || given_spin_count == 0 {
            let spin_update = if tries >= MAX_SPINS {
                // We hit the cap, so spinning is pointless; the right cutoff
                // is the minimum possible.
                MIN_SPINS
            } else {
                // Allow ourselves 2*N spins when N looked necessary, to
                // absorb run-to-run variation.
                let mut update = MIN_SPINS;
                let dub_tries = tries << 1;
                if dub_tries > update {
                    update = dub_tries;
                }
                update.min(MAX_SPINS)
            };
            if given_spin_count == 0 {
                spin_cutoff.store(spin_update, Ordering::Relaxed);
            } else {
                // Exponential moving average with alpha 7/8. One try is
                // enough; a racing update is as good as ours.
                let ema = (given_spin_count as i32
                    + ((spin_update as i32 - given_spin_count as i32) >> 3))
                    as u32;
                let _ = spin_cutoff.compare_exchange(
                    given_spin_count,
                    ema,
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                );
            }
        }
    }

    /// Advances the broker past `turn`, unblocking a `wait_for(turn + 1)`.
    pub fn complete_turn(&self, turn: usize) {
        let mut state = self.futex.state().load(Ordering::SeqCst);
        loop {
            let cur_waiting_for = turn_wait(state);
            let new_state = encode_turn(turn.wrapping_add(1), cur_waiting_for.saturating_sub(1));
            let (fresh, swapped) = cas_usize(self.futex.state(), state, new_state);
            state = fresh;
            if swapped {
                if cur_waiting_for != 0 {
                    // Wake all matching waiters. Turn k and turn k+64 share a
                    // channel bit; waking only one could strand the other, so
                    // everyone re-checks.
                    self.futex
                        .wake(u32::MAX, futex_channel(turn.wrapping_add(1)));
                }
                break;
            }
        }
    }
}

fn turn_number(state: usize) -> usize {
    (state & !TURN_WAIT_MASK) >> TURN_SHIFT
}

fn turn_wait(state: usize) -> usize {
    state & TURN_WAIT_MASK
}

fn encode_turn(turn_number: usize, turn_wait: usize) -> usize {
    turn_number << TURN_SHIFT | turn_wait.min(TURN_WAIT_MASK)
}

fn futex_channel(turn: usize) -> usize {
    1 << (turn & (usize::BITS as usize - 1))
}
