//! Synchronization primitives for spin-heavy code paths.
//!
//! This crate holds the pieces that turn the relay try-queues into blocking
//! ones without handing the problem to an OS mutex:
//!
//! - [`Futex`]: an emulated, address-keyed futex. Waiting is performed
//!   against an expected state word and a wait mask; wakers release only the
//!   waiters whose mask overlaps theirs.
//! - [`TurnBroker`]: ticketed ordering on top of the futex. Waiters block on
//!   a specific turn number with an adaptive spin-then-park, and completing a
//!   turn releases the next one.
//! - [`Block`]: a prime/wait/signal handshake that wraps any fail-fast
//!   operation into a blocking call with no missed wakeups, built on a custom
//!   two-slot writer / counted-reader try-lock.
//!
//! Everything here trades CPU for latency: spins run hot before parking, and
//! [`Block`] aborts the transition to waiting whenever the partner shows any
//! sign of progress. Use these when the alternative is to spin anyway.

#![warn(missing_docs)]

/// Prime/wait/signal blocking around fail-fast operations.
pub mod block;
/// Emulated futex with wait masks.
pub mod futex;
/// Ticketed turn ordering with adaptive spin.
pub mod turn;

pub use block::Block;
pub use futex::{Futex, WaitResult};
pub use turn::TurnBroker;
