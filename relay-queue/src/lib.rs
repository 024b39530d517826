//! Fast concurrent bounded queues for the relay workspace.
//!
//! ## Queues
//!
//! - [`MpmcQueue`], [`MpscQueue`], [`SpmcQueue`], [`SpscQueue`]: the sequenced
//!   ring family. Four specializations of one protocol - every slot carries a
//!   sequence number gating who may touch it next - with the compare-and-swap
//!   dropped on whichever side is single-threaded. All endpoints are
//!   fail-fast and allocation-free.
//! - [`TicketQueue`]: a blocking MPMC queue in which every slot owns a
//!   [turn broker](relay_sync::TurnBroker). Ticket claim order is the hand-off
//!   order, and waiters adaptively spin before parking on a futex.
//! - [`Blocking`]: wraps any of the above (anything implementing
//!   [`TryQueue`]) into blocking push/pop via the
//!   [`Block`](relay_sync::Block) prime/wait/signal handshake.
//!
//! Queues are forced to power-of-two capacities. When a fail-fast endpoint
//! returns full or empty, back off before retrying - under contention a hot
//! retry loop can livelock the queue.
//!
//! ## Example
//!
//! ```rust
//! use relay_queue::MpmcQueue;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let q = Arc::new(MpmcQueue::new(64));
//!
//! let producer = {
//!     let q = q.clone();
//!     thread::spawn(move || {
//!         for i in 0..64 {
//!             q.push(i).unwrap();
//!         }
//!     })
//! };
//!
//! producer.join().unwrap();
//! let mut sum = 0;
//! while let Some(v) = q.pop() {
//!     sum += v;
//! }
//! assert_eq!(sum, (0..64).sum::<i32>());
//! ```
//!
//! ## Ordering caveat
//!
//! The multi-producer variants are not linearizable across producers:
//! claiming a position and publishing into it are separate steps, so two
//! enqueues that complete in one order may be observed in the other. Only
//! per-slot hand-off and per-producer order are guaranteed.

#![warn(missing_docs)]

/// Blocking wrapper over fail-fast queues.
pub mod blocking;
/// Multi-producer multi-consumer sequenced ring.
pub mod mpmc;
/// Multi-producer single-consumer sequenced ring.
pub mod mpsc;
mod slot;
/// Single-producer multi-consumer sequenced ring.
pub mod spmc;
/// Single-producer single-consumer sequenced ring.
pub mod spsc;
/// Ticketed blocking MPMC queue over turn brokers.
pub mod ticket;

pub use blocking::{Blocking, TryQueue};
pub use mpmc::MpmcQueue;
pub use mpsc::MpscQueue;
pub use spmc::SpmcQueue;
pub use spsc::SpscQueue;
pub use ticket::TicketQueue;
