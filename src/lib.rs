//! Relay: low-level primitives for fast spin/block coordination
//!
//! This crate is the leaf of the relay workspace. It holds the machine-level
//! building blocks the queue and sync crates are written against:
//!
//! - **`(fresh, swapped)` CAS**: compare-and-swap helpers that hand back the
//!   freshest observed value on failure, halving the atomic ops in hot retry
//!   paths.
//! - **`pause`**: the x86 `PAUSE`-equivalent spin hint.
//! - **Padding**: `CacheAligned` / `FalseShared` wrappers and the
//!   `CACHE_LINE` / `FALSE_SHARE` stride constants.
//!
//! # Example
//!
//! ```rust
//! use relay::atomic::{cas_usize, pause};
//! use relay::pad::FalseShared;
//! use std::sync::atomic::AtomicUsize;
//!
//! let pos = FalseShared::new(AtomicUsize::new(0));
//! let mut cur = 0;
//! loop {
//!     let (fresh, swapped) = cas_usize(&pos, cur, cur + 1);
//!     if swapped {
//!         break;
//!     }
//!     cur = fresh;
//!     pause();
//! }
//! ```

#![warn(missing_docs)]

/// Compare-and-swap helpers and the spin hint.
pub mod atomic;
/// Cache-line and false-sharing padding.
pub mod pad;

pub use atomic::{cas_u32, cas_usize, pause};
pub use pad::{CacheAligned, FalseShared, CACHE_LINE, FALSE_SHARE};
