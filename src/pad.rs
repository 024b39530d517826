use std::ops::{Deref, DerefMut};

// Cache line sizes per architecture.
// x86/x86_64: 64B, aarch64: 128B (Apple M-series / Neoverse), s390x: 256B.
// Fallback: 64B (most common).

/// Bytes in one cache line on the compilation target.
#[cfg(target_arch = "s390x")]
pub const CACHE_LINE: usize = 256;
/// Bytes in one cache line on the compilation target.
#[cfg(target_arch = "aarch64")]
pub const CACHE_LINE: usize = 128;
/// Bytes in one cache line on the compilation target.
#[cfg(not(any(target_arch = "s390x", target_arch = "aarch64")))]
pub const CACHE_LINE: usize = 64;

/// Bytes two hot variables must be apart to never collide in L1/L2.
///
/// The 256B line is already the transfer granule; nothing prefetches a
/// neighbor on top of it.
#[cfg(target_arch = "s390x")]
pub const FALSE_SHARE: usize = 256;
/// Bytes two hot variables must be apart to never collide in L1/L2.
///
/// Two of this target's cache lines, same doubling as x86.
#[cfg(target_arch = "aarch64")]
pub const FALSE_SHARE: usize = 256;
/// Bytes two hot variables must be apart to never collide in L1/L2.
///
/// On x86 this is two cache lines: the prefetcher pulls the adjacent line
/// whenever it loads one, so 64B spacing still false-shares.
#[cfg(not(any(target_arch = "s390x", target_arch = "aarch64")))]
pub const FALSE_SHARE: usize = 128;

// s390 - 256
#[cfg(target_arch = "s390x")]
#[repr(align(256))]
#[derive(Copy, Clone, Default, Debug)]
/// Pads `T` out to its own cache line.
pub struct CacheAligned<T> {
    /// The wrapped value.
    pub data: T,
}

// neoverse 128 - Apple M-series
// rest 64
#[cfg(target_arch = "aarch64")]
#[repr(align(128))]
#[derive(Copy, Clone, Default, Debug)]
/// Pads `T` out to its own cache line.
pub struct CacheAligned<T> {
    /// The wrapped value.
    pub data: T,
}

// x86_64
#[cfg(not(any(target_arch = "s390x", target_arch = "aarch64")))]
#[repr(align(64))]
#[derive(Copy, Clone, Default, Debug)]
/// Pads `T` out to its own cache line.
pub struct CacheAligned<T> {
    /// The wrapped value.
    pub data: T,
}

impl<T> Deref for CacheAligned<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.data
    }
}

impl<T> DerefMut for CacheAligned<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.data
    }
}

impl<T> CacheAligned<T> {
    /// Wraps `t` on its own cache line.
    pub fn new(t: T) -> Self {
        Self { data: t }
    }
}

// s390 again - 256, the line itself is the granule
#[cfg(target_arch = "s390x")]
#[repr(align(256))]
#[derive(Copy, Clone, Default, Debug)]
/// Pads `T` out to the false-sharing stride, covering adjacent-line prefetch.
pub struct FalseShared<T> {
    /// The wrapped value.
    pub data: T,
}

// aarch64 - two 128B lines
#[cfg(target_arch = "aarch64")]
#[repr(align(256))]
#[derive(Copy, Clone, Default, Debug)]
/// Pads `T` out to the false-sharing stride, covering adjacent-line prefetch.
pub struct FalseShared<T> {
    /// The wrapped value.
    pub data: T,
}

// x86_64 - two 64B lines, the prefetched pair
#[cfg(not(any(target_arch = "s390x", target_arch = "aarch64")))]
#[repr(align(128))]
#[derive(Copy, Clone, Default, Debug)]
/// Pads `T` out to the false-sharing stride, covering adjacent-line prefetch.
pub struct FalseShared<T> {
    /// The wrapped value.
    pub data: T,
}

impl<T> Deref for FalseShared<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.data
    }
}

impl<T> DerefMut for FalseShared<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.data
    }
}

impl<T> FalseShared<T> {
    /// Wraps `t` in its own false-sharing region.
    pub fn new(t: T) -> Self {
        Self { data: t }
    }
}
