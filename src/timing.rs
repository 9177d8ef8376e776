//! Wrap-safe millisecond arithmetic.
//!
//! The node clock is a free-running `u32` millisecond counter that wraps
//! roughly every 49.7 days.  Timestamps are never compared directly; the
//! elapsed time between two of them is always taken with wrapping
//! subtraction, which stays correct across a single wrap.

/// Milliseconds elapsed from `since_ms` to `now_ms`, correct across a wrap.
#[inline]
pub const fn elapsed_ms(now_ms: u32, since_ms: u32) -> u32 {
    now_ms.wrapping_sub(since_ms)
}
