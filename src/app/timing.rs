//! Wrap-safe arithmetic on the boot-relative millisecond counter.
//!
//! The counter is a `u32` and wraps after ~49.7 days of uptime.  Elapsed
//! time is always `now.wrapping_sub(since)`, which stays correct across a
//! single wrap as long as the true interval is below `u32::MAX` ms.

/// Milliseconds from `since` to `now`.
#[inline]
pub fn elapsed_ms(now: u32, since: u32) -> u32 {
    now.wrapping_sub(since)
}

/// True once strictly more than `interval` ms separate `since` and `now`.
#[inline]
pub fn has_elapsed(now: u32, since: u32, interval: u32) -> bool {
    elapsed_ms(now, since) > interval
}
