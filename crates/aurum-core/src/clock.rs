//! Monotonic millisecond clock and wraparound-safe elapsed checks

/// Milliseconds since boot. Wraps at `u32::MAX` (roughly 49.7 days).
pub type Tick = u32;

/// Source of the current tick.
///
/// Implemented over `embassy_time::Instant` on the device and over
/// `std::time::Instant` in the simulator.
pub trait Clock {
    /// Current milliseconds since boot, truncated to a [`Tick`].
    fn now_ms(&self) -> Tick;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> Tick {
        (**self).now_ms()
    }
}

/// Returns true when more than `threshold` milliseconds separate `mark` from `now`.
///
/// The distance is the modular (wrapping) difference, so a `now` that has
/// wrapped past zero while `mark` sits near `u32::MAX` is treated exactly like
/// forward progress.
#[inline]
pub const fn elapsed_since(now: Tick, mark: Tick, threshold: u32) -> bool {
    now.wrapping_sub(mark) > threshold
}
