//! [`Clock`] backed by the embassy time driver

use aurum_core::{Clock, Tick};
use embassy_time::Instant;

/// Milliseconds since boot from the esp-rtos timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbassyClock;

impl Clock for EmbassyClock {
    #[inline]
    fn now_ms(&self) -> Tick {
        // Truncation is the wraparound
        Instant::now().as_millis() as Tick
    }
}
