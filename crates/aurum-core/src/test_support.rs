//! Host-side fakes shared by the unit tests

use core::cell::Cell;

use embedded_hal_async::delay::DelayNs;

use crate::clock::{Clock, Tick};

/// Manually advanced clock.
#[derive(Debug, Default)]
pub struct FakeClock {
    now: Cell<Tick>,
}

impl FakeClock {
    pub fn at(now: Tick) -> Self {
        Self {
            now: Cell::new(now),
        }
    }

    pub fn advance(&self, ms: u32) {
        self.now.set(self.now.get().wrapping_add(ms));
    }

    pub fn set(&self, now: Tick) {
        self.now.set(now);
    }
}

impl Clock for FakeClock {
    fn now_ms(&self) -> Tick {
        self.now.get()
    }
}

/// Delay that returns immediately after moving the [`FakeClock`] forward.
pub struct FakeDelay<'a> {
    clock: &'a FakeClock,
    pub total_ms: u64,
}

impl<'a> FakeDelay<'a> {
    pub fn new(clock: &'a FakeClock) -> Self {
        Self { clock, total_ms: 0 }
    }
}

impl DelayNs for FakeDelay<'_> {
    async fn delay_ns(&mut self, ns: u32) {
        self.delay_ms(ns.div_ceil(1_000_000)).await;
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.total_ms += u64::from(ms);
        self.clock.advance(ms);
    }
}
