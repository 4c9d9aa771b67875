//! Wireless association with a blinking status indicator
//!
//! Two states: associating and associated. While associating the LED pair
//! blinks on a fixed period and the association status is polled at a
//! bounded rate. There is no timeout: with bad or missing credentials the
//! loop blinks forever, which is the only visible symptom.

use core::fmt::Debug;

use embedded_hal_async::delay::DelayNs;
use log::{error, info, warn};

use crate::clock::{Clock, Tick, elapsed_since};
use crate::config::{Settings, Timing};
use crate::indicator::{Indicator, SharedIndicator};
use crate::selection::{ButtonDebouncer, Metal};

/// The network interface as seen by the connection manager.
pub trait Association {
    type Error: Debug;

    /// Start joining the network named in `settings`.
    ///
    /// Implementations keep retrying in the background; this only kicks
    /// the process off.
    fn begin(&mut self, settings: &Settings) -> impl Future<Output = Result<(), Self::Error>>;

    /// Non-blocking status check: associated and ready to carry traffic.
    fn is_associated(&mut self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Associating { blink_on: bool, last_blink: Tick },
    Associated,
}

/// Association state machine, advanced one poll at a time.
#[derive(Debug)]
pub struct ConnectionManager {
    state: ConnectionState,
    blink_interval_ms: u32,
}

impl ConnectionManager {
    /// Enter the associating state at `now` with the LEDs dark.
    pub const fn new(now: Tick, blink_interval_ms: u32) -> Self {
        Self {
            state: ConnectionState::Associating {
                blink_on: false,
                last_blink: now,
            },
            blink_interval_ms,
        }
    }

    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Advance with the latest status. Returns true once associated.
    ///
    /// On the transition the blinking stops and the LEDs settle on `selected`.
    pub fn step<I: Indicator>(
        &mut self,
        now: Tick,
        associated: bool,
        selected: Metal,
        indicator: &SharedIndicator<I>,
    ) -> bool {
        let ConnectionState::Associating {
            blink_on,
            last_blink,
        } = self.state
        else {
            return true;
        };

        if associated {
            self.state = ConnectionState::Associated;
            indicator.show_selection(selected);
            return true;
        }

        if elapsed_since(now, last_blink, self.blink_interval_ms) {
            let blink_on = !blink_on;
            indicator.set_blink(blink_on);
            self.state = ConnectionState::Associating {
                blink_on,
                last_blink: now,
            };
        }

        false
    }
}

/// Join the configured network, blinking until the interface reports success.
///
/// Only returns once associated. A failure to even start association is
/// logged and the loop still runs, so the device keeps blinking.
pub async fn associate<A, C, D, I>(
    association: &mut A,
    settings: &Settings,
    timing: &Timing,
    clock: &C,
    delay: &mut D,
    selection: &ButtonDebouncer,
    indicator: &SharedIndicator<I>,
) where
    A: Association,
    C: Clock,
    D: DelayNs,
    I: Indicator,
{
    if settings.ssid.is_empty() {
        warn!("No network name configured, association cannot complete");
    }

    info!("Associating with '{}'", settings.ssid);
    if let Err(e) = association.begin(settings).await {
        error!("Failed to start association: {:?}", e);
    }

    let mut manager = ConnectionManager::new(clock.now_ms(), timing.blink_interval_ms);
    loop {
        let associated = association.is_associated();
        if manager.step(clock.now_ms(), associated, selection.selected(), indicator) {
            break;
        }
        delay.delay_ms(timing.association_poll_ms).await;
    }

    info!("Associated with '{}'", settings.ssid);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicator::tests::{FakeLeds, fake_leds, levels};
    use crate::test_support::{FakeClock, FakeDelay};
    use embassy_futures::block_on;

    /// Reports success after a fixed number of status polls
    struct FakeAssociation {
        polls_until_up: usize,
        polls: usize,
        begun: bool,
        fail_begin: bool,
    }

    impl FakeAssociation {
        fn up_after(polls_until_up: usize) -> Self {
            Self {
                polls_until_up,
                polls: 0,
                begun: false,
                fail_begin: false,
            }
        }
    }

    impl Association for FakeAssociation {
        type Error = ();

        async fn begin(&mut self, _settings: &Settings) -> Result<(), Self::Error> {
            self.begun = true;
            if self.fail_begin { Err(()) } else { Ok(()) }
        }

        fn is_associated(&mut self) -> bool {
            self.polls += 1;
            self.polls > self.polls_until_up
        }
    }

    fn shared_leds() -> SharedIndicator<FakeLeds> {
        let leds = SharedIndicator::new();
        leds.install(fake_leds());
        leds
    }

    #[test]
    fn test_blinks_on_interval_while_associating() {
        let leds = shared_leds();
        let mut manager = ConnectionManager::new(1_000, 250);

        assert!(!manager.step(1_100, false, Metal::Gold, &leds));
        assert_eq!(levels(&leds), (false, false));

        assert!(!manager.step(1_251, false, Metal::Gold, &leds));
        assert_eq!(levels(&leds), (true, true));

        assert!(!manager.step(1_400, false, Metal::Gold, &leds));
        assert_eq!(levels(&leds), (true, true));

        assert!(!manager.step(1_502, false, Metal::Gold, &leds));
        assert_eq!(levels(&leds), (false, false));
    }

    #[test]
    fn test_association_settles_leds_on_selection() {
        let leds = shared_leds();
        let mut manager = ConnectionManager::new(0, 250);

        manager.step(300, false, Metal::Silver, &leds);
        assert!(manager.step(310, true, Metal::Silver, &leds));
        assert_eq!(manager.state(), ConnectionState::Associated);
        assert_eq!(levels(&leds), (false, true));

        // Blinking has stopped for good
        assert!(manager.step(10_000, false, Metal::Silver, &leds));
        assert_eq!(levels(&leds), (false, true));
    }

    #[test]
    fn test_associate_polls_until_up() {
        let leds = shared_leds();
        let clock = FakeClock::at(5_000);
        let mut delay = FakeDelay::new(&clock);
        let selection = ButtonDebouncer::new(200);
        let timing = Timing::DEFAULT;
        let mut association = FakeAssociation::up_after(60);

        block_on(associate(
            &mut association,
            &Settings::default(),
            &timing,
            &clock,
            &mut delay,
            &selection,
            &leds,
        ));

        assert!(association.begun);
        assert_eq!(association.polls, 61);
        assert_eq!(delay.total_ms, 60 * u64::from(timing.association_poll_ms));
        assert_eq!(levels(&leds), (true, false));
    }

    #[test]
    fn test_failed_begin_keeps_polling() {
        let leds = shared_leds();
        let clock = FakeClock::at(0);
        let mut delay = FakeDelay::new(&clock);
        let selection = ButtonDebouncer::new(200);
        let mut association = FakeAssociation::up_after(3);
        association.fail_begin = true;

        block_on(associate(
            &mut association,
            &Settings::default(),
            &Timing::DEFAULT,
            &clock,
            &mut delay,
            &selection,
            &leds,
        ));

        assert_eq!(association.polls, 4);
    }
}
