//! The cooperative main loop
//!
//! Everything except the button handler runs here, on one context, with no
//! suspension point other than the idle pause and the blocking network read
//! inside a fetch.

use embedded_hal_async::delay::DelayNs;
use log::{error, info, warn};

use crate::clock::Clock;
use crate::config::{Settings, Timing};
use crate::connection::{Association, associate};
use crate::display::{DISPLAY_DIGITS, NumericDisplay, scale_price};
use crate::fetch::{Transport, fetch_prices};
use crate::indicator::{Indicator, SharedIndicator};
use crate::response::PriceReading;
use crate::scheduler::ScheduledEvent;
use crate::selection::ButtonDebouncer;

/// State owned by the main loop and never touched from interrupt context.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppContext {
    pub settings: Settings,
    pub prices: PriceReading,
}

impl AppContext {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            prices: PriceReading::UNKNOWN,
        }
    }
}

/// Which periodic actions ran in one loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cycle {
    pub fetched: bool,
    pub refreshed: bool,
}

/// The appliance: periodic fetch-and-parse plus periodic display refresh.
pub struct App<'a, C, T, N, P> {
    context: AppContext,
    timing: Timing,
    clock: C,
    transport: T,
    display: N,
    delay: P,
    selection: &'a ButtonDebouncer,
    fetch: ScheduledEvent,
    refresh: ScheduledEvent,
    display_failing: bool,
}

impl<'a, C, T, N, P> App<'a, C, T, N, P>
where
    C: Clock,
    T: Transport,
    N: NumericDisplay,
    P: DelayNs,
{
    pub fn new(
        settings: Settings,
        timing: Timing,
        clock: C,
        transport: T,
        display: N,
        delay: P,
        selection: &'a ButtonDebouncer,
    ) -> Self {
        Self {
            context: AppContext::new(settings),
            timing,
            clock,
            transport,
            display,
            delay,
            selection,
            fetch: ScheduledEvent::new(timing.fetch_interval_ms),
            refresh: ScheduledEvent::new(timing.refresh_interval_ms),
            display_failing: false,
        }
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    pub fn display(&self) -> &N {
        &self.display
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Whether the last refresh failed to reach the display.
    pub fn display_failing(&self) -> bool {
        self.display_failing
    }

    /// Block until the network is joined, blinking `indicator` meanwhile.
    pub async fn associate<A, I>(&mut self, association: &mut A, indicator: &SharedIndicator<I>)
    where
        A: Association,
        I: Indicator,
    {
        associate(
            association,
            &self.context.settings,
            &self.timing,
            &self.clock,
            &mut self.delay,
            self.selection,
            indicator,
        )
        .await;
    }

    /// Evaluate every periodic action once.
    pub async fn run_once(&mut self) -> Cycle {
        let mut cycle = Cycle::default();

        if self.fetch.poll(self.clock.now_ms()) {
            self.fetch_step().await;
            cycle.fetched = true;
        }

        // A fetch can take a while; sample the clock again
        if self.refresh.poll(self.clock.now_ms()) {
            self.refresh_step();
            cycle.refreshed = true;
        }

        cycle
    }

    /// Run the loop forever with the idle pause between iterations.
    pub async fn run(&mut self) -> ! {
        info!(
            "Main loop running: fetch every {} ms, refresh every {} ms",
            self.timing.fetch_interval_ms, self.timing.refresh_interval_ms
        );

        loop {
            self.run_once().await;
            self.delay.delay_ms(self.timing.loop_pause_ms).await;
        }
    }

    async fn fetch_step(&mut self) {
        let host = self.context.settings.address.as_str();
        match fetch_prices(&mut self.transport, host).await {
            Ok(prices) => self.context.prices = prices,
            Err(e) => warn!("{}, keeping previous prices", e),
        }
    }

    fn refresh_step(&mut self) {
        let selected = self.selection.selected();
        let value = scale_price(selected.price(&self.context.prices));

        // Logged on the transitions only, refresh runs every few ms
        match self.display.show(value, DISPLAY_DIGITS) {
            Ok(()) if self.display_failing => {
                info!("Display recovered");
                self.display_failing = false;
            }
            Ok(()) => {}
            Err(e) if !self.display_failing => {
                error!("Failed to show {} price: {:?}", selected.label(), e);
                self.display_failing = true;
            }
            Err(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::tests::FakeTransport;
    use crate::indicator::tests::fake_leds;
    use crate::test_support::{FakeClock, FakeDelay};
    use core::convert::Infallible;
    use embassy_futures::block_on;

    #[derive(Default)]
    struct FakeDisplay {
        shown: Option<(i32, u8)>,
        draws: usize,
        broken: bool,
    }

    impl NumericDisplay for FakeDisplay {
        type Error = &'static str;

        fn show(&mut self, value: i32, digits: u8) -> Result<(), Self::Error> {
            self.draws += 1;
            if self.broken {
                return Err("bus fault");
            }
            self.shown = Some((value, digits));
            Ok(())
        }
    }

    const BODY: &[u8] = b"HTTP/1.1 200 OK\r\n\r\n{\"gold\":1000.00,\"silver\":25.00}";

    fn settings() -> Settings {
        let mut settings = Settings::default();
        let _ = settings.address.push_str("api.example");
        settings
    }

    type TestApp<'a> = App<'a, &'a FakeClock, FakeTransport, FakeDisplay, FakeDelay<'a>>;

    fn app<'a>(clock: &'a FakeClock, selection: &'a ButtonDebouncer) -> TestApp<'a> {
        App::new(
            settings(),
            Timing::DEFAULT,
            clock,
            FakeTransport::serving(BODY),
            FakeDisplay::default(),
            FakeDelay::new(clock),
            selection,
        )
    }

    #[test]
    fn test_first_cycle_fetches_and_refreshes() {
        let clock = FakeClock::at(0);
        let selection = ButtonDebouncer::new(200);
        let mut app = app(&clock, &selection);

        let cycle = block_on(app.run_once());
        assert_eq!(
            cycle,
            Cycle {
                fetched: true,
                refreshed: true
            }
        );
        assert_eq!(app.context().prices.gold, 1000.0);
        assert_eq!(app.display().shown, Some((100_000, 6)));
    }

    #[test]
    fn test_fetch_waits_for_interval() {
        let clock = FakeClock::at(1_000);
        let selection = ButtonDebouncer::new(200);
        let mut app = app(&clock, &selection);

        assert!(block_on(app.run_once()).fetched);

        clock.advance(21);
        let cycle = block_on(app.run_once());
        assert!(!cycle.fetched);
        assert!(cycle.refreshed);

        clock.advance(10);
        assert_eq!(block_on(app.run_once()), Cycle::default());

        clock.set(1_000 + 600_001);
        assert!(block_on(app.run_once()).fetched);
        assert_eq!(app.transport_mut().connects.len(), 2);
    }

    #[test]
    fn test_refresh_follows_button_selection() {
        let clock = FakeClock::at(10_000);
        let selection = ButtonDebouncer::new(200);
        let leds = SharedIndicator::new();
        leds.install(fake_leds());
        let mut app = app(&clock, &selection);

        block_on(app.run_once());
        assert_eq!(app.display().shown, Some((100_000, 6)));

        selection.on_press(10_005, &leds);
        clock.advance(25);
        block_on(app.run_once());
        assert_eq!(app.display().shown, Some((2_500, 6)));
    }

    #[test]
    fn test_connect_failure_keeps_previous_prices() {
        let clock = FakeClock::at(0);
        let selection = ButtonDebouncer::new(200);
        let mut app = app(&clock, &selection);

        block_on(app.run_once());
        app.transport_mut().refuse = true;

        clock.advance(600_001);
        assert!(block_on(app.run_once()).fetched);
        assert_eq!(app.context().prices.gold, 1000.0);
        assert_eq!(app.display().shown, Some((100_000, 6)));
    }

    #[test]
    fn test_bad_response_resets_to_unknown() {
        let clock = FakeClock::at(0);
        let selection = ButtonDebouncer::new(200);
        let mut app = app(&clock, &selection);

        block_on(app.run_once());
        app.transport_mut().response = b"{\"gold\":10".to_vec();

        clock.advance(600_001);
        block_on(app.run_once());
        assert_eq!(app.context().prices, PriceReading::UNKNOWN);
        assert_eq!(app.display().shown, Some((-100, 6)));
    }

    #[test]
    fn test_unknown_prices_before_first_fetch_completes() {
        let clock = FakeClock::at(0);
        let selection = ButtonDebouncer::new(200);
        let mut app = App::new(
            Settings::default(),
            Timing::DEFAULT,
            &clock,
            FakeTransport::serving(BODY),
            FakeDisplay::default(),
            FakeDelay::new(&clock),
            &selection,
        );

        // No address configured: fetch fails, display shows the sentinel
        block_on(app.run_once());
        assert_eq!(app.display().shown, Some((-100, 6)));
        assert!(app.transport_mut().connects.is_empty());
    }

    #[test]
    fn test_display_fault_tracked_across_refreshes() {
        let clock = FakeClock::at(0);
        let selection = ButtonDebouncer::new(200);
        let mut app = app(&clock, &selection);

        block_on(app.run_once());
        assert!(!app.display_failing());

        app.display.broken = true;
        for _ in 0..5 {
            clock.advance(21);
            assert!(block_on(app.run_once()).refreshed);
            assert!(app.display_failing());
        }

        app.display.broken = false;
        clock.advance(21);
        block_on(app.run_once());
        assert!(!app.display_failing());
        assert_eq!(app.display().draws, 7);
    }

    #[test]
    fn test_associate_runs_before_loop() {
        struct AlreadyUp;

        impl Association for AlreadyUp {
            type Error = Infallible;

            async fn begin(&mut self, _settings: &Settings) -> Result<(), Self::Error> {
                Ok(())
            }

            fn is_associated(&mut self) -> bool {
                true
            }
        }

        let clock = FakeClock::at(0);
        let selection = ButtonDebouncer::new(200);
        let leds = SharedIndicator::new();
        leds.install(fake_leds());
        let mut app = app(&clock, &selection);

        block_on(app.associate(&mut AlreadyUp, &leds));
        assert!(block_on(app.run_once()).fetched);
    }
}
