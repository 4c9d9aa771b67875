//! Desktop simulator for the aurum price display.
//!
//! Runs the aurum-core main loop on the host against the real price API.
//! TCP goes through `std::net` and the configuration comes from a local file.
//! The core's `NumericLcd` renders into an SDL2 window via
//! `embedded-graphics-simulator`, with the two selection LEDs drawn below it.
//!
//! # Usage
//!
//! ```text
//! aurum-simulator [CONFIG.TXT]
//! ```
//!
//! # Key bindings
//!
//! | Key           | Action                     |
//! |---------------|----------------------------|
//! | Space / Enter | Selection button press     |
//! | Q / Esc       | Quit                       |
//!
//! Mouse clicks also count as button presses. Events are handled during the
//! loop's idle pause, so the window stalls while a fetch is in flight.
//!
//! | Variable                  | Effect                              |
//! |---------------------------|-------------------------------------|
//! | `RUST_LOG`                | Log filter (default `info`)         |
//! | `AURUM_FETCH_INTERVAL_MS` | Override the 10 minute fetch period |

use core::convert::Infallible;
use std::cell::RefCell;
use std::fs::File;
use std::io::{self, Read as _, Write as _};
use std::net::TcpStream;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use aurum_core::config::CONFIG_FILE_NAME;
use aurum_core::display::{DISPLAY_DIGITS, NumericLcd};
use aurum_core::{
    App, Association, ButtonDebouncer, Clock, LedPair, Settings, SharedIndicator, Tick, Timing,
    Transport,
};
use embassy_futures::block_on;
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{Circle, PrimitiveStyle};
use embedded_graphics_simulator::{
    OutputSettingsBuilder, SimulatorDisplay, SimulatorEvent, Window, sdl2::Keycode,
};
use embedded_hal::digital::{ErrorType, OutputPin};
use embedded_hal_async::delay::DelayNs;
use embedded_io::ErrorKind;
use log::{debug, info, warn};

// ---------------------------------------------------------------------------
// Display constants
// ---------------------------------------------------------------------------

const DISPLAY_WIDTH: u32 = 320;
const DISPLAY_HEIGHT: u32 = 240;

/// Pixel scale factor for the simulator window.
const WINDOW_SCALE: u32 = 2;

const LED_DIAMETER: u32 = 24;
const GOLD_LED_AT: Point = Point::new(110, 180);
const SILVER_LED_AT: Point = Point::new(186, 180);

/// How long the fake radio takes to join a network
const SIMULATED_ASSOCIATION: Duration = Duration::from_millis(1500);

static SELECTION: ButtonDebouncer = ButtonDebouncer::new(Timing::DEFAULT.debounce_window_ms);
static LEDS: SharedIndicator<LedPair<SimLed, SimLed>> = SharedIndicator::new();

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// Milliseconds since the simulator started.
#[derive(Debug, Clone, Copy)]
struct HostClock {
    start: Instant,
}

impl HostClock {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Clock for HostClock {
    fn now_ms(&self) -> Tick {
        // Truncation is the wraparound
        self.start.elapsed().as_millis() as Tick
    }
}

// ---------------------------------------------------------------------------
// Storage and network
// ---------------------------------------------------------------------------

struct FileReader(File);

impl embedded_io::ErrorType for FileReader {
    type Error = ErrorKind;
}

impl embedded_io::Read for FileReader {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.0.read(buf).map_err(|_| ErrorKind::Other)
    }
}

fn load_settings(path: &str) -> Settings {
    match File::open(path) {
        Ok(file) => Settings::load(&mut FileReader(file)),
        Err(e) => {
            warn!("Cannot open {}: {}, continuing with empty settings", path, e);
            Settings::default()
        }
    }
}

/// Blocking TCP connection exposed through the async I/O traits.
struct HostConnection(TcpStream);

impl embedded_io_async::ErrorType for HostConnection {
    type Error = ErrorKind;
}

impl embedded_io_async::Read for HostConnection {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.0.read(buf).map_err(|e| {
            debug!("TCP read failed: {}", e);
            ErrorKind::Other
        })
    }
}

impl embedded_io_async::Write for HostConnection {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.0.write(buf).map_err(|e| {
            debug!("TCP write failed: {}", e);
            ErrorKind::Other
        })
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        self.0.flush().map_err(|_| ErrorKind::Other)
    }
}

struct HostTransport;

impl Transport for HostTransport {
    type Error = io::Error;
    type Connection<'a>
        = HostConnection
    where
        Self: 'a;

    async fn connect(&mut self, host: &str, port: u16) -> Result<Self::Connection<'_>, Self::Error> {
        TcpStream::connect((host, port)).map(HostConnection)
    }
}

/// Pretends to join the configured network after a short delay.
///
/// Like a real radio, an empty network name never associates.
struct SimulatedRadio {
    joined_at: Option<Instant>,
}

impl Association for SimulatedRadio {
    type Error = &'static str;

    async fn begin(&mut self, settings: &Settings) -> Result<(), Self::Error> {
        if settings.ssid.is_empty() {
            return Err("empty network name");
        }
        self.joined_at = Some(Instant::now() + SIMULATED_ASSOCIATION);
        Ok(())
    }

    fn is_associated(&mut self) -> bool {
        self.joined_at.is_some_and(|at| Instant::now() >= at)
    }
}

// ---------------------------------------------------------------------------
// Display, LEDs and button
// ---------------------------------------------------------------------------

/// Framebuffer shared by the digit renderer and the window pump.
#[derive(Clone)]
struct Canvas(Rc<RefCell<SimulatorDisplay<Rgb565>>>);

impl Canvas {
    fn new() -> Self {
        let mut display = SimulatorDisplay::new(Size::new(DISPLAY_WIDTH, DISPLAY_HEIGHT));
        let _ = display.clear(Rgb565::BLACK);
        Self(Rc::new(RefCell::new(display)))
    }
}

impl OriginDimensions for Canvas {
    fn size(&self) -> Size {
        self.0.borrow().size()
    }
}

impl DrawTarget for Canvas {
    type Color = Rgb565;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        self.0.borrow_mut().draw_iter(pixels)
    }
}

/// Output pin standing in for one LED; the window pump draws its level.
struct SimLed {
    name: &'static str,
    lit: bool,
}

impl SimLed {
    const fn new(name: &'static str) -> Self {
        Self { name, lit: false }
    }

    fn set(&mut self, lit: bool) {
        if self.lit != lit {
            debug!("LED {} {}", self.name, if lit { "on" } else { "off" });
            self.lit = lit;
        }
    }
}

impl ErrorType for SimLed {
    type Error = Infallible;
}

impl OutputPin for SimLed {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.set(true);
        Ok(())
    }
}

fn draw_led(canvas: &mut Canvas, at: Point, lit: bool, color: Rgb565) {
    let fill = if lit { color } else { Rgb565::CSS_DIM_GRAY };
    let _ = Circle::new(at, LED_DIAMETER)
        .into_styled(PrimitiveStyle::with_fill(fill))
        .draw(canvas);
}

/// The loop's idle pause: sleeps, then presents the frame and handles input.
///
/// SDL events are only serviced from here, so key presses reach the
/// debouncer at the same points a real interrupt would be noticed by the
/// main loop.
struct WindowDelay {
    canvas: Canvas,
    window: Window,
    clock: HostClock,
}

impl WindowDelay {
    fn pump(&mut self) {
        let (gold, silver) = LEDS
            .with(|leds| {
                let (gold, silver) = leds.pins();
                (gold.lit, silver.lit)
            })
            .unwrap_or_default();
        draw_led(&mut self.canvas, GOLD_LED_AT, gold, Rgb565::CSS_GOLD);
        draw_led(&mut self.canvas, SILVER_LED_AT, silver, Rgb565::CSS_SILVER);

        // The SDL window is created on the first update, before events() may be called
        self.window.update(&self.canvas.0.borrow());

        for event in self.window.events() {
            match event {
                SimulatorEvent::Quit => quit(),
                SimulatorEvent::KeyDown { keycode, .. } => match keycode {
                    Keycode::Q | Keycode::Escape => quit(),
                    Keycode::Space | Keycode::Return => press_button(self.clock),
                    _ => {}
                },
                SimulatorEvent::MouseButtonDown { .. } => press_button(self.clock),
                _ => {}
            }
        }
    }
}

impl DelayNs for WindowDelay {
    async fn delay_ns(&mut self, ns: u32) {
        thread::sleep(Duration::from_nanos(u64::from(ns)));
        self.pump();
    }
}

fn press_button(clock: HostClock) {
    if SELECTION.on_press(clock.now_ms(), &LEDS) {
        info!("Showing {}", SELECTION.selected().label());
    } else {
        debug!("Button press ignored (debounce)");
    }
}

fn quit() -> ! {
    info!("Simulator exiting");
    std::process::exit(0)
}

fn timing_from_env() -> Timing {
    let mut timing = Timing::DEFAULT;
    if let Ok(raw) = std::env::var("AURUM_FETCH_INTERVAL_MS") {
        match raw.parse() {
            Ok(ms) => timing.fetch_interval_ms = ms,
            Err(_) => warn!("Ignoring AURUM_FETCH_INTERVAL_MS={}", raw),
        }
    }
    timing
}

/// Top-left corner that centres the digits on the screen.
fn digits_origin() -> Point {
    let cell = NumericLcd::<Canvas>::CELL;
    let width = cell.width * u32::from(DISPLAY_DIGITS);
    Point::new(
        ((DISPLAY_WIDTH - width) / 2) as i32,
        ((DISPLAY_HEIGHT - cell.height) / 2) as i32,
    )
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| CONFIG_FILE_NAME.into());
    let settings = load_settings(&config_path);
    let timing = timing_from_env();
    let clock = HostClock::new();

    LEDS.install(LedPair::new(SimLed::new("gold"), SimLed::new("silver")));

    let canvas = Canvas::new();
    let output_settings = OutputSettingsBuilder::new().scale(WINDOW_SCALE).build();
    let delay = WindowDelay {
        canvas: canvas.clone(),
        window: Window::new("aurum", &output_settings),
        clock,
    };

    info!(
        "aurum simulator started: {}×{} (scale {}×)",
        DISPLAY_WIDTH, DISPLAY_HEIGHT, WINDOW_SCALE
    );
    info!("Keys: Space/Enter=button  Q=Quit");

    let mut radio = SimulatedRadio { joined_at: None };
    let mut app = App::new(
        settings,
        timing,
        clock,
        HostTransport,
        NumericLcd::new(canvas, digits_origin()),
        delay,
        &SELECTION,
    );

    block_on(async {
        app.associate(&mut radio, &LEDS).await;
        app.run().await;
    });
}
