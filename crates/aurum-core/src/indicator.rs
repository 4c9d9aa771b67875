//! Selection / status LED pair

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embedded_hal::digital::OutputPin;

use crate::selection::Metal;

/// Something that can show the current selection or a blink phase.
pub trait Indicator {
    /// Steady state: the LED for `metal` on, the other off.
    fn show_selection(&mut self, metal: Metal);

    /// Association-in-progress phase: both LEDs follow `on`.
    fn set_blink(&mut self, on: bool);
}

/// Two LEDs, one per metal.
pub struct LedPair<G, S> {
    gold: G,
    silver: S,
}

impl<G: OutputPin, S: OutputPin> LedPair<G, S> {
    pub const fn new(gold: G, silver: S) -> Self {
        Self { gold, silver }
    }

    pub fn pins(&self) -> (&G, &S) {
        (&self.gold, &self.silver)
    }

    pub fn release(self) -> (G, S) {
        (self.gold, self.silver)
    }
}

fn drive<P: OutputPin>(pin: &mut P, on: bool) {
    // GPIO writes on the supported targets are infallible
    let _ = if on { pin.set_high() } else { pin.set_low() };
}

impl<G: OutputPin, S: OutputPin> Indicator for LedPair<G, S> {
    fn show_selection(&mut self, metal: Metal) {
        drive(&mut self.gold, metal == Metal::Gold);
        drive(&mut self.silver, metal == Metal::Silver);
    }

    fn set_blink(&mut self, on: bool) {
        drive(&mut self.gold, on);
        drive(&mut self.silver, on);
    }
}

/// An [`Indicator`] reachable from both the main loop and the button interrupt.
///
/// Starts empty so it can live in a `static`; the hardware is moved in with
/// [`SharedIndicator::install`] once the pins exist. Every access happens
/// inside a critical section.
pub struct SharedIndicator<I> {
    inner: Mutex<CriticalSectionRawMutex, RefCell<Option<I>>>,
}

impl<I> Default for SharedIndicator<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I> SharedIndicator<I> {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(None)),
        }
    }

    pub fn install(&self, indicator: I) {
        self.inner.lock(|cell| {
            cell.borrow_mut().replace(indicator);
        });
    }

    /// Run `f` against the installed indicator. Returns `None` before [`SharedIndicator::install`].
    pub fn with<R>(&self, f: impl FnOnce(&mut I) -> R) -> Option<R> {
        self.inner.lock(|cell| cell.borrow_mut().as_mut().map(f))
    }
}

impl<I: Indicator> SharedIndicator<I> {
    pub fn show_selection(&self, metal: Metal) {
        self.with(|indicator| indicator.show_selection(metal));
    }

    pub fn set_blink(&self, on: bool) {
        self.with(|indicator| indicator.set_blink(on));
    }
}
