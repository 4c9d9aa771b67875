//! Selection button interrupt and the state it shares with the main loop
//!
//! The GPIO interrupt handler is the only code that runs preemptively. It
//! touches [`SELECTION`] and [`LEDS`] and nothing else.

use core::cell::RefCell;

use aurum_core::{ButtonDebouncer, Clock, LedPair, SharedIndicator, Timing};
use critical_section::Mutex;
use esp_hal::gpio::{Event, Input, Io, Output};
use esp_hal::handler;

use crate::clock::EmbassyClock;

/// The two selection LEDs, also used as the association blinker.
pub type StatusLeds = LedPair<Output<'static>, Output<'static>>;

/// Current selection, written only by [`button_handler`].
pub static SELECTION: ButtonDebouncer = ButtonDebouncer::new(Timing::DEFAULT.debounce_window_ms);

/// LED pair shared between the handler and the association loop.
pub static LEDS: SharedIndicator<StatusLeds> = SharedIndicator::new();

static BUTTON: Mutex<RefCell<Option<Input<'static>>>> = Mutex::new(RefCell::new(None));

/// Route GPIO interrupts to [`button_handler`] and arm `button` for rising edges.
pub fn install(io: &mut Io<'_>, mut button: Input<'static>) {
    io.set_interrupt_handler(button_handler);

    critical_section::with(|cs| {
        button.listen(Event::RisingEdge);
        BUTTON.borrow_ref_mut(cs).replace(button);
    });
}

#[handler]
#[esp_hal::ram]
fn button_handler() {
    let pressed = critical_section::with(|cs| {
        let mut button = BUTTON.borrow_ref_mut(cs);
        let Some(button) = button.as_mut() else {
            return false;
        };

        if !button.is_interrupt_set() {
            return false;
        }

        button.clear_interrupt();
        true
    });

    if pressed {
        SELECTION.on_press(EmbassyClock.now_ms(), &LEDS);
    }
}
