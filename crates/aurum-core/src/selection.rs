//! Which price is on the display, toggled from the button interrupt
//!
//! The button handler is the only preemptive code in the system. It writes
//! [`SelectionState`] and the selection LEDs and nothing else; the main loop
//! only ever reads the selection back.

use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

use crate::clock::{Tick, elapsed_since};
use crate::indicator::{Indicator, SharedIndicator};
use crate::response::PriceReading;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Metal {
    #[default]
    Gold,
    Silver,
}

impl Metal {
    pub const fn toggled(self) -> Self {
        match self {
            Self::Gold => Self::Silver,
            Self::Silver => Self::Gold,
        }
    }

    /// The price for this metal out of `reading`.
    pub const fn price(self, reading: &PriceReading) -> f64 {
        match self {
            Self::Gold => reading.gold,
            Self::Silver => reading.silver,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Gold => "gold",
            Self::Silver => "silver",
        }
    }
}

/// Current selection and when it last changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionState {
    pub selected: Metal,
    pub last_toggle: Tick,
}

/// Debounced toggle driven by rising edges on the button line.
///
/// Both fields of [`SelectionState`] are read and written together under a
/// critical section, so the main loop never sees half an update. Meant to be
/// placed in a `static` shared with the interrupt handler.
pub struct ButtonDebouncer {
    window_ms: u32,
    state: Mutex<CriticalSectionRawMutex, Cell<SelectionState>>,
}

impl ButtonDebouncer {
    pub const fn new(window_ms: u32) -> Self {
        Self {
            window_ms,
            state: Mutex::new(Cell::new(SelectionState {
                selected: Metal::Gold,
                last_toggle: 0,
            })),
        }
    }

    pub fn snapshot(&self) -> SelectionState {
        self.state.lock(Cell::get)
    }

    pub fn selected(&self) -> Metal {
        self.snapshot().selected
    }

    /// Handle one rising edge at `now`.
    ///
    /// Outside the ignore window (or after the tick counter wrapped) the
    /// selection flips and the LEDs follow it. Inside the window nothing
    /// changes, not even the timestamp. Returns whether a toggle happened.
    ///
    /// Interrupt-safe: no blocking, no allocation.
    pub fn on_press<I: Indicator>(&self, now: Tick, indicator: &SharedIndicator<I>) -> bool {
        let toggled = self.state.lock(|cell| {
            let current = cell.get();
            if !elapsed_since(now, current.last_toggle, self.window_ms) {
                return None;
            }

            let selected = current.selected.toggled();
            cell.set(SelectionState {
                selected,
                last_toggle: now,
            });
            Some(selected)
        });

        match toggled {
            Some(selected) => {
                indicator.show_selection(selected);
                true
            }
            None => false,
        }
    }
}
