//! Periodic event bookkeeping for the cooperative main loop

use crate::clock::{Tick, elapsed_since};

/// A periodic action's timing state.
///
/// The action itself lives with the caller: the main loop asks each event
/// whether it is due and runs the matching step when it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledEvent {
    /// Tick of the last firing, `None` until the event fires for the first time.
    last_fired: Option<Tick>,
    interval_ms: u32,
}

impl ScheduledEvent {
    /// Create an event that has never fired and is therefore immediately due.
    pub const fn new(interval_ms: u32) -> Self {
        Self {
            last_fired: None,
            interval_ms,
        }
    }

    pub const fn interval_ms(&self) -> u32 {
        self.interval_ms
    }

    pub const fn last_fired(&self) -> Option<Tick> {
        self.last_fired
    }

    /// Check whether the event is due at `now`, and if so record it as fired.
    ///
    /// A late evaluation fires once: missed intervals are not replayed.
    pub fn poll(&mut self, now: Tick) -> bool {
        let due = match self.last_fired {
            None => true,
            Some(mark) => elapsed_since(now, mark, self.interval_ms),
        };

        if due {
            self.last_fired = Some(now);
        }

        due
    }
}
