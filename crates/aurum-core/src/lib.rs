//! Hardware-independent core library for aurum
//!
//! This crate contains all platform-agnostic logic for the aurum price
//! display: the millisecond clock and scheduler, the configuration and API
//! response parsers, the debounced selection button, wireless association
//! and the main loop that composes them. Peripherals (network, storage,
//! display, GPIO) are reached through traits implemented by the firmware
//! and simulator crates.
//!
//! It is `#![no_std]` and allocation-free so it compiles on both the
//! ESP32-S3 and desktop hosts (for the simulator and tests).

#![cfg_attr(not(test), no_std)]

pub mod app;
pub mod clock;
pub mod config;
pub mod connection;
pub mod display;
pub mod fetch;
pub mod indicator;
pub mod response;
pub mod scheduler;
pub mod selection;

#[cfg(test)]
mod test_support;

pub use app::{App, AppContext, Cycle};
pub use clock::{Clock, Tick, elapsed_since};
pub use config::{ConfigError, Settings, Timing};
pub use connection::Association;
pub use display::NumericDisplay;
pub use fetch::{FetchError, Transport};
pub use indicator::{Indicator, LedPair, SharedIndicator};
pub use response::PriceReading;
pub use selection::{ButtonDebouncer, Metal};
