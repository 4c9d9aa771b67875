//! ESP32-S3 firmware-specific modules for aurum
//!
//! This crate contains hardware-specific code that cannot compile on desktop
//! targets: the button interrupt, Wi-Fi and TCP over esp-radio/embassy-net,
//! SD card access and peripheral bring-up. The logic they feed lives in
//! `aurum_core`.

#![no_std]

extern crate alloc;

pub mod button;
pub mod clock;
pub mod hardware;
pub mod net;
pub mod storage;
