//! Startup configuration: `KEY=VALUE` parsing and tunable timing
//!
//! The configuration file is read once at boot from the SD card. Each line
//! is `KEY=VALUE`; only printable ASCII survives, everything else is dropped
//! on the floor. Keys and values are bounded and silently truncated.

use embedded_io::Read;
use heapless::String;
use log::{debug, info, warn};
use thiserror_no_std::Error;

/// Name of the configuration file at the root of the storage volume (FAT 8.3).
pub const CONFIG_FILE_NAME: &str = "CONFIG.TXT";

/// Maximum stored key length in bytes
pub const KEY_CAPACITY: usize = 16;
/// Maximum stored value length in bytes
pub const VALUE_CAPACITY: usize = 64;

const KEY_SSID: &str = "SSID";
const KEY_PASSWORD: &str = "PWD";
const KEY_ADDRESS: &str = "ADDRESS";

const READ_CHUNK: usize = 32;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Configuration storage unavailable")]
    StorageUnavailable,
    #[error("Configuration file could not be read")]
    Read,
}

/// A single `KEY=VALUE` line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigEntry {
    key: String<KEY_CAPACITY>,
    value: String<VALUE_CAPACITY>,
}

impl ConfigEntry {
    pub fn key(&self) -> &str {
        self.key.as_str()
    }

    pub fn value(&self) -> &str {
        self.value.as_str()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Key,
    Value,
}

/// Byte-at-a-time line parser.
///
/// Feed bytes with [`ConfigParser::feed`]; a completed entry is handed back at
/// every line terminator. Call [`ConfigParser::finish`] at end of stream to
/// flush a final unterminated line.
#[derive(Debug)]
pub struct ConfigParser {
    entry: ConfigEntry,
    field: Field,
    line_started: bool,
}

impl Default for ConfigParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigParser {
    pub const fn new() -> Self {
        Self {
            entry: ConfigEntry {
                key: String::new(),
                value: String::new(),
            },
            field: Field::Key,
            line_started: false,
        }
    }

    /// Consume one byte, returning the finished entry when `byte` ends a line.
    pub fn feed(&mut self, byte: u8) -> Option<ConfigEntry> {
        if byte == b'\n' {
            return Some(self.take());
        }

        self.line_started = true;

        match (byte, self.field) {
            (b'=', Field::Key) => self.field = Field::Value,
            (0x20..=0x7E, Field::Key) => {
                // Overflow is truncation
                let _ = self.entry.key.push(byte as char);
            }
            (0x20..=0x7E, Field::Value) => {
                let _ = self.entry.value.push(byte as char);
            }
            _ => {}
        }

        None
    }

    /// Flush a trailing line that had no terminator.
    pub fn finish(&mut self) -> Option<ConfigEntry> {
        if self.line_started {
            Some(self.take())
        } else {
            None
        }
    }

    fn take(&mut self) -> ConfigEntry {
        self.field = Field::Key;
        self.line_started = false;
        core::mem::take(&mut self.entry)
    }
}

/// Run the whole of `reader` through a [`ConfigParser`], handing each entry to `on_entry`.
///
/// Entries seen before a read error have already been delivered when the
/// error is returned.
pub fn parse_config<R, F>(reader: &mut R, mut on_entry: F) -> Result<(), ConfigError>
where
    R: Read,
    F: FnMut(ConfigEntry),
{
    let mut parser = ConfigParser::new();
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        let n = reader.read(&mut chunk).map_err(|_| ConfigError::Read)?;
        if n == 0 {
            break;
        }

        for &byte in &chunk[..n] {
            if let Some(entry) = parser.feed(byte) {
                on_entry(entry);
            }
        }
    }

    if let Some(entry) = parser.finish() {
        on_entry(entry);
    }

    Ok(())
}

/// Network and endpoint settings populated from the configuration file.
///
/// Anything absent stays an empty string. Empty credentials never associate
/// and an empty address never connects; neither is treated as fatal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    /// Wireless network name (`SSID`)
    pub ssid: String<VALUE_CAPACITY>,
    /// Wireless network secret (`PWD`)
    pub password: String<VALUE_CAPACITY>,
    /// Price API host (`ADDRESS`)
    pub address: String<VALUE_CAPACITY>,
}

impl Settings {
    /// Copy `entry` into the matching setting. Returns false for unrecognised keys.
    pub fn apply(&mut self, entry: &ConfigEntry) -> bool {
        let target = match entry.key() {
            KEY_SSID => &mut self.ssid,
            KEY_PASSWORD => &mut self.password,
            KEY_ADDRESS => &mut self.address,
            other => {
                debug!("Ignoring unknown config key '{}'", other);
                return false;
            }
        };

        target.clear();
        // Same capacity on both sides, cannot overflow
        let _ = target.push_str(entry.value());
        true
    }

    /// Parse settings out of a configuration stream.
    pub fn from_reader<R: Read>(reader: &mut R) -> Result<Self, ConfigError> {
        let mut settings = Self::default();
        parse_config(reader, |entry| {
            settings.apply(&entry);
        })?;
        Ok(settings)
    }

    /// Parse settings, degrading to empty settings when the stream is unreadable.
    pub fn load<R: Read>(reader: &mut R) -> Self {
        match Self::from_reader(reader) {
            Ok(settings) => {
                info!(
                    "Configuration loaded: ssid='{}' address='{}'",
                    settings.ssid, settings.address
                );
                settings
            }
            Err(e) => {
                warn!("{}, continuing with empty settings", e);
                Self::default()
            }
        }
    }
}

/// Loop timing knobs. [`Timing::DEFAULT`] carries the appliance's production values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Interval between price fetches
    pub fetch_interval_ms: u32,
    /// Interval between display refreshes
    pub refresh_interval_ms: u32,
    /// Status LED toggle period while associating
    pub blink_interval_ms: u32,
    /// Button presses closer together than this are ignored
    pub debounce_window_ms: u32,
    /// Idle pause between main loop iterations
    pub loop_pause_ms: u32,
    /// Pause between association status polls
    pub association_poll_ms: u32,
}

impl Timing {
    pub const DEFAULT: Self = Self {
        fetch_interval_ms: 600_000,
        refresh_interval_ms: 20,
        blink_interval_ms: 250,
        debounce_window_ms: 200,
        loop_pause_ms: 10,
        association_poll_ms: 10,
    };
}

impl Default for Timing {
    fn default() -> Self {
        Self::DEFAULT
    }
}
