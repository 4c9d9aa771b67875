use aurum_core::config::{CONFIG_FILE_NAME, ConfigError};
use aurum_core::Settings;
use embedded_io::ErrorKind;
use embedded_sdmmc::{Mode, SdCard, TimeSource, Timestamp, VolumeIdx, VolumeManager};
use log::warn;

/// The configuration is only ever read, so file timestamps do not matter.
#[derive(Debug, Clone, Copy, Default)]
pub struct BootTime;

impl TimeSource for BootTime {
    fn get_timestamp(&self) -> Timestamp {
        Timestamp {
            year_since_1970: 0,
            zero_indexed_month: 0,
            zero_indexed_day: 0,
            hours: 0,
            minutes: 0,
            seconds: 0,
        }
    }
}

/// Adapts a `read` closure to [`embedded_io::Read`].
struct FnReader<F>(F);

impl<F> embedded_io::ErrorType for FnReader<F> {
    type Error = ErrorKind;
}

impl<F> embedded_io::Read for FnReader<F>
where
    F: FnMut(&mut [u8]) -> Result<usize, ErrorKind>,
{
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        (self.0)(buf)
    }
}

/// Read-only access to the configuration file on the SD card.
///
/// Blocking, like the display on the other SPI bus. It runs once at boot
/// before the main loop starts, so nothing waits on it.
pub struct SdCardStorage<S, D, T>
where
    S: embedded_hal::spi::SpiDevice<u8>,
    D: embedded_hal::delay::DelayNs,
    T: TimeSource,
{
    volume_mgr: VolumeManager<SdCard<S, D>, T, 4, 4, 1>,
}

impl<S, D, T> SdCardStorage<S, D, T>
where
    S: embedded_hal::spi::SpiDevice<u8>,
    D: embedded_hal::delay::DelayNs,
    T: TimeSource,
{
    pub fn new(sd_card: SdCard<S, D>, ts: T) -> Self {
        let volume_mgr = VolumeManager::new(sd_card, ts);

        Self { volume_mgr }
    }

    /// Load [`Settings`] from the config file, or empty settings if anything goes wrong.
    pub fn load_settings(&self) -> Settings {
        self.read_settings().unwrap_or_else(|e| {
            warn!("{}, continuing with empty settings", e);
            Settings::default()
        })
    }

    fn read_settings(&self) -> Result<Settings, ConfigError> {
        let volume0 = self.volume_mgr.open_volume(VolumeIdx(0)).map_err(|e| {
            warn!("Failed to open SD card volume: {:?}", e);
            ConfigError::StorageUnavailable
        })?;

        let root_dir = volume0.open_root_dir().map_err(|e| {
            warn!("Failed to open SD card root directory: {:?}", e);
            ConfigError::StorageUnavailable
        })?;

        let file = root_dir
            .open_file_in_dir(CONFIG_FILE_NAME, Mode::ReadOnly)
            .map_err(|e| {
                warn!("Failed to open {}: {:?}", CONFIG_FILE_NAME, e);
                ConfigError::StorageUnavailable
            })?;

        let mut reader = FnReader(|buf: &mut [u8]| {
            file.read(buf).map_err(|e| {
                warn!("Failed to read {}: {:?}", CONFIG_FILE_NAME, e);
                ErrorKind::Other
            })
        });
        let settings = Settings::from_reader(&mut reader)?;

        // Read-only handles, a failed close loses nothing
        let _ = file.close();
        let _ = root_dir.close();
        let _ = volume0.close();

        Ok(settings)
    }
}

/// Wrap an SPI device and delay into an SD card driver.
pub fn init_sd_card<S, D>(sd_card_spi: S, delay: D) -> SdCard<S, D>
where
    S: embedded_hal::spi::SpiDevice<u8>,
    D: embedded_hal::delay::DelayNs,
{
    SdCard::new(sd_card_spi, delay)
}
