//! Peripheral bring-up for the aurum board
//!
//! Pin assignments:
//!
//! | Function          | Pins                                  |
//! |-------------------|---------------------------------------|
//! | AXP2101 (I2C0)    | SDA GPIO12, SCL GPIO11                |
//! | LCD (SPI2)        | SCK GPIO36, MOSI GPIO37, CS GPIO35, DC GPIO34 |
//! | SD card (SPI3)    | SCK GPIO5, MOSI GPIO6, MISO GPIO7, CS GPIO18  |
//! | Selection button  | GPIO17, active high                   |
//! | Gold / silver LED | GPIO9 / GPIO8                         |

use axp2101_embedded::AsyncAxp2101;
use esp_hal::gpio::{Input, InputConfig, Level, Output, OutputConfig, Pull};
use esp_hal::i2c::master::Config as I2cConfig;
use esp_hal::time::Rate;
use log::{info, warn};

use crate::button::StatusLeds;
use aurum_core::LedPair;

pub const DISPLAY_WIDTH: u16 = 320;
pub const DISPLAY_HEIGHT: u16 = 240;

/// SD cards must be initialised at 400 kHz or below.
pub const SD_CARD_SPI_RATE: Rate = Rate::from_khz(400);

pub type PowerManagement = AsyncAxp2101<esp_hal::i2c::master::I2c<'static, esp_hal::Async>>;

/// Create the I2C bus the PMIC hangs off.
pub fn create_i2c_bus(
    i2c0: esp_hal::peripherals::I2C0<'static>,
    sda: esp_hal::peripherals::GPIO12<'static>,
    scl: esp_hal::peripherals::GPIO11<'static>,
) -> esp_hal::i2c::master::I2c<'static, esp_hal::Async> {
    esp_hal::i2c::master::I2c::new(
        i2c0,
        I2cConfig::default().with_frequency(Rate::from_khz(400)),
    )
    .expect("I2C0 configuration rejected")
    .with_sda(sda)
    .with_scl(scl)
    .into_async()
}

/// Bring up the AXP2101 and switch on every LDO, with ALDO4 at the LCD voltage.
///
/// The bootloader may already have done this, so a failure is only logged.
pub async fn power_up_display(
    i2c: esp_hal::i2c::master::I2c<'static, esp_hal::Async>,
) -> PowerManagement {
    let mut pmic = AsyncAxp2101::new(i2c);

    let result = async {
        pmic.init().await?;
        pmic.enable_aldo1().await?;
        pmic.enable_aldo2().await?;
        pmic.enable_aldo3().await?;
        pmic.enable_aldo4().await?;
        pmic.enable_bldo1().await?;
        pmic.enable_bldo2().await?;
        pmic.enable_dldo1().await?;
        // LCD supply, millivolts
        pmic.set_aldo4_voltage(3300).await
    }
    .await;

    match result {
        Ok(()) => info!("Display power rails enabled"),
        Err(e) => warn!("PMIC configuration skipped: {:?}", e),
    }

    pmic
}

/// Both LEDs start dark until the association loop takes over.
pub fn status_leds(
    gold: esp_hal::peripherals::GPIO9<'static>,
    silver: esp_hal::peripherals::GPIO8<'static>,
) -> StatusLeds {
    LedPair::new(
        Output::new(gold, Level::Low, OutputConfig::default()),
        Output::new(silver, Level::Low, OutputConfig::default()),
    )
}

/// The button pulls the line high when pressed.
pub fn selection_button(pin: esp_hal::peripherals::GPIO17<'static>) -> Input<'static> {
    Input::new(pin, InputConfig::default().with_pull(Pull::Down))
}
