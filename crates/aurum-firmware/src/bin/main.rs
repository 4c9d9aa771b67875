#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use aurum_core::display::NumericLcd;
use aurum_core::{App, Timing};
use aurum_firmware::clock::EmbassyClock;
use aurum_firmware::net::{NetTransport, WifiAssociation, net_task};
use aurum_firmware::storage::{BootTime, SdCardStorage, init_sd_card};
use aurum_firmware::{button, hardware};
use embassy_executor::Spawner;
use embassy_net::StackResources;
use embedded_graphics::prelude::Point;
use esp_hal::clock::CpuClock;
use esp_hal::gpio::{Io, Level, Output, OutputConfig};
use esp_hal::rng::Rng;
use esp_hal::timer::timg::TimerGroup;
use esp_radio::Controller;
use log::info;

// Display-LCD panel specific imports
use embedded_hal_bus::spi::ExclusiveDevice;
use esp_hal::spi::master::{Config, Spi};
use mipidsi::interface::SpiInterface;
use mipidsi::{Builder as MipidsiBuilder, models::ILI9342CRgb565};

macro_rules! mk_static {
    ($t:ty,$val:expr) => {{
        static STATIC_CELL: static_cell::StaticCell<$t> = static_cell::StaticCell::new();
        #[deny(unused_attributes)]
        let x = STATIC_CELL.uninit().write(($val));
        x
    }};
}

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    loop {}
}

extern crate alloc;

esp_bootloader_esp_idf::esp_app_desc!();

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    rtt_target::rtt_init_log!();

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    // esp-radio keeps its buffers on the heap
    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 73744);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    info!("Embassy initialized");

    // Selection button and LEDs come first so presses work during association
    button::LEDS.install(hardware::status_leds(peripherals.GPIO9, peripherals.GPIO8));
    let mut io = Io::new(peripherals.IO_MUX);
    button::install(&mut io, hardware::selection_button(peripherals.GPIO17));

    // Configuration from the SD card
    let sd_spi = Spi::new(
        peripherals.SPI3,
        Config::default().with_frequency(hardware::SD_CARD_SPI_RATE),
    )
    .expect("SPI3 configuration rejected")
    .with_sck(peripherals.GPIO5)
    .with_mosi(peripherals.GPIO6)
    .with_miso(peripherals.GPIO7);
    let sd_cs = Output::new(peripherals.GPIO18, Level::High, OutputConfig::default());
    let sd_device = ExclusiveDevice::new(sd_spi, sd_cs, embassy_time::Delay)
        .expect("SD card chip select unavailable");
    let storage = SdCardStorage::new(init_sd_card(sd_device, embassy_time::Delay), BootTime);
    let settings = storage.load_settings();
    info!(
        "Settings loaded: ssid={:?} address={:?}",
        settings.ssid.as_str(),
        settings.address.as_str()
    );

    // Display power, then the panel itself
    let i2c = hardware::create_i2c_bus(peripherals.I2C0, peripherals.GPIO12, peripherals.GPIO11);
    let _power = hardware::power_up_display(i2c).await;

    let spi_bus = Spi::new(peripherals.SPI2, Config::default())
        .expect("SPI2 configuration rejected")
        .with_sck(peripherals.GPIO36)
        .with_mosi(peripherals.GPIO37);
    let cs = Output::new(peripherals.GPIO35, Level::High, OutputConfig::default());
    let spi_device =
        ExclusiveDevice::new_no_delay(spi_bus, cs).expect("LCD chip select unavailable");
    let dc = Output::new(peripherals.GPIO34, Level::Low, OutputConfig::default());

    let spi_buffer = mk_static!([u8; 64], [0u8; 64]);
    let di = SpiInterface::new(spi_device, dc, spi_buffer);

    let panel = MipidsiBuilder::new(ILI9342CRgb565, di)
        .display_size(hardware::DISPLAY_WIDTH, hardware::DISPLAY_HEIGHT)
        .init(&mut embassy_time::Delay)
        .expect("Failed to initialize display");
    let lcd = NumericLcd::new(panel, Point::new(100, 110));

    info!("Display initialized");

    // Wi-Fi and the network stack
    let radio = &*mk_static!(
        Controller<'static>,
        esp_radio::init().expect("Failed to initialize Wi-Fi/BLE controller")
    );
    let (wifi_controller, interfaces) =
        esp_radio::wifi::new(radio, peripherals.WIFI, Default::default())
            .expect("Failed to initialize Wi-Fi controller");

    let rng = Rng::new();
    let seed = (u64::from(rng.random()) << 32) | u64::from(rng.random());
    let (stack, runner) = embassy_net::new(
        interfaces.sta,
        embassy_net::Config::dhcpv4(Default::default()),
        mk_static!(StackResources<3>, StackResources::<3>::new()),
        seed,
    );
    spawner
        .spawn(net_task(runner))
        .expect("Failed to spawn network task");

    let mut association = WifiAssociation::new(wifi_controller, stack);
    let mut app = App::new(
        settings,
        Timing::DEFAULT,
        EmbassyClock,
        NetTransport::new(stack),
        lcd,
        embassy_time::Delay,
        &button::SELECTION,
    );

    app.associate(&mut association, &button::LEDS).await;
    app.run().await
}
