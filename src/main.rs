#![no_std]
#![no_main]

use defmt::*;
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_nrf::{config::Config, interrupt};
use nrf52_ble_console::config::{ConsoleConfig, StackConfig};
use nrf52_ble_console::softdevice::{self, SoftdeviceEvents, SoftdeviceStack};
use nrf52_ble_console::Transport;
use panic_probe as _;
use static_cell::StaticCell;

type Console = Transport<SoftdeviceStack>;

static CONSOLE: StaticCell<Console> = StaticCell::new();

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Starting nRF52820 BLE console");

    // Configure nRF peripherals
    let mut nrf_config = Config::default();
    // Configure interrupt priorities to avoid SoftDevice reserved levels (0, 1, 4)
    nrf_config.gpiote_interrupt_priority = interrupt::Priority::P2;
    nrf_config.time_interrupt_priority = interrupt::Priority::P2;

    let _peripherals = embassy_nrf::init(nrf_config);

    let sd = softdevice::enable(&StackConfig::default());
    unwrap!(softdevice::enable_event_wakeup());
    info!("SoftDevice enabled");

    let console: &'static Console = CONSOLE.init(unwrap!(Transport::new(
        SoftdeviceStack::new(sd),
        ConsoleConfig::default()
    )));
    unwrap!(console.start());

    spawner.spawn(unwrap!(event_task(console)));
    spawner.spawn(unwrap!(console_task(console)));
}

/// Drain SoftDevice events into the console after every radio event.
#[embassy_executor::task]
async fn event_task(console: &'static Console) -> ! {
    let mut events = SoftdeviceEvents::new();

    loop {
        unwrap!(console.pump(&mut events));
        softdevice::wait_for_events().await;
    }
}

/// Echo console input back to the peer.
#[embassy_executor::task]
async fn console_task(console: &'static Console) -> ! {
    unwrap!(console.write_bytes(b"\r\nBLE console ready\r\n").await);

    loop {
        let byte = unwrap!(console.read_byte().await);
        if byte == b'\r' {
            unwrap!(console.write_bytes(b"\r\n").await);
        } else {
            unwrap!(console.write_bytes(&[byte]).await);
        }
    }
}
