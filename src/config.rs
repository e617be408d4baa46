//! Build-time configuration
//!
//! Sizes that the radio standard or the SoftDevice fix at compile time live
//! here as constants. Everything a product might rebrand (name, UUIDs,
//! timing) is grouped in [`ConsoleConfig`]; SoftDevice memory sizing is in
//! [`StackConfig`].

use crate::ble::profile::Uuid128;
use crate::ble::stack::ConnParams;

/// Largest ATT MTU this device will accept in an MTU exchange.
pub const MAX_MTU: u16 = 128;

/// ATT MTU every link starts with before an exchange (Bluetooth Core, Vol 3, Part F).
pub const DEFAULT_ATT_MTU: u16 = 23;

/// Opcode + attribute handle prefixed to every notification or write.
pub const ATT_HEADER_LEN: u16 = 3;

/// Largest characteristic value that fits a single PDU at [`MAX_MTU`].
pub const MAX_ATT_PAYLOAD: usize = (MAX_MTU - ATT_HEADER_LEN) as usize;

/// Legacy advertising data ceiling.
pub const MAX_ADV_DATA_LEN: usize = 31;

/// Console ring buffer length. The extra 45 bytes let a `bytearray(256)` repr
/// be printed in one go.
pub const CONSOLE_BUFFER_LEN: usize = 1024 + 45;

/// Connection configuration tag the SoftDevice was configured with.
pub const CONN_CFG_TAG: u8 = 1;

/// Console service identity and link timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConsoleConfig {
    /// GAP device name, also placed in the advertising payload.
    pub device_name: &'static str,
    /// Primary service UUID (advertised).
    pub service_uuid: Uuid128,
    /// Characteristic the peer writes console input to.
    pub rx_uuid: Uuid128,
    /// Characteristic console output is notified on.
    pub tx_uuid: Uuid128,
    /// Advertising interval in 0.625 ms units.
    pub adv_interval: u32,
    /// Preferred connection parameters requested on every new link.
    pub conn_params: ConnParams,
}

impl ConsoleConfig {
    pub const fn new() -> Self {
        Self {
            device_name: "Console",
            service_uuid: Uuid128::from_u128(0x6E400001_B5A3_F393_E0A9_E50E24DCCA9E),
            rx_uuid: Uuid128::from_u128(0x6E400002_B5A3_F393_E0A9_E50E24DCCA9E),
            tx_uuid: Uuid128::from_u128(0x6E400003_B5A3_F393_E0A9_E50E24DCCA9E),
            adv_interval: (20 * 1000) / 625, // 20ms
            conn_params: ConnParams {
                min_conn_interval: (15 * 1000) / 1250, // 15ms
                max_conn_interval: (15 * 1000) / 1250, // 15ms
                slave_latency: 3,
                conn_sup_timeout: 200, // 2s
            },
        }
    }

    /// Override the advertised device name.
    pub const fn with_device_name(mut self, name: &'static str) -> Self {
        self.device_name = name;
        self
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Low frequency clock source for the SoftDevice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LfClockSource {
    /// External 32.768 kHz crystal, 20 ppm.
    Xtal,
    /// Internal RC oscillator, calibrated every 4 s.
    Rc,
}

/// SoftDevice memory and queue sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StackConfig {
    pub lf_clock: LfClockSource,
    pub conn_count: u8,
    /// Connection event length in 1.25 ms units.
    pub event_length: u16,
    pub att_mtu: u16,
    /// Notifications the SoftDevice may queue per connection.
    pub hvn_tx_queue_size: u8,
    pub vs_uuid_count: u8,
    pub attr_tab_size: u32,
    pub service_changed: bool,
    /// Run the radio from the DC/DC regulator instead of the LDO.
    pub dcdc: bool,
}

impl StackConfig {
    pub const fn new() -> Self {
        Self {
            lf_clock: LfClockSource::Xtal,
            conn_count: 1,
            event_length: 3,
            att_mtu: MAX_MTU,
            hvn_tx_queue_size: 1,
            vs_uuid_count: 1,
            attr_tab_size: 1408,
            service_changed: false,
            dcdc: true,
        }
    }
}

impl Default for StackConfig {
    fn default() -> Self {
        Self::new()
    }
}
