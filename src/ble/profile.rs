//! GATT Console Profile
//!
//! One primary service carrying two characteristics: the peer writes console
//! input to `rx`, console output is notified on `tx`.

use crate::ble::stack::{CharacteristicHandles, Stack, StackError};
use crate::config::{ConsoleConfig, MAX_ATT_PAYLOAD};

/// 128-bit UUID stored little-endian, the byte order used on air and by the
/// stack's vendor UUID table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Uuid128([u8; 16]);

impl Uuid128 {
    /// Build from the canonical big-endian form, e.g.
    /// `0x6E400001_B5A3_F393_E0A9_E50E24DCCA9E`.
    pub const fn from_u128(uuid: u128) -> Self {
        Self(uuid.to_le_bytes())
    }

    pub const fn as_le_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Bytes 12 and 13 (little-endian), the 16-bit alias of a UUID inside its
    /// vendor base.
    pub const fn short(&self) -> u16 {
        u16::from_le_bytes([self.0[12], self.0[13]])
    }
}

/// Characteristic properties
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Properties {
    pub read: bool,
    pub write: bool,
    pub write_without_response: bool,
    pub notify: bool,
}

impl Properties {
    pub const fn new() -> Self {
        Self {
            read: false,
            write: false,
            write_without_response: false,
            notify: false,
        }
    }

    pub const fn write(mut self) -> Self {
        self.write = true;
        self
    }

    pub const fn write_without_response(mut self) -> Self {
        self.write_without_response = true;
        self
    }

    pub const fn notify(mut self) -> Self {
        self.notify = true;
        self
    }
}

/// Everything the stack needs to add one characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CharacteristicDef {
    pub uuid: Uuid128,
    pub properties: Properties,
    /// Largest value the attribute accepts.
    pub max_len: u16,
    /// Length may be anything in `1..=max_len`.
    pub variable_len: bool,
}

impl CharacteristicDef {
    /// Console inbound characteristic: the peer writes with or without response.
    pub const fn console_rx(uuid: Uuid128) -> Self {
        Self {
            uuid,
            properties: Properties::new().write().write_without_response(),
            max_len: MAX_ATT_PAYLOAD as u16,
            variable_len: true,
        }
    }

    /// Console outbound characteristic: notify only.
    pub const fn console_tx(uuid: Uuid128) -> Self {
        Self {
            uuid,
            properties: Properties::new().notify(),
            max_len: MAX_ATT_PAYLOAD as u16,
            variable_len: true,
        }
    }
}

/// Attribute handles assigned to the console profile at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ProfileHandles {
    pub service: u16,
    pub rx: CharacteristicHandles,
    pub tx: CharacteristicHandles,
}

/// Register the console service and both characteristics.
pub fn register<S: Stack>(stack: &S, config: &ConsoleConfig) -> Result<ProfileHandles, StackError> {
    let service = stack.add_primary_service(&config.service_uuid)?;
    let rx = stack.add_characteristic(service, &CharacteristicDef::console_rx(config.rx_uuid))?;
    let tx = stack.add_characteristic(service, &CharacteristicDef::console_tx(config.tx_uuid))?;

    info!(
        "Console service registered: service={} rx={} tx={} tx_cccd={}",
        service, rx.value_handle, tx.value_handle, tx.cccd_handle
    );

    Ok(ProfileHandles { service, rx, tx })
}
