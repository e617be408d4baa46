//! BLE Advertising Payload
//!
//! Legacy advertising data is a sequence of `[len, type, data...]` records
//! capped at 31 bytes. The console advertises, in order: flags, the complete
//! local name and the complete list of 128-bit service UUIDs.
//!
//! [`AdvertisementBuilder`] is `const`, so a payload built into a `static`
//! that overflows fails compilation. At runtime [`AdvertisementBuilder::try_build`]
//! reports the overflow instead; nothing is ever truncated.

use crate::ble::profile::Uuid128;
use crate::ble::stack::{AdvParams, Phy};
use crate::config::{ConsoleConfig, MAX_ADV_DATA_LEN};

/// AD type codes (Bluetooth Assigned Numbers, Common Data Types)
pub mod ad_type {
    pub const FLAGS: u8 = 0x01;
    pub const COMPLETE_LIST_128_BIT_SERVICE_UUIDS: u8 = 0x07;
    pub const COMPLETE_LOCAL_NAME: u8 = 0x09;
}

/// Bits of the flags record
pub mod flags {
    pub const LE_GENERAL_DISCOVERABLE: u8 = 0x02;
    pub const BR_EDR_NOT_SUPPORTED: u8 = 0x04;
}

/// Advertising payload errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdvertisingError {
    /// The records would need `len` bytes, more than the legacy ceiling.
    PayloadTooLarge { len: usize },
}

/// Finished advertising data, at most [`MAX_ADV_DATA_LEN`] bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvertisementPayload {
    buf: [u8; MAX_ADV_DATA_LEN],
    len: usize,
}

impl AdvertisementPayload {
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Appends records in call order. Bytes beyond the ceiling are not written
/// but are still counted, so the final length reports the real requirement.
pub struct AdvertisementBuilder {
    buf: [u8; MAX_ADV_DATA_LEN],
    len: usize,
}

impl AdvertisementBuilder {
    pub const fn new() -> Self {
        Self {
            buf: [0; MAX_ADV_DATA_LEN],
            len: 0,
        }
    }

    const fn put(mut self, byte: u8) -> Self {
        if self.len < MAX_ADV_DATA_LEN {
            self.buf[self.len] = byte;
        }
        self.len += 1;
        self
    }

    const fn header(self, ad_type: u8, data_len: usize) -> Self {
        // A record longer than 255 can never fit, the count below still overflows the ceiling
        let record_len = if data_len < u8::MAX as usize { data_len as u8 + 1 } else { u8::MAX };
        self.put(record_len).put(ad_type)
    }

    pub const fn flags(self, flags: u8) -> Self {
        self.header(ad_type::FLAGS, 1).put(flags)
    }

    pub const fn full_name(self, name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut builder = self.header(ad_type::COMPLETE_LOCAL_NAME, bytes.len());
        let mut i = 0;
        while i < bytes.len() {
            builder = builder.put(bytes[i]);
            i += 1;
        }
        builder
    }

    pub const fn services_128(self, uuids: &[Uuid128]) -> Self {
        let mut builder = self.header(ad_type::COMPLETE_LIST_128_BIT_SERVICE_UUIDS, uuids.len() * 16);
        let mut i = 0;
        while i < uuids.len() {
            let bytes = uuids[i].as_le_bytes();
            let mut j = 0;
            while j < bytes.len() {
                builder = builder.put(bytes[j]);
                j += 1;
            }
            i += 1;
        }
        builder
    }

    /// Bytes the records need, which may exceed the ceiling.
    pub const fn required_len(&self) -> usize {
        self.len
    }

    /// Finish the payload, panicking on overflow. In a `const` or `static`
    /// initializer the panic is a compile error.
    pub const fn build(self) -> AdvertisementPayload {
        if self.len > MAX_ADV_DATA_LEN {
            panic!("advertising payload exceeds 31 bytes");
        }
        AdvertisementPayload {
            buf: self.buf,
            len: self.len,
        }
    }

    pub const fn try_build(self) -> Result<AdvertisementPayload, AdvertisingError> {
        if self.len > MAX_ADV_DATA_LEN {
            return Err(AdvertisingError::PayloadTooLarge { len: self.len });
        }
        Ok(AdvertisementPayload {
            buf: self.buf,
            len: self.len,
        })
    }
}

impl Default for AdvertisementBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Console advertising data: discoverable, BLE only, name and service UUID.
pub fn console_payload(config: &ConsoleConfig) -> Result<AdvertisementPayload, AdvertisingError> {
    let result = AdvertisementBuilder::new()
        .flags(flags::LE_GENERAL_DISCOVERABLE | flags::BR_EDR_NOT_SUPPORTED)
        .full_name(config.device_name)
        .services_128(&[config.service_uuid])
        .try_build();

    if let Err(AdvertisingError::PayloadTooLarge { len }) = result {
        error!("Advertising payload needs {} bytes, limit is {}", len, MAX_ADV_DATA_LEN);
    }
    result
}

/// Connectable and scannable undirected advertising at the configured
/// interval, PHY left to the controller.
pub const fn console_params(config: &ConsoleConfig) -> AdvParams {
    AdvParams {
        connectable: true,
        scannable: true,
        interval: config.adv_interval,
        primary_phy: Phy::Auto,
        secondary_phy: Phy::Auto,
    }
}
