#![cfg_attr(not(test), no_std)]

//! nRF52820 S140 BLE Console Library
//!
//! Carries an interactive console byte stream over a GATT service, organized
//! into layers:
//!
//! - `core`: ring buffers and the [`Transport`] context
//! - `ble`: GAP/GATT behaviour behind the [`Stack`] seam
//! - `softdevice`: the S140 binding (feature `firmware`)

// This must go FIRST so that all the other modules see its macros.
pub(crate) mod fmt;

pub mod ble;
pub mod config;
pub mod core;
#[cfg(feature = "firmware")]
pub mod softdevice;

pub use crate::ble::events::{BleEvent, EventSource, SocEvent};
pub use crate::ble::stack::{ConnHandle, Stack, StackError};
pub use crate::config::ConsoleConfig;
pub use crate::core::transport::{InitError, Transport};
