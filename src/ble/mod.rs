//! BLE Protocol Implementation
//!
//! GAP and GATT behaviour of the console peripheral. Everything here talks to
//! the radio through the [`stack::Stack`] trait.

pub mod advertising;
pub mod connection;
pub mod events;
pub mod notifications;
pub mod profile;
pub mod stack;
