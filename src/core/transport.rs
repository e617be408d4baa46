//! Console Transport
//!
//! Owns everything the BLE console needs: the stack binding, the two console
//! ring buffers, the connection state and the counters. Application code uses
//! [`read_byte`](Transport::read_byte), [`write_bytes`](Transport::write_bytes)
//! and [`has_pending_input`](Transport::has_pending_input); the event handler
//! feeds it through [`pump`](Transport::pump).
//!
//! `rx` is produced by the event handler and consumed by `read_byte`. `tx` is
//! produced by `write_bytes` and consumed by `flush`, both on the application
//! side.

use embassy_futures::yield_now;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

use crate::ble::advertising::{self, AdvertisingError};
use crate::ble::connection::{ConnectionState, LinkState};
use crate::ble::profile::{self, ProfileHandles};
use crate::ble::stack::{AdvHandle, ConnHandle, Stack, StackError};
use crate::config::{ConsoleConfig, CONSOLE_BUFFER_LEN};
use crate::core::ring::RingBuffer;
use crate::core::stats::{Stats, StatsSnapshot};

/// Console byte ring of the standard size
pub type ConsoleBuffer = RingBuffer<CONSOLE_BUFFER_LEN>;

/// Transport bring-up errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InitError {
    /// Advertising data does not fit; nothing was sent to the stack.
    Advertising(AdvertisingError),
    /// The stack rejected part of the setup.
    Stack(StackError),
}

impl From<AdvertisingError> for InitError {
    fn from(err: AdvertisingError) -> Self {
        InitError::Advertising(err)
    }
}

impl From<StackError> for InitError {
    fn from(err: StackError) -> Self {
        InitError::Stack(err)
    }
}

pub struct Transport<S: Stack> {
    pub(crate) stack: S,
    pub(crate) config: ConsoleConfig,
    pub(crate) handles: ProfileHandles,
    pub(crate) adv_handle: AdvHandle,
    pub(crate) connection: ConnectionState,
    pub(crate) rx: ConsoleBuffer,
    pub(crate) tx: ConsoleBuffer,
    /// Raised after every event drain that handled something
    pub(crate) activity: Signal<CriticalSectionRawMutex, ()>,
    pub(crate) stats: Stats,
}

impl<S: Stack> Transport<S> {
    /// Set up GAP, register the console profile and configure advertising.
    ///
    /// The advertising payload is assembled before the stack is touched, so
    /// a device name that cannot fit fails here with no side effects.
    /// Advertising itself begins with [`start`](Self::start).
    pub fn new(stack: S, config: ConsoleConfig) -> Result<Self, InitError> {
        let payload = advertising::console_payload(&config)?;

        stack.set_device_name(config.device_name)?;
        stack.set_preferred_conn_params(&config.conn_params)?;

        let handles = profile::register(&stack, &config)?;
        let adv_handle = stack.configure_advertising(payload.as_bytes(), &advertising::console_params(&config))?;

        info!(
            "Console transport ready: name={} adv_len={}",
            config.device_name,
            payload.len()
        );

        Ok(Self {
            stack,
            config,
            handles,
            adv_handle,
            connection: ConnectionState::new(),
            rx: ConsoleBuffer::new(),
            tx: ConsoleBuffer::new(),
            activity: Signal::new(),
            stats: Stats::new(),
        })
    }

    /// Begin advertising.
    pub fn start(&self) -> Result<(), StackError> {
        self.advertise()
    }

    /// Next console input byte.
    ///
    /// While no input is queued, buffered output is flushed a chunk at a
    /// time. Once both directions are idle the task sleeps until the event
    /// handler reports activity.
    pub async fn read_byte(&self) -> Result<u8, StackError> {
        loop {
            if let Some(byte) = self.rx.pop() {
                return Ok(byte);
            }

            self.flush()?;

            if self.tx.is_empty() && self.rx.is_empty() {
                self.activity.wait().await;
            } else {
                yield_now().await;
            }
        }
    }

    /// Queue console output, flushing whenever the buffer is full.
    ///
    /// Yields after every flush so the event handler keeps running during
    /// long writes.
    pub async fn write_bytes(&self, data: &[u8]) -> Result<(), StackError> {
        for &byte in data {
            let mut pending = byte;
            while let Err(rejected) = self.tx.push(pending) {
                pending = rejected;
                self.flush()?;
                yield_now().await;
            }
        }
        Ok(())
    }

    /// True when at least one input byte is waiting.
    pub fn has_pending_input(&self) -> bool {
        !self.rx.is_empty()
    }

    pub fn stack(&self) -> &S {
        &self.stack
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    pub fn handles(&self) -> &ProfileHandles {
        &self.handles
    }

    pub fn link_state(&self) -> LinkState {
        self.connection.state()
    }

    pub fn connection(&self) -> Option<ConnHandle> {
        self.connection.handle()
    }

    /// Notification payload size on the current link.
    pub fn payload_len(&self) -> usize {
        self.connection.payload_len()
    }

    /// Bytes waiting to be notified.
    pub fn pending_output(&self) -> usize {
        self.tx.len()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}
