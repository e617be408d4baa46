//! BLE Event Dispatch
//!
//! The radio stack queues two kinds of events: SoC events (power, flash) and
//! BLE events (GAP/GATT). [`Transport::pump`] drains both queues to
//! exhaustion, routes each event to the connection handlers or the inbound
//! console buffer, then wakes any reader waiting on the console.

use crate::ble::stack::{ConnHandle, Stack, StackError};
use crate::core::transport::Transport;

/// System-on-chip events. Only flash completion is recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SocEvent {
    FlashOperationSuccess,
    FlashOperationError,
    Other(u32),
}

/// BLE events the console reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BleEvent<'a> {
    Connected {
        conn: ConnHandle,
    },
    Disconnected {
        conn: ConnHandle,
        reason: u8,
    },
    PhyUpdateRequest {
        conn: ConnHandle,
    },
    ExchangeMtuRequest {
        conn: ConnHandle,
        client_mtu: u16,
    },
    /// A peer wrote `data` to the attribute at `handle`.
    Write {
        conn: ConnHandle,
        handle: u16,
        data: &'a [u8],
    },
    GattcTimeout {
        conn: ConnHandle,
    },
    GattsTimeout {
        conn: ConnHandle,
    },
    SysAttrMissing {
        conn: ConnHandle,
    },
    SecParamsRequest {
        conn: ConnHandle,
    },
    /// Anything else, by raw event id.
    Other(u16),
}

/// A pair of stack event queues.
///
/// Each call returns the next queued event, or `None` once the queue is
/// empty. A BLE event may borrow from the source's own buffer until the next
/// call.
pub trait EventSource {
    fn next_soc_event(&mut self) -> Result<Option<SocEvent>, StackError>;

    fn next_ble_event(&mut self) -> Result<Option<BleEvent<'_>>, StackError>;
}

impl<S: Stack> Transport<S> {
    /// Drain both event queues, SoC first. Returns the number of events
    /// handled. Stops at the first fatal stack error.
    pub fn pump<E: EventSource>(&self, source: &mut E) -> Result<usize, StackError> {
        let mut handled = 0;

        while let Some(event) = source.next_soc_event()? {
            self.dispatch_soc(event);
            handled += 1;
        }

        while let Some(event) = source.next_ble_event()? {
            if let Err(err) = self.dispatch(event) {
                error!("BLE event handler failed: {:?}", err);
                return Err(err);
            }
            handled += 1;
        }

        if handled > 0 {
            self.activity.signal(());
        }
        Ok(handled)
    }

    fn dispatch_soc(&self, event: SocEvent) {
        match event {
            // Nothing writes flash yet
            SocEvent::FlashOperationSuccess | SocEvent::FlashOperationError => {
                trace!("Flash event: {:?}", event);
            }
            SocEvent::Other(_) => {}
        }
    }

    /// Route one BLE event.
    pub fn dispatch(&self, event: BleEvent<'_>) -> Result<(), StackError> {
        match event {
            BleEvent::Connected { conn } => self.on_connected(conn),
            BleEvent::Disconnected { conn, reason } => self.on_disconnected(conn, reason),
            BleEvent::PhyUpdateRequest { conn } => self.on_phy_update_request(conn),
            BleEvent::ExchangeMtuRequest { conn, client_mtu } => self.on_mtu_exchange_request(conn, client_mtu),
            BleEvent::Write { handle, data, .. } => {
                if handle == self.handles.rx.value_handle {
                    self.receive(data);
                } else {
                    trace!("Ignoring write to handle {}", handle);
                }
                Ok(())
            }
            BleEvent::GattcTimeout { conn } | BleEvent::GattsTimeout { conn } => self.on_timeout(conn),
            BleEvent::SysAttrMissing { conn } => self.on_system_attributes_missing(conn),
            BleEvent::SecParamsRequest { conn } => self.on_security_request(conn),
            BleEvent::Other(id) => {
                trace!("Unhandled BLE event {}", id);
                Ok(())
            }
        }
    }

    /// Queue inbound bytes for the console. Whatever does not fit is lost.
    fn receive(&self, data: &[u8]) {
        let accepted = self.rx.push_slice(data);
        let dropped = data.len() - accepted;
        self.stats.record_rx(accepted, dropped);

        if dropped > 0 {
            warn!("Console input full, dropped {} of {} bytes", dropped, data.len());
        }
    }
}
