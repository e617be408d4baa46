//! Connection Management
//!
//! Tracks the single peripheral link and reacts to the GAP/GATT procedures a
//! central drives on it: parameter negotiation, PHY and MTU exchange,
//! timeouts and the security request we always refuse.

use core::sync::atomic::{AtomicU16, AtomicU8, Ordering};

use crate::ble::stack::{ConnHandle, DisconnectReason, Phy, SecurityReply, Stack, StackError};
use crate::config::{ATT_HEADER_LEN, DEFAULT_ATT_MTU, MAX_MTU};
use crate::core::transport::Transport;

/// Link lifecycle as seen by the console
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum LinkState {
    /// Profile registered, advertising not started yet
    Idle = 0,
    Advertising = 1,
    Connected = 2,
    /// Link dropped; advertising restart pending
    Disconnected = 3,
}

impl LinkState {
    const fn from_u8(value: u8) -> Self {
        match value {
            1 => LinkState::Advertising,
            2 => LinkState::Connected,
            3 => LinkState::Disconnected,
            _ => LinkState::Idle,
        }
    }
}

/// Payload bytes per notification for a link whose peer offered `peer_mtu`.
///
/// The effective MTU is the smaller of both sides, never below the link
/// default; the ATT header comes off the top.
pub const fn negotiate_payload_len(local_mtu: u16, peer_mtu: u16) -> u16 {
    let peer = if peer_mtu < DEFAULT_ATT_MTU { DEFAULT_ATT_MTU } else { peer_mtu };
    let mtu = if local_mtu < peer { local_mtu } else { peer };
    mtu - ATT_HEADER_LEN
}

/// Connection handle, link state and negotiated payload size, shared between
/// the event handler and the console.
pub struct ConnectionState {
    handle: AtomicU16,
    state: AtomicU8,
    payload_len: AtomicU16,
}

impl ConnectionState {
    pub const fn new() -> Self {
        Self {
            handle: AtomicU16::new(ConnHandle::INVALID_RAW),
            state: AtomicU8::new(LinkState::Idle as u8),
            payload_len: AtomicU16::new(DEFAULT_ATT_MTU - ATT_HEADER_LEN),
        }
    }

    /// Current connection, `None` when no peer is connected.
    pub fn handle(&self) -> Option<ConnHandle> {
        match self.handle.load(Ordering::Acquire) {
            ConnHandle::INVALID_RAW => None,
            raw => Some(ConnHandle(raw)),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.handle().is_some()
    }

    pub fn state(&self) -> LinkState {
        LinkState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Bytes that fit in one notification on the current link.
    pub fn payload_len(&self) -> usize {
        self.payload_len.load(Ordering::Acquire) as usize
    }

    pub(crate) fn set_payload_len(&self, len: u16) {
        self.payload_len.store(len, Ordering::Release);
    }

    pub(crate) fn set_state(&self, state: LinkState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub(crate) fn connect(&self, conn: ConnHandle) {
        // Every link starts at the default MTU until the peer exchanges
        self.set_payload_len(DEFAULT_ATT_MTU - ATT_HEADER_LEN);
        self.handle.store(conn.raw(), Ordering::Release);
        self.set_state(LinkState::Connected);
    }

    pub(crate) fn disconnect(&self) {
        self.handle.store(ConnHandle::INVALID_RAW, Ordering::Release);
        self.set_payload_len(DEFAULT_ATT_MTU - ATT_HEADER_LEN);
        self.set_state(LinkState::Disconnected);
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Stack> Transport<S> {
    /// Start (or restart) advertising on the configured set.
    pub(crate) fn advertise(&self) -> Result<(), StackError> {
        self.stack.start_advertising(self.adv_handle)?;
        self.connection.set_state(LinkState::Advertising);
        self.stats.record_advertising_start();
        debug!("Advertising started");
        Ok(())
    }

    pub(crate) fn on_connected(&self, conn: ConnHandle) -> Result<(), StackError> {
        info!("Connected: conn={}", conn.raw());
        self.connection.connect(conn);
        self.stats.record_connection();

        let params = self.stack.preferred_conn_params()?;
        self.stack.update_conn_params(conn, &params)
    }

    pub(crate) fn on_disconnected(&self, conn: ConnHandle, reason: u8) -> Result<(), StackError> {
        info!("Disconnected: conn={} reason={:#x}", conn.raw(), reason);
        self.connection.disconnect();
        self.advertise()
    }

    pub(crate) fn on_phy_update_request(&self, conn: ConnHandle) -> Result<(), StackError> {
        debug!("PHY update requested: conn={}", conn.raw());
        self.stack.update_phy(conn, Phy::Auto, Phy::Auto)
    }

    pub(crate) fn on_mtu_exchange_request(&self, conn: ConnHandle, client_mtu: u16) -> Result<(), StackError> {
        self.stack.reply_mtu_exchange(conn, MAX_MTU)?;

        let payload = negotiate_payload_len(MAX_MTU, client_mtu);
        self.connection.set_payload_len(payload);
        info!("MTU exchanged: client={} payload={}", client_mtu, payload);
        Ok(())
    }

    pub(crate) fn on_security_request(&self, conn: ConnHandle) -> Result<(), StackError> {
        debug!("Security request refused: conn={}", conn.raw());
        self.stack.reply_security_params(conn, SecurityReply::PairingNotSupported)
    }

    pub(crate) fn on_timeout(&self, conn: ConnHandle) -> Result<(), StackError> {
        warn!("GATT timeout, dropping link: conn={}", conn.raw());
        self.stack.disconnect(conn, DisconnectReason::RemoteUserTerminated)
    }

    pub(crate) fn on_system_attributes_missing(&self, conn: ConnHandle) -> Result<(), StackError> {
        self.stack.set_system_attributes(conn, None)
    }
}
