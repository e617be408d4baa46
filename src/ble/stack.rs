//! Radio Stack Interface
//!
//! Every call the console transport makes into the BLE stack goes through
//! [`Stack`]. The firmware implements it on top of the SoftDevice; tests
//! implement it with a recording mock.

use crate::ble::profile::{CharacteristicDef, Uuid128};

/// Connection handle assigned by the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnHandle(pub u16);

impl ConnHandle {
    /// Raw value the stack uses for "no connection" (`BLE_CONN_HANDLE_INVALID`).
    pub const INVALID_RAW: u16 = 0xFFFF;

    pub const fn raw(self) -> u16 {
        self.0
    }
}

/// Advertising set handle returned when advertising is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdvHandle(pub u8);

/// Handles of one registered characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CharacteristicHandles {
    pub value_handle: u16,
    /// Zero when the characteristic has no CCCD.
    pub cccd_handle: u16,
}

/// Connection parameters (matches SoftDevice `ble_gap_conn_params_t`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnParams {
    pub min_conn_interval: u16, // Connection interval minimum (1.25ms units)
    pub max_conn_interval: u16, // Connection interval maximum (1.25ms units)
    pub slave_latency: u16,     // Slave latency
    pub conn_sup_timeout: u16,  // Connection supervisory timeout (10ms units)
}

/// Advertising PDU type and timing, fixed for the lifetime of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdvParams {
    pub connectable: bool,
    pub scannable: bool,
    /// Interval in 0.625 ms units.
    pub interval: u32,
    pub primary_phy: Phy,
    pub secondary_phy: Phy,
}

/// PHY preference when answering an update request or advertising.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phy {
    /// Let the controller pick.
    Auto,
    M1,
    M2,
    Coded,
}

/// Status returned to a peer's security parameters request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SecurityReply {
    PairingNotSupported,
}

/// HCI reason code sent with a local disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DisconnectReason {
    RemoteUserTerminated,
}

impl DisconnectReason {
    pub const fn hci_code(self) -> u8 {
        match self {
            DisconnectReason::RemoteUserTerminated => 0x13,
        }
    }
}

/// Radio stack errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StackError {
    /// Out of queue space or buffers; retry later.
    Resources,
    /// Operation not valid in the current state (e.g. not connected,
    /// notifications disabled).
    InvalidState,
    /// The connection handle does not name a live connection.
    InvalidConnHandle,
    /// A parameter was rejected.
    InvalidParam,
    /// Any other error, with the stack's raw code.
    Other(u32),
}

/// Operations the console transport needs from the BLE stack.
///
/// Methods take `&self`: the transport calls them both from thread mode and
/// from the event handler, so implementations must be reentrant.
pub trait Stack {
    /// Set the GAP device name (open write permission).
    fn set_device_name(&self, name: &str) -> Result<(), StackError>;

    /// Store the peripheral preferred connection parameters.
    fn set_preferred_conn_params(&self, params: &ConnParams) -> Result<(), StackError>;

    /// Read back the peripheral preferred connection parameters.
    fn preferred_conn_params(&self) -> Result<ConnParams, StackError>;

    /// Register a primary service and return its handle.
    fn add_primary_service(&self, uuid: &Uuid128) -> Result<u16, StackError>;

    /// Add a characteristic to a previously registered service.
    fn add_characteristic(
        &self,
        service_handle: u16,
        characteristic: &CharacteristicDef,
    ) -> Result<CharacteristicHandles, StackError>;

    /// Configure (or reconfigure) the advertising set.
    fn configure_advertising(&self, adv_data: &[u8], params: &AdvParams) -> Result<AdvHandle, StackError>;

    fn start_advertising(&self, handle: AdvHandle) -> Result<(), StackError>;

    fn update_conn_params(&self, conn: ConnHandle, params: &ConnParams) -> Result<(), StackError>;

    fn update_phy(&self, conn: ConnHandle, tx: Phy, rx: Phy) -> Result<(), StackError>;

    fn reply_mtu_exchange(&self, conn: ConnHandle, server_rx_mtu: u16) -> Result<(), StackError>;

    fn reply_security_params(&self, conn: ConnHandle, reply: SecurityReply) -> Result<(), StackError>;

    /// Restore system attributes (CCCD state). `None` sets an empty set.
    fn set_system_attributes(&self, conn: ConnHandle, data: Option<&[u8]>) -> Result<(), StackError>;

    fn disconnect(&self, conn: ConnHandle, reason: DisconnectReason) -> Result<(), StackError>;

    /// Queue one notification of `data` on `value_handle`.
    fn notify(&self, conn: ConnHandle, value_handle: u16, data: &[u8]) -> Result<(), StackError>;
}
