//! Common test utilities for host-side tests
//!
//! - `MockStack`: records every radio stack call, with scripted failures
//! - `ScriptedEvents`: an `EventSource` fed from queues built in the test
//! - helpers to bring up a console transport on the mock

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use nrf52_ble_console::ble::profile::{CharacteristicDef, Uuid128};
use nrf52_ble_console::ble::stack::{
    AdvHandle, AdvParams, CharacteristicHandles, ConnHandle, ConnParams, DisconnectReason, Phy, SecurityReply, Stack,
    StackError,
};
use nrf52_ble_console::{BleEvent, ConsoleConfig, EventSource, SocEvent, Transport};

pub const SERVICE_HANDLE: u16 = 0x000C;
pub const RX_VALUE_HANDLE: u16 = 0x000E;
pub const TX_VALUE_HANDLE: u16 = 0x0010;
pub const TX_CCCD_HANDLE: u16 = 0x0011;
pub const ADV_HANDLE: AdvHandle = AdvHandle(0);

/// One recorded stack call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    SetDeviceName(String),
    SetPreferredConnParams(ConnParams),
    PreferredConnParams,
    AddPrimaryService(Uuid128),
    AddCharacteristic { service: u16, def: CharacteristicDef },
    ConfigureAdvertising { data: Vec<u8>, params: AdvParams },
    StartAdvertising(AdvHandle),
    UpdateConnParams(ConnHandle, ConnParams),
    UpdatePhy(ConnHandle, Phy, Phy),
    ReplyMtuExchange(ConnHandle, u16),
    ReplySecurityParams(ConnHandle, SecurityReply),
    SetSystemAttributes(ConnHandle, Option<Vec<u8>>),
    Disconnect(ConnHandle, DisconnectReason),
    Notify(ConnHandle, u16, Vec<u8>),
}

/// Stack operation names, for failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    SetDeviceName,
    AddCharacteristic,
    StartAdvertising,
    UpdateConnParams,
    ReplyMtuExchange,
}

#[derive(Default)]
pub struct MockStack {
    calls: Mutex<Vec<Call>>,
    ppcp: Mutex<Option<ConnParams>>,
    next_handle: Mutex<u16>,
    /// Results handed out by `notify` in order; `Ok` once exhausted
    notify_results: Mutex<VecDeque<Result<(), StackError>>>,
    failures: Mutex<Vec<(Op, StackError)>>,
}

impl MockStack {
    pub fn new() -> Self {
        Self {
            next_handle: Mutex::new(SERVICE_HANDLE),
            ..Default::default()
        }
    }

    /// Make every call to `op` fail with `err`.
    pub fn fail(&self, op: Op, err: StackError) {
        self.failures.lock().unwrap().push((op, err));
    }

    pub fn queue_notify_results(&self, results: &[Result<(), StackError>]) {
        self.notify_results.lock().unwrap().extend(results.iter().copied());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Payloads of every notify call, including rejected attempts.
    pub fn notify_attempts(&self) -> Vec<Vec<u8>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Notify(_, _, data) => Some(data),
                _ => None,
            })
            .collect()
    }

    pub fn advertising_starts(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::StartAdvertising(_)))
            .count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn check(&self, op: Op) -> Result<(), StackError> {
        match self.failures.lock().unwrap().iter().find(|(failing, _)| *failing == op) {
            Some((_, err)) => Err(*err),
            None => Ok(()),
        }
    }

    fn allocate(&self, count: u16) -> u16 {
        let mut next = self.next_handle.lock().unwrap();
        let first = *next;
        *next += count;
        first
    }
}

impl Stack for MockStack {
    fn set_device_name(&self, name: &str) -> Result<(), StackError> {
        self.record(Call::SetDeviceName(name.to_string()));
        self.check(Op::SetDeviceName)
    }

    fn set_preferred_conn_params(&self, params: &ConnParams) -> Result<(), StackError> {
        self.record(Call::SetPreferredConnParams(*params));
        *self.ppcp.lock().unwrap() = Some(*params);
        Ok(())
    }

    fn preferred_conn_params(&self) -> Result<ConnParams, StackError> {
        self.record(Call::PreferredConnParams);
        self.ppcp.lock().unwrap().ok_or(StackError::InvalidState)
    }

    fn add_primary_service(&self, uuid: &Uuid128) -> Result<u16, StackError> {
        self.record(Call::AddPrimaryService(*uuid));
        Ok(self.allocate(1))
    }

    fn add_characteristic(
        &self,
        service_handle: u16,
        characteristic: &CharacteristicDef,
    ) -> Result<CharacteristicHandles, StackError> {
        self.record(Call::AddCharacteristic {
            service: service_handle,
            def: *characteristic,
        });
        self.check(Op::AddCharacteristic)?;

        // Declaration, value and (for notify) CCCD
        if characteristic.properties.notify {
            let decl = self.allocate(3);
            Ok(CharacteristicHandles {
                value_handle: decl + 1,
                cccd_handle: decl + 2,
            })
        } else {
            let decl = self.allocate(2);
            Ok(CharacteristicHandles {
                value_handle: decl + 1,
                cccd_handle: 0,
            })
        }
    }

    fn configure_advertising(&self, adv_data: &[u8], params: &AdvParams) -> Result<AdvHandle, StackError> {
        self.record(Call::ConfigureAdvertising {
            data: adv_data.to_vec(),
            params: *params,
        });
        Ok(ADV_HANDLE)
    }

    fn start_advertising(&self, handle: AdvHandle) -> Result<(), StackError> {
        self.record(Call::StartAdvertising(handle));
        self.check(Op::StartAdvertising)
    }

    fn update_conn_params(&self, conn: ConnHandle, params: &ConnParams) -> Result<(), StackError> {
        self.record(Call::UpdateConnParams(conn, *params));
        self.check(Op::UpdateConnParams)
    }

    fn update_phy(&self, conn: ConnHandle, tx: Phy, rx: Phy) -> Result<(), StackError> {
        self.record(Call::UpdatePhy(conn, tx, rx));
        Ok(())
    }

    fn reply_mtu_exchange(&self, conn: ConnHandle, server_rx_mtu: u16) -> Result<(), StackError> {
        self.record(Call::ReplyMtuExchange(conn, server_rx_mtu));
        self.check(Op::ReplyMtuExchange)
    }

    fn reply_security_params(&self, conn: ConnHandle, reply: SecurityReply) -> Result<(), StackError> {
        self.record(Call::ReplySecurityParams(conn, reply));
        Ok(())
    }

    fn set_system_attributes(&self, conn: ConnHandle, data: Option<&[u8]>) -> Result<(), StackError> {
        self.record(Call::SetSystemAttributes(conn, data.map(<[u8]>::to_vec)));
        Ok(())
    }

    fn disconnect(&self, conn: ConnHandle, reason: DisconnectReason) -> Result<(), StackError> {
        self.record(Call::Disconnect(conn, reason));
        Ok(())
    }

    fn notify(&self, conn: ConnHandle, value_handle: u16, data: &[u8]) -> Result<(), StackError> {
        self.record(Call::Notify(conn, value_handle, data.to_vec()));
        self.notify_results.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}

enum Scripted {
    Event(BleEvent<'static>),
    Write { conn: ConnHandle, handle: u16, data: Vec<u8> },
}

/// Event queues filled by the test, drained by `Transport::pump`.
#[derive(Default)]
pub struct ScriptedEvents {
    soc: VecDeque<SocEvent>,
    ble: VecDeque<Result<Scripted, StackError>>,
    current: Option<Scripted>,
}

impl ScriptedEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn soc(mut self, event: SocEvent) -> Self {
        self.soc.push_back(event);
        self
    }

    pub fn event(mut self, event: BleEvent<'static>) -> Self {
        self.ble.push_back(Ok(Scripted::Event(event)));
        self
    }

    pub fn connect(self, conn: u16) -> Self {
        self.event(BleEvent::Connected { conn: ConnHandle(conn) })
    }

    pub fn disconnect(self, conn: u16) -> Self {
        self.event(BleEvent::Disconnected {
            conn: ConnHandle(conn),
            reason: 0x13,
        })
    }

    pub fn mtu_request(self, conn: u16, client_mtu: u16) -> Self {
        self.event(BleEvent::ExchangeMtuRequest {
            conn: ConnHandle(conn),
            client_mtu,
        })
    }

    pub fn write(mut self, conn: u16, handle: u16, data: &[u8]) -> Self {
        self.ble.push_back(Ok(Scripted::Write {
            conn: ConnHandle(conn),
            handle,
            data: data.to_vec(),
        }));
        self
    }

    /// The queue read fails at this point.
    pub fn error(mut self, err: StackError) -> Self {
        self.ble.push_back(Err(err));
        self
    }

    pub fn remaining(&self) -> usize {
        self.soc.len() + self.ble.len()
    }
}

impl EventSource for ScriptedEvents {
    fn next_soc_event(&mut self) -> Result<Option<SocEvent>, StackError> {
        Ok(self.soc.pop_front())
    }

    fn next_ble_event(&mut self) -> Result<Option<BleEvent<'_>>, StackError> {
        self.current = match self.ble.pop_front() {
            Some(Ok(event)) => Some(event),
            Some(Err(err)) => return Err(err),
            None => None,
        };

        Ok(self.current.as_ref().map(|scripted| match scripted {
            Scripted::Event(event) => *event,
            Scripted::Write { conn, handle, data } => BleEvent::Write {
                conn: *conn,
                handle: *handle,
                data: data.as_slice(),
            },
        }))
    }
}

/// A console transport on a fresh mock, registered but not yet advertising.
pub fn new_console() -> Transport<MockStack> {
    Transport::new(MockStack::new(), ConsoleConfig::default()).unwrap()
}

/// A console transport that is advertising.
pub fn advertising_console() -> Transport<MockStack> {
    let console = new_console();
    console.start().unwrap();
    console
}

/// A console transport with a peer connected on `conn`, call log cleared.
pub fn connected_console(conn: u16) -> Transport<MockStack> {
    let console = advertising_console();
    console.pump(&mut ScriptedEvents::new().connect(conn)).unwrap();
    console.stack().clear_calls();
    console
}

/// Run `pump` over a script and return how many events were handled.
pub fn pump(console: &Transport<MockStack>, events: ScriptedEvents) -> usize {
    let mut events = events;
    console.pump(&mut events).unwrap()
}
