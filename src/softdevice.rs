//! S140 SoftDevice Binding
//!
//! Implements [`Stack`] and [`EventSource`] directly on the SoftDevice raw
//! API. `nrf-softdevice` is used to enable and configure the SoftDevice (and
//! for its critical-section implementation); event queues are drained here
//! rather than by `Softdevice::run`, so the console sees every GAP/GATTS
//! event itself.
//!
//! The SoftDevice event interrupt (`SWI2_EGU2`) is serviced by
//! nrf-softdevice, so the event task wakes on the radio notification
//! interrupt instead: `SWI1_EGU1`, raised at the end of every radio event.
//! Every GAP/GATT event the console reacts to comes out of one.

use core::mem::{self, MaybeUninit};
use core::ptr;

use embassy_nrf::interrupt;
use embassy_nrf::interrupt::{InterruptExt, Priority};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use nrf_softdevice::{raw, Config as SdConfig, RawError, Softdevice};

use crate::ble::events::{BleEvent, EventSource, SocEvent};
use crate::ble::profile::{CharacteristicDef, Uuid128};
use crate::ble::stack::{
    AdvHandle, AdvParams, CharacteristicHandles, ConnHandle, ConnParams, DisconnectReason, Phy, SecurityReply, Stack,
    StackError,
};
use crate::config::{LfClockSource, StackConfig, CONN_CFG_TAG, MAX_ADV_DATA_LEN, MAX_MTU};

/// The SoftDevice keeps a pointer to the advertising data for as long as the
/// set exists, so it must live in static memory.
static mut ADV_DATA: [u8; MAX_ADV_DATA_LEN] = [0; MAX_ADV_DATA_LEN];

/// Raised by the radio notification interrupt.
static RADIO_ACTIVITY: Signal<CriticalSectionRawMutex, ()> = Signal::new();

impl From<RawError> for StackError {
    fn from(err: RawError) -> Self {
        match err {
            RawError::Resources => StackError::Resources,
            RawError::InvalidState => StackError::InvalidState,
            RawError::BleInvalidConnHandle => StackError::InvalidConnHandle,
            RawError::InvalidParam => StackError::InvalidParam,
            other => StackError::Other(other as u32),
        }
    }
}

fn check(ret: u32) -> Result<(), StackError> {
    RawError::convert(ret).map_err(StackError::from)
}

/// Enable the SoftDevice with the console's memory layout.
pub fn enable(config: &StackConfig) -> &'static mut Softdevice {
    let clock = match config.lf_clock {
        LfClockSource::Xtal => raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_XTAL as u8,
            rc_ctiv: 0,
            rc_temp_ctiv: 0,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_20_PPM as u8,
        },
        LfClockSource::Rc => raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_RC as u8,
            rc_ctiv: 16,
            rc_temp_ctiv: 2,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_500_PPM as u8,
        },
    };

    let sd_config = SdConfig {
        clock: Some(clock),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: config.conn_count,
            event_length: config.event_length,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t {
            att_mtu: config.att_mtu,
        }),
        conn_gatts: Some(raw::ble_gatts_conn_cfg_t {
            hvn_tx_queue_size: config.hvn_tx_queue_size,
        }),
        common_vs_uuid: Some(raw::ble_common_cfg_vs_uuid_t {
            vs_uuid_count: config.vs_uuid_count,
        }),
        gatts_attr_tab_size: Some(raw::ble_gatts_cfg_attr_tab_size_t {
            attr_tab_size: config.attr_tab_size,
        }),
        gatts_service_changed: Some(raw::ble_gatts_cfg_service_changed_t {
            _bitfield_1: raw::ble_gatts_cfg_service_changed_t::new_bitfield_1(config.service_changed as u8),
        }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 1,
            periph_role_count: 1,
            central_role_count: 0,
            central_sec_count: 0,
            _bitfield_1: raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        ..Default::default()
    };

    let sd = Softdevice::enable(&sd_config);

    if config.dcdc {
        let ret = unsafe { raw::sd_power_dcdc_mode_set(raw::NRF_POWER_DCDC_MODES_NRF_POWER_DCDC_ENABLE as u8) };
        if let Err(err) = RawError::convert(ret) {
            warn!("DC/DC enable failed: {:?}", err);
        }
    }

    sd
}

/// Route the SoftDevice's radio notification (inactive edge) to `SWI1_EGU1`.
pub fn enable_event_wakeup() -> Result<(), StackError> {
    check(unsafe {
        raw::sd_radio_notification_cfg_set(
            raw::NRF_RADIO_NOTIFICATION_TYPES_NRF_RADIO_NOTIFICATION_TYPE_INT_ON_INACTIVE as u8,
            raw::NRF_RADIO_NOTIFICATION_DISTANCES_NRF_RADIO_NOTIFICATION_DISTANCE_NONE as u8,
        )
    })?;

    // Levels 0, 1 and 4 belong to the SoftDevice
    interrupt::SWI1_EGU1.set_priority(Priority::P2);
    unsafe { interrupt::SWI1_EGU1.enable() };
    Ok(())
}

/// Wait until the radio has finished an event since the last wakeup.
///
/// The interrupt runs above thread mode and below the SoftDevice's own
/// processing, so by the time the waiting task is polled the SoftDevice has
/// queued whatever that radio event produced.
pub async fn wait_for_events() {
    RADIO_ACTIVITY.wait().await;
}

#[interrupt]
fn SWI1_EGU1() {
    RADIO_ACTIVITY.signal(());
}

fn open_sec_mode() -> raw::ble_gap_conn_sec_mode_t {
    // Security mode 1, level 1: no encryption, no authentication
    let mut mode: raw::ble_gap_conn_sec_mode_t = unsafe { mem::zeroed() };
    mode.set_sm(1);
    mode.set_lv(1);
    mode
}

fn raw_phy(phy: Phy) -> u8 {
    match phy {
        Phy::Auto => raw::BLE_GAP_PHY_AUTO as u8,
        Phy::M1 => raw::BLE_GAP_PHY_1MBPS as u8,
        Phy::M2 => raw::BLE_GAP_PHY_2MBPS as u8,
        Phy::Coded => raw::BLE_GAP_PHY_CODED as u8,
    }
}

fn raw_conn_params(params: &ConnParams) -> raw::ble_gap_conn_params_t {
    raw::ble_gap_conn_params_t {
        min_conn_interval: params.min_conn_interval,
        max_conn_interval: params.max_conn_interval,
        slave_latency: params.slave_latency,
        conn_sup_timeout: params.conn_sup_timeout,
    }
}

/// Register the 128-bit base of `uuid` and return its 16-bit alias with the
/// vendor type. Registering an existing base returns the existing type.
fn vendor_uuid(uuid: &Uuid128) -> Result<raw::ble_uuid_t, StackError> {
    let base = raw::ble_uuid128_t {
        uuid128: *uuid.as_le_bytes(),
    };
    let mut uuid_type: u8 = 0;
    check(unsafe { raw::sd_ble_uuid_vs_add(&base, &mut uuid_type) })?;

    Ok(raw::ble_uuid_t {
        uuid: uuid.short(),
        type_: uuid_type,
    })
}

/// [`Stack`] over the S140 SoftDevice.
pub struct SoftdeviceStack {
    _sd: &'static Softdevice,
}

impl SoftdeviceStack {
    pub fn new(sd: &'static Softdevice) -> Self {
        Self { _sd: sd }
    }
}

impl Stack for SoftdeviceStack {
    fn set_device_name(&self, name: &str) -> Result<(), StackError> {
        let perm = open_sec_mode();
        check(unsafe { raw::sd_ble_gap_device_name_set(&perm, name.as_ptr(), name.len() as u16) })
    }

    fn set_preferred_conn_params(&self, params: &ConnParams) -> Result<(), StackError> {
        let params = raw_conn_params(params);
        check(unsafe { raw::sd_ble_gap_ppcp_set(&params) })
    }

    fn preferred_conn_params(&self) -> Result<ConnParams, StackError> {
        let mut params: raw::ble_gap_conn_params_t = unsafe { mem::zeroed() };
        check(unsafe { raw::sd_ble_gap_ppcp_get(&mut params) })?;

        Ok(ConnParams {
            min_conn_interval: params.min_conn_interval,
            max_conn_interval: params.max_conn_interval,
            slave_latency: params.slave_latency,
            conn_sup_timeout: params.conn_sup_timeout,
        })
    }

    fn add_primary_service(&self, uuid: &Uuid128) -> Result<u16, StackError> {
        let uuid = vendor_uuid(uuid)?;
        let mut handle: u16 = 0;
        check(unsafe { raw::sd_ble_gatts_service_add(raw::BLE_GATTS_SRVC_TYPE_PRIMARY as u8, &uuid, &mut handle) })?;
        Ok(handle)
    }

    fn add_characteristic(
        &self,
        service_handle: u16,
        characteristic: &CharacteristicDef,
    ) -> Result<CharacteristicHandles, StackError> {
        let uuid = vendor_uuid(&characteristic.uuid)?;

        let mut char_md: raw::ble_gatts_char_md_t = unsafe { mem::zeroed() };
        let props = &characteristic.properties;
        char_md.char_props.set_read(props.read as u8);
        char_md.char_props.set_write(props.write as u8);
        char_md.char_props.set_write_wo_resp(props.write_without_response as u8);
        char_md.char_props.set_notify(props.notify as u8);

        let mut attr_md: raw::ble_gatts_attr_md_t = unsafe { mem::zeroed() };
        attr_md.read_perm = open_sec_mode();
        attr_md.write_perm = open_sec_mode();
        attr_md.set_vloc(raw::BLE_GATTS_VLOC_STACK as u8);
        attr_md.set_vlen(characteristic.variable_len as u8);

        let attr = raw::ble_gatts_attr_t {
            p_uuid: &uuid,
            p_attr_md: &attr_md,
            init_len: 1,
            init_offs: 0,
            max_len: characteristic.max_len,
            p_value: ptr::null_mut(),
        };

        let mut handles: raw::ble_gatts_char_handles_t = unsafe { mem::zeroed() };
        check(unsafe { raw::sd_ble_gatts_characteristic_add(service_handle, &char_md, &attr, &mut handles) })?;

        Ok(CharacteristicHandles {
            value_handle: handles.value_handle,
            cccd_handle: handles.cccd_handle,
        })
    }

    fn configure_advertising(&self, adv_data: &[u8], params: &AdvParams) -> Result<AdvHandle, StackError> {
        if adv_data.len() > MAX_ADV_DATA_LEN {
            return Err(StackError::InvalidParam);
        }

        // SAFETY: written once during bring-up, before advertising starts;
        // afterwards only the SoftDevice reads it.
        let data_ptr = unsafe {
            let data = &mut *ptr::addr_of_mut!(ADV_DATA);
            data[..adv_data.len()].copy_from_slice(adv_data);
            data.as_mut_ptr()
        };

        let data = raw::ble_gap_adv_data_t {
            adv_data: raw::ble_data_t {
                p_data: data_ptr,
                len: adv_data.len() as u16,
            },
            scan_rsp_data: raw::ble_data_t {
                p_data: ptr::null_mut(),
                len: 0,
            },
        };

        let mut adv_params: raw::ble_gap_adv_params_t = unsafe { mem::zeroed() };
        adv_params.properties.type_ = match (params.connectable, params.scannable) {
            (true, true) => raw::BLE_GAP_ADV_TYPE_CONNECTABLE_SCANNABLE_UNDIRECTED,
            (false, true) => raw::BLE_GAP_ADV_TYPE_NONCONNECTABLE_SCANNABLE_UNDIRECTED,
            _ => raw::BLE_GAP_ADV_TYPE_NONCONNECTABLE_NONSCANNABLE_UNDIRECTED,
        } as u8;
        adv_params.primary_phy = raw_phy(params.primary_phy);
        adv_params.secondary_phy = raw_phy(params.secondary_phy);
        adv_params.interval = params.interval;

        let mut handle = raw::BLE_GAP_ADV_SET_HANDLE_NOT_SET as u8;
        check(unsafe { raw::sd_ble_gap_adv_set_configure(&mut handle, &data, &adv_params) })?;
        Ok(AdvHandle(handle))
    }

    fn start_advertising(&self, handle: AdvHandle) -> Result<(), StackError> {
        check(unsafe { raw::sd_ble_gap_adv_start(handle.0, CONN_CFG_TAG) })
    }

    fn update_conn_params(&self, conn: ConnHandle, params: &ConnParams) -> Result<(), StackError> {
        let params = raw_conn_params(params);
        check(unsafe { raw::sd_ble_gap_conn_param_update(conn.raw(), &params) })
    }

    fn update_phy(&self, conn: ConnHandle, tx: Phy, rx: Phy) -> Result<(), StackError> {
        let phys = raw::ble_gap_phys_t {
            tx_phys: raw_phy(tx),
            rx_phys: raw_phy(rx),
        };
        check(unsafe { raw::sd_ble_gap_phy_update(conn.raw(), &phys) })
    }

    fn reply_mtu_exchange(&self, conn: ConnHandle, server_rx_mtu: u16) -> Result<(), StackError> {
        check(unsafe { raw::sd_ble_gatts_exchange_mtu_reply(conn.raw(), server_rx_mtu) })
    }

    fn reply_security_params(&self, conn: ConnHandle, reply: SecurityReply) -> Result<(), StackError> {
        let status = match reply {
            SecurityReply::PairingNotSupported => raw::BLE_GAP_SEC_STATUS_PAIRING_NOT_SUPP,
        } as u8;
        check(unsafe { raw::sd_ble_gap_sec_params_reply(conn.raw(), status, ptr::null(), ptr::null()) })
    }

    fn set_system_attributes(&self, conn: ConnHandle, data: Option<&[u8]>) -> Result<(), StackError> {
        let (data_ptr, len) = match data {
            Some(data) => (data.as_ptr(), data.len() as u16),
            None => (ptr::null(), 0),
        };
        check(unsafe { raw::sd_ble_gatts_sys_attr_set(conn.raw(), data_ptr, len, 0) })
    }

    fn disconnect(&self, conn: ConnHandle, reason: DisconnectReason) -> Result<(), StackError> {
        check(unsafe { raw::sd_ble_gap_disconnect(conn.raw(), reason.hci_code()) })
    }

    fn notify(&self, conn: ConnHandle, value_handle: u16, data: &[u8]) -> Result<(), StackError> {
        let mut len = data.len() as u16;
        let params = raw::ble_gatts_hvx_params_t {
            handle: value_handle,
            type_: raw::BLE_GATT_HVX_NOTIFICATION as u8,
            offset: 0,
            p_len: &mut len,
            p_data: data.as_ptr(),
        };
        check(unsafe { raw::sd_ble_gatts_hvx(conn.raw(), &params) })
    }
}

/// Largest BLE event: the event struct plus a full-MTU write payload.
const BLE_EVT_LEN: usize = mem::size_of::<raw::ble_evt_t>() + MAX_MTU as usize;

/// Event storage with the alignment `ble_evt_t` requires.
#[repr(C, align(4))]
struct EventBuffer([MaybeUninit<u8>; BLE_EVT_LEN]);

/// [`EventSource`] draining the SoftDevice SoC and BLE queues.
pub struct SoftdeviceEvents {
    buf: EventBuffer,
}

impl SoftdeviceEvents {
    pub const fn new() -> Self {
        Self {
            buf: EventBuffer([MaybeUninit::uninit(); BLE_EVT_LEN]),
        }
    }
}

impl Default for SoftdeviceEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for SoftdeviceEvents {
    fn next_soc_event(&mut self) -> Result<Option<SocEvent>, StackError> {
        let mut evt_id: u32 = 0;
        match RawError::convert(unsafe { raw::sd_evt_get(&mut evt_id) }) {
            Ok(()) => {}
            Err(RawError::NotFound) => return Ok(None),
            Err(err) => return Err(err.into()),
        }

        Ok(Some(match evt_id {
            raw::NRF_SOC_EVTS_NRF_EVT_FLASH_OPERATION_SUCCESS => SocEvent::FlashOperationSuccess,
            raw::NRF_SOC_EVTS_NRF_EVT_FLASH_OPERATION_ERROR => SocEvent::FlashOperationError,
            other => SocEvent::Other(other),
        }))
    }

    fn next_ble_event(&mut self) -> Result<Option<BleEvent<'_>>, StackError> {
        let mut len = BLE_EVT_LEN as u16;
        let buf = self.buf.0.as_mut_ptr() as *mut u8;
        match RawError::convert(unsafe { raw::sd_ble_evt_get(buf, &mut len) }) {
            Ok(()) => {}
            Err(RawError::NotFound) => return Ok(None),
            Err(err) => return Err(err.into()),
        }

        // SAFETY: the SoftDevice wrote a complete `ble_evt_t` into the
        // aligned buffer; it stays untouched until the next call.
        let evt = unsafe { &*(buf as *const raw::ble_evt_t) };
        Ok(Some(unsafe { decode(evt) }))
    }
}

/// Translate a raw event. Unsafe because it reads the union member named by
/// `header.evt_id`.
unsafe fn decode(evt: &raw::ble_evt_t) -> BleEvent<'_> {
    let id = evt.header.evt_id as u32;
    let gap = &evt.evt.gap_evt;
    let gatts = &evt.evt.gatts_evt;

    match id {
        raw::BLE_GAP_EVTS_BLE_GAP_EVT_CONNECTED => BleEvent::Connected {
            conn: ConnHandle(gap.conn_handle),
        },
        raw::BLE_GAP_EVTS_BLE_GAP_EVT_DISCONNECTED => BleEvent::Disconnected {
            conn: ConnHandle(gap.conn_handle),
            reason: gap.params.disconnected.reason,
        },
        raw::BLE_GAP_EVTS_BLE_GAP_EVT_PHY_UPDATE_REQUEST => BleEvent::PhyUpdateRequest {
            conn: ConnHandle(gap.conn_handle),
        },
        raw::BLE_GAP_EVTS_BLE_GAP_EVT_SEC_PARAMS_REQUEST => BleEvent::SecParamsRequest {
            conn: ConnHandle(gap.conn_handle),
        },
        raw::BLE_GATTS_EVTS_BLE_GATTS_EVT_EXCHANGE_MTU_REQUEST => BleEvent::ExchangeMtuRequest {
            conn: ConnHandle(gatts.conn_handle),
            client_mtu: gatts.params.exchange_mtu_request.client_rx_mtu,
        },
        raw::BLE_GATTS_EVTS_BLE_GATTS_EVT_WRITE => {
            let write = &gatts.params.write;
            BleEvent::Write {
                conn: ConnHandle(gatts.conn_handle),
                handle: write.handle,
                data: write.data.as_slice(write.len as usize),
            }
        }
        raw::BLE_GATTS_EVTS_BLE_GATTS_EVT_SYS_ATTR_MISSING => BleEvent::SysAttrMissing {
            conn: ConnHandle(gatts.conn_handle),
        },
        raw::BLE_GATTS_EVTS_BLE_GATTS_EVT_TIMEOUT => BleEvent::GattsTimeout {
            conn: ConnHandle(gatts.conn_handle),
        },
        raw::BLE_GATTC_EVTS_BLE_GATTC_EVT_TIMEOUT => BleEvent::GattcTimeout {
            conn: ConnHandle(evt.evt.gattc_evt.conn_handle),
        },
        _ => BleEvent::Other(evt.header.evt_id),
    }
}
