//! Boundary to the radio driver.
//!
//! The driver is the transport collaborator that talks to the radio: it executes commands
//! synchronously, returning an nRF status code, and reports everything else from its own
//! threads through the [`EventSink`] handed to [`RadioDriver::open`].
use core::fmt;

use bt_hci::param::ConnHandle;
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::event::Event;
use crate::types::gap::{AuthKeyType, ConnParams, DataLengthParams, PhyParams, ScanParams, SecKeyset, SecParams, SecStatus};
use crate::types::gatt::{HandleRange, WriteParams};
use crate::types::uuid::BleUuid;
use crate::{Address, Error};

/// Status code every command is expected to return on success.
pub const NRF_SUCCESS: u32 = 0;
/// No memory for operation.
pub const NRF_ERROR_NO_MEM: u32 = 0x04;
/// Not enough resources for operation, e.g. all transmit buffers are queued.
pub const NRF_ERROR_RESOURCES: u32 = 0x13;
/// Not enough transmit packets, reported by older driver versions.
pub const BLE_ERROR_NO_TX_PACKETS: u32 = 0x3004;

/// Codes that report exhausted local transmit buffers.
pub(crate) const TX_EXHAUSTED: [u32; 2] = [NRF_ERROR_RESOURCES, BLE_ERROR_NO_TX_PACKETS];

/// Symbolic name of a driver status code, if known.
pub fn status_name(code: u32) -> Option<&'static str> {
    Some(match code {
        0x00 => "NRF_SUCCESS",
        0x01 => "NRF_ERROR_SVC_HANDLER_MISSING",
        0x02 => "NRF_ERROR_SOFTDEVICE_NOT_ENABLED",
        0x03 => "NRF_ERROR_INTERNAL",
        0x04 => "NRF_ERROR_NO_MEM",
        0x05 => "NRF_ERROR_NOT_FOUND",
        0x06 => "NRF_ERROR_NOT_SUPPORTED",
        0x07 => "NRF_ERROR_INVALID_PARAM",
        0x08 => "NRF_ERROR_INVALID_STATE",
        0x09 => "NRF_ERROR_INVALID_LENGTH",
        0x0A => "NRF_ERROR_INVALID_FLAGS",
        0x0B => "NRF_ERROR_INVALID_DATA",
        0x0C => "NRF_ERROR_DATA_SIZE",
        0x0D => "NRF_ERROR_TIMEOUT",
        0x0E => "NRF_ERROR_NULL",
        0x0F => "NRF_ERROR_FORBIDDEN",
        0x10 => "NRF_ERROR_INVALID_ADDR",
        0x11 => "NRF_ERROR_BUSY",
        0x12 => "NRF_ERROR_CONN_COUNT",
        0x13 => "NRF_ERROR_RESOURCES",
        0x3001 => "BLE_ERROR_NOT_ENABLED",
        0x3002 => "BLE_ERROR_INVALID_CONN_HANDLE",
        0x3003 => "BLE_ERROR_INVALID_ATTR_HANDLE",
        0x3004 => "BLE_ERROR_NO_TX_PACKETS",
        0x3005 => "BLE_ERROR_INVALID_ROLE",
        0x3200 => "BLE_ERROR_GAP_UUID_LIST_MISMATCH",
        0x3201 => "BLE_ERROR_GAP_DISCOVERABLE_WITH_WHITELIST",
        0x3202 => "BLE_ERROR_GAP_INVALID_BLE_ADDR",
        0x3203 => "BLE_ERROR_GAP_WHITELIST_IN_USE",
        0x3204 => "BLE_ERROR_GAP_DEVICE_IDENTITIES_IN_USE",
        0x3205 => "BLE_ERROR_GAP_DEVICE_IDENTITIES_DUPLICATE",
        0x3300 => "BLE_ERROR_GATTC_PROC_NOT_PERMITTED",
        0x3400 => "BLE_ERROR_GATTS_INVALID_ATTR_TYPE",
        0x3401 => "BLE_ERROR_GATTS_SYS_ATTR_MISSING",
        _ => return None,
    })
}

/// Driver command, used to tag command failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Open,
    Close,
    ScanStart,
    ScanStop,
    Connect,
    ConnectCancel,
    Disconnect,
    ConnParamUpdate,
    Authenticate,
    SecParamsReply,
    AuthKeyReply,
    LescDhkeyReply,
    PhyUpdate,
    DataLengthUpdate,
    UuidVsAdd,
    PrimaryServicesDiscover,
    CharacteristicsDiscover,
    DescriptorsDiscover,
    Read,
    Write,
    HvConfirm,
    ExchangeMtuRequest,
    ExchangeMtuReply,
}

impl Op {
    fn name(&self) -> &'static str {
        match self {
            Op::Open => "open",
            Op::Close => "close",
            Op::ScanStart => "gap_scan_start",
            Op::ScanStop => "gap_scan_stop",
            Op::Connect => "gap_connect",
            Op::ConnectCancel => "gap_connect_cancel",
            Op::Disconnect => "gap_disconnect",
            Op::ConnParamUpdate => "gap_conn_param_update",
            Op::Authenticate => "gap_authenticate",
            Op::SecParamsReply => "gap_sec_params_reply",
            Op::AuthKeyReply => "gap_auth_key_reply",
            Op::LescDhkeyReply => "gap_lesc_dhkey_reply",
            Op::PhyUpdate => "gap_phy_update",
            Op::DataLengthUpdate => "gap_data_length_update",
            Op::UuidVsAdd => "uuid_vs_add",
            Op::PrimaryServicesDiscover => "gattc_primary_services_discover",
            Op::CharacteristicsDiscover => "gattc_characteristics_discover",
            Op::DescriptorsDiscover => "gattc_descriptors_discover",
            Op::Read => "gattc_read",
            Op::Write => "gattc_write",
            Op::HvConfirm => "gattc_hv_confirm",
            Op::ExchangeMtuRequest => "gattc_exchange_mtu_request",
            Op::ExchangeMtuReply => "gatts_exchange_mtu_reply",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A command returned something other than [`NRF_SUCCESS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverError {
    /// Command that failed.
    pub op: Op,
    /// Raw status code.
    pub code: u32,
}

impl DriverError {
    /// Symbolic name of the status code, if known.
    pub fn name(&self) -> Option<&'static str> {
        status_name(self.code)
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} failed with {} ({:#x})", self.op, name, self.code),
            None => write!(f, "{} failed with {:#x}", self.op, self.code),
        }
    }
}

impl std::error::Error for DriverError {}

/// Convert a command status into a result.
pub(crate) fn check(op: Op, code: u32) -> Result<(), Error> {
    if code == NRF_SUCCESS {
        Ok(())
    } else {
        Err(Error::Driver(DriverError { op, code }))
    }
}

/// Raw protocol event as delivered by the driver.
///
/// `data` starts with the connection handle as a little-endian `u16`, followed by the fields
/// of the event identified by `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    /// Event id.
    pub id: u16,
    /// Event fields.
    pub data: Vec<u8>,
}

/// Severity of a driver log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSeverity {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
    Fatal,
}

impl From<LogSeverity> for log::Level {
    fn from(severity: LogSeverity) -> Self {
        match severity {
            LogSeverity::Trace => log::Level::Trace,
            LogSeverity::Debug => log::Level::Debug,
            LogSeverity::Info => log::Level::Info,
            LogSeverity::Warning => log::Level::Warn,
            LogSeverity::Error | LogSeverity::Fatal => log::Level::Error,
        }
    }
}

/// Log line produced by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverLog {
    pub severity: LogSeverity,
    pub message: String,
}

/// Transport status change reported by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverStatus {
    pub code: u32,
    pub message: String,
}

/// Where the driver pushes its callbacks.
///
/// Cheap to clone and safe to use from any thread. Records pushed after the adapter is closed
/// are dropped.
#[derive(Clone)]
pub struct EventSink {
    log: UnboundedSender<DriverLog>,
    status: UnboundedSender<DriverStatus>,
    events: UnboundedSender<RawEvent>,
}

impl EventSink {
    /// Push a log record.
    pub fn log(&self, record: DriverLog) {
        if self.log.unbounded_send(record).is_err() {
            trace!("[dispatch] log record after close");
        }
    }

    /// Push a status record.
    pub fn status(&self, record: DriverStatus) {
        if self.status.unbounded_send(record).is_err() {
            trace!("[dispatch] status record after close");
        }
    }

    /// Push a raw protocol event.
    pub fn event(&self, event: RawEvent) {
        if self.events.unbounded_send(event).is_err() {
            trace!("[dispatch] event after close");
        }
    }

    /// Encode and push a protocol event for `conn`. Meant for loopback transports.
    pub fn emit(&self, conn: ConnHandle, event: &Event) {
        match event.encode(conn) {
            Ok(raw) => self.event(raw),
            Err(e) => warn!("[dispatch] unable to encode {:?}: {}", event.kind(), e),
        }
    }

    pub(crate) fn close(&self) {
        self.log.close_channel();
        self.status.close_channel();
        self.events.close_channel();
    }
}

/// Receiving ends of the three driver callback queues.
pub(crate) struct EventSources {
    pub(crate) log: UnboundedReceiver<DriverLog>,
    pub(crate) status: UnboundedReceiver<DriverStatus>,
    pub(crate) events: UnboundedReceiver<RawEvent>,
}

pub(crate) fn channels() -> (EventSink, EventSources) {
    let (log_tx, log_rx) = mpsc::unbounded();
    let (status_tx, status_rx) = mpsc::unbounded();
    let (events_tx, events_rx) = mpsc::unbounded();
    (
        EventSink {
            log: log_tx,
            status: status_tx,
            events: events_tx,
        },
        EventSources {
            log: log_rx,
            status: status_rx,
            events: events_rx,
        },
    )
}

/// Interface to the radio driver.
///
/// Every command runs synchronously and returns a status code, [`NRF_SUCCESS`] on success.
/// Outcomes that involve the peer arrive later as events on the [`EventSink`].
pub trait RadioDriver: Send + Sync + 'static {
    /// Start the transport. Callbacks go to `sink` until [`RadioDriver::close`].
    fn open(&self, sink: EventSink) -> u32;

    /// Stop the transport.
    fn close(&self) -> u32;

    fn gap_scan_start(&self, params: &ScanParams) -> u32;

    fn gap_scan_stop(&self) -> u32;

    /// Start connecting to `peer`. Completes with a connected event or a GAP timeout.
    fn gap_connect(&self, peer: &Address, scan: &ScanParams, params: &ConnParams) -> u32;

    fn gap_connect_cancel(&self) -> u32;

    fn gap_disconnect(&self, conn: ConnHandle, reason: u8) -> u32;

    fn gap_conn_param_update(&self, conn: ConnHandle, params: &ConnParams) -> u32;

    fn gap_authenticate(&self, conn: ConnHandle, params: &SecParams) -> u32;

    /// Answer a security parameters request. `params` is `None` in the central role.
    fn gap_sec_params_reply(
        &self,
        conn: ConnHandle,
        status: SecStatus,
        params: Option<&SecParams>,
        keyset: &SecKeyset,
    ) -> u32;

    fn gap_auth_key_reply(&self, conn: ConnHandle, key_type: AuthKeyType, key: Option<&[u8]>) -> u32;

    /// Hand back the LESC DH key, 32 bytes little-endian.
    fn gap_lesc_dhkey_reply(&self, conn: ConnHandle, dhkey: &[u8; 32]) -> u32;

    fn gap_phy_update(&self, conn: ConnHandle, phys: &PhyParams) -> u32;

    /// Start a data length update. `None` lets the driver pick the parameters.
    fn gap_data_length_update(&self, conn: ConnHandle, params: Option<&DataLengthParams>) -> u32;

    /// Register a vendor specific UUID base, returning its type code through `kind`.
    fn uuid_vs_add(&self, base: &[u8; 16], kind: &mut u8) -> u32;

    fn gattc_primary_services_discover(&self, conn: ConnHandle, start: u16, uuid: Option<&BleUuid>) -> u32;

    fn gattc_characteristics_discover(&self, conn: ConnHandle, range: HandleRange) -> u32;

    fn gattc_descriptors_discover(&self, conn: ConnHandle, range: HandleRange) -> u32;

    fn gattc_read(&self, conn: ConnHandle, handle: u16, offset: u16) -> u32;

    fn gattc_write(&self, conn: ConnHandle, params: &WriteParams) -> u32;

    /// Confirm an indication received on `handle`.
    fn gattc_hv_confirm(&self, conn: ConnHandle, handle: u16) -> u32;

    fn gattc_exchange_mtu_request(&self, conn: ConnHandle, client_rx_mtu: u16) -> u32;

    fn gatts_exchange_mtu_reply(&self, conn: ConnHandle, server_rx_mtu: u16) -> u32;
}
