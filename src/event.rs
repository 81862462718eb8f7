//! Protocol events reported by the driver.
//!
//! Every raw record decodes into one [`Event`] variant. The record layout is the event's
//! connection handle followed by its fields, all little-endian.
use bt_hci::param::{BdAddr, ConnHandle, LeConnRole};
use bt_hci::FromHciBytes;

use crate::codec;
use crate::cursor::{ReadCursor, WriteCursor};
use crate::driver::RawEvent;
use crate::types::gap::{AuthKeyType, ConnParams, DataLengthParams, KeyDist, LescPublicKey, PhyParams, SecParams, SecStatus};
use crate::types::gatt::{CharacteristicProps, GattStatus, HvxKind, WriteOp};
use crate::types::uuid::BleUuid;
use crate::{Address, AddressKind};

/// Connection handle of a record.
///
/// Unlike `ConnHandle::new` this accepts handles above 0x0EFF, which the driver uses for records
/// not bound to a link.
pub fn conn_handle(raw: u16) -> Result<ConnHandle, codec::Error> {
    ConnHandle::from_hci_bytes(&raw.to_le_bytes())
        .map(|(handle, _)| handle)
        .map_err(|_| codec::Error::InvalidValue)
}

/// Raw event ids.
pub mod id {
    pub const COMMON_TX_COMPLETE: u16 = 0x01;

    pub const GAP_CONNECTED: u16 = 0x10;
    pub const GAP_DISCONNECTED: u16 = 0x11;
    pub const GAP_CONN_PARAM_UPDATE: u16 = 0x12;
    pub const GAP_SEC_PARAMS_REQUEST: u16 = 0x13;
    pub const GAP_PASSKEY_DISPLAY: u16 = 0x15;
    pub const GAP_AUTH_KEY_REQUEST: u16 = 0x17;
    pub const GAP_LESC_DHKEY_REQUEST: u16 = 0x18;
    pub const GAP_AUTH_STATUS: u16 = 0x19;
    pub const GAP_CONN_SEC_UPDATE: u16 = 0x1A;
    pub const GAP_TIMEOUT: u16 = 0x1B;
    pub const GAP_ADV_REPORT: u16 = 0x1D;
    pub const GAP_CONN_PARAM_UPDATE_REQUEST: u16 = 0x1F;
    pub const GAP_PHY_UPDATE_REQUEST: u16 = 0x21;
    pub const GAP_PHY_UPDATE: u16 = 0x22;
    pub const GAP_DATA_LENGTH_UPDATE_REQUEST: u16 = 0x23;
    pub const GAP_DATA_LENGTH_UPDATE: u16 = 0x24;

    pub const GATTC_PRIM_SRVC_DISC_RSP: u16 = 0x30;
    pub const GATTC_CHAR_DISC_RSP: u16 = 0x32;
    pub const GATTC_DESC_DISC_RSP: u16 = 0x33;
    pub const GATTC_READ_RSP: u16 = 0x36;
    pub const GATTC_WRITE_RSP: u16 = 0x38;
    pub const GATTC_HVX: u16 = 0x39;
    pub const GATTC_EXCHANGE_MTU_RSP: u16 = 0x3A;
    pub const GATTC_WRITE_CMD_TX_COMPLETE: u16 = 0x3C;

    pub const GATTS_EXCHANGE_MTU_REQUEST: u16 = 0x55;
}

/// Discriminant of [`Event`], the key events are synchronized on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connected,
    Disconnected,
    ConnParamUpdate,
    SecParamsRequest,
    PasskeyDisplay,
    AuthKeyRequest,
    LescDhkeyRequest,
    AuthStatus,
    ConnSecUpdate,
    GapTimeout,
    AdvReport,
    ConnParamUpdateRequest,
    PhyUpdateRequest,
    PhyUpdate,
    DataLengthUpdateRequest,
    DataLengthUpdate,
    PrimaryServiceDiscovery,
    CharacteristicDiscovery,
    DescriptorDiscovery,
    ReadResponse,
    WriteResponse,
    HandleValue,
    ExchangeMtuResponse,
    ExchangeMtuRequest,
    TxComplete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connected {
    pub peer: Address,
    pub role: LeConnRole,
    pub params: ConnParams,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disconnected {
    /// HCI reason code.
    pub reason: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnParamUpdate {
    pub params: ConnParams,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecParamsRequest {
    /// Parameters the peer offered.
    pub peer_params: SecParams,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasskeyDisplay {
    /// Six ASCII digits.
    pub passkey: [u8; 6],
    /// Numeric comparison requested.
    pub match_request: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthKeyRequest {
    pub key_type: AuthKeyType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LescDhkeyRequest {
    /// Peer public key, X then Y, each little-endian.
    pub peer_pk: LescPublicKey,
    /// Out of band data requested.
    pub oobd_req: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthStatus {
    pub status: SecStatus,
    /// 0 local, 1 remote.
    pub error_src: u8,
    pub bonded: bool,
    pub lesc: bool,
    pub kdist_own: KeyDist,
    pub kdist_peer: KeyDist,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnSecUpdate {
    pub sec_mode: u8,
    pub sec_level: u8,
    pub encr_key_size: u8,
}

/// Source of a GAP timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutSource {
    Advertising,
    Scan,
    Conn,
    AuthPayload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GapTimeout {
    pub src: TimeoutSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvReport {
    pub peer: Address,
    pub rssi: i8,
    pub scan_response: bool,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhyUpdateRequest {
    /// PHYs preferred by the peer.
    pub peer_preferred: PhyParams,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhyUpdate {
    /// HCI status of the procedure.
    pub status: u8,
    pub tx_phy: u8,
    pub rx_phy: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLengthUpdateRequest {
    pub peer_params: DataLengthParams,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLengthUpdate {
    /// Effective parameters of the link.
    pub effective: DataLengthParams,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredService {
    pub uuid: BleUuid,
    pub start_handle: u16,
    pub end_handle: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDiscoveryResponse {
    pub status: GattStatus,
    pub services: Vec<DiscoveredService>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredCharacteristic {
    pub uuid: BleUuid,
    pub props: CharacteristicProps,
    pub decl_handle: u16,
    pub value_handle: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicDiscoveryResponse {
    pub status: GattStatus,
    pub characteristics: Vec<DiscoveredCharacteristic>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDescriptor {
    pub uuid: BleUuid,
    pub handle: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorDiscoveryResponse {
    pub status: GattStatus,
    pub descriptors: Vec<DiscoveredDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadResponse {
    pub status: GattStatus,
    pub handle: u16,
    pub offset: u16,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteResponse {
    pub status: GattStatus,
    pub op: WriteOp,
    pub handle: u16,
    pub offset: u16,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleValue {
    pub kind: HvxKind,
    pub handle: u16,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeMtuResponse {
    pub status: GattStatus,
    pub server_rx_mtu: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeMtuRequest {
    pub client_rx_mtu: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxComplete {
    /// Packets that left the transmit buffers.
    pub count: u8,
}

/// A decoded protocol event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Connected(Connected),
    Disconnected(Disconnected),
    ConnParamUpdate(ConnParamUpdate),
    SecParamsRequest(SecParamsRequest),
    PasskeyDisplay(PasskeyDisplay),
    AuthKeyRequest(AuthKeyRequest),
    LescDhkeyRequest(LescDhkeyRequest),
    AuthStatus(AuthStatus),
    ConnSecUpdate(ConnSecUpdate),
    GapTimeout(GapTimeout),
    AdvReport(AdvReport),
    ConnParamUpdateRequest(ConnParamUpdate),
    PhyUpdateRequest(PhyUpdateRequest),
    PhyUpdate(PhyUpdate),
    DataLengthUpdateRequest(DataLengthUpdateRequest),
    DataLengthUpdate(DataLengthUpdate),
    PrimaryServiceDiscovery(ServiceDiscoveryResponse),
    CharacteristicDiscovery(CharacteristicDiscoveryResponse),
    DescriptorDiscovery(DescriptorDiscoveryResponse),
    ReadResponse(ReadResponse),
    WriteResponse(WriteResponse),
    HandleValue(HandleValue),
    ExchangeMtuResponse(ExchangeMtuResponse),
    ExchangeMtuRequest(ExchangeMtuRequest),
    TxComplete(TxComplete),
}

/// Why a raw record could not be turned into an [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Id of no known event.
    UnknownId(u16),
    /// Record does not match the layout of its id.
    Malformed(u16, codec::Error),
}

impl core::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DecodeError::UnknownId(id) => write!(f, "unknown event id {:#06x}", id),
            DecodeError::Malformed(id, e) => write!(f, "malformed event {:#06x}: {}", id, e),
        }
    }
}

const ENCODE_LIMIT: usize = 1024;

fn read_address(r: &mut ReadCursor<'_>) -> Result<Address, codec::Error> {
    let kind = AddressKind::try_from(r.read::<u8>()?)?;
    let addr = BdAddr::new(r.read_array::<6>()?);
    Ok(Address { kind, addr })
}

fn write_address(w: &mut WriteCursor<'_>, address: &Address) -> Result<(), codec::Error> {
    w.write(u8::from(address.kind))?;
    w.append(address.addr.raw())
}

fn read_data<'d>(r: &mut ReadCursor<'d>) -> Result<&'d [u8], codec::Error> {
    let len = r.read::<u16>()? as usize;
    r.slice(len)
}

fn write_data(w: &mut WriteCursor<'_>, data: &[u8]) -> Result<(), codec::Error> {
    let len = u16::try_from(data.len()).map_err(|_| codec::Error::InvalidValue)?;
    w.write(len)?;
    w.append(data)
}

fn read_list<'d, T>(
    r: &mut ReadCursor<'d>,
    mut item: impl FnMut(&mut ReadCursor<'d>) -> Result<T, codec::Error>,
) -> Result<Vec<T>, codec::Error> {
    let count = r.read::<u16>()?;
    (0..count).map(|_| item(&mut *r)).collect()
}

fn write_count(w: &mut WriteCursor<'_>, len: usize) -> Result<(), codec::Error> {
    w.write(u16::try_from(len).map_err(|_| codec::Error::InvalidValue)?)
}

fn role_from(value: u8) -> Result<LeConnRole, codec::Error> {
    match value {
        0 => Ok(LeConnRole::Central),
        1 => Ok(LeConnRole::Peripheral),
        _ => Err(codec::Error::InvalidValue),
    }
}

fn role_to(role: LeConnRole) -> u8 {
    match role {
        LeConnRole::Central => 0,
        LeConnRole::Peripheral => 1,
    }
}

impl TryFrom<u8> for TimeoutSource {
    type Error = codec::Error;
    fn try_from(value: u8) -> Result<Self, codec::Error> {
        Ok(match value {
            0 => Self::Advertising,
            1 => Self::Scan,
            2 => Self::Conn,
            3 => Self::AuthPayload,
            _ => return Err(codec::Error::InvalidValue),
        })
    }
}

impl From<TimeoutSource> for u8 {
    fn from(src: TimeoutSource) -> u8 {
        match src {
            TimeoutSource::Advertising => 0,
            TimeoutSource::Scan => 1,
            TimeoutSource::Conn => 2,
            TimeoutSource::AuthPayload => 3,
        }
    }
}

impl Event {
    /// The kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Connected(_) => EventKind::Connected,
            Event::Disconnected(_) => EventKind::Disconnected,
            Event::ConnParamUpdate(_) => EventKind::ConnParamUpdate,
            Event::SecParamsRequest(_) => EventKind::SecParamsRequest,
            Event::PasskeyDisplay(_) => EventKind::PasskeyDisplay,
            Event::AuthKeyRequest(_) => EventKind::AuthKeyRequest,
            Event::LescDhkeyRequest(_) => EventKind::LescDhkeyRequest,
            Event::AuthStatus(_) => EventKind::AuthStatus,
            Event::ConnSecUpdate(_) => EventKind::ConnSecUpdate,
            Event::GapTimeout(_) => EventKind::GapTimeout,
            Event::AdvReport(_) => EventKind::AdvReport,
            Event::ConnParamUpdateRequest(_) => EventKind::ConnParamUpdateRequest,
            Event::PhyUpdateRequest(_) => EventKind::PhyUpdateRequest,
            Event::PhyUpdate(_) => EventKind::PhyUpdate,
            Event::DataLengthUpdateRequest(_) => EventKind::DataLengthUpdateRequest,
            Event::DataLengthUpdate(_) => EventKind::DataLengthUpdate,
            Event::PrimaryServiceDiscovery(_) => EventKind::PrimaryServiceDiscovery,
            Event::CharacteristicDiscovery(_) => EventKind::CharacteristicDiscovery,
            Event::DescriptorDiscovery(_) => EventKind::DescriptorDiscovery,
            Event::ReadResponse(_) => EventKind::ReadResponse,
            Event::WriteResponse(_) => EventKind::WriteResponse,
            Event::HandleValue(_) => EventKind::HandleValue,
            Event::ExchangeMtuResponse(_) => EventKind::ExchangeMtuResponse,
            Event::ExchangeMtuRequest(_) => EventKind::ExchangeMtuRequest,
            Event::TxComplete(_) => EventKind::TxComplete,
        }
    }

    fn id(&self) -> u16 {
        match self {
            Event::Connected(_) => id::GAP_CONNECTED,
            Event::Disconnected(_) => id::GAP_DISCONNECTED,
            Event::ConnParamUpdate(_) => id::GAP_CONN_PARAM_UPDATE,
            Event::SecParamsRequest(_) => id::GAP_SEC_PARAMS_REQUEST,
            Event::PasskeyDisplay(_) => id::GAP_PASSKEY_DISPLAY,
            Event::AuthKeyRequest(_) => id::GAP_AUTH_KEY_REQUEST,
            Event::LescDhkeyRequest(_) => id::GAP_LESC_DHKEY_REQUEST,
            Event::AuthStatus(_) => id::GAP_AUTH_STATUS,
            Event::ConnSecUpdate(_) => id::GAP_CONN_SEC_UPDATE,
            Event::GapTimeout(_) => id::GAP_TIMEOUT,
            Event::AdvReport(_) => id::GAP_ADV_REPORT,
            Event::ConnParamUpdateRequest(_) => id::GAP_CONN_PARAM_UPDATE_REQUEST,
            Event::PhyUpdateRequest(_) => id::GAP_PHY_UPDATE_REQUEST,
            Event::PhyUpdate(_) => id::GAP_PHY_UPDATE,
            Event::DataLengthUpdateRequest(_) => id::GAP_DATA_LENGTH_UPDATE_REQUEST,
            Event::DataLengthUpdate(_) => id::GAP_DATA_LENGTH_UPDATE,
            Event::PrimaryServiceDiscovery(_) => id::GATTC_PRIM_SRVC_DISC_RSP,
            Event::CharacteristicDiscovery(_) => id::GATTC_CHAR_DISC_RSP,
            Event::DescriptorDiscovery(_) => id::GATTC_DESC_DISC_RSP,
            Event::ReadResponse(_) => id::GATTC_READ_RSP,
            Event::WriteResponse(_) => id::GATTC_WRITE_RSP,
            Event::HandleValue(_) => id::GATTC_HVX,
            Event::ExchangeMtuResponse(_) => id::GATTC_EXCHANGE_MTU_RSP,
            Event::ExchangeMtuRequest(_) => id::GATTS_EXCHANGE_MTU_REQUEST,
            Event::TxComplete(_) => id::COMMON_TX_COMPLETE,
        }
    }

    /// Decode a raw record into the connection it concerns and the event.
    pub fn decode(raw: &RawEvent) -> Result<(ConnHandle, Event), DecodeError> {
        let mut r = ReadCursor::new(&raw.data);
        Self::decode_fields(raw.id, &mut r).map_err(|e| match e {
            FieldError::Unknown => DecodeError::UnknownId(raw.id),
            FieldError::Codec(e) => DecodeError::Malformed(raw.id, e),
        })
    }

    fn decode_fields(id: u16, r: &mut ReadCursor<'_>) -> Result<(ConnHandle, Event), FieldError> {
        let conn = conn_handle(r.read::<u16>()?)?;
        let event = match id {
            id::GAP_CONNECTED => Event::Connected(Connected {
                peer: read_address(r)?,
                role: role_from(r.read()?)?,
                params: r.read()?,
            }),
            id::GAP_DISCONNECTED => Event::Disconnected(Disconnected { reason: r.read()? }),
            id::GAP_CONN_PARAM_UPDATE => Event::ConnParamUpdate(ConnParamUpdate { params: r.read()? }),
            id::GAP_SEC_PARAMS_REQUEST => Event::SecParamsRequest(SecParamsRequest { peer_params: r.read()? }),
            id::GAP_PASSKEY_DISPLAY => Event::PasskeyDisplay(PasskeyDisplay {
                passkey: r.read_array()?,
                match_request: r.read()?,
            }),
            id::GAP_AUTH_KEY_REQUEST => Event::AuthKeyRequest(AuthKeyRequest {
                key_type: AuthKeyType::try_from(r.read::<u8>()?)?,
            }),
            id::GAP_LESC_DHKEY_REQUEST => Event::LescDhkeyRequest(LescDhkeyRequest {
                peer_pk: r.read_array()?,
                oobd_req: r.read()?,
            }),
            id::GAP_AUTH_STATUS => Event::AuthStatus(AuthStatus {
                status: SecStatus::new(r.read()?),
                error_src: r.read()?,
                bonded: r.read()?,
                lesc: r.read()?,
                kdist_own: KeyDist(r.read()?),
                kdist_peer: KeyDist(r.read()?),
            }),
            id::GAP_CONN_SEC_UPDATE => Event::ConnSecUpdate(ConnSecUpdate {
                sec_mode: r.read()?,
                sec_level: r.read()?,
                encr_key_size: r.read()?,
            }),
            id::GAP_TIMEOUT => Event::GapTimeout(GapTimeout {
                src: TimeoutSource::try_from(r.read::<u8>()?)?,
            }),
            id::GAP_ADV_REPORT => Event::AdvReport(AdvReport {
                peer: read_address(r)?,
                rssi: r.read()?,
                scan_response: r.read()?,
                data: read_data(r)?.to_vec(),
            }),
            id::GAP_CONN_PARAM_UPDATE_REQUEST => Event::ConnParamUpdateRequest(ConnParamUpdate { params: r.read()? }),
            id::GAP_PHY_UPDATE_REQUEST => Event::PhyUpdateRequest(PhyUpdateRequest {
                peer_preferred: r.read()?,
            }),
            id::GAP_PHY_UPDATE => Event::PhyUpdate(PhyUpdate {
                status: r.read()?,
                tx_phy: r.read()?,
                rx_phy: r.read()?,
            }),
            id::GAP_DATA_LENGTH_UPDATE_REQUEST => Event::DataLengthUpdateRequest(DataLengthUpdateRequest {
                peer_params: r.read()?,
            }),
            id::GAP_DATA_LENGTH_UPDATE => Event::DataLengthUpdate(DataLengthUpdate { effective: r.read()? }),
            id::GATTC_PRIM_SRVC_DISC_RSP => {
                let status = r.read()?;
                let services = read_list(r, |r| {
                    Ok(DiscoveredService {
                        uuid: r.read()?,
                        start_handle: r.read()?,
                        end_handle: r.read()?,
                    })
                })?;
                Event::PrimaryServiceDiscovery(ServiceDiscoveryResponse { status, services })
            }
            id::GATTC_CHAR_DISC_RSP => {
                let status = r.read()?;
                let characteristics = read_list(r, |r| {
                    Ok(DiscoveredCharacteristic {
                        uuid: r.read()?,
                        props: r.read()?,
                        decl_handle: r.read()?,
                        value_handle: r.read()?,
                    })
                })?;
                Event::CharacteristicDiscovery(CharacteristicDiscoveryResponse { status, characteristics })
            }
            id::GATTC_DESC_DISC_RSP => {
                let status = r.read()?;
                let descriptors = read_list(r, |r| {
                    Ok(DiscoveredDescriptor {
                        uuid: r.read()?,
                        handle: r.read()?,
                    })
                })?;
                Event::DescriptorDiscovery(DescriptorDiscoveryResponse { status, descriptors })
            }
            id::GATTC_READ_RSP => Event::ReadResponse(ReadResponse {
                status: r.read()?,
                handle: r.read()?,
                offset: r.read()?,
                data: read_data(r)?.to_vec(),
            }),
            id::GATTC_WRITE_RSP => Event::WriteResponse(WriteResponse {
                status: r.read()?,
                op: WriteOp::try_from(r.read::<u8>()?)?,
                handle: r.read()?,
                offset: r.read()?,
                data: read_data(r)?.to_vec(),
            }),
            id::GATTC_HVX => Event::HandleValue(HandleValue {
                kind: HvxKind::try_from(r.read::<u8>()?)?,
                handle: r.read()?,
                data: read_data(r)?.to_vec(),
            }),
            id::GATTC_EXCHANGE_MTU_RSP => Event::ExchangeMtuResponse(ExchangeMtuResponse {
                status: r.read()?,
                server_rx_mtu: r.read()?,
            }),
            id::GATTS_EXCHANGE_MTU_REQUEST => Event::ExchangeMtuRequest(ExchangeMtuRequest {
                client_rx_mtu: r.read()?,
            }),
            id::COMMON_TX_COMPLETE | id::GATTC_WRITE_CMD_TX_COMPLETE => {
                Event::TxComplete(TxComplete { count: r.read()? })
            }
            _ => return Err(FieldError::Unknown),
        };
        Ok((conn, event))
    }

    /// Encode this event for `conn` in the layout [`Event::decode`] reads.
    pub fn encode(&self, conn: ConnHandle) -> Result<RawEvent, codec::Error> {
        let mut buf = vec![0; ENCODE_LIMIT];
        let len = {
            let mut w = WriteCursor::new(&mut buf);
            w.write(conn.raw())?;
            self.encode_fields(&mut w)?;
            w.len()
        };
        buf.truncate(len);
        Ok(RawEvent { id: self.id(), data: buf })
    }

    fn encode_fields(&self, w: &mut WriteCursor<'_>) -> Result<(), codec::Error> {
        match self {
            Event::Connected(e) => {
                write_address(w, &e.peer)?;
                w.write(role_to(e.role))?;
                w.write(e.params)
            }
            Event::Disconnected(e) => w.write(e.reason),
            Event::ConnParamUpdate(e) | Event::ConnParamUpdateRequest(e) => w.write(e.params),
            Event::SecParamsRequest(e) => w.write(e.peer_params),
            Event::PasskeyDisplay(e) => {
                w.append(&e.passkey)?;
                w.write(e.match_request)
            }
            Event::AuthKeyRequest(e) => w.write(u8::from(e.key_type)),
            Event::LescDhkeyRequest(e) => {
                w.append(&e.peer_pk)?;
                w.write(e.oobd_req)
            }
            Event::AuthStatus(e) => {
                w.write(e.status.raw())?;
                w.write(e.error_src)?;
                w.write(e.bonded)?;
                w.write(e.lesc)?;
                w.write(e.kdist_own.0)?;
                w.write(e.kdist_peer.0)
            }
            Event::ConnSecUpdate(e) => {
                w.write(e.sec_mode)?;
                w.write(e.sec_level)?;
                w.write(e.encr_key_size)
            }
            Event::GapTimeout(e) => w.write(u8::from(e.src)),
            Event::AdvReport(e) => {
                write_address(w, &e.peer)?;
                w.write(e.rssi)?;
                w.write(e.scan_response)?;
                write_data(w, &e.data)
            }
            Event::PhyUpdateRequest(e) => w.write(e.peer_preferred),
            Event::PhyUpdate(e) => {
                w.write(e.status)?;
                w.write(e.tx_phy)?;
                w.write(e.rx_phy)
            }
            Event::DataLengthUpdateRequest(e) => w.write(e.peer_params),
            Event::DataLengthUpdate(e) => w.write(e.effective),
            Event::PrimaryServiceDiscovery(e) => {
                w.write(e.status)?;
                write_count(w, e.services.len())?;
                for s in &e.services {
                    w.write(s.uuid)?;
                    w.write(s.start_handle)?;
                    w.write(s.end_handle)?;
                }
                Ok(())
            }
            Event::CharacteristicDiscovery(e) => {
                w.write(e.status)?;
                write_count(w, e.characteristics.len())?;
                for c in &e.characteristics {
                    w.write(c.uuid)?;
                    w.write(c.props)?;
                    w.write(c.decl_handle)?;
                    w.write(c.value_handle)?;
                }
                Ok(())
            }
            Event::DescriptorDiscovery(e) => {
                w.write(e.status)?;
                write_count(w, e.descriptors.len())?;
                for d in &e.descriptors {
                    w.write(d.uuid)?;
                    w.write(d.handle)?;
                }
                Ok(())
            }
            Event::ReadResponse(e) => {
                w.write(e.status)?;
                w.write(e.handle)?;
                w.write(e.offset)?;
                write_data(w, &e.data)
            }
            Event::WriteResponse(e) => {
                w.write(e.status)?;
                w.write(e.op as u8)?;
                w.write(e.handle)?;
                w.write(e.offset)?;
                write_data(w, &e.data)
            }
            Event::HandleValue(e) => {
                w.write(e.kind as u8)?;
                w.write(e.handle)?;
                write_data(w, &e.data)
            }
            Event::ExchangeMtuResponse(e) => {
                w.write(e.status)?;
                w.write(e.server_rx_mtu)
            }
            Event::ExchangeMtuRequest(e) => w.write(e.client_rx_mtu),
            Event::TxComplete(e) => w.write(e.count),
        }
    }
}

enum FieldError {
    Unknown,
    Codec(codec::Error),
}

impl From<codec::Error> for FieldError {
    fn from(e: codec::Error) -> Self {
        Self::Codec(e)
    }
}
