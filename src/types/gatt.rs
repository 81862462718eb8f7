//! GATT client types.
use core::fmt::{self, Display};

use crate::codec::{self, Decode, Encode, FixedSize};

/// GATT status code carried by client responses.
///
/// Values below `0x0100` are local statuses, values in `0x0100..=0x01FF` mirror the
/// `ATT_ERROR_RSP` error codes of the Bluetooth Core Specification offset by `0x0100`.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct GattStatus {
    value: u16,
}

impl GattStatus {
    /// Success
    pub const SUCCESS: Self = Self { value: 0x0000 };
    /// Unknown or not applicable status
    pub const UNKNOWN: Self = Self { value: 0x0001 };
    /// Attempted to use a handle that isn't valid on the server
    pub const INVALID_HANDLE: Self = Self { value: 0x0101 };
    /// The attribute cannot be read
    pub const READ_NOT_PERMITTED: Self = Self { value: 0x0102 };
    /// The attribute cannot be written
    pub const WRITE_NOT_PERMITTED: Self = Self { value: 0x0103 };
    /// The attribute PDU was invalid
    pub const INVALID_PDU: Self = Self { value: 0x0104 };
    /// The attribute requires authentication before it can be read or written
    pub const INSUFFICIENT_AUTHENTICATION: Self = Self { value: 0x0105 };
    /// The server does not support the request
    pub const REQUEST_NOT_SUPPORTED: Self = Self { value: 0x0106 };
    /// Offset specified was past the end of the attribute
    pub const INVALID_OFFSET: Self = Self { value: 0x0107 };
    /// The attribute requires authorisation before it can be read or written
    pub const INSUFFICIENT_AUTHORISATION: Self = Self { value: 0x0108 };
    /// Too many prepare writes have been queued
    pub const PREPARE_QUEUE_FULL: Self = Self { value: 0x0109 };
    /// No attribute found within the given attribute handle range
    pub const ATTRIBUTE_NOT_FOUND: Self = Self { value: 0x010A };
    /// The attribute cannot be read using a blob read
    pub const ATTRIBUTE_NOT_LONG: Self = Self { value: 0x010B };
    /// The encryption key size used for encrypting this link is too short
    pub const INSUFFICIENT_ENCRYPTION_KEY_SIZE: Self = Self { value: 0x010C };
    /// The attribute value length is invalid for the operation
    pub const INVALID_ATTRIBUTE_VALUE_LENGTH: Self = Self { value: 0x010D };
    /// The request encountered an error that was unlikely
    pub const UNLIKELY_ERROR: Self = Self { value: 0x010E };
    /// The attribute requires encryption before it can be read or written
    pub const INSUFFICIENT_ENCRYPTION: Self = Self { value: 0x010F };
    /// The attribute type is not a supported grouping attribute
    pub const UNSUPPORTED_GROUP_TYPE: Self = Self { value: 0x0110 };
    /// Insufficient resources to complete the request
    pub const INSUFFICIENT_RESOURCES: Self = Self { value: 0x0111 };

    /// Wrap a raw status value.
    pub const fn new(value: u16) -> Self {
        Self { value }
    }

    /// The raw status value.
    pub const fn raw(&self) -> u16 {
        self.value
    }

    /// Whether this is [`GattStatus::SUCCESS`].
    pub fn is_success(&self) -> bool {
        *self == Self::SUCCESS
    }
}

impl Display for GattStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::SUCCESS => f.write_str("success"),
            Self::UNKNOWN => f.write_str("unknown: the status is unknown or not applicable"),
            Self::INVALID_HANDLE => f.write_str("invalid handle: attempted to use a handle that isn't valid on the server"),
            Self::READ_NOT_PERMITTED => f.write_str("read not permitted: the attribute cannot be read"),
            Self::WRITE_NOT_PERMITTED => f.write_str("write not permitted: the attribute cannot be written"),
            Self::INVALID_PDU => f.write_str("invalid pdu: the attribute PDU was invalid"),
            Self::INSUFFICIENT_AUTHENTICATION => f.write_str(
                "insufficient authentication: the attribute requires authentication before it can be read or written",
            ),
            Self::REQUEST_NOT_SUPPORTED => f.write_str("request not supported: the server does not support the request"),
            Self::INVALID_OFFSET => f.write_str("invalid offset: offset specified was past the end of the attribute"),
            Self::INSUFFICIENT_AUTHORISATION => f.write_str(
                "insufficient authorisation: the attribute requires authorisation before it can be read or written",
            ),
            Self::PREPARE_QUEUE_FULL => f.write_str("prepare queue full: too many prepare writes have been queued"),
            Self::ATTRIBUTE_NOT_FOUND => {
                f.write_str("attribute not found: no attribute found within the given attribute handle range")
            }
            Self::ATTRIBUTE_NOT_LONG => f.write_str("attribute not long: the attribute cannot be read using a blob read"),
            Self::INSUFFICIENT_ENCRYPTION_KEY_SIZE => {
                f.write_str("insufficient encryption key size: the encryption key size of the link is too short")
            }
            Self::INVALID_ATTRIBUTE_VALUE_LENGTH => {
                f.write_str("invalid attribute value length: the value length is invalid for the operation")
            }
            Self::UNLIKELY_ERROR => f.write_str("unlikely error: the request encountered an error that was unlikely"),
            Self::INSUFFICIENT_ENCRYPTION => {
                f.write_str("insufficient encryption: the attribute requires encryption before it can be read or written")
            }
            Self::UNSUPPORTED_GROUP_TYPE => {
                f.write_str("unsupported group type: the attribute type is not a supported grouping attribute")
            }
            Self::INSUFFICIENT_RESOURCES => f.write_str("insufficient resources: insufficient resources to complete the request"),
            other => write!(f, "unknown gatt status {:#06x}", other.value),
        }
    }
}

impl FixedSize for GattStatus {
    const SIZE: usize = 2;
}

impl Decode<'_> for GattStatus {
    fn decode(src: &[u8]) -> Result<Self, codec::Error> {
        Ok(Self {
            value: u16::decode(src)?,
        })
    }
}

impl Encode for GattStatus {
    fn encode(&self, dest: &mut [u8]) -> Result<(), codec::Error> {
        self.value.encode(dest)
    }
}

/// Characteristic properties
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CharacteristicProp {
    /// Broadcast
    Broadcast = 0x01,
    /// Read
    Read = 0x02,
    /// Write without response
    WriteWithoutResponse = 0x04,
    /// Write
    Write = 0x08,
    /// Notify
    Notify = 0x10,
    /// Indicate
    Indicate = 0x20,
    /// Authenticated signed writes
    AuthenticatedWrite = 0x40,
    /// Extended properties
    Extended = 0x80,
}

/// Set of [`CharacteristicProp`] as found in a characteristic declaration.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CharacteristicProps(pub u8);

impl CharacteristicProps {
    /// Whether the given property is set.
    pub fn has(&self, prop: CharacteristicProp) -> bool {
        self.0 & prop as u8 != 0
    }

    /// Whether any of the given properties is set.
    pub fn any(&self, props: &[CharacteristicProp]) -> bool {
        props.iter().any(|p| self.has(*p))
    }
}

impl From<&[CharacteristicProp]> for CharacteristicProps {
    fn from(props: &[CharacteristicProp]) -> Self {
        Self(props.iter().fold(0, |acc, p| acc | *p as u8))
    }
}

impl FixedSize for CharacteristicProps {
    const SIZE: usize = 1;
}

impl Decode<'_> for CharacteristicProps {
    fn decode(src: &[u8]) -> Result<Self, codec::Error> {
        Ok(Self(u8::decode(src)?))
    }
}

impl Encode for CharacteristicProps {
    fn encode(&self, dest: &mut [u8]) -> Result<(), codec::Error> {
        self.0.encode(dest)
    }
}

/// Inclusive range of attribute handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleRange {
    /// First handle.
    pub start: u16,
    /// Last handle.
    pub end: u16,
}

impl HandleRange {
    /// The whole handle space.
    pub const ALL: Self = Self {
        start: 0x0001,
        end: 0xFFFF,
    };

    /// Whether `handle` lies in the range.
    pub fn contains(&self, handle: u16) -> bool {
        self.start <= handle && handle <= self.end
    }
}

/// Write operations understood by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WriteOp {
    /// Write request, answered by a write response.
    WriteReq = 0x01,
    /// Write command, no response from the peer.
    WriteCmd = 0x02,
    /// Signed write command.
    SignedWriteCmd = 0x03,
    /// Prepare write request.
    PrepareWriteReq = 0x04,
    /// Execute write request.
    ExecuteWriteReq = 0x05,
}

impl TryFrom<u8> for WriteOp {
    type Error = codec::Error;
    fn try_from(val: u8) -> Result<Self, codec::Error> {
        Ok(match val {
            0x01 => Self::WriteReq,
            0x02 => Self::WriteCmd,
            0x03 => Self::SignedWriteCmd,
            0x04 => Self::PrepareWriteReq,
            0x05 => Self::ExecuteWriteReq,
            _ => return Err(codec::Error::InvalidValue),
        })
    }
}

/// Flag of an execute write request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExecWriteFlag {
    /// Discard all queued writes.
    Cancel = 0x00,
    /// Apply all queued writes.
    Write = 0x01,
}

/// Parameters of a GATT client write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteParams {
    /// Kind of write.
    pub op: WriteOp,
    /// Flag for execute write requests, ignored otherwise.
    pub flags: ExecWriteFlag,
    /// Attribute handle.
    pub handle: u16,
    /// Offset for prepared writes.
    pub offset: u16,
    /// Value.
    pub data: Vec<u8>,
}

impl WriteParams {
    pub(crate) fn new(op: WriteOp, handle: u16, offset: u16, data: &[u8]) -> Self {
        Self {
            op,
            flags: ExecWriteFlag::Write,
            handle,
            offset,
            data: data.to_vec(),
        }
    }
}

/// Kind of a handle value push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HvxKind {
    /// Notification, never confirmed.
    Notification = 0x01,
    /// Indication, confirmed exactly once.
    Indication = 0x02,
}

impl TryFrom<u8> for HvxKind {
    type Error = codec::Error;
    fn try_from(val: u8) -> Result<Self, codec::Error> {
        match val {
            0x01 => Ok(Self::Notification),
            0x02 => Ok(Self::Indication),
            _ => Err(codec::Error::InvalidValue),
        }
    }
}

/// Client Characteristic Configuration value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cccd(u16);

impl Cccd {
    /// Neither notifications nor indications.
    pub const DISABLED: Self = Self(0x0000);
    /// Notifications enabled.
    pub const NOTIFY: Self = Self(0x0001);
    /// Indications enabled.
    pub const INDICATE: Self = Self(0x0002);

    /// The two bytes written to the descriptor.
    pub fn to_bytes(self) -> [u8; 2] {
        self.0.to_le_bytes()
    }
}
