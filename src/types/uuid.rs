//! UUID types.
//!
//! The radio driver never sees full 128-bit UUIDs. It works with [`BleUuid`], a 16-bit value
//! paired with a type code: [`BleUuid::TYPE_BLE`] for Bluetooth SIG UUIDs, or a code handed out
//! when a vendor specific 128-bit base was registered. The adapter translates between the two.

use core::fmt;

use crate::codec::{Decode, Encode, Error, FixedSize};

/// A 16-bit or 128-bit UUID.
///
/// 128-bit UUIDs are stored in little-endian byte order, as they appear on air.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Uuid {
    /// 16-bit UUID
    Uuid16([u8; 2]),
    /// 128-bit UUID
    Uuid128([u8; 16]),
}

impl From<u16> for Uuid {
    fn from(data: u16) -> Self {
        Uuid::Uuid16(data.to_le_bytes())
    }
}

impl From<u128> for Uuid {
    fn from(data: u128) -> Self {
        Uuid::Uuid128(data.to_le_bytes())
    }
}

impl From<[u8; 16]> for Uuid {
    fn from(data: [u8; 16]) -> Self {
        Uuid::Uuid128(data)
    }
}

impl Uuid {
    /// Create a new 16-bit UUID.
    pub const fn new_short(val: u16) -> Self {
        Self::Uuid16(val.to_le_bytes())
    }

    /// Create a new 128-bit UUID.
    pub const fn new_long(val: [u8; 16]) -> Self {
        Self::Uuid128(val)
    }

    /// Compose a 128-bit UUID from a vendor base and the 16-bit value placed in octets 12-13.
    pub fn from_base(base: [u8; 16], value: u16) -> Self {
        let mut bytes = base;
        bytes[12..14].copy_from_slice(&value.to_le_bytes());
        Self::Uuid128(bytes)
    }

    /// The vendor base of a 128-bit UUID, i.e. the UUID with octets 12-13 cleared.
    pub fn base(&self) -> Option<[u8; 16]> {
        match self {
            Uuid::Uuid16(_) => None,
            Uuid::Uuid128(bytes) => {
                let mut base = *bytes;
                base[12] = 0;
                base[13] = 0;
                Some(base)
            }
        }
    }

    /// The 16-bit value of this UUID, taken from octets 12-13 for 128-bit UUIDs.
    pub fn short_value(&self) -> u16 {
        match self {
            Uuid::Uuid16(data) => u16::from_le_bytes(*data),
            Uuid::Uuid128(data) => u16::from_le_bytes([data[12], data[13]]),
        }
    }

    /// Get the raw UUID bytes.
    pub fn as_raw(&self) -> &[u8] {
        match self {
            Uuid::Uuid16(uuid) => uuid,
            Uuid::Uuid128(uuid) => uuid,
        }
    }
}

impl TryFrom<&[u8]> for Uuid {
    type Error = crate::Error;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        match value.len() {
            2 => Ok(Uuid::Uuid16([value[0], value[1]])),
            16 => {
                let mut bytes = [0; 16];
                bytes.copy_from_slice(value);
                Ok(Uuid::Uuid128(bytes))
            }
            _ => Err(crate::Error::InvalidValue),
        }
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Uuid::Uuid16(_) => write!(f, "0x{:04X}", self.short_value()),
            Uuid::Uuid128(bytes) => {
                for (i, b) in bytes.iter().rev().enumerate() {
                    if matches!(i, 4 | 6 | 8 | 10) {
                        f.write_str("-")?;
                    }
                    write!(f, "{:02X}", b)?;
                }
                Ok(())
            }
        }
    }
}

/// A UUID as the radio driver represents it.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct BleUuid {
    /// 16-bit value, octets 12-13 of a vendor UUID.
    pub value: u16,
    /// Type code.
    pub kind: u8,
}

impl BleUuid {
    /// The driver could not map the attribute's UUID to a known base.
    pub const TYPE_UNKNOWN: u8 = 0x00;
    /// Bluetooth SIG UUID.
    pub const TYPE_BLE: u8 = 0x01;
    /// First type code used for registered vendor bases.
    pub const TYPE_VENDOR_BEGIN: u8 = 0x02;

    /// A Bluetooth SIG 16-bit UUID.
    pub const fn sig(value: u16) -> Self {
        Self {
            value,
            kind: Self::TYPE_BLE,
        }
    }

    /// Placeholder reported for attributes whose 128-bit base has not been registered.
    pub fn is_unknown(&self) -> bool {
        self.kind == Self::TYPE_UNKNOWN
    }
}

impl FixedSize for BleUuid {
    const SIZE: usize = 3;
}

impl Decode<'_> for BleUuid {
    fn decode(src: &[u8]) -> Result<Self, Error> {
        if src.len() < Self::SIZE {
            return Err(Error::InsufficientSpace);
        }
        Ok(Self {
            value: u16::from_le_bytes([src[0], src[1]]),
            kind: src[2],
        })
    }
}

impl Encode for BleUuid {
    fn encode(&self, dest: &mut [u8]) -> Result<(), Error> {
        dest[..2].copy_from_slice(&self.value.to_le_bytes());
        dest[2] = self.kind;
        Ok(())
    }
}

/// Well known 16-bit UUIDs used by the client procedures.
pub mod consts {
    use super::Uuid;

    /// Primary service declaration.
    pub const PRIMARY_SERVICE: Uuid = Uuid::new_short(0x2800);
    /// Characteristic declaration.
    pub const CHARACTERISTIC: Uuid = Uuid::new_short(0x2803);
    /// Client Characteristic Configuration Descriptor.
    pub const CLIENT_CHARACTERISTIC_CONFIGURATION: Uuid = Uuid::new_short(0x2902);
}
