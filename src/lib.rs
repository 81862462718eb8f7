//! An async BLE central control plane over a callback-driven radio driver.
//!
//! The [`Adapter`] turns the driver's command/callback interface into procedures that issue a
//! command and wait for the event answering it: connection establishment, GATT discovery, reads
//! and writes, notification control, pairing and link negotiation. [`Adapter::run`] drains the
//! driver's callback queues and must run alongside the procedures.
#[macro_use]
extern crate log;

use core::fmt;

use bt_hci::param::BdAddr;

mod codec;
mod cursor;
mod dispatcher;

pub mod adapter;
pub mod config;
pub mod connection_manager;
pub mod driver;
pub mod event;
pub mod event_sync;
pub mod gap;
pub mod gatt;
pub mod observer;
pub mod security_manager;
pub mod types;

pub use adapter::{Adapter, AdapterConfig};
pub use connection_manager::Connection;
pub use driver::{DriverError, EventSink, RadioDriver};
pub use event::{Event, EventKind};
pub use observer::{HandlerResult, Observer};
pub use types::uuid::Uuid;

/// Kind of a Bluetooth device address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressKind {
    Public,
    RandomStatic,
    RandomPrivateResolvable,
    RandomPrivateNonResolvable,
}

impl TryFrom<u8> for AddressKind {
    type Error = codec::Error;
    fn try_from(value: u8) -> Result<Self, codec::Error> {
        Ok(match value {
            0x00 => Self::Public,
            0x01 => Self::RandomStatic,
            0x02 => Self::RandomPrivateResolvable,
            0x03 => Self::RandomPrivateNonResolvable,
            _ => return Err(codec::Error::InvalidValue),
        })
    }
}

impl From<AddressKind> for u8 {
    fn from(kind: AddressKind) -> u8 {
        match kind {
            AddressKind::Public => 0x00,
            AddressKind::RandomStatic => 0x01,
            AddressKind::RandomPrivateResolvable => 0x02,
            AddressKind::RandomPrivateNonResolvable => 0x03,
        }
    }
}

/// A Bluetooth device address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Address {
    pub kind: AddressKind,
    pub addr: BdAddr,
}

impl Address {
    /// A random static address.
    pub fn random(val: [u8; 6]) -> Self {
        Self {
            kind: AddressKind::RandomStatic,
            addr: BdAddr::new(val),
        }
    }
}

/// Errors of the adapter procedures.
///
/// Timeouts are not errors: procedures report them as `Ok(None)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A driver command returned a failure status.
    Driver(DriverError),
    /// The characteristic has no Client Characteristic Configuration Descriptor.
    CccdNotFound,
    /// Write command still refused for lack of transmit buffers after every attempt.
    TxBufferExhausted { attempts: u8 },
    /// Unknown connection or attribute.
    NotFound,
    /// A driver record did not decode.
    Codec(codec::Error),
    /// The peer's public key is not a point on P-256.
    InvalidPublicKey,
    /// The dispatcher is already running.
    AlreadyRunning,
    /// A table with fixed capacity is full.
    OutOfMemory,
    /// A value is outside its domain.
    InvalidValue,
}

impl From<codec::Error> for Error {
    fn from(error: codec::Error) -> Self {
        Self::Codec(error)
    }
}

impl From<DriverError> for Error {
    fn from(error: DriverError) -> Self {
        Self::Driver(error)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Driver(e) => write!(f, "driver: {}", e),
            Error::CccdNotFound => f.write_str("CCCD not found"),
            Error::TxBufferExhausted { attempts } => {
                write!(f, "transmit buffers still exhausted after {} attempts", attempts)
            }
            Error::NotFound => f.write_str("not found"),
            Error::Codec(e) => write!(f, "codec: {}", e),
            Error::InvalidPublicKey => f.write_str("invalid public key"),
            Error::AlreadyRunning => f.write_str("dispatcher already running"),
            Error::OutOfMemory => f.write_str("out of memory"),
            Error::InvalidValue => f.write_str("invalid value"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Driver(e) => Some(e),
            _ => None,
        }
    }
}
