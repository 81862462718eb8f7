//! GATT client: the discovered attribute tree and the procedures that build and use it.
use crate::types::gatt::{CharacteristicProps, HandleRange};
use crate::types::uuid::Uuid;

mod client;
mod discovery;

pub use discovery::DiscoveryState;

/// A primary service on the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    pub uuid: Uuid,
    pub start_handle: u16,
    pub end_handle: u16,
    pub characteristics: Vec<Characteristic>,
}

impl Service {
    pub fn new(uuid: Uuid, start_handle: u16, end_handle: u16) -> Self {
        Self {
            uuid,
            start_handle,
            end_handle,
            characteristics: Vec::new(),
        }
    }

    /// Handles owned by this service.
    pub fn range(&self) -> HandleRange {
        HandleRange {
            start: self.start_handle,
            end: self.end_handle,
        }
    }
}

/// A characteristic of a [`Service`].
///
/// `end_handle` is the last handle before the next characteristic's declaration, or the end of
/// the service for the last characteristic. Descriptors live in `value_handle..=end_handle`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Characteristic {
    pub uuid: Uuid,
    pub decl_handle: u16,
    pub value_handle: u16,
    pub end_handle: u16,
    pub props: CharacteristicProps,
    pub descriptors: Vec<Descriptor>,
}

impl Characteristic {
    pub fn new(uuid: Uuid, decl_handle: u16, value_handle: u16, props: CharacteristicProps) -> Self {
        Self {
            uuid,
            decl_handle,
            value_handle,
            end_handle: value_handle,
            props,
            descriptors: Vec::new(),
        }
    }

    /// Handles that may hold descriptors of this characteristic.
    pub fn descriptor_range(&self) -> HandleRange {
        HandleRange {
            start: self.value_handle,
            end: self.end_handle,
        }
    }
}

/// A characteristic descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub uuid: Uuid,
    pub handle: u16,
}
