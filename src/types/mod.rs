//! Common types.

pub mod gap;
pub mod gatt;
pub(crate) mod primitives;

pub mod uuid;
