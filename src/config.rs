//! Compile-time configuration.
//!
//! `trouble-driver` has some default settings that are fixed at compile time. They are
//! set via environment variables at build time: set the variable named `TROUBLE_DRIVER_<value>`.
//! For example `TROUBLE_DRIVER_WRITE_CMD_RETRIES=20 cargo build`. You can also set them in the
//! `[env]` section of `.cargo/config.toml`.
//!
//! The timeouts, retry count and MTU can be overridden per adapter at runtime through
//! [`AdapterConfig`](crate::AdapterConfig). Capacities cannot.

mod raw {
    #![allow(unused)]
    include!(concat!(env!("OUT_DIR"), "/config.rs"));
}

/// How long a procedure waits for each response event.
///
/// Default: 5000.
pub const EVENT_TIMEOUT_MS: u64 = raw::EVENT_TIMEOUT_MS;

/// How long `connect` waits for the connected event.
///
/// Default: 10000.
pub const CONNECT_TIMEOUT_MS: u64 = raw::CONNECT_TIMEOUT_MS;

/// Number of attempts a write command gets when the local transmit buffers are full.
///
/// Default: 10.
pub const WRITE_CMD_RETRIES: u8 = raw::WRITE_CMD_RETRIES;

/// ATT MTU assumed for a link before any exchange.
///
/// Default: 23.
pub const DEFAULT_ATT_MTU: u16 = raw::DEFAULT_ATT_MTU;

/// ATT MTU offered when the peer starts an MTU exchange.
///
/// Default: 247.
pub const PREFERRED_ATT_MTU: u16 = raw::PREFERRED_ATT_MTU;

/// Vendor specific UUID bases the adapter can register with the driver.
///
/// Default: 10.
pub const VENDOR_UUID_COUNT: usize = raw::VENDOR_UUID_COUNT;

/// Waiters that can park on one synchronizer slot before older ones are woken early.
///
/// Default: 4.
pub const EVENT_SYNC_WAITERS: usize = raw::EVENT_SYNC_WAITERS;
