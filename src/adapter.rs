//! The adapter: one radio driver, its connections and the procedures run over them.
use core::cell::RefCell;
use core::sync::atomic::AtomicBool;
use std::sync::Arc;

use bt_hci::param::ConnHandle;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::Duration;

use crate::config;
use crate::connection_manager::{Connection, ConnectionManager};
use crate::driver::{self, check, EventSink, EventSources, Op, RadioDriver};
use crate::event::{Event, EventKind};
use crate::event_sync::EventSync;
use crate::observer::Observer;
use crate::types::gatt::CharacteristicProps;
use crate::types::uuid::{BleUuid, Uuid};
use crate::Error;

/// Runtime settings of an [`Adapter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterConfig {
    /// How long a procedure waits for each response event.
    pub event_timeout: Duration,
    /// How long `connect` waits for the link to come up.
    pub connect_timeout: Duration,
    /// Attempts a write command gets while the transmit buffers are full.
    pub write_cmd_retries: u8,
    /// ATT MTU offered to peers that start an MTU exchange.
    pub att_mtu: u16,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            event_timeout: Duration::from_millis(config::EVENT_TIMEOUT_MS),
            connect_timeout: Duration::from_millis(config::CONNECT_TIMEOUT_MS),
            write_cmd_retries: config::WRITE_CMD_RETRIES,
            att_mtu: config::PREFERRED_ATT_MTU,
        }
    }
}

type Observers<D> = Vec<Arc<dyn Observer<D>>>;

/// A BLE central driven through a [`RadioDriver`].
///
/// Procedures are `async fn`s that issue a driver command and then wait for the event answering
/// it. The events are delivered by [`Adapter::run`], which must be running concurrently for any
/// procedure to complete.
pub struct Adapter<D: RadioDriver> {
    pub(crate) driver: D,
    pub(crate) config: AdapterConfig,
    pub(crate) connections: ConnectionManager,
    pub(crate) sync: EventSync,
    pub(crate) connecting: AtomicBool,
    observers: Mutex<CriticalSectionRawMutex, RefCell<Observers<D>>>,
    vendor_uuids: Mutex<CriticalSectionRawMutex, RefCell<heapless::Vec<([u8; 16], u8), { config::VENDOR_UUID_COUNT }>>>,
    sink: EventSink,
    sources: Mutex<CriticalSectionRawMutex, RefCell<Option<EventSources>>>,
}

impl<D: RadioDriver> Adapter<D> {
    pub fn new(driver: D, config: AdapterConfig) -> Self {
        let (sink, sources) = driver::channels();
        Self {
            driver,
            config,
            connections: ConnectionManager::new(crate::config::DEFAULT_ATT_MTU),
            sync: EventSync::new(),
            connecting: AtomicBool::new(false),
            observers: Mutex::new(RefCell::new(Vec::new())),
            vendor_uuids: Mutex::new(RefCell::new(heapless::Vec::new())),
            sink,
            sources: Mutex::new(RefCell::new(Some(sources))),
        }
    }

    /// The underlying driver.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// Open the driver, routing its callbacks to this adapter.
    pub fn open(&self) -> Result<(), Error> {
        check(Op::Open, self.driver.open(self.sink.clone()))?;
        info!("[adapter] driver opened");
        Ok(())
    }

    /// Close the driver and stop [`Adapter::run`] once the queued callbacks are drained.
    pub fn close(&self) -> Result<(), Error> {
        let res = check(Op::Close, self.driver.close());
        self.sink.close();
        info!("[adapter] driver closed");
        res
    }

    /// Subscribe an observer to driver events.
    pub fn observe(&self, observer: Arc<dyn Observer<D>>) {
        self.observers.lock(|o| o.borrow_mut().push(observer));
    }

    /// Remove a previously added observer.
    pub fn unobserve(&self, observer: &Arc<dyn Observer<D>>) {
        self.observers
            .lock(|o| o.borrow_mut().retain(|other| !Arc::ptr_eq(other, observer)));
    }

    pub(crate) fn observers(&self) -> Observers<D> {
        self.observers.lock(|o| o.borrow().clone())
    }

    pub(crate) fn take_sources(&self) -> Option<EventSources> {
        self.sources.lock(|s| s.borrow_mut().take())
    }

    /// Snapshot of a live connection.
    pub fn connection(&self, conn: ConnHandle) -> Option<Connection> {
        self.connections.connection(conn)
    }

    /// Handles of all live connections.
    pub fn connections(&self) -> Vec<ConnHandle> {
        self.connections.handles()
    }

    /// Negotiated ATT MTU of a connection.
    pub fn att_mtu(&self, conn: ConnHandle) -> Option<u16> {
        self.connections.att_mtu(conn)
    }

    /// Value handle of characteristic `uuid`, optionally looked up in service `service` only.
    pub fn value_handle(&self, conn: ConnHandle, uuid: &Uuid, service: Option<&Uuid>) -> Option<u16> {
        self.connections.value_handle(conn, uuid, service)
    }

    /// CCCD handle of characteristic `uuid`. `attr_handle` picks among characteristics sharing
    /// the UUID.
    pub fn cccd_handle(&self, conn: ConnHandle, uuid: &Uuid, attr_handle: Option<u16>) -> Option<u16> {
        self.connections.cccd_handle(conn, uuid, attr_handle)
    }

    /// Declaration handle of characteristic `uuid`.
    pub fn char_handle(&self, conn: ConnHandle, uuid: &Uuid) -> Option<u16> {
        self.connections.char_handle(conn, uuid)
    }

    /// UUID and properties of the characteristic owning `attr_handle`.
    pub fn attribute(&self, conn: ConnHandle, attr_handle: u16) -> Option<(Uuid, CharacteristicProps)> {
        self.connections.attribute(conn, attr_handle)
    }

    /// Issue a command and wait for the event answering it.
    ///
    /// The wait is armed before the command goes out. Returns `Ok(None)` on timeout or when the
    /// connection goes away.
    pub(crate) async fn request(
        &self,
        conn: ConnHandle,
        kind: EventKind,
        op: Op,
        cmd: impl FnOnce(&D) -> u32,
    ) -> Result<Option<Event>, Error> {
        let expectation = self.sync.expect(conn.raw(), kind);
        check(op, cmd(&self.driver))?;
        Ok(expectation.wait(self.config.event_timeout).await)
    }

    /// Type code of a registered vendor base, registering it with the driver if needed.
    pub(crate) fn vendor_kind(&self, base: [u8; 16]) -> Result<u8, Error> {
        if let Some(kind) = self.known_vendor_kind(&base) {
            return Ok(kind);
        }
        let mut kind = BleUuid::TYPE_UNKNOWN;
        check(Op::UuidVsAdd, self.driver.uuid_vs_add(&base, &mut kind))?;
        debug!("[adapter] registered vendor base {} as type {}", Uuid::from(base), kind);
        self.vendor_uuids.lock(|table| {
            let mut table = table.borrow_mut();
            if table.iter().any(|(b, _)| *b == base) {
                return Ok(());
            }
            table.push((base, kind)).map_err(|_| Error::OutOfMemory)
        })?;
        Ok(kind)
    }

    fn known_vendor_kind(&self, base: &[u8; 16]) -> Option<u8> {
        self.vendor_uuids
            .lock(|table| table.borrow().iter().find(|(b, _)| b == base).map(|(_, k)| *k))
    }

    /// Full UUID of a driver UUID. `None` for placeholders and unregistered type codes.
    pub(crate) fn resolve_uuid(&self, uuid: &BleUuid) -> Option<Uuid> {
        match uuid.kind {
            BleUuid::TYPE_UNKNOWN => None,
            BleUuid::TYPE_BLE => Some(Uuid::new_short(uuid.value)),
            kind => self.vendor_uuids.lock(|table| {
                table
                    .borrow()
                    .iter()
                    .find(|(_, k)| *k == kind)
                    .map(|(base, _)| Uuid::from_base(*base, uuid.value))
            }),
        }
    }
}
