#![allow(unused)]
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration as StdDuration;

use bt_hci::param::{ConnHandle, LeConnRole};
use embassy_futures::select::{select, Either};
use embassy_time::Duration;
use trouble_driver::driver::{NRF_SUCCESS, RadioDriver};
use trouble_driver::event::Connected;
use trouble_driver::types::gap::{
    AuthKeyType, ConnParams, DataLengthParams, PhyParams, ScanParams, SecKeyset, SecParams, SecStatus,
};
use trouble_driver::types::gatt::{HandleRange, WriteParams};
use trouble_driver::types::uuid::BleUuid;
use trouble_driver::{Adapter, AdapterConfig, Address, Event, EventSink};

/// A command the adapter issued to the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Open,
    Close,
    ScanStart,
    ScanStop,
    Connect(Address),
    ConnectCancel,
    Disconnect(ConnHandle, u8),
    ConnParamUpdate(ConnHandle, ConnParams),
    Authenticate(ConnHandle, SecParams),
    SecParamsReply {
        conn: ConnHandle,
        status: SecStatus,
        params: Option<SecParams>,
        keyset: SecKeyset,
    },
    AuthKeyReply(ConnHandle, AuthKeyType, Option<Vec<u8>>),
    LescDhkeyReply(ConnHandle, [u8; 32]),
    PhyUpdate(ConnHandle, PhyParams),
    DataLengthUpdate(ConnHandle, Option<DataLengthParams>),
    UuidVsAdd([u8; 16]),
    ServicesDiscover(ConnHandle, u16, Option<BleUuid>),
    CharacteristicsDiscover(ConnHandle, HandleRange),
    DescriptorsDiscover(ConnHandle, HandleRange),
    Read(ConnHandle, u16, u16),
    Write(ConnHandle, WriteParams),
    HvConfirm(ConnHandle, u16),
    ExchangeMtuRequest(ConnHandle, u16),
    ExchangeMtuReply(ConnHandle, u16),
}

type Script = Box<dyn Fn(&Command, &EventSink) -> u32 + Send + Sync>;

/// A driver that records every command and answers through `script`, which may push events
/// the way a transport thread would.
pub struct MockDriver {
    sink: Mutex<Option<EventSink>>,
    commands: Mutex<Vec<Command>>,
    script: Script,
    next_vendor_type: Mutex<u8>,
}

impl MockDriver {
    pub fn new(script: impl Fn(&Command, &EventSink) -> u32 + Send + Sync + 'static) -> Self {
        Self {
            sink: Mutex::new(None),
            commands: Mutex::new(Vec::new()),
            script: Box::new(script),
            next_vendor_type: Mutex::new(BleUuid::TYPE_VENDOR_BEGIN),
        }
    }

    /// A driver that accepts every command and never answers.
    pub fn silent() -> Self {
        Self::new(|_, _| NRF_SUCCESS)
    }

    /// Commands issued so far.
    pub fn commands(&self) -> Vec<Command> {
        self.commands.lock().unwrap().clone()
    }

    /// The sink the adapter handed over on open.
    pub fn sink(&self) -> EventSink {
        self.sink.lock().unwrap().clone().expect("driver not open")
    }

    /// Push an event as if the transport reported it.
    pub fn emit(&self, conn: u16, event: Event) {
        let conn = trouble_driver::event::conn_handle(conn).unwrap();
        self.sink().emit(conn, &event);
    }

    fn issue(&self, command: Command) -> u32 {
        self.commands.lock().unwrap().push(command.clone());
        (self.script)(&command, &self.sink())
    }
}

impl RadioDriver for MockDriver {
    fn open(&self, sink: EventSink) -> u32 {
        self.commands.lock().unwrap().push(Command::Open);
        *self.sink.lock().unwrap() = Some(sink);
        NRF_SUCCESS
    }

    fn close(&self) -> u32 {
        self.commands.lock().unwrap().push(Command::Close);
        NRF_SUCCESS
    }

    fn gap_scan_start(&self, _params: &ScanParams) -> u32 {
        self.issue(Command::ScanStart)
    }

    fn gap_scan_stop(&self) -> u32 {
        self.issue(Command::ScanStop)
    }

    fn gap_connect(&self, peer: &Address, _scan: &ScanParams, _params: &ConnParams) -> u32 {
        self.issue(Command::Connect(*peer))
    }

    fn gap_connect_cancel(&self) -> u32 {
        self.issue(Command::ConnectCancel)
    }

    fn gap_disconnect(&self, conn: ConnHandle, reason: u8) -> u32 {
        self.issue(Command::Disconnect(conn, reason))
    }

    fn gap_conn_param_update(&self, conn: ConnHandle, params: &ConnParams) -> u32 {
        self.issue(Command::ConnParamUpdate(conn, *params))
    }

    fn gap_authenticate(&self, conn: ConnHandle, params: &SecParams) -> u32 {
        self.issue(Command::Authenticate(conn, *params))
    }

    fn gap_sec_params_reply(
        &self,
        conn: ConnHandle,
        status: SecStatus,
        params: Option<&SecParams>,
        keyset: &SecKeyset,
    ) -> u32 {
        self.issue(Command::SecParamsReply {
            conn,
            status,
            params: params.copied(),
            keyset: *keyset,
        })
    }

    fn gap_auth_key_reply(&self, conn: ConnHandle, key_type: AuthKeyType, key: Option<&[u8]>) -> u32 {
        self.issue(Command::AuthKeyReply(conn, key_type, key.map(|k| k.to_vec())))
    }

    fn gap_lesc_dhkey_reply(&self, conn: ConnHandle, dhkey: &[u8; 32]) -> u32 {
        self.issue(Command::LescDhkeyReply(conn, *dhkey))
    }

    fn gap_phy_update(&self, conn: ConnHandle, phys: &PhyParams) -> u32 {
        self.issue(Command::PhyUpdate(conn, *phys))
    }

    fn gap_data_length_update(&self, conn: ConnHandle, params: Option<&DataLengthParams>) -> u32 {
        self.issue(Command::DataLengthUpdate(conn, params.copied()))
    }

    fn uuid_vs_add(&self, base: &[u8; 16], kind: &mut u8) -> u32 {
        let code = self.issue(Command::UuidVsAdd(*base));
        let mut next = self.next_vendor_type.lock().unwrap();
        *kind = *next;
        *next += 1;
        code
    }

    fn gattc_primary_services_discover(&self, conn: ConnHandle, start: u16, uuid: Option<&BleUuid>) -> u32 {
        self.issue(Command::ServicesDiscover(conn, start, uuid.copied()))
    }

    fn gattc_characteristics_discover(&self, conn: ConnHandle, range: HandleRange) -> u32 {
        self.issue(Command::CharacteristicsDiscover(conn, range))
    }

    fn gattc_descriptors_discover(&self, conn: ConnHandle, range: HandleRange) -> u32 {
        self.issue(Command::DescriptorsDiscover(conn, range))
    }

    fn gattc_read(&self, conn: ConnHandle, handle: u16, offset: u16) -> u32 {
        self.issue(Command::Read(conn, handle, offset))
    }

    fn gattc_write(&self, conn: ConnHandle, params: &WriteParams) -> u32 {
        self.issue(Command::Write(conn, params.clone()))
    }

    fn gattc_hv_confirm(&self, conn: ConnHandle, handle: u16) -> u32 {
        self.issue(Command::HvConfirm(conn, handle))
    }

    fn gattc_exchange_mtu_request(&self, conn: ConnHandle, mtu: u16) -> u32 {
        self.issue(Command::ExchangeMtuRequest(conn, mtu))
    }

    fn gatts_exchange_mtu_reply(&self, conn: ConnHandle, mtu: u16) -> u32 {
        self.issue(Command::ExchangeMtuReply(conn, mtu))
    }
}

pub fn config() -> AdapterConfig {
    AdapterConfig {
        event_timeout: Duration::from_millis(200),
        connect_timeout: Duration::from_millis(300),
        ..AdapterConfig::default()
    }
}

/// An opened adapter over `driver`.
pub fn adapter(driver: MockDriver) -> Adapter<MockDriver> {
    let _ = env_logger::try_init();
    let adapter = Adapter::new(driver, config());
    adapter.open().unwrap();
    adapter
}

/// Run `body` while the dispatcher drains the driver's queues.
pub async fn run<T>(adapter: &Adapter<MockDriver>, body: impl Future<Output = T>) -> T {
    match select(adapter.run(), body).await {
        Either::First(res) => panic!("dispatcher stopped early: {:?}", res),
        Either::Second(value) => value,
    }
}

pub fn peer(n: u16) -> Address {
    let [lo, hi] = n.to_le_bytes();
    Address::random([lo, hi, 0x33, 0x44, 0x55, 0xC6])
}

/// Bring up a central link on `handle` and wait until the adapter knows it.
pub async fn link_up(adapter: &Adapter<MockDriver>, handle: u16) -> ConnHandle {
    let conn = ConnHandle::new(handle);
    adapter.driver().emit(
        handle,
        Event::Connected(Connected {
            peer: peer(handle),
            role: LeConnRole::Central,
            params: ConnParams::default(),
        }),
    );
    settle(adapter, |a| a.connection(conn).is_some()).await;
    conn
}

/// Wait until `cond` holds, giving the dispatcher a chance to run in between.
pub async fn settle(adapter: &Adapter<MockDriver>, cond: impl Fn(&Adapter<MockDriver>) -> bool) {
    for _ in 0..200 {
        if cond(adapter) {
            return;
        }
        tokio::time::sleep(StdDuration::from_millis(1)).await;
    }
    panic!("condition not reached");
}
