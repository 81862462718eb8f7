use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use bt_hci::param::ConnHandle;
use trouble_driver::driver::{BLE_ERROR_NO_TX_PACKETS, NRF_ERROR_RESOURCES, NRF_SUCCESS};
use trouble_driver::event::{
    CharacteristicDiscoveryResponse, DescriptorDiscoveryResponse, DiscoveredCharacteristic, DiscoveredDescriptor,
    DiscoveredService, HandleValue, ReadResponse, ServiceDiscoveryResponse, TxComplete, WriteResponse,
};
use trouble_driver::types::gatt::{
    CharacteristicProp, CharacteristicProps, ExecWriteFlag, GattStatus, HvxKind, WriteOp, WriteParams,
};
use trouble_driver::types::uuid::BleUuid;
use trouble_driver::{Adapter, AdapterConfig, Error, Event, EventSink, HandlerResult, Observer, Uuid};

mod common;
use common::{Command, MockDriver};

const HEART_RATE_MEASUREMENT: u16 = 0x2A37;
const BODY_SENSOR_LOCATION: u16 = 0x2A38;
const SECRET_HANDLE: u16 = 0x0007;

/// Heart rate service at 0x0001..=0x0010: measurement (value 0x0003, CCCD 0x0004) and body
/// sensor location (value 0x0006, no CCCD).
fn peripheral(cmd: &Command, sink: &EventSink) -> u32 {
    match cmd {
        Command::ServicesDiscover(conn, start, None) => {
            let (status, services) = if *start == 0x0001 {
                (
                    GattStatus::SUCCESS,
                    vec![DiscoveredService {
                        uuid: BleUuid::sig(0x180D),
                        start_handle: 0x0001,
                        end_handle: 0x0010,
                    }],
                )
            } else {
                (GattStatus::ATTRIBUTE_NOT_FOUND, Vec::new())
            };
            sink.emit(
                *conn,
                &Event::PrimaryServiceDiscovery(ServiceDiscoveryResponse { status, services }),
            );
        }
        Command::CharacteristicsDiscover(conn, range) => {
            let props = CharacteristicProps::from(&[CharacteristicProp::Notify, CharacteristicProp::Indicate][..]);
            let characteristics: Vec<_> = [(HEART_RATE_MEASUREMENT, 0x0002), (BODY_SENSOR_LOCATION, 0x0005)]
                .into_iter()
                .filter(|(_, decl)| range.contains(*decl))
                .map(|(uuid, decl)| DiscoveredCharacteristic {
                    uuid: BleUuid::sig(uuid),
                    props,
                    decl_handle: decl,
                    value_handle: decl + 1,
                })
                .collect();
            let status = if characteristics.is_empty() {
                GattStatus::ATTRIBUTE_NOT_FOUND
            } else {
                GattStatus::SUCCESS
            };
            sink.emit(
                *conn,
                &Event::CharacteristicDiscovery(CharacteristicDiscoveryResponse {
                    status,
                    characteristics,
                }),
            );
        }
        Command::DescriptorsDiscover(conn, range) => {
            let descriptors: Vec<_> = if range.contains(0x0004) {
                vec![DiscoveredDescriptor {
                    uuid: BleUuid::sig(0x2902),
                    handle: 0x0004,
                }]
            } else {
                Vec::new()
            };
            let status = if descriptors.is_empty() {
                GattStatus::ATTRIBUTE_NOT_FOUND
            } else {
                GattStatus::SUCCESS
            };
            sink.emit(
                *conn,
                &Event::DescriptorDiscovery(DescriptorDiscoveryResponse { status, descriptors }),
            );
        }
        Command::Read(conn, handle, offset) => {
            let (status, data) = if *handle == SECRET_HANDLE {
                (GattStatus::INSUFFICIENT_AUTHENTICATION, Vec::new())
            } else {
                (GattStatus::SUCCESS, vec![0x01, 0x02, 0x03])
            };
            sink.emit(
                *conn,
                &Event::ReadResponse(ReadResponse {
                    status,
                    handle: *handle,
                    offset: *offset,
                    data,
                }),
            );
        }
        Command::Write(conn, params) if params.op != WriteOp::WriteCmd => {
            let status = if params.handle == SECRET_HANDLE {
                GattStatus::WRITE_NOT_PERMITTED
            } else {
                GattStatus::SUCCESS
            };
            sink.emit(
                *conn,
                &Event::WriteResponse(WriteResponse {
                    status,
                    op: params.op,
                    handle: params.handle,
                    offset: params.offset,
                    data: params.data.clone(),
                }),
            );
        }
        _ => {}
    }
    NRF_SUCCESS
}

fn writes(adapter: &Adapter<MockDriver>) -> Vec<WriteParams> {
    adapter
        .driver()
        .commands()
        .into_iter()
        .filter_map(|c| match c {
            Command::Write(_, params) => Some(params),
            _ => None,
        })
        .collect()
}

async fn discovered(adapter: &Adapter<MockDriver>) -> ConnHandle {
    let conn = common::link_up(adapter, 1).await;
    assert_eq!(adapter.discover(conn).await.unwrap(), Some(GattStatus::SUCCESS));
    conn
}

#[tokio::test]
async fn read_returns_value_only_on_success() {
    let adapter = common::adapter(MockDriver::new(peripheral));
    common::run(&adapter, async {
        let conn = common::link_up(&adapter, 1).await;
        assert_eq!(
            adapter.read(conn, 0x0003, 0).await.unwrap(),
            Some((GattStatus::SUCCESS, Some(vec![0x01, 0x02, 0x03])))
        );
        assert_eq!(
            adapter.read(conn, SECRET_HANDLE, 0).await.unwrap(),
            Some((GattStatus::INSUFFICIENT_AUTHENTICATION, None))
        );
    })
    .await;
}

#[tokio::test]
async fn write_request_reports_peer_status() {
    let adapter = common::adapter(MockDriver::new(peripheral));
    common::run(&adapter, async {
        let conn = common::link_up(&adapter, 1).await;
        assert_eq!(
            adapter.write_req(conn, 0x0006, &[0x01]).await.unwrap(),
            Some(GattStatus::SUCCESS)
        );
        assert_eq!(
            adapter.write_req(conn, SECRET_HANDLE, &[0x01]).await.unwrap(),
            Some(GattStatus::WRITE_NOT_PERMITTED)
        );
    })
    .await;
}

#[tokio::test]
async fn queued_write() {
    let adapter = common::adapter(MockDriver::new(peripheral));
    common::run(&adapter, async {
        let conn = common::link_up(&adapter, 1).await;
        let status = adapter.write_prep(conn, 0x0006, 0, &[0xAA; 18]).await.unwrap();
        assert_eq!(status, Some(GattStatus::SUCCESS));
        let status = adapter.write_prep(conn, 0x0006, 18, &[0xBB; 4]).await.unwrap();
        assert_eq!(status, Some(GattStatus::SUCCESS));
        let status = adapter.write_exec(conn, ExecWriteFlag::Write).await.unwrap();
        assert_eq!(status, Some(GattStatus::SUCCESS));

        let writes = writes(&adapter);
        assert_eq!(writes.len(), 3);
        assert_eq!(writes[1].op, WriteOp::PrepareWriteReq);
        assert_eq!(writes[1].offset, 18);
        assert_eq!(writes[2].op, WriteOp::ExecuteWriteReq);
        assert_eq!(writes[2].flags, ExecWriteFlag::Write);
    })
    .await;
}

#[tokio::test]
async fn write_command_waits_for_tx_buffers() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let seen = attempts.clone();
    let adapter = common::adapter(MockDriver::new(move |cmd, sink| match cmd {
        Command::Write(conn, params) if params.op == WriteOp::WriteCmd => {
            if seen.fetch_add(1, Ordering::SeqCst) < 2 {
                sink.emit(*conn, &Event::TxComplete(TxComplete { count: 1 }));
                BLE_ERROR_NO_TX_PACKETS
            } else {
                NRF_SUCCESS
            }
        }
        _ => NRF_SUCCESS,
    }));
    common::run(&adapter, async {
        let conn = common::link_up(&adapter, 1).await;
        let start = std::time::Instant::now();
        adapter.write_cmd(conn, 0x0006, &[0x01, 0x02]).await.unwrap();
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        // Every wait was answered by a transmit complete, none ran into the timeout.
        assert!(start.elapsed() < std::time::Duration::from_millis(200));
        assert!(writes(&adapter).iter().all(|w| w.data == [0x01, 0x02]));
    })
    .await;
}

#[tokio::test]
async fn write_command_gives_up() {
    let adapter = common::adapter(MockDriver::new(|cmd, sink| match cmd {
        Command::Write(conn, _) => {
            sink.emit(*conn, &Event::TxComplete(TxComplete { count: 1 }));
            NRF_ERROR_RESOURCES
        }
        _ => NRF_SUCCESS,
    }));
    common::run(&adapter, async {
        let conn = common::link_up(&adapter, 1).await;
        let err = adapter.write_cmd(conn, 0x0006, &[0x01]).await.unwrap_err();
        assert_eq!(err, Error::TxBufferExhausted { attempts: 10 });
        assert_eq!(writes(&adapter).len(), 10);
    })
    .await;
}

#[tokio::test]
async fn write_command_without_retries_is_sent_once() {
    let _ = env_logger::try_init();
    let driver = MockDriver::new(|cmd, _| match cmd {
        Command::Write(..) => NRF_ERROR_RESOURCES,
        _ => NRF_SUCCESS,
    });
    let adapter = Adapter::new(
        driver,
        AdapterConfig {
            write_cmd_retries: 0,
            ..common::config()
        },
    );
    adapter.open().unwrap();
    common::run(&adapter, async {
        let conn = common::link_up(&adapter, 1).await;
        let err = adapter.write_cmd(conn, 0x0006, &[0x01]).await.unwrap_err();
        assert_eq!(err, Error::TxBufferExhausted { attempts: 1 });
        assert_eq!(writes(&adapter).len(), 1);
    })
    .await;
}

#[tokio::test]
async fn write_command_failure_is_not_retried() {
    let adapter = common::adapter(MockDriver::new(|cmd, _| match cmd {
        Command::Write(..) => 0x3002,
        _ => NRF_SUCCESS,
    }));
    common::run(&adapter, async {
        let conn = common::link_up(&adapter, 1).await;
        let err = adapter.write_cmd(conn, 0x0006, &[0x01]).await.unwrap_err();
        assert!(matches!(err, Error::Driver(e) if e.code == 0x3002));
        assert_eq!(writes(&adapter).len(), 1);
    })
    .await;
}

#[tokio::test]
async fn cccd_values() {
    let adapter = common::adapter(MockDriver::new(peripheral));
    common::run(&adapter, async {
        let conn = discovered(&adapter).await;
        let hrm = Uuid::new_short(HEART_RATE_MEASUREMENT);
        let ok = Some(GattStatus::SUCCESS);
        assert_eq!(adapter.enable_notification(conn, &hrm, None).await.unwrap(), ok);
        assert_eq!(adapter.enable_indication(conn, &hrm, None).await.unwrap(), ok);
        assert_eq!(adapter.disable_notification(conn, &hrm, None).await.unwrap(), ok);
        assert_eq!(adapter.disable_indication(conn, &hrm, Some(0x0003)).await.unwrap(), ok);

        let written: Vec<(u16, Vec<u8>)> = writes(&adapter)
            .into_iter()
            .map(|w| {
                assert_eq!(w.op, WriteOp::WriteReq);
                (w.handle, w.data)
            })
            .collect();
        assert_eq!(
            written,
            vec![
                (0x0004, vec![1, 0]),
                (0x0004, vec![2, 0]),
                (0x0004, vec![0, 0]),
                (0x0004, vec![0, 0]),
            ]
        );
    })
    .await;
}

#[tokio::test]
async fn missing_cccd_is_an_error() {
    let adapter = common::adapter(MockDriver::new(peripheral));
    common::run(&adapter, async {
        let conn = discovered(&adapter).await;
        let location = Uuid::new_short(BODY_SENSOR_LOCATION);
        assert_eq!(
            adapter.enable_notification(conn, &location, None).await,
            Err(Error::CccdNotFound)
        );
        assert!(writes(&adapter).is_empty());
    })
    .await;
}

#[derive(Default)]
struct Values {
    notifications: AtomicUsize,
    indications: AtomicUsize,
    confirmed_before_observer: AtomicBool,
}

impl Observer<MockDriver> for Values {
    fn on_notification(&self, _: &Adapter<MockDriver>, _: ConnHandle, _: &HandleValue) -> HandlerResult {
        self.notifications.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn on_indication(&self, adapter: &Adapter<MockDriver>, _: ConnHandle, _: &HandleValue) -> HandlerResult {
        self.indications.fetch_add(1, Ordering::SeqCst);
        if adapter
            .driver()
            .commands()
            .iter()
            .any(|c| matches!(c, Command::HvConfirm(..)))
        {
            self.confirmed_before_observer.store(true, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[tokio::test]
async fn indications_are_confirmed_once() {
    let adapter = common::adapter(MockDriver::silent());
    let values = Arc::new(Values::default());
    adapter.observe(values.clone());
    common::run(&adapter, async {
        let conn = common::link_up(&adapter, 1).await;
        for kind in [HvxKind::Notification, HvxKind::Indication] {
            adapter.driver().emit(
                1,
                Event::HandleValue(HandleValue {
                    kind,
                    handle: 0x0003,
                    data: vec![0x06, 0x48],
                }),
            );
        }
        common::settle(&adapter, |a| {
            a.driver()
                .commands()
                .iter()
                .any(|c| matches!(c, Command::HvConfirm(..)))
        })
        .await;

        assert_eq!(values.notifications.load(Ordering::SeqCst), 1);
        assert_eq!(values.indications.load(Ordering::SeqCst), 1);
        assert!(!values.confirmed_before_observer.load(Ordering::SeqCst));
        let confirms: Vec<_> = adapter
            .driver()
            .commands()
            .into_iter()
            .filter(|c| matches!(c, Command::HvConfirm(..)))
            .collect();
        assert_eq!(confirms, vec![Command::HvConfirm(conn, 0x0003)]);
    })
    .await;
}
