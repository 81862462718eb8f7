use bt_hci::param::{ConnHandle, LeConnRole};
use embassy_futures::join::join;
use trouble_driver::driver::NRF_SUCCESS;
use trouble_driver::event::{
    conn_handle, ConnParamUpdate, Connected, DataLengthUpdate, DataLengthUpdateRequest, ExchangeMtuRequest, ExchangeMtuResponse,
    GapTimeout, PhyUpdate, PhyUpdateRequest, TimeoutSource,
};
use trouble_driver::event_sync::NO_CONN;
use trouble_driver::types::gap::{ConnParams, DataLengthParams, Phy, PhyParams, ScanParams};
use trouble_driver::types::gatt::GattStatus;
use trouble_driver::Event;

mod common;
use common::{Command, MockDriver};

fn mtu_peer(server_rx_mtu: u16) -> MockDriver {
    MockDriver::new(move |cmd, sink| {
        if let Command::ExchangeMtuRequest(conn, _) = cmd {
            sink.emit(
                *conn,
                &Event::ExchangeMtuResponse(ExchangeMtuResponse {
                    status: GattStatus::SUCCESS,
                    server_rx_mtu,
                }),
            );
        }
        NRF_SUCCESS
    })
}

#[tokio::test]
async fn mtu_is_the_smaller_of_both() {
    let adapter = common::adapter(mtu_peer(100));
    common::run(&adapter, async {
        let conn = common::link_up(&adapter, 3).await;
        assert_eq!(adapter.att_mtu(conn), Some(23));
        assert_eq!(adapter.exchange_mtu(conn, 150).await.unwrap(), 100);
        assert_eq!(adapter.att_mtu(conn), Some(100));
        assert!(adapter
            .driver()
            .commands()
            .contains(&Command::ExchangeMtuRequest(conn, 150)));
    })
    .await;
}

#[tokio::test]
async fn unanswered_mtu_exchange_keeps_mtu() {
    let adapter = common::adapter(MockDriver::silent());
    common::run(&adapter, async {
        let conn = common::link_up(&adapter, 3).await;
        assert_eq!(adapter.exchange_mtu(conn, 247).await.unwrap(), 23);
        assert_eq!(adapter.att_mtu(conn), Some(23));
    })
    .await;
}

#[tokio::test]
async fn peer_started_mtu_exchange() {
    let adapter = common::adapter(MockDriver::silent());
    common::run(&adapter, async {
        let conn = common::link_up(&adapter, 3).await;
        adapter
            .driver()
            .emit(3, Event::ExchangeMtuRequest(ExchangeMtuRequest { client_rx_mtu: 185 }));
        common::settle(&adapter, |a| a.att_mtu(conn) == Some(185)).await;
        assert!(adapter
            .driver()
            .commands()
            .contains(&Command::ExchangeMtuReply(conn, 247)));
    })
    .await;
}

#[tokio::test]
async fn peer_requests_are_accepted() {
    let adapter = common::adapter(MockDriver::silent());
    common::run(&adapter, async {
        let conn = common::link_up(&adapter, 3).await;
        let phys = PhyParams {
            tx_phys: Phy::LE_2M,
            rx_phys: Phy::LE_2M,
        };
        let params = ConnParams {
            min_conn_interval: 12,
            max_conn_interval: 12,
            slave_latency: 0,
            conn_sup_timeout: 200,
        };
        let driver = adapter.driver();
        driver.emit(3, Event::PhyUpdateRequest(PhyUpdateRequest { peer_preferred: phys }));
        driver.emit(
            3,
            Event::DataLengthUpdateRequest(DataLengthUpdateRequest {
                peer_params: DataLengthParams::default(),
            }),
        );
        driver.emit(3, Event::ConnParamUpdateRequest(ConnParamUpdate { params }));
        common::settle(&adapter, |a| a.driver().commands().len() >= 4).await;

        let commands = adapter.driver().commands();
        assert!(commands.contains(&Command::PhyUpdate(conn, phys)));
        assert!(commands.contains(&Command::DataLengthUpdate(conn, None)));
        assert!(commands.contains(&Command::ConnParamUpdate(conn, params)));
    })
    .await;
}

#[tokio::test]
async fn phy_and_data_length_updates() {
    let effective = DataLengthParams {
        max_tx_octets: 251,
        max_rx_octets: 251,
        max_tx_time_us: 2120,
        max_rx_time_us: 2120,
    };
    let adapter = common::adapter(MockDriver::new(move |cmd, sink| {
        match cmd {
            Command::PhyUpdate(conn, phys) => sink.emit(
                *conn,
                &Event::PhyUpdate(PhyUpdate {
                    status: 0,
                    tx_phy: phys.tx_phys.0,
                    rx_phy: phys.rx_phys.0,
                }),
            ),
            Command::DataLengthUpdate(conn, _) => {
                sink.emit(*conn, &Event::DataLengthUpdate(DataLengthUpdate { effective }))
            }
            _ => {}
        }
        NRF_SUCCESS
    }));
    common::run(&adapter, async {
        let conn = common::link_up(&adapter, 3).await;
        let phys = PhyParams {
            tx_phys: Phy::LE_2M,
            rx_phys: Phy::LE_1M,
        };
        let update = adapter.update_phy(conn, &phys).await.unwrap().unwrap();
        assert_eq!((update.tx_phy, update.rx_phy), (Phy::LE_2M.0, Phy::LE_1M.0));

        let update = adapter.update_data_length(conn, None).await.unwrap().unwrap();
        assert_eq!(update.effective, effective);
    })
    .await;
}

#[tokio::test]
async fn conn_param_update_is_stored() {
    let adapter = common::adapter(MockDriver::new(|cmd, sink| {
        if let Command::ConnParamUpdate(conn, params) = cmd {
            sink.emit(*conn, &Event::ConnParamUpdate(ConnParamUpdate { params: *params }));
        }
        NRF_SUCCESS
    }));
    common::run(&adapter, async {
        let conn = common::link_up(&adapter, 3).await;
        let params = ConnParams {
            min_conn_interval: 40,
            max_conn_interval: 80,
            slave_latency: 4,
            conn_sup_timeout: 600,
        };
        let update = adapter.conn_param_update(conn, &params).await.unwrap();
        assert_eq!(update, Some(ConnParamUpdate { params }));
        assert_eq!(adapter.connection(conn).unwrap().params, params);
    })
    .await;
}

#[tokio::test]
async fn connect_resolves_handle() {
    let adapter = common::adapter(MockDriver::new(|cmd, sink| {
        if let Command::Connect(peer) = cmd {
            sink.emit(
                ConnHandle::new(7),
                &Event::Connected(Connected {
                    peer: *peer,
                    role: LeConnRole::Central,
                    params: ConnParams::default(),
                }),
            );
        }
        NRF_SUCCESS
    }));
    common::run(&adapter, async {
        let peer = common::peer(0x42);
        let conn = adapter
            .connect(&peer, &ScanParams::default(), &ConnParams::default())
            .await
            .unwrap();
        assert_eq!(conn, Some(ConnHandle::new(7)));
        assert_eq!(adapter.connection(ConnHandle::new(7)).unwrap().peer, peer);
    })
    .await;
}

#[tokio::test]
async fn connect_ends_on_gap_timeout() {
    let adapter = common::adapter(MockDriver::new(|cmd, sink| {
        if let Command::Connect(_) = cmd {
            sink.emit(
                conn_handle(NO_CONN).unwrap(),
                &Event::GapTimeout(GapTimeout {
                    src: TimeoutSource::Conn,
                }),
            );
        }
        NRF_SUCCESS
    }));
    common::run(&adapter, async {
        let peer = common::peer(0x42);
        let start = std::time::Instant::now();
        let conn = adapter
            .connect(&peer, &ScanParams::default(), &ConnParams::default())
            .await
            .unwrap();
        assert_eq!(conn, None);
        assert!(start.elapsed() < std::time::Duration::from_millis(300));
        assert!(!adapter.driver().commands().contains(&Command::ConnectCancel));
    })
    .await;
}

#[tokio::test]
async fn concurrent_connect_is_dropped() {
    let adapter = common::adapter(MockDriver::silent());
    common::run(&adapter, async {
        let scan = ScanParams::default();
        let params = ConnParams::default();
        let (first, second) = join(
            adapter.connect(&common::peer(1), &scan, &params),
            adapter.connect(&common::peer(2), &scan, &params),
        )
        .await;
        assert_eq!(first.unwrap(), None);
        assert_eq!(second.unwrap(), None);

        let commands = adapter.driver().commands();
        let connects = commands.iter().filter(|c| matches!(c, Command::Connect(_))).count();
        assert_eq!(connects, 1);
        assert!(commands.contains(&Command::Connect(common::peer(1))));
        assert!(commands.contains(&Command::ConnectCancel));

        // The flag is clear again once the attempt timed out.
        let _ = adapter.connect(&common::peer(3), &scan, &params).await.unwrap();
        assert!(adapter.driver().commands().contains(&Command::Connect(common::peer(3))));
    })
    .await;
}

/// A driver that answers the connect command with `event` on `handle`.
fn answers_connect_with(handle: u16, event: Event) -> MockDriver {
    MockDriver::new(move |cmd, sink| {
        if let Command::Connect(_) = cmd {
            sink.emit(conn_handle(handle).unwrap(), &event);
        }
        NRF_SUCCESS
    })
}

fn connects(commands: &[Command]) -> usize {
    commands.iter().filter(|c| matches!(c, Command::Connect(_))).count()
}

#[tokio::test]
async fn peripheral_link_does_not_end_connect() {
    let adapter = common::adapter(answers_connect_with(
        3,
        Event::Connected(Connected {
            peer: common::peer(0x99),
            role: LeConnRole::Peripheral,
            params: ConnParams::default(),
        }),
    ));
    common::run(&adapter, async {
        let scan = ScanParams::default();
        let params = ConnParams::default();
        let start = std::time::Instant::now();
        let (first, second) = join(adapter.connect(&common::peer(1), &scan, &params), async {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            adapter.connect(&common::peer(2), &scan, &params).await
        })
        .await;
        assert_eq!(first.unwrap(), None);
        assert_eq!(second.unwrap(), None);
        assert!(start.elapsed() >= std::time::Duration::from_millis(250));

        let commands = adapter.driver().commands();
        assert_eq!(connects(&commands), 1);
        assert!(commands.contains(&Command::ConnectCancel));
        // The peripheral link itself is kept.
        assert_eq!(
            adapter.connection(ConnHandle::new(3)).unwrap().role,
            LeConnRole::Peripheral
        );
    })
    .await;
}

#[tokio::test]
async fn scan_timeout_does_not_end_connect() {
    let adapter = common::adapter(answers_connect_with(
        NO_CONN,
        Event::GapTimeout(GapTimeout {
            src: TimeoutSource::Scan,
        }),
    ));
    common::run(&adapter, async {
        let start = std::time::Instant::now();
        let conn = adapter
            .connect(&common::peer(1), &ScanParams::default(), &ConnParams::default())
            .await
            .unwrap();
        assert_eq!(conn, None);
        assert!(start.elapsed() >= std::time::Duration::from_millis(250));
        assert!(adapter.driver().commands().contains(&Command::ConnectCancel));
    })
    .await;
}

#[tokio::test]
async fn connect_returns_the_reported_handle() {
    // The driver reports the peer by its identity address, not the one connected to.
    let adapter = common::adapter(answers_connect_with(
        9,
        Event::Connected(Connected {
            peer: common::peer(0x77),
            role: LeConnRole::Central,
            params: ConnParams::default(),
        }),
    ));
    common::run(&adapter, async {
        let conn = adapter
            .connect(&common::peer(0x42), &ScanParams::default(), &ConnParams::default())
            .await
            .unwrap();
        assert_eq!(conn, Some(ConnHandle::new(9)));
        assert!(!adapter.driver().commands().contains(&Command::ConnectCancel));
    })
    .await;
}
