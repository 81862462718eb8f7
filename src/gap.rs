//! Link procedures: scanning, connection establishment and link negotiation.
use core::sync::atomic::Ordering;

use bt_hci::param::ConnHandle;
use embassy_futures::select::{select, Either};

use crate::adapter::Adapter;
use crate::driver::{check, Op, RadioDriver};
use crate::event::{conn_handle, ConnParamUpdate, DataLengthUpdate, Event, EventKind, PhyUpdate};
use crate::event_sync::NO_CONN;
use crate::types::gap::{ConnParams, DataLengthParams, PhyParams, ScanParams};
use crate::{Address, Error};

impl<D: RadioDriver> Adapter<D> {
    /// Start scanning. Advertising reports go to observers.
    pub fn scan_start(&self, params: &ScanParams) -> Result<(), Error> {
        check(Op::ScanStart, self.driver.gap_scan_start(params))
    }

    pub fn scan_stop(&self) -> Result<(), Error> {
        check(Op::ScanStop, self.driver.gap_scan_stop())
    }

    /// Connect to `peer` and wait for the link to come up.
    ///
    /// Only one connection attempt runs at a time: while one is outstanding, further calls are
    /// dropped and return `Ok(None)`. Also returns `Ok(None)` when the attempt times out, in
    /// which case it is cancelled. Links set up by peers in the peripheral role and scan or
    /// advertising timeouts do not end the attempt.
    pub async fn connect(
        &self,
        peer: &Address,
        scan: &ScanParams,
        params: &ConnParams,
    ) -> Result<Option<ConnHandle>, Error> {
        if self
            .connecting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("[link] connect to {:?} dropped, another attempt is outstanding", peer.addr);
            return Ok(None);
        }

        let connected = self.sync.expect(NO_CONN, EventKind::Connected);
        let timed_out = self.sync.expect(NO_CONN, EventKind::GapTimeout);
        if let Err(e) = check(Op::Connect, self.driver.gap_connect(peer, scan, params)) {
            self.connecting.store(false, Ordering::Release);
            return Err(e);
        }
        debug!("[link] connecting to {:?}", peer.addr);

        let timeout = self.config.connect_timeout;
        let outcome = match select(connected.wait_origin(timeout), timed_out.wait(timeout)).await {
            Either::First(Some((origin, Event::Connected(_)))) => {
                debug!("[link] connected to {:?} on conn {}", peer.addr, origin);
                conn_handle(origin).ok()
            }
            Either::Second(Some(event)) => {
                debug!("[link] connect to {:?} ended by {:?}", peer.addr, event);
                None
            }
            _ => {
                warn!("[link] connect to {:?} timed out, cancelling", peer.addr);
                self.connect_cancel()?;
                None
            }
        };
        self.connecting.store(false, Ordering::Release);
        Ok(outcome)
    }

    /// Cancel the outstanding connection attempt.
    pub fn connect_cancel(&self) -> Result<(), Error> {
        let res = check(Op::ConnectCancel, self.driver.gap_connect_cancel());
        self.connecting.store(false, Ordering::Release);
        res
    }

    /// Ask the driver to drop the link. The connection is forgotten when the disconnected event
    /// arrives.
    pub fn disconnect(&self, conn: ConnHandle, reason: u8) -> Result<(), Error> {
        check(Op::Disconnect, self.driver.gap_disconnect(conn, reason))
    }

    /// Request new connection parameters and wait for the update.
    pub async fn conn_param_update(
        &self,
        conn: ConnHandle,
        params: &ConnParams,
    ) -> Result<Option<ConnParamUpdate>, Error> {
        let event = self
            .request(conn, EventKind::ConnParamUpdate, Op::ConnParamUpdate, |d| {
                d.gap_conn_param_update(conn, params)
            })
            .await?;
        Ok(match event {
            Some(Event::ConnParamUpdate(e)) => Some(e),
            _ => None,
        })
    }

    /// Exchange ATT MTU with the peer.
    ///
    /// Returns the negotiated MTU, the smaller of `mtu` and the peer's, and stores it on the
    /// connection. If the peer does not answer in time the last known MTU is returned unchanged.
    pub async fn exchange_mtu(&self, conn: ConnHandle, mtu: u16) -> Result<u16, Error> {
        let current = self.connections.att_mtu(conn).ok_or(Error::NotFound)?;
        let event = self
            .request(conn, EventKind::ExchangeMtuResponse, Op::ExchangeMtuRequest, |d| {
                d.gattc_exchange_mtu_request(conn, mtu)
            })
            .await?;
        match event {
            Some(Event::ExchangeMtuResponse(rsp)) => {
                let negotiated = mtu.min(rsp.server_rx_mtu);
                debug!(
                    "[link] conn {} MTU {} (requested {}, peer {})",
                    conn.raw(),
                    negotiated,
                    mtu,
                    rsp.server_rx_mtu
                );
                self.connections.set_att_mtu(conn, negotiated)?;
                Ok(negotiated)
            }
            _ => {
                warn!("[link] conn {} MTU exchange unanswered, keeping {}", conn.raw(), current);
                Ok(current)
            }
        }
    }

    /// Request a PHY change and wait for the outcome.
    pub async fn update_phy(&self, conn: ConnHandle, phys: &PhyParams) -> Result<Option<PhyUpdate>, Error> {
        let event = self
            .request(conn, EventKind::PhyUpdate, Op::PhyUpdate, |d| d.gap_phy_update(conn, phys))
            .await?;
        Ok(match event {
            Some(Event::PhyUpdate(e)) => Some(e),
            _ => None,
        })
    }

    /// Request a data length update and wait for the effective parameters. `None` lets the
    /// driver pick.
    pub async fn update_data_length(
        &self,
        conn: ConnHandle,
        params: Option<&DataLengthParams>,
    ) -> Result<Option<DataLengthUpdate>, Error> {
        let event = self
            .request(conn, EventKind::DataLengthUpdate, Op::DataLengthUpdate, |d| {
                d.gap_data_length_update(conn, params)
            })
            .await?;
        Ok(match event {
            Some(Event::DataLengthUpdate(e)) => Some(e),
            _ => None,
        })
    }
}
