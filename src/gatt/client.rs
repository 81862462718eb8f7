//! Reads, writes and notification control.
use bt_hci::param::ConnHandle;

use crate::adapter::Adapter;
use crate::driver::{check, Op, RadioDriver, TX_EXHAUSTED};
use crate::event::{Event, EventKind};
use crate::types::gatt::{Cccd, ExecWriteFlag, GattStatus, WriteOp, WriteParams};
use crate::types::uuid::Uuid;
use crate::Error;

impl<D: RadioDriver> Adapter<D> {
    /// Read the attribute at `handle` starting at `offset`.
    ///
    /// Returns the status reported by the peer and, if it is a success, the value.
    pub async fn read(
        &self,
        conn: ConnHandle,
        handle: u16,
        offset: u16,
    ) -> Result<Option<(GattStatus, Option<Vec<u8>>)>, Error> {
        let event = self
            .request(conn, EventKind::ReadResponse, Op::Read, |d| d.gattc_read(conn, handle, offset))
            .await?;
        Ok(match event {
            Some(Event::ReadResponse(rsp)) if rsp.status.is_success() => Some((rsp.status, Some(rsp.data))),
            Some(Event::ReadResponse(rsp)) => {
                debug!("[gatt] conn {} read {:#06x}: {}", conn.raw(), handle, rsp.status);
                Some((rsp.status, None))
            }
            _ => None,
        })
    }

    async fn write_and_wait(&self, conn: ConnHandle, params: &WriteParams) -> Result<Option<GattStatus>, Error> {
        let event = self
            .request(conn, EventKind::WriteResponse, Op::Write, |d| d.gattc_write(conn, params))
            .await?;
        Ok(match event {
            Some(Event::WriteResponse(rsp)) => {
                if !rsp.status.is_success() {
                    debug!("[gatt] conn {} {:?} {:#06x}: {}", conn.raw(), params.op, params.handle, rsp.status);
                }
                Some(rsp.status)
            }
            _ => None,
        })
    }

    /// Write `data` to `handle` and wait for the peer to acknowledge it.
    pub async fn write_req(&self, conn: ConnHandle, handle: u16, data: &[u8]) -> Result<Option<GattStatus>, Error> {
        self.write_and_wait(conn, &WriteParams::new(WriteOp::WriteReq, handle, 0, data))
            .await
    }

    /// Queue part of a long write on the peer. Applied by [`Adapter::write_exec`].
    pub async fn write_prep(
        &self,
        conn: ConnHandle,
        handle: u16,
        offset: u16,
        data: &[u8],
    ) -> Result<Option<GattStatus>, Error> {
        self.write_and_wait(conn, &WriteParams::new(WriteOp::PrepareWriteReq, handle, offset, data))
            .await
    }

    /// Apply or discard the writes queued on the peer.
    pub async fn write_exec(&self, conn: ConnHandle, flag: ExecWriteFlag) -> Result<Option<GattStatus>, Error> {
        let mut params = WriteParams::new(WriteOp::ExecuteWriteReq, 0, 0, &[]);
        params.flags = flag;
        self.write_and_wait(conn, &params).await
    }

    /// Write `data` to `handle` without response.
    ///
    /// While the driver has no transmit buffer left, waits for a transmit complete event and
    /// tries again, up to the configured number of attempts.
    pub async fn write_cmd(&self, conn: ConnHandle, handle: u16, data: &[u8]) -> Result<(), Error> {
        let params = WriteParams::new(WriteOp::WriteCmd, handle, 0, data);
        let attempts = self.config.write_cmd_retries.max(1);
        for attempt in 1..=attempts {
            let tx_complete = self.sync.expect(conn.raw(), EventKind::TxComplete);
            let code = self.driver.gattc_write(conn, &params);
            if !TX_EXHAUSTED.contains(&code) {
                return check(Op::Write, code);
            }
            trace!("[gatt] conn {} write command {}/{} found no tx buffer", conn.raw(), attempt, attempts);
            if attempt == attempts {
                break;
            }
            if tx_complete.wait(self.config.event_timeout).await.is_none() {
                debug!("[gatt] conn {} no tx complete, retrying anyway", conn.raw());
            }
        }
        warn!("[gatt] conn {} write command to {:#06x} dropped", conn.raw(), handle);
        Err(Error::TxBufferExhausted { attempts })
    }

    /// Write `value` to the CCCD of characteristic `uuid`.
    ///
    /// `attr_handle` picks among characteristics sharing the UUID. Fails with
    /// [`Error::CccdNotFound`] if the characteristic has no CCCD.
    pub async fn set_cccd(
        &self,
        conn: ConnHandle,
        uuid: &Uuid,
        attr_handle: Option<u16>,
        value: Cccd,
    ) -> Result<Option<GattStatus>, Error> {
        let handle = self
            .connections
            .cccd_handle(conn, uuid, attr_handle)
            .ok_or(Error::CccdNotFound)?;
        debug!("[gatt] conn {} CCCD {:#06x} of {} <- {:?}", conn.raw(), handle, uuid, value);
        self.write_req(conn, handle, &value.to_bytes()).await
    }

    pub async fn enable_notification(
        &self,
        conn: ConnHandle,
        uuid: &Uuid,
        attr_handle: Option<u16>,
    ) -> Result<Option<GattStatus>, Error> {
        self.set_cccd(conn, uuid, attr_handle, Cccd::NOTIFY).await
    }

    pub async fn disable_notification(
        &self,
        conn: ConnHandle,
        uuid: &Uuid,
        attr_handle: Option<u16>,
    ) -> Result<Option<GattStatus>, Error> {
        self.set_cccd(conn, uuid, attr_handle, Cccd::DISABLED).await
    }

    pub async fn enable_indication(
        &self,
        conn: ConnHandle,
        uuid: &Uuid,
        attr_handle: Option<u16>,
    ) -> Result<Option<GattStatus>, Error> {
        self.set_cccd(conn, uuid, attr_handle, Cccd::INDICATE).await
    }

    pub async fn disable_indication(
        &self,
        conn: ConnHandle,
        uuid: &Uuid,
        attr_handle: Option<u16>,
    ) -> Result<Option<GattStatus>, Error> {
        self.set_cccd(conn, uuid, attr_handle, Cccd::DISABLED).await
    }
}
