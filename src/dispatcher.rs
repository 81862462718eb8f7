//! Event dispatch: the workers draining the driver's callback queues.
//!
//! Each protocol event goes through the same steps, in order: connection store bookkeeping,
//! synchronizer delivery, built-in replies to peer requests, observers, then the follow-ups that
//! must come after observers (indication confirmation, connection teardown).
use core::sync::atomic::Ordering;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use bt_hci::param::{ConnHandle, LeConnRole};
use embassy_futures::join::join3;
use futures::channel::mpsc::UnboundedReceiver;
use futures::StreamExt;

use crate::adapter::Adapter;
use crate::driver::{check, DriverLog, DriverStatus, Op, RadioDriver, RawEvent};
use crate::event::{Event, TimeoutSource};
use crate::event_sync::NO_CONN;
use crate::observer::{self, HandlerResult};
use crate::types::gatt::HvxKind;
use crate::Error;

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}

impl<D: RadioDriver> Adapter<D> {
    /// Run the dispatcher until the adapter is closed.
    ///
    /// Drives one worker per driver callback queue (protocol events, status, log). Must run
    /// concurrently with every procedure. Returns [`Error::AlreadyRunning`] if called twice.
    pub async fn run(&self) -> Result<(), Error> {
        let sources = self.take_sources().ok_or(Error::AlreadyRunning)?;
        info!("[dispatch] running");
        join3(
            self.run_events(sources.events),
            self.run_status(sources.status),
            self.run_log(sources.log),
        )
        .await;
        info!("[dispatch] stopped");
        Ok(())
    }

    async fn run_events(&self, mut events: UnboundedReceiver<RawEvent>) {
        while let Some(raw) = events.next().await {
            self.handle_raw(&raw);
        }
        debug!("[dispatch] event queue closed");
    }

    async fn run_status(&self, mut status: UnboundedReceiver<DriverStatus>) {
        while let Some(record) = status.next().await {
            info!("[driver] status {}: {}", record.code, record.message);
            for observer in self.observers() {
                let res = catch_unwind(AssertUnwindSafe(|| observer.on_driver_status(self, &record)));
                Self::report("driver status", None, res);
            }
        }
        debug!("[dispatch] status queue closed");
    }

    async fn run_log(&self, mut records: UnboundedReceiver<DriverLog>) {
        while let Some(record) = records.next().await {
            log::log!(log::Level::from(record.severity), "[driver] {}", record.message);
            for observer in self.observers() {
                let res = catch_unwind(AssertUnwindSafe(|| observer.on_driver_log(self, &record)));
                Self::report("driver log", None, res);
            }
        }
        debug!("[dispatch] log queue closed");
    }

    fn handle_raw(&self, raw: &RawEvent) {
        match Event::decode(raw) {
            Ok((conn, event)) => self.handle_event(conn, event),
            Err(e) => warn!("[dispatch] dropping event: {}", e),
        }
    }

    fn handle_event(&self, conn: ConnHandle, event: Event) {
        trace!("[dispatch] conn {} {:?}", conn.raw(), event);
        match &event {
            Event::Connected(e) => {
                self.connections.on_connected(conn, e.peer, e.role, e.params);
                self.sync.register(conn.raw());
            }
            Event::ConnParamUpdate(e) => {
                if self.connections.set_params(conn, e.params).is_err() {
                    warn!("[dispatch] conn {} parameter update for unknown link", conn.raw());
                }
            }
            _ => {}
        }

        // Only outcomes of an outbound connection attempt go to the pseudo connection.
        let ends_attempt = match &event {
            Event::Connected(e) => e.role == LeConnRole::Central,
            Event::GapTimeout(e) => e.src == TimeoutSource::Conn,
            _ => false,
        };
        if ends_attempt {
            self.sync.forward(conn.raw(), NO_CONN, event.clone());
        }
        if conn.raw() != NO_CONN {
            self.sync.notify(conn.raw(), event.clone());
        }

        self.react(conn, &event);

        let kind = event.kind();
        for observer in self.observers() {
            let res = catch_unwind(AssertUnwindSafe(|| observer::dispatch(&*observer, self, conn, &event)));
            Self::report(kind, Some(conn), res);
        }

        match &event {
            Event::HandleValue(e) if e.kind == HvxKind::Indication => {
                if let Err(e) = check(Op::HvConfirm, self.driver.gattc_hv_confirm(conn, e.handle)) {
                    warn!("[dispatch] conn {} indication not confirmed: {}", conn.raw(), e);
                }
            }
            Event::Disconnected(e) => {
                self.connections.on_disconnected(conn, e.reason);
                self.sync.remove(conn.raw());
            }
            _ => {}
        }
    }

    /// Built-in handling of peer requests and link bookkeeping.
    fn react(&self, conn: ConnHandle, event: &Event) {
        let res = match event {
            Event::Connected(e) if e.role == LeConnRole::Central => {
                self.connecting.store(false, Ordering::Release);
                Ok(())
            }
            Event::GapTimeout(e) if e.src == TimeoutSource::Conn => {
                self.connecting.store(false, Ordering::Release);
                Ok(())
            }
            Event::ExchangeMtuRequest(e) => {
                let mtu = self.config.att_mtu;
                check(Op::ExchangeMtuReply, self.driver.gatts_exchange_mtu_reply(conn, mtu)).and_then(|_| {
                    let negotiated = e.client_rx_mtu.min(mtu).max(crate::config::DEFAULT_ATT_MTU);
                    debug!("[dispatch] conn {} peer started MTU exchange, using {}", conn.raw(), negotiated);
                    self.connections.set_att_mtu(conn, negotiated)
                })
            }
            Event::PhyUpdateRequest(e) => check(Op::PhyUpdate, self.driver.gap_phy_update(conn, &e.peer_preferred)),
            Event::DataLengthUpdateRequest(_) => {
                check(Op::DataLengthUpdate, self.driver.gap_data_length_update(conn, None))
            }
            Event::ConnParamUpdateRequest(e) => {
                check(Op::ConnParamUpdate, self.driver.gap_conn_param_update(conn, &e.params))
            }
            _ => Ok(()),
        };
        if let Err(e) = res {
            warn!("[dispatch] conn {} reply to {:?} failed: {}", conn.raw(), event.kind(), e);
        }
    }

    fn report(what: impl core::fmt::Debug, conn: Option<ConnHandle>, res: std::thread::Result<HandlerResult>) {
        let conn = conn.map(|c| c.raw() as i32).unwrap_or(-1);
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!("[dispatch] conn {} observer failed on {:?}: {}", conn, what, e);
                let mut source = e.source();
                while let Some(cause) = source {
                    warn!("[dispatch]   caused by: {}", cause);
                    source = cause.source();
                }
            }
            Err(panic) => {
                error!(
                    "[dispatch] conn {} observer panicked on {:?}: {}",
                    conn,
                    what,
                    panic_message(&*panic)
                );
            }
        }
    }
}
