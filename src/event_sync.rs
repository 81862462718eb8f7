//! Per connection wait/notify on protocol events.
//!
//! Every (connection, event kind) pair owns a slot holding the latest event delivered to it and
//! the tasks parked on it. Delivering an event bumps the slot generation and wakes every parked
//! task; a waiter resolves with the latest event once the generation moved past the one it
//! started from. There is no queue: two events delivered before the waiter runs collapse into the
//! second one.
use core::cell::RefCell;
use core::future::poll_fn;
use core::task::{Context, Poll};
use std::collections::HashMap;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::waitqueue::MultiWakerRegistration;
use embassy_time::{with_timeout, Duration};

use crate::config;
use crate::event::{Event, EventKind};

/// Pseudo connection handle carrying events that belong to no link yet.
pub const NO_CONN: u16 = 0xFFFF;

struct Slot {
    generation: u64,
    /// Latest event and the connection it was reported on.
    latest: Option<(u16, Event)>,
    waiters: MultiWakerRegistration<{ config::EVENT_SYNC_WAITERS }>,
}

impl Default for Slot {
    fn default() -> Self {
        Self {
            generation: 0,
            latest: None,
            waiters: MultiWakerRegistration::new(),
        }
    }
}

struct ConnSlots {
    epoch: u64,
    slots: HashMap<EventKind, Slot>,
}

impl ConnSlots {
    fn wake_all(&mut self) {
        for slot in self.slots.values_mut() {
            slot.waiters.wake();
        }
    }
}

struct State {
    next_epoch: u64,
    conns: HashMap<u16, ConnSlots>,
}

/// The event synchronizer.
pub struct EventSync {
    state: Mutex<CriticalSectionRawMutex, RefCell<State>>,
}

impl Default for EventSync {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSync {
    pub fn new() -> Self {
        let sync = Self {
            state: Mutex::new(RefCell::new(State {
                next_epoch: 0,
                conns: HashMap::new(),
            })),
        };
        sync.register(NO_CONN);
        sync
    }

    /// Create the slots of a new connection.
    ///
    /// Anything still parked on a previous connection with the same handle is released.
    pub fn register(&self, conn: u16) {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            let epoch = state.next_epoch;
            state.next_epoch += 1;
            let old = state.conns.insert(
                conn,
                ConnSlots {
                    epoch,
                    slots: HashMap::new(),
                },
            );
            if let Some(mut old) = old {
                old.wake_all();
            }
        });
    }

    /// Tear down the slots of a connection. Parked waiters resolve to `None`.
    ///
    /// Removing an unknown connection is a no-op.
    pub fn remove(&self, conn: u16) {
        if conn == NO_CONN {
            return;
        }
        self.state.lock(|state| {
            if let Some(mut slots) = state.borrow_mut().conns.remove(&conn) {
                slots.wake_all();
            }
        });
    }

    /// Whether slots exist for `conn`.
    pub fn contains(&self, conn: u16) -> bool {
        self.state.lock(|state| state.borrow().conns.contains_key(&conn))
    }

    /// Deliver `event` to the `(conn, kind)` slot and wake everything parked on it.
    ///
    /// Returns false if the connection has no slots, in which case the event is dropped.
    pub fn notify(&self, conn: u16, event: Event) -> bool {
        self.forward(conn, conn, event)
    }

    /// Deliver `event`, reported on connection `origin`, to the slots of `conn`.
    pub fn forward(&self, origin: u16, conn: u16, event: Event) -> bool {
        let kind = event.kind();
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            match state.conns.get_mut(&conn) {
                Some(slots) => {
                    let slot = slots.slots.entry(kind).or_default();
                    slot.generation += 1;
                    slot.latest = Some((origin, event));
                    slot.waiters.wake();
                    true
                }
                None => false,
            }
        })
    }

    /// Arm a wait on `(conn, kind)`.
    ///
    /// The expectation sees any event delivered after this call, including one delivered before
    /// [`Expectation::wait`] is polled. Arm it before issuing the command the event answers.
    pub fn expect(&self, conn: u16, kind: EventKind) -> Expectation<'_> {
        let armed = self.state.lock(|state| {
            let mut state = state.borrow_mut();
            state.conns.get_mut(&conn).map(|slots| {
                let generation = slots.slots.entry(kind).or_default().generation;
                (slots.epoch, generation)
            })
        });
        Expectation {
            sync: self,
            conn,
            kind,
            armed,
        }
    }

    /// Wait for the next event delivered to `(conn, kind)`.
    ///
    /// An event delivered before this call is not observed. Returns `None` after `timeout`, or
    /// when the connection is torn down.
    pub async fn wait(&self, conn: u16, kind: EventKind, timeout: Duration) -> Option<Event> {
        self.expect(conn, kind).wait(timeout).await
    }

    fn poll_slot(
        &self,
        cx: &mut Context<'_>,
        conn: u16,
        kind: EventKind,
        epoch: u64,
        generation: u64,
    ) -> Poll<Option<(u16, Event)>> {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            let Some(slots) = state.conns.get_mut(&conn) else {
                return Poll::Ready(None);
            };
            if slots.epoch != epoch {
                return Poll::Ready(None);
            }
            let slot = slots.slots.entry(kind).or_default();
            if slot.generation > generation {
                Poll::Ready(slot.latest.clone())
            } else {
                slot.waiters.register(cx.waker());
                Poll::Pending
            }
        })
    }
}

/// A wait armed on one `(connection, event kind)` slot, consumed by [`Expectation::wait`].
#[must_use = "an expectation does nothing unless waited on"]
pub struct Expectation<'a> {
    sync: &'a EventSync,
    conn: u16,
    kind: EventKind,
    armed: Option<(u64, u64)>,
}

impl Expectation<'_> {
    /// Kind this expectation waits for.
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Resolve with the first event delivered since arming, or `None` on timeout or teardown.
    pub async fn wait(self, timeout: Duration) -> Option<Event> {
        self.wait_origin(timeout).await.map(|(_, event)| event)
    }

    /// Like [`Expectation::wait`], also giving the connection the event was reported on.
    pub async fn wait_origin(self, timeout: Duration) -> Option<(u16, Event)> {
        let (epoch, generation) = self.armed?;
        let (sync, conn, kind) = (self.sync, self.conn, self.kind);
        with_timeout(
            timeout,
            poll_fn(move |cx| sync.poll_slot(cx, conn, kind, epoch, generation)),
        )
        .await
        .unwrap_or_else(|_| {
            trace!("[adapter] conn {} timed out waiting for {:?}", conn, kind);
            None
        })
    }
}
