//! Discovery of the peer's attribute database.
//!
//! The driver reports 128-bit UUIDs whose base it does not know as a placeholder. Such
//! attributes are resolved by reading their declaration, registering the base with the driver
//! and, for services, discovering the service again so the driver reports it with the new type.
use bt_hci::param::ConnHandle;

use super::{Characteristic, Descriptor, Service};
use crate::adapter::Adapter;
use crate::driver::{Op, RadioDriver};
use crate::event::{DiscoveredCharacteristic, DiscoveredService, Event, EventKind};
use crate::types::gatt::{GattStatus, HandleRange};
use crate::types::uuid::{BleUuid, Uuid};
use crate::Error;

/// Progress of a discovery run on one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryState {
    Idle,
    ServiceDiscoveryInFlight,
    CharDiscoveryInFlight,
    DescDiscoveryInFlight,
    Done,
    Failed,
}

struct Discovery {
    conn: ConnHandle,
    state: DiscoveryState,
}

impl Discovery {
    fn new(conn: ConnHandle) -> Self {
        Self {
            conn,
            state: DiscoveryState::Idle,
        }
    }

    fn set(&mut self, state: DiscoveryState) {
        if self.state != state {
            trace!("[gatt] conn {} discovery {:?} -> {:?}", self.conn.raw(), self.state, state);
            self.state = state;
        }
    }

    /// Record the terminal outcome of a run.
    fn finish(&mut self, status: Option<GattStatus>) -> Option<GattStatus> {
        match status {
            Some(s) if s.is_success() => self.set(DiscoveryState::Done),
            _ => self.set(DiscoveryState::Failed),
        }
        status
    }
}

/// Outcome of one discovery round trip.
enum Step<T> {
    Found(Vec<T>),
    Complete,
    Stop(Option<GattStatus>),
}

fn step<T>(conn: ConnHandle, what: &str, status: GattStatus, found: Vec<T>) -> Step<T> {
    if status == GattStatus::ATTRIBUTE_NOT_FOUND {
        Step::Complete
    } else if !status.is_success() {
        warn!("[gatt] conn {} {} discovery failed: {}", conn.raw(), what, status);
        Step::Stop(Some(status))
    } else if found.is_empty() {
        Step::Complete
    } else {
        Step::Found(found)
    }
}

/// Start of the next request after a response ending at `last`.
///
/// `None` when `last` lies before `start`: asking again would not make progress.
fn next_start(conn: ConnHandle, what: &str, start: u16, last: u16) -> Option<u16> {
    if last < start {
        warn!(
            "[gatt] conn {} {} discovery stalled: {:#06x} reported after asking from {:#06x}",
            conn.raw(),
            what,
            last,
            start
        );
        return None;
    }
    last.checked_add(1)
}

impl<D: RadioDriver> Adapter<D> {
    /// Discover the complete attribute database of the peer: services, then the characteristics
    /// of every service, then the descriptors of every characteristic.
    ///
    /// Returns the first failing status, leaving whatever was discovered so far on the
    /// connection. `Ok(None)` if a response did not arrive in time.
    pub async fn discover(&self, conn: ConnHandle) -> Result<Option<GattStatus>, Error> {
        let mut run = Discovery::new(conn);
        let status = self.discover_all(&mut run).await;
        match status {
            Ok(status) => Ok(run.finish(status)),
            Err(e) => {
                run.set(DiscoveryState::Failed);
                Err(e)
            }
        }
    }

    async fn discover_all(&self, run: &mut Discovery) -> Result<Option<GattStatus>, Error> {
        let conn = run.conn;
        run.set(DiscoveryState::ServiceDiscoveryInFlight);
        match self.services_pass(conn).await? {
            Some(s) if s.is_success() => {}
            other => return Ok(other),
        }

        let services = self.connections.services(conn).ok_or(Error::NotFound)?;
        run.set(DiscoveryState::CharDiscoveryInFlight);
        for service in services.iter() {
            match self.characteristics_pass(conn, service).await? {
                Some(s) if s.is_success() => {}
                other => return Ok(other),
            }
        }

        let services = self.connections.services(conn).ok_or(Error::NotFound)?;
        run.set(DiscoveryState::DescDiscoveryInFlight);
        for characteristic in services.iter().flat_map(|s| s.characteristics.iter()) {
            match self.descriptors_pass(conn, characteristic).await? {
                Some(s) if s.is_success() => {}
                other => return Ok(other),
            }
        }
        Ok(Some(GattStatus::SUCCESS))
    }

    /// Discover the primary services of the peer and add them to the connection.
    pub async fn discover_services(&self, conn: ConnHandle) -> Result<Option<GattStatus>, Error> {
        let mut run = Discovery::new(conn);
        run.set(DiscoveryState::ServiceDiscoveryInFlight);
        let status = self.services_pass(conn).await?;
        Ok(run.finish(status))
    }

    /// Discover the characteristics of `service` and add them to the connection.
    pub async fn discover_characteristics(&self, conn: ConnHandle, service: &Service) -> Result<Option<GattStatus>, Error> {
        let mut run = Discovery::new(conn);
        run.set(DiscoveryState::CharDiscoveryInFlight);
        let status = self.characteristics_pass(conn, service).await?;
        Ok(run.finish(status))
    }

    /// Discover the descriptors of `characteristic` and add them to the connection.
    pub async fn discover_descriptors(
        &self,
        conn: ConnHandle,
        characteristic: &Characteristic,
    ) -> Result<Option<GattStatus>, Error> {
        let mut run = Discovery::new(conn);
        run.set(DiscoveryState::DescDiscoveryInFlight);
        let status = self.descriptors_pass(conn, characteristic).await?;
        Ok(run.finish(status))
    }

    async fn discover_services_from(
        &self,
        conn: ConnHandle,
        start: u16,
        uuid: Option<&BleUuid>,
    ) -> Result<Option<Step<DiscoveredService>>, Error> {
        let event = self
            .request(conn, EventKind::PrimaryServiceDiscovery, Op::PrimaryServicesDiscover, |d| {
                d.gattc_primary_services_discover(conn, start, uuid)
            })
            .await?;
        Ok(match event {
            Some(Event::PrimaryServiceDiscovery(rsp)) => Some(step(conn, "service", rsp.status, rsp.services)),
            _ => None,
        })
    }

    async fn services_pass(&self, conn: ConnHandle) -> Result<Option<GattStatus>, Error> {
        let mut unresolved = Vec::new();
        let mut start = 0x0001;
        loop {
            let found = match self.discover_services_from(conn, start, None).await? {
                None => return Ok(None),
                Some(Step::Stop(status)) => return Ok(status),
                Some(Step::Complete) => break,
                Some(Step::Found(found)) => found,
            };
            let mut last_end = start;
            for s in found {
                last_end = s.end_handle;
                match self.resolve_uuid(&s.uuid) {
                    Some(uuid) => {
                        debug!("[gatt] conn {} service {} {:#06x}..={:#06x}", conn.raw(), uuid, s.start_handle, s.end_handle);
                        self.connections
                            .push_service(conn, Service::new(uuid, s.start_handle, s.end_handle))?;
                    }
                    None => unresolved.push(s),
                }
            }
            if last_end == 0xFFFF {
                break;
            }
            start = match next_start(conn, "service", start, last_end) {
                Some(next) => next,
                None => return Ok(Some(GattStatus::UNLIKELY_ERROR)),
            };
        }

        for s in unresolved {
            if let Some(status) = self.resolve_service(conn, &s).await? {
                if !status.is_success() {
                    return Ok(Some(status));
                }
            } else {
                return Ok(None);
            }
        }
        Ok(Some(GattStatus::SUCCESS))
    }

    /// Resolve a service reported with an unregistered 128-bit UUID.
    async fn resolve_service(&self, conn: ConnHandle, s: &DiscoveredService) -> Result<Option<GattStatus>, Error> {
        let (status, value) = match self.read(conn, s.start_handle, 0).await? {
            Some(rsp) => rsp,
            None => return Ok(None),
        };
        let base = match value.as_deref().map(Uuid::try_from) {
            Some(Ok(uuid)) => uuid.base(),
            _ => None,
        };
        let Some(base) = base else {
            warn!("[gatt] conn {} service at {:#06x} has no readable UUID ({})", conn.raw(), s.start_handle, status);
            return Ok(Some(status));
        };
        let kind = self.vendor_kind(base)?;
        let target = BleUuid { value: s.uuid.value, kind };
        let found = match self.discover_services_from(conn, s.start_handle, Some(&target)).await? {
            None => return Ok(None),
            Some(Step::Stop(status)) => return Ok(status),
            Some(Step::Complete) => Vec::new(),
            Some(Step::Found(found)) => found,
        };
        for r in found.into_iter().filter(|r| r.start_handle == s.start_handle) {
            let uuid = Uuid::from_base(base, r.uuid.value);
            debug!("[gatt] conn {} service {} {:#06x}..={:#06x}", conn.raw(), uuid, r.start_handle, r.end_handle);
            self.connections
                .push_service(conn, Service::new(uuid, r.start_handle, r.end_handle))?;
        }
        Ok(Some(GattStatus::SUCCESS))
    }

    async fn characteristics_pass(&self, conn: ConnHandle, service: &Service) -> Result<Option<GattStatus>, Error> {
        let mut range = service.range();
        loop {
            let event = self
                .request(conn, EventKind::CharacteristicDiscovery, Op::CharacteristicsDiscover, |d| {
                    d.gattc_characteristics_discover(conn, range)
                })
                .await?;
            let found = match event {
                Some(Event::CharacteristicDiscovery(rsp)) => {
                    match step(conn, "characteristic", rsp.status, rsp.characteristics) {
                        Step::Stop(status) => return Ok(status),
                        Step::Complete => break,
                        Step::Found(found) => found,
                    }
                }
                _ => return Ok(None),
            };

            let mut last = found[0].clone();
            for c in found {
                let uuid = match self.resolve_uuid(&c.uuid) {
                    Some(uuid) => uuid,
                    None => match self.resolve_characteristic(conn, &c).await? {
                        Some(uuid) => uuid,
                        None => {
                            warn!("[gatt] conn {} characteristic at {:#06x} left unresolved", conn.raw(), c.decl_handle);
                            Uuid::new_short(c.uuid.value)
                        }
                    },
                };
                debug!("[gatt] conn {} characteristic {} value {:#06x}", conn.raw(), uuid, c.value_handle);
                self.connections.push_characteristic(
                    conn,
                    service.start_handle,
                    Characteristic::new(uuid, c.decl_handle, c.value_handle, c.props),
                )?;
                last = c;
            }
            if last.value_handle >= service.end_handle {
                break;
            }
            range = HandleRange {
                start: match next_start(conn, "characteristic", range.start, last.decl_handle) {
                    Some(next) => next,
                    None => return Ok(Some(GattStatus::UNLIKELY_ERROR)),
                },
                end: service.end_handle,
            };
        }
        Ok(Some(GattStatus::SUCCESS))
    }

    /// Resolve a characteristic reported with an unregistered 128-bit UUID from its declaration:
    /// properties, value handle, then the UUID.
    async fn resolve_characteristic(&self, conn: ConnHandle, c: &DiscoveredCharacteristic) -> Result<Option<Uuid>, Error> {
        let value = match self.read(conn, c.decl_handle, 0).await? {
            Some((status, Some(value))) if status.is_success() => value,
            _ => return Ok(None),
        };
        if value.len() != 19 {
            return Ok(None);
        }
        let uuid = Uuid::try_from(&value[3..])?;
        if let Some(base) = uuid.base() {
            self.vendor_kind(base)?;
        }
        Ok(Some(uuid))
    }

    async fn descriptors_pass(&self, conn: ConnHandle, characteristic: &Characteristic) -> Result<Option<GattStatus>, Error> {
        let mut range = characteristic.descriptor_range();
        if range.start >= range.end {
            return Ok(Some(GattStatus::SUCCESS));
        }
        loop {
            let event = self
                .request(conn, EventKind::DescriptorDiscovery, Op::DescriptorsDiscover, |d| {
                    d.gattc_descriptors_discover(conn, range)
                })
                .await?;
            let found = match event {
                Some(Event::DescriptorDiscovery(rsp)) => match step(conn, "descriptor", rsp.status, rsp.descriptors) {
                    Step::Stop(status) => return Ok(status),
                    Step::Complete => break,
                    Step::Found(found) => found,
                },
                _ => return Ok(None),
            };

            let mut last = range.start;
            for d in found {
                last = d.handle;
                if d.handle == characteristic.value_handle {
                    continue;
                }
                let uuid = self.resolve_uuid(&d.uuid).unwrap_or_else(|| Uuid::new_short(d.uuid.value));
                trace!("[gatt] conn {} descriptor {} at {:#06x}", conn.raw(), uuid, d.handle);
                self.connections.push_descriptor(
                    conn,
                    characteristic.value_handle,
                    Descriptor { uuid, handle: d.handle },
                )?;
            }
            if last >= characteristic.end_handle {
                break;
            }
            range = HandleRange {
                start: match next_start(conn, "descriptor", range.start, last) {
                    Some(next) => next,
                    None => return Ok(Some(GattStatus::UNLIKELY_ERROR)),
                },
                end: characteristic.end_handle,
            };
        }
        Ok(Some(GattStatus::SUCCESS))
    }
}
