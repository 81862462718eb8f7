use core::cell::RefCell;
use std::collections::HashMap;

use bt_hci::param::{ConnHandle, LeConnRole};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::gatt::{Characteristic, Descriptor, Service};
use crate::types::gap::{ConnParams, SecKeyset};
use crate::types::gatt::CharacteristicProps;
use crate::types::uuid::{consts, Uuid};
use crate::{Address, Error};

/// A live link and everything learned about the peer over it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub handle: ConnHandle,
    pub peer: Address,
    pub role: LeConnRole,
    pub params: ConnParams,
    /// Negotiated ATT MTU.
    pub att_mtu: u16,
    /// Discovered services, ordered by start handle.
    pub services: Vec<Service>,
    pub keyset: Option<SecKeyset>,
}

impl Connection {
    fn characteristics(&self) -> impl Iterator<Item = &Characteristic> {
        self.services.iter().flat_map(|s| s.characteristics.iter())
    }

    fn service_mut(&mut self, start_handle: u16) -> Option<&mut Service> {
        self.services.iter_mut().find(|s| s.start_handle == start_handle)
    }
}

struct State {
    connections: HashMap<u16, Connection>,
}

pub(crate) struct ConnectionManager {
    state: Mutex<CriticalSectionRawMutex, RefCell<State>>,
    default_att_mtu: u16,
}

impl ConnectionManager {
    pub(crate) fn new(default_att_mtu: u16) -> Self {
        Self {
            state: Mutex::new(RefCell::new(State {
                connections: HashMap::new(),
            })),
            default_att_mtu,
        }
    }

    fn with_mut<F: FnOnce(&mut State) -> R, R>(&self, f: F) -> R {
        self.state.lock(|state| f(&mut state.borrow_mut()))
    }

    fn with_conn<F: FnOnce(&mut Connection) -> R, R>(&self, h: ConnHandle, f: F) -> Result<R, Error> {
        self.with_mut(|state| match state.connections.get_mut(&h.raw()) {
            Some(conn) => Ok(f(conn)),
            None => {
                trace!("[link] connection handle {} not found", h.raw());
                Err(Error::NotFound)
            }
        })
    }

    pub(crate) fn on_connected(&self, handle: ConnHandle, peer: Address, role: LeConnRole, params: ConnParams) {
        let conn = Connection {
            handle,
            peer,
            role,
            params,
            att_mtu: self.default_att_mtu,
            services: Vec::new(),
            keyset: None,
        };
        self.with_mut(|state| {
            if state.connections.insert(handle.raw(), conn).is_some() {
                warn!("[link] connection handle {} reused while still connected", handle.raw());
            }
        });
        debug!("[link] conn {} connected to {:?} as {:?}", handle.raw(), peer, role);
    }

    /// Forget a connection. Unknown handles are ignored.
    pub(crate) fn on_disconnected(&self, handle: ConnHandle, reason: u8) -> Option<Connection> {
        let removed = self.with_mut(|state| state.connections.remove(&handle.raw()));
        match &removed {
            Some(_) => debug!("[link] conn {} disconnected, reason {:#04x}", handle.raw(), reason),
            None => trace!("[link] conn {} already gone", handle.raw()),
        }
        removed
    }

    pub(crate) fn connection(&self, handle: ConnHandle) -> Option<Connection> {
        self.with_mut(|state| state.connections.get(&handle.raw()).cloned())
    }

    pub(crate) fn handles(&self) -> Vec<ConnHandle> {
        self.with_mut(|state| state.connections.values().map(|c| c.handle).collect())
    }

    pub(crate) fn att_mtu(&self, handle: ConnHandle) -> Option<u16> {
        self.with_mut(|state| state.connections.get(&handle.raw()).map(|c| c.att_mtu))
    }

    pub(crate) fn set_att_mtu(&self, handle: ConnHandle, mtu: u16) -> Result<(), Error> {
        self.with_conn(handle, |conn| conn.att_mtu = mtu)
    }

    pub(crate) fn set_params(&self, handle: ConnHandle, params: ConnParams) -> Result<(), Error> {
        self.with_conn(handle, |conn| conn.params = params)
    }

    pub(crate) fn set_keyset(&self, handle: ConnHandle, keyset: SecKeyset) -> Result<(), Error> {
        self.with_conn(handle, |conn| conn.keyset = Some(keyset))
    }

    pub(crate) fn services(&self, handle: ConnHandle) -> Option<Vec<Service>> {
        self.with_mut(|state| state.connections.get(&handle.raw()).map(|c| c.services.clone()))
    }

    /// Add a service, keeping services ordered by start handle. A service already known at the
    /// same start handle is replaced.
    pub(crate) fn push_service(&self, handle: ConnHandle, service: Service) -> Result<(), Error> {
        self.with_conn(handle, |conn| {
            match conn
                .services
                .binary_search_by_key(&service.start_handle, |s| s.start_handle)
            {
                Ok(idx) => conn.services[idx] = service,
                Err(idx) => conn.services.insert(idx, service),
            }
        })
    }

    /// Add a characteristic to the service starting at `service_start`.
    ///
    /// The new characteristic extends to the end of the service and the previous one is cut
    /// short right before the new declaration.
    pub(crate) fn push_characteristic(
        &self,
        handle: ConnHandle,
        service_start: u16,
        mut characteristic: Characteristic,
    ) -> Result<(), Error> {
        self.with_conn(handle, |conn| {
            let service = conn.service_mut(service_start).ok_or(Error::NotFound)?;
            characteristic.end_handle = service.end_handle;
            if let Some(prev) = service.characteristics.last_mut() {
                prev.end_handle = characteristic.decl_handle.saturating_sub(1);
            }
            service.characteristics.push(characteristic);
            Ok(())
        })?
    }

    /// Add a descriptor to the characteristic whose value lives at `value_handle`.
    pub(crate) fn push_descriptor(&self, handle: ConnHandle, value_handle: u16, descriptor: Descriptor) -> Result<(), Error> {
        self.with_conn(handle, |conn| {
            let characteristic = conn
                .services
                .iter_mut()
                .flat_map(|s| s.characteristics.iter_mut())
                .find(|c| c.value_handle == value_handle)
                .ok_or(Error::NotFound)?;
            characteristic.descriptors.push(descriptor);
            Ok(())
        })?
    }

    /// Value handle of the characteristic `uuid`, optionally restricted to service `service`.
    pub(crate) fn value_handle(&self, handle: ConnHandle, uuid: &Uuid, service: Option<&Uuid>) -> Option<u16> {
        self.with_mut(|state| {
            let conn = state.connections.get(&handle.raw())?;
            conn.services
                .iter()
                .filter(|s| service.map_or(true, |u| s.uuid == *u))
                .flat_map(|s| s.characteristics.iter())
                .find(|c| c.uuid == *uuid)
                .map(|c| c.value_handle)
        })
    }

    /// CCCD handle of the characteristic `uuid`.
    ///
    /// When several characteristics share the UUID, `attr_handle` picks the one whose value or
    /// declaration handle it names.
    pub(crate) fn cccd_handle(&self, handle: ConnHandle, uuid: &Uuid, attr_handle: Option<u16>) -> Option<u16> {
        self.with_mut(|state| {
            let conn = state.connections.get(&handle.raw())?;
            conn.characteristics()
                .filter(|c| c.uuid == *uuid)
                .filter(|c| attr_handle.map_or(true, |h| h == c.value_handle || h == c.decl_handle))
                .find_map(|c| {
                    c.descriptors
                        .iter()
                        .find(|d| d.uuid == consts::CLIENT_CHARACTERISTIC_CONFIGURATION)
                        .map(|d| d.handle)
                })
        })
    }

    /// Declaration handle of the characteristic `uuid`.
    pub(crate) fn char_handle(&self, handle: ConnHandle, uuid: &Uuid) -> Option<u16> {
        self.with_mut(|state| {
            let conn = state.connections.get(&handle.raw())?;
            conn.characteristics().find(|c| c.uuid == *uuid).map(|c| c.decl_handle)
        })
    }

    /// UUID and properties of the characteristic owning `attr_handle`.
    pub(crate) fn attribute(&self, handle: ConnHandle, attr_handle: u16) -> Option<(Uuid, CharacteristicProps)> {
        self.with_mut(|state| {
            let conn = state.connections.get(&handle.raw())?;
            conn.characteristics()
                .find(|c| c.decl_handle <= attr_handle && attr_handle <= c.end_handle)
                .map(|c| (c.uuid, c.props))
        })
    }
}

#[cfg(test)]
mod tests {
    use bt_hci::param::BdAddr;

    use super::*;
    use crate::types::gatt::CharacteristicProp;
    use crate::AddressKind;

    const ADDR_1: [u8; 6] = [0x11, 0x22, 0x33, 0x44, 0x55, 0x66];

    const HRS: Uuid = Uuid::new_short(0x180d);
    const BAS: Uuid = Uuid::new_short(0x180f);
    const HRM: Uuid = Uuid::new_short(0x2a37);
    const BODY: Uuid = Uuid::new_short(0x2a38);
    const LEVEL: Uuid = Uuid::new_short(0x2a19);

    fn connect(mgr: &ConnectionManager, handle: u16) -> ConnHandle {
        let h = ConnHandle::new(handle);
        mgr.on_connected(
            h,
            Address {
                kind: AddressKind::RandomStatic,
                addr: BdAddr::new(ADDR_1),
            },
            LeConnRole::Central,
            ConnParams::default(),
        );
        h
    }

    fn notify() -> CharacteristicProps {
        CharacteristicProps::from(&[CharacteristicProp::Read, CharacteristicProp::Notify][..])
    }

    fn cccd(handle: u16) -> Descriptor {
        Descriptor {
            uuid: consts::CLIENT_CHARACTERISTIC_CONFIGURATION,
            handle,
        }
    }

    /// Heart rate service at 1..=8 with two characteristics, battery service at 9..=0xffff.
    fn populate(mgr: &ConnectionManager, h: ConnHandle) {
        mgr.push_service(h, Service::new(HRS, 0x0001, 0x0008)).unwrap();
        mgr.push_service(h, Service::new(BAS, 0x0009, 0xffff)).unwrap();
        mgr.push_characteristic(h, 0x0001, Characteristic::new(HRM, 0x0002, 0x0003, notify()))
            .unwrap();
        mgr.push_characteristic(h, 0x0001, Characteristic::new(BODY, 0x0005, 0x0006, notify()))
            .unwrap();
        mgr.push_characteristic(h, 0x0009, Characteristic::new(LEVEL, 0x000a, 0x000b, notify()))
            .unwrap();
        mgr.push_descriptor(h, 0x0003, cccd(0x0004)).unwrap();
        mgr.push_descriptor(h, 0x0006, cccd(0x0007)).unwrap();
        mgr.push_descriptor(h, 0x000b, cccd(0x000c)).unwrap();
    }

    #[test]
    fn connection_established() {
        let mgr = ConnectionManager::new(23);
        let h = connect(&mgr, 3);
        let conn = mgr.connection(h).unwrap();
        assert_eq!(conn.role, LeConnRole::Central);
        assert_eq!(conn.peer.addr, BdAddr::new(ADDR_1));
        assert_eq!(conn.att_mtu, 23);
        assert!(conn.services.is_empty());
        assert_eq!(mgr.handles(), vec![h]);
    }

    #[test]
    fn disconnect_removes_connection() {
        let mgr = ConnectionManager::new(23);
        let h = connect(&mgr, 5);
        populate(&mgr, h);

        assert!(mgr.on_disconnected(h, 0x13).is_some());
        assert_eq!(mgr.connection(h), None);
        assert_eq!(mgr.value_handle(h, &HRM, None), None);
        assert_eq!(mgr.cccd_handle(h, &HRM, None), None);
        assert_eq!(mgr.att_mtu(h), None);
        assert!(matches!(mgr.set_att_mtu(h, 100), Err(Error::NotFound)));

        // A second teardown of the same handle is harmless.
        assert!(mgr.on_disconnected(h, 0x13).is_none());
    }

    #[test]
    fn characteristics_tile_their_service() {
        let mgr = ConnectionManager::new(23);
        let h = connect(&mgr, 0);
        populate(&mgr, h);

        let services = mgr.services(h).unwrap();
        let hrs = &services[0];
        assert_eq!(hrs.characteristics[0].end_handle, 0x0004);
        assert_eq!(hrs.characteristics[1].end_handle, 0x0008);
        assert_eq!(services[1].characteristics[0].end_handle, 0xffff);
    }

    #[test]
    fn lookups() {
        let mgr = ConnectionManager::new(23);
        let h = connect(&mgr, 0);
        populate(&mgr, h);

        assert_eq!(mgr.value_handle(h, &HRM, None), Some(0x0003));
        assert_eq!(mgr.value_handle(h, &HRM, Some(&HRS)), Some(0x0003));
        assert_eq!(mgr.value_handle(h, &HRM, Some(&BAS)), None);
        assert_eq!(mgr.char_handle(h, &BODY), Some(0x0005));
        assert_eq!(mgr.cccd_handle(h, &LEVEL, None), Some(0x000c));
        assert_eq!(mgr.attribute(h, 0x0004), Some((HRM, notify())));
        assert_eq!(mgr.attribute(h, 0x0005).map(|a| a.0), Some(BODY));
        assert_eq!(mgr.attribute(h, 0x0001), None);
    }

    #[test]
    fn cccd_disambiguated_by_handle() {
        let mgr = ConnectionManager::new(23);
        let h = connect(&mgr, 0);
        mgr.push_service(h, Service::new(HRS, 0x0001, 0x0008)).unwrap();
        mgr.push_characteristic(h, 0x0001, Characteristic::new(HRM, 0x0002, 0x0003, notify()))
            .unwrap();
        mgr.push_characteristic(h, 0x0001, Characteristic::new(HRM, 0x0005, 0x0006, notify()))
            .unwrap();
        mgr.push_descriptor(h, 0x0003, cccd(0x0004)).unwrap();
        mgr.push_descriptor(h, 0x0006, cccd(0x0007)).unwrap();

        assert_eq!(mgr.cccd_handle(h, &HRM, None), Some(0x0004));
        assert_eq!(mgr.cccd_handle(h, &HRM, Some(0x0006)), Some(0x0007));
        assert_eq!(mgr.cccd_handle(h, &HRM, Some(0x0005)), Some(0x0007));
        assert_eq!(mgr.cccd_handle(h, &HRM, Some(0x0042)), None);
    }

    #[test]
    fn services_stay_sorted() {
        let mgr = ConnectionManager::new(23);
        let h = connect(&mgr, 0);
        mgr.push_service(h, Service::new(BAS, 0x0010, 0x0020)).unwrap();
        mgr.push_service(h, Service::new(HRS, 0x0001, 0x000f)).unwrap();
        let starts: Vec<u16> = mgr.services(h).unwrap().iter().map(|s| s.start_handle).collect();
        assert_eq!(starts, vec![0x0001, 0x0010]);
    }

    #[test]
    fn unknown_service_is_reported() {
        let mgr = ConnectionManager::new(23);
        let h = connect(&mgr, 0);
        let res = mgr.push_characteristic(h, 0x0001, Characteristic::new(HRM, 0x0002, 0x0003, notify()));
        assert!(matches!(res, Err(Error::NotFound)));
    }
}
