//! Upper layer subscribers to driver events.
use bt_hci::param::ConnHandle;

use crate::adapter::Adapter;
use crate::driver::{DriverLog, DriverStatus, RadioDriver};
use crate::event::*;
use crate::types::gatt::HvxKind;

/// Result of an observer handler. Errors are logged by the dispatcher and otherwise ignored.
pub type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Receives events as the dispatcher decodes them.
///
/// Every handler has a no-op default so an observer implements only what it needs. Handlers run
/// on the dispatcher task, one observer after the other. They may call back into the adapter's
/// command surface but must not await a procedure: the events it waits for are delivered by the
/// very task the handler blocks.
#[allow(unused_variables)]
pub trait Observer<D: RadioDriver>: Send + Sync {
    fn on_connected(&self, adapter: &Adapter<D>, conn: ConnHandle, event: &Connected) -> HandlerResult {
        Ok(())
    }

    fn on_disconnected(&self, adapter: &Adapter<D>, conn: ConnHandle, event: &Disconnected) -> HandlerResult {
        Ok(())
    }

    fn on_conn_param_update(&self, adapter: &Adapter<D>, conn: ConnHandle, event: &ConnParamUpdate) -> HandlerResult {
        Ok(())
    }

    /// The peer asks for new connection parameters. The adapter accepts them after this returns.
    fn on_conn_param_update_request(
        &self,
        adapter: &Adapter<D>,
        conn: ConnHandle,
        event: &ConnParamUpdate,
    ) -> HandlerResult {
        Ok(())
    }

    fn on_sec_params_request(&self, adapter: &Adapter<D>, conn: ConnHandle, event: &SecParamsRequest) -> HandlerResult {
        Ok(())
    }

    fn on_passkey_display(&self, adapter: &Adapter<D>, conn: ConnHandle, event: &PasskeyDisplay) -> HandlerResult {
        Ok(())
    }

    fn on_auth_key_request(&self, adapter: &Adapter<D>, conn: ConnHandle, event: &AuthKeyRequest) -> HandlerResult {
        Ok(())
    }

    fn on_lesc_dhkey_request(&self, adapter: &Adapter<D>, conn: ConnHandle, event: &LescDhkeyRequest) -> HandlerResult {
        Ok(())
    }

    fn on_auth_status(&self, adapter: &Adapter<D>, conn: ConnHandle, event: &AuthStatus) -> HandlerResult {
        Ok(())
    }

    fn on_conn_sec_update(&self, adapter: &Adapter<D>, conn: ConnHandle, event: &ConnSecUpdate) -> HandlerResult {
        Ok(())
    }

    fn on_gap_timeout(&self, adapter: &Adapter<D>, conn: ConnHandle, event: &GapTimeout) -> HandlerResult {
        Ok(())
    }

    fn on_adv_report(&self, adapter: &Adapter<D>, conn: ConnHandle, event: &AdvReport) -> HandlerResult {
        Ok(())
    }

    fn on_phy_update_request(&self, adapter: &Adapter<D>, conn: ConnHandle, event: &PhyUpdateRequest) -> HandlerResult {
        Ok(())
    }

    fn on_phy_update(&self, adapter: &Adapter<D>, conn: ConnHandle, event: &PhyUpdate) -> HandlerResult {
        Ok(())
    }

    fn on_data_length_update_request(
        &self,
        adapter: &Adapter<D>,
        conn: ConnHandle,
        event: &DataLengthUpdateRequest,
    ) -> HandlerResult {
        Ok(())
    }

    fn on_data_length_update(&self, adapter: &Adapter<D>, conn: ConnHandle, event: &DataLengthUpdate) -> HandlerResult {
        Ok(())
    }

    fn on_primary_service_discovery(
        &self,
        adapter: &Adapter<D>,
        conn: ConnHandle,
        event: &ServiceDiscoveryResponse,
    ) -> HandlerResult {
        Ok(())
    }

    fn on_characteristic_discovery(
        &self,
        adapter: &Adapter<D>,
        conn: ConnHandle,
        event: &CharacteristicDiscoveryResponse,
    ) -> HandlerResult {
        Ok(())
    }

    fn on_descriptor_discovery(
        &self,
        adapter: &Adapter<D>,
        conn: ConnHandle,
        event: &DescriptorDiscoveryResponse,
    ) -> HandlerResult {
        Ok(())
    }

    fn on_read_response(&self, adapter: &Adapter<D>, conn: ConnHandle, event: &ReadResponse) -> HandlerResult {
        Ok(())
    }

    fn on_write_response(&self, adapter: &Adapter<D>, conn: ConnHandle, event: &WriteResponse) -> HandlerResult {
        Ok(())
    }

    fn on_notification(&self, adapter: &Adapter<D>, conn: ConnHandle, event: &HandleValue) -> HandlerResult {
        Ok(())
    }

    /// The adapter confirms the indication after every observer saw it.
    fn on_indication(&self, adapter: &Adapter<D>, conn: ConnHandle, event: &HandleValue) -> HandlerResult {
        Ok(())
    }

    fn on_exchange_mtu_response(
        &self,
        adapter: &Adapter<D>,
        conn: ConnHandle,
        event: &ExchangeMtuResponse,
    ) -> HandlerResult {
        Ok(())
    }

    /// The peer started an MTU exchange. The adapter already replied.
    fn on_exchange_mtu_request(&self, adapter: &Adapter<D>, conn: ConnHandle, event: &ExchangeMtuRequest) -> HandlerResult {
        Ok(())
    }

    fn on_tx_complete(&self, adapter: &Adapter<D>, conn: ConnHandle, event: &TxComplete) -> HandlerResult {
        Ok(())
    }

    fn on_driver_status(&self, adapter: &Adapter<D>, status: &DriverStatus) -> HandlerResult {
        Ok(())
    }

    fn on_driver_log(&self, adapter: &Adapter<D>, record: &DriverLog) -> HandlerResult {
        Ok(())
    }
}

/// Route `event` to the handler of its kind.
pub(crate) fn dispatch<D: RadioDriver>(
    observer: &dyn Observer<D>,
    adapter: &Adapter<D>,
    conn: ConnHandle,
    event: &Event,
) -> HandlerResult {
    match event {
        Event::Connected(e) => observer.on_connected(adapter, conn, e),
        Event::Disconnected(e) => observer.on_disconnected(adapter, conn, e),
        Event::ConnParamUpdate(e) => observer.on_conn_param_update(adapter, conn, e),
        Event::SecParamsRequest(e) => observer.on_sec_params_request(adapter, conn, e),
        Event::PasskeyDisplay(e) => observer.on_passkey_display(adapter, conn, e),
        Event::AuthKeyRequest(e) => observer.on_auth_key_request(adapter, conn, e),
        Event::LescDhkeyRequest(e) => observer.on_lesc_dhkey_request(adapter, conn, e),
        Event::AuthStatus(e) => observer.on_auth_status(adapter, conn, e),
        Event::ConnSecUpdate(e) => observer.on_conn_sec_update(adapter, conn, e),
        Event::GapTimeout(e) => observer.on_gap_timeout(adapter, conn, e),
        Event::AdvReport(e) => observer.on_adv_report(adapter, conn, e),
        Event::ConnParamUpdateRequest(e) => observer.on_conn_param_update_request(adapter, conn, e),
        Event::PhyUpdateRequest(e) => observer.on_phy_update_request(adapter, conn, e),
        Event::PhyUpdate(e) => observer.on_phy_update(adapter, conn, e),
        Event::DataLengthUpdateRequest(e) => observer.on_data_length_update_request(adapter, conn, e),
        Event::DataLengthUpdate(e) => observer.on_data_length_update(adapter, conn, e),
        Event::PrimaryServiceDiscovery(e) => observer.on_primary_service_discovery(adapter, conn, e),
        Event::CharacteristicDiscovery(e) => observer.on_characteristic_discovery(adapter, conn, e),
        Event::DescriptorDiscovery(e) => observer.on_descriptor_discovery(adapter, conn, e),
        Event::ReadResponse(e) => observer.on_read_response(adapter, conn, e),
        Event::WriteResponse(e) => observer.on_write_response(adapter, conn, e),
        Event::HandleValue(e) => match e.kind {
            HvxKind::Notification => observer.on_notification(adapter, conn, e),
            HvxKind::Indication => observer.on_indication(adapter, conn, e),
        },
        Event::ExchangeMtuResponse(e) => observer.on_exchange_mtu_response(adapter, conn, e),
        Event::ExchangeMtuRequest(e) => observer.on_exchange_mtu_request(adapter, conn, e),
        Event::TxComplete(e) => observer.on_tx_complete(adapter, conn, e),
    }
}
