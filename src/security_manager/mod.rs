//! # Pairing
//!
//! The driver runs the security manager protocol; the adapter answers its requests: the
//! security parameters request, the LESC DH key request and, for passkey entry, the auth key
//! request. The outcome is the status of the auth status event.
use bt_hci::param::{ConnHandle, LeConnRole};

mod crypto;

pub use crypto::KeyPair;

use crate::adapter::Adapter;
use crate::driver::{check, Op, RadioDriver};
use crate::event::{Event, EventKind};
use crate::types::gap::{AuthKeyType, SecKeyset, SecParams, SecStatus};
use crate::Error;

/// Steps of a pairing procedure, logged as it advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingState {
    Idle,
    AuthRequested,
    SecParamsRequested,
    LescDhkeyRequested,
    AuthKeyRequested,
    AuthStatusReceived,
    Failed,
}

struct Pairing {
    conn: ConnHandle,
    state: PairingState,
}

impl Pairing {
    fn set(&mut self, state: PairingState) {
        trace!("[security] conn {} {:?} -> {:?}", self.conn.raw(), self.state, state);
        self.state = state;
    }
}

impl<D: RadioDriver> Adapter<D> {
    /// Pair with the peer.
    ///
    /// `passkey` is entered when the driver asks for one. Returns the status of the auth status
    /// event, or `Ok(None)` when a step timed out or the final record could not be decoded.
    pub async fn authenticate(
        &self,
        conn: ConnHandle,
        params: &SecParams,
        passkey: Option<[u8; 6]>,
    ) -> Result<Option<SecStatus>, Error> {
        let role = self.connections.connection(conn).ok_or(Error::NotFound)?.role;
        let mut pairing = Pairing {
            conn,
            state: PairingState::Idle,
        };

        pairing.set(PairingState::AuthRequested);
        let event = self
            .request(conn, EventKind::SecParamsRequest, Op::Authenticate, |d| {
                d.gap_authenticate(conn, params)
            })
            .await;
        let peer_params = match event {
            Ok(Some(Event::SecParamsRequest(req))) => req.peer_params,
            Ok(_) => {
                warn!("[security] conn {} no security parameters request", conn.raw());
                pairing.set(PairingState::Failed);
                return Ok(None);
            }
            Err(e) => {
                pairing.set(PairingState::Failed);
                return Err(e);
            }
        };
        pairing.set(PairingState::SecParamsRequested);

        let lesc = params.lesc && peer_params.lesc;
        let keys = lesc.then(KeyPair::generate);
        let mut keyset = SecKeyset {
            own_pk: keys.as_ref().map(|k| *k.public_key()),
            peer_pk: None,
        };
        debug!("[security] conn {} pairing, LESC {}", conn.raw(), lesc);

        let dhkey_request = self.sync.expect(conn.raw(), EventKind::LescDhkeyRequest);
        let key_request = self.sync.expect(conn.raw(), EventKind::AuthKeyRequest);
        let status = self.sync.expect(conn.raw(), EventKind::AuthStatus);

        // The peripheral already has our parameters from the authenticate command.
        let reply_params = match role {
            LeConnRole::Central => None,
            LeConnRole::Peripheral => Some(params),
        };
        check(
            Op::SecParamsReply,
            self.driver
                .gap_sec_params_reply(conn, SecStatus::SUCCESS, reply_params, &keyset),
        )?;

        if let Some(keys) = &keys {
            match dhkey_request.wait(self.config.event_timeout).await {
                Some(Event::LescDhkeyRequest(req)) => {
                    pairing.set(PairingState::LescDhkeyRequested);
                    let dhkey = keys.dh_key(&req.peer_pk)?;
                    keyset.peer_pk = Some(req.peer_pk);
                    check(Op::LescDhkeyReply, self.driver.gap_lesc_dhkey_reply(conn, &dhkey))?;
                }
                _ => warn!("[security] conn {} no DH key request", conn.raw()),
            }
        }

        if let Some(passkey) = passkey {
            match key_request.wait(self.config.event_timeout).await {
                Some(Event::AuthKeyRequest(req)) if req.key_type == AuthKeyType::Passkey => {
                    pairing.set(PairingState::AuthKeyRequested);
                    check(
                        Op::AuthKeyReply,
                        self.driver
                            .gap_auth_key_reply(conn, AuthKeyType::Passkey, Some(&passkey[..])),
                    )?;
                }
                Some(other) => warn!("[security] conn {} cannot answer {:?}", conn.raw(), other),
                None => warn!("[security] conn {} no auth key request", conn.raw()),
            }
        }

        match status.wait(self.config.event_timeout).await {
            Some(Event::AuthStatus(auth)) => {
                pairing.set(PairingState::AuthStatusReceived);
                info!("[security] conn {} pairing finished: {}", conn.raw(), auth.status);
                if auth.status.is_success() {
                    self.connections.set_keyset(conn, keyset)?;
                }
                pairing.set(PairingState::Idle);
                Ok(Some(auth.status))
            }
            // An auth status record that does not decode is dropped by the dispatcher and lands
            // here as a timeout. The outcome of such a pairing is left open.
            _ => {
                warn!("[security] conn {} no usable auth status, outcome unknown", conn.raw());
                pairing.set(PairingState::Failed);
                Ok(None)
            }
        }
    }
}
