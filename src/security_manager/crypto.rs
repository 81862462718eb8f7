//! P-256 key pair and Diffie-Hellman for LE Secure Connections.
//!
//! Keys cross the driver boundary little-endian while the curve library works big-endian, so
//! every coordinate and the DH key are reversed on the way in and out.
use p256::ecdh::EphemeralSecret;
use p256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use p256::{EncodedPoint, FieldBytes, PublicKey};
use rand_core::{CryptoRng, OsRng, RngCore};

use crate::types::gap::LescPublicKey;
use crate::Error;

/// A local LESC key pair.
pub struct KeyPair {
    secret: EphemeralSecret,
    public: LescPublicKey,
}

impl KeyPair {
    /// Generate a key pair from the operating system's RNG.
    pub fn generate() -> Self {
        Self::generate_with(&mut OsRng)
    }

    pub fn generate_with<R: CryptoRng + RngCore>(rng: &mut R) -> Self {
        let secret = EphemeralSecret::random(rng);
        let point = secret.public_key().to_encoded_point(false);
        let mut public = [0; 64];
        if let (Some(x), Some(y)) = (point.x(), point.y()) {
            public[..32].copy_from_slice(x);
            public[32..].copy_from_slice(y);
        }
        public[..32].reverse();
        public[32..].reverse();
        Self { secret, public }
    }

    /// Public key, X then Y, each little-endian.
    pub fn public_key(&self) -> &LescPublicKey {
        &self.public
    }

    /// Shared DH key with the peer, little-endian.
    pub fn dh_key(&self, peer: &LescPublicKey) -> Result<[u8; 32], Error> {
        let peer = public_key_from_le(peer)?;
        let shared = self.secret.diffie_hellman(&peer);
        let mut key = [0; 32];
        key.copy_from_slice(shared.raw_secret_bytes());
        key.reverse();
        Ok(key)
    }
}

fn public_key_from_le(raw: &LescPublicKey) -> Result<PublicKey, Error> {
    let mut x = [0; 32];
    let mut y = [0; 32];
    x.copy_from_slice(&raw[..32]);
    y.copy_from_slice(&raw[32..]);
    x.reverse();
    y.reverse();
    let point = EncodedPoint::from_affine_coordinates(&FieldBytes::from(x), &FieldBytes::from(y), false);
    let key: Option<PublicKey> = PublicKey::from_encoded_point(&point).into();
    key.ok_or(Error::InvalidPublicKey)
}
