//! GAP and security parameter types.
use core::fmt;

use crate::codec::{self, Decode, Encode, FixedSize};

/// Connection parameters.
///
/// Intervals are in units of 1.25 ms, the supervision timeout in units of 10 ms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnParams {
    /// Minimum connection interval.
    pub min_conn_interval: u16,
    /// Maximum connection interval.
    pub max_conn_interval: u16,
    /// Peripheral latency in connection events.
    pub slave_latency: u16,
    /// Supervision timeout.
    pub conn_sup_timeout: u16,
}

impl Default for ConnParams {
    fn default() -> Self {
        Self {
            min_conn_interval: 6,
            max_conn_interval: 24,
            slave_latency: 0,
            conn_sup_timeout: 400,
        }
    }
}

impl FixedSize for ConnParams {
    const SIZE: usize = 8;
}

impl Decode<'_> for ConnParams {
    fn decode(src: &[u8]) -> Result<Self, codec::Error> {
        if src.len() < Self::SIZE {
            return Err(codec::Error::InsufficientSpace);
        }
        Ok(Self {
            min_conn_interval: u16::decode(&src[0..])?,
            max_conn_interval: u16::decode(&src[2..])?,
            slave_latency: u16::decode(&src[4..])?,
            conn_sup_timeout: u16::decode(&src[6..])?,
        })
    }
}

impl Encode for ConnParams {
    fn encode(&self, dest: &mut [u8]) -> Result<(), codec::Error> {
        self.min_conn_interval.encode(&mut dest[0..2])?;
        self.max_conn_interval.encode(&mut dest[2..4])?;
        self.slave_latency.encode(&mut dest[4..6])?;
        self.conn_sup_timeout.encode(&mut dest[6..8])
    }
}

/// Scan parameters. Interval and window in units of 0.625 ms, timeout in units of 10 ms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanParams {
    /// Send scan requests.
    pub active: bool,
    /// Scan interval.
    pub interval: u16,
    /// Scan window.
    pub window: u16,
    /// Scan timeout, 0 scans until stopped.
    pub timeout: u16,
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            active: true,
            interval: 0x00A0,
            window: 0x0050,
            timeout: 0,
        }
    }
}

/// PHY bit set used in PHY negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Phy(pub u8);

impl Phy {
    /// Let the controller decide.
    pub const AUTO: Self = Self(0x00);
    /// LE 1M.
    pub const LE_1M: Self = Self(0x01);
    /// LE 2M.
    pub const LE_2M: Self = Self(0x02);
    /// LE Coded.
    pub const LE_CODED: Self = Self(0x04);
}

/// Preferred PHYs for a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhyParams {
    /// Preferred transmit PHYs.
    pub tx_phys: Phy,
    /// Preferred receive PHYs.
    pub rx_phys: Phy,
}

impl Default for PhyParams {
    fn default() -> Self {
        Self {
            tx_phys: Phy::AUTO,
            rx_phys: Phy::AUTO,
        }
    }
}

impl FixedSize for PhyParams {
    const SIZE: usize = 2;
}

impl Decode<'_> for PhyParams {
    fn decode(src: &[u8]) -> Result<Self, codec::Error> {
        if src.len() < Self::SIZE {
            return Err(codec::Error::InsufficientSpace);
        }
        Ok(Self {
            tx_phys: Phy(src[0]),
            rx_phys: Phy(src[1]),
        })
    }
}

impl Encode for PhyParams {
    fn encode(&self, dest: &mut [u8]) -> Result<(), codec::Error> {
        dest[0] = self.tx_phys.0;
        dest[1] = self.rx_phys.0;
        Ok(())
    }
}

/// Data length parameters. Octets are link layer payload sizes, times are in microseconds.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DataLengthParams {
    /// Maximum transmitted payload octets.
    pub max_tx_octets: u16,
    /// Maximum received payload octets.
    pub max_rx_octets: u16,
    /// Maximum transmit time.
    pub max_tx_time_us: u16,
    /// Maximum receive time.
    pub max_rx_time_us: u16,
}

impl FixedSize for DataLengthParams {
    const SIZE: usize = 8;
}

impl Decode<'_> for DataLengthParams {
    fn decode(src: &[u8]) -> Result<Self, codec::Error> {
        if src.len() < Self::SIZE {
            return Err(codec::Error::InsufficientSpace);
        }
        Ok(Self {
            max_tx_octets: u16::decode(&src[0..])?,
            max_rx_octets: u16::decode(&src[2..])?,
            max_tx_time_us: u16::decode(&src[4..])?,
            max_rx_time_us: u16::decode(&src[6..])?,
        })
    }
}

impl Encode for DataLengthParams {
    fn encode(&self, dest: &mut [u8]) -> Result<(), codec::Error> {
        self.max_tx_octets.encode(&mut dest[0..2])?;
        self.max_rx_octets.encode(&mut dest[2..4])?;
        self.max_tx_time_us.encode(&mut dest[4..6])?;
        self.max_rx_time_us.encode(&mut dest[6..8])
    }
}

/// Device I/O capabilities
// ([Vol 3] Part H, Section 2.3.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoCapabilities {
    /// Display only
    DisplayOnly,
    /// Yes/no display
    DisplayYesNo,
    /// Keyboard only
    KeyboardOnly,
    /// No input and no output
    NoInputNoOutput,
    /// Both keyboard and display
    KeyboardDisplay,
}

impl TryFrom<u8> for IoCapabilities {
    type Error = codec::Error;
    fn try_from(val: u8) -> Result<Self, codec::Error> {
        Ok(match val {
            0x00 => Self::DisplayOnly,
            0x01 => Self::DisplayYesNo,
            0x02 => Self::KeyboardOnly,
            0x03 => Self::NoInputNoOutput,
            0x04 => Self::KeyboardDisplay,
            _ => return Err(codec::Error::InvalidValue),
        })
    }
}

impl From<IoCapabilities> for u8 {
    fn from(val: IoCapabilities) -> u8 {
        match val {
            IoCapabilities::DisplayOnly => 0x00,
            IoCapabilities::DisplayYesNo => 0x01,
            IoCapabilities::KeyboardOnly => 0x02,
            IoCapabilities::NoInputNoOutput => 0x03,
            IoCapabilities::KeyboardDisplay => 0x04,
        }
    }
}

impl AsRef<str> for IoCapabilities {
    fn as_ref(&self) -> &str {
        match self {
            IoCapabilities::DisplayOnly => "Display Only",
            IoCapabilities::DisplayYesNo => "Display Yes/No",
            IoCapabilities::KeyboardOnly => "Keyboard Only",
            IoCapabilities::NoInputNoOutput => "No Input / No Output",
            IoCapabilities::KeyboardDisplay => "Keyboard and Display",
        }
    }
}

impl fmt::Display for IoCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

/// Keys to distribute during bonding.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct KeyDist(pub u8);

impl KeyDist {
    /// Long term key and master identification.
    pub const ENC: u8 = 0x01;
    /// Identity resolving key and identity address.
    pub const ID: u8 = 0x02;
    /// Connection signature resolving key.
    pub const SIGN: u8 = 0x04;
    /// Derive the BR/EDR link key.
    pub const LINK: u8 = 0x08;

    /// Whether the given key is part of this set.
    pub fn contains(&self, key: u8) -> bool {
        self.0 & key == key
    }
}

/// Security parameters offered during pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecParams {
    /// Perform bonding.
    pub bond: bool,
    /// Require man-in-the-middle protection.
    pub mitm: bool,
    /// Allow LE Secure Connections.
    pub lesc: bool,
    /// Generate keypress notifications.
    pub keypress: bool,
    /// Out of band data available.
    pub oob: bool,
    /// I/O capabilities.
    pub io_caps: IoCapabilities,
    /// Minimum encryption key size in octets.
    pub min_key_size: u8,
    /// Maximum encryption key size in octets.
    pub max_key_size: u8,
    /// Keys the local device distributes.
    pub kdist_own: KeyDist,
    /// Keys requested from the peer.
    pub kdist_peer: KeyDist,
}

impl Default for SecParams {
    fn default() -> Self {
        Self {
            bond: false,
            mitm: false,
            lesc: true,
            keypress: false,
            oob: false,
            io_caps: IoCapabilities::NoInputNoOutput,
            min_key_size: 7,
            max_key_size: 16,
            kdist_own: KeyDist::default(),
            kdist_peer: KeyDist::default(),
        }
    }
}

impl FixedSize for SecParams {
    const SIZE: usize = 6;
}

impl Decode<'_> for SecParams {
    fn decode(src: &[u8]) -> Result<Self, codec::Error> {
        if src.len() < Self::SIZE {
            return Err(codec::Error::InsufficientSpace);
        }
        let flags = src[0];
        Ok(Self {
            bond: flags & 0x01 != 0,
            mitm: flags & 0x02 != 0,
            lesc: flags & 0x04 != 0,
            keypress: flags & 0x08 != 0,
            oob: flags & 0x10 != 0,
            io_caps: IoCapabilities::try_from(src[1])?,
            min_key_size: src[2],
            max_key_size: src[3],
            kdist_own: KeyDist(src[4]),
            kdist_peer: KeyDist(src[5]),
        })
    }
}

impl Encode for SecParams {
    fn encode(&self, dest: &mut [u8]) -> Result<(), codec::Error> {
        dest[0] = (self.bond as u8)
            | (self.mitm as u8) << 1
            | (self.lesc as u8) << 2
            | (self.keypress as u8) << 3
            | (self.oob as u8) << 4;
        dest[1] = self.io_caps.into();
        dest[2] = self.min_key_size;
        dest[3] = self.max_key_size;
        dest[4] = self.kdist_own.0;
        dest[5] = self.kdist_peer.0;
        Ok(())
    }
}

/// LESC public key as exchanged with the driver: X then Y, each 32 bytes little-endian.
pub type LescPublicKey = [u8; 64];

/// Keys exchanged during pairing.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SecKeyset {
    /// Own LESC public key.
    pub own_pk: Option<LescPublicKey>,
    /// Peer LESC public key.
    pub peer_pk: Option<LescPublicKey>,
}

/// Pairing status reported by the auth status event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SecStatus(u8);

impl SecStatus {
    /// Procedure completed with success.
    pub const SUCCESS: Self = Self(0x00);
    /// Procedure timed out.
    pub const TIMEOUT: Self = Self(0x01);
    /// Security Manager PDU sent or received out of order.
    pub const PDU_INVALID: Self = Self(0x02);
    /// Passkey entry failed.
    pub const PASSKEY_ENTRY_FAILED: Self = Self(0x81);
    /// Out of band key not available.
    pub const OOB_NOT_AVAILABLE: Self = Self(0x82);
    /// Authentication requirements not met.
    pub const AUTH_REQ: Self = Self(0x83);
    /// Confirm value failed.
    pub const CONFIRM_VALUE: Self = Self(0x84);
    /// Pairing not supported.
    pub const PAIRING_NOT_SUPP: Self = Self(0x85);
    /// Encryption key size.
    pub const ENC_KEY_SIZE: Self = Self(0x86);
    /// Unsupported SMP command.
    pub const SMP_CMD_UNSUPPORTED: Self = Self(0x87);
    /// Unspecified reason.
    pub const UNSPECIFIED: Self = Self(0x88);
    /// Too little time elapsed since last attempt.
    pub const REPEATED_ATTEMPTS: Self = Self(0x89);
    /// Invalid parameters.
    pub const INVALID_PARAMS: Self = Self(0x8A);
    /// DHKey check failure.
    pub const DHKEY_FAILURE: Self = Self(0x8B);
    /// Numeric comparison failure.
    pub const NUM_COMP_FAILURE: Self = Self(0x8C);
    /// BR/EDR pairing in progress.
    pub const BR_EDR_IN_PROG: Self = Self(0x8D);
    /// BR/EDR link key cannot be used for LE keys.
    pub const X_TRANS_KEY_DISALLOWED: Self = Self(0x8E);

    /// Wrap a raw status value.
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    /// The raw status value.
    pub const fn raw(&self) -> u8 {
        self.0
    }

    /// Whether pairing succeeded.
    pub fn is_success(&self) -> bool {
        *self == Self::SUCCESS
    }
}

impl fmt::Display for SecStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            Self::SUCCESS => "success",
            Self::TIMEOUT => "timeout",
            Self::PDU_INVALID => "pdu invalid",
            Self::PASSKEY_ENTRY_FAILED => "passkey entry failed",
            Self::OOB_NOT_AVAILABLE => "oob not available",
            Self::AUTH_REQ => "authentication requirements",
            Self::CONFIRM_VALUE => "confirm value failed",
            Self::PAIRING_NOT_SUPP => "pairing not supported",
            Self::ENC_KEY_SIZE => "encryption key size",
            Self::SMP_CMD_UNSUPPORTED => "smp command unsupported",
            Self::UNSPECIFIED => "unspecified reason",
            Self::REPEATED_ATTEMPTS => "repeated attempts",
            Self::INVALID_PARAMS => "invalid parameters",
            Self::DHKEY_FAILURE => "dhkey check failed",
            Self::NUM_COMP_FAILURE => "numeric comparison failed",
            Self::BR_EDR_IN_PROG => "br/edr pairing in progress",
            Self::X_TRANS_KEY_DISALLOWED => "cross transport key disallowed",
            other => return write!(f, "unknown security status {:#04x}", other.0),
        };
        f.write_str(name)
    }
}

/// Key requested by an auth key request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthKeyType {
    /// No key.
    None,
    /// Six digit passkey.
    Passkey,
    /// 16 byte out of band key.
    Oob,
}

impl TryFrom<u8> for AuthKeyType {
    type Error = codec::Error;
    fn try_from(val: u8) -> Result<Self, codec::Error> {
        Ok(match val {
            0x00 => Self::None,
            0x01 => Self::Passkey,
            0x02 => Self::Oob,
            _ => return Err(codec::Error::InvalidValue),
        })
    }
}

impl From<AuthKeyType> for u8 {
    fn from(val: AuthKeyType) -> u8 {
        match val {
            AuthKeyType::None => 0x00,
            AuthKeyType::Passkey => 0x01,
            AuthKeyType::Oob => 0x02,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sec_params_flags() {
        let params = SecParams {
            bond: true,
            lesc: true,
            io_caps: IoCapabilities::KeyboardDisplay,
            ..Default::default()
        };
        let mut buf = [0; SecParams::SIZE];
        params.encode(&mut buf).unwrap();
        assert_eq!(buf, [0x05, 0x04, 7, 16, 0, 0]);
        assert_eq!(SecParams::decode(&buf).unwrap(), params);
    }

    #[test]
    fn unknown_io_capability_is_rejected() {
        assert_eq!(
            SecParams::decode(&[0x00, 0x09, 7, 16, 0, 0]),
            Err(codec::Error::InvalidValue)
        );
    }

    #[test]
    fn sec_status_names() {
        assert_eq!(SecStatus::DHKEY_FAILURE.to_string(), "dhkey check failed");
        assert_eq!(SecStatus::new(0x42).to_string(), "unknown security status 0x42");
    }
}
