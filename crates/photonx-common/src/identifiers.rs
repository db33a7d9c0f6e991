//! Identifier types for PhotonX protocol entities.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! impl_hex_debug {
    ($T:ident) => {
        impl fmt::Debug for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(self, f)
            }
        }
    };
}

macro_rules! impl_str_serde {
    ($T:ident) => {
        impl Serialize for $T {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $T {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

/// Error parsing a hex-encoded identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseIdError {
    InvalidHex,
    WrongLength { expected: usize },
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseIdError::InvalidHex => write!(f, "invalid hex"),
            ParseIdError::WrongLength { expected } => {
                write!(f, "wrong length, expected {} bytes", expected)
            }
        }
    }
}

impl std::error::Error for ParseIdError {}

/// Unique identifier for a channel.
///
/// An opaque 128-bit value, stringified as `0x` + 32 lowercase hex
/// characters for external use.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId([u8; 16]);

impl ChannelId {
    /// Create a new random channel ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().into_bytes())
    }

    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl Default for ChannelId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for ChannelId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(stripped).map_err(|_| ParseIdError::InvalidHex)?;
        let bytes: [u8; 16] = bytes
            .try_into()
            .map_err(|_| ParseIdError::WrongLength { expected: 16 })?;
        Ok(Self(bytes))
    }
}

impl_hex_debug!(ChannelId);
impl_str_serde!(ChannelId);

/// Unique identifier for a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuoteId(Uuid);

impl QuoteId {
    /// Create a new quote ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse from string.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for QuoteId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for QuoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FillId(Uuid);

impl FillId {
    /// Create a new fill ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for FillId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FillId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A 20-byte account address, displayed as lowercase `0x` hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// The all-zero address.
    pub const ZERO: Address = Address([0; 20]);

    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Check for the zero address.
    pub fn is_zero(&self) -> bool {
        self.0 == [0; 20]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(stripped).map_err(|_| ParseIdError::InvalidHex)?;
        let bytes: [u8; 20] = bytes
            .try_into()
            .map_err(|_| ParseIdError::WrongLength { expected: 20 })?;
        Ok(Self(bytes))
    }
}

impl_hex_debug!(Address);
impl_str_serde!(Address);

/// A 32-byte keccak-256 digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Hash {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(stripped).map_err(|_| ParseIdError::InvalidHex)?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| ParseIdError::WrongLength { expected: 32 })?;
        Ok(Self(bytes))
    }
}

impl_hex_debug!(Hash);
impl_str_serde!(Hash);

/// A 65-byte secp256k1 signature in `r ‖ s ‖ v` layout, `v ∈ {27, 28}`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub [u8; 65]);

impl Signature {
    /// Assemble from the 64-byte `r ‖ s` body and the recovery byte.
    pub fn new(rs: &[u8; 64], v: u8) -> Self {
        let mut sig = [0u8; 65];
        sig[..64].copy_from_slice(rs);
        sig[64] = v;
        Self(sig)
    }

    /// The `r ‖ s` body.
    pub fn rs(&self) -> &[u8] {
        &self.0[..64]
    }

    /// The recovery byte.
    pub fn v(&self) -> u8 {
        self.0[64]
    }
}

impl Default for Signature {
    fn default() -> Self {
        Self([0; 65])
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Signature {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(stripped).map_err(|_| ParseIdError::InvalidHex)?;
        let bytes: [u8; 65] = bytes
            .try_into()
            .map_err(|_| ParseIdError::WrongLength { expected: 65 })?;
        Ok(Self(bytes))
    }
}

impl_hex_debug!(Signature);
impl_str_serde!(Signature);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_id_roundtrip() {
        let id = ChannelId::new();
        let s = id.to_string();
        assert!(s.starts_with("0x"));
        assert_eq!(s.len(), 34);
        assert_eq!(s.parse::<ChannelId>().unwrap(), id);
    }

    #[test]
    fn test_channel_id_rejects_bad_input() {
        assert!("0xzz".parse::<ChannelId>().is_err());
        assert!("0x0011".parse::<ChannelId>().is_err());
    }

    #[test]
    fn test_address_display_is_lowercase() {
        let addr = Address([0xAB; 20]);
        assert_eq!(
            addr.to_string(),
            "0xabababababababababababababababababababab"
        );
        assert_eq!(addr.to_string().parse::<Address>().unwrap(), addr);
    }

    #[test]
    fn test_signature_layout() {
        let sig = Signature::new(&[0x11; 64], 27);
        assert_eq!(sig.v(), 27);
        assert_eq!(sig.rs(), &[0x11; 64][..]);
        assert_eq!(sig.to_string().parse::<Signature>().unwrap(), sig);
    }

    #[test]
    fn test_serde_as_strings() {
        let addr = Address([0x01; 20]);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", addr));

        let id = ChannelId::new();
        let json = serde_json::to_string(&id).unwrap();
        let back: ChannelId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
