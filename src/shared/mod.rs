//! Shared newtypes and utilities used across all modules.
//!
//! These types are serialization-transparent: they serialize/deserialize identically
//! to the raw strings wallets and backends exchange, so they can be used directly
//! in wire types without conversion overhead.

pub mod hex;
pub mod store;

pub use store::{Listeners, Store};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;

/// An EIP-155 chain ID (e.g. `8453` for Base).
pub type ChainId = u64;

/// Format a chain ID as a CAIP-2 identifier: `caip2(8453)` → `"eip155:8453"`.
pub fn caip2(chain_id: ChainId) -> String {
    format!("eip155:{}", chain_id)
}

/// Parse a CAIP-2 identifier. Returns `None` for non-`eip155` namespaces.
pub fn parse_caip2(caip: &str) -> Option<ChainId> {
    caip.strip_prefix("eip155:").and_then(|s| s.parse().ok())
}

// ─── WalletId ────────────────────────────────────────────────────────────────

/// String-tagged wallet discriminant (e.g. `"io.metamask"`, `"inApp"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WalletId(String);

impl WalletId {
    pub const METAMASK: &'static str = "io.metamask";
    pub const COINBASE: &'static str = "com.coinbase.wallet";
    pub const WALLET_CONNECT: &'static str = "walletConnect";
    pub const IN_APP: &'static str = "inApp";
    pub const SMART: &'static str = "smart";

    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_in_app(&self) -> bool {
        self.0 == Self::IN_APP
    }

    pub fn is_smart(&self) -> bool {
        self.0 == Self::SMART
    }

    pub fn is_wallet_connect(&self) -> bool {
        self.0 == Self::WALLET_CONNECT
    }
}

impl std::fmt::Display for WalletId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for WalletId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for WalletId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Serialize for WalletId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for WalletId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(WalletId(s))
    }
}

// ─── Address ─────────────────────────────────────────────────────────────────

/// A 20-byte EVM address, stored as lowercase `0x`-prefixed hex.
///
/// Serializes transparently as a JSON string. Can be used as a HashMap key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

/// Error returned when a string is not a valid 20-byte hex address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid address: {0}")]
pub struct InvalidAddress(pub String);

impl Address {
    pub const ZERO: &'static str = "0x0000000000000000000000000000000000000000";

    /// Parse and normalize an address. Accepts mixed case, requires the `0x` prefix.
    pub fn parse(s: &str) -> Result<Self, InvalidAddress> {
        let body = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| InvalidAddress(s.to_string()))?;
        if body.len() != 40 || !body.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(InvalidAddress(s.to_string()));
        }
        Ok(Self(format!("0x{}", body.to_ascii_lowercase())))
    }

    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(hex::to_hex(&bytes))
    }

    pub fn zero() -> Self {
        Self(Self::ZERO.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> [u8; 20] {
        let mut out = [0u8; 20];
        // Invariant: `self.0` was validated as 40 hex chars in `parse`/`from_bytes`.
        if let Ok(decoded) = ::hex::decode(&self.0[2..]) {
            out.copy_from_slice(&decoded);
        }
        out
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Address {
    type Err = InvalidAddress;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse(s)
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Address::parse(&s).map_err(serde::de::Error::custom)
    }
}

// ─── TxHash ──────────────────────────────────────────────────────────────────

/// A transaction hash as returned by the node (`0x`-prefixed, 32 bytes).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(String);

impl TxHash {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TxHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caip2_roundtrip() {
        assert_eq!(caip2(8453), "eip155:8453");
        assert_eq!(parse_caip2("eip155:8453"), Some(8453));
        assert_eq!(parse_caip2("cosmos:cosmoshub-4"), None);
        assert_eq!(parse_caip2("eip155:abc"), None);
    }

    #[test]
    fn test_address_normalizes_case() {
        let a = Address::parse("0xAbCdEf0123456789abcdef0123456789ABCDEF01").unwrap();
        assert_eq!(a.as_str(), "0xabcdef0123456789abcdef0123456789abcdef01");
    }

    #[test]
    fn test_address_rejects_bad_input() {
        assert!(Address::parse("abcdef0123456789abcdef0123456789abcdef01").is_err());
        assert!(Address::parse("0x1234").is_err());
        assert!(Address::parse("0xzzcdef0123456789abcdef0123456789abcdef01").is_err());
    }

    #[test]
    fn test_address_bytes() {
        let mut bytes = [0u8; 20];
        bytes[19] = 0xff;
        let a = Address::from_bytes(bytes);
        assert_eq!(a.as_str(), "0x00000000000000000000000000000000000000ff");
        assert_eq!(a.as_bytes(), bytes);
    }

    #[test]
    fn test_address_deserialize_validates() {
        let ok: Result<Address, _> =
            serde_json::from_str("\"0x00000000000000000000000000000000000000ff\"");
        assert!(ok.is_ok());
        let bad: Result<Address, _> = serde_json::from_str("\"0x12\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_wallet_id_helpers() {
        assert!(WalletId::from("inApp").is_in_app());
        assert!(WalletId::from("smart").is_smart());
        assert!(WalletId::from("walletConnect").is_wallet_connect());
        assert!(!WalletId::from("io.metamask").is_in_app());
        let json = serde_json::to_string(&WalletId::from("io.metamask")).unwrap();
        assert_eq!(json, "\"io.metamask\"");
    }
}
