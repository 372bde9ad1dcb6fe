//! Identifiers used throughout Bookkeeper.
//!
//! Actors (publishers, fillers, liquidators) are identified by their raw
//! ed25519 verifying key. Plugins live at an opaque 32-byte [`Address`] too,
//! conventionally derived from a label. Agreements and positions use UUIDv7
//! for time-ordered sorting.

use std::fmt;

use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Type alias for asset identifiers (e.g., "WETH", "USDC").
pub type Asset = String;

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A 32-byte identity: an ed25519 public key for actors, or an opaque id for
/// plugins resolved through the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Address(pub [u8; 32]);

impl Address {
    /// The all-zero address. Never a valid publisher.
    pub const ZERO: Self = Self([0u8; 32]);

    #[must_use]
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        Self(key.to_bytes())
    }

    /// Derive a stable plugin address from a human-readable label.
    #[must_use]
    pub fn derive(label: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"bookkeeper:address:v1:");
        hasher.update(label.as_bytes());
        Self(hasher.finalize().into())
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0[..8]))
    }
}

/// Random addresses for tests. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
impl Address {
    pub fn random() -> Self {
        Self(rand::random::<[u8; 32]>())
    }
}

// ---------------------------------------------------------------------------
// BlueprintHash
// ---------------------------------------------------------------------------

/// Canonical, domain-separated digest of a blueprint. This is what the
/// publisher signs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct BlueprintHash(pub [u8; 32]);

impl BlueprintHash {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for BlueprintHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bp:{}", hex::encode(&self.0[..8]))
    }
}

// ---------------------------------------------------------------------------
// AgreementId
// ---------------------------------------------------------------------------

/// Unique identifier for an open agreement. Uses UUIDv7 for time-ordered sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct AgreementId(pub Uuid);

impl AgreementId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for AgreementId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AgreementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agr:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// PositionId
// ---------------------------------------------------------------------------

/// Identifier of a position instance inside a position factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct PositionId(pub Uuid);

impl PositionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for PositionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pos:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_addresses_are_stable_and_distinct() {
        assert_eq!(Address::derive("oracle:static"), Address::derive("oracle:static"));
        assert_ne!(Address::derive("oracle:static"), Address::derive("oracle:feed"));
    }

    #[test]
    fn address_display_is_hex_prefix() {
        let addr = Address([0xab; 32]);
        assert_eq!(format!("{addr}"), "0xabababababababab");
    }

    #[test]
    fn agreement_id_ordering() {
        let a = AgreementId::new();
        let b = AgreementId::new();
        assert!(a < b);
    }

    #[test]
    fn serde_roundtrips() {
        let addr = Address::random();
        let json = serde_json::to_string(&addr).unwrap();
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(addr, back);

        let id = AgreementId::new();
        let json = serde_json::to_string(&id).unwrap();
        let back: AgreementId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
