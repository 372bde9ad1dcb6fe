//! Blueprint types: the signed, off-ledger statement of intent.
//!
//! A publisher builds a [`Blueprint`], the authority computes its canonical
//! hash, and the publisher signs that hash. The resulting
//! [`SignedBlueprint`] is what a filler submits alongside their fill.
//!
//! ```text
//!   Blueprint ──canonical_hash──▶ BlueprintHash ──ed25519 sign──▶ SignedBlueprint
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Address, BlueprintHash, BookkeeperError, constants};

/// The closed set of payload kinds a blueprint may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum BlueprintKind {
    /// A lending order (offer or request).
    Order = constants::ORDER_TAG,
}

impl BlueprintKind {
    #[must_use]
    pub fn tag(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for BlueprintKind {
    type Error = BookkeeperError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            constants::ORDER_TAG => Ok(Self::Order),
            other => Err(BookkeeperError::DataKind { tag: Some(other) }),
        }
    }
}

impl std::fmt::Display for BlueprintKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Order => write!(f, "ORDER"),
        }
    }
}

/// An unsigned statement of intent.
///
/// Immutable once hashed: changing any field changes the canonical hash and
/// invalidates the signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blueprint {
    /// Who signs and is bound by this blueprint.
    pub publisher: Address,
    /// Packed, tagged payload (see the blueprint codec).
    pub data: Vec<u8>,
    /// Highest publisher nonce at which this blueprint is still valid.
    pub max_nonce: u64,
    /// Not valid before this instant.
    pub start_time: DateTime<Utc>,
    /// Not valid after this instant.
    pub end_time: DateTime<Utc>,
}

impl Blueprint {
    /// Whether `now` lies within `[start_time, end_time]`.
    #[must_use]
    pub fn is_within_window(&self, now: DateTime<Utc>) -> bool {
        self.start_time <= now && now <= self.end_time
    }
}

/// A blueprint together with its claimed hash and the publisher's signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedBlueprint {
    pub blueprint: Blueprint,
    /// Must equal the canonical hash of `blueprint`.
    pub blueprint_hash: BlueprintHash,
    /// 64-byte ed25519 signature over `blueprint_hash`.
    pub signature: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_blueprint() -> Blueprint {
        let now = Utc::now();
        Blueprint {
            publisher: Address::random(),
            data: vec![constants::ORDER_TAG],
            max_nonce: 0,
            start_time: now - chrono::Duration::hours(1),
            end_time: now + chrono::Duration::hours(1),
        }
    }

    #[test]
    fn kind_tag_roundtrip() {
        let kind = BlueprintKind::Order;
        assert_eq!(BlueprintKind::try_from(kind.tag()).unwrap(), kind);
    }

    #[test]
    fn unknown_tag_is_data_kind_error() {
        let err = BlueprintKind::try_from(0x7f).unwrap_err();
        assert!(matches!(err, BookkeeperError::DataKind { tag: Some(0x7f) }));
    }

    #[test]
    fn window_is_inclusive() {
        let bp = make_blueprint();
        assert!(bp.is_within_window(bp.start_time));
        assert!(bp.is_within_window(bp.end_time));
        assert!(!bp.is_within_window(bp.end_time + chrono::Duration::seconds(1)));
        assert!(!bp.is_within_window(bp.start_time - chrono::Duration::seconds(1)));
    }

    #[test]
    fn kind_display() {
        assert_eq!(format!("{}", BlueprintKind::Order), "ORDER");
    }
}
