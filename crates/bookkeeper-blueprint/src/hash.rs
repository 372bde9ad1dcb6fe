//! Canonical, domain-separated blueprint hashing.
//!
//! ```text
//!   domain_separator = SHA-256("bookkeeper:domain:v1:" || name || version || realm_id || authority)
//!   struct_hash      = SHA-256("bookkeeper:blueprint:v1:" || publisher || data || max_nonce || start || end)
//!   canonical_hash   = SHA-256(0x19 0x01 || domain_separator || struct_hash)
//! ```
//!
//! Variable-length fields are length-prefixed so no two distinct blueprints
//! share an encoding. Times are committed as Unix seconds plus sub-second
//! nanoseconds.

use bookkeeper_types::{Blueprint, BlueprintHash, SigningDomain};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Hash of the signing domain. Changes whenever any domain field changes.
#[must_use]
pub fn domain_separator(domain: &SigningDomain) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"bookkeeper:domain:v1:");
    update_bytes(&mut hasher, domain.protocol_name.as_bytes());
    update_bytes(&mut hasher, domain.protocol_version.as_bytes());
    hasher.update(domain.realm_id.to_le_bytes());
    hasher.update(domain.authority.as_bytes());
    hasher.finalize().into()
}

/// Hash committing to every field of the blueprint.
#[must_use]
pub fn struct_hash(blueprint: &Blueprint) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"bookkeeper:blueprint:v1:");
    hasher.update(blueprint.publisher.as_bytes());
    update_bytes(&mut hasher, &blueprint.data);
    hasher.update(blueprint.max_nonce.to_le_bytes());
    update_time(&mut hasher, blueprint.start_time);
    update_time(&mut hasher, blueprint.end_time);
    hasher.finalize().into()
}

/// The digest a publisher signs.
#[must_use]
pub fn canonical_hash(domain_separator: &[u8; 32], blueprint: &Blueprint) -> BlueprintHash {
    let mut hasher = Sha256::new();
    hasher.update([0x19, 0x01]);
    hasher.update(domain_separator);
    hasher.update(struct_hash(blueprint));
    BlueprintHash(hasher.finalize().into())
}

fn update_bytes(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

fn update_time(hasher: &mut Sha256, at: DateTime<Utc>) {
    hasher.update(at.timestamp().to_le_bytes());
    hasher.update(at.timestamp_subsec_nanos().to_le_bytes());
}

#[cfg(test)]
mod tests {
    use bookkeeper_types::Address;
    use chrono::Duration;

    use super::*;

    fn make_blueprint() -> Blueprint {
        let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        Blueprint {
            publisher: Address([7u8; 32]),
            data: vec![0x01, 0xaa, 0xbb],
            max_nonce: 3,
            start_time: start,
            end_time: start + Duration::hours(1),
        }
    }

    #[test]
    fn hash_is_deterministic() {
        let sep = domain_separator(&SigningDomain::default());
        let bp = make_blueprint();
        assert_eq!(canonical_hash(&sep, &bp), canonical_hash(&sep, &bp));
    }

    #[test]
    fn every_field_changes_the_hash() {
        let sep = domain_separator(&SigningDomain::default());
        let base = make_blueprint();
        let original = canonical_hash(&sep, &base);

        let mut variants = Vec::new();
        let mut bp = base.clone();
        bp.publisher = Address([8u8; 32]);
        variants.push(bp);
        let mut bp = base.clone();
        bp.data.push(0);
        variants.push(bp);
        let mut bp = base.clone();
        bp.max_nonce += 1;
        variants.push(bp);
        let mut bp = base.clone();
        bp.start_time += Duration::nanoseconds(1);
        variants.push(bp);
        let mut bp = base.clone();
        bp.end_time -= Duration::seconds(1);
        variants.push(bp);

        for variant in variants {
            assert_ne!(canonical_hash(&sep, &variant), original, "{variant:?}");
        }
    }

    #[test]
    fn domain_fields_change_the_separator() {
        let base = SigningDomain::default();
        let original = domain_separator(&base);

        let mut d = base.clone();
        d.realm_id = 2;
        assert_ne!(domain_separator(&d), original);

        let mut d = base.clone();
        d.protocol_version = "1.0.1".to_string();
        assert_ne!(domain_separator(&d), original);

        let mut d = base.clone();
        d.protocol_name = "Other".to_string();
        assert_ne!(domain_separator(&d), original);

        let mut d = base;
        d.authority = Address::derive("another:authority");
        assert_ne!(domain_separator(&d), original);
    }

    #[test]
    fn length_prefix_prevents_field_shifting() {
        let mut a = SigningDomain::default();
        a.protocol_name = "ab".to_string();
        a.protocol_version = "c".to_string();
        let mut b = a.clone();
        b.protocol_name = "a".to_string();
        b.protocol_version = "bc".to_string();
        assert_ne!(domain_separator(&a), domain_separator(&b));
    }
}
