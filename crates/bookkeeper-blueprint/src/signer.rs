//! Off-ledger publisher side: build and sign blueprints.

use bookkeeper_types::{Address, Blueprint, Order, Result, SignedBlueprint, SigningDomain};
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signer, SigningKey};

use crate::{codec, hash};

/// Holds a publisher's ed25519 key and signs blueprints for a domain.
#[derive(Debug, Clone)]
pub struct BlueprintSigner {
    key: SigningKey,
}

impl BlueprintSigner {
    #[must_use]
    pub fn new(key: SigningKey) -> Self {
        Self { key }
    }

    /// The address blueprints signed by this key must name as publisher.
    #[must_use]
    pub fn publisher(&self) -> Address {
        Address::from_verifying_key(&self.key.verifying_key())
    }

    /// An unsigned blueprint published by this signer.
    #[must_use]
    pub fn blueprint(
        &self,
        data: Vec<u8>,
        max_nonce: u64,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Blueprint {
        Blueprint {
            publisher: self.publisher(),
            data,
            max_nonce,
            start_time,
            end_time,
        }
    }

    /// Hash `blueprint` under `domain` and sign the hash.
    ///
    /// The blueprint is signed as given; if it names another publisher the
    /// result will not verify.
    #[must_use]
    pub fn sign(&self, domain: &SigningDomain, blueprint: Blueprint) -> SignedBlueprint {
        let blueprint_hash = hash::canonical_hash(&hash::domain_separator(domain), &blueprint);
        let signature = self.key.sign(blueprint_hash.as_bytes());
        SignedBlueprint {
            blueprint,
            blueprint_hash,
            signature: signature.to_bytes().to_vec(),
        }
    }

    /// Encode `order`, wrap it in a blueprint, and sign it.
    ///
    /// # Errors
    /// `Serialization` if the order cannot be encoded.
    pub fn sign_order(
        &self,
        domain: &SigningDomain,
        order: &Order,
        max_nonce: u64,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<SignedBlueprint> {
        let data = codec::encode_order(order)?;
        Ok(self.sign(
            domain,
            self.blueprint(data, max_nonce, start_time, end_time),
        ))
    }
}

#[cfg(test)]
mod tests {
    use bookkeeper_types::PluginReference;
    use chrono::Duration;

    use super::*;
    use crate::BlueprintAuthority;

    #[test]
    fn signed_order_verifies_and_decodes() {
        let signer = BlueprintSigner::new(SigningKey::generate(&mut rand::rngs::OsRng));
        let authority = BlueprintAuthority::new(SigningDomain::default());
        let plugin = |label: &str| PluginReference::new(Address::derive(label), Vec::new());
        let order = Order::dummy_offer(
            plugin("account"),
            plugin("oracle:loan"),
            plugin("oracle:coll"),
            plugin("assessor"),
            plugin("liquidator"),
            Address::derive("factory"),
        );
        let now = Utc::now();
        let signed = signer
            .sign_order(authority.domain(), &order, 0, now, now + Duration::hours(1))
            .unwrap();

        assert_eq!(signed.signature.len(), 64);
        assert_eq!(authority.verify(&signed, now).unwrap(), signer.publisher());
        assert_eq!(codec::decode_order(&signed.blueprint.data).unwrap(), order);
    }

    #[test]
    fn publisher_is_verifying_key() {
        let key = SigningKey::generate(&mut rand::rngs::OsRng);
        let signer = BlueprintSigner::new(key.clone());
        assert_eq!(signer.publisher().0, key.verifying_key().to_bytes());
    }
}
