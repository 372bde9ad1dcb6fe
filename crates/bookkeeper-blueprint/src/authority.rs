//! # BlueprintAuthority: who signed what, and is it still valid?
//!
//! The authority owns the signing domain and the per-publisher nonce table.
//! [`BlueprintAuthority::verify`] is a pure check: it never mutates state.
//! Nonces only move through [`BlueprintAuthority::consume_nonce`] (after a
//! match has fully succeeded) and [`BlueprintAuthority::raise_nonce`].
//!
//! ## Verification order
//!
//! ```text
//!   hash == canonical_hash(blueprint)?      else HashMismatch
//!   signature valid for publisher?          else InvalidSignature
//!   start_time <= now <= end_time?          else OutOfWindow
//!   nonce(publisher) <= max_nonce?          else StaleNonce
//! ```

use bookkeeper_types::{
    Address, Blueprint, BlueprintHash, BookkeeperError, Result, SignedBlueprint, SigningDomain,
};
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, VerifyingKey};
use tracing::debug;

use crate::{hash, nonce::NonceTracker};

#[derive(Debug, Clone)]
pub struct BlueprintAuthority {
    domain: SigningDomain,
    /// Cached `hash::domain_separator(&domain)`.
    domain_separator: [u8; 32],
    nonces: NonceTracker,
}

impl BlueprintAuthority {
    #[must_use]
    pub fn new(domain: SigningDomain) -> Self {
        let domain_separator = hash::domain_separator(&domain);
        Self {
            domain,
            domain_separator,
            nonces: NonceTracker::new(),
        }
    }

    #[must_use]
    pub fn domain(&self) -> &SigningDomain {
        &self.domain
    }

    #[must_use]
    pub fn domain_separator(&self) -> &[u8; 32] {
        &self.domain_separator
    }

    /// Canonical hash of `blueprint` under this authority's domain.
    #[must_use]
    pub fn canonical_hash(&self, blueprint: &Blueprint) -> BlueprintHash {
        hash::canonical_hash(&self.domain_separator, blueprint)
    }

    /// Verify a signed blueprint at time `now` and return its publisher.
    ///
    /// # Errors
    /// `HashMismatch`, `InvalidSignature`, `OutOfWindow` or `StaleNonce`,
    /// checked in that order.
    pub fn verify(&self, signed: &SignedBlueprint, now: DateTime<Utc>) -> Result<Address> {
        let blueprint = &signed.blueprint;

        let computed = self.canonical_hash(blueprint);
        if computed != signed.blueprint_hash {
            return Err(BookkeeperError::HashMismatch {
                submitted: signed.blueprint_hash,
                computed,
            });
        }

        verify_signature(&blueprint.publisher, &computed, &signed.signature)?;

        if !blueprint.is_within_window(now) {
            return Err(BookkeeperError::OutOfWindow);
        }

        let current = self.nonces.current(&blueprint.publisher);
        if current > blueprint.max_nonce {
            return Err(BookkeeperError::StaleNonce {
                publisher: blueprint.publisher,
                current,
                max: blueprint.max_nonce,
            });
        }

        Ok(blueprint.publisher)
    }

    /// Current nonce of `publisher`.
    #[must_use]
    pub fn nonce(&self, publisher: &Address) -> u64 {
        self.nonces.current(publisher)
    }

    /// Advance `publisher`'s nonce by one. Call only after a match has
    /// fully succeeded.
    pub fn consume_nonce(&mut self, publisher: &Address) -> u64 {
        let nonce = self.nonces.increment(publisher);
        debug!(publisher = %publisher, nonce, "Publisher nonce consumed");
        nonce
    }

    /// Jump `publisher`'s nonce to `to`, voiding every blueprint whose
    /// `max_nonce` is below it.
    ///
    /// # Errors
    /// `Unauthorized` if `caller` is not `publisher`; `StaleNonce` if `to`
    /// does not move the nonce forward.
    pub fn raise_nonce(&mut self, caller: &Address, publisher: &Address, to: u64) -> Result<()> {
        if caller != publisher {
            return Err(BookkeeperError::unauthorized(format!(
                "{caller} cannot raise the nonce of {publisher}"
            )));
        }
        self.nonces.raise(publisher, to)?;
        debug!(publisher = %publisher, nonce = to, "Publisher nonce raised");
        Ok(())
    }
}

/// Check an ed25519 signature by `publisher` over `hash`.
fn verify_signature(publisher: &Address, hash: &BlueprintHash, signature: &[u8]) -> Result<()> {
    let invalid = || BookkeeperError::InvalidSignature {
        publisher: *publisher,
    };
    let key = VerifyingKey::from_bytes(publisher.as_bytes()).map_err(|_| invalid())?;
    let signature = Signature::from_slice(signature).map_err(|_| invalid())?;
    key.verify_strict(hash.as_bytes(), &signature)
        .map_err(|_| invalid())
}
