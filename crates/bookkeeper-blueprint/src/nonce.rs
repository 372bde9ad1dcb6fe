//! Per-publisher nonce table.
//!
//! Every publisher starts at nonce 0. A successful match consumes one nonce;
//! the publisher may also jump ahead to void outstanding blueprints. Nonces
//! never decrease, so a blueprint whose `max_nonce` has been passed can never
//! become valid again.

use std::collections::HashMap;

use bookkeeper_types::{Address, BookkeeperError, Result};

#[derive(Debug, Default, Clone)]
pub struct NonceTracker {
    /// `publisher → current nonce`. Absent means 0.
    nonces: HashMap<Address, u64>,
}

impl NonceTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current nonce of `publisher`.
    #[must_use]
    pub fn current(&self, publisher: &Address) -> u64 {
        self.nonces.get(publisher).copied().unwrap_or(0)
    }

    /// Advance `publisher` by one and return the new nonce.
    ///
    /// Saturates at `u64::MAX`; a blueprint with `max_nonce == u64::MAX`
    /// stays reusable.
    pub fn increment(&mut self, publisher: &Address) -> u64 {
        let nonce = self.nonces.entry(*publisher).or_insert(0);
        *nonce = nonce.saturating_add(1);
        *nonce
    }

    /// Move `publisher` to `to`.
    ///
    /// # Errors
    /// `StaleNonce` if `to` is not strictly above the current nonce.
    pub fn raise(&mut self, publisher: &Address, to: u64) -> Result<()> {
        let current = self.current(publisher);
        if to <= current {
            return Err(BookkeeperError::StaleNonce {
                publisher: *publisher,
                current,
                max: to,
            });
        }
        self.nonces.insert(*publisher, to);
        Ok(())
    }

    /// Number of publishers with a non-zero nonce.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nonces.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nonces.is_empty()
    }
}
