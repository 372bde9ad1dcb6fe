//! Supply conservation invariant checker.
//!
//! ```text
//! ∀ asset: Σ(account balances) + Σ(position holdings) == Σ(loaded) - Σ(unloaded)
//! ```
//!
//! Matching, closing, and liquidating only move funds between accounts and
//! positions, so none of them may change either side of the identity.

use std::collections::{BTreeSet, HashMap};

use bookkeeper_types::{Asset, BookkeeperError, Result, math};
use rust_decimal::Decimal;

/// Tracks what entered and left the system per asset.
#[derive(Debug, Default, Clone)]
pub struct SupplyConservation {
    inflows: HashMap<Asset, Decimal>,
    outflows: HashMap<Asset, Decimal>,
}

impl SupplyConservation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record funds loaded into the system.
    pub fn record_inflow(&mut self, asset: &str, amount: Decimal) -> Result<()> {
        let entry = self.inflows.entry(asset.to_string()).or_insert(Decimal::ZERO);
        *entry = math::add(*entry, amount, "supply inflow")?;
        Ok(())
    }

    /// Record funds unloaded from the system.
    pub fn record_outflow(&mut self, asset: &str, amount: Decimal) -> Result<()> {
        let entry = self.outflows.entry(asset.to_string()).or_insert(Decimal::ZERO);
        *entry = math::add(*entry, amount, "supply outflow")?;
        Ok(())
    }

    #[must_use]
    pub fn total_inflow(&self, asset: &str) -> Decimal {
        self.inflows.get(asset).copied().unwrap_or(Decimal::ZERO)
    }

    #[must_use]
    pub fn total_outflow(&self, asset: &str) -> Decimal {
        self.outflows.get(asset).copied().unwrap_or(Decimal::ZERO)
    }

    /// Inflow minus outflow.
    #[must_use]
    pub fn expected_supply(&self, asset: &str) -> Decimal {
        self.total_inflow(asset) - self.total_outflow(asset)
    }

    /// Compare the expected supply of `asset` with what custody actually holds.
    ///
    /// # Errors
    /// [`BookkeeperError::SupplyInvariantViolation`] if they differ.
    pub fn verify(&self, asset: &str, actual_supply: Decimal) -> Result<()> {
        let expected = self.expected_supply(asset);
        if actual_supply != expected {
            return Err(BookkeeperError::SupplyInvariantViolation {
                reason: format!(
                    "Asset {asset}: actual supply {actual_supply} != expected {expected} \
                     (loaded={}, unloaded={})",
                    self.total_inflow(asset),
                    self.total_outflow(asset),
                ),
            });
        }
        Ok(())
    }

    /// Every asset that ever entered or left, sorted.
    #[must_use]
    pub fn tracked_assets(&self) -> Vec<Asset> {
        let assets: BTreeSet<&Asset> = self.inflows.keys().chain(self.outflows.keys()).collect();
        assets.into_iter().cloned().collect()
    }
}
