//! Settlement types: what a position holds and who gets what when it unwinds.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Asset, BookkeeperError, Result, math};

/// Per-asset amounts held by a position. Ordered for deterministic iteration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holdings(BTreeMap<Asset, Decimal>);

impl Holdings {
    #[must_use]
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Amount held of `asset` (zero if absent).
    #[must_use]
    pub fn get(&self, asset: &str) -> Decimal {
        self.0.get(asset).copied().unwrap_or(Decimal::ZERO)
    }

    /// Add `amount` of `asset`.
    ///
    /// # Errors
    /// `ArithmeticOverflow` if the total overflows.
    pub fn add(&mut self, asset: &str, amount: Decimal) -> Result<()> {
        let entry = self.0.entry(asset.to_string()).or_insert(Decimal::ZERO);
        *entry = math::add(*entry, amount, "holdings")?;
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Asset, &Decimal)> {
        self.0.iter()
    }

    /// Whether nothing non-zero is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.values().all(Decimal::is_zero)
    }
}

/// Who a payout goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Party {
    Lender,
    Borrower,
    Liquidator,
}

impl std::fmt::Display for Party {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lender => write!(f, "LENDER"),
            Self::Borrower => write!(f, "BORROWER"),
            Self::Liquidator => write!(f, "LIQUIDATOR"),
        }
    }
}

/// A single credit out of an unwound position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub to: Party,
    pub asset: Asset,
    pub amount: Decimal,
}

/// How an unwound position is distributed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub payouts: Vec<Payout>,
}

impl Settlement {
    /// Append a payout, skipping zero amounts.
    pub fn pay(&mut self, to: Party, asset: &str, amount: Decimal) {
        if !amount.is_zero() {
            self.payouts.push(Payout {
                to,
                asset: asset.to_string(),
                amount,
            });
        }
    }

    /// Sum of payouts per asset.
    ///
    /// # Errors
    /// `ArithmeticOverflow` if a total overflows.
    pub fn totals(&self) -> Result<Holdings> {
        let mut totals = Holdings::new();
        for payout in &self.payouts {
            totals.add(&payout.asset, payout.amount)?;
        }
        Ok(totals)
    }

    /// Total paid to `party` in `asset`.
    #[must_use]
    pub fn paid_to(&self, party: Party, asset: &str) -> Decimal {
        self.payouts
            .iter()
            .filter(|p| p.to == party && p.asset == asset)
            .map(|p| p.amount)
            .sum()
    }

    /// Check that payouts distribute exactly `available` (no negative
    /// payouts, nothing created, nothing left behind).
    ///
    /// # Errors
    /// `SupplyInvariantViolation` describing the first mismatch.
    pub fn verify_conserves(&self, available: &Holdings) -> Result<()> {
        if let Some(p) = self.payouts.iter().find(|p| p.amount.is_sign_negative()) {
            return Err(BookkeeperError::SupplyInvariantViolation {
                reason: format!("negative payout of {} {} to {}", p.amount, p.asset, p.to),
            });
        }
        let totals = self.totals()?;
        for (asset, paid) in totals.iter() {
            let held = available.get(asset);
            if *paid != held {
                return Err(BookkeeperError::SupplyInvariantViolation {
                    reason: format!("asset {asset}: paid {paid} != available {held}"),
                });
            }
        }
        for (asset, held) in available.iter() {
            if !held.is_zero() && totals.get(asset).is_zero() {
                return Err(BookkeeperError::SupplyInvariantViolation {
                    reason: format!("asset {asset}: {held} available but nothing paid"),
                });
            }
        }
        Ok(())
    }
}

/// Current valuation of an agreement, handed to the liquidator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Valuation {
    /// Close price of the loan asset.
    pub loan_price: Decimal,
    /// Close price of the collateral asset.
    pub coll_price: Decimal,
    /// What the position holds right now.
    pub holdings: Holdings,
    /// Principal plus cost, in the loan asset.
    pub owed: Decimal,
    /// Current collateral value / loan value.
    pub collateral_ratio: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holdings(pairs: &[(&str, i64)]) -> Holdings {
        let mut h = Holdings::new();
        for (asset, amount) in pairs {
            h.add(asset, Decimal::new(*amount, 0)).unwrap();
        }
        h
    }

    #[test]
    fn holdings_accumulate() {
        let h = holdings(&[("USDC", 100), ("USDC", 50), ("WETH", 1)]);
        assert_eq!(h.get("USDC"), Decimal::new(150, 0));
        assert_eq!(h.get("WETH"), Decimal::ONE);
        assert_eq!(h.get("DAI"), Decimal::ZERO);
    }

    #[test]
    fn zero_payouts_are_skipped() {
        let mut s = Settlement::default();
        s.pay(Party::Lender, "WETH", Decimal::ZERO);
        assert!(s.payouts.is_empty());
    }

    #[test]
    fn exact_distribution_conserves() {
        let available = holdings(&[("USDC", 300), ("WETH", 1)]);
        let mut s = Settlement::default();
        s.pay(Party::Lender, "WETH", Decimal::ONE);
        s.pay(Party::Liquidator, "USDC", Decimal::new(30, 0));
        s.pay(Party::Borrower, "USDC", Decimal::new(270, 0));
        assert!(s.verify_conserves(&available).is_ok());
        assert_eq!(s.paid_to(Party::Borrower, "USDC"), Decimal::new(270, 0));
    }

    #[test]
    fn overpayment_detected() {
        let available = holdings(&[("USDC", 300)]);
        let mut s = Settlement::default();
        s.pay(Party::Lender, "USDC", Decimal::new(301, 0));
        let err = s.verify_conserves(&available).unwrap_err();
        assert!(matches!(err, BookkeeperError::SupplyInvariantViolation { .. }));
    }

    #[test]
    fn leftover_detected() {
        let available = holdings(&[("USDC", 300), ("WETH", 1)]);
        let mut s = Settlement::default();
        s.pay(Party::Borrower, "USDC", Decimal::new(300, 0));
        assert!(s.verify_conserves(&available).is_err());
    }
}
