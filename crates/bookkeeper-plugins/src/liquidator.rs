//! Liquidator plugins.
//!
//! [`StandardLiquidator`] splits an under-collateralized position three ways:
//!
//! 1. the liquidator takes `reward_ratio` of the collateral;
//! 2. the lender is owed `valuation.owed` in the loan asset, paid from the
//!    position's loan holdings first, then from the remaining collateral at
//!    close prices;
//! 3. the borrower gets whatever is left.
//!
//! The plan always pays out exactly what the position holds.

use bookkeeper_types::{
    Address, Agreement, BookkeeperError, Capability, Party, Result, Settlement, Valuation, math,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{capability::Liquidator, params};

/// Parameters of a [`StandardLiquidator`]. Empty parameters mean no reward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardLiquidatorParams {
    /// Fraction of the collateral paid to whoever triggers liquidation.
    pub reward_ratio: Decimal,
}

#[derive(Debug, Clone)]
pub struct StandardLiquidator {
    addr: Address,
}

impl StandardLiquidator {
    #[must_use]
    pub fn new(addr: Address) -> Self {
        Self { addr }
    }
}

impl Liquidator for StandardLiquidator {
    fn liquidate(
        &self,
        params: &[u8],
        agreement: &Agreement,
        valuation: &Valuation,
    ) -> Result<Settlement> {
        let p: StandardLiquidatorParams =
            params::decode_or_default(Capability::Liquidator, self.addr, params)?;
        if p.reward_ratio.is_sign_negative() || p.reward_ratio > Decimal::ONE {
            return Err(BookkeeperError::plugin(
                Capability::Liquidator,
                self.addr,
                format!("reward ratio {} outside [0, 1]", p.reward_ratio),
            ));
        }

        let loan_asset = agreement.loan_asset.as_str();
        let coll_asset = agreement.coll_asset.as_str();
        let loan_held = valuation.holdings.get(loan_asset);
        let coll_held = valuation.holdings.get(coll_asset);

        let mut settlement = Settlement::default();

        let reward = math::mul(coll_held, p.reward_ratio, "liquidation reward")?;
        settlement.pay(Party::Liquidator, coll_asset, reward);
        let mut coll_left = coll_held - reward;

        let from_loan = loan_held.min(valuation.owed);
        settlement.pay(Party::Lender, loan_asset, from_loan);
        settlement.pay(Party::Borrower, loan_asset, loan_held - from_loan);

        let shortfall = valuation.owed - from_loan;
        if shortfall > Decimal::ZERO {
            let shortfall_value = math::mul(shortfall, valuation.loan_price, "liquidation shortfall")?;
            let coll_needed = math::div(shortfall_value, valuation.coll_price, "liquidation shortfall")?;
            let from_coll = coll_needed.min(coll_left);
            settlement.pay(Party::Lender, coll_asset, from_coll);
            coll_left -= from_coll;
        }
        settlement.pay(Party::Borrower, coll_asset, coll_left);

        Ok(settlement)
    }
}

// ---------------------------------------------------------------------------
// LiquidatorPlugin
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum LiquidatorPlugin {
    Standard(StandardLiquidator),
}

impl LiquidatorPlugin {
    #[must_use]
    pub fn addr(&self) -> Address {
        match self {
            Self::Standard(l) => l.addr,
        }
    }
}

impl Liquidator for LiquidatorPlugin {
    fn liquidate(
        &self,
        params: &[u8],
        agreement: &Agreement,
        valuation: &Valuation,
    ) -> Result<Settlement> {
        match self {
            Self::Standard(l) => l.liquidate(params, agreement, valuation),
        }
    }
}

impl From<StandardLiquidator> for LiquidatorPlugin {
    fn from(liquidator: StandardLiquidator) -> Self {
        Self::Standard(liquidator)
    }
}
