//! Oracle quotes and collateral arithmetic shared by matching and the ledger.
//!
//! ```text
//!   ratio = (coll_amount × coll_price [+ loan_held × loan_price if leverage])
//!           ────────────────────────────────────────────────────────────────
//!                          loan_amount × loan_price
//! ```

use bookkeeper_plugins::{Oracle, OracleContext, PluginRegistry};
use bookkeeper_types::{
    BookkeeperError, Capability, CollateralCommitment, PluginReference, Result, constants, math,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::debug;

/// Which oracle price to ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Open,
    Close,
}

/// Ask `oracle` for the price of `asset`. Non-positive prices are treated
/// as an oracle failure.
pub fn quote(
    registry: &PluginRegistry,
    oracle: &PluginReference,
    asset: &str,
    now: DateTime<Utc>,
    phase: Phase,
) -> Result<Decimal> {
    let plugin = registry.oracle(&oracle.addr)?;
    let ctx = OracleContext { asset, now };
    let price = match phase {
        Phase::Open => plugin.open_price(&oracle.parameters, &ctx)?,
        Phase::Close => plugin.close_price(&oracle.parameters, &ctx)?,
    };
    if price <= Decimal::ZERO {
        return Err(BookkeeperError::plugin(
            Capability::Oracle,
            oracle.addr,
            format!("non-positive price {price} for {asset}"),
        ));
    }
    debug!(oracle = %oracle.addr, asset, %price, ?phase, "Oracle quote");
    Ok(price)
}

/// Collateral amount implied by a borrower's commitment at the given prices.
/// Ratio commitments round up at [`constants::COLLATERAL_SCALE`].
pub fn collateral_for(
    commitment: CollateralCommitment,
    loan_amount: Decimal,
    loan_price: Decimal,
    coll_price: Decimal,
) -> Result<Decimal> {
    match commitment {
        CollateralCommitment::Amount(amount) => Ok(amount),
        CollateralCommitment::Ratio(ratio) => {
            let loan_value = math::mul(loan_amount, loan_price, "loan value")?;
            let coll_value = math::mul(loan_value, ratio, "collateral value")?;
            math::div_ceil(
                coll_value,
                coll_price,
                constants::COLLATERAL_SCALE,
                "collateral amount",
            )
        }
    }
}

/// Ratio a fill opens at. A ratio commitment is taken at its word (plus
/// one if the loan itself counts as collateral); an amount commitment is
/// valued at the given prices.
pub fn opening_ratio(
    commitment: CollateralCommitment,
    coll_amount: Decimal,
    coll_price: Decimal,
    loan_amount: Decimal,
    loan_price: Decimal,
    is_leverage: bool,
) -> Result<Decimal> {
    match commitment {
        CollateralCommitment::Ratio(ratio) if is_leverage => {
            math::add(ratio, Decimal::ONE, "collateral ratio")
        }
        CollateralCommitment::Ratio(ratio) => Ok(ratio),
        CollateralCommitment::Amount(_) => collateral_ratio(
            coll_amount,
            coll_price,
            loan_amount,
            loan_price,
            is_leverage.then_some(loan_amount),
        ),
    }
}

/// Collateral value over loan value. `leveraged_loan` is the loan-asset
/// amount that also counts as collateral, if the agreement is leveraged.
pub fn collateral_ratio(
    coll_amount: Decimal,
    coll_price: Decimal,
    loan_amount: Decimal,
    loan_price: Decimal,
    leveraged_loan: Option<Decimal>,
) -> Result<Decimal> {
    let mut backing = math::mul(coll_amount, coll_price, "collateral value")?;
    if let Some(held) = leveraged_loan {
        backing = math::add(
            backing,
            math::mul(held, loan_price, "leveraged loan value")?,
            "collateral value",
        )?;
    }
    let loan_value = math::mul(loan_amount, loan_price, "loan value")?;
    math::div(backing, loan_value, "collateral ratio")
}
