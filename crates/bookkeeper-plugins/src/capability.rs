//! Capability contracts the engine consumes.
//!
//! Each capability is a trait with a closed enum of implementations that the
//! [`PluginRegistry`](crate::PluginRegistry) resolves by address. `params`
//! is always the opaque parameter blob from the caller's
//! [`PluginReference`](bookkeeper_types::PluginReference); only the plugin
//! decodes it.

use bookkeeper_types::{
    Address, Agreement, AssessorTerms, Fill, Holdings, Order, PositionId, Result, Settlement,
    Valuation,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Custody of user funds outside any position.
pub trait Account {
    /// Who controls the account described by `params`.
    fn owner(&self, params: &[u8]) -> Result<Address>;

    fn balance(&self, asset: &str, params: &[u8]) -> Result<Decimal>;

    /// # Errors
    /// `InsufficientBalance` if the account holds less than `amount`.
    fn debit(&mut self, asset: &str, params: &[u8], amount: Decimal) -> Result<()>;

    fn credit(&mut self, asset: &str, params: &[u8], amount: Decimal) -> Result<()>;
}

/// What an oracle is asked to price.
#[derive(Debug, Clone, Copy)]
pub struct OracleContext<'a> {
    pub asset: &'a str,
    pub now: DateTime<Utc>,
}

/// Prices an asset in a common unit of account.
pub trait Oracle {
    /// Price used when an agreement opens.
    fn open_price(&self, params: &[u8], ctx: &OracleContext<'_>) -> Result<Decimal>;

    /// Price used when an agreement closes or is liquidated.
    fn close_price(&self, params: &[u8], ctx: &OracleContext<'_>) -> Result<Decimal>;
}

/// Prices the loan itself: fees, interest, profit share.
pub trait Assessor {
    /// Snapshot the terms at open time.
    fn assess(&self, params: &[u8], order: &Order, fill: &Fill) -> Result<AssessorTerms>;

    /// What the borrower owes on top of principal at `now`.
    fn cost(
        &self,
        params: &[u8],
        terms: &AssessorTerms,
        loan_amount: Decimal,
        loan_held: Decimal,
        opened_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Decimal>;
}

/// Plans how an under-collateralized position is distributed.
pub trait Liquidator {
    /// The returned settlement must pay out exactly `valuation.holdings`.
    fn liquidate(
        &self,
        params: &[u8],
        agreement: &Agreement,
        valuation: &Valuation,
    ) -> Result<Settlement>;
}

/// Creates and unwinds positions that hold an agreement's funds.
pub trait PositionFactory {
    fn open(&mut self, deposit: Holdings, params: &[u8]) -> Result<PositionId>;

    fn holdings(&self, id: &PositionId) -> Result<Holdings>;

    /// Remove the position and return everything it held.
    fn close(&mut self, id: &PositionId) -> Result<Holdings>;
}
