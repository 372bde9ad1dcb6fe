//! Position plugins.
//!
//! [`WalletFactory`] positions simply hold what was deposited until closed.
//! Yield-bearing positions would implement the same contract.

use std::collections::HashMap;

use bookkeeper_types::{
    Address, BookkeeperError, Capability, Holdings, PositionId, Result, math,
};
use rust_decimal::Decimal;

use crate::capability::PositionFactory;

#[derive(Debug, Clone)]
pub struct WalletFactory {
    addr: Address,
    positions: HashMap<PositionId, Holdings>,
}

impl WalletFactory {
    #[must_use]
    pub fn new(addr: Address) -> Self {
        Self {
            addr,
            positions: HashMap::new(),
        }
    }

    /// Number of open positions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Sum of `asset` across all open positions.
    ///
    /// # Errors
    /// `ArithmeticOverflow` if the sum overflows.
    pub fn total(&self, asset: &str) -> Result<Decimal> {
        self.positions
            .values()
            .try_fold(Decimal::ZERO, |sum, h| {
                math::add(sum, h.get(asset), "position total")
            })
    }

    fn missing(&self, id: &PositionId) -> BookkeeperError {
        BookkeeperError::plugin(Capability::Position, self.addr, format!("unknown position {id}"))
    }
}

impl PositionFactory for WalletFactory {
    fn open(&mut self, deposit: Holdings, _params: &[u8]) -> Result<PositionId> {
        let id = PositionId::new();
        self.positions.insert(id, deposit);
        Ok(id)
    }

    fn holdings(&self, id: &PositionId) -> Result<Holdings> {
        self.positions
            .get(id)
            .cloned()
            .ok_or_else(|| self.missing(id))
    }

    fn close(&mut self, id: &PositionId) -> Result<Holdings> {
        self.positions.remove(id).ok_or_else(|| self.missing(id))
    }
}

// ---------------------------------------------------------------------------
// PositionPlugin
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum PositionPlugin {
    Wallet(WalletFactory),
}

impl PositionPlugin {
    #[must_use]
    pub fn addr(&self) -> Address {
        match self {
            Self::Wallet(f) => f.addr,
        }
    }

    pub fn total(&self, asset: &str) -> Result<Decimal> {
        match self {
            Self::Wallet(f) => f.total(asset),
        }
    }
}

impl PositionFactory for PositionPlugin {
    fn open(&mut self, deposit: Holdings, params: &[u8]) -> Result<PositionId> {
        match self {
            Self::Wallet(f) => f.open(deposit, params),
        }
    }

    fn holdings(&self, id: &PositionId) -> Result<Holdings> {
        match self {
            Self::Wallet(f) => f.holdings(id),
        }
    }

    fn close(&mut self, id: &PositionId) -> Result<Holdings> {
        match self {
            Self::Wallet(f) => f.close(id),
        }
    }
}

impl From<WalletFactory> for PositionPlugin {
    fn from(factory: WalletFactory) -> Self {
        Self::Wallet(factory)
    }
}
