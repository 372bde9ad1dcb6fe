//! Account plugins.
//!
//! [`SoloAccount`] keeps per-(owner, salt, asset) balances. The salt lets one
//! owner hold several isolated sub-accounts in the same plugin. Funds enter
//! and leave the system only through [`SoloAccount::load_from_user`] and
//! [`SoloAccount::unload_to_user`]; everything else moves existing funds.

use std::collections::HashMap;

use bookkeeper_types::{Address, Asset, BookkeeperError, Capability, Result, math};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{capability::Account, params};

/// Parameters selecting one sub-account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SoloAccountParams {
    pub owner: Address,
    pub salt: u64,
}

impl SoloAccountParams {
    #[must_use]
    pub fn new(owner: Address, salt: u64) -> Self {
        Self { owner, salt }
    }
}

/// Single-owner sub-accounts.
#[derive(Debug, Clone)]
pub struct SoloAccount {
    addr: Address,
    balances: HashMap<(SoloAccountParams, Asset), Decimal>,
}

impl SoloAccount {
    #[must_use]
    pub fn new(addr: Address) -> Self {
        Self {
            addr,
            balances: HashMap::new(),
        }
    }

    #[must_use]
    pub fn addr(&self) -> Address {
        self.addr
    }

    fn decode(&self, params: &[u8]) -> Result<SoloAccountParams> {
        params::decode(Capability::Account, self.addr, params)
    }

    /// Bring funds into the system.
    ///
    /// # Errors
    /// `PluginFailure` on bad parameters or a non-positive amount.
    pub fn load_from_user(&mut self, params: &[u8], asset: &str, amount: Decimal) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(BookkeeperError::plugin(
                Capability::Account,
                self.addr,
                format!("load amount must be positive, got {amount}"),
            ));
        }
        self.credit(asset, params, amount)
    }

    /// Take funds out of the system. Only the owner may unload.
    ///
    /// # Errors
    /// `Unauthorized` if `caller` is not the owner, `InsufficientBalance` if
    /// the sub-account holds less than `amount`.
    pub fn unload_to_user(
        &mut self,
        caller: &Address,
        params: &[u8],
        asset: &str,
        amount: Decimal,
    ) -> Result<()> {
        let p = self.decode(params)?;
        if p.owner != *caller {
            return Err(BookkeeperError::unauthorized(format!(
                "{caller} does not own account {}/{}",
                p.owner, p.salt
            )));
        }
        if amount <= Decimal::ZERO {
            return Err(BookkeeperError::plugin(
                Capability::Account,
                self.addr,
                format!("unload amount must be positive, got {amount}"),
            ));
        }
        self.debit(asset, params, amount)
    }

    /// Sum of every sub-account's balance of `asset`.
    ///
    /// # Errors
    /// `ArithmeticOverflow` if the sum overflows.
    pub fn total(&self, asset: &str) -> Result<Decimal> {
        self.balances
            .iter()
            .filter(|((_, a), _)| a == asset)
            .try_fold(Decimal::ZERO, |sum, (_, amount)| {
                math::add(sum, *amount, "account total")
            })
    }
}

impl Account for SoloAccount {
    fn owner(&self, params: &[u8]) -> Result<Address> {
        Ok(self.decode(params)?.owner)
    }

    fn balance(&self, asset: &str, params: &[u8]) -> Result<Decimal> {
        let p = self.decode(params)?;
        Ok(self
            .balances
            .get(&(p, asset.to_string()))
            .copied()
            .unwrap_or(Decimal::ZERO))
    }

    fn debit(&mut self, asset: &str, params: &[u8], amount: Decimal) -> Result<()> {
        let p = self.decode(params)?;
        let key = (p, asset.to_string());
        let available = self.balances.get(&key).copied().unwrap_or(Decimal::ZERO);
        if available < amount {
            return Err(BookkeeperError::InsufficientBalance {
                asset: asset.to_string(),
                needed: amount,
                available,
            });
        }
        let remaining = available - amount;
        if remaining.is_zero() {
            self.balances.remove(&key);
        } else {
            self.balances.insert(key, remaining);
        }
        Ok(())
    }

    fn credit(&mut self, asset: &str, params: &[u8], amount: Decimal) -> Result<()> {
        let p = self.decode(params)?;
        let entry = self
            .balances
            .entry((p, asset.to_string()))
            .or_insert(Decimal::ZERO);
        *entry = math::add(*entry, amount, "account credit")?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// AccountPlugin
// ---------------------------------------------------------------------------

/// Every account implementation the registry can hold.
#[derive(Debug, Clone)]
pub enum AccountPlugin {
    Solo(SoloAccount),
}

impl AccountPlugin {
    #[must_use]
    pub fn addr(&self) -> Address {
        match self {
            Self::Solo(a) => a.addr(),
        }
    }

    /// Total of `asset` held across the plugin.
    pub fn total(&self, asset: &str) -> Result<Decimal> {
        match self {
            Self::Solo(a) => a.total(asset),
        }
    }

    pub fn load_from_user(&mut self, params: &[u8], asset: &str, amount: Decimal) -> Result<()> {
        match self {
            Self::Solo(a) => a.load_from_user(params, asset, amount),
        }
    }

    pub fn unload_to_user(
        &mut self,
        caller: &Address,
        params: &[u8],
        asset: &str,
        amount: Decimal,
    ) -> Result<()> {
        match self {
            Self::Solo(a) => a.unload_to_user(caller, params, asset, amount),
        }
    }
}

impl Account for AccountPlugin {
    fn owner(&self, params: &[u8]) -> Result<Address> {
        match self {
            Self::Solo(a) => a.owner(params),
        }
    }

    fn balance(&self, asset: &str, params: &[u8]) -> Result<Decimal> {
        match self {
            Self::Solo(a) => a.balance(asset, params),
        }
    }

    fn debit(&mut self, asset: &str, params: &[u8], amount: Decimal) -> Result<()> {
        match self {
            Self::Solo(a) => a.debit(asset, params, amount),
        }
    }

    fn credit(&mut self, asset: &str, params: &[u8], amount: Decimal) -> Result<()> {
        match self {
            Self::Solo(a) => a.credit(asset, params, amount),
        }
    }
}

impl From<SoloAccount> for AccountPlugin {
    fn from(account: SoloAccount) -> Self {
        Self::Solo(account)
    }
}
