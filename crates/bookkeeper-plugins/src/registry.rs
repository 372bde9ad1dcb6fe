//! # PluginRegistry: address → capability
//!
//! The registry owns every plugin instance, keyed by address per
//! capability. Read-only capabilities (oracle, assessor, liquidator) are
//! borrowed directly. Custody capabilities (account, position) are only
//! mutated inside [`PluginRegistry::transact`]:
//!
//! ```text
//!   transact(|txn| {
//!       txn.debit(..)?;          ← stages a clone of the touched account
//!       txn.open_position(..)?;  ← stages a clone of the touched factory
//!       Ok(..)
//!   })                           ← Ok: staged plugins replace the originals
//!                                  Err: staged plugins are dropped
//! ```
//!
//! A failing step therefore leaves every balance exactly as it was.
//!
//! The registry also owns the [`SupplyConservation`] tracker. Funds enter
//! and leave only through [`PluginRegistry::load_from_user`] and
//! [`PluginRegistry::unload_to_user`].

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use bookkeeper_types::{
    Address, BookkeeperError, Capability, Holdings, PluginReference, PositionId, Result, math,
};
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::{
    AccountPlugin, AssessorPlugin, FeedOracle, LiquidatorPlugin, OraclePlugin, PositionPlugin,
    SupplyConservation,
    capability::{Account, PositionFactory},
};

#[derive(Debug, Default)]
pub struct PluginRegistry {
    accounts: HashMap<Address, AccountPlugin>,
    oracles: HashMap<Address, OraclePlugin>,
    assessors: HashMap<Address, AssessorPlugin>,
    liquidators: HashMap<Address, LiquidatorPlugin>,
    positions: HashMap<Address, PositionPlugin>,
    supply: SupplyConservation,
}

fn not_found(capability: Capability, addr: &Address) -> BookkeeperError {
    BookkeeperError::PluginNotFound {
        capability,
        addr: *addr,
    }
}

fn insert_unique<P>(
    map: &mut HashMap<Address, P>,
    capability: Capability,
    addr: Address,
    plugin: P,
) -> Result<Address> {
    match map.entry(addr) {
        Entry::Occupied(_) => Err(BookkeeperError::Configuration(format!(
            "{capability} plugin already registered at {addr}"
        ))),
        Entry::Vacant(slot) => {
            slot.insert(plugin);
            debug!(%capability, %addr, "Plugin registered");
            Ok(addr)
        }
    }
}

impl PluginRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------

    /// # Errors
    /// `Configuration` if an account plugin already lives at that address.
    pub fn register_account(&mut self, plugin: impl Into<AccountPlugin>) -> Result<Address> {
        let plugin = plugin.into();
        insert_unique(&mut self.accounts, Capability::Account, plugin.addr(), plugin)
    }

    /// # Errors
    /// `Configuration` on a duplicate address.
    pub fn register_oracle(&mut self, plugin: impl Into<OraclePlugin>) -> Result<Address> {
        let plugin = plugin.into();
        insert_unique(&mut self.oracles, Capability::Oracle, plugin.addr(), plugin)
    }

    /// # Errors
    /// `Configuration` on a duplicate address.
    pub fn register_assessor(&mut self, plugin: impl Into<AssessorPlugin>) -> Result<Address> {
        let plugin = plugin.into();
        insert_unique(&mut self.assessors, Capability::Assessor, plugin.addr(), plugin)
    }

    /// # Errors
    /// `Configuration` on a duplicate address.
    pub fn register_liquidator(&mut self, plugin: impl Into<LiquidatorPlugin>) -> Result<Address> {
        let plugin = plugin.into();
        insert_unique(
            &mut self.liquidators,
            Capability::Liquidator,
            plugin.addr(),
            plugin,
        )
    }

    /// # Errors
    /// `Configuration` on a duplicate address.
    pub fn register_position_factory(
        &mut self,
        plugin: impl Into<PositionPlugin>,
    ) -> Result<Address> {
        let plugin = plugin.into();
        insert_unique(&mut self.positions, Capability::Position, plugin.addr(), plugin)
    }

    // -----------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------

    pub fn account(&self, addr: &Address) -> Result<&AccountPlugin> {
        self.accounts
            .get(addr)
            .ok_or_else(|| not_found(Capability::Account, addr))
    }

    pub fn oracle(&self, addr: &Address) -> Result<&OraclePlugin> {
        self.oracles
            .get(addr)
            .ok_or_else(|| not_found(Capability::Oracle, addr))
    }

    pub fn oracle_mut(&mut self, addr: &Address) -> Result<&mut OraclePlugin> {
        self.oracles
            .get_mut(addr)
            .ok_or_else(|| not_found(Capability::Oracle, addr))
    }

    /// The feed oracle at `addr`, for publishing prices.
    ///
    /// # Errors
    /// `PluginNotFound` if no oracle lives there, `PluginFailure` if it is
    /// not a feed.
    pub fn feed_oracle_mut(&mut self, addr: &Address) -> Result<&mut FeedOracle> {
        match self.oracle_mut(addr)? {
            OraclePlugin::Feed(feed) => Ok(feed),
            OraclePlugin::Static(_) => Err(BookkeeperError::plugin(
                Capability::Oracle,
                *addr,
                "not a feed oracle",
            )),
        }
    }

    pub fn assessor(&self, addr: &Address) -> Result<&AssessorPlugin> {
        self.assessors
            .get(addr)
            .ok_or_else(|| not_found(Capability::Assessor, addr))
    }

    pub fn liquidator(&self, addr: &Address) -> Result<&LiquidatorPlugin> {
        self.liquidators
            .get(addr)
            .ok_or_else(|| not_found(Capability::Liquidator, addr))
    }

    pub fn position_factory(&self, addr: &Address) -> Result<&PositionPlugin> {
        self.positions
            .get(addr)
            .ok_or_else(|| not_found(Capability::Position, addr))
    }

    /// Owner of the account `reference` points at.
    pub fn account_owner(&self, reference: &PluginReference) -> Result<Address> {
        self.account(&reference.addr)?.owner(&reference.parameters)
    }

    /// Balance of `asset` in the account `reference` points at.
    pub fn balance(&self, reference: &PluginReference, asset: &str) -> Result<Decimal> {
        self.account(&reference.addr)?
            .balance(asset, &reference.parameters)
    }

    /// What a position currently holds.
    pub fn position_holdings(&self, factory: &Address, id: &PositionId) -> Result<Holdings> {
        self.position_factory(factory)?.holdings(id)
    }

    // -----------------------------------------------------------------
    // Custody
    // -----------------------------------------------------------------

    /// Run `f` against a copy-on-write view of the custody plugins and
    /// commit its changes only if it returns `Ok`.
    pub fn transact<T>(&mut self, f: impl FnOnce(&mut CustodyTxn<'_>) -> Result<T>) -> Result<T> {
        let (result, accounts, positions) = {
            let mut txn = CustodyTxn::new(self);
            let result = f(&mut txn);
            let CustodyTxn {
                accounts,
                positions,
                ..
            } = txn;
            (result, accounts, positions)
        };
        let value = result?;
        self.accounts.extend(accounts);
        self.positions.extend(positions);
        Ok(value)
    }

    /// Bring user funds into an account.
    ///
    /// # Errors
    /// `PluginNotFound`, or whatever the account rejects.
    pub fn load_from_user(
        &mut self,
        account: &PluginReference,
        asset: &str,
        amount: Decimal,
    ) -> Result<()> {
        let plugin = self
            .accounts
            .get_mut(&account.addr)
            .ok_or_else(|| not_found(Capability::Account, &account.addr))?;
        plugin.load_from_user(&account.parameters, asset, amount)?;
        self.supply.record_inflow(asset, amount)?;
        info!(account = %account.addr, asset, %amount, "Funds loaded");
        Ok(())
    }

    /// Return funds from an account to its owner.
    ///
    /// # Errors
    /// `Unauthorized` if `caller` does not own the account,
    /// `InsufficientBalance` if it holds too little.
    pub fn unload_to_user(
        &mut self,
        caller: &Address,
        account: &PluginReference,
        asset: &str,
        amount: Decimal,
    ) -> Result<()> {
        let plugin = self
            .accounts
            .get_mut(&account.addr)
            .ok_or_else(|| not_found(Capability::Account, &account.addr))?;
        plugin.unload_to_user(caller, &account.parameters, asset, amount)?;
        self.supply.record_outflow(asset, amount)?;
        info!(account = %account.addr, asset, %amount, "Funds unloaded");
        Ok(())
    }

    // -----------------------------------------------------------------
    // Supply conservation
    // -----------------------------------------------------------------

    /// Everything custody holds of `asset`: all accounts plus all positions.
    pub fn total_supply(&self, asset: &str) -> Result<Decimal> {
        let mut total = Decimal::ZERO;
        for account in self.accounts.values() {
            total = math::add(total, account.total(asset)?, "total supply")?;
        }
        for factory in self.positions.values() {
            total = math::add(total, factory.total(asset)?, "total supply")?;
        }
        Ok(total)
    }

    /// Check the conservation identity for one asset.
    ///
    /// # Errors
    /// `SupplyInvariantViolation` if custody holds a different amount than
    /// was loaded minus unloaded.
    pub fn verify_supply(&self, asset: &str) -> Result<()> {
        self.supply.verify(asset, self.total_supply(asset)?)
    }

    /// Check the conservation identity for every asset ever loaded.
    pub fn verify_all_supply(&self) -> Result<()> {
        for asset in self.supply.tracked_assets() {
            self.verify_supply(&asset)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn supply(&self) -> &SupplyConservation {
        &self.supply
    }
}

// ---------------------------------------------------------------------------
// CustodyTxn
// ---------------------------------------------------------------------------

/// Staged, uncommitted custody changes. See [`PluginRegistry::transact`].
#[derive(Debug)]
pub struct CustodyTxn<'r> {
    registry: &'r PluginRegistry,
    accounts: HashMap<Address, AccountPlugin>,
    positions: HashMap<Address, PositionPlugin>,
}

impl<'r> CustodyTxn<'r> {
    fn new(registry: &'r PluginRegistry) -> Self {
        Self {
            registry,
            accounts: HashMap::new(),
            positions: HashMap::new(),
        }
    }

    fn account_mut(&mut self, addr: &Address) -> Result<&mut AccountPlugin> {
        match self.accounts.entry(*addr) {
            Entry::Occupied(staged) => Ok(staged.into_mut()),
            Entry::Vacant(slot) => Ok(slot.insert(self.registry.account(addr)?.clone())),
        }
    }

    fn position_mut(&mut self, addr: &Address) -> Result<&mut PositionPlugin> {
        match self.positions.entry(*addr) {
            Entry::Occupied(staged) => Ok(staged.into_mut()),
            Entry::Vacant(slot) => Ok(slot.insert(self.registry.position_factory(addr)?.clone())),
        }
    }

    /// Balance as seen inside this transaction.
    pub fn balance(&self, account: &PluginReference, asset: &str) -> Result<Decimal> {
        match self.accounts.get(&account.addr) {
            Some(staged) => staged.balance(asset, &account.parameters),
            None => self.registry.balance(account, asset),
        }
    }

    pub fn debit(&mut self, account: &PluginReference, asset: &str, amount: Decimal) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }
        self.account_mut(&account.addr)?
            .debit(asset, &account.parameters, amount)
    }

    pub fn credit(&mut self, account: &PluginReference, asset: &str, amount: Decimal) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }
        self.account_mut(&account.addr)?
            .credit(asset, &account.parameters, amount)
    }

    pub fn open_position(
        &mut self,
        factory: &Address,
        deposit: Holdings,
        params: &[u8],
    ) -> Result<PositionId> {
        self.position_mut(factory)?.open(deposit, params)
    }

    pub fn close_position(&mut self, factory: &Address, id: &PositionId) -> Result<Holdings> {
        self.position_mut(factory)?.close(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SoloAccount, SoloAccountParams, StaticOracle, WalletFactory};

    struct Fixture {
        registry: PluginRegistry,
        alice: Address,
        alice_account: PluginReference,
        factory: Address,
    }

    fn setup() -> Fixture {
        let mut registry = PluginRegistry::new();
        let account_addr = registry
            .register_account(SoloAccount::new(Address::derive("account:solo")))
            .unwrap();
        let factory = registry
            .register_position_factory(WalletFactory::new(Address::derive("factory:wallet")))
            .unwrap();
        let alice = Address::random();
        let alice_account =
            PluginReference::with_params(account_addr, &SoloAccountParams::new(alice, 0)).unwrap();
        registry
            .load_from_user(&alice_account, "USDC", Decimal::new(1000, 0))
            .unwrap();
        Fixture {
            registry,
            alice,
            alice_account,
            factory,
        }
    }

    #[test]
    fn lookup_missing_plugin_fails() {
        let registry = PluginRegistry::new();
        let err = registry.oracle(&Address::derive("nope")).unwrap_err();
        assert!(matches!(
            err,
            BookkeeperError::PluginNotFound {
                capability: Capability::Oracle,
                ..
            }
        ));
    }

    #[test]
    fn duplicate_registration_rejected() {
        let mut registry = PluginRegistry::new();
        registry
            .register_oracle(StaticOracle::new(Address::derive("oracle")))
            .unwrap();
        let err = registry
            .register_oracle(StaticOracle::new(Address::derive("oracle")))
            .unwrap_err();
        assert!(matches!(err, BookkeeperError::Configuration(_)));
    }

    #[test]
    fn committed_txn_moves_funds_into_position() {
        let mut f = setup();
        let account = f.alice_account.clone();
        let factory = f.factory;
        let id = f
            .registry
            .transact(|txn| {
                txn.debit(&account, "USDC", Decimal::new(400, 0))?;
                let mut deposit = Holdings::new();
                deposit.add("USDC", Decimal::new(400, 0))?;
                txn.open_position(&factory, deposit, &[])
            })
            .unwrap();

        assert_eq!(f.registry.balance(&f.alice_account, "USDC").unwrap(), Decimal::new(600, 0));
        assert_eq!(
            f.registry.position_holdings(&f.factory, &id).unwrap().get("USDC"),
            Decimal::new(400, 0)
        );
        f.registry.verify_supply("USDC").unwrap();
    }

    #[test]
    fn failed_txn_changes_nothing() {
        let mut f = setup();
        let account = f.alice_account.clone();
        let err = f
            .registry
            .transact(|txn| {
                txn.debit(&account, "USDC", Decimal::new(400, 0))?;
                assert_eq!(txn.balance(&account, "USDC")?, Decimal::new(600, 0));
                txn.debit(&account, "USDC", Decimal::new(700, 0))
            })
            .unwrap_err();
        assert!(matches!(err, BookkeeperError::InsufficientBalance { .. }));
        assert_eq!(f.registry.balance(&f.alice_account, "USDC").unwrap(), Decimal::new(1000, 0));
        f.registry.verify_supply("USDC").unwrap();
    }

    #[test]
    fn unload_checks_owner_and_records_outflow() {
        let mut f = setup();
        let err = f
            .registry
            .unload_to_user(&Address::random(), &f.alice_account, "USDC", Decimal::ONE)
            .unwrap_err();
        assert!(matches!(err, BookkeeperError::Unauthorized { .. }));

        f.registry
            .unload_to_user(&f.alice, &f.alice_account, "USDC", Decimal::new(250, 0))
            .unwrap();
        assert_eq!(f.registry.supply().expected_supply("USDC"), Decimal::new(750, 0));
        f.registry.verify_all_supply().unwrap();
    }

    #[test]
    fn feed_oracle_mut_rejects_static() {
        let mut registry = PluginRegistry::new();
        let addr = registry
            .register_oracle(StaticOracle::new(Address::derive("oracle")))
            .unwrap();
        assert!(matches!(
            registry.feed_oracle_mut(&addr),
            Err(BookkeeperError::PluginFailure { .. })
        ));
    }
}
