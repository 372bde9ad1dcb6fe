//! The `Bookkeeper` facade and its thread-safe handle.
//!
//! Every operation takes `&mut self` and runs to completion before the next
//! one starts. [`SharedBookkeeper`] serializes concurrent callers behind a
//! single mutex, so two fills racing for the last nonce of a blueprint can
//! never both succeed.

use std::sync::{Arc, Mutex};

use bookkeeper_blueprint::BlueprintAuthority;
use bookkeeper_plugins::PluginRegistry;
use bookkeeper_types::{
    Address, Agreement, AgreementEvent, AgreementId, BookkeeperConfig, BookkeeperError, Fill,
    PluginReference, Result, SignedBlueprint,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::info;

use crate::{
    ledger::{AgreementLedger, Closure, Liquidation},
    matching::MatchingEngine,
};

#[derive(Debug)]
pub struct Bookkeeper {
    config: BookkeeperConfig,
    engine: MatchingEngine,
    registry: PluginRegistry,
    ledger: AgreementLedger,
}

impl Bookkeeper {
    /// Build an empty bookkeeper. Plugins are registered afterwards through
    /// [`Bookkeeper::registry_mut`].
    ///
    /// # Errors
    /// `Configuration` if `config` is invalid.
    pub fn new(config: BookkeeperConfig) -> Result<Self> {
        config.validate()?;
        info!(
            protocol = %config.domain.protocol_name,
            version = %config.domain.protocol_version,
            realm = config.domain.realm_id,
            authority = %config.domain.authority,
            "Bookkeeper started"
        );
        Ok(Self {
            engine: MatchingEngine::new(config.domain.clone()),
            registry: PluginRegistry::new(),
            ledger: AgreementLedger::new(config.closed_agreement_cache_size),
            config,
        })
    }

    #[must_use]
    pub fn config(&self) -> &BookkeeperConfig {
        &self.config
    }

    #[must_use]
    pub fn authority(&self) -> &BlueprintAuthority {
        self.engine.authority()
    }

    #[must_use]
    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut PluginRegistry {
        &mut self.registry
    }

    #[must_use]
    pub fn ledger(&self) -> &AgreementLedger {
        &self.ledger
    }

    /// Take every pending ledger event; see [`AgreementLedger::drain_events`].
    pub fn drain_events(&mut self) -> Vec<AgreementEvent> {
        self.ledger.drain_events()
    }

    /// An open agreement by ID.
    pub fn agreement(&self, id: &AgreementId) -> Result<&Agreement> {
        self.ledger.get(id)
    }

    // -----------------------------------------------------------------
    // Matching
    // -----------------------------------------------------------------

    pub fn fill_order(
        &mut self,
        caller: &Address,
        fill: &Fill,
        signed: &SignedBlueprint,
    ) -> Result<Agreement> {
        self.fill_order_at(caller, fill, signed, Utc::now())
    }

    pub fn fill_order_at(
        &mut self,
        caller: &Address,
        fill: &Fill,
        signed: &SignedBlueprint,
        now: DateTime<Utc>,
    ) -> Result<Agreement> {
        self.engine.fill_order(
            &mut self.registry,
            &mut self.ledger,
            caller,
            fill,
            signed,
            now,
        )
    }

    // -----------------------------------------------------------------
    // Agreement lifecycle
    // -----------------------------------------------------------------

    pub fn close(&mut self, id: &AgreementId, caller: &Address) -> Result<Closure> {
        self.close_at(id, caller, Utc::now())
    }

    pub fn close_at(
        &mut self,
        id: &AgreementId,
        caller: &Address,
        now: DateTime<Utc>,
    ) -> Result<Closure> {
        self.ledger.close(&mut self.registry, id, caller, now)
    }

    pub fn liquidate(
        &mut self,
        id: &AgreementId,
        caller: &Address,
        reward_account: &PluginReference,
    ) -> Result<Liquidation> {
        self.liquidate_at(id, caller, reward_account, Utc::now())
    }

    pub fn liquidate_at(
        &mut self,
        id: &AgreementId,
        caller: &Address,
        reward_account: &PluginReference,
        now: DateTime<Utc>,
    ) -> Result<Liquidation> {
        self.ledger
            .liquidate(&mut self.registry, id, caller, reward_account, now)
    }

    // -----------------------------------------------------------------
    // Nonces
    // -----------------------------------------------------------------

    #[must_use]
    pub fn nonce(&self, publisher: &Address) -> u64 {
        self.engine.authority().nonce(publisher)
    }

    /// Void every blueprint of `publisher` whose `max_nonce` is below `to`.
    pub fn raise_nonce(&mut self, caller: &Address, publisher: &Address, to: u64) -> Result<()> {
        self.engine
            .authority_mut()
            .raise_nonce(caller, publisher, to)
    }

    // -----------------------------------------------------------------
    // Funds
    // -----------------------------------------------------------------

    pub fn load_from_user(
        &mut self,
        account: &PluginReference,
        asset: &str,
        amount: Decimal,
    ) -> Result<()> {
        self.registry.load_from_user(account, asset, amount)
    }

    pub fn unload_to_user(
        &mut self,
        caller: &Address,
        account: &PluginReference,
        asset: &str,
        amount: Decimal,
    ) -> Result<()> {
        self.registry.unload_to_user(caller, account, asset, amount)
    }

    /// Check supply conservation for every asset ever loaded.
    pub fn verify_supply(&self) -> Result<()> {
        self.registry.verify_all_supply()
    }
}

// ---------------------------------------------------------------------------
// SharedBookkeeper
// ---------------------------------------------------------------------------

/// Cloneable, thread-safe handle. Each call holds the lock for the whole
/// operation.
#[derive(Debug, Clone)]
pub struct SharedBookkeeper {
    inner: Arc<Mutex<Bookkeeper>>,
}

impl SharedBookkeeper {
    #[must_use]
    pub fn new(bookkeeper: Bookkeeper) -> Self {
        Self {
            inner: Arc::new(Mutex::new(bookkeeper)),
        }
    }

    /// Run `f` with exclusive access.
    ///
    /// # Errors
    /// `Internal` if a previous holder panicked, otherwise whatever `f`
    /// returns.
    pub fn with<T>(&self, f: impl FnOnce(&mut Bookkeeper) -> Result<T>) -> Result<T> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| BookkeeperError::Internal("bookkeeper lock poisoned".to_string()))?;
        f(&mut guard)
    }

    pub fn fill_order_at(
        &self,
        caller: &Address,
        fill: &Fill,
        signed: &SignedBlueprint,
        now: DateTime<Utc>,
    ) -> Result<Agreement> {
        self.with(|bk| bk.fill_order_at(caller, fill, signed, now))
    }

    pub fn close_at(
        &self,
        id: &AgreementId,
        caller: &Address,
        now: DateTime<Utc>,
    ) -> Result<Closure> {
        self.with(|bk| bk.close_at(id, caller, now))
    }

    pub fn liquidate_at(
        &self,
        id: &AgreementId,
        caller: &Address,
        reward_account: &PluginReference,
        now: DateTime<Utc>,
    ) -> Result<Liquidation> {
        self.with(|bk| bk.liquidate_at(id, caller, reward_account, now))
    }

    pub fn nonce(&self, publisher: &Address) -> Result<u64> {
        self.with(|bk| Ok(bk.nonce(publisher)))
    }
}
