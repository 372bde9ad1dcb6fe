//! # AgreementLedger: open loans and how they end
//!
//! ```text
//!   MatchingEngine ──record_open──▶ OPEN ──close──────▶ CLOSED      (removed)
//!                                        └─liquidate──▶ LIQUIDATED  (removed)
//! ```
//!
//! ## Close
//!
//! The borrower may close at any time; the lender only at or after
//! maturity. The lender is owed `loan_amount + cost`, paid from the
//! position's loan-asset holdings first. Any shortfall comes from the
//! borrower's account when the borrower closes, or from the collateral at
//! close prices when the lender closes. Everything left goes to the
//! borrower.
//!
//! ## Liquidate
//!
//! Anyone may liquidate an agreement whose collateral ratio at close
//! prices is strictly below its minimum. The liquidator plugin plans the
//! payout; the plan must distribute exactly what the position holds.

use std::collections::BTreeMap;

use bookkeeper_plugins::{Assessor, CustodyTxn, Liquidator, PluginRegistry};
use bookkeeper_types::{
    Address, Agreement, AgreementEvent, AgreementEventKind, AgreementId, AgreementState,
    BookkeeperError, Capability, Holdings, Party, PluginReference, Result, Settlement, Valuation,
    math,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::{
    closed_guard::ClosedAgreementGuard,
    pricing::{self, Phase},
};

/// Result of a successful close.
#[derive(Debug, Clone)]
pub struct Closure {
    /// The agreement as it was when removed (state `Closed`).
    pub agreement: Agreement,
    /// How the position's holdings were distributed.
    pub settlement: Settlement,
    /// Principal plus cost, in the loan asset.
    pub owed: Decimal,
    /// Loan asset the borrower paid from their account to cover a shortfall.
    pub borrower_top_up: Decimal,
}

/// Result of a successful liquidation.
#[derive(Debug, Clone)]
pub struct Liquidation {
    /// The agreement as it was when removed (state `Liquidated`).
    pub agreement: Agreement,
    pub settlement: Settlement,
    /// Ratio at the moment of liquidation.
    pub collateral_ratio: Decimal,
}

#[derive(Debug)]
pub struct AgreementLedger {
    open: BTreeMap<AgreementId, Agreement>,
    closed: ClosedAgreementGuard,
    events: Vec<AgreementEvent>,
}

impl AgreementLedger {
    #[must_use]
    pub fn new(closed_cache_size: usize) -> Self {
        Self {
            open: BTreeMap::new(),
            closed: ClosedAgreementGuard::new(closed_cache_size),
            events: Vec::new(),
        }
    }

    /// Look up an open agreement.
    ///
    /// # Errors
    /// `AgreementClosed` if it was recently closed or liquidated,
    /// `AgreementNotFound` otherwise.
    pub fn get(&self, id: &AgreementId) -> Result<&Agreement> {
        if let Some(agreement) = self.open.get(id) {
            return Ok(agreement);
        }
        if self.closed.is_closed(id) {
            return Err(BookkeeperError::AgreementClosed(*id));
        }
        Err(BookkeeperError::AgreementNotFound(*id))
    }

    /// Open agreements in ID (creation) order.
    pub fn iter(&self) -> impl Iterator<Item = &Agreement> {
        self.open.values()
    }

    /// Number of open agreements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.open.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    /// Lifecycle events not yet drained, oldest first.
    #[must_use]
    pub fn events(&self) -> &[AgreementEvent] {
        &self.events
    }

    /// Take every pending event, oldest first. The log is unbounded until
    /// drained, so long-running callers should drain it after each batch
    /// of operations.
    pub fn drain_events(&mut self) -> Vec<AgreementEvent> {
        std::mem::take(&mut self.events)
    }

    pub(crate) fn record_open(&mut self, agreement: Agreement) {
        self.events.push(AgreementEvent {
            kind: AgreementEventKind::Opened,
            agreement_id: agreement.id,
            at: agreement.opened_at,
        });
        self.open.insert(agreement.id, agreement);
    }

    /// Remove an agreement in its terminal state and tombstone it.
    fn retire(
        &mut self,
        id: &AgreementId,
        target: AgreementState,
        now: DateTime<Utc>,
    ) -> Result<Agreement> {
        let mut agreement = self
            .open
            .remove(id)
            .ok_or(BookkeeperError::AgreementNotFound(*id))?;
        agreement.transition(target)?;
        self.closed.mark_closed(*id)?;
        let kind = match target {
            AgreementState::Liquidated => AgreementEventKind::Liquidated,
            AgreementState::Open | AgreementState::Closed => AgreementEventKind::Closed,
        };
        self.events.push(AgreementEvent {
            kind,
            agreement_id: *id,
            at: now,
        });
        Ok(agreement)
    }

    // -----------------------------------------------------------------
    // Close
    // -----------------------------------------------------------------

    /// Repay and unwind an agreement.
    ///
    /// # Errors
    /// - `AgreementNotFound` / `AgreementClosed`
    /// - `NotBorrowerOrLender` if `caller` is neither party
    /// - `NotMature` if the lender closes before maturity
    /// - `InsufficientBalance` if the borrower cannot cover a shortfall
    /// - plugin errors from the assessor, oracles, accounts, or position
    pub fn close(
        &mut self,
        registry: &mut PluginRegistry,
        id: &AgreementId,
        caller: &Address,
        now: DateTime<Utc>,
    ) -> Result<Closure> {
        let agreement = self.get(id)?;
        if !agreement.is_party(caller) {
            return Err(BookkeeperError::NotBorrowerOrLender { caller: *caller });
        }
        let by_borrower = *caller == agreement.borrower;
        if !by_borrower && !agreement.is_mature(now) {
            return Err(BookkeeperError::NotMature(*id));
        }

        let holdings =
            registry.position_holdings(&agreement.position.factory, &agreement.position.id)?;
        let owed = owed(registry, agreement, &holdings, now)?;
        let loan_held = holdings.get(&agreement.loan_asset);
        let coll_held = holdings.get(&agreement.coll_asset);

        let mut settlement = Settlement::default();
        let from_loan = loan_held.min(owed);
        settlement.pay(Party::Lender, &agreement.loan_asset, from_loan);
        settlement.pay(Party::Borrower, &agreement.loan_asset, loan_held - from_loan);
        let shortfall = owed - from_loan;

        let mut borrower_top_up = Decimal::ZERO;
        let mut coll_left = coll_held;
        if shortfall > Decimal::ZERO {
            if by_borrower {
                borrower_top_up = shortfall;
            } else {
                let loan_price = pricing::quote(
                    registry,
                    &agreement.loan_oracle,
                    &agreement.loan_asset,
                    now,
                    Phase::Close,
                )?;
                let coll_price = pricing::quote(
                    registry,
                    &agreement.coll_oracle,
                    &agreement.coll_asset,
                    now,
                    Phase::Close,
                )?;
                let value = math::mul(shortfall, loan_price, "close shortfall")?;
                let needed = math::div(value, coll_price, "close shortfall")?;
                let from_coll = needed.min(coll_left);
                settlement.pay(Party::Lender, &agreement.coll_asset, from_coll);
                coll_left -= from_coll;
            }
        }
        settlement.pay(Party::Borrower, &agreement.coll_asset, coll_left);

        let lender_account = agreement.lender_account.clone();
        let borrower_account = agreement.borrower_account.clone();
        let loan_asset = agreement.loan_asset.clone();
        let position = agreement.position.clone();
        registry.transact(|txn| {
            let released = txn.close_position(&position.factory, &position.id)?;
            settlement.verify_conserves(&released)?;
            pay_out(txn, &settlement, &lender_account, &borrower_account, None)?;
            txn.debit(&borrower_account, &loan_asset, borrower_top_up)?;
            txn.credit(&lender_account, &loan_asset, borrower_top_up)
        })?;

        let agreement = self.retire(id, AgreementState::Closed, now)?;
        info!(
            agreement = %agreement.id,
            caller = %caller,
            %owed,
            %borrower_top_up,
            "Agreement closed"
        );
        Ok(Closure {
            agreement,
            settlement,
            owed,
            borrower_top_up,
        })
    }

    // -----------------------------------------------------------------
    // Liquidate
    // -----------------------------------------------------------------

    /// Forcibly unwind an under-collateralized agreement.
    ///
    /// The liquidator's share is credited to `reward_account`, which must
    /// belong to `caller`.
    ///
    /// # Errors
    /// - `AgreementNotFound` / `AgreementClosed`
    /// - `Unauthorized` if `reward_account` is not the caller's
    /// - `Healthy` if the collateral ratio is at or above the minimum
    /// - `PluginFailure` if the liquidator's plan does not conserve holdings
    pub fn liquidate(
        &mut self,
        registry: &mut PluginRegistry,
        id: &AgreementId,
        caller: &Address,
        reward_account: &PluginReference,
        now: DateTime<Utc>,
    ) -> Result<Liquidation> {
        let agreement = self.get(id)?;
        if registry.account_owner(reward_account)? != *caller {
            return Err(BookkeeperError::unauthorized(
                "reward account is not owned by the liquidator",
            ));
        }

        let loan_price = pricing::quote(
            registry,
            &agreement.loan_oracle,
            &agreement.loan_asset,
            now,
            Phase::Close,
        )?;
        let coll_price = pricing::quote(
            registry,
            &agreement.coll_oracle,
            &agreement.coll_asset,
            now,
            Phase::Close,
        )?;
        let holdings =
            registry.position_holdings(&agreement.position.factory, &agreement.position.id)?;
        let loan_held = holdings.get(&agreement.loan_asset);
        let ratio = pricing::collateral_ratio(
            holdings.get(&agreement.coll_asset),
            coll_price,
            agreement.loan_amount,
            loan_price,
            agreement.is_leverage.then_some(loan_held),
        )?;
        if ratio >= agreement.min_collateral_ratio {
            warn!(
                agreement = %agreement.id,
                %ratio,
                minimum = %agreement.min_collateral_ratio,
                "Liquidation rejected: agreement is healthy"
            );
            return Err(BookkeeperError::Healthy {
                ratio,
                minimum: agreement.min_collateral_ratio,
            });
        }

        let owed = owed(registry, agreement, &holdings, now)?;
        let valuation = Valuation {
            loan_price,
            coll_price,
            holdings,
            owed,
            collateral_ratio: ratio,
        };
        let liquidator_ref = &agreement.liquidator;
        let settlement = registry
            .liquidator(&liquidator_ref.addr)?
            .liquidate(&liquidator_ref.parameters, agreement, &valuation)?;
        check_plan(&settlement, &valuation.holdings, liquidator_ref.addr)?;

        let lender_account = agreement.lender_account.clone();
        let borrower_account = agreement.borrower_account.clone();
        let position = agreement.position.clone();
        registry.transact(|txn| {
            let released = txn.close_position(&position.factory, &position.id)?;
            settlement.verify_conserves(&released)?;
            pay_out(
                txn,
                &settlement,
                &lender_account,
                &borrower_account,
                Some(reward_account),
            )
        })?;

        let agreement = self.retire(id, AgreementState::Liquidated, now)?;
        info!(
            agreement = %agreement.id,
            liquidator = %caller,
            %ratio,
            minimum = %agreement.min_collateral_ratio,
            "Agreement liquidated"
        );
        Ok(Liquidation {
            agreement,
            settlement,
            collateral_ratio: ratio,
        })
    }
}

/// A liquidator's plan must hand out exactly what the position holds.
fn check_plan(settlement: &Settlement, holdings: &Holdings, liquidator: Address) -> Result<()> {
    settlement
        .verify_conserves(holdings)
        .map_err(|e| BookkeeperError::plugin(Capability::Liquidator, liquidator, e.to_string()))
}

/// Principal plus the assessor's cost at `now`.
fn owed(
    registry: &PluginRegistry,
    agreement: &Agreement,
    holdings: &Holdings,
    now: DateTime<Utc>,
) -> Result<Decimal> {
    let cost = registry.assessor(&agreement.assessor.addr)?.cost(
        &agreement.assessor.parameters,
        &agreement.terms,
        agreement.loan_amount,
        holdings.get(&agreement.loan_asset),
        agreement.opened_at,
        now,
    )?;
    math::add(agreement.loan_amount, cost, "amount owed")
}

/// Credit every payout to the matching party's account.
fn pay_out(
    txn: &mut CustodyTxn<'_>,
    settlement: &Settlement,
    lender: &PluginReference,
    borrower: &PluginReference,
    liquidator: Option<&PluginReference>,
) -> Result<()> {
    for payout in &settlement.payouts {
        let account = match payout.to {
            Party::Lender => lender,
            Party::Borrower => borrower,
            Party::Liquidator => liquidator.ok_or_else(|| {
                BookkeeperError::Internal("liquidator payout outside liquidation".to_string())
            })?,
        };
        txn.credit(account, &payout.asset, payout.amount)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_agreement_not_found() {
        let ledger = AgreementLedger::new(10);
        let id = AgreementId::new();
        assert!(matches!(
            ledger.get(&id),
            Err(BookkeeperError::AgreementNotFound(e)) if e == id
        ));
    }

    #[test]
    fn retired_agreement_reports_closed() {
        let mut ledger = AgreementLedger::new(10);
        let agreement = Agreement::dummy(Decimal::ONE, Decimal::new(3000, 0));
        let id = agreement.id;
        ledger.record_open(agreement);
        assert_eq!(ledger.len(), 1);

        let retired = ledger
            .retire(&id, AgreementState::Closed, Utc::now())
            .unwrap();
        assert_eq!(retired.state, AgreementState::Closed);
        assert!(ledger.is_empty());
        assert!(matches!(
            ledger.get(&id),
            Err(BookkeeperError::AgreementClosed(e)) if e == id
        ));
    }

    #[test]
    fn draining_empties_the_event_log() {
        let mut ledger = AgreementLedger::new(10);
        let agreement = Agreement::dummy(Decimal::ONE, Decimal::new(3000, 0));
        let id = agreement.id;
        ledger.record_open(agreement);

        let drained = ledger.drain_events();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].agreement_id, id);
        assert!(ledger.events().is_empty());

        ledger
            .retire(&id, AgreementState::Closed, Utc::now())
            .unwrap();
        assert_eq!(ledger.drain_events().len(), 1);
    }

    #[test]
    fn unbalanced_liquidation_plan_is_plugin_failure() {
        let mut holdings = Holdings::new();
        holdings.add("WETH", Decimal::ONE).unwrap();
        holdings.add("USDC", Decimal::new(3000, 0)).unwrap();
        let liquidator = Address::derive("liquidator:greedy");

        let mut settlement = Settlement::default();
        settlement.pay(Party::Lender, "WETH", Decimal::ONE);
        settlement.pay(Party::Liquidator, "USDC", Decimal::new(3001, 0));
        let err = check_plan(&settlement, &holdings, liquidator).unwrap_err();
        assert!(matches!(
            err,
            BookkeeperError::PluginFailure { capability: Capability::Liquidator, addr, .. }
                if addr == liquidator
        ));

        let mut settlement = Settlement::default();
        settlement.pay(Party::Lender, "WETH", Decimal::ONE);
        settlement.pay(Party::Liquidator, "USDC", Decimal::new(150, 0));
        settlement.pay(Party::Borrower, "USDC", Decimal::new(2850, 0));
        assert!(check_plan(&settlement, &holdings, liquidator).is_ok());
    }

    #[test]
    fn events_are_appended_in_order() {
        let mut ledger = AgreementLedger::new(10);
        let agreement = Agreement::dummy(Decimal::ONE, Decimal::new(3000, 0));
        let id = agreement.id;
        ledger.record_open(agreement);
        ledger
            .retire(&id, AgreementState::Liquidated, Utc::now())
            .unwrap();
        let kinds: Vec<_> = ledger.events().iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![AgreementEventKind::Opened, AgreementEventKind::Liquidated]
        );
    }
}
