//! # MatchingEngine — signed order + fill → agreement
//!
//! ```text
//!  1. verify blueprint            (hash, signature, window, nonce)
//!  2. decode + shape-check order
//!  3. validate fill               (indices, allow-list, side, minimums, owners)
//!  4. open prices                 (loan oracle, collateral oracle)
//!  5. collateral ratio            (≥ minimum)
//!  6. assessor terms
//!  ── nothing above mutates state ──────────────────────────────────────
//!  7. custody, all-or-nothing     (debit lender, debit borrower, open position)
//!  8. consume publisher nonce
//!  9. record agreement in the ledger
//! ```
//!
//! ## Who lends?
//!
//! | `order.is_offer` | lender    | borrower  | borrower config        |
//! |------------------|-----------|-----------|------------------------|
//! | `true`           | publisher | filler    | `fill.borrower_config` |
//! | `false`          | filler    | publisher | `order.borrower_config`|

use bookkeeper_blueprint::{BlueprintAuthority, codec};
use bookkeeper_plugins::{Assessor, PluginRegistry};
use bookkeeper_types::{
    Address, Agreement, AgreementId, AgreementState, Asset, BookkeeperError, BorrowerConfig,
    CollateralCommitment, Fill, Holdings, Order, PluginReference, PositionHandle, Result,
    SignedBlueprint, SigningDomain,
};
use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::{
    ledger::AgreementLedger,
    pricing::{self, Phase},
};

/// The order entries a fill selected.
#[derive(Debug)]
struct Selection<'a> {
    loan_asset: &'a Asset,
    coll_asset: &'a Asset,
    loan_oracle: &'a PluginReference,
    coll_oracle: &'a PluginReference,
    min_collateral_ratio: Decimal,
    factory: Address,
}

/// Lender and borrower sides of a match.
#[derive(Debug)]
struct Parties<'a> {
    lender: Address,
    borrower: Address,
    lender_account: &'a PluginReference,
    borrower_account: &'a PluginReference,
    borrower_config: &'a BorrowerConfig,
}

fn in_range(field: &'static str, index: usize, len: usize) -> Result<usize> {
    if index < len {
        Ok(index)
    } else {
        Err(BookkeeperError::IndexOutOfRange { field, index, len })
    }
}

fn invalid_fill(reason: impl Into<String>) -> BookkeeperError {
    BookkeeperError::InvalidFill {
        reason: reason.into(),
    }
}

/// Check the fill against the order and pick out the selected entries.
fn select<'a>(
    order: &'a Order,
    fill: &Fill,
    publisher: &Address,
    caller: &Address,
) -> Result<Selection<'a>> {
    let loan_idx = in_range("loan_asset_idx", fill.loan_asset_idx, order.loan_assets.len())?;
    let coll_idx = in_range("coll_asset_idx", fill.coll_asset_idx, order.coll_assets.len())?;
    let factory_idx = in_range("factory_idx", fill.factory_idx, order.factories.len())?;

    if !order.fillers.is_empty() {
        let taker_idx = in_range("taker_idx", fill.taker_idx, order.fillers.len())?;
        if order.fillers[taker_idx] != *caller {
            return Err(BookkeeperError::unauthorized(format!(
                "{caller} is not filler #{taker_idx} of this order"
            )));
        }
    }

    if fill.is_offer_fill != order.is_offer {
        return Err(invalid_fill(format!(
            "fill side (is_offer_fill = {}) does not match order (is_offer = {})",
            fill.is_offer_fill, order.is_offer
        )));
    }

    if fill.loan_amount <= Decimal::ZERO {
        return Err(invalid_fill(format!(
            "loan amount must be positive, got {}",
            fill.loan_amount
        )));
    }
    let minimum = order.min_loan_amounts[loan_idx];
    if fill.loan_amount < minimum {
        return Err(BookkeeperError::LoanBelowMinimum {
            amount: fill.loan_amount,
            minimum,
        });
    }

    if caller == publisher {
        return Err(BookkeeperError::SelfFillBlocked);
    }

    let selection = Selection {
        loan_asset: &order.loan_assets[loan_idx],
        coll_asset: &order.coll_assets[coll_idx],
        loan_oracle: &order.loan_oracles[loan_idx],
        coll_oracle: &order.coll_oracles[coll_idx],
        min_collateral_ratio: order.min_collateral_ratio[coll_idx],
        factory: order.factories[factory_idx],
    };
    if selection.loan_asset == selection.coll_asset {
        return Err(invalid_fill(format!(
            "loan and collateral asset are both {}",
            selection.loan_asset
        )));
    }
    Ok(selection)
}

fn resolve_parties<'a>(
    order: &'a Order,
    fill: &'a Fill,
    publisher: Address,
    filler: Address,
) -> Parties<'a> {
    if order.is_offer {
        Parties {
            lender: publisher,
            borrower: filler,
            lender_account: &order.account,
            borrower_account: &fill.account,
            borrower_config: &fill.borrower_config,
        }
    } else {
        Parties {
            lender: filler,
            borrower: publisher,
            lender_account: &fill.account,
            borrower_account: &order.account,
            borrower_config: &order.borrower_config,
        }
    }
}

/// Matches fills against signed orders. Owns the blueprint authority and
/// therefore every publisher's nonce.
#[derive(Debug, Clone)]
pub struct MatchingEngine {
    authority: BlueprintAuthority,
}

impl MatchingEngine {
    #[must_use]
    pub fn new(domain: SigningDomain) -> Self {
        Self {
            authority: BlueprintAuthority::new(domain),
        }
    }

    #[must_use]
    pub fn authority(&self) -> &BlueprintAuthority {
        &self.authority
    }

    pub fn authority_mut(&mut self) -> &mut BlueprintAuthority {
        &mut self.authority
    }

    /// Match `fill` against the order in `signed` and open an agreement.
    ///
    /// On error nothing changes: no funds move, the nonce is not consumed,
    /// and the ledger is untouched.
    ///
    /// # Errors
    /// Any blueprint, order, fill, collateral, or plugin error; see the
    /// module docs for the order in which they are checked.
    pub fn fill_order(
        &mut self,
        registry: &mut PluginRegistry,
        ledger: &mut AgreementLedger,
        caller: &Address,
        fill: &Fill,
        signed: &SignedBlueprint,
        now: DateTime<Utc>,
    ) -> Result<Agreement> {
        let result = self.try_fill(registry, ledger, caller, fill, signed, now);
        if let Err(err) = &result {
            warn!(
                blueprint = %signed.blueprint_hash,
                caller = %caller,
                error = %err,
                "Fill rejected"
            );
        }
        result
    }

    fn try_fill(
        &mut self,
        registry: &mut PluginRegistry,
        ledger: &mut AgreementLedger,
        caller: &Address,
        fill: &Fill,
        signed: &SignedBlueprint,
        now: DateTime<Utc>,
    ) -> Result<Agreement> {
        // 1. Blueprint
        let publisher = self.authority.verify(signed, now)?;

        // 2. Order
        let order = codec::decode_order(&signed.blueprint.data)?;
        order.validate_shape()?;

        // 3. Fill
        let selection = select(&order, fill, &publisher, caller)?;
        let parties = resolve_parties(&order, fill, publisher, *caller);
        if registry.account_owner(parties.lender_account)? != parties.lender {
            return Err(BookkeeperError::unauthorized(
                "lender account is not owned by the lender",
            ));
        }
        if registry.account_owner(parties.borrower_account)? != parties.borrower {
            return Err(BookkeeperError::unauthorized(
                "borrower account is not owned by the borrower",
            ));
        }
        let max_duration = i64::try_from(order.max_duration)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .ok_or_else(|| BookkeeperError::InvalidOrder {
                reason: format!("max_duration {} out of range", order.max_duration),
            })?;
        let maturity = now
            .checked_add_signed(max_duration)
            .ok_or_else(|| BookkeeperError::InvalidOrder {
                reason: format!("max_duration {} out of range", order.max_duration),
            })?;

        // 4. Prices
        let loan_price = pricing::quote(
            registry,
            selection.loan_oracle,
            selection.loan_asset,
            now,
            Phase::Open,
        )?;
        let coll_price = pricing::quote(
            registry,
            selection.coll_oracle,
            selection.coll_asset,
            now,
            Phase::Open,
        )?;

        // 5. Collateral
        let commitment = parties.borrower_config.collateral;
        let (CollateralCommitment::Amount(committed) | CollateralCommitment::Ratio(committed)) =
            commitment;
        if committed.is_sign_negative() {
            return Err(invalid_fill(format!(
                "negative collateral commitment {committed}"
            )));
        }
        let coll_amount =
            pricing::collateral_for(commitment, fill.loan_amount, loan_price, coll_price)?;
        let ratio = pricing::opening_ratio(
            commitment,
            coll_amount,
            coll_price,
            fill.loan_amount,
            loan_price,
            order.is_leverage,
        )?;
        if ratio < selection.min_collateral_ratio {
            return Err(BookkeeperError::InsufficientCollateral {
                ratio,
                minimum: selection.min_collateral_ratio,
            });
        }
        debug!(%loan_price, %coll_price, %coll_amount, %ratio, "Collateral checked");

        // 6. Terms
        let terms = registry
            .assessor(&order.assessor.addr)?
            .assess(&order.assessor.parameters, &order, fill)?;

        // 7. Custody
        let position_id = registry.transact(|txn| {
            txn.debit(parties.lender_account, selection.loan_asset, fill.loan_amount)?;
            txn.debit(parties.borrower_account, selection.coll_asset, coll_amount)?;
            let mut deposit = Holdings::new();
            deposit.add(selection.loan_asset, fill.loan_amount)?;
            deposit.add(selection.coll_asset, coll_amount)?;
            txn.open_position(
                &selection.factory,
                deposit,
                &parties.borrower_config.position_parameters,
            )
        })?;

        // 8. Nonce
        self.authority.consume_nonce(&publisher);

        // 9. Ledger
        let agreement = Agreement {
            id: AgreementId::new(),
            position: PositionHandle {
                factory: selection.factory,
                id: position_id,
                parameters: parties.borrower_config.position_parameters.clone(),
            },
            lender: parties.lender,
            borrower: parties.borrower,
            lender_account: parties.lender_account.clone(),
            borrower_account: parties.borrower_account.clone(),
            loan_asset: selection.loan_asset.clone(),
            coll_asset: selection.coll_asset.clone(),
            loan_amount: fill.loan_amount,
            coll_amount,
            min_collateral_ratio: selection.min_collateral_ratio,
            loan_oracle: selection.loan_oracle.clone(),
            coll_oracle: selection.coll_oracle.clone(),
            assessor: order.assessor.clone(),
            terms,
            liquidator: order.liquidator.clone(),
            is_leverage: order.is_leverage,
            opened_at: now,
            maturity,
            blueprint_hash: signed.blueprint_hash,
            state: AgreementState::Open,
        };
        ledger.record_open(agreement.clone());

        info!(
            agreement = %agreement.id,
            lender = %agreement.lender,
            borrower = %agreement.borrower,
            loan = %agreement.loan_amount,
            loan_asset = %agreement.loan_asset,
            collateral = %agreement.coll_amount,
            coll_asset = %agreement.coll_asset,
            %ratio,
            "Agreement opened"
        );
        Ok(agreement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plugin(label: &str) -> PluginReference {
        PluginReference::new(Address::derive(label), Vec::new())
    }

    fn make_order() -> Order {
        Order::dummy_offer(
            plugin("account"),
            plugin("oracle:loan"),
            plugin("oracle:coll"),
            plugin("assessor"),
            plugin("liquidator"),
            Address::derive("factory"),
        )
    }

    fn make_fill() -> Fill {
        Fill {
            account: plugin("account"),
            loan_amount: Decimal::ONE,
            taker_idx: 0,
            loan_asset_idx: 0,
            coll_asset_idx: 0,
            factory_idx: 0,
            is_offer_fill: true,
            borrower_config: BorrowerConfig::with_ratio(Decimal::TWO),
            filler_data: Vec::new(),
        }
    }

    #[test]
    fn valid_fill_selects_entries() {
        let order = make_order();
        let s = select(&order, &make_fill(), &Address::random(), &Address::random()).unwrap();
        assert_eq!(s.loan_asset, "WETH");
        assert_eq!(s.coll_asset, "USDC");
        assert_eq!(s.min_collateral_ratio, Decimal::new(15, 1));
    }

    #[test]
    fn out_of_range_index_rejected() {
        let order = make_order();
        let mut fill = make_fill();
        fill.coll_asset_idx = 3;
        let err = select(&order, &fill, &Address::random(), &Address::random()).unwrap_err();
        assert!(matches!(
            err,
            BookkeeperError::IndexOutOfRange {
                field: "coll_asset_idx",
                index: 3,
                len: 1
            }
        ));
    }

    #[test]
    fn allow_list_enforced() {
        let mut order = make_order();
        let allowed = Address::random();
        order.fillers = vec![allowed];
        let fill = make_fill();
        let err = select(&order, &fill, &Address::random(), &Address::random()).unwrap_err();
        assert!(matches!(err, BookkeeperError::Unauthorized { .. }));
        assert!(select(&order, &fill, &Address::random(), &allowed).is_ok());

        let mut fill = make_fill();
        fill.taker_idx = 1;
        let err = select(&order, &fill, &Address::random(), &allowed).unwrap_err();
        assert!(matches!(err, BookkeeperError::IndexOutOfRange { field: "taker_idx", .. }));
    }

    #[test]
    fn side_mismatch_rejected() {
        let order = make_order();
        let mut fill = make_fill();
        fill.is_offer_fill = false;
        let err = select(&order, &fill, &Address::random(), &Address::random()).unwrap_err();
        assert!(matches!(err, BookkeeperError::InvalidFill { .. }));
    }

    #[test]
    fn loan_below_minimum_rejected() {
        let mut order = make_order();
        order.min_loan_amounts[0] = Decimal::TEN;
        let err = select(&order, &make_fill(), &Address::random(), &Address::random()).unwrap_err();
        assert!(matches!(err, BookkeeperError::LoanBelowMinimum { .. }));
    }

    #[test]
    fn self_fill_blocked() {
        let order = make_order();
        let me = Address::random();
        let err = select(&order, &make_fill(), &me, &me).unwrap_err();
        assert!(matches!(err, BookkeeperError::SelfFillBlocked));
    }

    #[test]
    fn same_asset_both_sides_rejected() {
        let mut order = make_order();
        order.coll_assets[0] = "WETH".to_string();
        let err = select(&order, &make_fill(), &Address::random(), &Address::random()).unwrap_err();
        assert!(matches!(err, BookkeeperError::InvalidFill { .. }));
    }

    #[test]
    fn offer_makes_publisher_lender() {
        let order = make_order();
        let fill = make_fill();
        let publisher = Address::random();
        let filler = Address::random();
        let p = resolve_parties(&order, &fill, publisher, filler);
        assert_eq!(p.lender, publisher);
        assert_eq!(p.borrower, filler);
        assert_eq!(p.borrower_config, &fill.borrower_config);

        let mut request = make_order();
        request.is_offer = false;
        let p = resolve_parties(&request, &fill, publisher, filler);
        assert_eq!(p.lender, filler);
        assert_eq!(p.borrower, publisher);
        assert_eq!(p.borrower_config, &request.borrower_config);
    }
}
