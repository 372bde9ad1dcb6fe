//! # Agreement — the open, collateralized loan
//!
//! An `Agreement` is created exactly once per successful match and is the
//! ledger's lightweight accounting record of the loan. Custody of the funds
//! belongs to the position plugin, not to this record.
//!
//! ## State Machine
//!
//! ```text
//!   ┌──────┐  repayment   ┌────────┐
//!   │ OPEN ├─────────────▶│ CLOSED │
//!   └──┬───┘              └────────┘
//!      │ under-collateralized
//!      ▼
//!   ┌────────────┐
//!   │ LIQUIDATED │
//!   └────────────┘
//! ```
//!
//! Both terminal states are final; nothing returns to `OPEN`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    Address, AgreementId, Asset, BlueprintHash, BookkeeperError, PluginReference, PositionId,
};

/// The lifecycle state of an agreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgreementState {
    /// Funds are in the position; the loan is outstanding.
    Open,
    /// Repaid and unwound.
    Closed,
    /// Forcibly unwound because it fell below its collateral minimum.
    Liquidated,
}

impl AgreementState {
    /// Can this agreement transition to the given target state?
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!((self, target), (Self::Open, Self::Closed | Self::Liquidated))
    }
}

impl std::fmt::Display for AgreementState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "OPEN"),
            Self::Closed => write!(f, "CLOSED"),
            Self::Liquidated => write!(f, "LIQUIDATED"),
        }
    }
}

/// Reference to a position instance held by a position factory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionHandle {
    pub factory: Address,
    pub id: PositionId,
    pub parameters: Vec<u8>,
}

/// Terms computed by the assessor when the agreement opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessorTerms {
    /// Flat fee owed at close, in the loan asset.
    pub origination_fee: Decimal,
    /// Annualised simple interest rate.
    pub interest_rate: Decimal,
    /// Share of loan-asset gains above principal owed to the lender.
    pub profit_share_ratio: Decimal,
}

impl AssessorTerms {
    /// Terms with no fees at all.
    pub const FREE: Self = Self {
        origination_fee: Decimal::ZERO,
        interest_rate: Decimal::ZERO,
        profit_share_ratio: Decimal::ZERO,
    };
}

/// An open collateralized loan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agreement {
    pub id: AgreementId,
    pub position: PositionHandle,
    pub lender: Address,
    pub borrower: Address,
    pub lender_account: PluginReference,
    pub borrower_account: PluginReference,
    pub loan_asset: Asset,
    pub coll_asset: Asset,
    pub loan_amount: Decimal,
    pub coll_amount: Decimal,
    /// Minimum collateral ratio copied from the order at open time.
    pub min_collateral_ratio: Decimal,
    pub loan_oracle: PluginReference,
    pub coll_oracle: PluginReference,
    pub assessor: PluginReference,
    pub terms: AssessorTerms,
    pub liquidator: PluginReference,
    pub is_leverage: bool,
    pub opened_at: DateTime<Utc>,
    pub maturity: DateTime<Utc>,
    /// The blueprint this agreement was matched from.
    pub blueprint_hash: BlueprintHash,
    pub state: AgreementState,
}

impl Agreement {
    #[must_use]
    pub fn is_mature(&self, now: DateTime<Utc>) -> bool {
        now >= self.maturity
    }

    /// Whether `who` is a party to this agreement.
    #[must_use]
    pub fn is_party(&self, who: &Address) -> bool {
        self.lender == *who || self.borrower == *who
    }

    /// Attempt to transition to `target`.
    ///
    /// # Errors
    /// `AgreementClosed` if the agreement already left `Open`.
    pub fn transition(&mut self, target: AgreementState) -> crate::Result<()> {
        if !self.state.can_transition_to(target) {
            return Err(BookkeeperError::AgreementClosed(self.id));
        }
        self.state = target;
        Ok(())
    }
}

/// What happened to an agreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgreementEventKind {
    Opened,
    Closed,
    Liquidated,
}

impl std::fmt::Display for AgreementEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Opened => write!(f, "AGREEMENT_OPENED"),
            Self::Closed => write!(f, "AGREEMENT_CLOSED"),
            Self::Liquidated => write!(f, "AGREEMENT_LIQUIDATED"),
        }
    }
}

/// Append-only ledger event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgreementEvent {
    pub kind: AgreementEventKind,
    pub agreement_id: AgreementId,
    pub at: DateTime<Utc>,
}

/// Dummy agreement for testing. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
impl Agreement {
    /// WETH loan against USDC collateral, opened now, maturing in a day.
    pub fn dummy(loan_amount: Decimal, coll_amount: Decimal) -> Self {
        let now = Utc::now();
        let plugin = |label: &str| PluginReference::new(Address::derive(label), Vec::new());
        Self {
            id: AgreementId::new(),
            position: PositionHandle {
                factory: Address::derive("factory:wallet"),
                id: PositionId::new(),
                parameters: Vec::new(),
            },
            lender: Address::random(),
            borrower: Address::random(),
            lender_account: plugin("account:lender"),
            borrower_account: plugin("account:borrower"),
            loan_asset: "WETH".to_string(),
            coll_asset: "USDC".to_string(),
            loan_amount,
            coll_amount,
            min_collateral_ratio: Decimal::new(15, 1),
            loan_oracle: plugin("oracle:loan"),
            coll_oracle: plugin("oracle:coll"),
            assessor: plugin("assessor"),
            terms: AssessorTerms::FREE,
            liquidator: plugin("liquidator"),
            is_leverage: false,
            opened_at: now,
            maturity: now + chrono::Duration::days(1),
            blueprint_hash: BlueprintHash([0u8; 32]),
            state: AgreementState::Open,
        }
    }
}
