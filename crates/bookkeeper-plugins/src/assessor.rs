//! Assessor plugins.
//!
//! [`StandardAssessor`] charges, in the loan asset:
//!
//! ```text
//! cost = origination_fee
//!      + loan_amount × interest_rate × elapsed_secs / SECONDS_PER_YEAR
//!      + profit_share_ratio × max(0, loan_held − loan_amount)
//! origination_fee = origination_fee_value + origination_fee_ratio × loan_amount
//! ```

use bookkeeper_types::{
    Address, AssessorTerms, BookkeeperError, Capability, Fill, Order, Result, constants, math,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{capability::Assessor, params};

/// Parameters of a [`StandardAssessor`]. Empty parameters mean a free loan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardAssessorParams {
    /// Flat fee in the loan asset.
    pub origination_fee_value: Decimal,
    /// Fee as a fraction of the loan amount.
    pub origination_fee_ratio: Decimal,
    /// Annual simple interest rate (0.05 = 5%).
    pub interest_rate: Decimal,
    /// Fraction of loan-asset gains owed to the lender.
    pub profit_share_ratio: Decimal,
}

#[derive(Debug, Clone)]
pub struct StandardAssessor {
    addr: Address,
}

impl StandardAssessor {
    #[must_use]
    pub fn new(addr: Address) -> Self {
        Self { addr }
    }

    fn fail(&self, reason: impl Into<String>) -> BookkeeperError {
        BookkeeperError::plugin(Capability::Assessor, self.addr, reason)
    }
}

impl Assessor for StandardAssessor {
    fn assess(&self, params: &[u8], _order: &Order, fill: &Fill) -> Result<AssessorTerms> {
        let p: StandardAssessorParams =
            params::decode_or_default(Capability::Assessor, self.addr, params)?;
        if [
            p.origination_fee_value,
            p.origination_fee_ratio,
            p.interest_rate,
            p.profit_share_ratio,
        ]
        .iter()
        .any(Decimal::is_sign_negative)
        {
            return Err(self.fail("negative fee parameter"));
        }
        if p.profit_share_ratio > Decimal::ONE {
            return Err(self.fail("profit share ratio above 1"));
        }

        let ratio_fee = math::mul(p.origination_fee_ratio, fill.loan_amount, "origination fee")?;
        Ok(AssessorTerms {
            origination_fee: math::add(p.origination_fee_value, ratio_fee, "origination fee")?,
            interest_rate: p.interest_rate,
            profit_share_ratio: p.profit_share_ratio,
        })
    }

    fn cost(
        &self,
        _params: &[u8],
        terms: &AssessorTerms,
        loan_amount: Decimal,
        loan_held: Decimal,
        opened_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Decimal> {
        let elapsed = (now - opened_at).num_seconds().max(0);
        let interest = math::div(
            math::mul(
                math::mul(loan_amount, terms.interest_rate, "interest")?,
                Decimal::from(elapsed),
                "interest",
            )?,
            Decimal::from(constants::SECONDS_PER_YEAR),
            "interest",
        )?;
        let gain = math::saturating_sub(loan_held, loan_amount);
        let profit_share = math::mul(gain, terms.profit_share_ratio, "profit share")?;

        math::add(
            math::add(terms.origination_fee, interest, "assessor cost")?,
            profit_share,
            "assessor cost",
        )
    }
}

// ---------------------------------------------------------------------------
// AssessorPlugin
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum AssessorPlugin {
    Standard(StandardAssessor),
}

impl AssessorPlugin {
    #[must_use]
    pub fn addr(&self) -> Address {
        match self {
            Self::Standard(a) => a.addr,
        }
    }
}

impl Assessor for AssessorPlugin {
    fn assess(&self, params: &[u8], order: &Order, fill: &Fill) -> Result<AssessorTerms> {
        match self {
            Self::Standard(a) => a.assess(params, order, fill),
        }
    }

    fn cost(
        &self,
        params: &[u8],
        terms: &AssessorTerms,
        loan_amount: Decimal,
        loan_held: Decimal,
        opened_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Decimal> {
        match self {
            Self::Standard(a) => a.cost(params, terms, loan_amount, loan_held, opened_at, now),
        }
    }
}

impl From<StandardAssessor> for AssessorPlugin {
    fn from(assessor: StandardAssessor) -> Self {
        Self::Standard(assessor)
    }
}

#[cfg(test)]
mod tests {
    use bookkeeper_types::{BorrowerConfig, PluginReference};
    use chrono::Duration;

    use super::*;

    fn make_order_and_fill(loan_amount: Decimal) -> (Order, Fill) {
        let plugin = |label: &str| PluginReference::new(Address::derive(label), Vec::new());
        let order = Order::dummy_offer(
            plugin("account"),
            plugin("oracle:loan"),
            plugin("oracle:coll"),
            plugin("assessor"),
            plugin("liquidator"),
            Address::derive("factory"),
        );
        let fill = Fill {
            account: plugin("account"),
            loan_amount,
            taker_idx: 0,
            loan_asset_idx: 0,
            coll_asset_idx: 0,
            factory_idx: 0,
            is_offer_fill: true,
            borrower_config: BorrowerConfig::with_ratio(Decimal::TWO),
            filler_data: Vec::new(),
        };
        (order, fill)
    }

    fn assessor() -> StandardAssessor {
        StandardAssessor::new(Address::derive("assessor:standard"))
    }

    #[test]
    fn empty_params_are_free() {
        let (order, fill) = make_order_and_fill(Decimal::TEN);
        let terms = assessor().assess(&[], &order, &fill).unwrap();
        assert_eq!(terms, AssessorTerms::FREE);
    }

    #[test]
    fn origination_fee_combines_value_and_ratio() {
        let (order, fill) = make_order_and_fill(Decimal::new(100, 0));
        let params = serde_json::to_vec(&StandardAssessorParams {
            origination_fee_value: Decimal::ONE,
            origination_fee_ratio: Decimal::new(1, 2),
            ..Default::default()
        })
        .unwrap();
        let terms = assessor().assess(&params, &order, &fill).unwrap();
        assert_eq!(terms.origination_fee, Decimal::TWO);
    }

    #[test]
    fn interest_accrues_per_second() {
        let terms = AssessorTerms {
            interest_rate: Decimal::new(10, 2),
            ..AssessorTerms::FREE
        };
        let opened = Utc::now();
        let a = assessor();
        let half_year = opened + Duration::seconds(constants::SECONDS_PER_YEAR / 2);
        let cost = a
            .cost(&[], &terms, Decimal::new(100, 0), Decimal::new(100, 0), opened, half_year)
            .unwrap();
        assert_eq!(cost, Decimal::new(5, 0));
        let at_open = a
            .cost(&[], &terms, Decimal::new(100, 0), Decimal::new(100, 0), opened, opened)
            .unwrap();
        assert_eq!(at_open, Decimal::ZERO);
    }

    #[test]
    fn profit_share_only_on_gains() {
        let terms = AssessorTerms {
            profit_share_ratio: Decimal::new(5, 1),
            ..AssessorTerms::FREE
        };
        let now = Utc::now();
        let a = assessor();
        let gain = a
            .cost(&[], &terms, Decimal::new(100, 0), Decimal::new(120, 0), now, now)
            .unwrap();
        assert_eq!(gain, Decimal::TEN);
        let loss = a
            .cost(&[], &terms, Decimal::new(100, 0), Decimal::new(80, 0), now, now)
            .unwrap();
        assert_eq!(loss, Decimal::ZERO);
    }

    #[test]
    fn negative_parameters_rejected() {
        let (order, fill) = make_order_and_fill(Decimal::TEN);
        let params = serde_json::to_vec(&StandardAssessorParams {
            interest_rate: Decimal::NEGATIVE_ONE,
            ..Default::default()
        })
        .unwrap();
        let err = assessor().assess(&params, &order, &fill).unwrap_err();
        assert!(matches!(err, BookkeeperError::PluginFailure { .. }));
    }
}
