//! Order and fill types.
//!
//! An [`Order`] is the payload a publisher signs inside a blueprint. It lists
//! the assets, minimums, oracles, and plugins the publisher accepts. A
//! [`Fill`] picks one combination out of those lists by index and supplies
//! the filler's side of the deal.
//!
//! Index families share a semantic index and must have equal lengths:
//!
//! | index            | arrays                                                  |
//! |------------------|---------------------------------------------------------|
//! | `loan_asset_idx` | `loan_assets`, `min_loan_amounts`, `loan_oracles`        |
//! | `coll_asset_idx` | `coll_assets`, `coll_oracles`, `min_collateral_ratio`    |
//! | `factory_idx`    | `factories`                                             |
//! | `taker_idx`      | `fillers` (only when the allow-list is non-empty)       |

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{Address, Asset, BookkeeperError, Result};

/// Polymorphic handle to a plugin: where it lives and the opaque parameters
/// it should be invoked with. The core never interprets `parameters`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PluginReference {
    pub addr: Address,
    pub parameters: Vec<u8>,
}

impl PluginReference {
    #[must_use]
    pub fn new(addr: Address, parameters: Vec<u8>) -> Self {
        Self { addr, parameters }
    }

    /// Build a reference whose parameters are the JSON encoding of `params`.
    pub fn with_params<T: Serialize>(addr: Address, params: &T) -> Result<Self> {
        Ok(Self {
            addr,
            parameters: serde_json::to_vec(params)?,
        })
    }

    /// Decode the parameters as JSON.
    pub fn decode_params<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.parameters)?)
    }
}

/// How the borrower commits collateral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollateralCommitment {
    /// Collateral value = loan value × ratio, at open prices.
    Ratio(Decimal),
    /// An absolute amount of the collateral asset.
    Amount(Decimal),
}

/// The borrower's concrete collateral choice plus position parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowerConfig {
    pub collateral: CollateralCommitment,
    /// Opaque parameters forwarded to the position factory.
    pub position_parameters: Vec<u8>,
}

impl BorrowerConfig {
    #[must_use]
    pub fn with_amount(amount: Decimal) -> Self {
        Self {
            collateral: CollateralCommitment::Amount(amount),
            position_parameters: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_ratio(ratio: Decimal) -> Self {
        Self {
            collateral: CollateralCommitment::Ratio(ratio),
            position_parameters: Vec::new(),
        }
    }
}

/// A lending order, decoded from a blueprint of kind ORDER.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Minimum loan per loan asset.
    pub min_loan_amounts: Vec<Decimal>,
    pub loan_assets: Vec<Asset>,
    pub coll_assets: Vec<Asset>,
    /// Minimum collateral ratio per collateral asset (1.5 = 150%).
    pub min_collateral_ratio: Vec<Decimal>,
    /// Allow-list of fillers. Empty means anyone may fill.
    pub fillers: Vec<Address>,
    /// Loaned funds also count as collateral.
    pub is_leverage: bool,
    /// Maximum agreement duration in seconds.
    pub max_duration: u64,
    /// The publisher's account.
    pub account: PluginReference,
    pub assessor: PluginReference,
    pub liquidator: PluginReference,
    pub loan_oracles: Vec<PluginReference>,
    pub coll_oracles: Vec<PluginReference>,
    /// Allowed position factories.
    pub factories: Vec<Address>,
    /// `true`: the publisher lends. `false`: the publisher borrows.
    pub is_offer: bool,
    /// Collateral commitment used when the publisher is the borrower.
    pub borrower_config: BorrowerConfig,
}

impl Order {
    /// Check that every index family has a consistent length.
    ///
    /// # Errors
    /// `InvalidOrder` describing the first mismatch.
    pub fn validate_shape(&self) -> Result<()> {
        let loan_len = self.loan_assets.len();
        if loan_len == 0 {
            return Err(invalid("order lists no loan assets"));
        }
        if self.min_loan_amounts.len() != loan_len || self.loan_oracles.len() != loan_len {
            return Err(invalid(format!(
                "loan family lengths differ: assets {loan_len}, minimums {}, oracles {}",
                self.min_loan_amounts.len(),
                self.loan_oracles.len(),
            )));
        }

        let coll_len = self.coll_assets.len();
        if coll_len == 0 {
            return Err(invalid("order lists no collateral assets"));
        }
        if self.coll_oracles.len() != coll_len || self.min_collateral_ratio.len() != coll_len {
            return Err(invalid(format!(
                "collateral family lengths differ: assets {coll_len}, oracles {}, ratios {}",
                self.coll_oracles.len(),
                self.min_collateral_ratio.len(),
            )));
        }

        if self.factories.is_empty() {
            return Err(invalid("order lists no position factories"));
        }
        if self.min_loan_amounts.iter().any(Decimal::is_sign_negative) {
            return Err(invalid("minimum loan amounts must not be negative"));
        }
        if self
            .min_collateral_ratio
            .iter()
            .any(|r| r.is_sign_negative() || r.is_zero())
        {
            return Err(invalid("minimum collateral ratios must be positive"));
        }
        Ok(())
    }
}

fn invalid(reason: impl Into<String>) -> BookkeeperError {
    BookkeeperError::InvalidOrder {
        reason: reason.into(),
    }
}

/// A counter-offer matched against a published order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fill {
    /// The filler's account.
    pub account: PluginReference,
    pub loan_amount: Decimal,
    pub taker_idx: usize,
    pub loan_asset_idx: usize,
    pub coll_asset_idx: usize,
    pub factory_idx: usize,
    /// Must agree with the order's `is_offer`.
    pub is_offer_fill: bool,
    /// Collateral commitment used when the filler is the borrower.
    pub borrower_config: BorrowerConfig,
    /// Opaque data for the filler's own bookkeeping.
    pub filler_data: Vec<u8>,
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl Order {
    /// Single-asset lending offer with one oracle per side and one factory.
    pub fn dummy_offer(
        account: PluginReference,
        loan_oracle: PluginReference,
        coll_oracle: PluginReference,
        assessor: PluginReference,
        liquidator: PluginReference,
        factory: Address,
    ) -> Self {
        Self {
            min_loan_amounts: vec![Decimal::ZERO],
            loan_assets: vec!["WETH".to_string()],
            coll_assets: vec!["USDC".to_string()],
            min_collateral_ratio: vec![Decimal::new(15, 1)],
            fillers: Vec::new(),
            is_leverage: false,
            max_duration: 86_400,
            account,
            assessor,
            liquidator,
            loan_oracles: vec![loan_oracle],
            coll_oracles: vec![coll_oracle],
            factories: vec![factory],
            is_offer: true,
            borrower_config: BorrowerConfig::with_ratio(Decimal::ZERO),
        }
    }
}
