//! Oracle plugins.
//!
//! - [`StaticOracle`]: the price lives in the caller's parameters. Open and
//!   close prices are identical. Useful for pegged assets and tests.
//! - [`FeedOracle`]: prices are pushed per asset with an update time;
//!   callers bound how stale a price they accept.

use std::collections::HashMap;

use bookkeeper_types::{Address, Asset, BookkeeperError, Capability, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    capability::{Oracle, OracleContext},
    params,
};

fn require_positive(addr: Address, asset: &str, price: Decimal) -> Result<Decimal> {
    if price <= Decimal::ZERO {
        return Err(BookkeeperError::plugin(
            Capability::Oracle,
            addr,
            format!("non-positive price {price} for {asset}"),
        ));
    }
    Ok(price)
}

// ---------------------------------------------------------------------------
// StaticOracle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticOracleParams {
    pub price: Decimal,
}

#[derive(Debug, Clone)]
pub struct StaticOracle {
    addr: Address,
}

impl StaticOracle {
    #[must_use]
    pub fn new(addr: Address) -> Self {
        Self { addr }
    }

    fn price(&self, params: &[u8], asset: &str) -> Result<Decimal> {
        let p: StaticOracleParams = params::decode(Capability::Oracle, self.addr, params)?;
        require_positive(self.addr, asset, p.price)
    }
}

impl Oracle for StaticOracle {
    fn open_price(&self, params: &[u8], ctx: &OracleContext<'_>) -> Result<Decimal> {
        self.price(params, ctx.asset)
    }

    fn close_price(&self, params: &[u8], ctx: &OracleContext<'_>) -> Result<Decimal> {
        self.price(params, ctx.asset)
    }
}

// ---------------------------------------------------------------------------
// FeedOracle
// ---------------------------------------------------------------------------

/// Parameters for reading a [`FeedOracle`]. Empty parameters accept any age.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedOracleParams {
    /// Reject prices older than this. `None` accepts any age.
    pub max_staleness_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FeedPrice {
    price: Decimal,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct FeedOracle {
    addr: Address,
    prices: HashMap<Asset, FeedPrice>,
}

impl FeedOracle {
    #[must_use]
    pub fn new(addr: Address) -> Self {
        Self {
            addr,
            prices: HashMap::new(),
        }
    }

    /// Publish a new price for `asset`.
    ///
    /// # Errors
    /// `PluginFailure` if `price` is not positive.
    pub fn set_price(&mut self, asset: &str, price: Decimal, at: DateTime<Utc>) -> Result<()> {
        require_positive(self.addr, asset, price)?;
        self.prices.insert(
            asset.to_string(),
            FeedPrice {
                price,
                updated_at: at,
            },
        );
        Ok(())
    }

    /// Last published price, if any.
    #[must_use]
    pub fn latest(&self, asset: &str) -> Option<Decimal> {
        self.prices.get(asset).map(|p| p.price)
    }

    fn price(&self, params: &[u8], ctx: &OracleContext<'_>) -> Result<Decimal> {
        let p: FeedOracleParams = params::decode_or_default(Capability::Oracle, self.addr, params)?;
        let feed = self.prices.get(ctx.asset).ok_or_else(|| {
            BookkeeperError::plugin(
                Capability::Oracle,
                self.addr,
                format!("no price for {}", ctx.asset),
            )
        })?;
        if let Some(max) = p.max_staleness_secs {
            let age = (ctx.now - feed.updated_at).num_seconds();
            if age > i64::try_from(max).unwrap_or(i64::MAX) {
                return Err(BookkeeperError::plugin(
                    Capability::Oracle,
                    self.addr,
                    format!("price for {} is {age}s old, limit {max}s", ctx.asset),
                ));
            }
        }
        Ok(feed.price)
    }
}

impl Oracle for FeedOracle {
    fn open_price(&self, params: &[u8], ctx: &OracleContext<'_>) -> Result<Decimal> {
        self.price(params, ctx)
    }

    fn close_price(&self, params: &[u8], ctx: &OracleContext<'_>) -> Result<Decimal> {
        self.price(params, ctx)
    }
}

// ---------------------------------------------------------------------------
// OraclePlugin
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum OraclePlugin {
    Static(StaticOracle),
    Feed(FeedOracle),
}

impl OraclePlugin {
    #[must_use]
    pub fn addr(&self) -> Address {
        match self {
            Self::Static(o) => o.addr,
            Self::Feed(o) => o.addr,
        }
    }
}

impl Oracle for OraclePlugin {
    fn open_price(&self, params: &[u8], ctx: &OracleContext<'_>) -> Result<Decimal> {
        match self {
            Self::Static(o) => o.open_price(params, ctx),
            Self::Feed(o) => o.open_price(params, ctx),
        }
    }

    fn close_price(&self, params: &[u8], ctx: &OracleContext<'_>) -> Result<Decimal> {
        match self {
            Self::Static(o) => o.close_price(params, ctx),
            Self::Feed(o) => o.close_price(params, ctx),
        }
    }
}

impl From<StaticOracle> for OraclePlugin {
    fn from(oracle: StaticOracle) -> Self {
        Self::Static(oracle)
    }
}

impl From<FeedOracle> for OraclePlugin {
    fn from(oracle: FeedOracle) -> Self {
        Self::Feed(oracle)
    }
}
