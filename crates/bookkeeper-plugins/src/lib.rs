//! # bookkeeper-plugins
//!
//! The collaborators the engine moves funds and reads prices through.
//!
//! ## Capabilities
//!
//! | capability | trait               | reference implementation                  |
//! |------------|---------------------|-------------------------------------------|
//! | Account    | [`Account`]         | [`SoloAccount`]                           |
//! | Oracle     | [`Oracle`]          | [`StaticOracle`], [`FeedOracle`]          |
//! | Assessor   | [`Assessor`]        | [`StandardAssessor`]                      |
//! | Liquidator | [`Liquidator`]      | [`StandardLiquidator`]                    |
//! | Position   | [`PositionFactory`] | [`WalletFactory`]                         |
//!
//! Each capability has a closed enum (`AccountPlugin`, `OraclePlugin`, ...)
//! that the [`PluginRegistry`] stores by address. Custody changes go through
//! [`PluginRegistry::transact`], and [`SupplyConservation`] checks that no
//! funds are created or destroyed.

pub mod account;
pub mod assessor;
pub mod capability;
pub mod liquidator;
pub mod oracle;
mod params;
pub mod position;
pub mod registry;
pub mod supply_conservation;

pub use account::{AccountPlugin, SoloAccount, SoloAccountParams};
pub use assessor::{AssessorPlugin, StandardAssessor, StandardAssessorParams};
pub use capability::{Account, Assessor, Liquidator, Oracle, OracleContext, PositionFactory};
pub use liquidator::{LiquidatorPlugin, StandardLiquidator, StandardLiquidatorParams};
pub use oracle::{FeedOracle, FeedOracleParams, OraclePlugin, StaticOracle, StaticOracleParams};
pub use position::{PositionPlugin, WalletFactory};
pub use registry::{CustodyTxn, PluginRegistry};
pub use supply_conservation::SupplyConservation;
