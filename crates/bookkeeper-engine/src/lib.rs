//! # bookkeeper-engine
//!
//! Matching and agreement lifecycle for signed lending blueprints.
//!
//! - [`MatchingEngine`]: verifies a signed order, validates a fill, prices
//!   collateral, and opens an agreement through the plugins
//! - [`AgreementLedger`]: open agreements, close by repayment, liquidation
//! - [`Bookkeeper`]: owns config, engine, registry, and ledger
//! - [`SharedBookkeeper`]: `Arc<Mutex<Bookkeeper>>` for concurrent callers
//!
//! ## Lifecycle
//!
//! ```text
//! publisher signs Order ─▶ BlueprintAuthority::verify ─▶ MatchingEngine::fill_order
//!     ─▶ Account debits + Position open ─▶ Agreement (OPEN)
//!     ─▶ AgreementLedger::close | AgreementLedger::liquidate ─▶ removed
//! ```
//!
//! Every operation either fully succeeds or leaves balances, nonces, and
//! the ledger exactly as they were.

pub mod bookkeeper;
pub mod closed_guard;
pub mod ledger;
pub mod matching;
pub mod pricing;

pub use bookkeeper::{Bookkeeper, SharedBookkeeper};
pub use closed_guard::ClosedAgreementGuard;
pub use ledger::{AgreementLedger, Closure, Liquidation};
pub use matching::MatchingEngine;
