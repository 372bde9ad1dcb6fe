//! # bookkeeper-types
//!
//! Shared types, errors, and configuration for the **Bookkeeper** lending engine.
//!
//! This crate is the leaf dependency of the workspace. It defines:
//!
//! - **Identifiers**: [`Address`], [`BlueprintHash`], [`AgreementId`], [`PositionId`], [`Asset`]
//! - **Blueprint model**: [`Blueprint`], [`SignedBlueprint`], [`BlueprintKind`]
//! - **Order model**: [`Order`], [`Fill`], [`BorrowerConfig`], [`CollateralCommitment`], [`PluginReference`]
//! - **Agreement model**: [`Agreement`], [`AgreementState`], [`AssessorTerms`], [`AgreementEvent`]
//! - **Settlement model**: [`Holdings`], [`Settlement`], [`Payout`], [`Valuation`]
//! - **Configuration**: [`BookkeeperConfig`], [`SigningDomain`]
//! - **Errors**: [`BookkeeperError`] with `BK_ERR_` prefix codes
//! - **Constants** and checked decimal **math**

pub mod agreement;
pub mod blueprint;
pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod math;
pub mod order;
pub mod settlement;

// Re-export all primary types at crate root for ergonomic imports:
//   use bookkeeper_types::{Order, Fill, Agreement, ...};

pub use agreement::*;
pub use blueprint::*;
pub use config::*;
pub use error::*;
pub use ids::*;
pub use order::*;
pub use settlement::*;

// Constants and math are accessed via `bookkeeper_types::constants::FOO` and
// `bookkeeper_types::math::mul` (not re-exported to avoid name collisions).
