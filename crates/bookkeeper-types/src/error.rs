//! Error types for the Bookkeeper lending engine.
//!
//! All errors use the `BK_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Blueprint errors (hash, signature, window, nonce, payload kind)
//! - 2xx: Order / fill validation errors
//! - 3xx: Collateral and balance errors
//! - 4xx: Plugin errors
//! - 5xx: Agreement lifecycle errors
//! - 9xx: General / internal errors
//!
//! Every error is recoverable at the caller: a rejected operation leaves the
//! ledger and all balances untouched.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{Address, AgreementId, BlueprintHash};

/// Plugin capability, used to say which kind of plugin failed or was missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Account,
    Oracle,
    Assessor,
    Liquidator,
    Position,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Account => write!(f, "account"),
            Self::Oracle => write!(f, "oracle"),
            Self::Assessor => write!(f, "assessor"),
            Self::Liquidator => write!(f, "liquidator"),
            Self::Position => write!(f, "position"),
        }
    }
}

/// Central error enum for all Bookkeeper operations.
#[derive(Debug, Error)]
pub enum BookkeeperError {
    // =================================================================
    // Blueprint Errors (1xx)
    // =================================================================
    /// The submitted hash is not the canonical hash of the blueprint.
    #[error("BK_ERR_100: Blueprint hash mismatch: submitted {submitted}, computed {computed}")]
    HashMismatch {
        submitted: BlueprintHash,
        computed: BlueprintHash,
    },

    /// The signature does not verify against the claimed publisher.
    #[error("BK_ERR_101: Invalid blueprint signature for publisher {publisher}")]
    InvalidSignature { publisher: Address },

    /// The blueprint is not valid at the current time.
    #[error("BK_ERR_102: Blueprint outside its validity window")]
    OutOfWindow,

    /// The publisher's nonce has moved past the blueprint's `max_nonce`.
    #[error("BK_ERR_103: Stale nonce for {publisher}: current {current}, max {max}")]
    StaleNonce {
        publisher: Address,
        current: u64,
        max: u64,
    },

    /// The blueprint payload carries an unknown or unexpected type tag.
    #[error("BK_ERR_104: Unsupported blueprint data kind: {tag:?}")]
    DataKind { tag: Option<u8> },

    // =================================================================
    // Order / Fill Errors (2xx)
    // =================================================================
    /// The caller is not allowed to perform this action.
    #[error("BK_ERR_200: Unauthorized: {reason}")]
    Unauthorized { reason: String },

    /// A fill index points outside the order's arrays.
    #[error("BK_ERR_201: Index out of range: {field} = {index}, length {len}")]
    IndexOutOfRange {
        field: &'static str,
        index: usize,
        len: usize,
    },

    /// The decoded order is structurally invalid.
    #[error("BK_ERR_202: Invalid order: {reason}")]
    InvalidOrder { reason: String },

    /// The fill is structurally invalid for this order.
    #[error("BK_ERR_203: Invalid fill: {reason}")]
    InvalidFill { reason: String },

    /// The fill's loan amount is below the order's minimum.
    #[error("BK_ERR_204: Loan amount {amount} below minimum {minimum}")]
    LoanBelowMinimum { amount: Decimal, minimum: Decimal },

    /// The filler tried to match their own blueprint.
    #[error("BK_ERR_205: Self-fill prevented: filler is the publisher")]
    SelfFillBlocked,

    // =================================================================
    // Collateral / Balance Errors (3xx)
    // =================================================================
    /// The committed collateral does not meet the minimum ratio.
    #[error("BK_ERR_300: Insufficient collateral: ratio {ratio}, minimum {minimum}")]
    InsufficientCollateral { ratio: Decimal, minimum: Decimal },

    /// An account does not hold enough of an asset.
    #[error("BK_ERR_301: Insufficient balance of {asset}: need {needed}, have {available}")]
    InsufficientBalance {
        asset: String,
        needed: Decimal,
        available: Decimal,
    },

    /// A checked decimal operation overflowed or divided by zero.
    #[error("BK_ERR_302: Arithmetic overflow in {context}")]
    ArithmeticOverflow { context: &'static str },

    /// Custody totals no longer match recorded inflow and outflow.
    #[error("BK_ERR_303: Supply invariant violation: {reason}")]
    SupplyInvariantViolation { reason: String },

    // =================================================================
    // Plugin Errors (4xx)
    // =================================================================
    /// A plugin call failed. Not retried; the caller must resubmit.
    #[error("BK_ERR_400: {capability} plugin {addr} failed: {reason}")]
    PluginFailure {
        capability: Capability,
        addr: Address,
        reason: String,
    },

    /// No plugin is registered at the address for this capability.
    #[error("BK_ERR_401: No {capability} plugin registered at {addr}")]
    PluginNotFound { capability: Capability, addr: Address },

    // =================================================================
    // Agreement Errors (5xx)
    // =================================================================
    /// No open agreement with this ID.
    #[error("BK_ERR_500: Agreement not found: {0}")]
    AgreementNotFound(AgreementId),

    /// The agreement was already closed or liquidated.
    #[error("BK_ERR_501: Agreement already closed: {0}")]
    AgreementClosed(AgreementId),

    /// Only the borrower or lender may close an agreement.
    #[error("BK_ERR_502: Caller {caller} is neither borrower nor lender")]
    NotBorrowerOrLender { caller: Address },

    /// The lender tried to close before maturity.
    #[error("BK_ERR_503: Agreement {0} has not matured")]
    NotMature(AgreementId),

    /// Liquidation attempted on a sufficiently collateralized agreement.
    #[error("BK_ERR_504: Agreement is healthy: ratio {ratio}, minimum {minimum}")]
    Healthy { ratio: Decimal, minimum: Decimal },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("BK_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("BK_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config, missing fields, etc.).
    #[error("BK_ERR_902: Configuration error: {0}")]
    Configuration(String),
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, BookkeeperError>;

impl From<serde_json::Error> for BookkeeperError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl BookkeeperError {
    /// Wrap a collaborator failure.
    pub fn plugin(capability: Capability, addr: Address, reason: impl Into<String>) -> Self {
        Self::PluginFailure {
            capability,
            addr,
            reason: reason.into(),
        }
    }

    /// Shorthand for [`BookkeeperError::Unauthorized`].
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_contains_prefix() {
        let err = BookkeeperError::AgreementNotFound(AgreementId::new());
        let msg = format!("{err}");
        assert!(msg.starts_with("BK_ERR_500"), "Got: {msg}");
    }

    #[test]
    fn insufficient_collateral_display() {
        let err = BookkeeperError::InsufficientCollateral {
            ratio: Decimal::new(149, 2),
            minimum: Decimal::new(15, 1),
        };
        let msg = format!("{err}");
        assert!(msg.contains("BK_ERR_300"));
        assert!(msg.contains("1.49"));
        assert!(msg.contains("1.5"));
    }

    #[test]
    fn plugin_failure_names_capability() {
        let err = BookkeeperError::plugin(Capability::Oracle, Address::ZERO, "no price");
        let msg = format!("{err}");
        assert!(msg.contains("oracle plugin"));
        assert!(msg.contains("no price"));
    }

    #[test]
    fn all_errors_have_bk_err_prefix() {
        let errors: Vec<Box<dyn std::error::Error>> = vec![
            Box::new(BookkeeperError::OutOfWindow),
            Box::new(BookkeeperError::SelfFillBlocked),
            Box::new(BookkeeperError::DataKind { tag: Some(7) }),
            Box::new(BookkeeperError::Internal("test".into())),
            Box::new(BookkeeperError::NotMature(AgreementId::new())),
            Box::new(BookkeeperError::StaleNonce {
                publisher: Address::ZERO,
                current: 2,
                max: 1,
            }),
        ];
        for err in errors {
            let msg = format!("{err}");
            assert!(
                msg.starts_with("BK_ERR_"),
                "Error missing BK_ERR_ prefix: {msg}"
            );
        }
    }
}
