//! Checked decimal arithmetic.
//!
//! `Decimal` operators panic on overflow. Prices reach the engine from
//! untrusted oracle plugins, so every product and quotient on a value path
//! goes through these helpers instead.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::{BookkeeperError, Result};

/// `a * b`, or `ArithmeticOverflow`.
pub fn mul(a: Decimal, b: Decimal, context: &'static str) -> Result<Decimal> {
    a.checked_mul(b)
        .ok_or(BookkeeperError::ArithmeticOverflow { context })
}

/// `a / b`, or `ArithmeticOverflow` (also on division by zero).
pub fn div(a: Decimal, b: Decimal, context: &'static str) -> Result<Decimal> {
    a.checked_div(b)
        .ok_or(BookkeeperError::ArithmeticOverflow { context })
}

/// `a / b` rounded up at `scale` decimal places, so the result is never
/// below the exact quotient.
pub fn div_ceil(a: Decimal, b: Decimal, scale: u32, context: &'static str) -> Result<Decimal> {
    Ok(div(a, b, context)?.round_dp_with_strategy(scale, RoundingStrategy::AwayFromZero))
}

/// `a + b`, or `ArithmeticOverflow`.
pub fn add(a: Decimal, b: Decimal, context: &'static str) -> Result<Decimal> {
    a.checked_add(b)
        .ok_or(BookkeeperError::ArithmeticOverflow { context })
}

/// `a - b` floored at zero.
#[must_use]
pub fn saturating_sub(a: Decimal, b: Decimal) -> Decimal {
    if a > b { a - b } else { Decimal::ZERO }
}
