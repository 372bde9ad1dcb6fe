//! System-wide constants for the Bookkeeper lending engine.

/// Protocol name bound into every signing domain.
pub const PROTOCOL_NAME: &str = "Bookkeeper";

/// Protocol version bound into every signing domain.
pub const PROTOCOL_VERSION: &str = "1.0.0";

/// Default realm (deployment / chain) identifier.
pub const DEFAULT_REALM_ID: u64 = 1;

/// Blueprint payload tag for a lending order.
pub const ORDER_TAG: u8 = 0x01;

/// Number of closed agreement IDs remembered for `AgreementClosed` errors.
pub const DEFAULT_CLOSED_AGREEMENT_CACHE_SIZE: usize = 100_000;

/// Seconds in a (365-day) year, used to annualise interest rates.
pub const SECONDS_PER_YEAR: i64 = 31_536_000;

/// Maximum length of a blueprint's opaque data field.
pub const MAX_BLUEPRINT_DATA_LEN: usize = 64 * 1024;

/// Decimal places to which a ratio-derived collateral amount is rounded up.
pub const COLLATERAL_SCALE: u32 = 18;
