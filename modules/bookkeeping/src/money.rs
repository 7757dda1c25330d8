//! Conversion between boundary decimals and internal minor units
//!
//! Amounts cross into the core as `Decimal` and are stored as `i64` minor
//! units. Rounding happens once, here, with round-half-away-from-zero.

use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

/// Minor-unit exponent of SEK (öre)
pub const DEFAULT_MINOR_UNIT_DECIMALS: u32 = 2;

#[derive(Debug, Error, PartialEq)]
pub enum MoneyError {
    #[error("Amount {0} does not fit in minor units")]
    Overflow(Decimal),

    #[error("Unsupported minor unit exponent: {0}")]
    UnsupportedDecimals(u32),
}

/// Convert a decimal amount to minor units, rounding half away from zero.
pub fn to_minor(amount: Decimal, decimals: u32) -> Result<i64, MoneyError> {
    if decimals > 8 {
        return Err(MoneyError::UnsupportedDecimals(decimals));
    }
    let mut rounded =
        amount.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(decimals);
    i64::try_from(rounded.mantissa()).map_err(|_| MoneyError::Overflow(amount))
}

/// Sum minor-unit amounts, or `None` if the total does not fit in `i64`.
pub fn checked_sum<I>(amounts: I) -> Option<i64>
where
    I: IntoIterator<Item = i64>,
{
    amounts.into_iter().try_fold(0i64, i64::checked_add)
}

/// Convert minor units back to a decimal amount for presentation.
pub fn from_minor(amount_minor: i64, decimals: u32) -> Decimal {
    Decimal::new(amount_minor, decimals)
}
