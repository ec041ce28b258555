//! Human-readable currency amount parsing and formatting.
//!
//! Token amounts travel through the core as smallest-unit [`U256`] values.
//! These helpers convert user input such as `"12.5"` into smallest units and
//! render balances back as dollar strings (`"$12.50"`).

use std::str::FromStr;

use alloy_primitives::U256;
use rust_decimal::Decimal;

/// Errors produced while converting between decimal strings and smallest units.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    /// The input is not a decimal number.
    #[error("Invalid amount {0:?}")]
    Invalid(String),
    /// Negative amounts cannot be transferred.
    #[error("Amount must not be negative")]
    Negative,
    /// More fractional digits than the token supports.
    #[error("Amount has more than {decimals} decimal places")]
    TooPrecise {
        /// Decimal places supported by the token.
        decimals: u8,
    },
    /// The value does not fit the target representation.
    #[error("Amount is out of range")]
    Overflow,
}

/// Parses a decimal string into the token's smallest-unit integer.
///
/// # Errors
///
/// Returns [`AmountError`] if the input is not a non-negative decimal with at
/// most `decimals` fractional digits.
pub fn parse_units(input: &str, decimals: u8) -> Result<U256, AmountError> {
    let trimmed = input.trim();
    let value =
        Decimal::from_str(trimmed).map_err(|_| AmountError::Invalid(trimmed.to_owned()))?;
    if value.is_sign_negative() && !value.is_zero() {
        return Err(AmountError::Negative);
    }

    let value = value.normalize();
    let scale = value.scale();
    if scale > u32::from(decimals) {
        return Err(AmountError::TooPrecise { decimals });
    }

    let factor = 10i128
        .checked_pow(u32::from(decimals) - scale)
        .ok_or(AmountError::Overflow)?;
    let units = value
        .mantissa()
        .checked_mul(factor)
        .ok_or(AmountError::Overflow)?;
    let units = u128::try_from(units).map_err(|_| AmountError::Negative)?;
    Ok(U256::from(units))
}

/// Converts a smallest-unit value into a [`Decimal`] with `decimals` places.
///
/// # Errors
///
/// Returns [`AmountError::Overflow`] if the value exceeds what [`Decimal`]
/// can represent.
pub fn format_units(value: U256, decimals: u8) -> Result<Decimal, AmountError> {
    let raw = u128::try_from(value).map_err(|_| AmountError::Overflow)?;
    let raw = i128::try_from(raw).map_err(|_| AmountError::Overflow)?;
    Decimal::try_from_i128_with_scale(raw, u32::from(decimals)).map_err(|_| AmountError::Overflow)
}

/// Renders a smallest-unit value as dollars rounded to cents, e.g. `"$12.50"`.
///
/// Rounds half away from zero. Works on the full `U256` range; a scale
/// factor too large for `U256` renders as `$0.00`, since every value is
/// below it.
#[must_use]
pub fn format_usd(value: U256, decimals: u8) -> String {
    let cents = if decimals >= 2 {
        match U256::from(10u8).checked_pow(U256::from(decimals - 2)) {
            Some(divisor) => {
                let half = divisor / U256::from(2u8);
                value.saturating_add(half) / divisor
            }
            None => U256::ZERO,
        }
    } else {
        let multiplier = U256::from(10u8).pow(U256::from(2 - decimals));
        value.saturating_mul(multiplier)
    };
    let hundred = U256::from(100u8);
    format!("${}.{:02}", cents / hundred, (cents % hundred).to::<u8>())
}
