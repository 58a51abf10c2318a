//! Pricing
//!
//! Order totals are held in minor units. An offer discounts the item subtotal only, the
//! delivery fee is always added afterwards at full price.

use std::str::FromStr;

use decimal_percentage::Percentage;
use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use rusty_money::{
    Money, MoneyError,
    iso::{self, Currency},
};
use thiserror::Error;

use crate::orders::OrderLine;

/// Currency every amount in the system is expressed in.
pub const CURRENCY: &Currency = iso::USD;

/// A fixed-point monetary amount.
pub type Amount = Money<'static, Currency>;

/// Errors that can occur while calculating an order total.
#[derive(Debug, Error, PartialEq)]
pub enum PricingError {
    /// Discount percentage outside of `0..=100`.
    #[error("discount of {0}% is outside 0-100")]
    DiscountOutOfRange(Decimal),

    /// An intermediate value could not be represented in minor units.
    #[error("amount overflowed while pricing the order")]
    Overflow,

    /// An amount string could not be parsed.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Wrapped money arithmetic or currency mismatch error.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// Create an amount from minor units (cents).
pub fn amount(minor: i64) -> Amount {
    Money::from_minor(minor, CURRENCY)
}

/// Parse a decimal amount such as `"12.50"` into minor units, rounding to cents.
///
/// # Errors
///
/// Returns [`PricingError::InvalidAmount`] when the string is not a decimal or does not fit.
pub fn parse_amount(s: &str) -> Result<Amount, PricingError> {
    let value = Decimal::from_str(s.trim()).map_err(|_err| PricingError::InvalidAmount(s.to_string()))?;

    let minor = value
        .checked_mul(Decimal::ONE_HUNDRED)
        .map(|value| value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|value| value.to_i64())
        .ok_or_else(|| PricingError::InvalidAmount(s.to_string()))?;

    Ok(amount(minor))
}

/// Format an amount with exactly two decimals and a `.` separator, without a symbol.
pub fn format_amount(value: &Amount) -> String {
    Decimal::new(value.to_minor_units(), 2).to_string()
}

/// Convert an offer's percentage points (`10` for 10%) into a discount rate.
///
/// # Errors
///
/// Returns [`PricingError::DiscountOutOfRange`] unless `0 <= points <= 100`.
pub fn discount_rate(points: Decimal) -> Result<Percentage, PricingError> {
    if points < Decimal::ZERO || points > Decimal::ONE_HUNDRED {
        return Err(PricingError::DiscountOutOfRange(points));
    }

    Ok(Percentage::from(points / Decimal::ONE_HUNDRED))
}

/// Sum of `unit price * quantity` over all lines.
///
/// # Errors
///
/// Returns [`PricingError::Overflow`] if the subtotal does not fit in minor units.
pub fn items_subtotal(lines: &[OrderLine]) -> Result<Amount, PricingError> {
    let minor = lines.iter().try_fold(0_i64, |acc, line| {
        line.unit_price()
            .to_minor_units()
            .checked_mul(i64::from(line.quantity()))
            .and_then(|line_total| acc.checked_add(line_total))
            .ok_or(PricingError::Overflow)
    })?;

    Ok(amount(minor))
}

/// Calculates the total of an order:
/// `round(subtotal * (1 - discount) + delivery_fee, 2)`.
///
/// # Errors
///
/// Returns a [`PricingError`] if the arithmetic overflows.
pub fn compute_total(
    lines: &[OrderLine],
    discount: Option<Percentage>,
    delivery_fee: Amount,
) -> Result<Amount, PricingError> {
    let subtotal = items_subtotal(lines)?;

    let discounted = match discount {
        Some(rate) => discounted_minor(subtotal.to_minor_units(), rate)?,
        None => subtotal.to_minor_units(),
    };

    Ok(amount(discounted).add(delivery_fee)?)
}

fn discounted_minor(minor: i64, rate: Percentage) -> Result<i64, PricingError> {
    let minor = Decimal::from(minor);

    // decimal_percentage only exposes the rate through multiplication
    let discount = (rate * Decimal::ONE)
        .checked_mul(minor)
        .ok_or(PricingError::Overflow)?;

    minor
        .checked_sub(discount)
        .ok_or(PricingError::Overflow)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(PricingError::Overflow)
}
