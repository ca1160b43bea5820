//! Final price formula.
//!
//! ```text
//! final = round(raw_price × rate + fixed_fee + delivery_fee)
//! ```
//!
//! `raw_price` is the Poizon listing price in CNY, `rate` the marked-up
//! CNY→RUB rate, and the result is whole rubles. Decimal arithmetic keeps the
//! result exact; rounding is half away from zero.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ShippingMethod;

/// Errors from price calculations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    #[error("price must be greater than zero")]
    NonPositivePrice,
    #[error("exchange rate must be greater than zero")]
    NonPositiveRate,
    #[error("price is too large")]
    Overflow,
}

/// Fee constants applied on top of the converted price (rubles).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Service fee charged on every order.
    pub fixed_fee: Decimal,
    /// Delivery fee for air freight.
    pub air_fee: Decimal,
    /// Delivery fee for standard shipping.
    pub standard_fee: Decimal,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            fixed_fee: Decimal::from(590),
            air_fee: Decimal::from(800),
            standard_fee: Decimal::from(400),
        }
    }
}

impl PricingConfig {
    #[must_use]
    pub const fn delivery_fee(&self, shipping: ShippingMethod) -> Decimal {
        match shipping {
            ShippingMethod::Air => self.air_fee,
            ShippingMethod::Standard => self.standard_fee,
        }
    }
}

/// Reject non-positive raw prices before they reach the formula.
///
/// # Errors
///
/// Returns `PricingError::NonPositivePrice` if `raw_price <= 0`.
pub fn validate_raw_price(raw_price: Decimal) -> Result<Decimal, PricingError> {
    if raw_price > Decimal::ZERO {
        Ok(raw_price)
    } else {
        Err(PricingError::NonPositivePrice)
    }
}

/// Compute the final order price in whole rubles.
///
/// The caller is responsible for validating `raw_price > 0`
/// (see [`validate_raw_price`]).
///
/// # Errors
///
/// Returns `PricingError::Overflow` if the result does not fit the decimal or
/// `i64` range.
pub fn calculate_final_price(
    raw_price: Decimal,
    shipping: ShippingMethod,
    rate: Decimal,
    config: &PricingConfig,
) -> Result<i64, PricingError> {
    let total = raw_price
        .checked_mul(rate)
        .and_then(|converted| converted.checked_add(config.fixed_fee))
        .and_then(|sum| sum.checked_add(config.delivery_fee(shipping)))
        .ok_or(PricingError::Overflow)?;

    total
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(PricingError::Overflow)
}

/// Apply the 1-ruble markup to an upstream quote and round to kopecks.
///
/// Upstream sources quote a price per `nominal` units of currency, so the
/// per-unit rate is `value / nominal`.
///
/// # Errors
///
/// Returns `PricingError::NonPositiveRate` if `value` or `nominal` is not
/// positive.
pub fn markup_rate(value: Decimal, nominal: Decimal) -> Result<Decimal, PricingError> {
    if value <= Decimal::ZERO || nominal <= Decimal::ZERO {
        return Err(PricingError::NonPositiveRate);
    }
    let per_unit = value
        .checked_div(nominal)
        .and_then(|rate| rate.checked_add(Decimal::ONE))
        .ok_or(PricingError::Overflow)?;
    Ok(per_unit.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}
