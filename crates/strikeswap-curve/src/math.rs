//! Checked decimal helpers and the tick price function.

use rust_decimal::{Decimal, RoundingStrategy};
use strikeswap_types::{Result, StrikeswapError, check_tick, constants};

/// `1.0001`, the price ratio between adjacent ticks.
fn tick_base() -> Decimal {
    Decimal::new(10_001, 4)
}

pub fn add(a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_add(b).ok_or(StrikeswapError::ArithmeticOverflow)
}

pub fn sub(a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_sub(b).ok_or(StrikeswapError::ArithmeticOverflow)
}

pub fn mul(a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_mul(b).ok_or(StrikeswapError::ArithmeticOverflow)
}

/// Division by zero is reported as overflow.
pub fn div(a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_div(b).ok_or(StrikeswapError::ArithmeticOverflow)
}

/// `base^exp` by repeated squaring.
pub fn pow(base: Decimal, exp: u64) -> Result<Decimal> {
    let mut result = Decimal::ONE;
    let mut factor = base;
    let mut remaining = exp;
    while remaining > 0 {
        if remaining & 1 == 1 {
            result = mul(result, factor)?;
        }
        remaining >>= 1;
        if remaining > 0 {
            factor = mul(factor, factor)?;
        }
    }
    Ok(result)
}

/// `base^exp` clamped to `cap`. Requires `base >= 1`, so every
/// intermediate power can be clamped without changing the result.
pub fn pow_capped(base: Decimal, exp: u64, cap: Decimal) -> Result<Decimal> {
    let mut result = Decimal::ONE;
    let mut factor = base.min(cap);
    let mut remaining = exp;
    while remaining > 0 {
        if remaining & 1 == 1 {
            result = mul(result, factor)?.min(cap);
            if result == cap {
                return Ok(cap);
            }
        }
        remaining >>= 1;
        if remaining > 0 {
            factor = mul(factor, factor)?.min(cap);
        }
    }
    Ok(result)
}

/// Price of token0 in token1 at `tick`.
pub fn price_at_tick(tick: i32) -> Result<Decimal> {
    let tick = check_tick(tick)?;
    let magnitude = pow(tick_base(), u64::from(tick.unsigned_abs()))?;
    if tick < 0 {
        div(Decimal::ONE, magnitude)
    } else {
        Ok(magnitude)
    }
}

/// `10^scaling_factor`.
pub fn scale_for(scaling_factor: u8) -> Result<Decimal> {
    pow(Decimal::TEN, u64::from(scaling_factor))
}

/// Round an amount the caller pays.
#[must_use]
pub fn round_up(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(constants::AMOUNT_SCALE, RoundingStrategy::ToPositiveInfinity)
}

/// Round an amount the engine pays out.
#[must_use]
pub fn round_down(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(constants::AMOUNT_SCALE, RoundingStrategy::ToNegativeInfinity)
}

/// Reject zero and negative amounts.
pub fn require_positive(amount: Decimal, what: &str) -> Result<Decimal> {
    if amount <= Decimal::ZERO {
        return Err(StrikeswapError::InvalidAmount {
            reason: format!("{what} must be positive, got {amount}"),
        });
    }
    Ok(amount)
}
