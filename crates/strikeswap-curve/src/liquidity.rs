//! Liquidity provisioning math.

use rust_decimal::Decimal;
use strikeswap_types::{PairDelta, Result, StrikeswapError, check_tick, spread_index};

use crate::math::{self, div, mul, sub};
use crate::pair::PairState;
use crate::tick::TickStore;

/// Which way to round token amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    /// Caller pays: round up.
    Up,
    /// Caller receives: round down.
    Down,
}

impl Rounding {
    fn apply(self, amount: Decimal) -> Decimal {
        match self {
            Self::Up => math::round_up(amount),
            Self::Down => math::round_down(amount),
        }
    }
}

/// Token amounts backing `liquidity` at `tick` for spread `tier`.
///
/// Ticks above the spread's active tick hold only token0, ticks below only
/// token1; the active tick splits by composition.
pub fn amounts_for_liquidity(
    state: &PairState,
    tier: usize,
    tick: i32,
    liquidity: Decimal,
    rounding: Rounding,
) -> Result<(Decimal, Decimal)> {
    let value = mul(liquidity, state.scale)?;
    let spread = state.spreads[tier];
    let (amount0, amount1) = if tick > spread.tick {
        (div(value, math::price_at_tick(tick)?)?, Decimal::ZERO)
    } else if tick < spread.tick {
        (Decimal::ZERO, value)
    } else {
        let in_token0 = mul(value, spread.composition)?;
        (
            div(in_token0, math::price_at_tick(tick)?)?,
            sub(value, in_token0)?,
        )
    };
    Ok((rounding.apply(amount0), rounding.apply(amount1)))
}

/// Add (`delta > 0`) or remove (`delta < 0`) liquidity at `tick` for `tier`.
///
/// Returns the amounts the caller owes (positive, rounded up) or is owed
/// (negative, rounded down). Composition and active ticks are untouched.
///
/// # Errors
/// - `InvalidTierOrSpread` / `InvalidTick` on bad coordinates
/// - `InvalidAmount` if `delta` is zero
/// - `ArithmeticUnderflow` if the tick's liquidity would go negative
pub fn update_liquidity<T: TickStore>(
    state: &PairState,
    ticks: &mut T,
    tier: u8,
    tick: i32,
    delta: Decimal,
) -> Result<PairDelta> {
    let tier = spread_index(tier)?;
    let index = check_tick(tick)?;
    if delta.is_zero() {
        return Err(StrikeswapError::InvalidAmount {
            reason: "liquidity delta must be non-zero".into(),
        });
    }

    let mut tick_state = ticks.tick(index);
    let updated = math::add(tick_state.liquidity[tier], delta)?;
    if updated < Decimal::ZERO {
        return Err(StrikeswapError::ArithmeticUnderflow);
    }

    let adding = delta > Decimal::ZERO;
    let rounding = if adding { Rounding::Up } else { Rounding::Down };
    let (amount0, amount1) = amounts_for_liquidity(state, tier, index, delta.abs(), rounding)?;

    tick_state.liquidity[tier] = updated;
    ticks.set_tick(index, tick_state);

    let delta = PairDelta::new(amount0, amount1);
    Ok(if adding { delta } else { delta.negate() })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use strikeswap_types::PairKey;

    use super::*;
    use crate::tick::Tick;

    fn setup(initial_tick: i32) -> (PairState, BTreeMap<i32, Tick>) {
        (
            PairState::initialize(&PairKey::dummy(), initial_tick).unwrap(),
            BTreeMap::new(),
        )
    }

    #[test]
    fn add_below_active_is_all_token1() {
        let (state, mut ticks) = setup(0);
        let delta =
            update_liquidity(&state, &mut ticks, 0, -10, Decimal::new(500, 0)).unwrap();
        assert_eq!(delta.amount0, Decimal::ZERO);
        assert_eq!(delta.amount1, Decimal::new(500, 0));
    }

    #[test]
    fn add_above_active_is_all_token0() {
        let (state, mut ticks) = setup(0);
        let delta = update_liquidity(&state, &mut ticks, 0, 1, Decimal::new(10_001, 0)).unwrap();
        // value 10001 token1 at price 1.0001 -> 10000 token0
        assert_eq!(delta.amount0, Decimal::new(10_000, 0));
        assert_eq!(delta.amount1, Decimal::ZERO);
    }

    #[test]
    fn add_at_active_splits_by_composition() {
        let (mut state, mut ticks) = setup(0);
        state.spreads[0].composition = Decimal::new(25, 2);
        let delta = update_liquidity(&state, &mut ticks, 0, 0, Decimal::new(1000, 0)).unwrap();
        assert_eq!(delta.amount0, Decimal::new(250, 0));
        assert_eq!(delta.amount1, Decimal::new(750, 0));
    }

    #[test]
    fn add_then_remove_round_trips() {
        let (mut state, mut ticks) = setup(3);
        state.spreads[1].composition = Decimal::new(4, 1);
        let before = state.clone();
        let liquidity = Decimal::new(123_456, 2);

        let added = update_liquidity(&state, &mut ticks, 1, 3, liquidity).unwrap();
        let removed = update_liquidity(&state, &mut ticks, 1, 3, -liquidity).unwrap();

        assert!(added.amount0 >= -removed.amount0);
        assert!(added.amount1 >= -removed.amount1);
        assert!(added.amount0 + removed.amount0 <= Decimal::new(1, 8));
        assert!(added.amount1 + removed.amount1 <= Decimal::new(1, 8));
        assert_eq!(state, before);
        assert!(ticks.tick(3).is_empty());
    }

    #[test]
    fn remove_more_than_present_underflows() {
        let (state, mut ticks) = setup(0);
        update_liquidity(&state, &mut ticks, 0, 0, Decimal::new(10, 0)).unwrap();
        let err = update_liquidity(&state, &mut ticks, 0, 0, Decimal::new(-11, 0)).unwrap_err();
        assert_eq!(err, StrikeswapError::ArithmeticUnderflow);
        assert_eq!(ticks.tick(0).liquidity[0], Decimal::new(10, 0));
    }

    #[test]
    fn spreads_are_independent() {
        let (state, mut ticks) = setup(0);
        update_liquidity(&state, &mut ticks, 0, 0, Decimal::new(10, 0)).unwrap();
        let err = update_liquidity(&state, &mut ticks, 1, 0, Decimal::new(-1, 0)).unwrap_err();
        assert_eq!(err, StrikeswapError::ArithmeticUnderflow);
    }

    #[test]
    fn rejects_bad_tier_tick_and_zero() {
        let (state, mut ticks) = setup(0);
        assert!(matches!(
            update_liquidity(&state, &mut ticks, 9, 0, Decimal::ONE).unwrap_err(),
            StrikeswapError::InvalidTierOrSpread(9)
        ));
        assert!(matches!(
            update_liquidity(&state, &mut ticks, 0, 900_000, Decimal::ONE).unwrap_err(),
            StrikeswapError::InvalidTick(900_000)
        ));
        assert!(matches!(
            update_liquidity(&state, &mut ticks, 0, 0, Decimal::ZERO).unwrap_err(),
            StrikeswapError::InvalidAmount { .. }
        ));
    }

    #[test]
    fn scaling_factor_multiplies_amounts() {
        let key = PairKey::new("A", "B", 2).unwrap();
        let state = PairState::initialize(&key, 0).unwrap();
        let mut ticks = BTreeMap::new();
        let delta = update_liquidity(&state, &mut ticks, 0, -1, Decimal::new(5, 0)).unwrap();
        assert_eq!(delta.amount1, Decimal::new(500, 0));
    }
}
