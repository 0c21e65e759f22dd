//! Borrowing liquidity out of a tick.
//!
//! Borrowed liquidity leaves the swappable pool and is tracked per tick and
//! spread in index-normalized units. The borrow index compounds once per
//! elapsed ledger time unit at the spread's rate, so a debt of `L` taken at
//! index `i0` is worth `L * i / i0` later. The index saturates at
//! `MAX_BORROW_INDEX`; past that point debt stops growing.

use rust_decimal::Decimal;
use strikeswap_types::constants::MAX_BORROW_INDEX;
use strikeswap_types::{PairDelta, Result, check_tick, spread_index};
use tracing::trace;

use crate::liquidity::update_liquidity;
use crate::math::{self, add, div, mul, sub};
use crate::pair::PairState;
use crate::tick::TickStore;

/// Bring the borrow index of `tier` at `tick` up to `now` and return it.
///
/// The index only grows while something is borrowed; time never runs
/// backwards for a tick.
///
/// # Errors
/// - `InvalidTierOrSpread` / `InvalidTick` on bad coordinates
pub fn accrue<T: TickStore>(
    ticks: &mut T,
    tier: u8,
    tick: i32,
    rate: Decimal,
    now: u64,
) -> Result<Decimal> {
    let tier = spread_index(tier)?;
    let index = check_tick(tick)?;
    let mut state = ticks.tick(index);

    let elapsed = now.saturating_sub(state.last_accrued[tier]);
    if elapsed == 0 {
        return Ok(state.borrow_index[tier]);
    }
    if !state.borrowed[tier].is_zero() && !rate.is_zero() {
        let cap = Decimal::from(MAX_BORROW_INDEX);
        let growth = math::pow_capped(add(Decimal::ONE, rate)?, elapsed, cap)?;
        state.borrow_index[tier] = mul(state.borrow_index[tier].min(cap), growth)?.min(cap);
        trace!(tick = index, tier, elapsed, index = %state.borrow_index[tier], "accrued");
    }
    state.last_accrued[tier] = now;
    ticks.set_tick(index, state);
    Ok(state.borrow_index[tier])
}

/// Borrow `liquidity` from `tier` at `tick`.
///
/// Returns the tokens released to the borrower (negative amounts) and the
/// borrow index the debt was taken at.
///
/// # Errors
/// - `InvalidAmount` if `liquidity` is not positive
/// - `ArithmeticUnderflow` if the tick lacks the swappable liquidity
pub fn borrow<T: TickStore>(
    state: &PairState,
    ticks: &mut T,
    tier: u8,
    tick: i32,
    liquidity: Decimal,
    rate: Decimal,
    now: u64,
) -> Result<(PairDelta, Decimal)> {
    math::require_positive(liquidity, "borrowed liquidity")?;
    let index = accrue(ticks, tier, tick, rate, now)?;
    let delta = update_liquidity(state, ticks, tier, tick, -liquidity)?;

    let slot = spread_index(tier)?;
    let mut tick_state = ticks.tick(tick);
    tick_state.borrowed[slot] = add(tick_state.borrowed[slot], div(liquidity, index)?)?;
    ticks.set_tick(tick, tick_state);
    Ok((delta, index))
}

/// Return `liquidity` to `tier` at `tick`.
///
/// Returns the tokens the repayer owes (positive amounts) and the borrow
/// index at repayment. Normalized debt is floored at zero, so repaying with
/// accrued interest never drives it negative.
///
/// # Errors
/// - `InvalidAmount` if `liquidity` is not positive
pub fn repay<T: TickStore>(
    state: &PairState,
    ticks: &mut T,
    tier: u8,
    tick: i32,
    liquidity: Decimal,
    rate: Decimal,
    now: u64,
) -> Result<(PairDelta, Decimal)> {
    math::require_positive(liquidity, "repaid liquidity")?;
    let index = accrue(ticks, tier, tick, rate, now)?;
    let delta = update_liquidity(state, ticks, tier, tick, liquidity)?;

    let slot = spread_index(tier)?;
    let mut tick_state = ticks.tick(tick);
    let remaining = sub(tick_state.borrowed[slot], div(liquidity, index)?)?;
    tick_state.borrowed[slot] = remaining.max(Decimal::ZERO);
    ticks.set_tick(tick, tick_state);
    Ok((delta, index))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use strikeswap_types::{PairKey, StrikeswapError};

    use super::*;
    use crate::tick::Tick;

    fn setup() -> (PairState, BTreeMap<i32, Tick>) {
        let state = PairState::initialize(&PairKey::dummy(), 0).unwrap();
        let mut ticks = BTreeMap::new();
        update_liquidity(&state, &mut ticks, 0, -1, Decimal::new(100, 0)).unwrap();
        (state, ticks)
    }

    fn rate() -> Decimal {
        Decimal::new(1, 2)
    }

    #[test]
    fn borrow_moves_liquidity_out_of_the_pool() {
        let (state, mut ticks) = setup();
        let (delta, index) =
            borrow(&state, &mut ticks, 0, -1, Decimal::new(40, 0), rate(), 0).unwrap();

        assert_eq!(index, Decimal::ONE);
        assert_eq!(delta.amount1, Decimal::new(-40, 0));
        let tick = ticks.tick(-1);
        assert_eq!(tick.liquidity[0], Decimal::new(60, 0));
        assert_eq!(tick.borrowed[0], Decimal::new(40, 0));
        assert_eq!(tick.gross_liquidity(), Decimal::new(100, 0));
    }

    #[test]
    fn borrow_beyond_available_fails() {
        let (state, mut ticks) = setup();
        let err =
            borrow(&state, &mut ticks, 0, -1, Decimal::new(101, 0), rate(), 0).unwrap_err();
        assert_eq!(err, StrikeswapError::ArithmeticUnderflow);
    }

    #[test]
    fn index_compounds_only_while_borrowed() {
        let (state, mut ticks) = setup();
        assert_eq!(accrue(&mut ticks, 0, -1, rate(), 10).unwrap(), Decimal::ONE);

        borrow(&state, &mut ticks, 0, -1, Decimal::new(10, 0), rate(), 10).unwrap();
        let index = accrue(&mut ticks, 0, -1, rate(), 12).unwrap();
        assert_eq!(index, Decimal::new(10_201, 4));

        // no elapsed time, no growth
        assert_eq!(accrue(&mut ticks, 0, -1, rate(), 12).unwrap(), index);
        // stale clock never rewinds
        assert_eq!(accrue(&mut ticks, 0, -1, rate(), 5).unwrap(), index);
        assert_eq!(ticks.tick(-1).last_accrued[0], 12);
    }

    #[test]
    fn repay_restores_liquidity_and_clears_debt() {
        let (state, mut ticks) = setup();
        borrow(&state, &mut ticks, 0, -1, Decimal::new(25, 0), rate(), 0).unwrap();
        let (delta, _) =
            repay(&state, &mut ticks, 0, -1, Decimal::new(25, 0), rate(), 0).unwrap();

        assert_eq!(delta.amount1, Decimal::new(25, 0));
        let tick = ticks.tick(-1);
        assert_eq!(tick.liquidity[0], Decimal::new(100, 0));
        assert!(tick.borrowed[0].is_zero());
    }

    #[test]
    fn repay_after_growth_covers_debt() {
        let (state, mut ticks) = setup();
        borrow(&state, &mut ticks, 0, -1, Decimal::new(10, 0), rate(), 0).unwrap();
        // 10 * 1.01 = 10.1 liquidity owed after one unit
        let (_, index) =
            repay(&state, &mut ticks, 0, -1, Decimal::new(101, 1), rate(), 1).unwrap();
        assert_eq!(index, Decimal::new(101, 2));
        assert!(ticks.tick(-1).borrowed[0].is_zero());
        assert_eq!(ticks.tick(-1).liquidity[0], Decimal::new(1001, 1));
    }

    #[test]
    fn index_saturates_and_debt_stays_repayable() {
        let (state, mut ticks) = setup();
        let rate = Decimal::new(1, 6);
        let cap = Decimal::from(MAX_BORROW_INDEX);
        borrow(&state, &mut ticks, 0, -1, Decimal::new(10, 0), rate, 0).unwrap();

        assert_eq!(accrue(&mut ticks, 0, -1, rate, 70_000_000).unwrap(), cap);
        assert_eq!(accrue(&mut ticks, 0, -1, rate, u64::MAX).unwrap(), cap);

        let owed = Decimal::new(10, 0) * cap;
        let (delta, index) = repay(&state, &mut ticks, 0, -1, owed, rate, u64::MAX).unwrap();
        assert_eq!(index, cap);
        assert_eq!(delta.amount1, owed);
        assert!(ticks.tick(-1).borrowed[0].is_zero());
        assert!(borrow(&state, &mut ticks, 0, -1, Decimal::ONE, rate, u64::MAX).is_ok());
    }

    #[test]
    fn zero_rate_never_grows() {
        let (state, mut ticks) = setup();
        borrow(&state, &mut ticks, 0, -1, Decimal::new(10, 0), Decimal::ZERO, 0).unwrap();
        assert_eq!(
            accrue(&mut ticks, 0, -1, Decimal::ZERO, 1_000).unwrap(),
            Decimal::ONE
        );
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        let (state, mut ticks) = setup();
        assert!(matches!(
            borrow(&state, &mut ticks, 0, -1, Decimal::ZERO, rate(), 0).unwrap_err(),
            StrikeswapError::InvalidAmount { .. }
        ));
        assert!(matches!(
            repay(&state, &mut ticks, 0, -1, Decimal::NEGATIVE_ONE, rate(), 0).unwrap_err(),
            StrikeswapError::InvalidAmount { .. }
        ));
    }
}
