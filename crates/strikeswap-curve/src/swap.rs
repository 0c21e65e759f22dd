//! The swap walk.
//!
//! A swap repeatedly takes the best quote across all spreads: the highest
//! bid `p * (1 - s)` when the price moves down (token0 in), the lowest ask
//! `p / (1 - s)` when it moves up (token1 in). Each step consumes one
//! spread at one tick. A spread whose active tick is drained advances to its
//! next tick holding liquidity in the walk direction, entering at
//! composition 0 (moving down, the tick holds only token1) or 1 (moving up,
//! only token0). Active ticks never move against the walk direction.
//!
//! The spread fee is taken from the input and retained by the pair.

use rust_decimal::Decimal;
use strikeswap_types::{EngineConfig, PairDelta, Result, StrikeswapError, constants::NUM_SPREADS};
use tracing::debug;

use crate::math::{self, add, div, mul, sub};
use crate::pair::{PairState, SpreadState};
use crate::tick::TickStore;

/// Best quote found for the next step.
#[derive(Debug, Clone, Copy)]
struct Quote {
    tier: usize,
    tick: i32,
    /// The spread must first move its active tick here.
    enters: bool,
    price: Decimal,
    effective: Decimal,
}

/// Result of consuming one spread at one tick.
#[derive(Debug, Clone, Copy)]
struct Step {
    amount_in: Decimal,
    amount_out: Decimal,
    fee: Decimal,
    exhausted: bool,
}

/// Execute a swap against the curve.
///
/// `amount_desired > 0` is an exact input of the token named by
/// `is_token0`; `amount_desired < 0` is an exact output. The price moves down
/// when token0 is the input, up when token1 is.
///
/// Returns the realized signed amounts: positive = owed by the caller,
/// negative = owed to the caller. The walk stops when the amount is used up
/// or when no spread has liquidity left in the walk direction.
///
/// # Errors
/// - `InvalidAmount` if `amount_desired` rounds to zero
/// - `ArithmeticOverflow` if any intermediate amount is unrepresentable
pub fn swap<T: TickStore>(
    state: &mut PairState,
    ticks: &mut T,
    config: &EngineConfig,
    is_token0: bool,
    amount_desired: Decimal,
) -> Result<PairDelta> {
    let requested = math::round_down(amount_desired.abs());
    if requested.is_zero() {
        return Err(StrikeswapError::InvalidAmount {
            reason: format!("swap amount {amount_desired} rounds to zero"),
        });
    }
    let exact_in = amount_desired > Decimal::ZERO;
    let downward = is_token0 == exact_in;

    let mut remaining = requested;
    let mut total_in = Decimal::ZERO;
    let mut total_out = Decimal::ZERO;

    while remaining > Decimal::ZERO {
        let Some(quote) = best_quote(state, ticks, config, downward)? else {
            debug!(remaining = %remaining, "swap walk reached the edge of liquidity");
            break;
        };
        if quote.enters {
            state.spreads[quote.tier] = SpreadState {
                tick: quote.tick,
                composition: if downward { Decimal::ZERO } else { Decimal::ONE },
            };
        }

        let step = execute_step(state, ticks, config, &quote, downward, exact_in, remaining)?;
        debug!(
            tier = quote.tier,
            tick = quote.tick,
            amount_in = %step.amount_in,
            amount_out = %step.amount_out,
            exhausted = step.exhausted,
            "swap step"
        );

        total_in = add(total_in, step.amount_in)?;
        total_out = add(total_out, step.amount_out)?;
        if downward {
            state.fees0 = add(state.fees0, step.fee)?;
        } else {
            state.fees1 = add(state.fees1, step.fee)?;
        }
        state.offset = quote.tick;

        let consumed = if exact_in { step.amount_in } else { step.amount_out };
        remaining = sub(remaining, consumed)?.max(Decimal::ZERO);
    }

    Ok(if downward {
        PairDelta::new(total_in, -total_out)
    } else {
        PairDelta::new(-total_out, total_in)
    })
}

/// Output still available from `tier` at its active tick, unrounded.
fn available_out(
    state: &PairState,
    value: Decimal,
    tier: usize,
    price: Decimal,
    downward: bool,
) -> Result<Decimal> {
    let composition = state.spreads[tier].composition;
    if downward {
        mul(sub(Decimal::ONE, composition)?, value)
    } else {
        div(mul(composition, value)?, price)
    }
}

fn best_quote<T: TickStore>(
    state: &PairState,
    ticks: &mut T,
    config: &EngineConfig,
    downward: bool,
) -> Result<Option<Quote>> {
    let mut best: Option<Quote> = None;
    for tier in 0..NUM_SPREADS {
        let active = state.spreads[tier].tick;
        let active_state = ticks.tick(active);

        let mut candidate = None;
        if active_state.has_liquidity(tier) {
            let value = mul(active_state.liquidity[tier], state.scale)?;
            let price = math::price_at_tick(active)?;
            if available_out(state, value, tier, price, downward)? > Decimal::ZERO {
                candidate = Some((active, false, price));
            }
        }
        if candidate.is_none() {
            if let Some(next) = ticks.next_initialized(tier, active, !downward) {
                candidate = Some((next, true, math::price_at_tick(next)?));
            }
        }
        let Some((tick, enters, price)) = candidate else {
            continue;
        };

        let keep = sub(Decimal::ONE, config.spread(tier))?;
        let effective = if downward {
            mul(price, keep)?
        } else {
            div(price, keep)?
        };
        let better = match &best {
            None => true,
            Some(current) if downward => effective > current.effective,
            Some(current) => effective < current.effective,
        };
        if better {
            best = Some(Quote {
                tier,
                tick,
                enters,
                price,
                effective,
            });
        }
    }
    Ok(best)
}

fn execute_step<T: TickStore>(
    state: &mut PairState,
    ticks: &mut T,
    config: &EngineConfig,
    quote: &Quote,
    downward: bool,
    exact_in: bool,
    remaining: Decimal,
) -> Result<Step> {
    let tier = quote.tier;
    let price = quote.price;
    let value = mul(ticks.tick(quote.tick).liquidity[tier], state.scale)?;
    let available = available_out(state, value, tier, price, downward)?;
    let keep = sub(Decimal::ONE, config.spread(tier))?;

    // net input <-> output at the strike price
    let to_out = |net: Decimal| if downward { mul(net, price) } else { div(net, price) };
    let to_net = |out: Decimal| if downward { div(out, price) } else { mul(out, price) };

    let (amount_in, amount_out, net, exhausted) = if exact_in {
        let net = mul(remaining, keep)?;
        let full_out = to_out(net)?;
        if full_out < available {
            (remaining, math::round_down(full_out), net, false)
        } else {
            let net = to_net(available)?;
            let gross = math::round_up(div(net, keep)?).min(remaining);
            (gross, math::round_down(available), net, true)
        }
    } else if remaining < available {
        let net = to_net(remaining)?;
        (math::round_up(div(net, keep)?), remaining, net, false)
    } else {
        let net = to_net(available)?;
        (
            math::round_up(div(net, keep)?),
            math::round_down(available),
            net,
            true,
        )
    };

    let spread = &mut state.spreads[tier];
    let composition = if exhausted {
        if downward { Decimal::ONE } else { Decimal::ZERO }
    } else if downward {
        add(spread.composition, div(amount_out, value)?)?
    } else {
        sub(spread.composition, div(mul(amount_out, price)?, value)?)?
    };
    spread.composition = composition.clamp(Decimal::ZERO, Decimal::ONE);

    Ok(Step {
        amount_in,
        amount_out,
        fee: sub(amount_in, net)?.max(Decimal::ZERO),
        exhausted,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use strikeswap_types::PairKey;

    use super::*;
    use crate::liquidity::update_liquidity;
    use crate::tick::Tick;

    fn setup() -> (PairState, BTreeMap<i32, Tick>, EngineConfig) {
        (
            PairState::initialize(&PairKey::dummy(), 0).unwrap(),
            BTreeMap::new(),
            EngineConfig::default(),
        )
    }

    fn provide(state: &PairState, ticks: &mut BTreeMap<i32, Tick>, tier: u8, tick: i32, l: i64) {
        update_liquidity(state, ticks, tier, tick, Decimal::new(l, 0)).unwrap();
    }

    #[test]
    fn exact_in_token0_within_one_tick() {
        let (mut state, mut ticks, config) = setup();
        provide(&state, &mut ticks, 0, 0, 1000);

        let delta = swap(&mut state, &mut ticks, &config, true, Decimal::new(100, 0)).unwrap();

        // 1 bp spread: 100 * 0.9999 at price 1
        assert_eq!(delta.amount0, Decimal::new(100, 0));
        assert_eq!(delta.amount1, Decimal::new(-9999, 2));
        assert_eq!(state.spreads[0].tick, 0);
        assert_eq!(state.spreads[0].composition, Decimal::new(9999, 5));
        assert_eq!(state.fees0, Decimal::new(1, 2));
    }

    #[test]
    fn exact_out_charges_grossed_up_input() {
        let (mut state, mut ticks, config) = setup();
        provide(&state, &mut ticks, 0, 0, 1000);

        let delta = swap(&mut state, &mut ticks, &config, false, Decimal::new(-9999, 2)).unwrap();

        assert_eq!(delta.amount1, Decimal::new(-9999, 2));
        assert_eq!(delta.amount0, Decimal::new(100, 0));
    }

    #[test]
    fn walk_crosses_ticks_downward() {
        let (mut state, mut ticks, config) = setup();
        provide(&state, &mut ticks, 0, 0, 10);
        provide(&state, &mut ticks, 0, -5, 10);
        provide(&state, &mut ticks, 0, -9, 10);

        let delta = swap(&mut state, &mut ticks, &config, true, Decimal::new(15, 0)).unwrap();

        assert_eq!(delta.amount0, Decimal::new(15, 0));
        assert!(delta.amount1 < Decimal::ZERO);
        assert_eq!(state.spreads[0].tick, -5);
        assert!(state.spreads[0].composition > Decimal::ZERO);
        assert!(state.spreads[0].composition < Decimal::ONE);
        assert_eq!(state.offset, -5);
    }

    #[test]
    fn walk_stops_at_edge_of_liquidity() {
        let (mut state, mut ticks, config) = setup();
        provide(&state, &mut ticks, 0, 0, 10);

        let delta = swap(&mut state, &mut ticks, &config, true, Decimal::new(1_000, 0)).unwrap();

        assert_eq!(delta.amount1, Decimal::new(-10, 0));
        assert!(delta.amount0 < Decimal::new(1_000, 0));
        assert_eq!(state.spreads[0].composition, Decimal::ONE);
    }

    #[test]
    fn upward_walk_enters_at_full_token0() {
        let (mut state, mut ticks, config) = setup();
        provide(&state, &mut ticks, 0, 4, 100);

        let delta = swap(&mut state, &mut ticks, &config, false, Decimal::new(10, 0)).unwrap();

        assert_eq!(state.spreads[0].tick, 4);
        assert!(state.spreads[0].composition < Decimal::ONE);
        assert_eq!(delta.amount1, Decimal::new(10, 0));
        assert!(delta.amount0 < Decimal::ZERO);
    }

    #[test]
    fn cheaper_spread_fills_first() {
        let (mut state, mut ticks, config) = setup();
        provide(&state, &mut ticks, 3, 0, 1000);
        provide(&state, &mut ticks, 0, 0, 1000);

        swap(&mut state, &mut ticks, &config, true, Decimal::new(10, 0)).unwrap();

        assert!(state.spreads[0].composition > Decimal::ZERO);
        assert!(state.spreads[3].composition.is_zero());
    }

    #[test]
    fn better_strike_beats_cheaper_spread() {
        let (mut state, mut ticks, config) = setup();
        // 1 bp ten ticks down quotes below 5 bp at the current tick
        provide(&state, &mut ticks, 0, -10, 1000);
        provide(&state, &mut ticks, 1, 0, 1000);

        swap(&mut state, &mut ticks, &config, true, Decimal::new(5, 0)).unwrap();

        assert!(state.spreads[1].composition > Decimal::ZERO);
        assert_eq!(state.spreads[0].tick, 0);
    }

    #[test]
    fn active_ticks_move_monotonically() {
        let (mut state, mut ticks, config) = setup();
        for tick in [-30, -20, -10, 0] {
            provide(&state, &mut ticks, 0, tick, 5);
            provide(&state, &mut ticks, 2, tick, 5);
        }
        let mut last = state.active_ticks();
        for _ in 0..8 {
            swap(&mut state, &mut ticks, &config, true, Decimal::new(3, 0)).unwrap();
            let now = state.active_ticks();
            for tier in 0..NUM_SPREADS {
                assert!(now[tier] <= last[tier], "tier {tier} moved up");
            }
            last = now;
        }
    }

    #[test]
    fn round_trip_keeps_gross_liquidity() {
        let (mut state, mut ticks, config) = setup();
        for tick in [-2, -1, 0, 1, 2] {
            provide(&state, &mut ticks, 0, tick, 50);
            provide(&state, &mut ticks, 1, tick, 20);
        }
        let gross: Vec<Decimal> = (-2..=2).map(|t| ticks.tick(t).gross_liquidity()).collect();

        for i in 0..6 {
            let is_token0 = i % 2 == 0;
            swap(&mut state, &mut ticks, &config, is_token0, Decimal::new(40, 0)).unwrap();
        }

        let after: Vec<Decimal> = (-2..=2).map(|t| ticks.tick(t).gross_liquidity()).collect();
        assert_eq!(gross, after);
    }

    #[test]
    fn empty_curve_swaps_nothing() {
        let (mut state, mut ticks, config) = setup();
        let delta = swap(&mut state, &mut ticks, &config, true, Decimal::ONE).unwrap();
        assert!(delta.is_zero());
        assert_eq!(state.active_ticks(), [0; NUM_SPREADS]);
    }

    #[test]
    fn dust_amount_is_rejected() {
        let (mut state, mut ticks, config) = setup();
        let err = swap(&mut state, &mut ticks, &config, true, Decimal::new(1, 10)).unwrap_err();
        assert!(matches!(err, StrikeswapError::InvalidAmount { .. }));
        let err = swap(&mut state, &mut ticks, &config, true, Decimal::ZERO).unwrap_err();
        assert!(matches!(err, StrikeswapError::InvalidAmount { .. }));
    }
}
