//! Per-pair curve state.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strikeswap_types::{PairKey, Result, check_tick, constants::NUM_SPREADS, spread_index};

use crate::math;

/// Active tick and composition of one spread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpreadState {
    /// The spread's active tick.
    pub tick: i32,
    /// Fraction of the active tick's value held in token0, in `[0, 1]`.
    pub composition: Decimal,
}

/// Curve state of a pair, excluding its ticks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairState {
    pub spreads: [SpreadState; NUM_SPREADS],
    /// Signed tick at which the most recent swap step executed; starts at
    /// the initial tick.
    pub offset: i32,
    /// Token1 value of one unit of liquidity (`10^scaling_factor`).
    pub scale: Decimal,
    /// Spread fees retained by the pair, token0.
    pub fees0: Decimal,
    /// Spread fees retained by the pair, token1.
    pub fees1: Decimal,
}

impl PairState {
    /// Fresh state with every spread active at `initial_tick`, composition 0.
    ///
    /// # Errors
    /// - `InvalidTick` if `initial_tick` is out of range
    /// - `ArithmeticOverflow` if the scale cannot be represented
    pub fn initialize(key: &PairKey, initial_tick: i32) -> Result<Self> {
        let tick = check_tick(initial_tick)?;
        Ok(Self {
            spreads: [SpreadState {
                tick,
                composition: Decimal::ZERO,
            }; NUM_SPREADS],
            offset: tick,
            scale: math::scale_for(key.scaling_factor())?,
            fees0: Decimal::ZERO,
            fees1: Decimal::ZERO,
        })
    }

    /// Validated access to one spread.
    pub fn spread(&self, tier: u8) -> Result<&SpreadState> {
        Ok(&self.spreads[spread_index(tier)?])
    }

    /// Active ticks of all spreads, in tier order.
    #[must_use]
    pub fn active_ticks(&self) -> [i32; NUM_SPREADS] {
        self.spreads.map(|s| s.tick)
    }
}

#[cfg(test)]
mod tests {
    use strikeswap_types::StrikeswapError;

    use super::*;

    #[test]
    fn initialize_sets_every_spread() {
        let state = PairState::initialize(&PairKey::dummy(), -12).unwrap();
        assert_eq!(state.active_ticks(), [-12; NUM_SPREADS]);
        assert!(state.spreads.iter().all(|s| s.composition.is_zero()));
        assert_eq!(state.offset, -12);
        assert_eq!(state.scale, Decimal::ONE);
    }

    #[test]
    fn initialize_applies_scaling_factor() {
        let key = PairKey::new("A", "B", 3).unwrap();
        let state = PairState::initialize(&key, 0).unwrap();
        assert_eq!(state.scale, Decimal::new(1000, 0));
    }

    #[test]
    fn initialize_rejects_out_of_range_tick() {
        let err = PairState::initialize(&PairKey::dummy(), i32::MAX).unwrap_err();
        assert!(matches!(err, StrikeswapError::InvalidTick(_)));
    }

    #[test]
    fn spread_validates_tier() {
        let state = PairState::initialize(&PairKey::dummy(), 0).unwrap();
        assert!(state.spread(0).is_ok());
        assert!(matches!(
            state.spread(200).unwrap_err(),
            StrikeswapError::InvalidTierOrSpread(200)
        ));
    }
}
