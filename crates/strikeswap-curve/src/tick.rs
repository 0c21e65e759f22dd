//! Per-tick state and the storage seam the curve walks through.

use std::collections::BTreeMap;
use std::ops::Bound;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strikeswap_types::constants::NUM_SPREADS;

/// State of a single tick/strike, one slot per spread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tick {
    /// Liquidity available to swaps, withdrawals and new borrows.
    pub liquidity: [Decimal; NUM_SPREADS],
    /// Outstanding debt in index-normalized units (`principal / index`).
    pub borrowed: [Decimal; NUM_SPREADS],
    /// Multiplicative growth of borrowed liquidity; starts at 1.
    pub borrow_index: [Decimal; NUM_SPREADS],
    /// Ledger time of the last accrual.
    pub last_accrued: [u64; NUM_SPREADS],
}

impl Default for Tick {
    fn default() -> Self {
        Self {
            liquidity: [Decimal::ZERO; NUM_SPREADS],
            borrowed: [Decimal::ZERO; NUM_SPREADS],
            borrow_index: [Decimal::ONE; NUM_SPREADS],
            last_accrued: [0; NUM_SPREADS],
        }
    }
}

impl Tick {
    /// Whether `tier` has swappable liquidity here.
    #[must_use]
    pub fn has_liquidity(&self, tier: usize) -> bool {
        self.liquidity[tier] > Decimal::ZERO
    }

    /// Swappable plus normalized borrowed liquidity, summed over spreads.
    /// Swaps never change it.
    #[must_use]
    pub fn gross_liquidity(&self) -> Decimal {
        self.liquidity.iter().chain(self.borrowed.iter()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.gross_liquidity().is_zero()
    }
}

/// Tick storage as seen by the curve.
///
/// `tick` returns a copy (default state for untouched ticks); writes go back
/// through `set_tick`.
pub trait TickStore {
    fn tick(&mut self, index: i32) -> Tick;

    fn set_tick(&mut self, index: i32, tick: Tick);

    /// Nearest tick strictly beyond `from` in the walk direction at which
    /// `tier` has swappable liquidity.
    fn next_initialized(&mut self, tier: usize, from: i32, upward: bool) -> Option<i32>;
}

impl TickStore for BTreeMap<i32, Tick> {
    fn tick(&mut self, index: i32) -> Tick {
        self.get(&index).copied().unwrap_or_default()
    }

    fn set_tick(&mut self, index: i32, tick: Tick) {
        self.insert(index, tick);
    }

    fn next_initialized(&mut self, tier: usize, from: i32, upward: bool) -> Option<i32> {
        if upward {
            self.range((Bound::Excluded(from), Bound::Unbounded))
                .find(|(_, t)| t.has_liquidity(tier))
                .map(|(index, _)| *index)
        } else {
            self.range(..from)
                .rev()
                .find(|(_, t)| t.has_liquidity(tier))
                .map(|(index, _)| *index)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_liquidity(tier: usize, amount: i64) -> Tick {
        let mut tick = Tick::default();
        tick.liquidity[tier] = Decimal::new(amount, 0);
        tick
    }

    #[test]
    fn default_tick_is_empty_with_unit_index() {
        let tick = Tick::default();
        assert!(tick.is_empty());
        assert!(tick.borrow_index.iter().all(|i| *i == Decimal::ONE));
    }

    #[test]
    fn gross_liquidity_sums_all_spreads() {
        let mut tick = with_liquidity(0, 10);
        tick.liquidity[3] = Decimal::new(5, 0);
        tick.borrowed[1] = Decimal::new(2, 0);
        assert_eq!(tick.gross_liquidity(), Decimal::new(17, 0));
    }

    #[test]
    fn next_initialized_respects_direction_and_tier() {
        let mut ticks = BTreeMap::new();
        ticks.set_tick(-10, with_liquidity(0, 1));
        ticks.set_tick(-5, with_liquidity(1, 1));
        ticks.set_tick(0, with_liquidity(0, 1));
        ticks.set_tick(7, with_liquidity(0, 1));

        assert_eq!(ticks.next_initialized(0, 0, true), Some(7));
        assert_eq!(ticks.next_initialized(0, 0, false), Some(-10));
        assert_eq!(ticks.next_initialized(1, 0, false), Some(-5));
        assert_eq!(ticks.next_initialized(1, -5, false), None);
        assert_eq!(ticks.next_initialized(0, 7, true), None);
    }

    #[test]
    fn next_initialized_skips_drained_ticks() {
        let mut ticks = BTreeMap::new();
        ticks.set_tick(3, Tick::default());
        ticks.set_tick(9, with_liquidity(2, 4));
        assert_eq!(ticks.next_initialized(2, 0, true), Some(9));
    }

    #[test]
    fn untouched_tick_reads_as_default() {
        let mut ticks: BTreeMap<i32, Tick> = BTreeMap::new();
        assert_eq!(ticks.tick(42), Tick::default());
    }
}
