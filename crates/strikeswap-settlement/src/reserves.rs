//! Reserve audit.
//!
//! ```text
//! ∀ asset: held(asset) >= Σ withdrawal value of tick liquidity
//!                         + retained fees + posted collateral
//! ```
//!
//! The audit prices every tick at what a withdrawal would pay out right
//! now. If the engine's holdings ever fall below that, something has paid
//! out more than it took in.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use strikeswap_curve::{Rounding, amounts_for_liquidity, math};
use strikeswap_types::{AssetId, PositionKind, Result, StrikeswapError, constants::NUM_SPREADS};
use tracing::error;

use crate::assets::AssetTransferService;
use crate::engine::Engine;

/// Computes and checks what the engine owes per asset.
pub struct ReserveAudit;

impl ReserveAudit {
    /// Liabilities per asset.
    pub fn required<S: AssetTransferService>(engine: &Engine<S>) -> Result<BTreeMap<AssetId, Decimal>> {
        let mut required: BTreeMap<AssetId, Decimal> = BTreeMap::new();
        let mut owe = |asset: &AssetId, amount: Decimal| -> Result<()> {
            let entry = required.entry(asset.clone()).or_insert(Decimal::ZERO);
            *entry = math::add(*entry, amount)?;
            Ok(())
        };

        for pair in engine.pairs() {
            let state = pair.state();
            for (index, tick) in pair.ticks() {
                for tier in 0..NUM_SPREADS {
                    let liquidity = tick.liquidity[tier];
                    if liquidity.is_zero() {
                        continue;
                    }
                    let (amount0, amount1) =
                        amounts_for_liquidity(state, tier, *index, liquidity, Rounding::Down)?;
                    owe(pair.key().token0(), amount0)?;
                    owe(pair.key().token1(), amount1)?;
                }
            }
            owe(pair.key().token0(), state.fees0)?;
            owe(pair.key().token1(), state.fees1)?;
        }

        for (_, position) in engine.ledger().iter() {
            if position.descriptor.kind == PositionKind::Collateral {
                owe(position.descriptor.pair.token1(), position.balance)?;
            }
        }

        Ok(required
            .into_iter()
            .map(|(asset, amount)| (asset, math::round_down(amount)))
            .collect())
    }

    /// Check that holdings cover liabilities for every asset.
    ///
    /// # Errors
    /// [`StrikeswapError::ReserveShortfall`] for the first uncovered asset.
    pub fn verify<S: AssetTransferService>(engine: &Engine<S>) -> Result<()> {
        for (asset, required) in Self::required(engine)? {
            let held = engine.assets().balance(&asset);
            if held < required {
                error!(asset = %asset, required = %required, held = %held, "reserve shortfall");
                return Err(StrikeswapError::ReserveShortfall {
                    asset,
                    required,
                    held,
                });
            }
        }
        Ok(())
    }
}
