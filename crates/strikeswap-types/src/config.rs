//! Engine configuration.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Result, StrikeswapError, constants};

/// Runtime configuration shared by the engine and the router's simulator.
///
/// Both sides must run the same configuration, otherwise simulated deltas
/// drift from what the ledger realizes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Quote spread per tier, in basis points. A tier quotes a bid of
    /// `p * (1 - s)` and an ask of `p / (1 - s)` around its strike price.
    pub spreads_bps: [u32; constants::NUM_SPREADS],
    /// Borrow rate per tier, parts-per-billion per ledger second.
    pub borrow_rate_ppb: [u32; constants::NUM_SPREADS],
    /// Number of batch nonces the router remembers before evicting the oldest.
    pub nonce_cache_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            spreads_bps: [1, 5, 30, 100, 500],
            borrow_rate_ppb: [10, 50, 100, 300, 1_000],
            nonce_cache_size: constants::DEFAULT_NONCE_CACHE_SIZE,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json(document: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(document)
            .map_err(|e| StrikeswapError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if let Some(bps) = self
            .spreads_bps
            .iter()
            .find(|bps| **bps >= constants::BPS_DENOMINATOR)
        {
            return Err(StrikeswapError::Configuration(format!(
                "spread of {bps} bps must be below {}",
                constants::BPS_DENOMINATOR
            )));
        }
        if self.nonce_cache_size == 0 {
            return Err(StrikeswapError::Configuration(
                "nonce_cache_size must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Spread of a tier as a fraction.
    #[must_use]
    pub fn spread(&self, tier: usize) -> Decimal {
        Decimal::from(self.spreads_bps[tier]) / Decimal::from(constants::BPS_DENOMINATOR)
    }

    /// Borrow rate of a tier as a fraction per ledger second.
    #[must_use]
    pub fn borrow_rate(&self, tier: usize) -> Decimal {
        Decimal::from(self.borrow_rate_ppb[tier]) / Decimal::from(constants::PPB_DENOMINATOR)
    }
}
