//! Per-pair re-entrancy lock.
//!
//! A pair is locked from the moment an operation first touches it until the
//! frame that touched it ends, whichever way it ends. A settlement callback
//! may call back into the engine, but never into a pair that is still
//! locked.

use strikeswap_types::{PairId, Result, StrikeswapError};

/// Two-state lock held by every stored pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PairLock {
    #[default]
    Unlocked,
    Locked,
}

impl PairLock {
    /// Take the lock.
    ///
    /// # Errors
    /// Returns [`StrikeswapError::Locked`] if it is already held.
    pub fn acquire(&mut self, pair: PairId) -> Result<()> {
        match self {
            Self::Unlocked => {
                *self = Self::Locked;
                Ok(())
            }
            Self::Locked => Err(StrikeswapError::Locked(pair)),
        }
    }

    pub fn release(&mut self) {
        *self = Self::Unlocked;
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        matches!(self, Self::Locked)
    }
}
