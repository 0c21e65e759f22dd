//! Replay guard for submitted batches.
//!
//! Each nonce can be consumed once. The guard remembers a bounded number of
//! nonces together with their batch deadlines. A nonce is forgotten only
//! once the engine clock has passed its deadline, because from then on the
//! batch is rejected as expired anyway. When every remembered batch can
//! still execute the guard refuses new nonces instead of evicting one.

use std::collections::{BTreeSet, HashMap};

use strikeswap_types::{Result, StrikeswapError};

/// Rejects batch nonces that were already consumed.
#[derive(Debug, Clone)]
pub struct NonceGuard {
    /// Nonce to batch deadline.
    used: HashMap<u64, u64>,
    /// `(deadline, nonce)`, earliest deadline first.
    expiries: BTreeSet<(u64, u64)>,
    max_size: usize,
}

impl NonceGuard {
    /// Create a guard remembering at most `max_size` nonces.
    ///
    /// # Errors
    /// `Configuration` if `max_size` is zero.
    pub fn new(max_size: usize) -> Result<Self> {
        if max_size == 0 {
            return Err(StrikeswapError::Configuration(
                "nonce cache size must be > 0".into(),
            ));
        }
        Ok(Self {
            used: HashMap::with_capacity(max_size.min(4096)),
            expiries: BTreeSet::new(),
            max_size,
        })
    }

    /// Fail if `nonce` was already consumed.
    ///
    /// # Errors
    /// [`StrikeswapError::NonceReused`].
    pub fn check(&self, nonce: u64) -> Result<()> {
        if self.used.contains_key(&nonce) {
            return Err(StrikeswapError::NonceReused(nonce));
        }
        Ok(())
    }

    /// Forget nonces whose deadline is before `now`, then check that
    /// `nonce` is fresh and that there is room to remember it.
    ///
    /// # Errors
    /// - [`StrikeswapError::NonceReused`] if it was already consumed
    /// - [`StrikeswapError::NonceCacheFull`] if no remembered batch has
    ///   expired yet
    pub fn admit(&mut self, nonce: u64, now: u64) -> Result<()> {
        self.check(nonce)?;
        self.prune(now);
        if self.used.len() >= self.max_size {
            return Err(StrikeswapError::NonceCacheFull {
                capacity: self.max_size,
            });
        }
        Ok(())
    }

    /// Consume `nonce` for a batch valid until `deadline`.
    ///
    /// # Errors
    /// Same as [`NonceGuard::admit`].
    pub fn mark_used(&mut self, nonce: u64, deadline: u64, now: u64) -> Result<()> {
        self.admit(nonce, now)?;
        self.used.insert(nonce, deadline);
        self.expiries.insert((deadline, nonce));
        Ok(())
    }

    fn prune(&mut self, now: u64) {
        while let Some(&(deadline, nonce)) = self.expiries.first() {
            if deadline >= now {
                break;
            }
            self.expiries.pop_first();
            self.used.remove(&nonce);
        }
    }

    #[must_use]
    pub fn is_used(&self, nonce: u64) -> bool {
        self.used.contains_key(&nonce)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.used.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }
}
