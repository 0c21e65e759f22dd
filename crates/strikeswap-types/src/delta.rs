//! Signed asset deltas and the netting accumulator.
//!
//! Sign convention everywhere: positive = owed **by** the caller (the caller
//! pays in), negative = owed **to** the caller (the engine pays out).

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AssetId, PairKey, Result, StrikeswapError};

/// Signed amounts of both assets of one pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairDelta {
    pub amount0: Decimal,
    pub amount1: Decimal,
}

impl PairDelta {
    #[must_use]
    pub fn new(amount0: Decimal, amount1: Decimal) -> Self {
        Self { amount0, amount1 }
    }

    /// Flip the sign of both sides.
    #[must_use]
    pub fn negate(self) -> Self {
        Self {
            amount0: -self.amount0,
            amount1: -self.amount1,
        }
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.amount0.is_zero() && self.amount1.is_zero()
    }
}

/// Signed amount of a single asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDelta {
    pub asset: AssetId,
    pub amount: Decimal,
}

impl AssetDelta {
    #[must_use]
    pub fn new(asset: AssetId, amount: Decimal) -> Self {
        Self { asset, amount }
    }
}

/// Running per-asset net delta. Repeated references to an asset sum.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetDeltas(BTreeMap<AssetId, Decimal>);

impl NetDeltas {
    #[must_use]
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Add `amount` to the running total of `asset`.
    pub fn accumulate(&mut self, asset: &AssetId, amount: Decimal) -> Result<()> {
        let entry = self.0.entry(asset.clone()).or_insert(Decimal::ZERO);
        *entry = entry
            .checked_add(amount)
            .ok_or(StrikeswapError::ArithmeticOverflow)?;
        Ok(())
    }

    /// Fold a pair's delta in under the pair's two assets.
    pub fn add_pair(&mut self, key: &PairKey, delta: PairDelta) -> Result<()> {
        self.accumulate(key.token0(), delta.amount0)?;
        self.accumulate(key.token1(), delta.amount1)
    }

    /// Fold another accumulator in.
    pub fn merge(&mut self, other: &NetDeltas) -> Result<()> {
        for (asset, amount) in &other.0 {
            self.accumulate(asset, *amount)?;
        }
        Ok(())
    }

    /// Net amount for an asset (zero if never referenced).
    #[must_use]
    pub fn get(&self, asset: &AssetId) -> Decimal {
        self.0.get(asset).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AssetId, &Decimal)> {
        self.0.iter()
    }

    /// Every referenced asset, including those that netted to zero.
    #[must_use]
    pub fn to_vec(&self) -> Vec<AssetDelta> {
        self.0
            .iter()
            .map(|(asset, amount)| AssetDelta::new(asset.clone(), *amount))
            .collect()
    }

    /// Positive nets: what the caller must pay in.
    #[must_use]
    pub fn owed_by_caller(&self) -> Vec<AssetDelta> {
        self.0
            .iter()
            .filter(|(_, amount)| amount.is_sign_positive() && !amount.is_zero())
            .map(|(asset, amount)| AssetDelta::new(asset.clone(), *amount))
            .collect()
    }

    /// Negative nets, as positive magnitudes: what the engine pays out.
    #[must_use]
    pub fn owed_to_caller(&self) -> Vec<AssetDelta> {
        self.0
            .iter()
            .filter(|(_, amount)| amount.is_sign_negative() && !amount.is_zero())
            .map(|(asset, amount)| AssetDelta::new(asset.clone(), -*amount))
            .collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulate_sums_rather_than_overwrites() {
        let mut net = NetDeltas::new();
        let usdc = AssetId::new("USDC");
        net.accumulate(&usdc, Decimal::new(100, 0)).unwrap();
        net.accumulate(&usdc, Decimal::new(-30, 0)).unwrap();
        net.accumulate(&usdc, Decimal::new(5, 0)).unwrap();
        assert_eq!(net.get(&usdc), Decimal::new(75, 0));
        assert_eq!(net.len(), 1);
    }

    #[test]
    fn add_pair_routes_by_token() {
        let key = PairKey::dummy();
        let mut net = NetDeltas::new();
        net.add_pair(&key, PairDelta::new(Decimal::ONE, Decimal::new(-2, 0)))
            .unwrap();
        net.add_pair(&key, PairDelta::new(Decimal::ONE, Decimal::ZERO))
            .unwrap();
        assert_eq!(net.get(key.token0()), Decimal::new(2, 0));
        assert_eq!(net.get(key.token1()), Decimal::new(-2, 0));
    }

    #[test]
    fn owed_splits_by_sign() {
        let mut net = NetDeltas::new();
        net.accumulate(&"A".into(), Decimal::new(3, 0)).unwrap();
        net.accumulate(&"B".into(), Decimal::new(-4, 0)).unwrap();
        net.accumulate(&"C".into(), Decimal::ZERO).unwrap();

        let by = net.owed_by_caller();
        assert_eq!(by, vec![AssetDelta::new("A".into(), Decimal::new(3, 0))]);
        let to = net.owed_to_caller();
        assert_eq!(to, vec![AssetDelta::new("B".into(), Decimal::new(4, 0))]);
        assert_eq!(net.to_vec().len(), 3);
    }

    #[test]
    fn merge_matches_sequential_accumulation() {
        let mut a = NetDeltas::new();
        a.accumulate(&"A".into(), Decimal::new(1, 0)).unwrap();
        let mut b = NetDeltas::new();
        b.accumulate(&"A".into(), Decimal::new(2, 0)).unwrap();
        b.accumulate(&"B".into(), Decimal::new(-1, 0)).unwrap();
        a.merge(&b).unwrap();
        assert_eq!(a.get(&"A".into()), Decimal::new(3, 0));
        assert_eq!(a.get(&"B".into()), Decimal::new(-1, 0));
    }

    #[test]
    fn overflow_is_reported() {
        let mut net = NetDeltas::new();
        net.accumulate(&"A".into(), Decimal::MAX).unwrap();
        let err = net.accumulate(&"A".into(), Decimal::MAX).unwrap_err();
        assert_eq!(err, StrikeswapError::ArithmeticOverflow);
    }
}
