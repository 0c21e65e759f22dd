//! Identifiers used throughout strikeswap.
//!
//! Account IDs use UUIDv7 for time-ordered sorting. Pair and position
//! identities are SHA-256 digests of their ordered logical identity, so two
//! lookups built from the same fields always land on the same record.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{Result, StrikeswapError, constants};

// ---------------------------------------------------------------------------
// AccountId
// ---------------------------------------------------------------------------

/// Identifier for a caller / position owner / transfer recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct AccountId(pub Uuid);

impl AccountId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// AssetId
// ---------------------------------------------------------------------------

/// Asset identifier (e.g. "WETH", "USDC"). Ordering is lexicographic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub String);

impl AssetId {
    #[must_use]
    pub fn new(symbol: impl Into<String>) -> Self {
        Self(symbol.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AssetId {
    fn from(symbol: &str) -> Self {
        Self::new(symbol)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// PairKey / PairId
// ---------------------------------------------------------------------------

/// Ordered identity of a pair: `token0 < token1` plus a scaling factor.
///
/// The only way to obtain a `PairKey` (including deserialization) goes
/// through [`PairKey::new`], so a stored key always satisfies the ordering
/// invariant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "PairKeyRepr", into = "PairKeyRepr")]
pub struct PairKey {
    token0: AssetId,
    token1: AssetId,
    scaling_factor: u8,
}

#[derive(Serialize, Deserialize)]
struct PairKeyRepr {
    token0: AssetId,
    token1: AssetId,
    scaling_factor: u8,
}

impl TryFrom<PairKeyRepr> for PairKey {
    type Error = StrikeswapError;

    fn try_from(repr: PairKeyRepr) -> Result<Self> {
        Self::new(repr.token0, repr.token1, repr.scaling_factor)
    }
}

impl From<PairKey> for PairKeyRepr {
    fn from(key: PairKey) -> Self {
        Self {
            token0: key.token0,
            token1: key.token1,
            scaling_factor: key.scaling_factor,
        }
    }
}

impl PairKey {
    /// Build a pair identity.
    ///
    /// # Errors
    /// - `InvalidTokenOrder` if either token is empty or `token0 >= token1`
    /// - `InvalidScalingFactor` if `scaling_factor > MAX_SCALING_FACTOR`
    pub fn new(
        token0: impl Into<AssetId>,
        token1: impl Into<AssetId>,
        scaling_factor: u8,
    ) -> Result<Self> {
        let token0 = token0.into();
        let token1 = token1.into();
        if token0.0.is_empty() || token1.0.is_empty() || token0 >= token1 {
            return Err(StrikeswapError::InvalidTokenOrder {
                token0: token0.0,
                token1: token1.0,
            });
        }
        if scaling_factor > constants::MAX_SCALING_FACTOR {
            return Err(StrikeswapError::InvalidScalingFactor(scaling_factor));
        }
        Ok(Self {
            token0,
            token1,
            scaling_factor,
        })
    }

    #[must_use]
    pub fn token0(&self) -> &AssetId {
        &self.token0
    }

    #[must_use]
    pub fn token1(&self) -> &AssetId {
        &self.token1
    }

    #[must_use]
    pub fn scaling_factor(&self) -> u8 {
        self.scaling_factor
    }

    /// Token for one side of the pair.
    #[must_use]
    pub fn token(&self, is_token0: bool) -> &AssetId {
        if is_token0 { &self.token0 } else { &self.token1 }
    }

    /// Storage address of this pair.
    #[must_use]
    pub fn id(&self) -> PairId {
        let mut hasher = Sha256::new();
        hasher.update(b"strikeswap:pair:v1:");
        hash_identity(&mut hasher, self);
        PairId(hasher.finalize().into())
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.token0, self.token1, self.scaling_factor)
    }
}

/// Hash of a pair's ordered identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct PairId(pub [u8; 32]);

impl PairId {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for PairId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pair:{}", hex::encode(&self.0[..8]))
    }
}

/// Validate a caller-supplied tier/spread index.
///
/// # Errors
/// Returns `InvalidTierOrSpread` when `tier >= MAX_TIERS`.
pub fn spread_index(tier: u8) -> Result<usize> {
    let index = usize::from(tier);
    if index >= constants::MAX_TIERS {
        return Err(StrikeswapError::InvalidTierOrSpread(tier));
    }
    Ok(index)
}

/// Validate a caller-supplied tick.
///
/// # Errors
/// Returns `InvalidTick` outside `MIN_TICK..=MAX_TICK`.
pub fn check_tick(tick: i32) -> Result<i32> {
    if !(constants::MIN_TICK..=constants::MAX_TICK).contains(&tick) {
        return Err(StrikeswapError::InvalidTick(tick));
    }
    Ok(tick)
}

// ---------------------------------------------------------------------------
// Positions
// ---------------------------------------------------------------------------

/// What a position balance represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionKind {
    /// Liquidity supplied at a tick/spread.
    Liquidity,
    /// Liquidity borrowed from a tick/spread, grown by the borrow index.
    Debt,
    /// Token1 posted against a debt position.
    Collateral,
}

impl PositionKind {
    fn tag(self) -> u8 {
        match self {
            Self::Liquidity => 0,
            Self::Debt => 1,
            Self::Collateral => 2,
        }
    }
}

/// Logical identity of a position, independent of its owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PositionDescriptor {
    pub pair: PairKey,
    pub tick: i32,
    pub tier: u8,
    pub kind: PositionKind,
}

impl PositionDescriptor {
    #[must_use]
    pub fn new(pair: PairKey, tick: i32, tier: u8, kind: PositionKind) -> Self {
        Self {
            pair,
            tick,
            tier,
            kind,
        }
    }

    /// Deterministic, collision-resistant encoding of this identity.
    #[must_use]
    pub fn key(&self) -> PositionKey {
        let mut hasher = Sha256::new();
        hasher.update(b"strikeswap:position:v1:");
        hash_identity(&mut hasher, &self.pair);
        hasher.update(self.tick.to_le_bytes());
        hasher.update([self.tier, self.kind.tag()]);
        PositionKey(hasher.finalize().into())
    }
}

/// Hash of a [`PositionDescriptor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct PositionKey(pub [u8; 32]);

impl fmt::Display for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pos:{}", hex::encode(&self.0[..8]))
    }
}

/// Length-prefixed so that ("AB","C") and ("A","BC") never collide.
fn hash_identity(hasher: &mut Sha256, key: &PairKey) {
    for token in [&key.token0, &key.token1] {
        hasher.update((token.0.len() as u64).to_le_bytes());
        hasher.update(token.0.as_bytes());
    }
    hasher.update([key.scaling_factor]);
}

#[cfg(any(test, feature = "test-helpers"))]
impl PairKey {
    /// `WETH/USDC` with scaling factor 0.
    pub fn dummy() -> Self {
        Self::new("USDC", "WETH", 0).expect("static pair is ordered")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_key_requires_ascending_tokens() {
        assert!(PairKey::new("AAA", "BBB", 0).is_ok());
        let err = PairKey::new("BBB", "AAA", 0).unwrap_err();
        assert!(matches!(err, StrikeswapError::InvalidTokenOrder { .. }));
        let err = PairKey::new("AAA", "AAA", 0).unwrap_err();
        assert!(matches!(err, StrikeswapError::InvalidTokenOrder { .. }));
        let err = PairKey::new("", "AAA", 0).unwrap_err();
        assert!(matches!(err, StrikeswapError::InvalidTokenOrder { .. }));
    }

    #[test]
    fn pair_key_bounds_scaling_factor() {
        assert!(PairKey::new("A", "B", constants::MAX_SCALING_FACTOR).is_ok());
        let err = PairKey::new("A", "B", constants::MAX_SCALING_FACTOR + 1).unwrap_err();
        assert!(matches!(err, StrikeswapError::InvalidScalingFactor(_)));
    }

    #[test]
    fn pair_id_deterministic() {
        let a = PairKey::new("A", "B", 6).unwrap();
        let b = PairKey::new("A", "B", 6).unwrap();
        assert_eq!(a.id(), b.id());
        let c = PairKey::new("A", "B", 7).unwrap();
        assert_ne!(a.id(), c.id());
    }

    #[test]
    fn pair_id_length_prefix_prevents_collision() {
        let a = PairKey::new("AB", "C", 0).unwrap();
        let b = PairKey::new("A", "BC", 0).unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn position_key_depends_on_every_field() {
        let pair = PairKey::dummy();
        let base = PositionDescriptor::new(pair.clone(), 10, 1, PositionKind::Liquidity);
        let same = PositionDescriptor::new(pair.clone(), 10, 1, PositionKind::Liquidity);
        assert_eq!(base.key(), same.key());

        let variants = [
            PositionDescriptor::new(pair.clone(), 11, 1, PositionKind::Liquidity),
            PositionDescriptor::new(pair.clone(), 10, 2, PositionKind::Liquidity),
            PositionDescriptor::new(pair.clone(), 10, 1, PositionKind::Debt),
            PositionDescriptor::new(
                PairKey::new("USDC", "WETH", 1).unwrap(),
                10,
                1,
                PositionKind::Liquidity,
            ),
        ];
        for other in variants {
            assert_ne!(base.key(), other.key(), "{other:?}");
        }
    }

    #[test]
    fn spread_index_bounds() {
        assert_eq!(spread_index(0).unwrap(), 0);
        let max = u8::try_from(constants::MAX_TIERS - 1).unwrap();
        assert_eq!(spread_index(max).unwrap(), constants::MAX_TIERS - 1);
        let err = spread_index(max + 1).unwrap_err();
        assert!(matches!(err, StrikeswapError::InvalidTierOrSpread(_)));
    }

    #[test]
    fn check_tick_bounds() {
        assert!(check_tick(constants::MIN_TICK).is_ok());
        assert!(check_tick(constants::MAX_TICK).is_ok());
        assert!(check_tick(constants::MAX_TICK + 1).is_err());
        assert!(check_tick(constants::MIN_TICK - 1).is_err());
    }

    #[test]
    fn pair_key_serde_rejects_bad_order() {
        let json = r#"{"token0":"WETH","token1":"USDC","scaling_factor":0}"#;
        assert!(serde_json::from_str::<PairKey>(json).is_err());

        let key = PairKey::dummy();
        let json = serde_json::to_string(&key).unwrap();
        let back: PairKey = serde_json::from_str(&json).unwrap();
        assert_eq!(key, back);
    }

    #[test]
    fn account_id_ordering() {
        let a = AccountId::new();
        let b = AccountId::new();
        assert!(a < b);
    }
}
