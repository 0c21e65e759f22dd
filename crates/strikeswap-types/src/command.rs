//! Batch commands and their wire format.
//!
//! A batch is an ordered JSON array of `{"tag": ..., "payload": {...}}`
//! objects. Each tag has a fixed payload schema; the pair identity
//! (`token0`, `token1`, `scaling_factor`) is flattened into every payload.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AssetId, PairKey, Result};

/// One operation in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tag", content = "payload")]
pub enum Command {
    CreatePair(CreatePair),
    AddLiquidity(LiquidityParams),
    RemoveLiquidity(LiquidityParams),
    BorrowLiquidity(LiquidityParams),
    RepayLiquidity(LiquidityParams),
    Swap(SwapParams),
    Accrue(AccrueParams),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePair {
    #[serde(flatten)]
    pub pair: PairKey,
    pub initial_tick: i32,
}

/// Payload shared by the four liquidity-moving commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityParams {
    #[serde(flatten)]
    pub pair: PairKey,
    pub tick: i32,
    pub tier: u8,
    pub liquidity: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapParams {
    #[serde(flatten)]
    pub pair: PairKey,
    /// Whether `amount` names token0 (otherwise token1).
    pub is_token0: bool,
    /// Positive = exact input, negative = exact output.
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccrueParams {
    #[serde(flatten)]
    pub pair: PairKey,
    pub tick: i32,
    pub tier: u8,
}

/// Swap amount: literal, or whatever the batch has accumulated so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Amount {
    Exact(Decimal),
    /// The amount of `asset` currently owed to the caller by the earlier
    /// commands of the same batch, spent as an exact input.
    BatchBalance(AssetId),
}

impl Command {
    /// The pair this command operates on.
    #[must_use]
    pub fn pair(&self) -> &PairKey {
        match self {
            Self::CreatePair(c) => &c.pair,
            Self::AddLiquidity(p)
            | Self::RemoveLiquidity(p)
            | Self::BorrowLiquidity(p)
            | Self::RepayLiquidity(p) => &p.pair,
            Self::Swap(s) => &s.pair,
            Self::Accrue(a) => &a.pair,
        }
    }

    /// Wire tag.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::CreatePair(_) => "CreatePair",
            Self::AddLiquidity(_) => "AddLiquidity",
            Self::RemoveLiquidity(_) => "RemoveLiquidity",
            Self::BorrowLiquidity(_) => "BorrowLiquidity",
            Self::RepayLiquidity(_) => "RepayLiquidity",
            Self::Swap(_) => "Swap",
            Self::Accrue(_) => "Accrue",
        }
    }

    /// The symbolic asset still waiting to be resolved, if any.
    #[must_use]
    pub fn unresolved(&self) -> Option<&AssetId> {
        match self {
            Self::Swap(SwapParams {
                amount: Amount::BatchBalance(asset),
                ..
            }) => Some(asset),
            _ => None,
        }
    }
}

/// Serialize a batch to its wire form.
pub fn encode_batch(commands: &[Command]) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(commands)?)
}

/// Parse a batch from its wire form.
pub fn decode_batch(bytes: &[u8]) -> Result<Vec<Command>> {
    Ok(serde_json::from_slice(bytes)?)
}
