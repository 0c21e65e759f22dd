//! Informational events emitted after successful operations.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AccountId, PairDelta, PairId, PairKey};

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineEvent {
    PairCreated {
        pair: PairId,
        key: PairKey,
        initial_tick: i32,
    },
    LiquidityAdded {
        pair: PairId,
        owner: AccountId,
        tick: i32,
        tier: u8,
        liquidity: Decimal,
        delta: PairDelta,
    },
    LiquidityRemoved {
        pair: PairId,
        owner: AccountId,
        tick: i32,
        tier: u8,
        liquidity: Decimal,
        delta: PairDelta,
    },
    LiquidityBorrowed {
        pair: PairId,
        owner: AccountId,
        tick: i32,
        tier: u8,
        liquidity: Decimal,
        delta: PairDelta,
    },
    LiquidityRepaid {
        pair: PairId,
        owner: AccountId,
        tick: i32,
        tier: u8,
        liquidity: Decimal,
        delta: PairDelta,
    },
    SwapExecuted {
        pair: PairId,
        owner: AccountId,
        delta: PairDelta,
    },
    Accrued {
        pair: PairId,
        tick: i32,
        tier: u8,
        borrow_index: Decimal,
    },
}

impl EngineEvent {
    /// Short name for log lines.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::PairCreated { .. } => "pair_created",
            Self::LiquidityAdded { .. } => "liquidity_added",
            Self::LiquidityRemoved { .. } => "liquidity_removed",
            Self::LiquidityBorrowed { .. } => "liquidity_borrowed",
            Self::LiquidityRepaid { .. } => "liquidity_repaid",
            Self::SwapExecuted { .. } => "swap_executed",
            Self::Accrued { .. } => "accrued",
        }
    }
}

/// An event together with when it was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event: EngineEvent,
    /// Engine clock at emission.
    pub ledger_time: u64,
    /// Wall clock at emission.
    pub recorded_at: DateTime<Utc>,
}

impl EventRecord {
    #[must_use]
    pub fn new(event: EngineEvent, ledger_time: u64) -> Self {
        Self {
            event,
            ledger_time,
            recorded_at: Utc::now(),
        }
    }
}
