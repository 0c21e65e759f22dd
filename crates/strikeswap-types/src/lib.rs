//! # strikeswap-types
//!
//! Shared types, errors, and configuration for the **strikeswap** liquidity
//! market.
//!
//! This crate is the leaf dependency of the workspace: every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`AccountId`], [`AssetId`], [`PairKey`], [`PairId`], [`PositionKey`]
//! - **Positions**: [`PositionDescriptor`], [`PositionKind`]
//! - **Commands**: [`Command`] and its payloads, plus the batch wire format
//! - **Deltas**: [`PairDelta`], [`AssetDelta`], [`NetDeltas`]
//! - **Events**: [`EngineEvent`], [`EventRecord`]
//! - **Configuration**: [`EngineConfig`]
//! - **Errors**: [`StrikeswapError`] with `SS_ERR_` prefix codes
//! - **Constants**: build-time bounds (spreads, tick range, precision)

pub mod command;
pub mod config;
pub mod constants;
pub mod delta;
pub mod error;
pub mod event;
pub mod ids;

pub use command::*;
pub use config::*;
pub use delta::*;
pub use error::*;
pub use event::*;
pub use ids::*;

// Constants are accessed via `strikeswap_types::constants::FOO`
// (not re-exported to avoid name collisions).
