//! # strikeswap-curve
//!
//! **Pure tick/spread liquidity curve.**
//!
//! The curve owns the per-pair state (per-spread active tick and
//! composition) and the math that provisions liquidity and walks ticks
//! during a swap. It has:
//!
//! - **Zero side effects** outside the state it is handed: no balances, no
//!   transfers, no positions
//! - **Storage independence**: tick state is reached through [`TickStore`],
//!   so the ledger's tick map and the router's lazy snapshot run the exact
//!   same code
//! - **Checked arithmetic**: every step reports overflow/underflow instead of
//!   wrapping or panicking
//!
//! ## Price model
//!
//! `price(tick) = 1.0001^tick` (token1 per token0). One unit of liquidity at
//! a tick is worth `scale` token1. Ticks above a spread's active tick hold
//! only token0, ticks below hold only token1, and the active tick splits its
//! value by the spread's composition.

pub mod borrow;
pub mod liquidity;
pub mod math;
pub mod pair;
pub mod swap;
pub mod tick;

pub use borrow::{accrue, borrow, repay};
pub use liquidity::{Rounding, amounts_for_liquidity, update_liquidity};
pub use math::price_at_tick;
pub use pair::{PairState, SpreadState};
pub use swap::swap;
pub use tick::{Tick, TickStore};
