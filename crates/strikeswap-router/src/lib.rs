//! # strikeswap-router
//!
//! **Batch routing**: simulate a command list against a read-only engine,
//! encode it with a transfer authorization and a digest, then submit it for
//! atomic execution.
//!
//! ## Flow
//!
//! ```text
//! commands ──► Simulator ──► Simulation ──► encode ──► EncodedBatch
//!                  (&Engine)      (net, resolved)         │
//!                                                         ▼
//!                              Router::submit ──► Engine::execute_batch
//! ```
//!
//! Symbolic amounts (`Amount::BatchBalance`) are resolved during
//! simulation, so what reaches the engine is always literal. Simulation is
//! advisory: the engine re-runs every command against live state and the
//! settlement check still applies.

pub mod batch;
pub mod nonce;
pub mod router;
pub mod simulator;

pub use batch::{EncodedBatch, encode};
pub use nonce::NonceGuard;
pub use router::{Plan, Router};
pub use simulator::{LazyTicks, PositionChange, PositionOverlay, Simulation, Simulator};
