//! # strikeswap-settlement
//!
//! **Settlement plane**: pair storage, flash-accounted settlement, per-pair
//! locks and the position ledger.
//!
//! ## Architecture
//!
//! Every value-moving operation:
//! 1. Locks the pairs it touches (re-entry fails with `Locked`)
//! 2. Runs the curve and updates positions optimistically
//! 3. Pays out whatever is owed to the caller
//! 4. Calls the caller's [`SettlementCallback`] once with the deltas
//! 5. Verifies the engine's balances grew by what the caller owed
//!
//! Any failure along the way unwinds the operation completely: pair state,
//! positions, transfers and events.
//!
//! ## Batches
//!
//! [`Engine::execute_batch`] runs many commands in one frame and settles
//! their per-asset net once, so intermediate amounts never move.

pub mod assets;
pub mod coordinator;
pub mod engine;
pub mod ledger;
pub mod lock;
pub mod ops;
pub mod reserves;

pub use assets::{AssetTransferService, AuthorizedTransfer, InMemoryAssets};
pub use coordinator::{NoPayment, Obligation, SettlementCallback};
pub use engine::{BatchReceipt, Engine, Pair};
pub use ledger::{Position, PositionBook, PositionLedger};
pub use lock::PairLock;
pub use ops::{Applied, OpContext};
pub use reserves::ReserveAudit;
