//! Build-time constants for the strikeswap liquidity market.

/// Number of spread levels every pair carries. Bounds the per-pair
/// composition/active-tick arrays and the per-tick liquidity arrays.
pub const NUM_SPREADS: usize = 5;

/// Maximum number of tiers a caller may address. Tiers and spreads are the
/// same index space.
pub const MAX_TIERS: usize = NUM_SPREADS;

/// Lowest addressable tick. `1.0001^-200_000` is roughly `2.06e-9`.
pub const MIN_TICK: i32 = -200_000;

/// Highest addressable tick. `1.0001^200_000` is roughly `4.85e8`.
pub const MAX_TICK: i32 = 200_000;

/// Largest accepted pair scaling factor (`scale = 10^scaling_factor`).
pub const MAX_SCALING_FACTOR: u8 = 18;

/// Decimal places kept on every asset amount that crosses the settlement
/// boundary.
pub const AMOUNT_SCALE: u32 = 8;

/// Basis-point denominator for spread quotes.
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Parts-per-billion denominator for borrow rates.
pub const PPB_DENOMINATOR: u32 = 1_000_000_000;

/// Ceiling of a tick's borrow index. Compounding saturates here so that
/// long-outstanding debt stays representable and repayable.
pub const MAX_BORROW_INDEX: i64 = 1_000_000;

/// Default number of batch nonces the router remembers.
pub const DEFAULT_NONCE_CACHE_SIZE: usize = 100_000;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "strikeswap";
