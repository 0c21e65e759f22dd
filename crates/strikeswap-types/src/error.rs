//! Error types for the strikeswap liquidity market.
//!
//! All errors use the `SS_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Pair errors
//! - 2xx: Position errors
//! - 3xx: Curve / arithmetic errors
//! - 4xx: Settlement errors
//! - 5xx: Router / batch errors
//! - 9xx: General / internal errors

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{AssetId, PairId};

/// Central error enum for all strikeswap operations.
///
/// Every variant aborts the operation that raised it. The engine rolls the
/// whole operation (or batch) back before the error reaches the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StrikeswapError {
    // =================================================================
    // Pair Errors (1xx)
    // =================================================================
    /// Pair identity is malformed: tokens empty, equal, or not ascending.
    #[error("SS_ERR_100: Invalid token order: {token0} must sort strictly before {token1}")]
    InvalidTokenOrder { token0: String, token1: String },

    /// A pair with this identity already exists.
    #[error("SS_ERR_101: Pair already exists: {0}")]
    PairAlreadyExists(PairId),

    /// No pair is stored under this identity.
    #[error("SS_ERR_102: Pair not found: {0}")]
    PairNotFound(PairId),

    /// Tick is outside `MIN_TICK..=MAX_TICK`.
    #[error("SS_ERR_103: Tick out of range: {0}")]
    InvalidTick(i32),

    /// Scaling factor exceeds `MAX_SCALING_FACTOR`.
    #[error("SS_ERR_104: Invalid scaling factor: {0}")]
    InvalidScalingFactor(u8),

    // =================================================================
    // Position Errors (2xx)
    // =================================================================
    /// Burn exceeds the position's balance.
    #[error("SS_ERR_200: Insufficient position balance: need {needed}, have {available}")]
    InsufficientBalance { needed: Decimal, available: Decimal },

    // =================================================================
    // Curve / Arithmetic Errors (3xx)
    // =================================================================
    /// Tier/spread index outside the configured bound.
    #[error("SS_ERR_300: Invalid tier or spread: {0}")]
    InvalidTierOrSpread(u8),

    /// An amount argument is zero, negative where it must be positive, or otherwise unusable.
    #[error("SS_ERR_301: Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    /// A computed amount exceeds the representable range.
    #[error("SS_ERR_302: Arithmetic overflow")]
    ArithmeticOverflow,

    /// Liquidity (or another non-negative quantity) would go negative.
    #[error("SS_ERR_303: Arithmetic underflow")]
    ArithmeticUnderflow,

    // =================================================================
    // Settlement Errors (4xx)
    // =================================================================
    /// Post-callback balance check failed.
    #[error("SS_ERR_400: Insufficient input of {asset}: required {required}, received {received}")]
    InsufficientInput {
        asset: AssetId,
        required: Decimal,
        received: Decimal,
    },

    /// Re-entrant access to a pair while an operation on it is in flight.
    #[error("SS_ERR_401: Pair locked: {0}")]
    Locked(PairId),

    /// The asset transfer service refused a transfer.
    #[error("SS_ERR_402: Transfer failed: {reason}")]
    TransferFailed { reason: String },

    /// Engine holdings do not cover its liabilities. Critical safety alert.
    #[error("SS_ERR_403: Reserve shortfall in {asset}: required {required}, held {held}")]
    ReserveShortfall {
        asset: AssetId,
        required: Decimal,
        held: Decimal,
    },

    // =================================================================
    // Router / Batch Errors (5xx)
    // =================================================================
    /// The batch deadline has passed.
    #[error("SS_ERR_500: Batch expired: deadline {deadline}, now {now}")]
    BatchExpired { deadline: u64, now: u64 },

    /// The batch nonce was already consumed (replay).
    #[error("SS_ERR_501: Batch nonce already used: {0}")]
    NonceReused(u64),

    /// Encoded batch does not match its digest.
    #[error("SS_ERR_502: Batch digest mismatch")]
    DigestMismatch,

    /// A command cannot be applied in this context.
    #[error("SS_ERR_503: Invalid command: {reason}")]
    InvalidCommand { reason: String },

    /// A symbolic amount reached the ledger without being resolved.
    #[error("SS_ERR_504: Unresolved symbolic amount for {0}")]
    UnresolvedAmount(AssetId),

    /// Every remembered nonce belongs to a batch that can still execute.
    #[error("SS_ERR_505: Nonce cache full: {capacity} unexpired batches")]
    NonceCacheFull { capacity: usize },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("SS_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("SS_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config document, out-of-range values).
    #[error("SS_ERR_902: Configuration error: {0}")]
    Configuration(String),
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, StrikeswapError>;

impl From<serde_json::Error> for StrikeswapError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_contains_prefix() {
        let err = StrikeswapError::InvalidTick(300_000);
        let msg = format!("{err}");
        assert!(msg.starts_with("SS_ERR_103"), "Got: {msg}");
        assert!(msg.contains("300000"));
    }

    #[test]
    fn insufficient_balance_display() {
        let err = StrikeswapError::InsufficientBalance {
            needed: Decimal::new(100, 0),
            available: Decimal::new(50, 0),
        };
        let msg = format!("{err}");
        assert!(msg.contains("SS_ERR_200"));
        assert!(msg.contains("100"));
        assert!(msg.contains("50"));
    }

    #[test]
    fn insufficient_input_names_asset() {
        let err = StrikeswapError::InsufficientInput {
            asset: AssetId::new("USDC"),
            required: Decimal::new(5, 0),
            received: Decimal::ZERO,
        };
        let msg = format!("{err}");
        assert!(msg.contains("SS_ERR_400"));
        assert!(msg.contains("USDC"));
    }

    #[test]
    fn all_errors_have_ss_err_prefix() {
        let errors: Vec<Box<dyn std::error::Error>> = vec![
            Box::new(StrikeswapError::ArithmeticOverflow),
            Box::new(StrikeswapError::ArithmeticUnderflow),
            Box::new(StrikeswapError::DigestMismatch),
            Box::new(StrikeswapError::NonceReused(7)),
            Box::new(StrikeswapError::NonceCacheFull { capacity: 3 }),
            Box::new(StrikeswapError::BatchExpired {
                deadline: 1,
                now: 2,
            }),
            Box::new(StrikeswapError::Internal("test".into())),
        ];
        for err in errors {
            let msg = format!("{err}");
            assert!(
                msg.starts_with("SS_ERR_"),
                "Error missing SS_ERR_ prefix: {msg}"
            );
        }
    }

    #[test]
    fn serde_json_error_converts() {
        let parse: std::result::Result<u32, _> = serde_json::from_str("not json");
        let err: StrikeswapError = parse.unwrap_err().into();
        assert!(matches!(err, StrikeswapError::Serialization(_)));
    }
}
