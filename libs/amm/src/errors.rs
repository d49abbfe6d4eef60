//! Error taxonomy for the stable-pool math core
//!
//! Four families, each fatal to the enclosing operation:
//!
//! - **Arithmetic**: overflow or division by zero inside fixed-point math
//! - **Non-convergence**: the invariant loop ran out of iterations
//! - **Domain**: invalid input rejected before any computation
//! - **Insufficient result**: a caller-supplied slippage bound was violated
//!
//! A failed call never leaves the snapshot, rate cache or supply ledger
//! partially updated.

use thiserror::Error;
use types::{FixedPoint, FixedPointError};

pub type Result<T> = std::result::Result<T, StableMathError>;

/// Which slippage bound a quote violated
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SlippageViolation {
    #[error("shares out {actual} below minimum {limit}")]
    SharesOutBelowMinimum { actual: FixedPoint, limit: FixedPoint },

    #[error("shares in {actual} above maximum {limit}")]
    SharesInAboveMaximum { actual: FixedPoint, limit: FixedPoint },

    #[error("amount out {actual} for token {index} below minimum {limit}")]
    AmountOutBelowMinimum {
        index: usize,
        actual: FixedPoint,
        limit: FixedPoint,
    },

    #[error("amount in {actual} for token {index} above maximum {limit}")]
    AmountInAboveMaximum {
        index: usize,
        actual: FixedPoint,
        limit: FixedPoint,
    },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StableMathError {
    /// Overflow or division by zero in fixed-point arithmetic
    #[error("Arithmetic failure: {0}")]
    Arithmetic(#[from] FixedPointError),

    /// Invariant iteration exhausted its budget without converging
    #[error("Invariant did not converge after {iterations} iterations")]
    InvariantDidNotConverge { iterations: usize },

    #[error("Pool must hold between {min} and {max} tokens, got {count}")]
    InvalidTokenCount { count: usize, min: usize, max: usize },

    #[error("Balance of token {index} must be positive")]
    ZeroBalance { index: usize },

    #[error("Token index {index} out of bounds for {count} tokens")]
    TokenIndexOutOfBounds { index: usize, count: usize },

    #[error("Token in and token out must differ (both {index})")]
    SameTokenIndex { index: usize },

    #[error("Amplification coefficient must be positive")]
    ZeroAmplification,

    #[error("Amplification {value} outside [{min}, {max}]")]
    AmplificationOutOfRange {
        value: FixedPoint,
        min: FixedPoint,
        max: FixedPoint,
    },

    #[error("Amplification {value} is finer than 0.001")]
    AmplificationPrecision { value: FixedPoint },

    #[error("Invariant must be positive")]
    ZeroInvariant,

    #[error("Fee percentage {value} outside its valid range")]
    InvalidFeePercentage { value: FixedPoint },

    #[error("Expected {expected} entries, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Total supply must be positive")]
    ZeroSupply,

    #[error("Pool already initialized (supply {supply})")]
    AlreadyInitialized { supply: FixedPoint },

    #[error("Shares {shares} exceed total supply {supply}")]
    SharesExceedSupply {
        shares: FixedPoint,
        supply: FixedPoint,
    },

    #[error("Amount {amount} exceeds balance {balance} of token {index}")]
    AmountExceedsBalance {
        index: usize,
        amount: FixedPoint,
        balance: FixedPoint,
    },

    /// Caller-supplied bound violated by the computed quote
    #[error("Insufficient result: {0}")]
    InsufficientResult(SlippageViolation),

    /// The supply ledger refused a change
    #[error("Supply ledger rejected change: {0}")]
    Ledger(String),
}

impl StableMathError {
    /// The math itself failed (overflow, division by zero, no convergence)
    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            Self::Arithmetic(_) | Self::InvariantDidNotConverge { .. }
        )
    }

    /// A slippage bound was exceeded; the math was fine
    pub fn is_slippage(&self) -> bool {
        matches!(self, Self::InsufficientResult(_))
    }
}
