//! Error types for fixed-point arithmetic
//!
//! Every multiply and divide in the stable-pool math is checked. Failures are
//! surfaced through [`FixedPointError`] instead of wrapping or saturating, so
//! callers can abort the enclosing operation.

use thiserror::Error;

/// Errors that can occur during fixed-point arithmetic operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FixedPointError {
    /// Result exceeds the 256-bit representable range
    #[error("Overflow in fixed-point {operation}")]
    Overflow { operation: &'static str },

    /// Subtraction would produce a negative value
    #[error("Underflow in fixed-point {operation}")]
    Underflow { operation: &'static str },

    /// Division by zero in fixed-point arithmetic
    #[error("Division by zero in fixed-point arithmetic")]
    DivisionByZero,

    /// Invalid decimal string format
    #[error("Invalid decimal string: '{input}' - expected non-negative numeric format")]
    InvalidDecimal { input: String },

    /// More fractional digits than the 18-decimal scale can hold
    #[error("Precision loss: '{input}' has more than 18 fractional digits")]
    PrecisionLoss { input: String },
}

impl FixedPointError {
    pub(crate) fn overflow(operation: &'static str) -> Self {
        Self::Overflow { operation }
    }

    pub(crate) fn underflow(operation: &'static str) -> Self {
        Self::Underflow { operation }
    }
}
