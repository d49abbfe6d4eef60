//! Stable-pool constants
//!
//! Bounds shared by the solver, the quoting functions and configuration
//! validation.

/// Pool shape
pub mod pool {
    /// Minimum number of pooled assets
    pub const MIN_TOKENS: usize = 2;

    /// Maximum number of pooled assets
    pub const MAX_TOKENS: usize = 5;
}

/// Amplification coefficient bounds
pub mod amplification {
    /// Smallest accepted amplification coefficient (whole units)
    pub const MIN_AMP: u64 = 1;

    /// Largest accepted amplification coefficient (whole units)
    pub const MAX_AMP: u64 = 5000;

    /// Internal amplification precision; A is carried as `A * AMP_PRECISION`
    pub const AMP_PRECISION: u64 = 1_000;
}

/// Invariant solver limits
pub mod solver {
    /// Iteration budget for the invariant fixed-point loop
    pub const MAX_ITERATIONS: usize = 255;

    /// A step that shrinks the iterate by no more than this (raw units) ends the loop
    pub const CONVERGENCE_TOLERANCE: u64 = 1;
}

/// Fee percentage bounds, raw 18-decimal values
pub mod fees {
    /// 10%
    pub const MAX_SWAP_FEE_PERCENTAGE: u128 = 100_000_000_000_000_000;

    /// 100%
    pub const MAX_PROTOCOL_FEE_PERCENTAGE: u128 = 1_000_000_000_000_000_000;
}
