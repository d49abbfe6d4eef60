//! # Stableswap Pool Configuration
//!
//! Centralized configuration and constants for the stable-pool math core.
//!
//! ## Features
//!
//! - **Solver Constants**: iteration budget, amplification precision and bounds
//! - **Fee Bounds**: maximum swap fee and protocol fee percentages
//! - **Pool Configuration**: TOML files with environment-specific overrides
//!
//! ## Usage
//!
//! ```rust,no_run
//! use config::{constants, load_config};
//!
//! let pool = load_config(Some("production")).unwrap();
//! assert!(pool.pool.token_count <= constants::pool::MAX_TOKENS);
//! ```

pub mod constants;
pub mod pool_config;

// Re-export commonly used types
pub use constants::*;
pub use pool_config::{load_config, PoolConfig, PoolSettings, ProtocolFeeSettings};
