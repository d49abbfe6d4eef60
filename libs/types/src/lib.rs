//! # Stableswap Types Library
//!
//! Numeric foundation for the stable-pool math crates.
//!
//! ## Design Philosophy
//!
//! - **No Precision Loss**: all balances, invariants and percentages stored as
//!   18-decimal scaled `U256` integers
//! - **Explicit Rounding**: every multiply/divide names its rounding direction
//! - **Checked Everywhere**: overflow and division by zero are errors, never wraps
//!
//! ## Quick Start
//!
//! ```rust
//! use types::FixedPoint;
//!
//! let balance = FixedPoint::from_units(1000);
//! let fee = FixedPoint::from_decimal_str("0.003").unwrap();
//!
//! let charged = balance.mul_up(fee).unwrap();
//! assert_eq!(charged, FixedPoint::from_units(3));
//! assert_eq!(fee.complement().to_string(), "0.997");
//! ```

pub mod common;

pub use common::errors::FixedPointError;
pub use common::fixed_point::FixedPoint;
pub use common::math;
pub use primitive_types::U256;
