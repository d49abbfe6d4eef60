//! 18-decimal fixed-point arithmetic for pool balances, invariants and fees
//!
//! Balances, invariants, share supplies and percentages are all stored as
//! `U256` integers scaled by 10^18. Multiplication and division come in two
//! flavours, `*_down` (truncate) and `*_up` (round away from zero on any
//! remainder), and the caller always picks one.
//!
//! ## Design Principles
//!
//! - **Explicit Rounding**: no operator overloads that hide a rounding direction
//! - **Overflow Protection**: every operation is checked and returns
//!   [`FixedPointError`] instead of wrapping
//! - **Exact Parsing**: decimal strings convert without going through `f64`

use crate::common::errors::FixedPointError;
use primitive_types::U256;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of decimal places carried by [`FixedPoint`]
pub const DECIMALS: u32 = 18;

const ONE_RAW: u64 = 1_000_000_000_000_000_000;

/// Fixed-point value with 18 decimal places
///
/// Examples:
/// - 1.0 = FixedPoint(10^18)
/// - 0.5% = FixedPoint(5 * 10^15)
/// - 1000 tokens = FixedPoint(1000 * 10^18)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct FixedPoint(pub U256);

impl FixedPoint {
    /// Zero
    pub const ZERO: Self = Self(U256([0, 0, 0, 0]));

    /// 1.0 (also 100% when used as a percentage)
    pub const ONE: Self = Self(U256([ONE_RAW, 0, 0, 0]));

    /// Smallest representable increment, 10^-18
    pub const EPSILON: Self = Self(U256([1, 0, 0, 0]));

    /// Create from a whole number of units
    pub fn from_units(units: u64) -> Self {
        // u64::MAX * 10^18 < 2^128, cannot overflow
        Self(U256::from(units) * U256::from(ONE_RAW))
    }

    /// Create from raw scaled integer
    pub fn from_raw(raw: U256) -> Self {
        Self(raw)
    }

    /// Create from a raw scaled `u128`
    pub fn from_raw_u128(raw: u128) -> Self {
        Self(U256::from(raw))
    }

    /// Get the raw scaled integer value
    pub fn raw(self) -> U256 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// Create from a decimal string with exact parsing
    ///
    /// This is the PRIMARY method for creating values from external data
    /// (configuration files, fixtures). Negative values and strings with more
    /// than 18 fractional digits are rejected.
    ///
    /// # Examples
    /// ```
    /// use types::FixedPoint;
    ///
    /// let fee = FixedPoint::from_decimal_str("0.0004").unwrap();
    /// assert_eq!(fee.to_string(), "0.0004");
    /// ```
    pub fn from_decimal_str(s: &str) -> Result<Self, FixedPointError> {
        let decimal = Decimal::from_str(s.trim()).map_err(|_| FixedPointError::InvalidDecimal {
            input: s.to_string(),
        })?;
        Self::try_from_decimal(decimal).map_err(|err| match err {
            FixedPointError::PrecisionLoss { .. } => FixedPointError::PrecisionLoss {
                input: s.to_string(),
            },
            _ => FixedPointError::InvalidDecimal {
                input: s.to_string(),
            },
        })
    }

    /// Exact conversion from a `Decimal`
    pub fn try_from_decimal(decimal: Decimal) -> Result<Self, FixedPointError> {
        if decimal.is_sign_negative() && !decimal.is_zero() {
            return Err(FixedPointError::InvalidDecimal {
                input: decimal.to_string(),
            });
        }
        let decimal = decimal.normalize();
        let scale = decimal.scale();
        if scale > DECIMALS {
            return Err(FixedPointError::PrecisionLoss {
                input: decimal.to_string(),
            });
        }
        let mantissa = decimal.mantissa().unsigned_abs();
        // Decimal mantissas are below 2^96, so this never exceeds 2^160
        let raw = U256::from(mantissa) * U256::exp10((DECIMALS - scale) as usize);
        Ok(Self(raw))
    }

    // ROUNDED ARITHMETIC - the caller chooses the direction

    /// `self * rhs`, truncated
    pub fn mul_down(self, rhs: Self) -> Result<Self, FixedPointError> {
        let product = self
            .0
            .checked_mul(rhs.0)
            .ok_or_else(|| FixedPointError::overflow("mul_down"))?;
        Ok(Self(product / Self::ONE.0))
    }

    /// `self * rhs`, rounded up on any remainder
    pub fn mul_up(self, rhs: Self) -> Result<Self, FixedPointError> {
        let product = self
            .0
            .checked_mul(rhs.0)
            .ok_or_else(|| FixedPointError::overflow("mul_up"))?;
        if product.is_zero() {
            Ok(Self::ZERO)
        } else {
            Ok(Self((product - 1) / Self::ONE.0 + 1))
        }
    }

    /// `self / rhs`, truncated
    pub fn div_down(self, rhs: Self) -> Result<Self, FixedPointError> {
        if rhs.is_zero() {
            return Err(FixedPointError::DivisionByZero);
        }
        if self.is_zero() {
            return Ok(Self::ZERO);
        }
        let scaled = self
            .0
            .checked_mul(Self::ONE.0)
            .ok_or_else(|| FixedPointError::overflow("div_down"))?;
        Ok(Self(scaled / rhs.0))
    }

    /// `self / rhs`, rounded up on any remainder
    pub fn div_up(self, rhs: Self) -> Result<Self, FixedPointError> {
        if rhs.is_zero() {
            return Err(FixedPointError::DivisionByZero);
        }
        if self.is_zero() {
            return Ok(Self::ZERO);
        }
        let scaled = self
            .0
            .checked_mul(Self::ONE.0)
            .ok_or_else(|| FixedPointError::overflow("div_up"))?;
        Ok(Self((scaled - 1) / rhs.0 + 1))
    }

    /// `1 - self`, floored at zero
    pub fn complement(self) -> Self {
        if self.0 < Self::ONE.0 {
            Self(Self::ONE.0 - self.0)
        } else {
            Self::ZERO
        }
    }

    // CHECKED ARITHMETIC

    pub fn checked_add(self, rhs: Self) -> Result<Self, FixedPointError> {
        self.0
            .checked_add(rhs.0)
            .map(Self)
            .ok_or_else(|| FixedPointError::overflow("add"))
    }

    pub fn checked_sub(self, rhs: Self) -> Result<Self, FixedPointError> {
        self.0
            .checked_sub(rhs.0)
            .map(Self)
            .ok_or_else(|| FixedPointError::underflow("sub"))
    }

    /// `max(self - rhs, 0)`
    pub fn saturating_sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

/// Display with up to 18 fractional digits, trailing zeros trimmed
impl fmt::Display for FixedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let one = Self::ONE.0;
        let whole = self.0 / one;
        let fraction = self.0 % one;
        if fraction.is_zero() {
            write!(f, "{}", whole)
        } else {
            let digits = format!("{:0>18}", fraction.to_string());
            write!(f, "{}.{}", whole, digits.trim_end_matches('0'))
        }
    }
}

impl FromStr for FixedPoint {
    type Err = FixedPointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_decimal_str(s)
    }
}

impl TryFrom<String> for FixedPoint {
    type Error = FixedPointError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_decimal_str(&value)
    }
}

impl From<FixedPoint> for String {
    fn from(value: FixedPoint) -> Self {
        value.to_string()
    }
}

impl From<U256> for FixedPoint {
    fn from(raw: U256) -> Self {
        Self(raw)
    }
}
