//! Checked raw-integer arithmetic on `U256`
//!
//! These helpers operate on unscaled integers. The invariant solver mixes
//! fixed-point quantities with plain counts (token count, amplification
//! precision), so it works at this level and picks the rounding direction of
//! every division explicitly.

use crate::common::errors::FixedPointError;
use primitive_types::{U256, U512};

pub type MathResult<T> = Result<T, FixedPointError>;

#[inline]
pub fn add(a: U256, b: U256) -> MathResult<U256> {
    a.checked_add(b)
        .ok_or_else(|| FixedPointError::overflow("add"))
}

#[inline]
pub fn sub(a: U256, b: U256) -> MathResult<U256> {
    a.checked_sub(b)
        .ok_or_else(|| FixedPointError::underflow("sub"))
}

#[inline]
pub fn mul(a: U256, b: U256) -> MathResult<U256> {
    a.checked_mul(b)
        .ok_or_else(|| FixedPointError::overflow("mul"))
}

/// Truncating division
#[inline]
pub fn div_down(a: U256, b: U256) -> MathResult<U256> {
    if b.is_zero() {
        return Err(FixedPointError::DivisionByZero);
    }
    Ok(a / b)
}

/// Division rounding away from zero on any remainder
#[inline]
pub fn div_up(a: U256, b: U256) -> MathResult<U256> {
    if b.is_zero() {
        return Err(FixedPointError::DivisionByZero);
    }
    if a.is_zero() {
        Ok(U256::zero())
    } else {
        Ok((a - 1) / b + 1)
    }
}

#[inline]
pub fn div(a: U256, b: U256, round_up: bool) -> MathResult<U256> {
    if round_up {
        div_up(a, b)
    } else {
        div_down(a, b)
    }
}

/// `a * b / c` with a 512-bit intermediate product
///
/// Only the final quotient has to fit in 256 bits.
pub fn mul_div(a: U256, b: U256, c: U256, round_up: bool) -> MathResult<U256> {
    if c.is_zero() {
        return Err(FixedPointError::DivisionByZero);
    }
    let product: U512 = a.full_mul(b);
    let divisor = U512::from(c);
    let mut quotient = product / divisor;
    if round_up && !(product % divisor).is_zero() {
        quotient = quotient + U512::one();
    }
    U256::try_from(quotient).map_err(|_| FixedPointError::overflow("mul_div"))
}

/// Smallest integer `r` with `r * r >= x`
pub fn sqrt_up(x: U256) -> U256 {
    let root = x.integer_sqrt();
    // root <= 2^128 - 1, so the square cannot overflow
    if root * root < x {
        root + 1
    } else {
        root
    }
}

/// `|a - b|` without a signed type
#[inline]
pub fn abs_diff(a: U256, b: U256) -> U256 {
    if a >= b {
        a - b
    } else {
        b - a
    }
}
