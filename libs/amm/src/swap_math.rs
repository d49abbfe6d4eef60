//! Fee-agnostic StableSwap swap quoting
//!
//! Swap fees are taken from the input amount by the caller before these
//! functions run. Both directions hold the invariant fixed and solve for the
//! balance on the other side, shaving one unit off the result in the pool's
//! favour.

use crate::errors::{Result, SlippageViolation, StableMathError};
use crate::invariant::{calculate_invariant, solve_balance_given_invariant, validate_index};
use tracing::trace;
use types::FixedPoint;

/// Which side of the swap the caller fixes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapKind {
    /// Exact amount in, quote the amount out
    GivenIn,
    /// Exact amount out, quote the amount in
    GivenOut,
}

/// A swap with an optional slippage limit
///
/// `limit` is the minimum acceptable amount out for [`SwapKind::GivenIn`] and
/// the maximum acceptable amount in for [`SwapKind::GivenOut`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapRequest {
    pub kind: SwapKind,
    pub index_in: usize,
    pub index_out: usize,
    pub amount: FixedPoint,
    pub limit: Option<FixedPoint>,
}

/// Both legs of a quoted swap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapQuote {
    pub amount_in: FixedPoint,
    pub amount_out: FixedPoint,
}

impl SwapRequest {
    pub fn given_in(index_in: usize, index_out: usize, amount_in: FixedPoint) -> Self {
        Self {
            kind: SwapKind::GivenIn,
            index_in,
            index_out,
            amount: amount_in,
            limit: None,
        }
    }

    pub fn given_out(index_in: usize, index_out: usize, amount_out: FixedPoint) -> Self {
        Self {
            kind: SwapKind::GivenOut,
            index_in,
            index_out,
            amount: amount_out,
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: FixedPoint) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Quote the swap and enforce the limit
    pub fn quote(&self, balances: &[FixedPoint], amp: FixedPoint) -> Result<SwapQuote> {
        match self.kind {
            SwapKind::GivenIn => {
                let amount_out = quote_swap_given_in(
                    balances,
                    amp,
                    self.index_in,
                    self.index_out,
                    self.amount,
                )?;
                if let Some(limit) = self.limit {
                    if amount_out < limit {
                        return Err(StableMathError::InsufficientResult(
                            SlippageViolation::AmountOutBelowMinimum {
                                index: self.index_out,
                                actual: amount_out,
                                limit,
                            },
                        ));
                    }
                }
                Ok(SwapQuote {
                    amount_in: self.amount,
                    amount_out,
                })
            }
            SwapKind::GivenOut => {
                let amount_in = quote_swap_given_out(
                    balances,
                    amp,
                    self.index_in,
                    self.index_out,
                    self.amount,
                )?;
                if let Some(limit) = self.limit {
                    if amount_in > limit {
                        return Err(StableMathError::InsufficientResult(
                            SlippageViolation::AmountInAboveMaximum {
                                index: self.index_in,
                                actual: amount_in,
                                limit,
                            },
                        ));
                    }
                }
                Ok(SwapQuote {
                    amount_in,
                    amount_out: self.amount,
                })
            }
        }
    }
}

fn validate_pair(index_in: usize, index_out: usize, count: usize) -> Result<()> {
    validate_index(index_in, count)?;
    validate_index(index_out, count)?;
    if index_in == index_out {
        return Err(StableMathError::SameTokenIndex { index: index_in });
    }
    Ok(())
}

/// Amount of `index_out` received for exactly `amount_in` of `index_in`
///
/// Dust inputs whose effect is lost to rounding quote zero.
pub fn quote_swap_given_in(
    balances: &[FixedPoint],
    amp: FixedPoint,
    index_in: usize,
    index_out: usize,
    amount_in: FixedPoint,
) -> Result<FixedPoint> {
    validate_pair(index_in, index_out, balances.len())?;
    let invariant = calculate_invariant(amp, balances, true)?;
    if amount_in.is_zero() {
        return Ok(FixedPoint::ZERO);
    }

    let mut updated = balances.to_vec();
    updated[index_in] = updated[index_in].checked_add(amount_in)?;
    let final_balance_out = solve_balance_given_invariant(&updated, amp, invariant, index_out)?;

    let amount_out = balances[index_out]
        .saturating_sub(final_balance_out)
        .saturating_sub(FixedPoint::EPSILON);
    trace!(index_in, index_out, %amount_in, %amount_out, "Quoted swap given in");
    Ok(amount_out)
}

/// Amount of `index_in` required to receive exactly `amount_out` of `index_out`
pub fn quote_swap_given_out(
    balances: &[FixedPoint],
    amp: FixedPoint,
    index_in: usize,
    index_out: usize,
    amount_out: FixedPoint,
) -> Result<FixedPoint> {
    validate_pair(index_in, index_out, balances.len())?;
    if amount_out >= balances[index_out] {
        return Err(StableMathError::AmountExceedsBalance {
            index: index_out,
            amount: amount_out,
            balance: balances[index_out],
        });
    }
    let invariant = calculate_invariant(amp, balances, true)?;
    if amount_out.is_zero() {
        return Ok(FixedPoint::ZERO);
    }

    let mut updated = balances.to_vec();
    updated[index_out] = updated[index_out].checked_sub(amount_out)?;
    let final_balance_in = solve_balance_given_invariant(&updated, amp, invariant, index_in)?;

    let amount_in = final_balance_in
        .saturating_sub(balances[index_in])
        .checked_add(FixedPoint::EPSILON)?;
    trace!(index_in, index_out, %amount_in, %amount_out, "Quoted swap given out");
    Ok(amount_in)
}
