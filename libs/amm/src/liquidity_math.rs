//! Join and exit quoting against the StableSwap invariant
//!
//! Proportional operations are fee-free. Every other kind charges the swap
//! fee only on the part of each amount that deviates from the ideal
//! proportional ratio (the taxable amount); the rest passes through untaxed.
//!
//! Rounding always favours the pool: shares out and amounts out round down,
//! shares in and amounts in round up. The current invariant is taken rounded
//! up and post-operation invariants rounded down.

use crate::errors::{Result, SlippageViolation, StableMathError};
use crate::invariant::{
    calculate_invariant, solve_balance_given_invariant, validate_index, validate_token_count,
};
use tracing::debug;
use types::FixedPoint;

/// How liquidity enters the pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinKind {
    /// First deposit; mints the invariant of the deposited amounts
    Init { amounts_in: Vec<FixedPoint> },
    ExactTokensInForSharesOut {
        amounts_in: Vec<FixedPoint>,
        min_shares_out: FixedPoint,
    },
    TokenInForExactSharesOut {
        shares_out: FixedPoint,
        token_index: usize,
        max_amount_in: FixedPoint,
    },
    /// Pro-rata deposit, no fee
    AllTokensInForExactSharesOut {
        shares_out: FixedPoint,
        max_amounts_in: Vec<FixedPoint>,
    },
}

/// How liquidity leaves the pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitKind {
    ExactSharesInForOneTokenOut {
        shares_in: FixedPoint,
        token_index: usize,
        min_amount_out: FixedPoint,
    },
    /// Pro-rata withdrawal, no fee
    ExactSharesInForTokensOut {
        shares_in: FixedPoint,
        min_amounts_out: Vec<FixedPoint>,
    },
    SharesInForExactTokensOut {
        amounts_out: Vec<FixedPoint>,
        max_shares_in: FixedPoint,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinQuote {
    pub shares_out: FixedPoint,
    pub amounts_in: Vec<FixedPoint>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitQuote {
    pub shares_in: FixedPoint,
    pub amounts_out: Vec<FixedPoint>,
}

/// Swap fees must leave a non-zero complement to divide by
pub fn validate_swap_fee(swap_fee_percentage: FixedPoint) -> Result<()> {
    if swap_fee_percentage >= FixedPoint::ONE {
        return Err(StableMathError::InvalidFeePercentage {
            value: swap_fee_percentage,
        });
    }
    Ok(())
}

fn validate_lengths(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(StableMathError::LengthMismatch { expected, actual });
    }
    Ok(())
}

/// Everything but `Init` needs funded balances and outstanding shares
fn ensure_live_pool(balances: &[FixedPoint], total_supply: FixedPoint) -> Result<()> {
    validate_token_count(balances.len())?;
    if let Some(index) = balances.iter().position(|b| b.is_zero()) {
        return Err(StableMathError::ZeroBalance { index });
    }
    if total_supply.is_zero() {
        return Err(StableMathError::ZeroSupply);
    }
    Ok(())
}

fn sum(values: &[FixedPoint]) -> Result<FixedPoint> {
    values
        .iter()
        .try_fold(FixedPoint::ZERO, |acc, value| Ok(acc.checked_add(*value)?))
}

fn checked_withdrawal(index: usize, balance: FixedPoint, amount: FixedPoint) -> Result<FixedPoint> {
    balance
        .checked_sub(amount)
        .map_err(|_| StableMathError::AmountExceedsBalance {
            index,
            amount,
            balance,
        })
}

/// Quote a join against the current balances and share supply
pub fn quote_join(
    amp: FixedPoint,
    balances: &[FixedPoint],
    total_supply: FixedPoint,
    swap_fee_percentage: FixedPoint,
    kind: &JoinKind,
) -> Result<JoinQuote> {
    validate_swap_fee(swap_fee_percentage)?;

    match kind {
        JoinKind::Init { amounts_in } => {
            if !total_supply.is_zero() {
                return Err(StableMathError::AlreadyInitialized {
                    supply: total_supply,
                });
            }
            validate_lengths(balances.len(), amounts_in.len())?;
            let shares_out = calculate_invariant(amp, amounts_in, false)?;
            debug!(%shares_out, "Initial join");
            Ok(JoinQuote {
                shares_out,
                amounts_in: amounts_in.clone(),
            })
        }
        JoinKind::ExactTokensInForSharesOut {
            amounts_in,
            min_shares_out,
        } => {
            ensure_live_pool(balances, total_supply)?;
            validate_lengths(balances.len(), amounts_in.len())?;
            let invariant = calculate_invariant(amp, balances, true)?;
            let shares_out = calc_shares_out_given_exact_tokens_in(
                amp,
                balances,
                amounts_in,
                total_supply,
                invariant,
                swap_fee_percentage,
            )?;
            if shares_out < *min_shares_out {
                return Err(StableMathError::InsufficientResult(
                    SlippageViolation::SharesOutBelowMinimum {
                        actual: shares_out,
                        limit: *min_shares_out,
                    },
                ));
            }
            Ok(JoinQuote {
                shares_out,
                amounts_in: amounts_in.clone(),
            })
        }
        JoinKind::TokenInForExactSharesOut {
            shares_out,
            token_index,
            max_amount_in,
        } => {
            ensure_live_pool(balances, total_supply)?;
            validate_index(*token_index, balances.len())?;
            let invariant = calculate_invariant(amp, balances, true)?;
            let amount_in = calc_token_in_given_exact_shares_out(
                amp,
                balances,
                *token_index,
                *shares_out,
                total_supply,
                invariant,
                swap_fee_percentage,
            )?;
            if amount_in > *max_amount_in {
                return Err(StableMathError::InsufficientResult(
                    SlippageViolation::AmountInAboveMaximum {
                        index: *token_index,
                        actual: amount_in,
                        limit: *max_amount_in,
                    },
                ));
            }
            let mut amounts_in = vec![FixedPoint::ZERO; balances.len()];
            amounts_in[*token_index] = amount_in;
            Ok(JoinQuote {
                shares_out: *shares_out,
                amounts_in,
            })
        }
        JoinKind::AllTokensInForExactSharesOut {
            shares_out,
            max_amounts_in,
        } => {
            ensure_live_pool(balances, total_supply)?;
            validate_lengths(balances.len(), max_amounts_in.len())?;
            let amounts_in = calc_all_tokens_in_given_exact_shares_out(
                balances,
                *shares_out,
                total_supply,
            )?;
            for (index, (amount, limit)) in amounts_in.iter().zip(max_amounts_in).enumerate() {
                if amount > limit {
                    return Err(StableMathError::InsufficientResult(
                        SlippageViolation::AmountInAboveMaximum {
                            index,
                            actual: *amount,
                            limit: *limit,
                        },
                    ));
                }
            }
            Ok(JoinQuote {
                shares_out: *shares_out,
                amounts_in,
            })
        }
    }
}

/// Quote an exit against the current balances and share supply
pub fn quote_exit(
    amp: FixedPoint,
    balances: &[FixedPoint],
    total_supply: FixedPoint,
    swap_fee_percentage: FixedPoint,
    kind: &ExitKind,
) -> Result<ExitQuote> {
    validate_swap_fee(swap_fee_percentage)?;
    ensure_live_pool(balances, total_supply)?;

    match kind {
        ExitKind::ExactSharesInForOneTokenOut {
            shares_in,
            token_index,
            min_amount_out,
        } => {
            validate_index(*token_index, balances.len())?;
            let invariant = calculate_invariant(amp, balances, true)?;
            let amount_out = calc_token_out_given_exact_shares_in(
                amp,
                balances,
                *token_index,
                *shares_in,
                total_supply,
                invariant,
                swap_fee_percentage,
            )?;
            if amount_out < *min_amount_out {
                return Err(StableMathError::InsufficientResult(
                    SlippageViolation::AmountOutBelowMinimum {
                        index: *token_index,
                        actual: amount_out,
                        limit: *min_amount_out,
                    },
                ));
            }
            let mut amounts_out = vec![FixedPoint::ZERO; balances.len()];
            amounts_out[*token_index] = amount_out;
            Ok(ExitQuote {
                shares_in: *shares_in,
                amounts_out,
            })
        }
        ExitKind::ExactSharesInForTokensOut {
            shares_in,
            min_amounts_out,
        } => {
            validate_lengths(balances.len(), min_amounts_out.len())?;
            let amounts_out =
                calc_tokens_out_given_exact_shares_in(balances, *shares_in, total_supply)?;
            for (index, (amount, limit)) in amounts_out.iter().zip(min_amounts_out).enumerate() {
                if amount < limit {
                    return Err(StableMathError::InsufficientResult(
                        SlippageViolation::AmountOutBelowMinimum {
                            index,
                            actual: *amount,
                            limit: *limit,
                        },
                    ));
                }
            }
            Ok(ExitQuote {
                shares_in: *shares_in,
                amounts_out,
            })
        }
        ExitKind::SharesInForExactTokensOut {
            amounts_out,
            max_shares_in,
        } => {
            validate_lengths(balances.len(), amounts_out.len())?;
            let invariant = calculate_invariant(amp, balances, true)?;
            let shares_in = calc_shares_in_given_exact_tokens_out(
                amp,
                balances,
                amounts_out,
                total_supply,
                invariant,
                swap_fee_percentage,
            )?;
            if shares_in > *max_shares_in {
                return Err(StableMathError::InsufficientResult(
                    SlippageViolation::SharesInAboveMaximum {
                        actual: shares_in,
                        limit: *max_shares_in,
                    },
                ));
            }
            Ok(ExitQuote {
                shares_in,
                amounts_out: amounts_out.clone(),
            })
        }
    }
}

/// Shares minted for depositing exactly `amounts_in`
///
/// Assets whose deposit ratio exceeds the value-weighted ideal ratio pay the
/// swap fee on the excess. Returns zero when the invariant does not grow.
pub fn calc_shares_out_given_exact_tokens_in(
    amp: FixedPoint,
    balances: &[FixedPoint],
    amounts_in: &[FixedPoint],
    total_supply: FixedPoint,
    current_invariant: FixedPoint,
    swap_fee_percentage: FixedPoint,
) -> Result<FixedPoint> {
    let sum_balances = sum(balances)?;

    let mut balance_ratios_with_fee = Vec::with_capacity(balances.len());
    let mut invariant_ratio_with_fees = FixedPoint::ZERO;
    for (balance, amount_in) in balances.iter().zip(amounts_in) {
        let current_weight = balance.div_down(sum_balances)?;
        let ratio = balance.checked_add(*amount_in)?.div_down(*balance)?;
        invariant_ratio_with_fees =
            invariant_ratio_with_fees.checked_add(ratio.mul_down(current_weight)?)?;
        balance_ratios_with_fee.push(ratio);
    }

    let fee_complement = swap_fee_percentage.complement();
    let mut new_balances = Vec::with_capacity(balances.len());
    for ((balance, amount_in), ratio) in balances
        .iter()
        .zip(amounts_in)
        .zip(&balance_ratios_with_fee)
    {
        let amount_in_without_fee = if *ratio > invariant_ratio_with_fees {
            let excess_ratio = invariant_ratio_with_fees.saturating_sub(FixedPoint::ONE);
            let non_taxable = balance.mul_down(excess_ratio)?;
            let taxable = amount_in.saturating_sub(non_taxable);
            non_taxable.checked_add(taxable.mul_down(fee_complement)?)?
        } else {
            *amount_in
        };
        new_balances.push(balance.checked_add(amount_in_without_fee)?);
    }

    let new_invariant = calculate_invariant(amp, &new_balances, false)?;
    let invariant_ratio = new_invariant.div_down(current_invariant)?;
    if invariant_ratio > FixedPoint::ONE {
        Ok(total_supply.mul_down(invariant_ratio.saturating_sub(FixedPoint::ONE))?)
    } else {
        Ok(FixedPoint::ZERO)
    }
}

/// Amount of one token needed to mint exactly `shares_out`
///
/// Only the `1 - weight` share of the amount is taxable, since that is the
/// part a proportional join would have sourced from the other tokens.
pub fn calc_token_in_given_exact_shares_out(
    amp: FixedPoint,
    balances: &[FixedPoint],
    token_index: usize,
    shares_out: FixedPoint,
    total_supply: FixedPoint,
    current_invariant: FixedPoint,
    swap_fee_percentage: FixedPoint,
) -> Result<FixedPoint> {
    let new_invariant = total_supply
        .checked_add(shares_out)?
        .div_up(total_supply)?
        .mul_up(current_invariant)?;
    let new_balance =
        solve_balance_given_invariant(balances, amp, new_invariant, token_index)?;
    let amount_in_without_fee = new_balance.saturating_sub(balances[token_index]);

    let current_weight = balances[token_index].div_down(sum(balances)?)?;
    let taxable = amount_in_without_fee.mul_up(current_weight.complement())?;
    let non_taxable = amount_in_without_fee.saturating_sub(taxable);

    Ok(non_taxable.checked_add(taxable.div_up(swap_fee_percentage.complement())?)?)
}

/// Pro-rata deposit for exactly `shares_out`, rounded up
pub fn calc_all_tokens_in_given_exact_shares_out(
    balances: &[FixedPoint],
    shares_out: FixedPoint,
    total_supply: FixedPoint,
) -> Result<Vec<FixedPoint>> {
    let share_ratio = shares_out.div_up(total_supply)?;
    balances
        .iter()
        .map(|balance| Ok(balance.mul_up(share_ratio)?))
        .collect()
}

/// Shares burned to withdraw exactly `amounts_out`
///
/// Withdrawals above the ideal proportional ratio are grossed up by the fee.
pub fn calc_shares_in_given_exact_tokens_out(
    amp: FixedPoint,
    balances: &[FixedPoint],
    amounts_out: &[FixedPoint],
    total_supply: FixedPoint,
    current_invariant: FixedPoint,
    swap_fee_percentage: FixedPoint,
) -> Result<FixedPoint> {
    let sum_balances = sum(balances)?;

    let mut balance_ratios_without_fee = Vec::with_capacity(balances.len());
    let mut invariant_ratio_without_fees = FixedPoint::ZERO;
    for (index, (balance, amount_out)) in balances.iter().zip(amounts_out).enumerate() {
        let current_weight = balance.div_up(sum_balances)?;
        let remaining = checked_withdrawal(index, *balance, *amount_out)?;
        let ratio = remaining.div_up(*balance)?;
        invariant_ratio_without_fees =
            invariant_ratio_without_fees.checked_add(ratio.mul_up(current_weight)?)?;
        balance_ratios_without_fee.push(ratio);
    }

    let fee_complement = swap_fee_percentage.complement();
    let mut new_balances = Vec::with_capacity(balances.len());
    for (index, ((balance, amount_out), ratio)) in balances
        .iter()
        .zip(amounts_out)
        .zip(&balance_ratios_without_fee)
        .enumerate()
    {
        let amount_out_with_fee = if invariant_ratio_without_fees > *ratio {
            let non_taxable = balance.mul_down(invariant_ratio_without_fees.complement())?;
            let taxable = amount_out.saturating_sub(non_taxable);
            non_taxable.checked_add(taxable.div_up(fee_complement)?)?
        } else {
            *amount_out
        };
        new_balances.push(checked_withdrawal(index, *balance, amount_out_with_fee)?);
    }

    let new_invariant = calculate_invariant(amp, &new_balances, false)?;
    let invariant_ratio = new_invariant.div_down(current_invariant)?;
    Ok(total_supply.mul_up(invariant_ratio.complement())?)
}

/// Amount of one token paid out for burning exactly `shares_in`
pub fn calc_token_out_given_exact_shares_in(
    amp: FixedPoint,
    balances: &[FixedPoint],
    token_index: usize,
    shares_in: FixedPoint,
    total_supply: FixedPoint,
    current_invariant: FixedPoint,
    swap_fee_percentage: FixedPoint,
) -> Result<FixedPoint> {
    // Burning the whole supply would leave a zero invariant to solve against
    if shares_in >= total_supply {
        return Err(StableMathError::SharesExceedSupply {
            shares: shares_in,
            supply: total_supply,
        });
    }
    let new_invariant = total_supply
        .checked_sub(shares_in)?
        .div_up(total_supply)?
        .mul_up(current_invariant)?;
    let new_balance =
        solve_balance_given_invariant(balances, amp, new_invariant, token_index)?;
    let amount_out_without_fee = balances[token_index].saturating_sub(new_balance);

    let current_weight = balances[token_index].div_down(sum(balances)?)?;
    let taxable = amount_out_without_fee.mul_up(current_weight.complement())?;
    let non_taxable = amount_out_without_fee.saturating_sub(taxable);

    Ok(non_taxable.checked_add(taxable.mul_down(swap_fee_percentage.complement())?)?)
}

/// Pro-rata withdrawal for exactly `shares_in`, rounded down
pub fn calc_tokens_out_given_exact_shares_in(
    balances: &[FixedPoint],
    shares_in: FixedPoint,
    total_supply: FixedPoint,
) -> Result<Vec<FixedPoint>> {
    if shares_in > total_supply {
        return Err(StableMathError::SharesExceedSupply {
            shares: shares_in,
            supply: total_supply,
        });
    }
    let share_ratio = shares_in.div_down(total_supply)?;
    balances
        .iter()
        .map(|balance| Ok(balance.mul_down(share_ratio)?))
        .collect()
}
