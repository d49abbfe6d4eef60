//! StableSwap invariant solver
//!
//! The curve is defined by
//!
//! `Ann * S + D = Ann * D + D^(n+1) / (n^n * P)`
//!
//! where `S` is the sum and `P` the product of the balances, `n` the token
//! count and `Ann = A * n^n`. [`calculate_invariant`] solves it for `D`
//! iteratively; [`solve_balance_given_invariant`] solves it for one balance in
//! closed form.
//!
//! Amplification is accepted as an 18-decimal [`FixedPoint`] and carried
//! internally as `A * AMP_PRECISION` so the products stay inside 256 bits.

use crate::errors::{Result, StableMathError};
use config::constants::{amplification, pool, solver};
use tracing::{trace, warn};
use types::{math, FixedPoint, U256};

/// Outcome of the bounded invariant iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convergence {
    /// A step stopped shrinking the iterate by more than the tolerance
    Converged { invariant: U256, iterations: usize },
    /// The iteration budget ran out first
    MaxIterationsExceeded,
}

/// Check `2 <= n <= 5`
pub fn validate_token_count(count: usize) -> Result<()> {
    if !(pool::MIN_TOKENS..=pool::MAX_TOKENS).contains(&count) {
        return Err(StableMathError::InvalidTokenCount {
            count,
            min: pool::MIN_TOKENS,
            max: pool::MAX_TOKENS,
        });
    }
    Ok(())
}

pub(crate) fn validate_index(index: usize, count: usize) -> Result<()> {
    if index >= count {
        return Err(StableMathError::TokenIndexOutOfBounds { index, count });
    }
    Ok(())
}

/// `A * AMP_PRECISION` from an 18-decimal amplification coefficient
pub fn amp_precise(amp: FixedPoint) -> Result<U256> {
    if amp.is_zero() {
        return Err(StableMathError::ZeroAmplification);
    }
    let min = FixedPoint::from_units(amplification::MIN_AMP);
    let max = FixedPoint::from_units(amplification::MAX_AMP);
    if amp < min || amp > max {
        return Err(StableMathError::AmplificationOutOfRange {
            value: amp,
            min,
            max,
        });
    }
    let unit = FixedPoint::ONE.raw() / U256::from(amplification::AMP_PRECISION);
    if !(amp.raw() % unit).is_zero() {
        return Err(StableMathError::AmplificationPrecision { value: amp });
    }
    Ok(amp.raw() / unit)
}

/// `A * n^n * AMP_PRECISION`
fn amp_times_total(amp: FixedPoint, count: usize) -> Result<U256> {
    let n = count as u64;
    let n_pow_n = U256::from(n.pow(count as u32));
    Ok(math::mul(amp_precise(amp)?, n_pow_n)?)
}

/// Compute the invariant `D` for `balances` at amplification `amp`
///
/// `round_up` selects the larger (`true`) or smaller (`false`) of the final
/// two iterates; the two never differ by more than one unit.
/// Fails with [`StableMathError::InvariantDidNotConverge`] rather than
/// returning an unconverged iterate.
pub fn calculate_invariant(
    amp: FixedPoint,
    balances: &[FixedPoint],
    round_up: bool,
) -> Result<FixedPoint> {
    calculate_invariant_bounded(amp, balances, round_up, solver::MAX_ITERATIONS)
}

/// [`calculate_invariant`] with an explicit iteration budget
pub fn calculate_invariant_bounded(
    amp: FixedPoint,
    balances: &[FixedPoint],
    round_up: bool,
    max_iterations: usize,
) -> Result<FixedPoint> {
    validate_token_count(balances.len())?;
    if let Some(index) = balances.iter().position(|b| b.is_zero()) {
        return Err(StableMathError::ZeroBalance { index });
    }
    let amp_total = amp_times_total(amp, balances.len())?;
    let raw: Vec<U256> = balances.iter().map(|b| b.raw()).collect();

    match iterate_invariant(amp_total, &raw, round_up, max_iterations)? {
        Convergence::Converged {
            invariant,
            iterations,
        } => {
            trace!(iterations, %amp, round_up, "Invariant converged");
            Ok(FixedPoint::from_raw(invariant))
        }
        Convergence::MaxIterationsExceeded => {
            warn!(
                max_iterations,
                %amp,
                tokens = balances.len(),
                "Invariant did not converge"
            );
            Err(StableMathError::InvariantDidNotConverge {
                iterations: max_iterations,
            })
        }
    }
}

/// Newton step on the curve, started from `D_0 = S`:
///
/// `D_{k+1} = (Ann·S + n·D_P)·D_k / ((Ann − 1)·D_k + (n+1)·D_P)`,
/// with `D_P = D_k^(n+1) / (n^n · Πx)`.
///
/// Every division truncates, so the sequence descends monotonically onto the
/// root. The loop stops on the first step that no longer shrinks `D` by more
/// than the tolerance: a step within the tolerance, or any step that goes up
/// after truncation has carried `D` just below the root. `round_up` picks the
/// larger of the last two iterates, otherwise the smaller.
fn iterate_invariant(
    amp_total: U256,
    balances: &[U256],
    round_up: bool,
    max_iterations: usize,
) -> Result<Convergence> {
    let num_tokens = U256::from(balances.len());
    let amp_precision = U256::from(amplification::AMP_PRECISION);
    let tolerance = U256::from(solver::CONVERGENCE_TOLERANCE);

    let sum = balances
        .iter()
        .try_fold(U256::zero(), |acc, balance| math::add(acc, *balance))?;
    let amp_total_sum = math::mul_div(amp_total, sum, amp_precision, false)?;
    let amp_total_minus_one = math::sub(amp_total, amp_precision)?;

    let mut invariant = sum;
    for iteration in 1..=max_iterations {
        let mut d_p = invariant;
        for balance in balances {
            d_p = math::mul_div(d_p, invariant, math::mul(*balance, num_tokens)?, false)?;
        }

        let numerator = math::add(amp_total_sum, math::mul(num_tokens, d_p)?)?;
        let denominator = math::add(
            math::mul_div(amp_total_minus_one, invariant, amp_precision, false)?,
            math::mul(num_tokens + 1, d_p)?,
        )?;
        let next = math::mul_div(numerator, invariant, denominator, false)?;

        if math::add(next, tolerance)? >= invariant {
            let settled = if round_up {
                next.max(invariant)
            } else {
                next.min(invariant)
            };
            return Ok(Convergence::Converged {
                invariant: settled,
                iterations: iteration,
            });
        }
        invariant = next;
    }

    Ok(Convergence::MaxIterationsExceeded)
}

/// Solve the invariant for the balance at `token_index`, all others fixed
///
/// With `S'` and `P'` over the known balances the curve reduces to
/// `x² + (b − D)·x − c = 0`, `b = S' + D/Ann`, `c = D^(n+1) / (Ann·n^n·P')`,
/// and the positive root is taken. `b` rounds down, `c` and the square root
/// round up, so the result never undershoots the exact root.
///
/// The current value of `balances[token_index]` is ignored.
pub fn solve_balance_given_invariant(
    balances: &[FixedPoint],
    amp: FixedPoint,
    invariant: FixedPoint,
    token_index: usize,
) -> Result<FixedPoint> {
    let count = balances.len();
    validate_token_count(count)?;
    validate_index(token_index, count)?;
    if invariant.is_zero() {
        return Err(StableMathError::ZeroInvariant);
    }

    let amp_total = amp_times_total(amp, count)?;
    let amp_precision = U256::from(amplification::AMP_PRECISION);
    let num_tokens = U256::from(count);
    let d = invariant.raw();

    let mut sum = U256::zero();
    let mut c = d;
    for (index, balance) in balances.iter().enumerate() {
        if index == token_index {
            continue;
        }
        if balance.is_zero() {
            return Err(StableMathError::ZeroBalance { index });
        }
        sum = math::add(sum, balance.raw())?;
        c = math::mul_div(c, d, math::mul(balance.raw(), num_tokens)?, true)?;
    }
    // c = D^n / (n^(n-1) · P') so far
    c = math::mul_div(
        c,
        math::mul(d, amp_precision)?,
        math::mul(amp_total, num_tokens)?,
        true,
    )?;
    let b = math::add(sum, math::mul_div(d, amp_precision, amp_total, false)?)?;

    let gap = math::abs_diff(b, d);
    let discriminant = math::add(math::mul(gap, gap)?, math::mul(c, U256::from(4))?)?;
    let root = math::sqrt_up(discriminant);
    let numerator = if b >= d {
        math::sub(root, gap)?
    } else {
        math::add(root, gap)?
    };

    Ok(FixedPoint::from_raw(math::div_up(numerator, U256::from(2))?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units(values: &[u64]) -> Vec<FixedPoint> {
        values.iter().map(|v| FixedPoint::from_units(*v)).collect()
    }

    #[test]
    fn test_balanced_pool_invariant_is_sum() {
        let amp = FixedPoint::from_units(200);
        let balances = units(&[1000, 1000]);

        let invariant = calculate_invariant(amp, &balances, false).unwrap();
        let expected = FixedPoint::from_units(2000);
        assert!(math::abs_diff(invariant.raw(), expected.raw()) <= U256::one());
    }

    #[test]
    fn test_imbalanced_invariant_below_sum() {
        let amp = FixedPoint::from_units(100);
        let balances = units(&[500, 1500, 1000]);

        let invariant = calculate_invariant(amp, &balances, false).unwrap();
        assert!(invariant < FixedPoint::from_units(3000));
        // High amplification keeps the curve close to constant-sum
        assert!(invariant > FixedPoint::from_units(2990));
    }

    #[test]
    fn test_round_up_never_below_round_down() {
        let amp = FixedPoint::from_units(50);
        let balances = units(&[123, 4567, 89]);

        let down = calculate_invariant(amp, &balances, false).unwrap();
        let up = calculate_invariant(amp, &balances, true).unwrap();
        assert!(up >= down);
        assert!(up.raw() - down.raw() <= U256::one());
    }

    #[test]
    fn test_domain_checks() {
        let amp = FixedPoint::from_units(100);
        assert!(matches!(
            calculate_invariant(amp, &units(&[1000]), false),
            Err(StableMathError::InvalidTokenCount { count: 1, .. })
        ));
        assert!(matches!(
            calculate_invariant(amp, &units(&[1, 1, 1, 1, 1, 1]), false),
            Err(StableMathError::InvalidTokenCount { count: 6, .. })
        ));
        assert_eq!(
            calculate_invariant(amp, &units(&[1000, 0]), false),
            Err(StableMathError::ZeroBalance { index: 1 })
        );
        assert_eq!(
            calculate_invariant(FixedPoint::ZERO, &units(&[1000, 1000]), false),
            Err(StableMathError::ZeroAmplification)
        );
        assert!(matches!(
            calculate_invariant(FixedPoint::from_units(5001), &units(&[1000, 1000]), false),
            Err(StableMathError::AmplificationOutOfRange { .. })
        ));
        let too_fine = FixedPoint::from_decimal_str("100.0001").unwrap();
        assert!(matches!(
            calculate_invariant(too_fine, &units(&[1000, 1000]), false),
            Err(StableMathError::AmplificationPrecision { .. })
        ));
    }

    #[test]
    fn test_iteration_budget_exhaustion_is_an_error() {
        let amp = FixedPoint::from_units(1);
        let balances = units(&[1, 1_000_000]);

        assert_eq!(
            calculate_invariant_bounded(amp, &balances, false, 1),
            Err(StableMathError::InvariantDidNotConverge { iterations: 1 })
        );
        assert!(calculate_invariant(amp, &balances, false).is_ok());
    }

    #[test]
    fn test_iteration_stops_on_first_non_shrinking_step() {
        let balanced: Vec<U256> = units(&[1000, 1000]).iter().map(|b| b.raw()).collect();
        let amp_total = amp_times_total(FixedPoint::from_units(200), 2).unwrap();
        assert_eq!(
            iterate_invariant(amp_total, &balanced, false, 1).unwrap(),
            Convergence::Converged {
                invariant: FixedPoint::from_units(2000).raw(),
                iterations: 1,
            }
        );

        let skewed: Vec<U256> = units(&[1, 1_000_000]).iter().map(|b| b.raw()).collect();
        let amp_total = amp_times_total(FixedPoint::from_units(1), 2).unwrap();
        let down = U256::from_dec_str("25039691458177365098180").unwrap();
        assert_eq!(
            iterate_invariant(amp_total, &skewed, false, 255).unwrap(),
            Convergence::Converged {
                invariant: down,
                iterations: 15,
            }
        );
        assert_eq!(
            iterate_invariant(amp_total, &skewed, true, 255).unwrap(),
            Convergence::Converged {
                invariant: down + U256::one(),
                iterations: 15,
            }
        );
    }

    #[test]
    fn test_solve_balance_recovers_removed_entry() {
        let amp = FixedPoint::from_units(200);
        let balances = units(&[1000, 1000]);
        let invariant = calculate_invariant(amp, &balances, false).unwrap();

        let solved = solve_balance_given_invariant(&balances, amp, invariant, 0).unwrap();
        assert!(math::abs_diff(solved.raw(), balances[0].raw()) <= U256::one());
    }

    #[test]
    fn test_solve_balance_ignores_unknown_entry() {
        let amp = FixedPoint::from_units(85);
        let balances = units(&[700, 1200, 950]);
        let invariant = calculate_invariant(amp, &balances, true).unwrap();

        let mut scrambled = balances.clone();
        scrambled[2] = FixedPoint::ZERO;
        let solved = solve_balance_given_invariant(&scrambled, amp, invariant, 2).unwrap();
        assert!(math::abs_diff(solved.raw(), balances[2].raw()) <= U256::one());
    }

    #[test]
    fn test_solve_balance_domain_checks() {
        let amp = FixedPoint::from_units(100);
        let balances = units(&[1000, 1000]);
        assert_eq!(
            solve_balance_given_invariant(&balances, amp, FixedPoint::from_units(2000), 2),
            Err(StableMathError::TokenIndexOutOfBounds { index: 2, count: 2 })
        );
        assert_eq!(
            solve_balance_given_invariant(&balances, amp, FixedPoint::ZERO, 0),
            Err(StableMathError::ZeroInvariant)
        );
    }
}
