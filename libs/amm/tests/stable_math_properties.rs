//! Stable Math Property Tests
//!
//! Mathematical properties of the invariant solver, the join/exit quoting
//! and the growth attribution that must hold for any valid pool.

use amm::{
    bpt_for_pool_ownership_percentage, calculate_invariant, liquidity_math,
    solve_balance_given_invariant, InMemoryRateCache, InMemoryShareLedger, LastJoinExit,
    ProtocolFeeAccrual, StaticFeeCache, YieldExemptions,
};
use proptest::prelude::*;
use rust_decimal::Decimal;
use types::{math, FixedPoint, U256};

fn to_fixed(decimal: Decimal) -> FixedPoint {
    FixedPoint::try_from_decimal(decimal).unwrap()
}

// Property test strategies
prop_compose! {
    /// 1,000 to 10,000,000 tokens with three decimals
    fn valid_balance()
        (mantissa in 1_000_000i64..10_000_000_000i64) -> FixedPoint {
        to_fixed(Decimal::new(mantissa, 3))
    }
}

prop_compose! {
    /// Whole-unit amplification between 1 and 5000
    fn valid_amp()
        (amp in 1u64..=5000u64) -> FixedPoint {
        FixedPoint::from_units(amp)
    }
}

prop_compose! {
    /// Swap fee up to 10%
    fn valid_swap_fee()
        (basis_points in 1i64..=1000i64) -> FixedPoint {
        to_fixed(Decimal::new(basis_points, 4))
    }
}

prop_compose! {
    fn pool_state()
        (balances in prop::collection::vec(valid_balance(), 2..=5), amp in valid_amp())
        -> (Vec<FixedPoint>, FixedPoint) {
        (balances, amp)
    }
}

/// Up to half of each balance, some entries zero
fn join_amounts(balances: Vec<FixedPoint>) -> impl Strategy<Value = Vec<FixedPoint>> {
    let count = balances.len();
    prop::collection::vec(0u32..=500u32, count).prop_map(move |fractions| {
        balances
            .iter()
            .zip(fractions)
            .map(|(balance, permille)| {
                balance
                    .mul_down(to_fixed(Decimal::new(permille as i64, 3)))
                    .unwrap()
            })
            .collect()
    })
}

fn pool_with_amounts() -> impl Strategy<Value = (Vec<FixedPoint>, FixedPoint, Vec<FixedPoint>)> {
    pool_state().prop_flat_map(|(balances, amp)| {
        let amounts = join_amounts(balances.clone());
        (Just(balances), Just(amp), amounts)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn invariant_increases_with_any_balance(
        (balances, amp) in pool_state(),
        index in any::<prop::sample::Index>(),
        extra in 1u64..1000u64,
    ) {
        let index = index.index(balances.len());
        let before = calculate_invariant(amp, &balances, false).unwrap();

        let mut grown = balances.clone();
        grown[index] = grown[index].checked_add(FixedPoint::from_units(extra)).unwrap();
        let after = calculate_invariant(amp, &grown, false).unwrap();

        prop_assert!(after > before);
    }

    #[test]
    fn invariant_never_exceeds_sum(
        (balances, amp) in pool_state(),
    ) {
        let invariant = calculate_invariant(amp, &balances, false).unwrap();
        let sum = balances
            .iter()
            .fold(FixedPoint::ZERO, |acc, b| acc.checked_add(*b).unwrap());
        prop_assert!(invariant.raw() <= sum.raw() + U256::one());
    }

    #[test]
    fn solver_round_trip_recovers_balance(
        (balances, amp) in pool_state(),
        index in any::<prop::sample::Index>(),
    ) {
        let index = index.index(balances.len());
        let invariant = calculate_invariant(amp, &balances, false).unwrap();

        let mut unknown = balances.clone();
        unknown[index] = FixedPoint::ZERO;
        let solved = solve_balance_given_invariant(&unknown, amp, invariant, index).unwrap();

        let error = math::abs_diff(solved.raw(), balances[index].raw());
        prop_assert!(error <= U256::one(), "round trip error {}", error);
    }

    #[test]
    fn swap_fee_never_increases_shares_out(
        (balances, amp, amounts) in pool_with_amounts(),
        fee in valid_swap_fee(),
    ) {
        prop_assume!(amounts.iter().any(|a| !a.is_zero()));
        let supply = calculate_invariant(amp, &balances, false).unwrap();
        let invariant = calculate_invariant(amp, &balances, true).unwrap();

        let free = liquidity_math::calc_shares_out_given_exact_tokens_in(
            amp, &balances, &amounts, supply, invariant, FixedPoint::ZERO,
        ).unwrap();
        let taxed = liquidity_math::calc_shares_out_given_exact_tokens_in(
            amp, &balances, &amounts, supply, invariant, fee,
        ).unwrap();

        prop_assert!(taxed <= free);
    }

    #[test]
    fn one_sided_join_never_beats_proportional(
        balance in valid_balance(),
        count in 2usize..=5,
        amp in valid_amp(),
        permille in 1u32..=500u32,
        basis_points in 0i64..=1000i64,
    ) {
        let balances = vec![balance; count];
        let fee = to_fixed(Decimal::new(basis_points, 4));
        let per_token = balance
            .mul_down(to_fixed(Decimal::new(permille as i64, 3)))
            .unwrap();
        let supply = calculate_invariant(amp, &balances, false).unwrap();
        let invariant = calculate_invariant(amp, &balances, true).unwrap();

        // Same aggregate value, all of it in the first asset
        let mut one_sided = vec![FixedPoint::ZERO; count];
        one_sided[0] = per_token.mul_down(FixedPoint::from_units(count as u64)).unwrap();

        let proportional = liquidity_math::calc_shares_out_given_exact_tokens_in(
            amp, &balances, &vec![per_token; count], supply, invariant, fee,
        ).unwrap();
        let imbalanced = liquidity_math::calc_shares_out_given_exact_tokens_in(
            amp, &balances, &one_sided, supply, invariant, fee,
        ).unwrap();

        prop_assert!(imbalanced <= proportional);
    }

    #[test]
    fn swap_fee_never_decreases_shares_in(
        (balances, amp, amounts) in pool_with_amounts(),
        fee in valid_swap_fee(),
    ) {
        prop_assume!(amounts.iter().any(|a| !a.is_zero()));
        // Withdraw a third of each sampled amount so the grossed-up fee still fits
        let amounts: Vec<FixedPoint> = amounts
            .iter()
            .map(|a| a.div_down(FixedPoint::from_units(3)).unwrap())
            .collect();
        let supply = calculate_invariant(amp, &balances, false).unwrap();
        let invariant = calculate_invariant(amp, &balances, true).unwrap();

        let free = liquidity_math::calc_shares_in_given_exact_tokens_out(
            amp, &balances, &amounts, supply, invariant, FixedPoint::ZERO,
        ).unwrap();
        let taxed = liquidity_math::calc_shares_in_given_exact_tokens_out(
            amp, &balances, &amounts, supply, invariant, fee,
        ).unwrap();

        prop_assert!(taxed >= free);
    }

    #[test]
    fn feeless_join_then_exit_returns_shares(
        (balances, amp, amounts) in pool_with_amounts(),
    ) {
        prop_assume!(amounts.iter().any(|a| !a.is_zero()));
        let supply = calculate_invariant(amp, &balances, false).unwrap();
        let invariant = calculate_invariant(amp, &balances, true).unwrap();
        let shares_out = liquidity_math::calc_shares_out_given_exact_tokens_in(
            amp, &balances, &amounts, supply, invariant, FixedPoint::ZERO,
        ).unwrap();

        let joined: Vec<FixedPoint> = balances
            .iter()
            .zip(&amounts)
            .map(|(b, a)| b.checked_add(*a).unwrap())
            .collect();
        let joined_supply = supply.checked_add(shares_out).unwrap();
        let joined_invariant = calculate_invariant(amp, &joined, true).unwrap();
        let shares_in = liquidity_math::calc_shares_in_given_exact_tokens_out(
            amp, &joined, &amounts, joined_supply, joined_invariant, FixedPoint::ZERO,
        ).unwrap();

        // Rounding only ever favours the pool, by a relative 1e-16 at most
        prop_assert!(shares_in >= shares_out);
        let tolerance = supply.raw() / U256::exp10(16) + U256::one();
        prop_assert!(shares_in.raw() - shares_out.raw() <= tolerance);
    }

    #[test]
    fn protocol_ownership_is_bounded(
        (balances, amp) in pool_state(),
        swap_growth_permille in 0u32..=100u32,
        rate_growth_permille in prop::collection::vec(0u32..=500u32, 5),
        exempt in prop::collection::vec(any::<bool>(), 5),
        swap_pct in 0i64..=100i64,
        yield_pct in 0i64..=100i64,
    ) {
        let count = balances.len();
        let snapshot = calculate_invariant(amp, &balances, false).unwrap();

        let mut rates = InMemoryRateCache::new(count);
        let mut grown = Vec::with_capacity(count);
        for (index, balance) in balances.iter().enumerate() {
            let rate = to_fixed(Decimal::new(1000 + rate_growth_permille[index] as i64, 3));
            rates = rates.with_rate_provider(index, FixedPoint::ONE).unwrap();
            rates.set_current_rate(index, rate).unwrap();
            let with_fees = balance
                .mul_down(to_fixed(Decimal::new(1000 + swap_growth_permille as i64, 3)))
                .unwrap();
            grown.push(with_fees.mul_down(rate).unwrap());
        }

        let accrual = ProtocolFeeAccrual::new(
            InMemoryShareLedger::with_supply(snapshot),
            rates,
            StaticFeeCache::new(
                to_fixed(Decimal::new(swap_pct, 2)),
                to_fixed(Decimal::new(yield_pct, 2)),
            ),
            YieldExemptions::new(exempt[..count].to_vec()),
            None,
            LastJoinExit { amplification: amp, invariant: snapshot },
        );
        let pre = accrual.protocol_fees_before_join_exit(&grown).unwrap();
        let pct = pre.attribution.protocol_ownership_percentage;

        prop_assert!(pct <= FixedPoint::ONE);
        prop_assert_eq!(
            pre.protocol_fee_amount,
            bpt_for_pool_ownership_percentage(snapshot, pct).unwrap()
        );
        let diluted = pre.protocol_fee_amount.div_down(pre.virtual_supply).unwrap();
        prop_assert!(diluted <= pct);
    }
}
