//! Growth attribution and protocol fee accrual
//!
//! Between two liquidity events the invariant grows for two reasons: swap
//! fees retained by the pool, and yield on assets whose external rate rose.
//! Before each join or exit the growth since the last one is split apart by
//! evaluating the invariant at the last amplification over three balance
//! vectors:
//!
//! 1. every rated asset stripped of its yield (swap fee growth only)
//! 2. only the exempt assets stripped (swap fees plus non-exempt yield)
//! 3. the balances as they are (total growth)
//!
//! `(1) - D0` is charged at the swap percentage and `(2) - (1)` at the yield
//! percentage, both relative to `(3)`. Deltas are clamped at zero: when a rate
//! falls the ordering `(3) >= (2) >= (1)` can invert, and the result is then
//! under-charged rather than corrected.
//!
//! After the join or exit, swap fees earned by the operation itself are
//! charged against the supply-implied invariant, and the snapshot and old
//! rates move forward together.

use crate::errors::{Result, StableMathError};
use crate::invariant::calculate_invariant;
use crate::pool_traits::{
    ProtocolFeePercentages, ProtocolFeeType, ShareLedger, SupplyChange, TokenRates,
};
use tracing::debug;
use types::{math, FixedPoint};

/// Amplification and invariant as of the last join or exit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastJoinExit {
    pub amplification: FixedPoint,
    pub invariant: FixedPoint,
}

/// Per-asset yield fee exemption flags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YieldExemptions {
    flags: Vec<bool>,
    all_exempt: bool,
    none_exempt: bool,
}

impl YieldExemptions {
    pub fn new(flags: Vec<bool>) -> Self {
        let all_exempt = flags.iter().all(|exempt| *exempt);
        let none_exempt = !flags.iter().any(|exempt| *exempt);
        Self {
            flags,
            all_exempt,
            none_exempt,
        }
    }

    /// No asset exempt
    pub fn none(token_count: usize) -> Self {
        Self::new(vec![false; token_count])
    }

    pub fn is_exempt(&self, index: usize) -> bool {
        self.flags.get(index).copied().unwrap_or(false)
    }

    pub fn all_exempt(&self) -> bool {
        self.all_exempt
    }

    pub fn none_exempt(&self) -> bool {
        self.none_exempt
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

/// The three invariants evaluated at the last amplification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrowthInvariants {
    pub swap_fee_growth: FixedPoint,
    pub total_non_exempt_growth: FixedPoint,
    pub total_growth: FixedPoint,
}

/// How growth since the last join or exit was attributed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrowthAttribution {
    pub invariants: GrowthInvariants,
    pub swap_fee_delta: FixedPoint,
    pub yield_delta: FixedPoint,
    /// Protocol's claim on the pool, in `[0, 1]`
    pub protocol_ownership_percentage: FixedPoint,
}

impl GrowthAttribution {
    fn none(total_growth: FixedPoint) -> Self {
        Self {
            invariants: GrowthInvariants {
                swap_fee_growth: total_growth,
                total_non_exempt_growth: total_growth,
                total_growth,
            },
            swap_fee_delta: FixedPoint::ZERO,
            yield_delta: FixedPoint::ZERO,
            protocol_ownership_percentage: FixedPoint::ZERO,
        }
    }
}

/// Pre-charge result handed to the join/exit math
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreJoinExit {
    /// Supply including the protocol fee shares owed for past growth
    pub virtual_supply: FixedPoint,
    /// Pool balances with the share token's own entry removed
    pub balances: Vec<FixedPoint>,
    /// Invariant of the current balances at the last amplification
    pub total_growth_invariant: FixedPoint,
    pub protocol_fee_amount: FixedPoint,
    pub attribution: GrowthAttribution,
}

/// Post-charge result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostJoinExit {
    pub invariant: FixedPoint,
    pub protocol_fee_amount: FixedPoint,
}

/// Shares that give their holder `percentage` of the supply after minting
///
/// `supply * p / (1 - p)`, rounded down.
pub fn bpt_for_pool_ownership_percentage(
    total_supply: FixedPoint,
    percentage: FixedPoint,
) -> Result<FixedPoint> {
    if percentage >= FixedPoint::ONE {
        return Err(StableMathError::InvalidFeePercentage { value: percentage });
    }
    let raw = math::mul_div(
        total_supply.raw(),
        percentage.raw(),
        percentage.complement().raw(),
        false,
    )?;
    Ok(FixedPoint::from_raw(raw))
}

/// Protocol fee accrual over the supply, rate and fee-cache collaborators
#[derive(Debug)]
pub struct ProtocolFeeAccrual<L, R, F> {
    ledger: L,
    rates: R,
    fee_cache: F,
    exemptions: YieldExemptions,
    bpt_index: Option<usize>,
    last_join_exit: LastJoinExit,
}

impl<L, R, F> ProtocolFeeAccrual<L, R, F>
where
    L: ShareLedger,
    R: TokenRates,
    F: ProtocolFeePercentages,
{
    /// `exemptions` fixes the token count; `bpt_index` is the position of the
    /// pool's own share token among registered balances, if it has one
    pub fn new(
        ledger: L,
        rates: R,
        fee_cache: F,
        exemptions: YieldExemptions,
        bpt_index: Option<usize>,
        last_join_exit: LastJoinExit,
    ) -> Self {
        Self {
            ledger,
            rates,
            fee_cache,
            exemptions,
            bpt_index,
            last_join_exit,
        }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn rates(&self) -> &R {
        &self.rates
    }

    pub fn rates_mut(&mut self) -> &mut R {
        &mut self.rates
    }

    pub fn fee_cache(&self) -> &F {
        &self.fee_cache
    }

    pub fn exemptions(&self) -> &YieldExemptions {
        &self.exemptions
    }

    pub fn last_join_exit(&self) -> LastJoinExit {
        self.last_join_exit
    }

    pub fn token_count(&self) -> usize {
        self.exemptions.len()
    }

    /// Split registered balances into the virtual supply and pool balances
    pub fn drop_bpt_item(
        &self,
        registered: &[FixedPoint],
    ) -> Result<(FixedPoint, Vec<FixedPoint>)> {
        let total_supply = self.ledger.total_supply();
        match self.bpt_index {
            None => {
                if registered.len() != self.token_count() {
                    return Err(StableMathError::LengthMismatch {
                        expected: self.token_count(),
                        actual: registered.len(),
                    });
                }
                Ok((total_supply, registered.to_vec()))
            }
            Some(bpt_index) => {
                let expected = self.token_count() + 1;
                if registered.len() != expected {
                    return Err(StableMathError::LengthMismatch {
                        expected,
                        actual: registered.len(),
                    });
                }
                let pool_held = registered.get(bpt_index).copied().ok_or(
                    StableMathError::TokenIndexOutOfBounds {
                        index: bpt_index,
                        count: expected,
                    },
                )?;
                let virtual_supply = total_supply.checked_sub(pool_held)?;
                let balances = registered
                    .iter()
                    .enumerate()
                    .filter(|(index, _)| *index != bpt_index)
                    .map(|(_, balance)| *balance)
                    .collect();
                Ok((virtual_supply, balances))
            }
        }
    }

    /// Balances with yield stripped from every rated asset, or only from the
    /// exempt ones
    fn adjusted_balances(
        &self,
        balances: &[FixedPoint],
        ignore_exempt_flags: bool,
    ) -> Result<Vec<FixedPoint>> {
        balances
            .iter()
            .enumerate()
            .map(|(index, balance)| {
                let adjust = ignore_exempt_flags || self.exemptions.is_exempt(index);
                match self.rates.rate_cache(index) {
                    Some(cache) if adjust => cache.adjust_balance(*balance),
                    _ => Ok(*balance),
                }
            })
            .collect()
    }

    /// The three growth invariants at `last_amp`
    pub fn growth_invariants(
        &self,
        balances: &[FixedPoint],
        last_amp: FixedPoint,
    ) -> Result<GrowthInvariants> {
        let swap_fee_growth =
            calculate_invariant(last_amp, &self.adjusted_balances(balances, true)?, false)?;

        let (total_non_exempt_growth, total_growth) = if self.exemptions.none_exempt() {
            let total = calculate_invariant(last_amp, balances, false)?;
            (total, total)
        } else if self.exemptions.all_exempt() {
            let total = calculate_invariant(last_amp, balances, false)?;
            (swap_fee_growth, total)
        } else {
            let non_exempt =
                calculate_invariant(last_amp, &self.adjusted_balances(balances, false)?, false)?;
            let total = calculate_invariant(last_amp, balances, false)?;
            (non_exempt, total)
        };

        let invariants = GrowthInvariants {
            swap_fee_growth,
            total_non_exempt_growth,
            total_growth,
        };
        debug!(
            %swap_fee_growth,
            %total_non_exempt_growth,
            %total_growth,
            "Growth invariants"
        );
        Ok(invariants)
    }

    /// Attribute growth since `last` and derive the protocol's ownership
    pub fn growth_attribution(
        &self,
        balances: &[FixedPoint],
        last: LastJoinExit,
    ) -> Result<GrowthAttribution> {
        let invariants = self.growth_invariants(balances, last.amplification)?;

        let swap_fee_delta = invariants.swap_fee_growth.saturating_sub(last.invariant);
        let yield_delta = invariants
            .total_non_exempt_growth
            .saturating_sub(invariants.swap_fee_growth);

        let swap_percentage = swap_fee_delta
            .div_down(invariants.total_growth)?
            .mul_down(
                self.fee_cache
                    .protocol_fee_percentage(ProtocolFeeType::Swap),
            )?;
        let yield_percentage = yield_delta
            .div_down(invariants.total_growth)?
            .mul_down(
                self.fee_cache
                    .protocol_fee_percentage(ProtocolFeeType::Yield),
            )?;

        Ok(GrowthAttribution {
            invariants,
            swap_fee_delta,
            yield_delta,
            protocol_ownership_percentage: swap_percentage.checked_add(yield_percentage)?,
        })
    }

    /// Preview the pre-charge without minting anything
    pub fn protocol_fees_before_join_exit(&self, registered: &[FixedPoint]) -> Result<PreJoinExit> {
        let (virtual_supply, balances) = self.drop_bpt_item(registered)?;
        let last = self.last_join_exit;

        // Nothing has been attributed before the first join
        if virtual_supply.is_zero() || last.invariant.is_zero() {
            let total_growth_invariant = if balances.iter().any(|b| b.is_zero()) {
                FixedPoint::ZERO
            } else {
                calculate_invariant(last.amplification, &balances, false)?
            };
            return Ok(PreJoinExit {
                virtual_supply,
                balances,
                total_growth_invariant,
                protocol_fee_amount: FixedPoint::ZERO,
                attribution: GrowthAttribution::none(total_growth_invariant),
            });
        }

        let attribution = self.growth_attribution(&balances, last)?;
        let protocol_fee_amount = bpt_for_pool_ownership_percentage(
            virtual_supply,
            attribution.protocol_ownership_percentage,
        )?;
        debug!(
            swap_fee_delta = %attribution.swap_fee_delta,
            yield_delta = %attribution.yield_delta,
            ownership = %attribution.protocol_ownership_percentage,
            %protocol_fee_amount,
            "Protocol fees before join/exit"
        );

        Ok(PreJoinExit {
            virtual_supply: virtual_supply.checked_add(protocol_fee_amount)?,
            balances,
            total_growth_invariant: attribution.invariants.total_growth,
            protocol_fee_amount,
            attribution,
        })
    }

    /// Mint the protocol's share of growth since the last join or exit
    pub fn pay_protocol_fees_before_join_exit(
        &mut self,
        registered: &[FixedPoint],
    ) -> Result<PreJoinExit> {
        let pre = self.protocol_fees_before_join_exit(registered)?;
        if !pre.protocol_fee_amount.is_zero() {
            self.ledger
                .apply_supply_change(&SupplyChange::protocol_fees(pre.protocol_fee_amount))?;
        }
        Ok(pre)
    }

    /// Post-operation invariant and the swap fees the operation itself earned
    ///
    /// Pure; see [`Self::update_invariant_after_join_exit`] for the commit.
    pub fn invariant_after_join_exit(
        &self,
        current_amp: FixedPoint,
        balances: &[FixedPoint],
        pre_invariant: FixedPoint,
        pre_supply: FixedPoint,
        post_supply: FixedPoint,
    ) -> Result<PostJoinExit> {
        // A full exit leaves nothing to measure
        if post_supply.is_zero() {
            return Ok(PostJoinExit {
                invariant: FixedPoint::ZERO,
                protocol_fee_amount: FixedPoint::ZERO,
            });
        }
        let invariant = calculate_invariant(current_amp, balances, false)?;
        let swap_percentage = self
            .fee_cache
            .protocol_fee_percentage(ProtocolFeeType::Swap);
        if swap_percentage.is_zero() || pre_supply.is_zero() {
            return Ok(PostJoinExit {
                invariant,
                protocol_fee_amount: FixedPoint::ZERO,
            });
        }

        let feeless_invariant = pre_invariant.mul_down(post_supply)?.div_down(pre_supply)?;
        let mut protocol_fee_amount = FixedPoint::ZERO;
        if invariant > feeless_invariant {
            let delta = invariant.checked_sub(feeless_invariant)?;
            let ownership = FixedPoint::from_raw(math::mul_div(
                delta.raw(),
                swap_percentage.raw(),
                invariant.raw(),
                false,
            )?);
            if !ownership.is_zero() {
                protocol_fee_amount = bpt_for_pool_ownership_percentage(post_supply, ownership)?;
            }
            debug!(
                %invariant,
                %feeless_invariant,
                %ownership,
                %protocol_fee_amount,
                "Protocol fees after join/exit"
            );
        }

        Ok(PostJoinExit {
            invariant,
            protocol_fee_amount,
        })
    }

    /// Mint the operation's protocol fees, then persist the snapshot and
    /// refresh old rates
    pub fn update_invariant_after_join_exit(
        &mut self,
        current_amp: FixedPoint,
        balances: &[FixedPoint],
        pre_invariant: FixedPoint,
        pre_supply: FixedPoint,
        post_supply: FixedPoint,
    ) -> Result<PostJoinExit> {
        let post = self.invariant_after_join_exit(
            current_amp,
            balances,
            pre_invariant,
            pre_supply,
            post_supply,
        )?;
        if !post.protocol_fee_amount.is_zero() {
            self.ledger
                .apply_supply_change(&SupplyChange::protocol_fees(post.protocol_fee_amount))?;
        }
        self.commit_join_exit(current_amp, post.invariant);
        Ok(post)
    }

    /// Apply a supply change computed elsewhere and move the snapshot forward
    ///
    /// Only the ledger call can fail, and it runs first.
    pub(crate) fn settle_join_exit(
        &mut self,
        change: &SupplyChange,
        current_amp: FixedPoint,
        invariant: FixedPoint,
    ) -> Result<()> {
        if !change.is_empty() {
            self.ledger.apply_supply_change(change)?;
        }
        self.commit_join_exit(current_amp, invariant);
        Ok(())
    }

    fn commit_join_exit(&mut self, amplification: FixedPoint, invariant: FixedPoint) {
        self.last_join_exit = LastJoinExit {
            amplification,
            invariant,
        };
        self.rates.update_old_rates();
    }

    /// Virtual supply plus protocol fees owed but not yet minted
    pub fn actual_supply(&self, registered: &[FixedPoint]) -> Result<FixedPoint> {
        Ok(self.protocol_fees_before_join_exit(registered)?.virtual_supply)
    }

    /// Invariant per share at `current_amp`
    pub fn pool_rate(
        &self,
        current_amp: FixedPoint,
        registered: &[FixedPoint],
    ) -> Result<FixedPoint> {
        let pre = self.protocol_fees_before_join_exit(registered)?;
        if pre.virtual_supply.is_zero() {
            return Err(StableMathError::ZeroSupply);
        }
        let invariant = calculate_invariant(current_amp, &pre.balances, false)?;
        Ok(invariant.div_down(pre.virtual_supply)?)
    }
}
