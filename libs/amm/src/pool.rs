//! Stable pool orchestration
//!
//! Sequences every join and exit as pre-charge, quote, post-charge, and
//! commits the resulting supply change, snapshot and rate refresh only after
//! all of the fallible math has succeeded.

use crate::errors::{Result, StableMathError};
use crate::in_memory::StaticFeeCache;
use crate::invariant::{amp_precise, calculate_invariant};
use crate::liquidity_math::{
    quote_exit, quote_join, validate_swap_fee, ExitKind, ExitQuote, JoinKind, JoinQuote,
};
use crate::pool_traits::{ProtocolFeePercentages, ShareLedger, SupplyChange, TokenRates};
use crate::protocol_fees::{LastJoinExit, ProtocolFeeAccrual, YieldExemptions};
use crate::swap_math::{SwapQuote, SwapRequest};
use config::PoolConfig;
use tracing::{debug, info};
use types::FixedPoint;

/// A stable pool bound to its supply, rate and fee collaborators
///
/// Token custody stays with the caller: every operation takes the registered
/// balances as they are now and returns the amounts to move.
#[derive(Debug)]
pub struct StablePool<L, R, F> {
    amplification: FixedPoint,
    swap_fee_percentage: FixedPoint,
    accrual: ProtocolFeeAccrual<L, R, F>,
}

impl<L, R> StablePool<L, R, StaticFeeCache>
where
    L: ShareLedger,
    R: TokenRates,
{
    /// Build a pool from validated configuration
    pub fn from_config(config: &PoolConfig, ledger: L, rates: R) -> Result<Self> {
        let settings = &config.pool;
        let accrual = ProtocolFeeAccrual::new(
            ledger,
            rates,
            StaticFeeCache::from(&config.protocol_fees),
            YieldExemptions::new(config.yield_exempt_flags()),
            settings.bpt_index,
            LastJoinExit {
                amplification: settings.amplification,
                invariant: FixedPoint::ZERO,
            },
        );
        Self::new(settings.amplification, settings.swap_fee_percentage, accrual)
    }
}

impl<L, R, F> StablePool<L, R, F>
where
    L: ShareLedger,
    R: TokenRates,
    F: ProtocolFeePercentages,
{
    pub fn new(
        amplification: FixedPoint,
        swap_fee_percentage: FixedPoint,
        accrual: ProtocolFeeAccrual<L, R, F>,
    ) -> Result<Self> {
        amp_precise(amplification)?;
        validate_swap_fee(swap_fee_percentage)?;
        info!(
            %amplification,
            %swap_fee_percentage,
            tokens = accrual.token_count(),
            "Stable pool created"
        );
        Ok(Self {
            amplification,
            swap_fee_percentage,
            accrual,
        })
    }

    pub fn amplification(&self) -> FixedPoint {
        self.amplification
    }

    /// Set the current amplification; ramping schedules live elsewhere
    pub fn set_amplification(&mut self, amplification: FixedPoint) -> Result<()> {
        amp_precise(amplification)?;
        debug!(from = %self.amplification, to = %amplification, "Amplification updated");
        self.amplification = amplification;
        Ok(())
    }

    pub fn swap_fee_percentage(&self) -> FixedPoint {
        self.swap_fee_percentage
    }

    pub fn accrual(&self) -> &ProtocolFeeAccrual<L, R, F> {
        &self.accrual
    }

    pub fn accrual_mut(&mut self) -> &mut ProtocolFeeAccrual<L, R, F> {
        &mut self.accrual
    }

    /// Quote a swap against the pool balances; no state changes
    pub fn swap(&self, registered: &[FixedPoint], request: &SwapRequest) -> Result<SwapQuote> {
        let (_, balances) = self.accrual.drop_bpt_item(registered)?;
        request.quote(&balances, self.amplification)
    }

    /// Invariant of the pool balances at the current amplification
    pub fn invariant(&self, registered: &[FixedPoint]) -> Result<FixedPoint> {
        let (_, balances) = self.accrual.drop_bpt_item(registered)?;
        calculate_invariant(self.amplification, &balances, false)
    }

    /// Join the pool, minting protocol fees and the caller's shares
    pub fn join(&mut self, registered: &[FixedPoint], kind: &JoinKind) -> Result<JoinQuote> {
        let amp = self.amplification;

        if let JoinKind::Init { .. } = kind {
            let (virtual_supply, balances) = self.accrual.drop_bpt_item(registered)?;
            let quote =
                quote_join(amp, &balances, virtual_supply, self.swap_fee_percentage, kind)?;
            let change = SupplyChange {
                minted: quote.shares_out,
                ..SupplyChange::default()
            };
            self.accrual.settle_join_exit(&change, amp, quote.shares_out)?;
            info!(shares_out = %quote.shares_out, "Pool initialized");
            return Ok(quote);
        }

        let pre = self.accrual.protocol_fees_before_join_exit(registered)?;
        let pre_invariant =
            self.pre_join_exit_invariant(amp, &pre.balances, pre.total_growth_invariant)?;
        let quote = quote_join(
            amp,
            &pre.balances,
            pre.virtual_supply,
            self.swap_fee_percentage,
            kind,
        )?;

        let post_balances = pre
            .balances
            .iter()
            .zip(&quote.amounts_in)
            .map(|(balance, amount)| Ok(balance.checked_add(*amount)?))
            .collect::<Result<Vec<_>>>()?;
        let post_supply = pre.virtual_supply.checked_add(quote.shares_out)?;
        let post = self.accrual.invariant_after_join_exit(
            amp,
            &post_balances,
            pre_invariant,
            pre.virtual_supply,
            post_supply,
        )?;

        let change = SupplyChange {
            protocol_fees: pre.protocol_fee_amount.checked_add(post.protocol_fee_amount)?,
            minted: quote.shares_out,
            burned: FixedPoint::ZERO,
        };
        self.accrual.settle_join_exit(&change, amp, post.invariant)?;
        debug!(
            shares_out = %quote.shares_out,
            protocol_fees = %change.protocol_fees,
            invariant = %post.invariant,
            "Join settled"
        );
        Ok(quote)
    }

    /// Exit the pool, minting protocol fees and burning the caller's shares
    pub fn exit(&mut self, registered: &[FixedPoint], kind: &ExitKind) -> Result<ExitQuote> {
        let amp = self.amplification;

        let pre = self.accrual.protocol_fees_before_join_exit(registered)?;
        let pre_invariant =
            self.pre_join_exit_invariant(amp, &pre.balances, pre.total_growth_invariant)?;
        let quote = quote_exit(
            amp,
            &pre.balances,
            pre.virtual_supply,
            self.swap_fee_percentage,
            kind,
        )?;

        let post_balances = pre
            .balances
            .iter()
            .zip(&quote.amounts_out)
            .enumerate()
            .map(|(index, (balance, amount))| {
                balance
                    .checked_sub(*amount)
                    .map_err(|_| StableMathError::AmountExceedsBalance {
                        index,
                        amount: *amount,
                        balance: *balance,
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        let post_supply = pre.virtual_supply.checked_sub(quote.shares_in)?;
        let post = self.accrual.invariant_after_join_exit(
            amp,
            &post_balances,
            pre_invariant,
            pre.virtual_supply,
            post_supply,
        )?;

        let change = SupplyChange {
            protocol_fees: pre.protocol_fee_amount.checked_add(post.protocol_fee_amount)?,
            minted: FixedPoint::ZERO,
            burned: quote.shares_in,
        };
        self.accrual.settle_join_exit(&change, amp, post.invariant)?;
        debug!(
            shares_in = %quote.shares_in,
            protocol_fees = %change.protocol_fees,
            invariant = %post.invariant,
            "Exit settled"
        );
        Ok(quote)
    }

    /// The growth invariant is reusable only while the amplification is unchanged
    fn pre_join_exit_invariant(
        &self,
        amp: FixedPoint,
        balances: &[FixedPoint],
        total_growth_invariant: FixedPoint,
    ) -> Result<FixedPoint> {
        if amp == self.accrual.last_join_exit().amplification {
            Ok(total_growth_invariant)
        } else {
            calculate_invariant(amp, balances, false)
        }
    }
}
