//! Collaborator interfaces for fee accrual and pool orchestration
//!
//! Supply bookkeeping, external token rates and the protocol fee cache live
//! outside the math core. [`crate::ProtocolFeeAccrual`] holds one of each and
//! calls them directly.

use crate::errors::Result;
use types::FixedPoint;

/// Protocol fee category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolFeeType {
    /// Share of swap fee growth
    Swap,
    /// Share of non-exempt yield growth
    Yield,
}

/// Rate snapshot for an asset with an external value rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenRateCache {
    /// Rate as of the last join or exit
    pub old_rate: FixedPoint,
    pub current_rate: FixedPoint,
}

impl TokenRateCache {
    pub fn new(rate: FixedPoint) -> Self {
        Self {
            old_rate: rate,
            current_rate: rate,
        }
    }

    /// `balance * old / current`, stripping yield accrued since the last join or exit
    pub fn adjust_balance(&self, balance: FixedPoint) -> Result<FixedPoint> {
        Ok(balance
            .mul_down(self.old_rate)?
            .div_down(self.current_rate)?)
    }
}

/// One atomic change to the share supply
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupplyChange {
    /// Shares minted to the protocol fee collector
    pub protocol_fees: FixedPoint,
    /// Shares minted to the liquidity provider
    pub minted: FixedPoint,
    /// Shares burned from the liquidity provider
    pub burned: FixedPoint,
}

impl SupplyChange {
    pub fn protocol_fees(amount: FixedPoint) -> Self {
        Self {
            protocol_fees: amount,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.protocol_fees.is_zero() && self.minted.is_zero() && self.burned.is_zero()
    }
}

/// Share supply ledger
pub trait ShareLedger {
    /// Total shares in existence, including any the pool holds itself
    fn total_supply(&self) -> FixedPoint;

    /// Apply every part of `change` or none of it
    fn apply_supply_change(&mut self, change: &SupplyChange) -> Result<()>;
}

/// Per-asset external rate cache, indexed like the pool balances
pub trait TokenRates {
    /// `None` for assets without a rate provider
    fn rate_cache(&self, index: usize) -> Option<TokenRateCache>;

    /// Make every current rate the new old rate
    fn update_old_rates(&mut self);
}

/// Source of protocol fee percentages
pub trait ProtocolFeePercentages {
    fn protocol_fee_percentage(&self, fee_type: ProtocolFeeType) -> FixedPoint;
}
