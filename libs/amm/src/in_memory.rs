//! In-memory collaborators for embedding and tests

use crate::errors::{Result, StableMathError};
use crate::pool_traits::{
    ProtocolFeePercentages, ProtocolFeeType, ShareLedger, SupplyChange, TokenRateCache, TokenRates,
};
use config::ProtocolFeeSettings;
use tracing::debug;
use types::FixedPoint;

/// Share supply held in memory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InMemoryShareLedger {
    total_supply: FixedPoint,
    protocol_fees_minted: FixedPoint,
}

impl InMemoryShareLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_supply(total_supply: FixedPoint) -> Self {
        Self {
            total_supply,
            protocol_fees_minted: FixedPoint::ZERO,
        }
    }

    /// Cumulative shares minted as protocol fees
    pub fn protocol_fees_minted(&self) -> FixedPoint {
        self.protocol_fees_minted
    }
}

impl ShareLedger for InMemoryShareLedger {
    fn total_supply(&self) -> FixedPoint {
        self.total_supply
    }

    fn apply_supply_change(&mut self, change: &SupplyChange) -> Result<()> {
        let grown = self
            .total_supply
            .checked_add(change.protocol_fees)?
            .checked_add(change.minted)?;
        let total_supply = grown.checked_sub(change.burned).map_err(|_| {
            StableMathError::Ledger(format!(
                "burn of {} exceeds supply {}",
                change.burned, grown
            ))
        })?;
        let protocol_fees_minted = self.protocol_fees_minted.checked_add(change.protocol_fees)?;

        self.total_supply = total_supply;
        self.protocol_fees_minted = protocol_fees_minted;
        debug!(
            total_supply = %self.total_supply,
            protocol_fees = %change.protocol_fees,
            minted = %change.minted,
            burned = %change.burned,
            "Supply change applied"
        );
        Ok(())
    }
}

/// Rate caches held in memory; assets start without a rate provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InMemoryRateCache {
    caches: Vec<Option<TokenRateCache>>,
}

impl InMemoryRateCache {
    pub fn new(token_count: usize) -> Self {
        Self {
            caches: vec![None; token_count],
        }
    }

    /// Give `index` a rate provider starting at `rate`
    pub fn with_rate_provider(mut self, index: usize, rate: FixedPoint) -> Result<Self> {
        let count = self.caches.len();
        let slot = self
            .caches
            .get_mut(index)
            .ok_or(StableMathError::TokenIndexOutOfBounds { index, count })?;
        *slot = Some(TokenRateCache::new(rate));
        Ok(self)
    }

    /// Record a new current rate; the old rate is untouched until the next join or exit
    pub fn set_current_rate(&mut self, index: usize, rate: FixedPoint) -> Result<()> {
        let count = self.caches.len();
        match self.caches.get_mut(index) {
            Some(Some(cache)) => {
                cache.current_rate = rate;
                Ok(())
            }
            // No rate provider: nothing to track
            Some(None) => Ok(()),
            None => Err(StableMathError::TokenIndexOutOfBounds { index, count }),
        }
    }
}

impl TokenRates for InMemoryRateCache {
    fn rate_cache(&self, index: usize) -> Option<TokenRateCache> {
        self.caches.get(index).copied().flatten()
    }

    fn update_old_rates(&mut self) {
        for cache in self.caches.iter_mut().flatten() {
            cache.old_rate = cache.current_rate;
        }
    }
}

/// Fixed protocol fee percentages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StaticFeeCache {
    pub swap_fee_percentage: FixedPoint,
    pub yield_fee_percentage: FixedPoint,
}

impl StaticFeeCache {
    pub fn new(swap_fee_percentage: FixedPoint, yield_fee_percentage: FixedPoint) -> Self {
        Self {
            swap_fee_percentage,
            yield_fee_percentage,
        }
    }
}

impl From<&ProtocolFeeSettings> for StaticFeeCache {
    fn from(settings: &ProtocolFeeSettings) -> Self {
        Self::new(settings.swap_fee_percentage, settings.yield_fee_percentage)
    }
}

impl ProtocolFeePercentages for StaticFeeCache {
    fn protocol_fee_percentage(&self, fee_type: ProtocolFeeType) -> FixedPoint {
        match fee_type {
            ProtocolFeeType::Swap => self.swap_fee_percentage,
            ProtocolFeeType::Yield => self.yield_fee_percentage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_applies_change_atomically() {
        let mut ledger = InMemoryShareLedger::with_supply(FixedPoint::from_units(100));
        ledger
            .apply_supply_change(&SupplyChange {
                protocol_fees: FixedPoint::from_units(1),
                minted: FixedPoint::from_units(10),
                burned: FixedPoint::from_units(5),
            })
            .unwrap();
        assert_eq!(ledger.total_supply(), FixedPoint::from_units(106));
        assert_eq!(ledger.protocol_fees_minted(), FixedPoint::from_units(1));

        let err = ledger
            .apply_supply_change(&SupplyChange {
                protocol_fees: FixedPoint::from_units(2),
                minted: FixedPoint::ZERO,
                burned: FixedPoint::from_units(200),
            })
            .unwrap_err();
        assert!(matches!(err, StableMathError::Ledger(_)));
        assert_eq!(ledger.total_supply(), FixedPoint::from_units(106));
        assert_eq!(ledger.protocol_fees_minted(), FixedPoint::from_units(1));
    }

    #[test]
    fn test_rate_cache_tracks_old_and_current() {
        let mut rates = InMemoryRateCache::new(2)
            .with_rate_provider(1, FixedPoint::ONE)
            .unwrap();
        let raised = FixedPoint::from_decimal_str("1.1").unwrap();
        rates.set_current_rate(1, raised).unwrap();
        rates.set_current_rate(0, raised).unwrap();

        assert_eq!(rates.rate_cache(0), None);
        let cache = rates.rate_cache(1).unwrap();
        assert_eq!(cache.old_rate, FixedPoint::ONE);
        assert_eq!(cache.current_rate, raised);

        rates.update_old_rates();
        assert_eq!(rates.rate_cache(1).unwrap().old_rate, raised);
        assert!(rates.set_current_rate(2, raised).is_err());
    }

    #[test]
    fn test_adjust_balance_strips_yield() {
        let cache = TokenRateCache {
            old_rate: FixedPoint::ONE,
            current_rate: FixedPoint::from_decimal_str("1.1").unwrap(),
        };
        let adjusted = cache.adjust_balance(FixedPoint::from_units(1100)).unwrap();
        assert_eq!(adjusted, FixedPoint::from_units(1000));
    }

    #[test]
    fn test_fee_cache_from_settings() {
        let settings = ProtocolFeeSettings {
            swap_fee_percentage: FixedPoint::from_decimal_str("0.5").unwrap(),
            yield_fee_percentage: FixedPoint::from_decimal_str("0.2").unwrap(),
        };
        let cache = StaticFeeCache::from(&settings);
        assert_eq!(
            cache.protocol_fee_percentage(ProtocolFeeType::Swap).to_string(),
            "0.5"
        );
        assert_eq!(
            cache.protocol_fee_percentage(ProtocolFeeType::Yield).to_string(),
            "0.2"
        );
    }
}
