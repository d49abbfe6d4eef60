//! Pool Configuration Module
//!
//! Provides configuration loading and validation for a stable pool.
//! Supports loading from TOML files with environment-specific overrides.

use crate::constants::{amplification, fees, pool};
use anyhow::{bail, Context, Result};
use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use types::{FixedPoint, U256};

/// Main pool configuration structure
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PoolConfig {
    /// Curve and token settings
    pub pool: PoolSettings,

    /// Protocol fee percentages served by the fee cache
    #[serde(default)]
    pub protocol_fees: ProtocolFeeSettings,
}

/// Curve and token settings
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PoolSettings {
    /// Number of pooled assets, excluding the pool's own share token
    pub token_count: usize,

    /// Amplification coefficient, whole units (e.g. "200")
    pub amplification: FixedPoint,

    /// Swap fee charged on the non-proportional part of joins and exits
    pub swap_fee_percentage: FixedPoint,

    /// Position of the pool's own share token among registered balances
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bpt_index: Option<usize>,

    /// Per-asset yield fee exemption, indexed like the balances
    #[serde(default)]
    pub yield_exempt: Vec<bool>,
}

/// Protocol fee percentages
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ProtocolFeeSettings {
    /// Protocol share of swap fee growth
    #[serde(default)]
    pub swap_fee_percentage: FixedPoint,

    /// Protocol share of non-exempt yield growth
    #[serde(default)]
    pub yield_fee_percentage: FixedPoint,
}

impl PoolConfig {
    /// Load configuration from files with environment overrides
    pub fn load(base_path: Option<&Path>, environment: Option<&str>) -> Result<Self> {
        let base = base_path.unwrap_or(Path::new("config/pool.toml"));

        let mut builder = Config::builder().add_source(File::from(base).required(true));

        // Add environment-specific overrides if specified
        if let Some(env) = environment {
            let env_file = PathBuf::from("config/environments").join(format!("{}.toml", env));

            if env_file.exists() {
                info!("Loading environment config: {:?}", env_file);
                builder = builder.add_source(File::from(env_file));
            } else {
                warn!("Environment config not found: {:?}", env_file);
            }
        }

        // Override with environment variables (STABLESWAP__POOL__SWAP_FEE_PERCENTAGE=...)
        builder = builder.add_source(Environment::with_prefix("STABLESWAP").separator("__"));

        let config = builder.build().context("Failed to build configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document directly, without file or environment layering
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents).context("Failed to parse pool configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Render the configuration back to TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).context("Failed to serialize pool configuration")
    }

    /// Check every bound the math core relies on
    pub fn validate(&self) -> Result<()> {
        let settings = &self.pool;

        if !(pool::MIN_TOKENS..=pool::MAX_TOKENS).contains(&settings.token_count) {
            bail!(
                "token_count {} outside [{}, {}]",
                settings.token_count,
                pool::MIN_TOKENS,
                pool::MAX_TOKENS
            );
        }

        let min_amp = FixedPoint::from_units(amplification::MIN_AMP);
        let max_amp = FixedPoint::from_units(amplification::MAX_AMP);
        if settings.amplification < min_amp || settings.amplification > max_amp {
            bail!(
                "amplification {} outside [{}, {}]",
                settings.amplification,
                min_amp,
                max_amp
            );
        }

        let amp_step = FixedPoint::ONE.raw() / U256::from(amplification::AMP_PRECISION);
        if !(settings.amplification.raw() % amp_step).is_zero() {
            bail!(
                "amplification {} finer than 1/{}",
                settings.amplification,
                amplification::AMP_PRECISION
            );
        }

        let max_swap_fee = FixedPoint::from_raw(U256::from(fees::MAX_SWAP_FEE_PERCENTAGE));
        if settings.swap_fee_percentage > max_swap_fee {
            bail!(
                "swap_fee_percentage {} exceeds maximum {}",
                settings.swap_fee_percentage,
                max_swap_fee
            );
        }

        let max_protocol_fee =
            FixedPoint::from_raw(U256::from(fees::MAX_PROTOCOL_FEE_PERCENTAGE));
        for (name, value) in [
            ("protocol swap_fee_percentage", self.protocol_fees.swap_fee_percentage),
            ("protocol yield_fee_percentage", self.protocol_fees.yield_fee_percentage),
        ] {
            if value > max_protocol_fee {
                bail!("{} {} exceeds maximum {}", name, value, max_protocol_fee);
            }
        }

        if let Some(bpt_index) = settings.bpt_index {
            // Registered balances carry the share token as one extra entry
            if bpt_index > settings.token_count {
                bail!(
                    "bpt_index {} outside registered token range 0..={}",
                    bpt_index,
                    settings.token_count
                );
            }
        }

        if !settings.yield_exempt.is_empty() && settings.yield_exempt.len() != settings.token_count
        {
            bail!(
                "yield_exempt has {} entries, expected {}",
                settings.yield_exempt.len(),
                settings.token_count
            );
        }

        debug!(
            token_count = settings.token_count,
            amplification = %settings.amplification,
            "Pool configuration validated"
        );
        Ok(())
    }

    /// Exemption flags padded to `token_count` (missing means not exempt)
    pub fn yield_exempt_flags(&self) -> Vec<bool> {
        let mut flags = self.pool.yield_exempt.clone();
        flags.resize(self.pool.token_count, false);
        flags
    }
}

/// Convenience function to load configuration with defaults
pub fn load_config(environment: Option<&str>) -> Result<PoolConfig> {
    PoolConfig::load(None, environment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const BASE_CONFIG: &str = r#"
[pool]
token_count = 3
amplification = "200"
swap_fee_percentage = "0.0004"
bpt_index = 0
yield_exempt = [false, true, false]

[protocol_fees]
swap_fee_percentage = "0.5"
yield_fee_percentage = "0.5"
"#;

    #[test]
    fn test_load_base_config() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("pool.toml");
        fs::write(&config_path, BASE_CONFIG).unwrap();

        let config = PoolConfig::load(Some(&config_path), None).unwrap();

        assert_eq!(config.pool.token_count, 3);
        assert_eq!(config.pool.amplification, FixedPoint::from_units(200));
        assert_eq!(config.pool.swap_fee_percentage.to_string(), "0.0004");
        assert_eq!(config.pool.bpt_index, Some(0));
        assert_eq!(config.yield_exempt_flags(), vec![false, true, false]);
        assert_eq!(config.protocol_fees.yield_fee_percentage.to_string(), "0.5");
    }

    #[test]
    fn test_from_toml_str_defaults() {
        let config = PoolConfig::from_toml_str(
            r#"
[pool]
token_count = 2
amplification = "100"
swap_fee_percentage = "0.001"
"#,
        )
        .unwrap();

        assert_eq!(config.pool.bpt_index, None);
        assert_eq!(config.yield_exempt_flags(), vec![false, false]);
        assert!(config.protocol_fees.swap_fee_percentage.is_zero());

        let rendered = config.to_toml_string().unwrap();
        let reparsed = PoolConfig::from_toml_str(&rendered).unwrap();
        assert_eq!(reparsed.pool.amplification, config.pool.amplification);
    }

    #[test]
    fn test_validation_rejects_out_of_range_values() {
        let too_many_tokens = BASE_CONFIG.replace("token_count = 3", "token_count = 6");
        assert!(PoolConfig::from_toml_str(&too_many_tokens).is_err());

        let huge_amp = BASE_CONFIG.replace("amplification = \"200\"", "amplification = \"5001\"");
        assert!(PoolConfig::from_toml_str(&huge_amp).is_err());

        let huge_fee = BASE_CONFIG.replace(
            "swap_fee_percentage = \"0.0004\"",
            "swap_fee_percentage = \"0.2\"",
        );
        assert!(PoolConfig::from_toml_str(&huge_fee).is_err());

        let bad_flags = BASE_CONFIG.replace("[false, true, false]", "[false, true]");
        assert!(PoolConfig::from_toml_str(&bad_flags).is_err());
    }

    #[test]
    fn test_validation_checks_amplification_precision() {
        let too_fine =
            BASE_CONFIG.replace("amplification = \"200\"", "amplification = \"100.0001\"");
        let err = PoolConfig::from_toml_str(&too_fine).unwrap_err();
        assert!(err.to_string().contains("finer than 1/1000"));

        let fractional =
            BASE_CONFIG.replace("amplification = \"200\"", "amplification = \"100.125\"");
        let config = PoolConfig::from_toml_str(&fractional).unwrap();
        assert_eq!(config.pool.amplification.to_string(), "100.125");
    }

    #[test]
    fn test_package_metadata_inherited_from_workspace() {
        assert_eq!(env!("CARGO_PKG_LICENSE"), "MIT OR Apache-2.0");
        assert_eq!(env!("CARGO_PKG_VERSION"), "0.1.0");
    }
}
