//! Configuration types

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{ConfigError, ConfigResult, Purity, PurityRates, RateSource, RateTable};

/// Prefix for environment variables, e.g. `RATE_FEED_UPDATE_INTERVAL_MS`
pub const ENV_PREFIX: &str = "RATE_FEED";

/// Rate feed configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub update_interval_ms: u64,
    /// When false, no external calls are made and every cycle is simulated
    pub enable_live_rates: bool,
    /// Relative 24KT change a cycle must exceed to notify subscribers
    pub significance_threshold: f64,
    /// Minimum time between provider attempts
    pub api_cooldown_ms: u64,
    pub provider_timeout_ms: u64,
    /// USD to INR cache lifetime
    pub currency_refresh_ms: u64,
    pub default_usd_inr: f64,

    // Seed prices per 10g; unset purities are derived from 24KT
    pub default_gold_24kt: u64,
    pub default_gold_22kt: Option<u64>,
    pub default_gold_20kt: Option<u64>,
    pub default_gold_18kt: Option<u64>,
    pub default_gold_14kt: Option<u64>,
    pub default_gold_9kt: Option<u64>,
    pub default_silver_24kt: u64,
    pub default_silver_22kt: Option<u64>,
    pub default_silver_20kt: Option<u64>,
    pub default_silver_18kt: Option<u64>,
    pub default_silver_14kt: Option<u64>,
    pub default_silver_9kt: Option<u64>,

    /// Fixed seed for the simulator's random source
    pub simulation_seed: Option<u64>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: 30_000,
            enable_live_rates: true,
            significance_threshold: 0.0005,  // 0.05%
            api_cooldown_ms: 10_000,
            provider_timeout_ms: 5_000,
            currency_refresh_ms: 300_000,  // 5 minutes
            default_usd_inr: 83.50,

            default_gold_24kt: 99_150,
            default_gold_22kt: Some(90_891),
            default_gold_20kt: Some(83_592),
            default_gold_18kt: Some(75_563),
            default_gold_14kt: Some(57_834),
            default_gold_9kt: None,
            default_silver_24kt: 1_065,
            default_silver_22kt: Some(1_007),
            default_silver_20kt: None,
            default_silver_18kt: Some(829),
            default_silver_14kt: Some(651),
            default_silver_9kt: Some(429),

            simulation_seed: None,
        }
    }
}

impl FeedConfig {
    /// Load from `RATE_FEED_*` environment variables over the defaults
    pub fn from_env() -> ConfigResult<Self> {
        let cfg: Self = ::config::Config::builder()
            .add_source(::config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .map_err(|e| ConfigError::Load(e.to_string()))?
            .try_deserialize()
            .map_err(|e| ConfigError::Load(e.to_string()))?;

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.update_interval_ms == 0 {
            return Err(ConfigError::Invalid("update_interval_ms must be > 0".into()));
        }
        if !self.significance_threshold.is_finite() || self.significance_threshold < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "significance_threshold must be a non-negative number, got {}",
                self.significance_threshold
            )));
        }
        if !self.default_usd_inr.is_finite() || self.default_usd_inr <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "default_usd_inr must be positive, got {}",
                self.default_usd_inr
            )));
        }
        if self.default_gold_24kt == 0 || self.default_silver_24kt == 0 {
            return Err(ConfigError::Invalid("24KT seed prices must be > 0".into()));
        }
        Ok(())
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    pub fn api_cooldown(&self) -> Duration {
        Duration::from_millis(self.api_cooldown_ms)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }

    pub fn currency_refresh(&self) -> Duration {
        Duration::from_millis(self.currency_refresh_ms)
    }

    /// Initial table served before any cycle runs
    pub fn seed_table(&self) -> RateTable {
        let gold_overrides = [
            (Purity::K22, self.default_gold_22kt),
            (Purity::K20, self.default_gold_20kt),
            (Purity::K18, self.default_gold_18kt),
            (Purity::K14, self.default_gold_14kt),
            (Purity::K9, self.default_gold_9kt),
        ];
        let silver_overrides = [
            (Purity::K22, self.default_silver_22kt),
            (Purity::K20, self.default_silver_20kt),
            (Purity::K18, self.default_silver_18kt),
            (Purity::K14, self.default_silver_14kt),
            (Purity::K9, self.default_silver_9kt),
        ];

        RateTable {
            gold: PurityRates::derive_with_overrides(
                self.default_gold_24kt,
                gold_overrides.into_iter().filter_map(|(p, v)| v.map(|v| (p, v))),
            ),
            silver: PurityRates::derive_with_overrides(
                self.default_silver_24kt,
                silver_overrides.into_iter().filter_map(|(p, v)| v.map(|v| (p, v))),
            ),
            last_updated: Utc::now(),
            source: RateSource::Seed,
        }
    }
}
