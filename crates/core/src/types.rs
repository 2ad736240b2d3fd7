//! Core type definitions

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{ProviderError, ProviderResult};

/// Grams in one troy ounce
pub const GRAMS_PER_TROY_OUNCE: f64 = 31.1035;

/// Metals quoted by the feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metal {
    Gold,
    Silver,
}

impl Metal {
    pub const ALL: [Metal; 2] = [Metal::Gold, Metal::Silver];

    pub fn name(&self) -> &'static str {
        match self {
            Metal::Gold => "gold",
            Metal::Silver => "silver",
        }
    }

    /// Per-tick simulation volatility before market factors are applied
    pub fn base_volatility(&self) -> f64 {
        match self {
            Metal::Gold => 0.003,
            Metal::Silver => 0.005,
        }
    }

    /// Plausible spot range in USD per troy ounce (both bounds exclusive)
    pub fn plausible_spot_range(&self) -> (f64, f64) {
        match self {
            Metal::Gold => (1000.0, 5000.0),
            Metal::Silver => (10.0, 100.0),
        }
    }

    pub fn is_plausible_spot(&self, usd_per_ounce: f64) -> bool {
        let (low, high) = self.plausible_spot_range();
        usd_per_ounce > low && usd_per_ounce < high
    }
}

impl fmt::Display for Metal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Karat designation; 24KT is pure metal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Purity {
    #[serde(rename = "24KT")]
    K24,
    #[serde(rename = "22KT")]
    K22,
    #[serde(rename = "20KT")]
    K20,
    #[serde(rename = "18KT")]
    K18,
    #[serde(rename = "14KT")]
    K14,
    #[serde(rename = "9KT")]
    K9,
}

impl Purity {
    pub const ALL: [Purity; 6] = [
        Purity::K24,
        Purity::K22,
        Purity::K20,
        Purity::K18,
        Purity::K14,
        Purity::K9,
    ];

    pub fn karats(&self) -> u32 {
        match self {
            Purity::K24 => 24,
            Purity::K22 => 22,
            Purity::K20 => 20,
            Purity::K18 => 18,
            Purity::K14 => 14,
            Purity::K9 => 9,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Purity::K24 => "24KT",
            Purity::K22 => "22KT",
            Purity::K20 => "20KT",
            Purity::K18 => "18KT",
            Purity::K14 => "14KT",
            Purity::K9 => "9KT",
        }
    }

    /// Fraction of the 24KT price this purity is worth
    pub fn ratio(&self) -> f64 {
        self.karats() as f64 / 24.0
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.label().eq_ignore_ascii_case(label))
    }
}

impl fmt::Display for Purity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Raw spot reading from a provider, before validation
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSpot {
    pub gold: Option<f64>,
    pub silver: Option<f64>,
}

impl RawSpot {
    /// Check completeness and plausibility.
    ///
    /// Missing, non-finite, zero or negative readings are malformed; readings
    /// outside [`Metal::plausible_spot_range`] are implausible.
    pub fn validate(&self) -> ProviderResult<SpotPrices> {
        let gold = Self::usable(Metal::Gold, self.gold)?;
        let silver = Self::usable(Metal::Silver, self.silver)?;

        for (metal, price) in [(Metal::Gold, gold), (Metal::Silver, silver)] {
            if !metal.is_plausible_spot(price) {
                return Err(ProviderError::Implausible { metal, price });
            }
        }

        Ok(SpotPrices { gold, silver })
    }

    fn usable(metal: Metal, value: Option<f64>) -> ProviderResult<f64> {
        match value {
            Some(v) if v.is_finite() && v > 0.0 => Ok(v),
            Some(v) => Err(ProviderError::InvalidPayload(format!(
                "{} spot is not a positive number: {}",
                metal, v
            ))),
            None => Err(ProviderError::MissingField(metal.name())),
        }
    }
}

/// Validated spot prices in USD per troy ounce
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpotPrices {
    pub gold: f64,
    pub silver: f64,
}

impl SpotPrices {
    pub fn get(&self, metal: Metal) -> f64 {
        match metal {
            Metal::Gold => self.gold,
            Metal::Silver => self.silver,
        }
    }
}

/// Convert a USD/troy-ounce spot into INR per 10 grams
pub fn inr_per_ten_grams(usd_per_ounce: f64, usd_to_inr: f64) -> u64 {
    let usd_per_ten_grams = usd_per_ounce * 10.0 / GRAMS_PER_TROY_OUNCE;
    (usd_per_ten_grams * usd_to_inr).round().max(0.0) as u64
}
