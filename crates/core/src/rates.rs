//! Rate tables: per-purity prices per 10 grams in INR

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{Metal, Purity};

/// Prices for one metal keyed by purity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PurityRates(BTreeMap<Purity, u64>);

impl PurityRates {
    /// Derive every purity from a 24KT base using the karat ratio
    pub fn derive(base_24kt: u64) -> Self {
        let rates = Purity::ALL
            .into_iter()
            .map(|p| (p, derive_purity(base_24kt, p)))
            .collect();
        Self(rates)
    }

    /// Derive from a base, then pin the given purities to explicit values
    pub fn derive_with_overrides(
        base_24kt: u64,
        overrides: impl IntoIterator<Item = (Purity, u64)>,
    ) -> Self {
        let mut rates = Self::derive(base_24kt);
        for (purity, value) in overrides {
            if purity != Purity::K24 {
                rates.0.insert(purity, value);
            }
        }
        rates
    }

    /// The 24KT base price
    pub fn base(&self) -> u64 {
        self.get(Purity::K24).unwrap_or(0)
    }

    pub fn get(&self, purity: Purity) -> Option<u64> {
        self.0.get(&purity).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Purity, u64)> + '_ {
        self.0.iter().map(|(p, v)| (*p, *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// round(base * karats / 24), half away from zero
pub fn derive_purity(base_24kt: u64, purity: Purity) -> u64 {
    (base_24kt as f64 * purity.karats() as f64 / 24.0).round() as u64
}

/// Where a table's prices came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RateSource {
    /// Configured defaults, before any cycle ran
    Seed,
    /// Spot prices from an external provider
    Live { provider: String },
    /// Random-walk simulation from the previous table
    Simulated,
}

/// Full set of current metal prices with a timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateTable {
    pub gold: PurityRates,
    pub silver: PurityRates,
    pub last_updated: DateTime<Utc>,
    pub source: RateSource,
}

impl RateTable {
    /// Build a table by deriving both metals from their 24KT bases
    pub fn from_bases(
        gold_24kt: u64,
        silver_24kt: u64,
        source: RateSource,
        last_updated: DateTime<Utc>,
    ) -> Self {
        Self {
            gold: PurityRates::derive(gold_24kt),
            silver: PurityRates::derive(silver_24kt),
            last_updated,
            source,
        }
    }

    pub fn metal(&self, metal: Metal) -> &PurityRates {
        match metal {
            Metal::Gold => &self.gold,
            Metal::Silver => &self.silver,
        }
    }

    pub fn base(&self, metal: Metal) -> u64 {
        self.metal(metal).base()
    }

    pub fn get(&self, metal: Metal, purity: Purity) -> Option<u64> {
        self.metal(metal).get(purity)
    }

    /// Same prices with a newer timestamp
    pub fn touched(&self, last_updated: DateTime<Utc>) -> Self {
        Self {
            last_updated,
            ..self.clone()
        }
    }
}

/// Relative change of a 24KT base; a zero previous base counts as a full change
pub fn relative_change(previous: u64, next: u64) -> f64 {
    if previous == 0 {
        return if next == 0 { 0.0 } else { f64::INFINITY };
    }
    (next as f64 - previous as f64).abs() / previous as f64
}

/// Significance gate.
///
/// A new table is significant when there is no previous table or when either
/// metal's 24KT price moved by more than `threshold` (relative).
pub fn is_significant_change(previous: Option<&RateTable>, next: &RateTable, threshold: f64) -> bool {
    let Some(previous) = previous else {
        return true;
    };

    Metal::ALL
        .iter()
        .any(|m| relative_change(previous.base(*m), next.base(*m)) > threshold)
}
