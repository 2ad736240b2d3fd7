//! Cached USD to INR exchange rate

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use jewar_core::ProviderError;

use crate::feeds::ExchangeRateSource;

#[derive(Debug, Clone, Copy)]
struct CachedRate {
    rate: f64,
    fetched_at: Option<Instant>,
    updated_at: Option<DateTime<Utc>>,
}

/// Exchange rate refreshed at most once per `refresh_every`.
///
/// A failed refresh keeps the last known rate and is retried next cycle.
pub struct ExchangeRateCache {
    source: Arc<dyn ExchangeRateSource>,
    refresh_every: Duration,
    timeout: Duration,
    cached: RwLock<CachedRate>,
}

impl ExchangeRateCache {
    pub fn new(
        source: Arc<dyn ExchangeRateSource>,
        initial_rate: f64,
        refresh_every: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            source,
            refresh_every,
            timeout,
            cached: RwLock::new(CachedRate {
                rate: initial_rate,
                fetched_at: None,
                updated_at: None,
            }),
        }
    }

    /// Current rate without any I/O
    pub fn rate(&self) -> f64 {
        self.cached.read().rate
    }

    /// Wall-clock time of the last successful refresh
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.cached.read().updated_at
    }

    fn is_fresh(&self) -> bool {
        self.cached
            .read()
            .fetched_at
            .map(|at| at.elapsed() < self.refresh_every)
            .unwrap_or(false)
    }

    /// Refresh if the cache expired and return the rate to use this cycle
    pub async fn refresh(&self) -> f64 {
        if self.is_fresh() {
            return self.rate();
        }

        debug!("Fetching USD to INR rate from {}", self.source.name());

        let fetched = tokio::time::timeout(self.timeout, self.source.usd_to_inr())
            .await
            .map_err(|_| ProviderError::Timeout)
            .and_then(|r| r);

        match fetched {
            Ok(rate) if rate.is_finite() && rate > 0.0 => {
                let mut cached = self.cached.write();
                if (rate - cached.rate).abs() > f64::EPSILON {
                    info!("Updated USD to INR rate: {:.4} -> {:.4}", cached.rate, rate);
                }
                *cached = CachedRate {
                    rate,
                    fetched_at: Some(Instant::now()),
                    updated_at: Some(Utc::now()),
                };
                rate
            }
            Ok(rate) => {
                warn!("Ignoring invalid USD to INR rate {}", rate);
                self.rate()
            }
            Err(e) => {
                warn!("Failed to fetch USD to INR rate, keeping {:.4}: {}", self.rate(), e);
                self.rate()
            }
        }
    }
}
