//! Prioritized provider fallback chain with an outbound-call cooldown

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use jewar_core::{ProviderError, ProviderResult, RawSpot, SpotPrices};

use crate::feeds::SpotPriceProvider;

/// Minimum spacing between outbound provider attempts.
///
/// Requests inside the window are skipped, not queued.
#[derive(Debug)]
pub struct Cooldown {
    period: Duration,
    last_attempt: Mutex<Option<(Instant, DateTime<Utc>)>>,
}

impl Cooldown {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            last_attempt: Mutex::new(None),
        }
    }

    /// Claim an attempt slot; false while the previous attempt is too recent
    pub fn try_begin(&self) -> bool {
        let mut last = self.last_attempt.lock();
        if let Some((at, _)) = *last {
            if at.elapsed() < self.period {
                return false;
            }
        }
        *last = Some((Instant::now(), Utc::now()));
        true
    }

    pub fn last_attempt_at(&self) -> Option<DateTime<Utc>> {
        (*self.last_attempt.lock()).map(|(_, wall)| wall)
    }
}

/// Validated spot prices and the provider that supplied them
#[derive(Debug, Clone, PartialEq)]
pub struct LiveQuote {
    pub provider: String,
    pub spot: SpotPrices,
}

/// Ordered list of providers; the first valid reading wins
pub struct ProviderChain {
    providers: Vec<Arc<dyn SpotPriceProvider>>,
    timeout: Duration,
    cooldown: Cooldown,
}

impl ProviderChain {
    pub fn new(
        providers: Vec<Arc<dyn SpotPriceProvider>>,
        timeout: Duration,
        cooldown: Duration,
    ) -> Self {
        let names: Vec<&str> = providers.iter().map(|p| p.name()).collect();
        info!("Spot provider chain: {}", names.join(" -> "));

        Self {
            providers,
            timeout,
            cooldown: Cooldown::new(cooldown),
        }
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn cooldown(&self) -> &Cooldown {
        &self.cooldown
    }

    /// Try each provider in order, subject to the cooldown.
    ///
    /// Timeouts, HTTP failures, malformed and implausible readings all move on
    /// to the next provider. The error of the last provider is returned when
    /// every one of them fails.
    pub async fn fetch(&self) -> ProviderResult<LiveQuote> {
        if self.providers.is_empty() {
            return Err(ProviderError::NoProviders);
        }

        if !self.cooldown.try_begin() {
            debug!("API call cooldown active, skipping external fetch");
            return Err(ProviderError::CooldownActive);
        }

        let mut last_error = None;

        for provider in &self.providers {
            debug!("Trying {}", provider.name());

            match self.try_provider(provider.as_ref()).await {
                Ok(spot) => {
                    info!(
                        "Fetched spot from {}: gold ${:.2}/oz, silver ${:.2}/oz",
                        provider.name(),
                        spot.gold,
                        spot.silver
                    );
                    return Ok(LiveQuote {
                        provider: provider.name().to_string(),
                        spot,
                    });
                }
                Err(e) => {
                    warn!("{} failed: {}", provider.name(), e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(ProviderError::NoProviders))
    }

    async fn try_provider(&self, provider: &dyn SpotPriceProvider) -> ProviderResult<SpotPrices> {
        let raw = self.fetch_with_timeout(provider).await?;
        raw.validate()
    }

    async fn fetch_with_timeout(&self, provider: &dyn SpotPriceProvider) -> ProviderResult<RawSpot> {
        tokio::time::timeout(self.timeout, provider.fetch_raw())
            .await
            .map_err(|_| ProviderError::Timeout)?
    }

    /// Raw reading from the primary provider, ignoring the cooldown
    pub async fn probe_primary(&self) -> Option<(String, ProviderResult<RawSpot>)> {
        let primary = self.providers.first()?;
        let result = self.fetch_with_timeout(primary.as_ref()).await;
        Some((primary.name().to_string(), result))
    }
}
