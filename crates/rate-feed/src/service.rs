//! Rate feed service - owns the current rate table and drives the update cycle

use chrono::{Local, Utc};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use jewar_core::{
    inr_per_ten_grams, is_significant_change, FeedConfig, MarketStatus, Metal, ProviderError,
    RateFeedError, RateFeedResult, RateSource, RateTable,
};

use crate::chain::ProviderChain;
use crate::currency::ExchangeRateCache;
use crate::feeds::{default_spot_providers, ExchangeRateSource, HttpExchangeRateSource, SpotPriceProvider};
use crate::simulator::MarketSimulator;
use crate::state::{RateState, RateStateStats};
use crate::status::{format_timestamp, ApiHealth, FeedSnapshot, HealthData, HealthStatus, RateStatistics};
use crate::subscriber::{ChannelSubscriber, RateSubscriber, SubscriptionId};

/// What an update cycle did with its computed table
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// Significant change: table replaced and subscribers notified
    Published(Arc<RateTable>),
    /// Sub-threshold change: only `last_updated` advanced, nobody notified
    TimestampOnly(Arc<RateTable>),
}

impl CycleOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, CycleOutcome::Published(_))
    }

    /// The table held after the cycle
    pub fn table(&self) -> &Arc<RateTable> {
        match self {
            CycleOutcome::Published(t) | CycleOutcome::TimestampOnly(t) => t,
        }
    }
}

struct Poller {
    shutdown: oneshot::Sender<()>,
}

struct Inner {
    config: FeedConfig,
    state: RateState,
    chain: ProviderChain,
    currency: ExchangeRateCache,
    simulator: MarketSimulator,
    /// Held for a whole cycle so cycles and forced fetches never overlap
    cycle_lock: tokio::sync::Mutex<()>,
    /// Also guards the 0<->1 subscriber transitions
    poller: Mutex<Option<Poller>>,
}

impl Inner {
    async fn run_cycle(&self) -> CycleOutcome {
        let _cycle = self.cycle_lock.lock().await;
        debug!("Updating rates");

        let previous = self.state.current();
        let candidate = self.compute_rates(&previous).await;

        if is_significant_change(Some(&previous), &candidate, self.config.significance_threshold) {
            let (published, delivered) = self.state.publish(candidate);
            info!(
                "Significant rate change ({:?}): gold 24KT {} -> {}, silver 24KT {} -> {}",
                published.source,
                previous.base(Metal::Gold),
                published.base(Metal::Gold),
                previous.base(Metal::Silver),
                published.base(Metal::Silver),
            );
            debug!("Delivered update to {} subscribers", delivered);
            CycleOutcome::Published(published)
        } else {
            debug!("No significant changes, updating timestamp only");
            CycleOutcome::TimestampOnly(self.state.touch(candidate.last_updated))
        }
    }

    async fn fetch_rates(&self) -> Arc<RateTable> {
        let _cycle = self.cycle_lock.lock().await;

        let previous = self.state.current();
        let fresh = self.compute_rates(&previous).await;
        let (published, delivered) = self.state.publish(fresh);
        info!(
            "Manual refresh published gold 24KT {}, silver 24KT {} to {} subscribers",
            published.base(Metal::Gold),
            published.base(Metal::Silver),
            delivered
        );
        published
    }

    /// Live spot prices if available, otherwise a simulated move from `previous`
    async fn compute_rates(&self, previous: &RateTable) -> RateTable {
        if self.config.enable_live_rates {
            let usd_to_inr = self.currency.refresh().await;

            match self.chain.fetch().await {
                Ok(quote) => {
                    let gold = inr_per_ten_grams(quote.spot.gold, usd_to_inr);
                    let silver = inr_per_ten_grams(quote.spot.silver, usd_to_inr);
                    info!(
                        "Live rates from {}: gold 24KT {}/10g, silver 24KT {}/10g",
                        quote.provider, gold, silver
                    );
                    return RateTable::from_bases(
                        gold,
                        silver,
                        RateSource::Live { provider: quote.provider },
                        Utc::now(),
                    );
                }
                Err(ProviderError::CooldownActive) => {}
                Err(e) => warn!("Spot providers unavailable ({}), simulating market movement", e),
            }
        }

        self.simulate(previous)
    }

    fn simulate(&self, previous: &RateTable) -> RateTable {
        let now = Local::now().naive_local();
        let step = self.simulator.step(
            previous.base(Metal::Gold),
            previous.base(Metal::Silver),
            &now,
        );

        debug!("Market factors: {:?}", step.factors);
        info!(
            "Simulated rates: gold {:+.3}%, silver {:+.3}%",
            step.gold_change * 100.0,
            step.silver_change * 100.0
        );

        RateTable::from_bases(step.gold_24kt, step.silver_24kt, RateSource::Simulated, Utc::now())
    }

    fn spawn_poller(self: &Arc<Self>, runtime: &Handle) -> Poller {
        let (shutdown, mut shutdown_rx) = oneshot::channel();
        let weak: Weak<Inner> = Arc::downgrade(self);
        let period = self.config.update_interval();

        runtime.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;

                    _ = &mut shutdown_rx => break,
                    _ = interval.tick() => {
                        let Some(inner) = weak.upgrade() else { break };
                        inner.run_cycle().await;
                    }
                }
            }

            info!("Rate poller stopped");
        });

        info!("Live updates scheduled every {:?}", period);
        Poller { shutdown }
    }

    fn remove_subscriber(&self, id: SubscriptionId) {
        let mut poller = self.poller.lock();

        if self.state.remove_subscriber(id) {
            info!("Subscriber {} removed", id);
        }

        if self.state.subscriber_count() == 0 {
            if let Some(Poller { shutdown }) = poller.take() {
                info!("Stopping live rate updates");
                let _ = shutdown.send(());
            }
        }
    }
}

/// Disposer returned by [`RateFeedService::subscribe`].
///
/// Dropping it unsubscribes, as does calling [`Subscription::unsubscribe`].
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: SubscriptionId,
    inner: Weak<Inner>,
    active: bool,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !std::mem::take(&mut self.active) {
            return;
        }
        if let Some(inner) = self.inner.upgrade() {
            inner.remove_subscriber(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

/// The process-wide live rate feed.
///
/// Cheap to clone; all clones share one rate table, one subscriber set and
/// one poller.
#[derive(Clone)]
pub struct RateFeedService {
    inner: Arc<Inner>,
}

impl RateFeedService {
    /// Service with the default HTTP providers
    pub fn new(config: FeedConfig) -> RateFeedResult<Self> {
        RateFeedServiceBuilder::new(config).build()
    }

    pub fn builder(config: FeedConfig) -> RateFeedServiceBuilder {
        RateFeedServiceBuilder::new(config)
    }

    pub fn config(&self) -> &FeedConfig {
        &self.inner.config
    }

    /// Register a subscriber and immediately hand it the current table.
    ///
    /// The first subscriber starts the poller; the first tick runs a cycle
    /// right away. Must be called from within a tokio runtime.
    pub fn subscribe<S>(&self, subscriber: S) -> RateFeedResult<Subscription>
    where
        S: RateSubscriber + 'static,
    {
        let runtime = Handle::try_current().map_err(|_| RateFeedError::NoRuntime)?;
        let subscriber: Arc<dyn RateSubscriber> = Arc::new(subscriber);

        // no cycle may publish between registration and the first delivery
        let publishing = self.inner.state.hold_publishing();

        let id = {
            let mut poller = self.inner.poller.lock();
            let id = self.inner.state.add_subscriber(Arc::clone(&subscriber));
            if poller.is_none() {
                info!("Starting live rate updates");
                *poller = Some(self.inner.spawn_poller(&runtime));
            }
            id
        };

        info!("Subscriber {} added", id);
        self.inner
            .state
            .deliver(id, subscriber.as_ref(), self.inner.state.current());
        drop(publishing);

        Ok(Subscription {
            id,
            inner: Arc::downgrade(&self.inner),
            active: true,
        })
    }

    /// Subscribe with a plain closure
    pub fn subscribe_fn<F>(&self, callback: F) -> RateFeedResult<Subscription>
    where
        F: Fn(Arc<RateTable>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.subscribe(callback)
    }

    /// Subscribe through a bounded channel, exposed as a stream
    pub fn subscribe_channel(
        &self,
        capacity: usize,
    ) -> RateFeedResult<(Subscription, ReceiverStream<Arc<RateTable>>)> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let subscription = self.subscribe(ChannelSubscriber::new(tx))?;
        Ok((subscription, ReceiverStream::new(rx)))
    }

    /// Forced refresh: always replaces the table and notifies everyone
    pub async fn fetch_rates(&self) -> Arc<RateTable> {
        info!("Manual rate fetch requested");
        self.inner.fetch_rates().await
    }

    /// Run one update cycle now, subject to the significance gate
    pub async fn run_cycle(&self) -> CycleOutcome {
        self.inner.run_cycle().await
    }

    /// Current table without any I/O
    pub fn current_rates(&self) -> Arc<RateTable> {
        self.inner.state.current()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.state.subscriber_count()
    }

    pub fn is_polling(&self) -> bool {
        self.inner.poller.lock().is_some()
    }

    pub fn market_status(&self) -> MarketStatus {
        MarketStatus::at(&Local::now().naive_local(), self.inner.simulator.draw_sentiment())
    }

    /// Probe the primary provider, bypassing the cooldown
    pub async fn check_api_health(&self) -> ApiHealth {
        info!("Checking API health");

        match self.inner.chain.probe_primary().await {
            None => ApiHealth::error("No spot providers configured"),
            Some((name, Ok(raw))) => ApiHealth {
                status: HealthStatus::Healthy,
                message: format!("{} is responding correctly", name),
                data: Some(HealthData {
                    gold: raw.gold,
                    silver: raw.silver,
                    timestamp: Utc::now(),
                }),
            },
            Some((_, Err(e))) => ApiHealth::error(e.to_string()),
        }
    }

    pub fn config_snapshot(&self) -> FeedSnapshot {
        let inner = &self.inner;

        FeedSnapshot {
            update_interval_ms: inner.config.update_interval_ms,
            enable_live_rates: inner.config.enable_live_rates,
            subscriber_count: inner.state.subscriber_count(),
            last_update: inner.state.current().last_updated,
            usd_to_inr_rate: inner.currency.rate(),
            is_updating: self.is_polling(),
            last_api_call: inner.chain.cooldown().last_attempt_at(),
            last_currency_update: inner.currency.last_updated(),
        }
    }

    pub fn rate_statistics(&self) -> RateStatistics {
        let current = self.current_rates();

        RateStatistics {
            last_update: format_timestamp(&current.last_updated.with_timezone(&Local)),
            current_rates: (*current).clone(),
            market_status: self.market_status(),
            config: self.config_snapshot(),
        }
    }

    pub fn stats(&self) -> RateStateStats {
        self.inner.state.stats()
    }
}

/// Builder for the rate feed service
pub struct RateFeedServiceBuilder {
    config: FeedConfig,
    providers: Vec<Arc<dyn SpotPriceProvider>>,
    exchange: Option<Arc<dyn ExchangeRateSource>>,
    use_default_providers: bool,
}

impl RateFeedServiceBuilder {
    pub fn new(config: FeedConfig) -> Self {
        Self {
            config,
            providers: vec![],
            exchange: None,
            use_default_providers: true,
        }
    }

    /// Append a provider; the first call replaces the default chain
    pub fn provider(mut self, provider: Arc<dyn SpotPriceProvider>) -> Self {
        self.use_default_providers = false;
        self.providers.push(provider);
        self
    }

    pub fn providers(mut self, providers: Vec<Arc<dyn SpotPriceProvider>>) -> Self {
        self.use_default_providers = false;
        self.providers = providers;
        self
    }

    pub fn exchange_source(mut self, source: Arc<dyn ExchangeRateSource>) -> Self {
        self.exchange = Some(source);
        self
    }

    pub fn build(self) -> RateFeedResult<RateFeedService> {
        let config = self.config;
        config.validate()?;

        let providers = if self.use_default_providers {
            default_spot_providers()
                .into_iter()
                .map(|p| Arc::new(p) as Arc<dyn SpotPriceProvider>)
                .collect()
        } else {
            self.providers
        };
        let exchange = self
            .exchange
            .unwrap_or_else(|| Arc::new(HttpExchangeRateSource::exchange_rate_api()));

        let inner = Inner {
            state: RateState::new(config.seed_table()),
            chain: ProviderChain::new(providers, config.provider_timeout(), config.api_cooldown()),
            currency: ExchangeRateCache::new(
                exchange,
                config.default_usd_inr,
                config.currency_refresh(),
                config.provider_timeout(),
            ),
            simulator: MarketSimulator::new(config.simulation_seed),
            cycle_lock: tokio::sync::Mutex::new(()),
            poller: Mutex::new(None),
            config,
        };

        if !inner.config.enable_live_rates {
            info!("Live rates disabled in configuration, using simulation only");
        }

        Ok(RateFeedService {
            inner: Arc::new(inner),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeExchange, FakeProvider};
    use jewar_core::{relative_change, MarketState, Purity};
    use std::time::Duration;
    use tokio_stream::StreamExt;

    type Seen = Arc<Mutex<Vec<Arc<RateTable>>>>;

    fn config() -> FeedConfig {
        FeedConfig {
            api_cooldown_ms: 0,
            simulation_seed: Some(42),
            ..Default::default()
        }
    }

    fn service(config: FeedConfig, providers: Vec<Arc<FakeProvider>>) -> RateFeedService {
        RateFeedService::builder(config)
            .providers(
                providers
                    .into_iter()
                    .map(|p| p as Arc<dyn SpotPriceProvider>)
                    .collect(),
            )
            .exchange_source(Arc::new(FakeExchange::fixed(83.5)))
            .build()
            .unwrap()
    }

    fn recorder() -> (Seen, impl Fn(Arc<RateTable>) -> anyhow::Result<()> + Send + Sync + 'static) {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |rates: Arc<RateTable>| {
            sink.lock().push(rates);
            Ok(())
        })
    }

    /// Registers straight into the state so no poller is started
    fn attach_recorder(service: &RateFeedService) -> Seen {
        let (seen, subscriber) = recorder();
        service.inner.state.add_subscriber(Arc::new(subscriber));
        seen
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribe_delivers_current_table_immediately() {
        let service = service(config(), vec![Arc::new(FakeProvider::spot("primary", 2400.0, 28.0))]);
        let (seen, subscriber) = recorder();

        let subscription = service.subscribe_fn(subscriber).unwrap();

        {
            let seen = seen.lock();
            assert_eq!(seen.len(), 1);
            assert_eq!(seen[0].get(Metal::Gold, Purity::K24), Some(99_150));
            assert_eq!(seen[0].source, RateSource::Seed);
            assert!(Arc::ptr_eq(&seen[0], &service.current_rates()));
        }
        assert!(service.is_polling());
        assert_eq!(service.subscriber_count(), 1);

        subscription.unsubscribe();
    }

    #[test]
    fn test_subscribe_requires_runtime() {
        let service = service(config(), vec![]);
        let (seen, subscriber) = recorder();

        assert!(matches!(
            service.subscribe_fn(subscriber),
            Err(RateFeedError::NoRuntime)
        ));
        assert_eq!(service.subscriber_count(), 0);
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_current_rates_is_idempotent() {
        let service = service(config(), vec![]);
        let a = service.current_rates();
        let b = service.current_rates();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(*a, *b);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = FeedConfig {
            update_interval_ms: 0,
            ..Default::default()
        };
        assert!(matches!(
            RateFeedService::builder(config).build(),
            Err(RateFeedError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_live_cycle_publishes_converted_rates() {
        let service = service(config(), vec![Arc::new(FakeProvider::spot("primary", 3000.0, 30.0))]);
        let seen = attach_recorder(&service);

        let outcome = service.run_cycle().await;
        assert!(outcome.is_published());

        let table = outcome.table();
        let gold = inr_per_ten_grams(3000.0, 83.5);
        assert_eq!(table.base(Metal::Gold), gold);
        assert_eq!(table.base(Metal::Silver), inr_per_ten_grams(30.0, 83.5));
        assert_eq!(
            table.get(Metal::Gold, Purity::K22),
            Some((gold as f64 * 22.0 / 24.0).round() as u64)
        );
        assert_eq!(table.source, RateSource::Live { provider: "primary".into() });
        assert_eq!(seen.lock().len(), 1);
        assert!(Arc::ptr_eq(&seen.lock()[0], table));
    }

    #[tokio::test]
    async fn test_sub_threshold_change_only_advances_timestamp() {
        let provider = Arc::new(FakeProvider::spot("primary", 3000.0, 30.0));
        let service = service(config(), vec![Arc::clone(&provider)]);
        let seen = attach_recorder(&service);

        let first = service.run_cycle().await;
        assert!(first.is_published());

        provider.set_spot(3000.1, 30.0);
        let second = service.run_cycle().await;
        assert!(!second.is_published());
        assert_eq!(seen.lock().len(), 1);

        let held = service.current_rates();
        assert_eq!(held.gold, first.table().gold);
        assert_eq!(held.silver, first.table().silver);
        assert!(held.last_updated >= first.table().last_updated);

        provider.set_spot(3010.0, 30.0);
        let third = service.run_cycle().await;
        assert!(third.is_published());
        assert_eq!(seen.lock().len(), 2);
        assert!(relative_change(first.table().base(Metal::Gold), third.table().base(Metal::Gold)) > 0.0005);
    }

    #[tokio::test]
    async fn test_all_providers_failing_falls_back_to_simulation() {
        let providers: Vec<Arc<FakeProvider>> = ["metals.live", "metalpriceapi", "backup"]
            .into_iter()
            .map(|name| Arc::new(FakeProvider::failing(name, 500)))
            .collect();
        // large bases and a zero threshold so any simulated move publishes
        let config = FeedConfig {
            significance_threshold: 0.0,
            default_gold_24kt: 100_000_000,
            default_silver_24kt: 10_000_000,
            ..config()
        };
        let service = service(config, providers.clone());

        let before = service.current_rates();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let outcome = service.run_cycle().await;
        let after = service.current_rates();

        assert!(providers.iter().all(|p| p.calls() == 1));
        assert!(outcome.is_published());
        assert_eq!(after.source, RateSource::Simulated);
        assert!(Arc::ptr_eq(outcome.table(), &after));
        assert!(after.last_updated > before.last_updated);
        for metal in Metal::ALL {
            let base = before.base(metal) as f64;
            let moved = (after.base(metal) as f64 - base).abs();
            assert!(moved <= base * 0.015 + 0.5, "{} moved {}", metal, moved);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_skips_providers_between_cycles() {
        let provider = Arc::new(FakeProvider::spot("primary", 3000.0, 30.0));
        let config = FeedConfig {
            api_cooldown_ms: 10_000,
            ..config()
        };
        let service = service(config, vec![Arc::clone(&provider)]);

        service.run_cycle().await;
        service.run_cycle().await;
        assert_eq!(provider.calls(), 1);

        tokio::time::advance(Duration::from_secs(10)).await;
        service.run_cycle().await;
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_forced_fetch_bypasses_significance_gate() {
        let service = service(config(), vec![Arc::new(FakeProvider::spot("primary", 3000.0, 30.0))]);
        let seen = attach_recorder(&service);

        let cycled = service.run_cycle().await;
        let forced = service.fetch_rates().await;

        assert_eq!(forced.gold, cycled.table().gold);
        assert_eq!(seen.lock().len(), 2);
        assert!(Arc::ptr_eq(&seen.lock()[1], &forced));
        assert!(Arc::ptr_eq(&service.current_rates(), &forced));
    }

    #[tokio::test]
    async fn test_disabled_live_rates_never_call_out() {
        let provider = Arc::new(FakeProvider::spot("primary", 3000.0, 30.0));
        let exchange = Arc::new(FakeExchange::fixed(84.0));
        let service = RateFeedService::builder(FeedConfig {
            enable_live_rates: false,
            ..config()
        })
        .provider(Arc::clone(&provider) as Arc<dyn SpotPriceProvider>)
        .exchange_source(Arc::clone(&exchange) as Arc<dyn ExchangeRateSource>)
        .build()
        .unwrap();

        let table = service.fetch_rates().await;
        assert_eq!(table.source, RateSource::Simulated);
        assert_eq!(provider.calls(), 0);
        assert_eq!(exchange.calls(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_initial_delivery_precedes_first_cycle_on_worker_threads() {
        for run in 0..200 {
            let config = FeedConfig {
                enable_live_rates: false,
                significance_threshold: 0.0,
                ..config()
            };
            let service = service(config, vec![]);
            let (seen, subscriber) = recorder();

            let subscription = service.subscribe_fn(subscriber).unwrap();
            tokio::time::sleep(Duration::from_millis(2)).await;
            subscription.unsubscribe();

            let seen = seen.lock();
            assert_eq!(seen[0].source, RateSource::Seed, "run {}", run);
            for pair in seen.windows(2) {
                assert!(!Arc::ptr_eq(&pair[0], &pair[1]), "run {}: table delivered twice", run);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_poller_runs_every_interval() {
        let provider = Arc::new(FakeProvider::spot("primary", 3000.0, 30.0));
        let service = service(config(), vec![Arc::clone(&provider)]);
        let (seen, subscriber) = recorder();

        let subscription = service.subscribe_fn(subscriber).unwrap();
        tokio::time::sleep(Duration::from_secs(65)).await;

        // ticks at 0s, 30s and 60s; only the first one changed anything
        assert_eq!(provider.calls(), 3);
        assert_eq!(seen.lock().len(), 2);

        drop(subscription);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsubscribing_last_subscriber_stops_polling() {
        let provider = Arc::new(FakeProvider::spot("primary", 3000.0, 30.0));
        let service = service(config(), vec![Arc::clone(&provider)]);
        let (seen, subscriber) = recorder();

        let subscription = service.subscribe_fn(subscriber).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(provider.calls(), 1);
        assert_eq!(seen.lock().len(), 2);

        subscription.unsubscribe();
        assert!(!service.is_polling());
        assert_eq!(service.subscriber_count(), 0);

        provider.set_spot(3500.0, 35.0);
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(provider.calls(), 1);
        assert_eq!(seen.lock().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poller_survives_until_last_subscriber_leaves() {
        let service = service(config(), vec![Arc::new(FakeProvider::spot("primary", 3000.0, 30.0))]);
        let (_, first) = recorder();
        let (_, second) = recorder();

        let a = service.subscribe_fn(first).unwrap();
        let b = service.subscribe_fn(second).unwrap();
        assert_ne!(a.id(), b.id());

        drop(a);
        assert!(service.is_polling());
        drop(b);
        assert!(!service.is_polling());

        // resubscribing starts a fresh poller
        let (_, third) = recorder();
        let c = service.subscribe_fn(third).unwrap();
        assert!(service.is_polling());
        c.unsubscribe();
    }

    #[tokio::test(start_paused = true)]
    async fn test_channel_subscription_streams_updates() {
        let service = service(config(), vec![Arc::new(FakeProvider::spot("primary", 3000.0, 30.0))]);
        let (subscription, mut stream) = service.subscribe_channel(8).unwrap();

        let initial = stream.next().await.unwrap();
        assert_eq!(initial.source, RateSource::Seed);

        let published = service.fetch_rates().await;
        let streamed = stream.next().await.unwrap();
        assert!(Arc::ptr_eq(&streamed, &published));

        subscription.unsubscribe();
    }

    #[tokio::test]
    async fn test_check_api_health() {
        let healthy = service(config(), vec![Arc::new(FakeProvider::spot("primary", 2400.0, 28.0))]);
        let report = healthy.check_api_health().await;
        assert!(report.is_healthy());
        assert_eq!(report.data.unwrap().gold, Some(2400.0));

        let failing = service(config(), vec![Arc::new(FakeProvider::failing("primary", 500))]);
        let report = failing.check_api_health().await;
        assert_eq!(report.status, HealthStatus::Error);
        assert_eq!(report.message, "API returned 500");
        assert!(report.data.is_none());

        let empty = service(config(), vec![]);
        assert_eq!(
            empty.check_api_health().await.message,
            "No spot providers configured"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_config_snapshot_tracks_bookkeeping() {
        let service = service(config(), vec![Arc::new(FakeProvider::spot("primary", 3000.0, 30.0))]);

        let fresh = service.config_snapshot();
        assert_eq!(fresh.update_interval_ms, 30_000);
        assert!(fresh.enable_live_rates);
        assert_eq!(fresh.usd_to_inr_rate, 83.5);
        assert!(fresh.last_api_call.is_none());
        assert!(fresh.last_currency_update.is_none());
        assert!(!fresh.is_updating);

        service.run_cycle().await;
        let after = service.config_snapshot();
        assert!(after.last_api_call.is_some());
        assert!(after.last_currency_update.is_some());
        assert_eq!(after.last_update, service.current_rates().last_updated);
    }

    #[test]
    fn test_rate_statistics() {
        let service = service(config(), vec![]);
        let stats = service.rate_statistics();

        assert_eq!(stats.current_rates, *service.current_rates());
        assert_eq!(stats.config.subscriber_count, 0);
        assert!(!stats.last_update.is_empty());
        assert_eq!(
            stats.market_status.is_open,
            stats.market_status.status == MarketState::Open
        );
    }
}
