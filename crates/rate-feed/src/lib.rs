//! Live metal-rate feed
//!
//! Features:
//! - Prioritized spot-price providers with per-call timeouts
//! - Outbound-call cooldown and cached USD to INR conversion
//! - Random-walk simulation when every provider fails
//! - Significance gate to suppress sub-threshold noise
//! - Fan-out to closure, channel and custom subscribers

pub mod chain;
pub mod currency;
pub mod feeds;
pub mod service;
pub mod simulator;
pub mod state;
pub mod status;
pub mod subscriber;

#[cfg(test)]
pub(crate) mod testing;

pub use chain::{LiveQuote, ProviderChain};
pub use feeds::{ExchangeRateSource, HttpExchangeRateSource, HttpSpotProvider, SpotPriceProvider};
pub use service::{CycleOutcome, RateFeedService, RateFeedServiceBuilder, Subscription};
pub use state::RateState;
pub use status::{format_timestamp, ApiHealth, FeedSnapshot, HealthStatus, RateStatistics};
pub use subscriber::{ChannelSubscriber, RateSubscriber, SubscriptionId};
