//! In-memory providers for tests

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use jewar_core::{ProviderError, ProviderResult, RawSpot};

use crate::feeds::{ExchangeRateSource, SpotPriceProvider};

#[derive(Debug, Clone, Copy)]
enum Reply {
    Spot(RawSpot),
    Status(u16),
}

pub(crate) struct FakeProvider {
    name: String,
    reply: Mutex<Reply>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl FakeProvider {
    fn with_reply(name: &str, reply: Reply) -> Self {
        Self {
            name: name.to_string(),
            reply: Mutex::new(reply),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn spot(name: &str, gold: f64, silver: f64) -> Self {
        Self::raw(name, RawSpot { gold: Some(gold), silver: Some(silver) })
    }

    pub fn raw(name: &str, raw: RawSpot) -> Self {
        Self::with_reply(name, Reply::Spot(raw))
    }

    pub fn failing(name: &str, status: u16) -> Self {
        Self::with_reply(name, Reply::Status(status))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_spot(&self, gold: f64, silver: f64) {
        *self.reply.lock() = Reply::Spot(RawSpot { gold: Some(gold), silver: Some(silver) });
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpotPriceProvider for FakeProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_raw(&self) -> ProviderResult<RawSpot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let reply = *self.reply.lock();
        match reply {
            Reply::Spot(raw) => Ok(raw),
            Reply::Status(code) => Err(ProviderError::Status(code)),
        }
    }
}

pub(crate) struct FakeExchange {
    rate: Mutex<Option<f64>>,
    calls: AtomicUsize,
}

impl FakeExchange {
    pub fn fixed(rate: f64) -> Self {
        Self {
            rate: Mutex::new(Some(rate)),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            rate: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_rate(&self, rate: Option<f64>) {
        *self.rate.lock() = rate;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExchangeRateSource for FakeExchange {
    fn name(&self) -> &str {
        "fake-exchange"
    }

    async fn usd_to_inr(&self) -> ProviderResult<f64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let rate = *self.rate.lock();
        rate.ok_or(ProviderError::Http("connection refused".into()))
    }
}
