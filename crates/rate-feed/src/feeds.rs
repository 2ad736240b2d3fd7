//! HTTP spot-price and exchange-rate feeds

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde_json::Value;
use tracing::{debug, warn};

use jewar_core::{ProviderError, ProviderResult, RawSpot};

pub const USER_AGENT: &str = "JewarHouse/1.0";

pub const METALS_LIVE_URL: &str = "https://api.metals.live/v1/spot";
pub const METAL_PRICE_API_URL: &str =
    "https://api.metalpriceapi.com/v1/latest?api_key=demo&base=USD&symbols=XAU,XAG";
pub const METALS_LIVE_BACKUP_URL: &str = "https://api.metals.live/v1/spot/gold,silver";
pub const EXCHANGE_RATE_API_URL: &str = "https://api.exchangerate-api.com/v4/latest/USD";

/// Source of gold/silver spot prices in USD per troy ounce
#[async_trait]
pub trait SpotPriceProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch an unvalidated reading. Timeouts are applied by the caller.
    async fn fetch_raw(&self) -> ProviderResult<RawSpot>;
}

/// Source of the USD to INR exchange rate
#[async_trait]
pub trait ExchangeRateSource: Send + Sync {
    fn name(&self) -> &str;

    async fn usd_to_inr(&self) -> ProviderResult<f64>;
}

fn http_client() -> reqwest::Client {
    build_client(reqwest::Client::builder().user_agent(USER_AGENT))
}

/// Build the client, falling back to reqwest defaults (no User-Agent) on error
fn build_client(builder: reqwest::ClientBuilder) -> reqwest::Client {
    builder.build().unwrap_or_else(|e| {
        warn!("Failed to build HTTP client with {} User-Agent, using defaults: {}", USER_AGENT, e);
        reqwest::Client::default()
    })
}

async fn get_json(client: &reqwest::Client, url: &str) -> ProviderResult<Value> {
    let response = client
        .get(url)
        .header(ACCEPT, "application/json")
        .send()
        .await
        .map_err(|e| ProviderError::Http(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ProviderError::Status(status.as_u16()));
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| ProviderError::InvalidPayload(e.to_string()))
}

/// Maps a provider's JSON body onto a raw spot reading
pub type SpotExtractor = fn(&Value) -> RawSpot;

/// Spot provider backed by a JSON HTTP endpoint
pub struct HttpSpotProvider {
    name: String,
    url: String,
    client: reqwest::Client,
    extract: SpotExtractor,
}

impl HttpSpotProvider {
    pub fn new(name: impl Into<String>, url: impl Into<String>, extract: SpotExtractor) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            client: http_client(),
            extract,
        }
    }

    /// Primary feed: metals.live spot
    pub fn metals_live() -> Self {
        Self::new("metals.live", METALS_LIVE_URL, extract_metals_live)
    }

    /// Secondary feed: metalpriceapi.com, quoted in ounces per USD
    pub fn metal_price_api() -> Self {
        Self::new("metalpriceapi", METAL_PRICE_API_URL, extract_metal_price_api)
    }

    /// Last resort: metals.live per-metal endpoint
    pub fn metals_live_backup() -> Self {
        Self::new("metals.live backup", METALS_LIVE_BACKUP_URL, extract_metals_live_backup)
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SpotPriceProvider for HttpSpotProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_raw(&self) -> ProviderResult<RawSpot> {
        let body = get_json(&self.client, &self.url).await?;
        let raw = (self.extract)(&body);
        debug!("{} returned gold={:?} silver={:?}", self.name, raw.gold, raw.silver);
        Ok(raw)
    }
}

/// Default priority order
pub fn default_spot_providers() -> Vec<HttpSpotProvider> {
    vec![
        HttpSpotProvider::metals_live(),
        HttpSpotProvider::metal_price_api(),
        HttpSpotProvider::metals_live_backup(),
    ]
}

/// First non-zero number under any of `keys`.
///
/// Accepts either an object or an array of objects (metals.live answers both ways).
fn lookup(body: &Value, keys: &[&str]) -> Option<f64> {
    let from_object = |obj: &Value| {
        keys.iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_f64).filter(|v| *v != 0.0))
    };

    match body {
        Value::Array(items) => items.iter().find_map(from_object),
        other => from_object(other),
    }
}

pub fn extract_metals_live(body: &Value) -> RawSpot {
    RawSpot {
        gold: lookup(body, &["gold", "XAU", "GOLD", "au"]),
        silver: lookup(body, &["silver", "XAG", "SILVER", "ag"]),
    }
}

pub fn extract_metal_price_api(body: &Value) -> RawSpot {
    let rates = body.get("rates").unwrap_or(&Value::Null);
    let invert = |key: &str| {
        rates
            .get(key)
            .and_then(Value::as_f64)
            .filter(|v| *v > 0.0)
            .map(|ounces_per_usd| 1.0 / ounces_per_usd)
    };

    RawSpot {
        gold: invert("XAU"),
        silver: invert("XAG"),
    }
}

pub fn extract_metals_live_backup(body: &Value) -> RawSpot {
    RawSpot {
        gold: lookup(body, &["gold", "XAU"]),
        silver: lookup(body, &["silver", "XAG"]),
    }
}

/// exchangerate-api.com latest USD rates
pub struct HttpExchangeRateSource {
    url: String,
    client: reqwest::Client,
}

impl HttpExchangeRateSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: http_client(),
        }
    }

    pub fn exchange_rate_api() -> Self {
        Self::new(EXCHANGE_RATE_API_URL)
    }
}

#[async_trait]
impl ExchangeRateSource for HttpExchangeRateSource {
    fn name(&self) -> &str {
        "exchangerate-api"
    }

    async fn usd_to_inr(&self) -> ProviderResult<f64> {
        let body = get_json(&self.client, &self.url).await?;
        extract_usd_inr(&body)
    }
}

pub fn extract_usd_inr(body: &Value) -> ProviderResult<f64> {
    match body.pointer("/rates/INR").and_then(Value::as_f64) {
        Some(rate) if rate.is_finite() && rate > 0.0 => Ok(rate),
        Some(rate) => Err(ProviderError::InvalidPayload(format!("INR rate {}", rate))),
        None => Err(ProviderError::MissingField("INR")),
    }
}
