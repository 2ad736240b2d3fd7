//! Error types

use thiserror::Error;

use crate::Metal;

/// Spot-price and exchange-rate provider errors.
///
/// Every variant is a soft failure: the caller moves on to the next provider
/// or falls back to simulation.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("API returned {0}")]
    Status(u16),

    #[error("API timeout")]
    Timeout,

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Missing {0} price in response")]
    MissingField(&'static str),

    #[error("Implausible {metal} spot price: {price}")]
    Implausible { metal: Metal, price: f64 },

    #[error("Provider cooldown active")]
    CooldownActive,

    #[error("No providers configured")]
    NoProviders,
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Rate feed service errors
#[derive(Debug, Error)]
pub enum RateFeedError {
    #[error("No tokio runtime available to run the rate poller")]
    NoRuntime,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Result type alias
pub type ProviderResult<T> = Result<T, ProviderError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type RateFeedResult<T> = Result<T, RateFeedError>;
