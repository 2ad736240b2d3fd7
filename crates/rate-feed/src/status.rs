//! Diagnostic views of the rate feed

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use std::fmt::Display;

use jewar_core::{MarketStatus, RateTable};

/// Format used for "last updated" labels, e.g. `04/06/2024, 14:05:09 PM`
pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y, %H:%M:%S %p";

pub fn format_timestamp<Tz>(ts: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    ts.format(TIMESTAMP_FORMAT).to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Error,
}

/// Raw reading returned by a health probe
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthData {
    pub gold: Option<f64>,
    pub silver: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// Result of probing the primary spot provider
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiHealth {
    pub status: HealthStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<HealthData>,
}

impl ApiHealth {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Error,
            message: message.into(),
            data: None,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

/// Runtime configuration and bookkeeping of the service
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedSnapshot {
    pub update_interval_ms: u64,
    pub enable_live_rates: bool,
    pub subscriber_count: usize,
    pub last_update: DateTime<Utc>,
    pub usd_to_inr_rate: f64,
    pub is_updating: bool,
    pub last_api_call: Option<DateTime<Utc>>,
    pub last_currency_update: Option<DateTime<Utc>>,
}

/// Everything a "rates" diagnostics screen shows at once
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateStatistics {
    pub current_rates: RateTable,
    pub market_status: MarketStatus,
    pub config: FeedSnapshot,
    pub last_update: String,
}
