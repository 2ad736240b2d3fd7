//! Market calendar and simulation factors

use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Local hour the market opens
pub const MARKET_OPEN_HOUR: u32 = 9;
/// Local hour the market closes (exclusive)
pub const MARKET_CLOSE_HOUR: u32 = 17;
/// Last trading hour, treated like the opening hour for volatility
pub const MARKET_CLOSING_HOUR: u32 = 16;

/// Market mood drawn once per simulated cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Neutral,
    Bullish,
    Bearish,
}

impl Sentiment {
    /// Map a uniform roll in [0, 1) to a sentiment: 60% neutral, 20% bullish, 20% bearish
    pub fn from_roll(roll: f64) -> Self {
        if roll < 0.6 {
            Sentiment::Neutral
        } else if roll < 0.8 {
            Sentiment::Bullish
        } else {
            Sentiment::Bearish
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Sentiment::Neutral => "neutral",
            Sentiment::Bullish => "bullish",
            Sentiment::Bearish => "bearish",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Inputs to one simulated price move. Recomputed every cycle, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketFactors {
    pub time_volatility: f64,
    pub sentiment: Sentiment,
    pub currency_impact: f64,
    pub weekly_trend: f64,
}

pub fn is_weekday(now: &NaiveDateTime) -> bool {
    !matches!(now.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Weekday between opening and closing hour
pub fn is_market_hours(now: &NaiveDateTime) -> bool {
    is_weekday(now) && (MARKET_OPEN_HOUR..MARKET_CLOSE_HOUR).contains(&now.hour())
}

/// Volatility multiplier for the local time of day
pub fn time_volatility(now: &NaiveDateTime) -> f64 {
    let hour = now.hour();
    if is_weekday(now) && (hour == MARKET_OPEN_HOUR || hour == MARKET_CLOSING_HOUR) {
        2.0
    } else if is_market_hours(now) {
        1.5
    } else {
        0.8
    }
}

/// Day-of-week bias: Monday up, Friday down
pub fn weekly_trend(now: &NaiveDateTime) -> f64 {
    match now.weekday() {
        Weekday::Mon => 0.0005,
        Weekday::Fri => -0.0005,
        _ => 0.0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MarketState {
    Open,
    Closed,
}

/// Snapshot of the market calendar for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketStatus {
    pub is_open: bool,
    pub next_open: String,
    pub status: MarketState,
    pub volatility: f64,
    pub sentiment: Sentiment,
}

impl MarketStatus {
    pub fn at(now: &NaiveDateTime, sentiment: Sentiment) -> Self {
        let is_open = is_market_hours(now);

        Self {
            is_open,
            next_open: next_open(now).to_string(),
            status: if is_open { MarketState::Open } else { MarketState::Closed },
            volatility: time_volatility(now),
            sentiment,
        }
    }
}

/// Human description of the next opening bell
pub fn next_open(now: &NaiveDateTime) -> &'static str {
    let before_open = now.hour() < MARKET_OPEN_HOUR;

    match now.weekday() {
        Weekday::Sat | Weekday::Sun => "Monday at 9:00 AM",
        Weekday::Fri if !before_open => "Monday at 9:00 AM",
        _ if before_open => "Today at 9:00 AM",
        _ => "Tomorrow at 9:00 AM",
    }
}
