//! Random-walk market simulation used when live feeds are unavailable

use chrono::NaiveDateTime;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use jewar_core::{market, MarketFactors, Metal, Sentiment};

/// Largest move a single simulated cycle may produce, either direction
pub const MAX_FLUCTUATION: f64 = 0.015;
/// Largest sentiment bias added on a bullish or bearish draw
pub const MAX_SENTIMENT_BIAS: f64 = 0.002;
/// Half-width of the currency impact term
pub const MAX_CURRENCY_IMPACT: f64 = 0.001;

/// Fractional change for one metal.
///
/// `noise` is a uniform draw in [-1, 1] and `bias_roll` a uniform draw in
/// [0, 1); the result is clamped to +/- [`MAX_FLUCTUATION`].
pub fn fluctuation(metal: Metal, factors: &MarketFactors, noise: f64, bias_roll: f64) -> f64 {
    let mut change = noise * metal.base_volatility() * factors.time_volatility;

    change += match factors.sentiment {
        Sentiment::Neutral => 0.0,
        Sentiment::Bullish => bias_roll * MAX_SENTIMENT_BIAS,
        Sentiment::Bearish => -bias_roll * MAX_SENTIMENT_BIAS,
    };
    change += factors.currency_impact;
    change += factors.weekly_trend;

    change.clamp(-MAX_FLUCTUATION, MAX_FLUCTUATION)
}

/// round(previous * (1 + change))
pub fn apply_change(previous: u64, change: f64) -> u64 {
    (previous as f64 * (1.0 + change)).round().max(0.0) as u64
}

/// Outcome of one simulated cycle
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimulatedMove {
    pub gold_24kt: u64,
    pub silver_24kt: u64,
    pub gold_change: f64,
    pub silver_change: f64,
    pub factors: MarketFactors,
}

/// Market simulator owning its random source
pub struct MarketSimulator {
    rng: Mutex<StdRng>,
}

impl MarketSimulator {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng: Mutex::new(rng) }
    }

    pub fn draw_sentiment(&self) -> Sentiment {
        Sentiment::from_roll(self.rng.lock().gen::<f64>())
    }

    /// Draw this cycle's market factors for the given local time
    pub fn draw_factors(&self, now: &NaiveDateTime) -> MarketFactors {
        let mut rng = self.rng.lock();

        MarketFactors {
            time_volatility: market::time_volatility(now),
            sentiment: Sentiment::from_roll(rng.gen::<f64>()),
            currency_impact: rng.gen_range(-MAX_CURRENCY_IMPACT..=MAX_CURRENCY_IMPACT),
            weekly_trend: market::weekly_trend(now),
        }
    }

    fn draw_fluctuation(&self, metal: Metal, factors: &MarketFactors) -> f64 {
        let mut rng = self.rng.lock();
        let noise = rng.gen_range(-1.0..=1.0);
        let bias_roll = rng.gen::<f64>();
        fluctuation(metal, factors, noise, bias_roll)
    }

    /// Move both 24KT bases from their previous values.
    ///
    /// Both metals share one set of factors but differ in base volatility.
    pub fn step(&self, previous_gold: u64, previous_silver: u64, now: &NaiveDateTime) -> SimulatedMove {
        let factors = self.draw_factors(now);
        let gold_change = self.draw_fluctuation(Metal::Gold, &factors);
        let silver_change = self.draw_fluctuation(Metal::Silver, &factors);

        SimulatedMove {
            gold_24kt: apply_change(previous_gold, gold_change),
            silver_24kt: apply_change(previous_silver, silver_change),
            gold_change,
            silver_change,
            factors,
        }
    }
}
