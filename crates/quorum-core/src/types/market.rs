//! Per-interval market view consumed by the strategy evaluators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A short window of an indicator: the current closed interval plus the
/// two before it. Index 0 semantics match the lookback arrays on
/// [`MarketSnapshot`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSeries {
    pub current: f64,
    pub previous: f64,
    pub prior: f64,
}

impl IndicatorSeries {
    pub fn new(current: f64, previous: f64, prior: f64) -> Self {
        Self {
            current,
            previous,
            prior,
        }
    }

    pub fn flat(value: f64) -> Self {
        Self::new(value, value, value)
    }

    pub fn rising(&self) -> bool {
        self.current > self.previous
    }

    pub fn falling(&self) -> bool {
        self.current < self.previous
    }

    /// Strictly rising across the whole window.
    pub fn rising_throughout(&self) -> bool {
        self.current > self.previous && self.previous > self.prior
    }

    pub fn falling_throughout(&self) -> bool {
        self.current < self.previous && self.previous < self.prior
    }

    fn is_finite(&self) -> bool {
        self.current.is_finite() && self.previous.is_finite() && self.prior.is_finite()
    }
}

/// Higher-timeframe directional summary, cached by the feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtfView {
    pub bullish: bool,
    pub bearish: bool,
}

/// Volatility regime classified from the ATR/price ratio (percent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolatilityRegime {
    Normal,
    High,
    VeryHigh,
    Extreme,
}

impl VolatilityRegime {
    pub const EXTREME_RATIO: f64 = 2.0;
    pub const VERY_HIGH_RATIO: f64 = 1.7;
    pub const HIGH_RATIO: f64 = 1.4;

    pub fn classify(volatility_ratio: f64) -> Self {
        if volatility_ratio >= Self::EXTREME_RATIO {
            VolatilityRegime::Extreme
        } else if volatility_ratio >= Self::VERY_HIGH_RATIO {
            VolatilityRegime::VeryHigh
        } else if volatility_ratio >= Self::HIGH_RATIO {
            VolatilityRegime::High
        } else {
            VolatilityRegime::Normal
        }
    }
}

/// Immutable snapshot of one instrument at one evaluation instant.
///
/// Lookback arrays are ordered most-recent-first: index 0 is the last
/// closed interval. All four arrays must have equal length.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub instrument: String,
    pub timestamp: DateTime<Utc>,
    pub bid: f64,
    pub ask: f64,

    pub closes: Vec<f64>,
    pub highs: Vec<f64>,
    pub lows: Vec<f64>,
    pub volumes: Vec<f64>,

    pub ema_fast: IndicatorSeries,
    pub ema_medium: IndicatorSeries,
    pub ema_slow: IndicatorSeries,
    pub ema_trend: IndicatorSeries,
    /// Long-horizon anchor EMA used for regime gating.
    pub ema_anchor: IndicatorSeries,
    pub rsi: IndicatorSeries,
    pub atr: IndicatorSeries,
    pub adx: IndicatorSeries,
    pub band_upper: IndicatorSeries,
    pub band_mid: IndicatorSeries,
    pub band_lower: IndicatorSeries,

    pub htf: Option<HtfView>,
}

impl MarketSnapshot {
    /// Shape and sanity check. Incomplete snapshots skip the interval
    /// rather than feeding garbage into the evaluators.
    pub fn is_complete(&self, min_lookback: usize) -> bool {
        let n = self.closes.len();
        if n < min_lookback
            || self.highs.len() != n
            || self.lows.len() != n
            || self.volumes.len() != n
        {
            return false;
        }
        if !(self.bid.is_finite() && self.ask.is_finite()) || self.bid <= 0.0 {
            return false;
        }
        let series = [
            &self.ema_fast,
            &self.ema_medium,
            &self.ema_slow,
            &self.ema_trend,
            &self.ema_anchor,
            &self.rsi,
            &self.atr,
            &self.adx,
            &self.band_upper,
            &self.band_mid,
            &self.band_lower,
        ];
        if series.iter().any(|s| !s.is_finite()) {
            return false;
        }
        self.atr.current > 0.0
    }

    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }

    /// ATR as a percentage of price. The volatility gates and the stop
    /// regime both key off this.
    pub fn volatility_ratio(&self) -> f64 {
        if self.bid <= 0.0 {
            return 0.0;
        }
        self.atr.current / self.bid * 100.0
    }

    pub fn volatility_regime(&self) -> VolatilityRegime {
        VolatilityRegime::classify(self.volatility_ratio())
    }

    /// Highest high over the first `n` lookback intervals.
    pub fn highest_high(&self, n: usize) -> Option<f64> {
        let n = n.min(self.highs.len());
        self.highs[..n].iter().copied().reduce(f64::max)
    }

    /// Lowest low over the first `n` lookback intervals.
    pub fn lowest_low(&self, n: usize) -> Option<f64> {
        let n = n.min(self.lows.len());
        self.lows[..n].iter().copied().reduce(f64::min)
    }
}
