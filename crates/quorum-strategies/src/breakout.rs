//! Breakout evaluator: range expansion beyond the rolling extreme.

use quorum_core::{MarketSnapshot, SignalError};
use serde::{Deserialize, Serialize};

use crate::Vote;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakoutConfig {
    /// Closed intervals scanned for the rolling extreme.
    pub lookback: usize,
    /// Minimum breakout distance past the extreme, in ATR units.
    pub margin_atr: f64,
    /// ADX floor; breakouts demand a stronger trend reading than the
    /// trend family does.
    pub adx_floor: f64,
}

impl Default for BreakoutConfig {
    fn default() -> Self {
        Self {
            lookback: 20,
            margin_atr: 0.3,
            adx_floor: 28.0,
        }
    }
}

impl BreakoutConfig {
    pub fn validate(&self) -> Result<(), SignalError> {
        if self.lookback == 0 {
            return Err(SignalError::InvalidConfig(
                "breakout: lookback must be positive".to_string(),
            ));
        }
        if self.margin_atr < 0.0 {
            return Err(SignalError::InvalidConfig(
                "breakout: margin_atr must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct BreakoutEvaluator {
    config: BreakoutConfig,
}

impl BreakoutEvaluator {
    pub fn new(config: BreakoutConfig) -> Self {
        Self { config }
    }

    pub fn evaluate(&self, s: &MarketSnapshot) -> Vote {
        if s.highs.len() < self.config.lookback || s.atr.current <= 0.0 {
            return Vote::none();
        }
        if self.check_long(s) {
            Vote::long()
        } else if self.check_short(s) {
            Vote::short()
        } else {
            Vote::none()
        }
    }

    fn check_long(&self, s: &MarketSnapshot) -> bool {
        let high = match s.highest_high(self.config.lookback) {
            Some(h) => h,
            None => return false,
        };
        let strength = (s.bid - high) / s.atr.current;

        s.bid > high
            && strength > self.config.margin_atr
            && s.rsi.current > 55.0
            && s.rsi.current < 75.0
            && s.adx.current >= self.config.adx_floor
            && s.atr.rising()
    }

    fn check_short(&self, s: &MarketSnapshot) -> bool {
        let low = match s.lowest_low(self.config.lookback) {
            Some(l) => l,
            None => return false,
        };
        let strength = (low - s.ask) / s.atr.current;

        s.ask < low
            && strength > self.config.margin_atr
            && s.rsi.current < 45.0
            && s.rsi.current > 25.0
            && s.adx.current >= self.config.adx_floor
            && s.atr.rising()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use quorum_core::IndicatorSeries;

    fn breakout_snapshot() -> MarketSnapshot {
        // Rolling 20-bar high is 50_000; bid clears it by 300 with
        // ATR 400 (margin 0.75 > 0.3).
        MarketSnapshot {
            instrument: "BTCUSD".to_string(),
            timestamp: Utc::now(),
            bid: 50_300.0,
            ask: 50_310.0,
            closes: vec![49_800.0; 30],
            highs: vec![50_000.0; 30],
            lows: vec![49_500.0; 30],
            volumes: vec![10.0; 30],
            ema_fast: IndicatorSeries::flat(49_900.0),
            ema_medium: IndicatorSeries::flat(49_800.0),
            ema_slow: IndicatorSeries::flat(49_700.0),
            ema_trend: IndicatorSeries::flat(49_500.0),
            ema_anchor: IndicatorSeries::flat(48_000.0),
            rsi: IndicatorSeries::flat(62.0),
            atr: IndicatorSeries::new(400.0, 350.0, 340.0),
            adx: IndicatorSeries::flat(32.0),
            band_upper: IndicatorSeries::flat(50_200.0),
            band_mid: IndicatorSeries::flat(49_800.0),
            band_lower: IndicatorSeries::flat(49_400.0),
            htf: None,
        }
    }

    #[test]
    fn clean_breakout_votes_long() {
        let eval = BreakoutEvaluator::default();
        assert_eq!(eval.evaluate(&breakout_snapshot()), Vote::long());
    }

    #[test]
    fn marginal_breakout_abstains() {
        let eval = BreakoutEvaluator::default();
        let mut s = breakout_snapshot();
        // 100 past the extreme on ATR 400 is only 0.25 ATR.
        s.bid = 50_100.0;
        assert_eq!(eval.evaluate(&s), Vote::none());
    }

    #[test]
    fn contracting_atr_abstains() {
        let eval = BreakoutEvaluator::default();
        let mut s = breakout_snapshot();
        s.atr = IndicatorSeries::new(400.0, 420.0, 430.0);
        assert_eq!(eval.evaluate(&s), Vote::none());
    }

    #[test]
    fn exhausted_rsi_abstains() {
        let eval = BreakoutEvaluator::default();
        let mut s = breakout_snapshot();
        s.rsi = IndicatorSeries::flat(78.0);
        assert_eq!(eval.evaluate(&s), Vote::none());
    }

    #[test]
    fn breakdown_votes_short() {
        let eval = BreakoutEvaluator::default();
        let mut s = breakout_snapshot();
        s.bid = 49_190.0;
        s.ask = 49_200.0;
        s.rsi = IndicatorSeries::flat(38.0);
        // 20-bar low is 49_500; ask is 300 below (0.75 ATR).
        assert_eq!(eval.evaluate(&s), Vote::short());
    }

    #[test]
    fn short_lookback_abstains() {
        let eval = BreakoutEvaluator::default();
        let mut s = breakout_snapshot();
        s.highs.truncate(5);
        s.lows.truncate(5);
        assert_eq!(eval.evaluate(&s), Vote::none());
    }
}
