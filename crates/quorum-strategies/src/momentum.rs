//! Momentum evaluator: sustained directional push with expanding bands.

use quorum_core::{MarketSnapshot, SignalError};
use serde::{Deserialize, Serialize};

use crate::Vote;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumConfig {
    /// RSI must be past this on the long side, mirrored for shorts.
    pub rsi_threshold: f64,
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self {
            rsi_threshold: 60.0,
        }
    }
}

impl MomentumConfig {
    pub fn validate(&self) -> Result<(), SignalError> {
        if !(50.0..100.0).contains(&self.rsi_threshold) {
            return Err(SignalError::InvalidConfig(
                "momentum: rsi_threshold must be in [50, 100)".to_string(),
            ));
        }
        Ok(())
    }

    fn short_threshold(&self) -> f64 {
        100.0 - self.rsi_threshold
    }
}

#[derive(Debug, Clone, Default)]
pub struct MomentumEvaluator {
    config: MomentumConfig,
}

impl MomentumEvaluator {
    pub fn new(config: MomentumConfig) -> Self {
        Self { config }
    }

    pub fn evaluate(&self, s: &MarketSnapshot) -> Vote {
        let band_expanding = (s.band_upper.current - s.band_lower.current)
            > (s.band_upper.previous - s.band_lower.previous);
        let adx_rising = s.adx.rising();
        if !band_expanding || !adx_rising {
            return Vote::none();
        }

        let long = s.ema_fast.rising_throughout()
            && s.rsi.current > self.config.rsi_threshold
            && s.rsi.rising()
            && s.bid > s.ema_anchor.current;

        let short = s.ema_fast.falling_throughout()
            && s.rsi.current < self.config.short_threshold()
            && s.rsi.falling()
            && s.ask < s.ema_anchor.current;

        if long {
            Vote::long()
        } else if short {
            Vote::short()
        } else {
            Vote::none()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use quorum_core::IndicatorSeries;

    fn surging_snapshot() -> MarketSnapshot {
        MarketSnapshot {
            instrument: "BTCUSD".to_string(),
            timestamp: Utc::now(),
            bid: 50_500.0,
            ask: 50_510.0,
            closes: vec![50_400.0; 30],
            highs: vec![50_600.0; 30],
            lows: vec![50_300.0; 30],
            volumes: vec![10.0; 30],
            ema_fast: IndicatorSeries::new(50_400.0, 50_300.0, 50_200.0),
            ema_medium: IndicatorSeries::flat(50_100.0),
            ema_slow: IndicatorSeries::flat(50_000.0),
            ema_trend: IndicatorSeries::flat(49_500.0),
            ema_anchor: IndicatorSeries::flat(48_000.0),
            rsi: IndicatorSeries::new(65.0, 61.0, 58.0),
            atr: IndicatorSeries::flat(400.0),
            adx: IndicatorSeries::new(30.0, 28.0, 27.0),
            band_upper: IndicatorSeries::new(51_200.0, 51_000.0, 50_900.0),
            band_mid: IndicatorSeries::flat(50_000.0),
            band_lower: IndicatorSeries::new(48_800.0, 49_000.0, 49_100.0),
            htf: None,
        }
    }

    #[test]
    fn sustained_push_votes_long() {
        let eval = MomentumEvaluator::default();
        assert_eq!(eval.evaluate(&surging_snapshot()), Vote::long());
    }

    #[test]
    fn broken_monotonicity_abstains() {
        let eval = MomentumEvaluator::default();
        let mut s = surging_snapshot();
        s.ema_fast = IndicatorSeries::new(50_400.0, 50_300.0, 50_350.0);
        assert_eq!(eval.evaluate(&s), Vote::none());
    }

    #[test]
    fn contracting_bands_abstain() {
        let eval = MomentumEvaluator::default();
        let mut s = surging_snapshot();
        s.band_upper = IndicatorSeries::new(51_000.0, 51_200.0, 51_300.0);
        s.band_lower = IndicatorSeries::new(49_000.0, 48_800.0, 48_700.0);
        assert_eq!(eval.evaluate(&s), Vote::none());
    }

    #[test]
    fn price_below_anchor_abstains() {
        let eval = MomentumEvaluator::default();
        let mut s = surging_snapshot();
        s.ema_anchor = IndicatorSeries::flat(51_000.0);
        assert_eq!(eval.evaluate(&s), Vote::none());
    }

    #[test]
    fn mirrored_decline_votes_short() {
        let eval = MomentumEvaluator::default();
        let mut s = surging_snapshot();
        s.bid = 47_400.0;
        s.ask = 47_410.0;
        s.ema_fast = IndicatorSeries::new(47_500.0, 47_600.0, 47_700.0);
        s.rsi = IndicatorSeries::new(35.0, 39.0, 42.0);
        assert_eq!(eval.evaluate(&s), Vote::short());
    }

    #[test]
    fn threshold_below_50_is_invalid() {
        let config = MomentumConfig {
            rsi_threshold: 40.0,
        };
        assert!(config.validate().is_err());
    }
}
