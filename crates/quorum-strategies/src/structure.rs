//! Structure-shift evaluator: swing pattern or fresh EMA cross, gated
//! by the long-horizon anchor.

use quorum_core::{MarketSnapshot, SignalError};
use serde::{Deserialize, Serialize};

use crate::Vote;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StructureConfig {
    /// Closed intervals the swing comparison reaches back over.
    pub lookback: usize,
}

impl Default for StructureConfig {
    fn default() -> Self {
        Self { lookback: 10 }
    }
}

impl StructureConfig {
    pub fn validate(&self) -> Result<(), SignalError> {
        if self.lookback < 2 {
            return Err(SignalError::InvalidConfig(
                "structure: lookback must be at least 2".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct StructureEvaluator {
    config: StructureConfig,
}

impl StructureEvaluator {
    pub fn new(config: StructureConfig) -> Self {
        Self { config }
    }

    pub fn evaluate(&self, s: &MarketSnapshot) -> Vote {
        if s.highs.len() < self.config.lookback {
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
        let n = self.config.lookback;
        // Swing comparison: the last closed interval printed above any
        // earlier extreme in the window.
        let higher_high = s.highs[1..n].iter().any(|&h| s.highs[0] > h);
        let higher_low = s.lows[1..n].iter().any(|&l| s.lows[0] > l);

        let cross_up =
            s.ema_fast.current > s.ema_slow.current && s.ema_fast.previous <= s.ema_slow.previous;

        let bullish_regime = s.bid > s.ema_anchor.current;

        (higher_high || higher_low || cross_up) && bullish_regime
    }

    fn check_short(&self, s: &MarketSnapshot) -> bool {
        let n = self.config.lookback;
        let lower_low = s.lows[1..n].iter().any(|&l| s.lows[0] < l);
        let lower_high = s.highs[1..n].iter().any(|&h| s.highs[0] < h);

        let cross_down =
            s.ema_fast.current < s.ema_slow.current && s.ema_fast.previous >= s.ema_slow.previous;

        let bearish_regime = s.ask < s.ema_anchor.current;

        (lower_low || lower_high || cross_down) && bearish_regime
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use quorum_core::IndicatorSeries;

    fn flat_snapshot() -> MarketSnapshot {
        MarketSnapshot {
            instrument: "BTCUSD".to_string(),
            timestamp: Utc::now(),
            bid: 50_000.0,
            ask: 50_010.0,
            closes: vec![50_000.0; 15],
            highs: vec![50_100.0; 15],
            lows: vec![49_900.0; 15],
            volumes: vec![10.0; 15],
            ema_fast: IndicatorSeries::flat(50_000.0),
            ema_medium: IndicatorSeries::flat(50_000.0),
            ema_slow: IndicatorSeries::flat(50_000.0),
            ema_trend: IndicatorSeries::flat(50_000.0),
            ema_anchor: IndicatorSeries::flat(49_000.0),
            rsi: IndicatorSeries::flat(50.0),
            atr: IndicatorSeries::flat(300.0),
            adx: IndicatorSeries::flat(20.0),
            band_upper: IndicatorSeries::flat(50_500.0),
            band_mid: IndicatorSeries::flat(50_000.0),
            band_lower: IndicatorSeries::flat(49_500.0),
            htf: None,
        }
    }

    #[test]
    fn flat_tape_above_anchor_abstains() {
        // Identical highs/lows produce no swing and no cross.
        let eval = StructureEvaluator::default();
        assert_eq!(eval.evaluate(&flat_snapshot()), Vote::none());
    }

    #[test]
    fn higher_high_above_anchor_votes_long() {
        let eval = StructureEvaluator::default();
        let mut s = flat_snapshot();
        s.highs[0] = 50_300.0;
        assert_eq!(eval.evaluate(&s), Vote::long());
    }

    #[test]
    fn cross_up_votes_long() {
        let eval = StructureEvaluator::default();
        let mut s = flat_snapshot();
        s.ema_fast = IndicatorSeries::new(50_100.0, 49_950.0, 49_900.0);
        s.ema_slow = IndicatorSeries::flat(50_000.0);
        assert_eq!(eval.evaluate(&s), Vote::long());
    }

    #[test]
    fn anchor_gate_blocks_long() {
        let eval = StructureEvaluator::default();
        let mut s = flat_snapshot();
        s.highs[0] = 50_300.0;
        s.ema_anchor = IndicatorSeries::flat(51_000.0);
        // Below the anchor the bullish pattern is ignored.
        assert_eq!(eval.evaluate(&s), Vote::none());
    }

    #[test]
    fn lower_low_below_anchor_votes_short() {
        let eval = StructureEvaluator::default();
        let mut s = flat_snapshot();
        s.lows[0] = 49_700.0;
        s.ema_anchor = IndicatorSeries::flat(51_000.0);
        assert_eq!(eval.evaluate(&s), Vote::short());
    }

    #[test]
    fn tiny_lookback_is_invalid() {
        let config = StructureConfig { lookback: 1 };
        assert!(config.validate().is_err());
    }
}
