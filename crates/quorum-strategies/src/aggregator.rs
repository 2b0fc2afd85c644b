//! Weighted-vote aggregation across the strategy families.

use quorum_core::{Direction, MarketSnapshot, Signal, SignalError, StrategyFamily};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    BreakoutConfig, BreakoutEvaluator, MomentumConfig, MomentumEvaluator, StructureConfig,
    StructureEvaluator, TrendConfig, TrendEvaluator, Vote,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    pub enable_trend: bool,
    pub enable_breakout: bool,
    pub enable_momentum: bool,
    pub enable_structure: bool,

    pub weight_trend: u32,
    pub weight_breakout: u32,
    pub weight_momentum: u32,
    pub weight_structure: u32,

    /// Winning score below this is discarded.
    pub min_score: u32,
    /// Demand at least two families behind the winner.
    pub require_two_families: bool,

    /// Volatility-ratio band gate (ATR as percent of price).
    pub volatility_gate: bool,
    pub min_volatility: f64,
    pub max_volatility: f64,
    /// Slack applied to both band edges.
    pub volatility_tolerance: f64,

    /// Spread must stay under this fraction of ATR.
    pub spread_gate: bool,
    pub max_spread_atr: f64,

    /// Winner must agree with the higher-timeframe view. A missing
    /// view fails the gate.
    pub require_htf_alignment: bool,

    pub trend: TrendConfig,
    pub breakout: BreakoutConfig,
    pub momentum: MomentumConfig,
    pub structure: StructureConfig,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            enable_trend: true,
            enable_breakout: true,
            enable_momentum: true,
            enable_structure: true,
            weight_trend: 5,
            weight_breakout: 4,
            weight_momentum: 3,
            weight_structure: 3,
            min_score: 8,
            require_two_families: true,
            volatility_gate: true,
            min_volatility: 0.2,
            max_volatility: 3.0,
            volatility_tolerance: 0.05,
            spread_gate: true,
            max_spread_atr: 0.1,
            require_htf_alignment: false,
            trend: TrendConfig::default(),
            breakout: BreakoutConfig::default(),
            momentum: MomentumConfig::default(),
            structure: StructureConfig::default(),
        }
    }
}

impl AggregatorConfig {
    pub fn validate(&self) -> Result<(), SignalError> {
        if self.min_volatility > self.max_volatility {
            return Err(SignalError::InvalidConfig(
                "aggregator: min_volatility exceeds max_volatility".to_string(),
            ));
        }
        if self.volatility_tolerance < 0.0 {
            return Err(SignalError::InvalidConfig(
                "aggregator: volatility_tolerance must be non-negative".to_string(),
            ));
        }
        if self.spread_gate && self.max_spread_atr <= 0.0 {
            return Err(SignalError::InvalidConfig(
                "aggregator: max_spread_atr must be positive".to_string(),
            ));
        }
        self.trend.validate()?;
        self.breakout.validate()?;
        self.momentum.validate()?;
        self.structure.validate()?;
        Ok(())
    }
}

/// Combines family votes into the per-interval signal.
pub struct SignalAggregator {
    config: AggregatorConfig,
    trend: TrendEvaluator,
    breakout: BreakoutEvaluator,
    momentum: MomentumEvaluator,
    structure: StructureEvaluator,
}

impl SignalAggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        let trend = TrendEvaluator::new(config.trend.clone());
        let breakout = BreakoutEvaluator::new(config.breakout.clone());
        let momentum = MomentumEvaluator::new(config.momentum.clone());
        let structure = StructureEvaluator::new(config.structure.clone());
        Self {
            config,
            trend,
            breakout,
            momentum,
            structure,
        }
    }

    pub fn evaluate(&self, snapshot: &MarketSnapshot) -> Signal {
        let votes = self.collect_votes(snapshot);
        self.aggregate(&votes, snapshot)
    }

    fn collect_votes(&self, s: &MarketSnapshot) -> Vec<(StrategyFamily, u32, Vote)> {
        let mut votes = Vec::with_capacity(4);
        if self.config.enable_trend {
            votes.push((
                StrategyFamily::Trend,
                self.config.weight_trend,
                self.trend.evaluate(s),
            ));
        }
        if self.config.enable_breakout {
            votes.push((
                StrategyFamily::Breakout,
                self.config.weight_breakout,
                self.breakout.evaluate(s),
            ));
        }
        if self.config.enable_momentum {
            votes.push((
                StrategyFamily::Momentum,
                self.config.weight_momentum,
                self.momentum.evaluate(s),
            ));
        }
        if self.config.enable_structure {
            votes.push((
                StrategyFamily::Structure,
                self.config.weight_structure,
                self.structure.evaluate(s),
            ));
        }
        votes
    }

    /// Weighted sum per side, threshold, tie check, then the gates on
    /// the provisional winner only. Ties are never broken.
    pub fn aggregate(
        &self,
        votes: &[(StrategyFamily, u32, Vote)],
        snapshot: &MarketSnapshot,
    ) -> Signal {
        let mut long_score = 0u32;
        let mut short_score = 0u32;
        let mut long_families = Vec::new();
        let mut short_families = Vec::new();

        for (family, weight, vote) in votes {
            // A contradictory vote is an abstention.
            if vote.long && vote.short {
                continue;
            }
            if vote.long {
                long_score += weight;
                long_families.push(*family);
            } else if vote.short {
                short_score += weight;
                short_families.push(*family);
            }
        }

        if long_score == 0 && short_score == 0 {
            return Signal::none();
        }
        if long_score == short_score {
            debug!(long_score, short_score, "tied vote, standing aside");
            return Signal::none();
        }

        let (direction, score, families) = if long_score > short_score {
            (Direction::Long, long_score, long_families)
        } else {
            (Direction::Short, short_score, short_families)
        };

        if score < self.config.min_score {
            debug!(score, min = self.config.min_score, "score below threshold");
            return Signal::none();
        }

        if self.config.require_two_families && families.len() < 2 {
            debug!(%direction, "single-family signal discarded");
            return Signal::none();
        }

        if !self.passes_gates(direction, snapshot) {
            return Signal::none();
        }

        Signal::actionable(direction, score, families)
    }

    fn passes_gates(&self, direction: Direction, s: &MarketSnapshot) -> bool {
        if self.config.volatility_gate {
            let ratio = s.volatility_ratio();
            let lo = self.config.min_volatility - self.config.volatility_tolerance;
            let hi = self.config.max_volatility + self.config.volatility_tolerance;
            if ratio < lo || ratio > hi {
                debug!(ratio, lo, hi, "volatility outside band");
                return false;
            }
        }

        if self.config.spread_gate && s.atr.current > 0.0 {
            let spread_ratio = s.spread() / s.atr.current;
            if spread_ratio > self.config.max_spread_atr {
                debug!(spread_ratio, "spread too wide relative to ATR");
                return false;
            }
        }

        if self.config.require_htf_alignment {
            let agrees = match (s.htf, direction) {
                (Some(htf), Direction::Long) => htf.bullish,
                (Some(htf), Direction::Short) => htf.bearish,
                (None, _) => false,
            };
            if !agrees {
                debug!(%direction, "higher timeframe disagrees");
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use quorum_core::{HtfView, IndicatorSeries, Strength};

    fn quiet_snapshot() -> MarketSnapshot {
        MarketSnapshot {
            instrument: "BTCUSD".to_string(),
            timestamp: Utc::now(),
            bid: 50_000.0,
            ask: 50_010.0,
            closes: vec![50_000.0; 30],
            highs: vec![50_100.0; 30],
            lows: vec![49_900.0; 30],
            volumes: vec![10.0; 30],
            ema_fast: IndicatorSeries::flat(50_000.0),
            ema_medium: IndicatorSeries::flat(50_000.0),
            ema_slow: IndicatorSeries::flat(50_000.0),
            ema_trend: IndicatorSeries::flat(50_000.0),
            ema_anchor: IndicatorSeries::flat(50_000.0),
            rsi: IndicatorSeries::flat(50.0),
            atr: IndicatorSeries::flat(500.0),
            adx: IndicatorSeries::flat(20.0),
            band_upper: IndicatorSeries::flat(50_500.0),
            band_mid: IndicatorSeries::flat(50_000.0),
            band_lower: IndicatorSeries::flat(49_500.0),
            htf: None,
        }
    }

    fn votes(
        list: &[(StrategyFamily, u32, Vote)],
    ) -> Vec<(StrategyFamily, u32, Vote)> {
        list.to_vec()
    }

    #[test]
    fn no_votes_means_none_score_zero() {
        let agg = SignalAggregator::new(AggregatorConfig::default());
        let signal = agg.aggregate(&[], &quiet_snapshot());
        assert_eq!(signal.direction, None);
        assert_eq!(signal.score, 0);
    }

    #[test]
    fn weighted_majority_wins() {
        let agg = SignalAggregator::new(AggregatorConfig::default());
        let v = votes(&[
            (StrategyFamily::Trend, 5, Vote::long()),
            (StrategyFamily::Breakout, 4, Vote::long()),
            (StrategyFamily::Momentum, 3, Vote::short()),
        ]);
        let signal = agg.aggregate(&v, &quiet_snapshot());
        assert_eq!(signal.direction, Some(Direction::Long));
        assert_eq!(signal.score, 9);
        assert_eq!(signal.strength, Strength::Medium);
        assert_eq!(
            signal.contributors,
            vec![StrategyFamily::Trend, StrategyFamily::Breakout]
        );
    }

    #[test]
    fn tie_above_threshold_stands_aside() {
        let agg = SignalAggregator::new(AggregatorConfig::default());
        let v = votes(&[
            (StrategyFamily::Trend, 8, Vote::long()),
            (StrategyFamily::Breakout, 8, Vote::short()),
        ]);
        let signal = agg.aggregate(&v, &quiet_snapshot());
        assert_eq!(signal.direction, None);
    }

    #[test]
    fn score_below_minimum_is_discarded() {
        let agg = SignalAggregator::new(AggregatorConfig::default());
        let v = votes(&[
            (StrategyFamily::Momentum, 3, Vote::long()),
            (StrategyFamily::Structure, 3, Vote::long()),
        ]);
        let signal = agg.aggregate(&v, &quiet_snapshot());
        assert_eq!(signal.direction, None);
    }

    #[test]
    fn single_family_blocked_when_two_required() {
        let mut config = AggregatorConfig::default();
        config.min_score = 5;
        let agg = SignalAggregator::new(config);
        let v = votes(&[(StrategyFamily::Trend, 5, Vote::long())]);
        let signal = agg.aggregate(&v, &quiet_snapshot());
        assert_eq!(signal.direction, None);
    }

    #[test]
    fn volatility_band_respects_tolerance() {
        let mut config = AggregatorConfig::default();
        config.min_volatility = 0.2;
        config.max_volatility = 1.0;
        config.volatility_tolerance = 0.05;
        let agg = SignalAggregator::new(config);
        let v = votes(&[
            (StrategyFamily::Trend, 5, Vote::long()),
            (StrategyFamily::Breakout, 4, Vote::long()),
        ]);

        // Ratio exactly 1.0: inside.
        let mut s = quiet_snapshot();
        s.atr = IndicatorSeries::flat(500.0);
        assert!(agg.aggregate(&v, &s).is_actionable());

        // Ratio 1.04: outside the band but within tolerance.
        s.atr = IndicatorSeries::flat(520.0);
        assert!(agg.aggregate(&v, &s).is_actionable());

        // Ratio 1.1: beyond tolerance.
        s.atr = IndicatorSeries::flat(550.0);
        assert!(!agg.aggregate(&v, &s).is_actionable());
    }

    #[test]
    fn wide_spread_blocks_winner() {
        let agg = SignalAggregator::new(AggregatorConfig::default());
        let v = votes(&[
            (StrategyFamily::Trend, 5, Vote::long()),
            (StrategyFamily::Breakout, 4, Vote::long()),
        ]);
        let mut s = quiet_snapshot();
        s.ask = s.bid + 100.0; // 0.2 of ATR, over the 0.1 ceiling
        assert!(!agg.aggregate(&v, &s).is_actionable());
    }

    #[test]
    fn htf_gate_requires_agreement() {
        let mut config = AggregatorConfig::default();
        config.require_htf_alignment = true;
        let agg = SignalAggregator::new(config);
        let v = votes(&[
            (StrategyFamily::Trend, 5, Vote::long()),
            (StrategyFamily::Breakout, 4, Vote::long()),
        ]);

        let mut s = quiet_snapshot();
        assert!(!agg.aggregate(&v, &s).is_actionable());

        s.htf = Some(HtfView {
            bullish: true,
            bearish: false,
        });
        assert!(agg.aggregate(&v, &s).is_actionable());

        s.htf = Some(HtfView {
            bullish: false,
            bearish: true,
        });
        assert!(!agg.aggregate(&v, &s).is_actionable());
    }
}
