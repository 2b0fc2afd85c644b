//! Turns an accepted signal into stop/target levels and submitted
//! market orders.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use quorum_core::{
    Direction, EngineError, EntryOrder, ExecutionGateway, MarketSnapshot, PositionRecord, Signal,
    SymbolSpec, VolatilityRegime,
};

use crate::to_decimal;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Stop distance in ATRs by volatility regime: calm markets get
    /// the tight multiplier, extreme ones the wide multiplier.
    pub sl_atr_tight: f64,
    pub sl_atr_normal: f64,
    pub sl_atr_wide: f64,

    /// Reward multiple bounds for the dynamic take-profit.
    pub base_rr: f64,
    pub max_rr: f64,
    /// Entries with a final reward:risk under this are rejected.
    pub min_rr: f64,
    pub dynamic_tp: bool,

    /// Orders submitted per accepted signal, each with its own record.
    pub entries_per_signal: u32,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            sl_atr_tight: 2.0,
            sl_atr_normal: 2.5,
            sl_atr_wide: 3.0,
            base_rr: 2.0,
            max_rr: 6.0,
            min_rr: 2.0,
            dynamic_tp: true,
            entries_per_signal: 1,
        }
    }
}

impl ExecutorConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.sl_atr_tight <= 0.0 || self.sl_atr_normal <= 0.0 || self.sl_atr_wide <= 0.0 {
            return Err(EngineError::Validation(
                "executor: stop multipliers must be positive".to_string(),
            ));
        }
        if self.base_rr <= 0.0 || self.max_rr < self.base_rr {
            return Err(EngineError::Validation(
                "executor: require 0 < base_rr <= max_rr".to_string(),
            ));
        }
        if self.entries_per_signal == 0 {
            return Err(EngineError::Validation(
                "executor: entries_per_signal must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Computed levels for one entry, ready for sizing and submission.
#[derive(Debug, Clone)]
pub struct EntryPlan {
    pub direction: Direction,
    pub entry_price: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    pub stop_distance: Decimal,
    pub regime: VolatilityRegime,
}

pub struct EntryExecutor {
    config: ExecutorConfig,
    tag: String,
}

impl EntryExecutor {
    pub fn new(config: ExecutorConfig, tag: impl Into<String>) -> Self {
        Self {
            config,
            tag: tag.into(),
        }
    }

    pub fn entries_per_signal(&self) -> u32 {
        self.config.entries_per_signal
    }

    /// Compute stop and target for a signal. Returns a validation
    /// error when the levels cannot satisfy broker constraints; the
    /// entry is dropped, never retried with altered parameters.
    pub fn plan(
        &self,
        direction: Direction,
        snapshot: &MarketSnapshot,
        spec: &SymbolSpec,
    ) -> Result<EntryPlan, EngineError> {
        // Entries cross the spread: longs fill at ask, shorts at bid.
        let entry_f = match direction {
            Direction::Long => snapshot.ask,
            Direction::Short => snapshot.bid,
        };

        let regime = snapshot.volatility_regime();
        let atr_multiplier = match regime {
            VolatilityRegime::Extreme => self.config.sl_atr_wide,
            VolatilityRegime::VeryHigh => self.config.sl_atr_normal,
            _ => self.config.sl_atr_tight,
        };
        let stop_distance_f = snapshot.atr.current * atr_multiplier;
        if stop_distance_f <= 0.0 {
            return Err(EngineError::Validation(
                "non-positive stop distance".to_string(),
            ));
        }

        let rr = self.reward_multiple(snapshot, regime);
        if rr < self.config.min_rr {
            return Err(EngineError::Validation(format!(
                "reward:risk {rr:.2} below minimum {:.2}",
                self.config.min_rr
            )));
        }

        let sign = Decimal::from(direction.sign());
        let entry = to_decimal(entry_f)
            .ok_or_else(|| EngineError::Validation("non-finite entry price".to_string()))?;
        let stop_distance = to_decimal(stop_distance_f)
            .ok_or_else(|| EngineError::Validation("non-finite stop distance".to_string()))?;
        let tp_distance = to_decimal(stop_distance_f * rr)
            .ok_or_else(|| EngineError::Validation("non-finite target distance".to_string()))?;
        let spread = to_decimal(snapshot.spread()).unwrap_or(Decimal::ZERO);

        let stop_loss = entry - sign * stop_distance;
        let take_profit = entry + sign * tp_distance;

        let (stop_loss, take_profit) =
            clamp_levels(direction, entry, stop_loss, take_profit, spec, spread)?;
        let stop_distance = (entry - stop_loss).abs();

        Ok(EntryPlan {
            direction,
            entry_price: entry,
            stop_loss,
            take_profit,
            stop_distance,
            regime,
        })
    }

    /// Submit the configured number of market orders for a plan. Each
    /// confirmed fill becomes a tracked record; rejections are logged
    /// and skipped, never retried with altered parameters.
    pub fn execute<G: ExecutionGateway>(
        &self,
        gateway: &mut G,
        plan: &EntryPlan,
        volume: Decimal,
        signal: &Signal,
        snapshot: &MarketSnapshot,
        now: DateTime<Utc>,
    ) -> Vec<PositionRecord> {
        let order = EntryOrder {
            instrument: snapshot.instrument.clone(),
            direction: plan.direction,
            volume,
            stop_loss: plan.stop_loss,
            take_profit: plan.take_profit,
            tag: self.tag.clone(),
        };

        let mut records = Vec::new();
        for n in 0..self.config.entries_per_signal {
            match gateway.submit_market_order(&order) {
                Ok(result) => {
                    info!(
                        id = %result.position_id,
                        direction = %plan.direction,
                        price = %result.fill_price,
                        %volume,
                        sl = %plan.stop_loss,
                        tp = %plan.take_profit,
                        "entry filled"
                    );
                    records.push(PositionRecord::open(
                        result.position_id,
                        plan.direction,
                        result.fill_price,
                        result.volume,
                        plan.stop_loss,
                        plan.take_profit,
                        now,
                        signal.strength,
                        signal.score,
                    ));
                }
                Err(err) => {
                    warn!(entry = n + 1, %err, "order rejected, not retrying");
                }
            }
        }
        records
    }

    /// Reward multiple for the take-profit, scaled between base and
    /// max by trend-strength and momentum readings.
    fn reward_multiple(&self, s: &MarketSnapshot, regime: VolatilityRegime) -> f64 {
        if !self.config.dynamic_tp {
            return self.config.base_rr;
        }
        let base = self.config.base_rr;
        let span = self.config.max_rr - base;
        let trend = trend_strength(s);
        let momentum = momentum_score(s);

        let mut rr = if trend > 0.90 && momentum > 0.85 {
            self.config.max_rr
        } else if trend > 0.80 && momentum > 0.75 {
            base + span * 0.80
        } else if trend > 0.70 && momentum > 0.65 {
            base + span * 0.60
        } else if trend > 0.60 {
            base + span * 0.40
        } else {
            base
        };

        // Let winners breathe in extreme volatility, cut targets in
        // calm tape.
        match regime {
            VolatilityRegime::Extreme => rr *= 1.2,
            VolatilityRegime::Normal | VolatilityRegime::High => rr *= 0.9,
            VolatilityRegime::VeryHigh => {}
        }

        rr.clamp(self.config.base_rr, self.config.max_rr)
    }
}

/// Composite trend-quality score in [0, 1]: EMA alignment, fast/slow
/// separation in ATRs, and the ADX reading.
fn trend_strength(s: &MarketSnapshot) -> f64 {
    let mut score: f64 = 0.0;

    let bull = s.ema_fast.current > s.ema_medium.current
        && s.ema_medium.current > s.ema_slow.current
        && s.ema_slow.current > s.ema_trend.current;
    let bear = s.ema_fast.current < s.ema_medium.current
        && s.ema_medium.current < s.ema_slow.current
        && s.ema_slow.current < s.ema_trend.current;
    if bull || bear {
        score += 0.4;
    }

    if s.atr.current > 0.0 {
        let separation = (s.ema_fast.current - s.ema_slow.current).abs() / s.atr.current;
        if separation > 3.0 {
            score += 0.3;
        } else if separation > 2.0 {
            score += 0.2;
        } else if separation > 1.0 {
            score += 0.1;
        }
    }

    if s.adx.current > 28.0 {
        score += 0.3;
    } else if s.adx.current > 18.0 {
        score += 0.2;
    }

    score.min(1.0)
}

/// Composite momentum score in [0, 1]: RSI displacement, RSI velocity,
/// and bar range versus ATR.
fn momentum_score(s: &MarketSnapshot) -> f64 {
    let mut score: f64 = 0.0;

    let rsi = s.rsi.current;
    if rsi > 70.0 || rsi < 30.0 {
        score += 0.4;
    } else if rsi > 60.0 || rsi < 40.0 {
        score += 0.3;
    } else if rsi > 55.0 || rsi < 45.0 {
        score += 0.2;
    }

    if (s.rsi.current - s.rsi.previous).abs() > 3.0 {
        score += 0.2;
    }

    if s.closes.len() >= 2 {
        let change = (s.closes[0] - s.closes[1]).abs();
        let avg = s.atr.current * 0.5;
        if change > avg * 1.5 {
            score += 0.4;
        } else if change > avg {
            score += 0.2;
        }
    }

    score.min(1.0)
}

/// Push the stop and target out to the broker's minimum distance
/// (at least twice the spread), rejecting the entry when either level
/// sits on the wrong side of entry.
fn clamp_levels(
    direction: Direction,
    entry: Decimal,
    stop_loss: Decimal,
    take_profit: Decimal,
    spec: &SymbolSpec,
    spread: Decimal,
) -> Result<(Decimal, Decimal), EngineError> {
    let min_distance = spec.min_stop_distance.max(spread * dec!(2));
    let sign = Decimal::from(direction.sign());

    let stop_ok = match direction {
        Direction::Long => stop_loss < entry,
        Direction::Short => stop_loss > entry,
    };
    let target_ok = match direction {
        Direction::Long => take_profit > entry,
        Direction::Short => take_profit < entry,
    };
    if !stop_ok || !target_ok {
        return Err(EngineError::Validation(
            "stop/target ordering inverted, dropping entry".to_string(),
        ));
    }

    let mut sl = stop_loss;
    if (entry - sl).abs() < min_distance {
        sl = entry - sign * min_distance;
    }
    let mut tp = take_profit;
    if (tp - entry).abs() < min_distance {
        tp = entry + sign * min_distance;
    }

    Ok((sl, tp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use quorum_core::IndicatorSeries;

    fn snapshot() -> MarketSnapshot {
        MarketSnapshot {
            instrument: "BTCUSD".to_string(),
            timestamp: Utc::now(),
            bid: 50_000.0,
            ask: 50_010.0,
            closes: vec![50_000.0, 49_950.0, 49_900.0],
            highs: vec![50_100.0; 3],
            lows: vec![49_900.0; 3],
            volumes: vec![10.0; 3],
            ema_fast: IndicatorSeries::flat(49_950.0),
            ema_medium: IndicatorSeries::flat(49_900.0),
            ema_slow: IndicatorSeries::flat(49_850.0),
            ema_trend: IndicatorSeries::flat(49_800.0),
            ema_anchor: IndicatorSeries::flat(49_000.0),
            rsi: IndicatorSeries::flat(55.0),
            atr: IndicatorSeries::flat(400.0),
            adx: IndicatorSeries::flat(25.0),
            band_upper: IndicatorSeries::flat(50_500.0),
            band_mid: IndicatorSeries::flat(50_000.0),
            band_lower: IndicatorSeries::flat(49_500.0),
            htf: None,
        }
    }

    #[test]
    fn normal_regime_uses_tight_stop() {
        // ATR 400 on 50,000 is 0.8% volatility: Normal regime.
        let exec = EntryExecutor::new(ExecutorConfig::default(), "quorum");
        let plan = exec
            .plan(Direction::Long, &snapshot(), &SymbolSpec::default())
            .unwrap();
        assert_eq!(plan.regime, VolatilityRegime::Normal);
        assert_eq!(plan.stop_distance, dec!(800)); // 400 * 2.0
        assert_eq!(plan.stop_loss, dec!(49210)); // ask 50,010 - 800
    }

    #[test]
    fn extreme_regime_widens_stop() {
        let exec = EntryExecutor::new(ExecutorConfig::default(), "quorum");
        let mut s = snapshot();
        s.atr = IndicatorSeries::flat(1100.0); // 2.2% of price
        let plan = exec
            .plan(Direction::Long, &s, &SymbolSpec::default())
            .unwrap();
        assert_eq!(plan.regime, VolatilityRegime::Extreme);
        assert_eq!(plan.stop_distance, dec!(3300)); // 1100 * 3.0
    }

    #[test]
    fn target_respects_min_rr() {
        let exec = EntryExecutor::new(ExecutorConfig::default(), "quorum");
        let plan = exec
            .plan(Direction::Long, &snapshot(), &SymbolSpec::default())
            .unwrap();
        let reward = plan.take_profit - plan.entry_price;
        assert!(reward >= plan.stop_distance * dec!(2));
    }

    #[test]
    fn short_plan_mirrors_levels() {
        let exec = EntryExecutor::new(ExecutorConfig::default(), "quorum");
        let mut s = snapshot();
        s.rsi = IndicatorSeries::flat(45.0);
        let plan = exec
            .plan(Direction::Short, &s, &SymbolSpec::default())
            .unwrap();
        assert!(plan.stop_loss > plan.entry_price);
        assert!(plan.take_profit < plan.entry_price);
    }

    #[test]
    fn clamp_pushes_stop_out_to_min_distance() {
        let spec = SymbolSpec {
            min_stop_distance: dec!(100),
            ..Default::default()
        };
        let (sl, tp) = clamp_levels(
            Direction::Long,
            dec!(50000),
            dec!(49950),
            dec!(50040),
            &spec,
            dec!(10),
        )
        .unwrap();
        assert_eq!(sl, dec!(49900));
        assert_eq!(tp, dec!(50100));
    }

    #[test]
    fn clamp_uses_double_spread_when_larger() {
        let (sl, _tp) = clamp_levels(
            Direction::Long,
            dec!(50000),
            dec!(49990),
            dec!(50500),
            &SymbolSpec::default(),
            dec!(30),
        )
        .unwrap();
        assert_eq!(sl, dec!(49940)); // 2 * 30 spread beats the spec minimum
    }

    #[test]
    fn inverted_ordering_drops_entry() {
        // Stop above entry for a long is rejected outright.
        let res = clamp_levels(
            Direction::Long,
            dec!(50000),
            dec!(50100),
            dec!(50500),
            &SymbolSpec::default(),
            dec!(10),
        );
        assert!(res.is_err());

        // Target below entry likewise.
        let res = clamp_levels(
            Direction::Long,
            dec!(50000),
            dec!(49500),
            dec!(49900),
            &SymbolSpec::default(),
            dec!(10),
        );
        assert!(res.is_err());
    }

    #[test]
    fn strong_trend_raises_reward_multiple() {
        let exec = EntryExecutor::new(ExecutorConfig::default(), "quorum");
        let mut s = snapshot();
        // Aligned stack, wide separation, strong ADX, hot RSI, big bar.
        s.ema_fast = IndicatorSeries::flat(51_500.0);
        s.ema_medium = IndicatorSeries::flat(50_500.0);
        s.ema_slow = IndicatorSeries::flat(50_000.0);
        s.ema_trend = IndicatorSeries::flat(49_500.0);
        s.adx = IndicatorSeries::flat(35.0);
        s.rsi = IndicatorSeries::new(72.0, 65.0, 60.0);
        s.closes = vec![51_000.0, 50_600.0, 50_300.0];
        let rr_strong = exec.reward_multiple(&s, VolatilityRegime::VeryHigh);
        let rr_base = exec.reward_multiple(&snapshot(), VolatilityRegime::VeryHigh);
        assert!(rr_strong > rr_base);
        assert!(rr_strong <= 6.0);
    }
}
