//! Trend-following evaluator: full EMA stack alignment with momentum
//! and oscillator confirmation.

use quorum_core::{MarketSnapshot, SignalError};
use serde::{Deserialize, Serialize};

use crate::Vote;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    /// ADX floor for trend participation.
    pub adx_floor: f64,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            rsi_overbought: 75.0,
            rsi_oversold: 25.0,
            adx_floor: 18.0,
        }
    }
}

impl TrendConfig {
    pub fn validate(&self) -> Result<(), SignalError> {
        if self.rsi_oversold >= self.rsi_overbought {
            return Err(SignalError::InvalidConfig(
                "trend: rsi_oversold must be below rsi_overbought".to_string(),
            ));
        }
        if self.adx_floor < 0.0 {
            return Err(SignalError::InvalidConfig(
                "trend: adx_floor must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct TrendEvaluator {
    config: TrendConfig,
}

impl TrendEvaluator {
    pub fn new(config: TrendConfig) -> Self {
        Self { config }
    }

    pub fn evaluate(&self, s: &MarketSnapshot) -> Vote {
        if self.check_long(s) {
            Vote::long()
        } else if self.check_short(s) {
            Vote::short()
        } else {
            Vote::none()
        }
    }

    fn check_long(&self, s: &MarketSnapshot) -> bool {
        let aligned = s.ema_fast.current > s.ema_medium.current
            && s.ema_medium.current > s.ema_slow.current
            && s.ema_slow.current > s.ema_trend.current;
        let price_above = s.bid > s.ema_fast.current;
        let rsi_healthy = s.rsi.current > 50.0 && s.rsi.current < self.config.rsi_overbought;
        let adx_strong = s.adx.current >= self.config.adx_floor;
        let momentum_up = s.ema_fast.rising();

        aligned && price_above && rsi_healthy && adx_strong && momentum_up
    }

    fn check_short(&self, s: &MarketSnapshot) -> bool {
        let aligned = s.ema_fast.current < s.ema_medium.current
            && s.ema_medium.current < s.ema_slow.current
            && s.ema_slow.current < s.ema_trend.current;
        let price_below = s.ask < s.ema_fast.current;
        // Asymmetric band: shorts tolerate RSI up to 55 so bearish
        // setups forming out of a bounce still qualify.
        let rsi_healthy = s.rsi.current < 55.0 && s.rsi.current > self.config.rsi_oversold;
        let adx_strong = s.adx.current >= self.config.adx_floor;
        let momentum_down = s.ema_fast.falling();

        aligned && price_below && rsi_healthy && adx_strong && momentum_down
    }
}
