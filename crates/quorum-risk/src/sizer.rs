//! Converts the per-trade risk budget into an order volume under
//! broker constraints.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::warn;

use quorum_core::{EngineError, Strength, SymbolSpec, VolatilityRegime};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SizerConfig {
    /// Percent of equity risked per signal.
    pub risk_percent: Decimal,
    /// The risk budget is split evenly across this many orders.
    pub entries_per_signal: u32,
    pub multiplier_weak: Decimal,
    pub multiplier_medium: Decimal,
    pub multiplier_strong: Decimal,
    pub multiplier_very_strong: Decimal,
    /// Used whenever sizing inputs are degenerate.
    pub fallback_volume: Decimal,
    /// Engine-side cap, applied on top of the broker's volume_max.
    pub max_volume: Decimal,
    /// Shrink the risk budget in elevated volatility regimes.
    pub volatility_scaling: bool,
    pub extreme_scale: Decimal,
    pub very_high_scale: Decimal,
}

impl Default for SizerConfig {
    fn default() -> Self {
        Self {
            risk_percent: dec!(2),
            entries_per_signal: 1,
            multiplier_weak: dec!(1.0),
            multiplier_medium: dec!(1.5),
            multiplier_strong: dec!(2.0),
            multiplier_very_strong: dec!(3.0),
            fallback_volume: dec!(0.01),
            max_volume: dec!(10),
            volatility_scaling: true,
            extreme_scale: dec!(0.7),
            very_high_scale: dec!(0.85),
        }
    }
}

impl SizerConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.risk_percent <= Decimal::ZERO || self.risk_percent > dec!(100) {
            return Err(EngineError::Validation(
                "sizer: risk_percent must be in (0, 100]".to_string(),
            ));
        }
        if self.entries_per_signal == 0 {
            return Err(EngineError::Validation(
                "sizer: entries_per_signal must be positive".to_string(),
            ));
        }
        if self.fallback_volume <= Decimal::ZERO {
            return Err(EngineError::Validation(
                "sizer: fallback_volume must be positive".to_string(),
            ));
        }
        let multipliers = [
            self.multiplier_weak,
            self.multiplier_medium,
            self.multiplier_strong,
            self.multiplier_very_strong,
        ];
        if multipliers.iter().any(|m| *m <= Decimal::ZERO) {
            return Err(EngineError::Validation(
                "sizer: strength multipliers must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn strength_multiplier(&self, strength: Strength) -> Decimal {
        match strength {
            Strength::Weak => self.multiplier_weak,
            Strength::Medium => self.multiplier_medium,
            Strength::Strong => self.multiplier_strong,
            Strength::VeryStrong => self.multiplier_very_strong,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PositionSizer {
    config: SizerConfig,
}

impl PositionSizer {
    pub fn new(config: SizerConfig) -> Self {
        Self { config }
    }

    /// Volume for one of the signal's orders. Fails closed to the
    /// fallback volume on degenerate inputs.
    pub fn size(
        &self,
        stop_distance: Decimal,
        strength: Strength,
        equity: Decimal,
        regime: VolatilityRegime,
        spec: &SymbolSpec,
    ) -> Decimal {
        if stop_distance <= Decimal::ZERO || equity <= Decimal::ZERO {
            warn!(%stop_distance, %equity, "degenerate sizing inputs, using fallback volume");
            return self.clamp(self.config.fallback_volume, spec);
        }

        let loss_per_unit = spec.loss_per_unit(stop_distance);
        if loss_per_unit <= Decimal::ZERO {
            warn!(%stop_distance, "degenerate symbol spec, using fallback volume");
            return self.clamp(self.config.fallback_volume, spec);
        }

        let mut risk_money = equity * self.config.risk_percent / dec!(100)
            / Decimal::from(self.config.entries_per_signal)
            * self.config.strength_multiplier(strength);

        if self.config.volatility_scaling {
            risk_money *= match regime {
                VolatilityRegime::Extreme => self.config.extreme_scale,
                VolatilityRegime::VeryHigh => self.config.very_high_scale,
                _ => Decimal::ONE,
            };
        }

        let raw = risk_money / loss_per_unit;
        let floored = spec.round_volume_down(raw);
        self.clamp(floored, spec)
    }

    fn clamp(&self, volume: Decimal, spec: &SymbolSpec) -> Decimal {
        let upper = spec.volume_max.min(self.config.max_volume);
        volume.max(spec.volume_min).min(upper)
    }
}
