//! Per-tick supervision of open positions: the partial take-profit
//! ladder, breakeven promotion, and the adaptive trailing stop.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use quorum_core::{
    EngineError, ExecutionGateway, MarketSnapshot, PositionBook, PositionRecord, Strength,
    SymbolSpec,
};

use crate::to_decimal;

/// One rung of the partial take-profit ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TpRung {
    /// Reward multiple (of initial risk) at which the rung fires.
    pub reward_multiple: Decimal,
    /// Percent of the *original* volume to close.
    pub percent: Decimal,
}

/// One step of the trailing-distance schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailTier {
    pub min_reward_multiple: Decimal,
    pub atr_multiplier: Decimal,
}

/// What the breakeven trigger fraction is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakevenMode {
    /// Fraction of the entry-to-target distance.
    FractionOfTarget,
    /// Fraction of the initial risk distance.
    FractionOfRisk,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    pub use_partial_tp: bool,
    /// Up to four rungs, ascending reward multiples. The last rung
    /// closes whatever volume remains (the runner).
    pub rungs: Vec<TpRung>,

    pub move_to_breakeven: bool,
    pub breakeven_trigger: Decimal,
    pub breakeven_mode: BreakevenMode,
    /// Buffer past entry, in ticks, locked in at breakeven.
    pub breakeven_buffer_ticks: Decimal,
    /// Skip breakeven for very-strong entries so they can run.
    pub let_strong_run: bool,

    pub use_trailing: bool,
    /// Additionally gate trailing on breakeven promotion; the reward
    /// multiple floor below applies either way.
    pub trail_after_breakeven: bool,
    pub trailing_start_rr: Decimal,
    pub trailing_atr_base: Decimal,
    /// Tighter multipliers as the reward multiple grows.
    pub trail_tiers: Vec<TrailTier>,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            use_partial_tp: true,
            rungs: vec![
                TpRung {
                    reward_multiple: dec!(1.5),
                    percent: dec!(25),
                },
                TpRung {
                    reward_multiple: dec!(2.5),
                    percent: dec!(25),
                },
                TpRung {
                    reward_multiple: dec!(4.0),
                    percent: dec!(25),
                },
                TpRung {
                    reward_multiple: dec!(6.0),
                    percent: dec!(25),
                },
            ],
            move_to_breakeven: true,
            breakeven_trigger: dec!(0.2),
            breakeven_mode: BreakevenMode::FractionOfTarget,
            breakeven_buffer_ticks: dec!(10),
            let_strong_run: false,
            use_trailing: true,
            trail_after_breakeven: true,
            trailing_start_rr: dec!(2.0),
            trailing_atr_base: dec!(1.5),
            trail_tiers: vec![
                TrailTier {
                    min_reward_multiple: dec!(3),
                    atr_multiplier: dec!(1.2),
                },
                TrailTier {
                    min_reward_multiple: dec!(4),
                    atr_multiplier: dec!(1.0),
                },
                TrailTier {
                    min_reward_multiple: dec!(5),
                    atr_multiplier: dec!(0.8),
                },
            ],
        }
    }
}

impl LifecycleConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.rungs.len() > 4 {
            return Err(EngineError::Validation(
                "lifecycle: at most four take-profit rungs".to_string(),
            ));
        }
        let mut prev = Decimal::ZERO;
        let mut total = Decimal::ZERO;
        for rung in &self.rungs {
            if rung.reward_multiple <= prev {
                return Err(EngineError::Validation(
                    "lifecycle: rung reward multiples must be ascending and positive".to_string(),
                ));
            }
            if rung.percent <= Decimal::ZERO || rung.percent > dec!(100) {
                return Err(EngineError::Validation(
                    "lifecycle: rung percent must be in (0, 100]".to_string(),
                ));
            }
            prev = rung.reward_multiple;
            total += rung.percent;
        }
        if total > dec!(100) {
            return Err(EngineError::Validation(
                "lifecycle: rung percents must not exceed 100".to_string(),
            ));
        }
        if self.breakeven_trigger <= Decimal::ZERO || self.breakeven_trigger >= Decimal::ONE {
            return Err(EngineError::Validation(
                "lifecycle: breakeven_trigger must be in (0, 1)".to_string(),
            ));
        }
        if self.trailing_atr_base <= Decimal::ZERO {
            return Err(EngineError::Validation(
                "lifecycle: trailing_atr_base must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

pub struct LifecycleManager {
    config: LifecycleConfig,
}

impl LifecycleManager {
    pub fn new(config: LifecycleConfig) -> Self {
        Self { config }
    }

    /// One supervision pass over every tracked position. Gateway
    /// failures are logged and left for the next tick to retry.
    pub fn manage<G: ExecutionGateway>(
        &self,
        book: &mut PositionBook,
        snapshot: &MarketSnapshot,
        gateway: &mut G,
    ) {
        let spec = gateway.symbol_spec();
        let atr = match to_decimal(snapshot.atr.current) {
            Some(a) if a > Decimal::ZERO => a,
            _ => return,
        };

        for id in book.ids() {
            let Some(record) = book.get_mut(&id) else {
                continue;
            };
            // Exits cross the spread the other way: longs exit at bid.
            let price_f = if record.is_long() {
                snapshot.bid
            } else {
                snapshot.ask
            };
            let Some(price) = to_decimal(price_f) else {
                continue;
            };

            record.observe(price);
            let rr = record.reward_multiple(price);

            if self.config.use_partial_tp {
                self.run_ladder(record, rr, &spec, gateway);
            }
            if self.config.move_to_breakeven {
                self.promote_breakeven(record, price, &spec, gateway);
            }
            if self.config.use_trailing {
                self.trail(record, price, rr, atr, gateway);
            }
        }
    }

    /// Close every tracked position at market.
    pub fn flatten_all<G: ExecutionGateway>(&self, book: &mut PositionBook, gateway: &mut G) {
        for id in book.ids() {
            let Some(record) = book.get(&id) else {
                continue;
            };
            if record.remaining_volume <= Decimal::ZERO {
                continue;
            }
            match gateway.close_position(&id, record.remaining_volume) {
                Ok(()) => info!(%id, "flattened position"),
                Err(err) => warn!(%id, %err, "flatten failed"),
            }
        }
    }

    /// Rungs fire strictly in order, each at most once, closing a
    /// percent of the original volume. The final rung closes the
    /// remainder.
    fn run_ladder<G: ExecutionGateway>(
        &self,
        record: &mut PositionRecord,
        rr: Decimal,
        spec: &SymbolSpec,
        gateway: &mut G,
    ) {
        for (i, rung) in self.config.rungs.iter().enumerate() {
            if record.rungs_hit[i] {
                continue;
            }
            let prior_hit = i == 0 || record.rungs_hit[i - 1];
            if !prior_hit || rr < rung.reward_multiple {
                break;
            }

            let is_last = i == self.config.rungs.len() - 1;
            let close_volume = if is_last {
                record.remaining_volume
            } else {
                spec.round_volume_down(record.original_volume * rung.percent / dec!(100))
                    .min(record.remaining_volume)
            };

            if close_volume < spec.volume_min || close_volume <= Decimal::ZERO {
                debug!(id = %record.id, rung = i + 1, %close_volume, "rung volume below minimum, skipping");
                record.rungs_hit[i] = true;
                continue;
            }

            match gateway.close_position(&record.id, close_volume) {
                Ok(()) => {
                    record.rungs_hit[i] = true;
                    record.remaining_volume -= close_volume;
                    info!(
                        id = %record.id,
                        rung = i + 1,
                        %rr,
                        closed = %close_volume,
                        remaining = %record.remaining_volume,
                        "partial take-profit"
                    );
                }
                Err(err) => {
                    warn!(id = %record.id, rung = i + 1, %err, "partial close failed");
                    break;
                }
            }
        }
    }

    fn promote_breakeven<G: ExecutionGateway>(
        &self,
        record: &mut PositionRecord,
        price: Decimal,
        spec: &SymbolSpec,
        gateway: &mut G,
    ) {
        if record.breakeven_set {
            return;
        }
        if self.config.let_strong_run && record.entry_strength == Strength::VeryStrong {
            return;
        }

        let trigger_distance = match self.config.breakeven_mode {
            BreakevenMode::FractionOfTarget => {
                (record.take_profit - record.entry_price).abs() * self.config.breakeven_trigger
            }
            BreakevenMode::FractionOfRisk => record.initial_risk * self.config.breakeven_trigger,
        };
        if trigger_distance <= Decimal::ZERO {
            return;
        }
        if record.favorable_excursion(price) < trigger_distance {
            return;
        }

        let buffer = self.config.breakeven_buffer_ticks * spec.tick_size;
        let sign = Decimal::from(record.direction.sign());
        let candidate = record.entry_price + sign * buffer;

        // Only ever tighten; a stop already past entry stays put.
        let tightens = match record.direction {
            quorum_core::Direction::Long => candidate > record.stop_loss,
            quorum_core::Direction::Short => candidate < record.stop_loss,
        };
        if !tightens {
            record.breakeven_set = true;
            return;
        }

        match gateway.modify_stops(&record.id, candidate, record.take_profit) {
            Ok(()) => {
                record.tighten_stop(candidate);
                record.breakeven_set = true;
                info!(id = %record.id, stop = %candidate, "breakeven locked");
            }
            Err(err) => warn!(id = %record.id, %err, "breakeven modify failed"),
        }
    }

    fn trail<G: ExecutionGateway>(
        &self,
        record: &mut PositionRecord,
        price: Decimal,
        rr: Decimal,
        atr: Decimal,
        gateway: &mut G,
    ) {
        let armed = rr >= self.config.trailing_start_rr
            && (!self.config.trail_after_breakeven || record.breakeven_set);
        if !armed {
            return;
        }
        if !record.trailing_active {
            record.trailing_active = true;
            debug!(id = %record.id, "trailing armed");
        }

        let distance = atr * self.trail_multiplier(rr);
        let sign = Decimal::from(record.direction.sign());
        let candidate = price - sign * distance;

        // Must tighten and must stay on the favorable side of entry.
        let favorable = match record.direction {
            quorum_core::Direction::Long => candidate > record.entry_price,
            quorum_core::Direction::Short => candidate < record.entry_price,
        };
        let tightens = match record.direction {
            quorum_core::Direction::Long => candidate > record.stop_loss,
            quorum_core::Direction::Short => candidate < record.stop_loss,
        };
        if !favorable || !tightens {
            return;
        }

        match gateway.modify_stops(&record.id, candidate, record.take_profit) {
            Ok(()) => {
                record.tighten_stop(candidate);
                debug!(id = %record.id, stop = %candidate, %rr, "trailing stop advanced");
            }
            Err(err) => warn!(id = %record.id, %err, "trail modify failed"),
        }
    }

    /// Trailing distance multiplier: the base shrinks through the tier
    /// schedule as the reward multiple grows.
    fn trail_multiplier(&self, rr: Decimal) -> Decimal {
        let mut mult = self.config.trailing_atr_base;
        for tier in &self.config.trail_tiers {
            if rr >= tier.min_reward_multiple {
                mult = tier.atr_multiplier;
            }
        }
        mult
    }
}
