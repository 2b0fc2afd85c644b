//! Gateway-facing order and instrument types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::position::PositionId;
use super::signal::Direction;

/// Market entry request handed to the execution gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryOrder {
    pub instrument: String,
    pub direction: Direction,
    pub volume: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    /// Engine tag carried on every order so the reconciler can tell
    /// supervised positions from foreign ones.
    pub tag: String,
}

/// Confirmed fill returned by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResult {
    pub position_id: PositionId,
    pub fill_price: Decimal,
    pub volume: Decimal,
    pub filled_at: DateTime<Utc>,
}

/// A position as the broker reports it, used during reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerPosition {
    pub id: PositionId,
    pub instrument: String,
    pub direction: Direction,
    pub volume: Decimal,
    pub entry_price: Decimal,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub tag: String,
    pub opened_at: DateTime<Utc>,
}

/// Realized P&L row from broker history. Partial closes produce one
/// row each, all sharing the position id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub position_id: PositionId,
    pub volume: Decimal,
    pub profit: Decimal,
    pub closed_at: DateTime<Utc>,
}

/// Broker constraints for one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolSpec {
    /// Smallest price increment.
    pub tick_size: Decimal,
    /// Account-currency value of one tick for one unit of volume.
    pub tick_value: Decimal,
    pub volume_step: Decimal,
    pub volume_min: Decimal,
    pub volume_max: Decimal,
    /// Minimum distance the broker accepts between price and a stop.
    pub min_stop_distance: Decimal,
}

impl SymbolSpec {
    /// Floor a volume to the instrument's step grid.
    pub fn round_volume_down(&self, volume: Decimal) -> Decimal {
        if self.volume_step <= Decimal::ZERO {
            return volume;
        }
        (volume / self.volume_step).floor() * self.volume_step
    }

    /// Account-currency loss for one unit of volume across `distance`
    /// of price movement. Zero when the spec is degenerate.
    pub fn loss_per_unit(&self, distance: Decimal) -> Decimal {
        if self.tick_size <= Decimal::ZERO || self.tick_value <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        distance / self.tick_size * self.tick_value
    }
}

impl Default for SymbolSpec {
    fn default() -> Self {
        Self {
            tick_size: dec!(0.01),
            tick_value: dec!(0.01),
            volume_step: dec!(0.01),
            volume_min: dec!(0.01),
            volume_max: dec!(100),
            min_stop_distance: Decimal::ZERO,
        }
    }
}
