//! Tracked position state and the book that owns it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::signal::{Direction, Strength};

/// Broker-issued position identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PositionId(pub String);

impl PositionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One tracked position with its full lifecycle state.
///
/// `initial_risk` is the entry-to-stop distance captured at fill time
/// and never updated afterwards, so reward multiples stay meaningful
/// after the stop has moved to breakeven or beyond.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionRecord {
    pub id: PositionId,
    pub direction: Direction,
    pub entry_price: Decimal,
    pub original_volume: Decimal,
    pub remaining_volume: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    pub highest_seen: Decimal,
    pub lowest_seen: Decimal,
    pub rungs_hit: [bool; 4],
    pub breakeven_set: bool,
    pub trailing_active: bool,
    pub opened_at: DateTime<Utc>,
    pub entry_strength: Strength,
    pub entry_score: u32,
    pub initial_risk: Decimal,
    pub max_favorable_excursion: Decimal,
}

impl PositionRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        id: PositionId,
        direction: Direction,
        entry_price: Decimal,
        volume: Decimal,
        stop_loss: Decimal,
        take_profit: Decimal,
        opened_at: DateTime<Utc>,
        entry_strength: Strength,
        entry_score: u32,
    ) -> Self {
        let initial_risk = (entry_price - stop_loss).abs();
        Self {
            id,
            direction,
            entry_price,
            original_volume: volume,
            remaining_volume: volume,
            stop_loss,
            take_profit,
            highest_seen: entry_price,
            lowest_seen: entry_price,
            rungs_hit: [false; 4],
            breakeven_set: false,
            trailing_active: false,
            opened_at,
            entry_strength,
            entry_score,
            initial_risk,
            max_favorable_excursion: Decimal::ZERO,
        }
    }

    pub fn is_long(&self) -> bool {
        self.direction.is_long()
    }

    /// Record a new observed price, updating extremes and MFE.
    pub fn observe(&mut self, price: Decimal) {
        if price > self.highest_seen {
            self.highest_seen = price;
        }
        if price < self.lowest_seen {
            self.lowest_seen = price;
        }
        let fav = self.favorable_excursion(price);
        if fav > self.max_favorable_excursion {
            self.max_favorable_excursion = fav;
        }
    }

    /// Distance price has moved in the position's favor. Negative when
    /// under water.
    pub fn favorable_excursion(&self, price: Decimal) -> Decimal {
        match self.direction {
            Direction::Long => price - self.entry_price,
            Direction::Short => self.entry_price - price,
        }
    }

    /// Favorable excursion expressed as a multiple of the initial risk
    /// distance. Zero when the initial risk is degenerate.
    pub fn reward_multiple(&self, price: Decimal) -> Decimal {
        if self.initial_risk <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        self.favorable_excursion(price) / self.initial_risk
    }

    /// Move the stop to `candidate` only if it tightens. Returns true
    /// when the stop actually moved.
    pub fn tighten_stop(&mut self, candidate: Decimal) -> bool {
        let tightens = match self.direction {
            Direction::Long => candidate > self.stop_loss,
            Direction::Short => candidate < self.stop_loss,
        };
        if tightens {
            self.stop_loss = candidate;
        }
        tightens
    }

    /// True once the stop sits at or beyond the favorable side of entry.
    pub fn stop_at_or_past_entry(&self) -> bool {
        match self.direction {
            Direction::Long => self.stop_loss >= self.entry_price,
            Direction::Short => self.stop_loss <= self.entry_price,
        }
    }
}

/// Map of tracked positions keyed by broker id. Removal is by key only,
/// so iteration order never matters and ids stay stable across partial
/// closes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PositionBook {
    positions: HashMap<PositionId, PositionRecord>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: PositionRecord) {
        self.positions.insert(record.id.clone(), record);
    }

    pub fn get(&self, id: &PositionId) -> Option<&PositionRecord> {
        self.positions.get(id)
    }

    pub fn get_mut(&mut self, id: &PositionId) -> Option<&mut PositionRecord> {
        self.positions.get_mut(id)
    }

    pub fn remove(&mut self, id: &PositionId) -> Option<PositionRecord> {
        self.positions.remove(id)
    }

    pub fn contains(&self, id: &PositionId) -> bool {
        self.positions.contains_key(id)
    }

    pub fn ids(&self) -> Vec<PositionId> {
        self.positions.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PositionRecord> {
        self.positions.values()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
