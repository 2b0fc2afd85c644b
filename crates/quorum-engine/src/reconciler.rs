//! Keeps the tracked book and the broker's truth in agreement, and
//! attributes realized P&L to the risk governor.

use rust_decimal::Decimal;
use tracing::{info, warn};

use quorum_core::{
    BrokerPosition, ExecutionGateway, GatewayError, MarketSnapshot, PositionBook, PositionRecord,
    Strength,
};
use quorum_risk::RiskGovernor;

use crate::to_decimal;

/// Stop parameters applied when adopting an unmanaged position that
/// arrived without them.
#[derive(Debug, Clone, Copy)]
pub struct AdoptionDefaults {
    /// ATR multiplier for a synthesized stop.
    pub stop_atr_multiplier: f64,
    /// Reward multiple for a synthesized target.
    pub reward_multiple: f64,
}

impl Default for AdoptionDefaults {
    fn default() -> Self {
        Self {
            stop_atr_multiplier: 2.5,
            reward_multiple: 2.0,
        }
    }
}

pub struct Reconciler {
    tag: String,
    defaults: AdoptionDefaults,
}

impl Reconciler {
    pub fn new(tag: impl Into<String>, defaults: AdoptionDefaults) -> Self {
        Self {
            tag: tag.into(),
            defaults,
        }
    }

    /// One resync pass. Tracked-but-gone positions have their history
    /// P&L fed to the governor and are dropped; broker-open positions
    /// carrying our tag but untracked are adopted for supervision.
    pub fn reconcile<G: ExecutionGateway>(
        &self,
        book: &mut PositionBook,
        gateway: &G,
        governor: &mut RiskGovernor,
        snapshot: &MarketSnapshot,
    ) -> Result<(), GatewayError> {
        let open = gateway.list_open_positions(&self.tag)?;

        for id in book.ids() {
            if open.iter().any(|p| p.id == id) {
                continue;
            }
            let Some(record) = book.get(&id) else {
                continue;
            };
            // The record stays in the book until the history query has
            // succeeded and the result is attributed; a transient
            // gateway failure here retries on the next pass.
            let history = gateway.list_closed_trades(record.opened_at)?;
            let pnl: Decimal = history
                .iter()
                .filter(|t| t.position_id == id)
                .map(|t| t.profit)
                .sum();
            info!(%id, %pnl, "position closed at broker, attributing result");
            governor.record_trade_result(pnl);
            book.remove(&id);
        }

        for pos in open {
            if book.contains(&pos.id) {
                continue;
            }
            info!(id = %pos.id, "adopting unmanaged position");
            book.insert(self.adopt(&pos, snapshot));
        }

        Ok(())
    }

    /// Build a record for a position the engine did not open. Strength
    /// is unknown, so lifecycle parameters fall back to the weakest
    /// band; missing stops are synthesized from current volatility so
    /// the position trails exactly like an internally opened one.
    fn adopt(&self, pos: &BrokerPosition, snapshot: &MarketSnapshot) -> PositionRecord {
        let sign = Decimal::from(pos.direction.sign());

        let stop_loss = pos.stop_loss.unwrap_or_else(|| {
            let distance = to_decimal(snapshot.atr.current * self.defaults.stop_atr_multiplier)
                .unwrap_or(Decimal::ZERO);
            pos.entry_price - sign * distance
        });
        let take_profit = pos.take_profit.unwrap_or_else(|| {
            let distance = (pos.entry_price - stop_loss).abs()
                * to_decimal(self.defaults.reward_multiple).unwrap_or(Decimal::TWO);
            pos.entry_price + sign * distance
        });

        PositionRecord::open(
            pos.id.clone(),
            pos.direction,
            pos.entry_price,
            pos.volume,
            stop_loss,
            take_profit,
            pos.opened_at,
            Strength::Weak,
            0,
        )
    }
}
