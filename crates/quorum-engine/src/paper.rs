//! In-memory execution gateway for simulation and tests: instant
//! fills, stop/target sweeps on every quote, full closed-trade
//! history.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

use quorum_core::{
    AccountInfo, BrokerPosition, ClosedTrade, Direction, EntryOrder, ExecutionGateway,
    GatewayError, OrderResult, PositionId, SymbolSpec,
};

use crate::to_decimal;

pub struct PaperGateway {
    balance: Decimal,
    positions: HashMap<PositionId, BrokerPosition>,
    closed: Vec<ClosedTrade>,
    spec: SymbolSpec,
    bid: Decimal,
    ask: Decimal,
    now: DateTime<Utc>,
}

impl PaperGateway {
    pub fn new(initial_balance: Decimal, spec: SymbolSpec) -> Self {
        Self {
            balance: initial_balance,
            positions: HashMap::new(),
            closed: Vec::new(),
            spec,
            bid: Decimal::ZERO,
            ask: Decimal::ZERO,
            now: Utc::now(),
        }
    }

    /// Update the market quote and sweep resting stops and targets.
    pub fn set_quote(&mut self, bid: f64, ask: f64, now: DateTime<Utc>) {
        self.bid = to_decimal(bid).unwrap_or(self.bid);
        self.ask = to_decimal(ask).unwrap_or(self.ask);
        self.now = now;
        self.sweep();
    }

    pub fn position(&self, id: &PositionId) -> Option<BrokerPosition> {
        self.positions.get(id).cloned()
    }

    pub fn open_position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn closed_trades(&self) -> &[ClosedTrade] {
        &self.closed
    }

    fn exit_price(&self, direction: Direction) -> Decimal {
        match direction {
            Direction::Long => self.bid,
            Direction::Short => self.ask,
        }
    }

    fn realized(&self, pos: &BrokerPosition, exit: Decimal, volume: Decimal) -> Decimal {
        let sign = Decimal::from(pos.direction.sign());
        let distance = (exit - pos.entry_price) * sign;
        self.spec.loss_per_unit(distance) * volume
    }

    fn close_at(&mut self, id: &PositionId, volume: Decimal, exit: Decimal) {
        let Some(pos) = self.positions.get(id) else {
            return;
        };
        let volume = volume.min(pos.volume);
        let profit = self.realized(pos, exit, volume);
        self.balance += profit;
        self.closed.push(ClosedTrade {
            position_id: id.clone(),
            volume,
            profit,
            closed_at: self.now,
        });
        if let Some(pos) = self.positions.get_mut(id) {
            pos.volume -= volume;
            if pos.volume <= Decimal::ZERO {
                self.positions.remove(id);
            }
        }
    }

    /// Triggered stops and targets fill at their level, no slippage.
    fn sweep(&mut self) {
        let ids: Vec<PositionId> = self.positions.keys().cloned().collect();
        for id in ids {
            let Some(pos) = self.positions.get(&id) else {
                continue;
            };
            let mark = self.exit_price(pos.direction);
            let stop = pos.stop_loss;
            let target = pos.take_profit;
            let volume = pos.volume;

            let stop_hit = match (pos.direction, stop) {
                (Direction::Long, Some(sl)) => mark <= sl,
                (Direction::Short, Some(sl)) => mark >= sl,
                (_, None) => false,
            };
            if stop_hit {
                debug!(%id, "stop hit");
                if let Some(sl) = stop {
                    self.close_at(&id, volume, sl);
                }
                continue;
            }

            let target_hit = match (pos.direction, target) {
                (Direction::Long, Some(tp)) => mark >= tp,
                (Direction::Short, Some(tp)) => mark <= tp,
                (_, None) => false,
            };
            if target_hit {
                debug!(%id, "target hit");
                if let Some(tp) = target {
                    self.close_at(&id, volume, tp);
                }
            }
        }
    }
}

impl ExecutionGateway for PaperGateway {
    fn submit_market_order(&mut self, order: &EntryOrder) -> Result<OrderResult, GatewayError> {
        let fill_price = match order.direction {
            Direction::Long => self.ask,
            Direction::Short => self.bid,
        };
        if fill_price <= Decimal::ZERO {
            return Err(GatewayError::OrderRejected("no market quote".to_string()));
        }
        if order.volume < self.spec.volume_min || order.volume > self.spec.volume_max {
            return Err(GatewayError::OrderRejected(format!(
                "volume {} outside [{}, {}]",
                order.volume, self.spec.volume_min, self.spec.volume_max
            )));
        }

        let id = PositionId::new(Uuid::new_v4().to_string());
        self.positions.insert(
            id.clone(),
            BrokerPosition {
                id: id.clone(),
                instrument: order.instrument.clone(),
                direction: order.direction,
                volume: order.volume,
                entry_price: fill_price,
                stop_loss: Some(order.stop_loss),
                take_profit: Some(order.take_profit),
                tag: order.tag.clone(),
                opened_at: self.now,
            },
        );

        Ok(OrderResult {
            position_id: id,
            fill_price,
            volume: order.volume,
            filled_at: self.now,
        })
    }

    fn modify_stops(
        &mut self,
        id: &PositionId,
        stop_loss: Decimal,
        take_profit: Decimal,
    ) -> Result<(), GatewayError> {
        let pos = self
            .positions
            .get_mut(id)
            .ok_or_else(|| GatewayError::PositionNotFound(id.to_string()))?;
        pos.stop_loss = Some(stop_loss);
        pos.take_profit = Some(take_profit);
        Ok(())
    }

    fn close_position(&mut self, id: &PositionId, volume: Decimal) -> Result<(), GatewayError> {
        let pos = self
            .positions
            .get(id)
            .ok_or_else(|| GatewayError::PositionNotFound(id.to_string()))?;
        let exit = self.exit_price(pos.direction);
        if exit <= Decimal::ZERO {
            return Err(GatewayError::OrderRejected("no market quote".to_string()));
        }
        self.close_at(id, volume, exit);
        Ok(())
    }

    fn list_open_positions(&self, tag: &str) -> Result<Vec<BrokerPosition>, GatewayError> {
        Ok(self
            .positions
            .values()
            .filter(|p| p.tag == tag)
            .cloned()
            .collect())
    }

    fn list_closed_trades(&self, since: DateTime<Utc>) -> Result<Vec<ClosedTrade>, GatewayError> {
        Ok(self
            .closed
            .iter()
            .filter(|t| t.closed_at >= since)
            .cloned()
            .collect())
    }

    fn symbol_spec(&self) -> SymbolSpec {
        self.spec.clone()
    }
}

impl AccountInfo for PaperGateway {
    fn balance(&self) -> Decimal {
        self.balance
    }

    fn equity(&self) -> Decimal {
        let unrealized: Decimal = self
            .positions
            .values()
            .map(|p| {
                let mark = self.exit_price(p.direction);
                if mark <= Decimal::ZERO {
                    Decimal::ZERO
                } else {
                    self.realized(p, mark, p.volume)
                }
            })
            .sum();
        self.balance + unrealized
    }
}
