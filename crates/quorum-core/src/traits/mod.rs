//! Seams between the engine and the outside world.
//!
//! All traits are synchronous: the engine runs a single-threaded
//! cooperative loop, and tests inject in-memory implementations.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::error::{DataError, GatewayError};
use crate::types::{
    BrokerPosition, ClosedTrade, EntryOrder, MarketSnapshot, OrderResult, PositionId, SymbolSpec,
};

/// Source of per-interval market snapshots.
pub trait MarketFeed {
    /// Current snapshot. Incomplete or stale data is an error; the
    /// engine skips the interval.
    fn snapshot(&self) -> Result<MarketSnapshot, DataError>;

    /// True exactly once when a new interval has closed since the last
    /// call.
    fn is_new_interval(&mut self) -> bool;
}

/// Order routing and position queries against the broker.
///
/// A returned error means the request did not *observably* succeed.
/// Timeouts leave the true outcome unknown; the reconciler's next
/// resync is the authority on what actually happened.
pub trait ExecutionGateway {
    fn submit_market_order(&mut self, order: &EntryOrder) -> Result<OrderResult, GatewayError>;

    fn modify_stops(
        &mut self,
        id: &PositionId,
        stop_loss: Decimal,
        take_profit: Decimal,
    ) -> Result<(), GatewayError>;

    /// Close `volume` of the position (all of it when `volume` covers
    /// the remainder).
    fn close_position(&mut self, id: &PositionId, volume: Decimal) -> Result<(), GatewayError>;

    /// Open positions carrying the given engine tag.
    fn list_open_positions(&self, tag: &str) -> Result<Vec<BrokerPosition>, GatewayError>;

    /// Closed-trade history rows at or after `since`.
    fn list_closed_trades(&self, since: DateTime<Utc>) -> Result<Vec<ClosedTrade>, GatewayError>;

    fn symbol_spec(&self) -> SymbolSpec;
}

/// Account balance and equity as the broker reports them.
pub trait AccountInfo {
    fn balance(&self) -> Decimal;
    fn equity(&self) -> Decimal;
}

/// Injected time source. The engine never reads the wall clock
/// directly.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock implementation used by the binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fixed clock for tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
