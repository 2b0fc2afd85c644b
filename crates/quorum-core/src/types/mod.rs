//! Core data types.

mod market;
mod order;
mod position;
mod signal;

pub use market::{HtfView, IndicatorSeries, MarketSnapshot, VolatilityRegime};
pub use order::{BrokerPosition, ClosedTrade, EntryOrder, OrderResult, SymbolSpec};
pub use position::{PositionBook, PositionId, PositionRecord};
pub use signal::{Direction, Signal, Strength, StrategyFamily};
