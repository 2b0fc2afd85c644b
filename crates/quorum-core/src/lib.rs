//! Core types, traits, and errors for the quorum decision engine.
//!
//! Everything here is I/O-free. The engine crates depend on these
//! definitions; concrete feeds and gateways implement the traits.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{DataError, EngineError, EngineResult, GatewayError, SignalError};
pub use traits::{AccountInfo, Clock, ExecutionGateway, FixedClock, MarketFeed, SystemClock};
pub use types::{
    BrokerPosition, ClosedTrade, Direction, EntryOrder, HtfView, IndicatorSeries, MarketSnapshot,
    OrderResult, PositionBook, PositionId, PositionRecord, Signal, Strength, StrategyFamily,
    SymbolSpec, VolatilityRegime,
};
