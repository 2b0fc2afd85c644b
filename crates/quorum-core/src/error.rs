//! Error types for the decision engine.

use thiserror::Error;

/// Top-level engine error.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Signal error: {0}")]
    Signal(#[from] SignalError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Entry blocked by risk governor: {reason}")]
    RiskBlocked { reason: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors from signal evaluation and aggregation.
#[derive(Error, Debug)]
pub enum SignalError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Insufficient history: need {required} intervals, have {available}")]
    InsufficientHistory { required: usize, available: usize },
}

/// Errors from the external execution gateway.
///
/// A timeout is an *unknown* outcome: the order may or may not have taken
/// effect. The reconciler's next resync, not the call site, decides.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Order rejected: {0}")]
    OrderRejected(String),

    #[error("Position not found: {0}")]
    PositionNotFound(String),

    #[error("Stop modification rejected: {0}")]
    ModifyRejected(String),

    #[error("Request timed out; outcome unknown")]
    Timeout,

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        required: rust_decimal::Decimal,
        available: rust_decimal::Decimal,
    },

    #[error("Gateway error: {0}")]
    Internal(String),
}

/// Market data errors.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Snapshot incomplete: {0}")]
    IncompleteSnapshot(String),

    #[error("Snapshot stale: last update {0}")]
    StaleSnapshot(chrono::DateTime<chrono::Utc>),

    #[error("No data available for {0}")]
    NoData(String),
}

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
