//! The decision engine: entry execution, position lifecycle
//! management, broker reconciliation, and the tick loop that wires
//! them to the risk governor and signal aggregator.

pub mod engine;
pub mod executor;
pub mod lifecycle;
pub mod paper;
pub mod reconciler;
pub mod session;
pub mod sim;

pub use engine::{Engine, EngineConfig, EngineStatus};
pub use executor::{EntryExecutor, EntryPlan, ExecutorConfig};
pub use lifecycle::{BreakevenMode, LifecycleConfig, LifecycleManager, TrailTier, TpRung};
pub use paper::PaperGateway;
pub use reconciler::{AdoptionDefaults, Reconciler};
pub use session::{SessionConfig, SessionFilter, SessionWindow};
pub use sim::{SharedClock, SimFeed};

use rust_decimal::Decimal;

/// Lossy f64 to Decimal conversion for the indicator/price boundary.
/// Returns None for NaN or infinities.
pub(crate) fn to_decimal(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::try_from(value).ok()
}
