//! Strategy evaluators and the weighted-vote signal aggregator.
//!
//! Each evaluator is a pure function of the market snapshot producing a
//! [`Vote`]. The [`aggregator::SignalAggregator`] combines votes by
//! configured weight, applies entry gates, and emits the per-interval
//! [`quorum_core::Signal`].

pub mod aggregator;
pub mod breakout;
pub mod momentum;
pub mod structure;
pub mod trend;

pub use aggregator::{AggregatorConfig, SignalAggregator};
pub use breakout::{BreakoutConfig, BreakoutEvaluator};
pub use momentum::{MomentumConfig, MomentumEvaluator};
pub use structure::{StructureConfig, StructureEvaluator};
pub use trend::{TrendConfig, TrendEvaluator};

use serde::{Deserialize, Serialize};

/// One family's opinion for the current interval.
///
/// Both flags false means abstain. Both true never happens from the
/// shipped evaluators; the aggregator treats it as abstention.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub long: bool,
    pub short: bool,
}

impl Vote {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn long() -> Self {
        Self {
            long: true,
            short: false,
        }
    }

    pub fn short() -> Self {
        Self {
            long: false,
            short: true,
        }
    }
}
