//! Account-level risk control: the governor that gates entries and the
//! sizer that converts risk budget into order volume.

pub mod governor;
pub mod sizer;

pub use governor::{
    FlattenReason, GovernorConfig, HaltState, RiskGovernor, RiskState, RiskStatus,
};
pub use sizer::{PositionSizer, SizerConfig};
