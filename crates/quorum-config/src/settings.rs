//! Configuration structures.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use quorum_core::EngineError;
use quorum_engine::EngineConfig;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub paper: PaperSettings,
    #[serde(default)]
    pub engine: EngineConfig,
}

impl AppConfig {
    /// Reject configurations the engine would refuse at startup, so
    /// bad values surface before any orders are possible.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.app.instrument.is_empty() {
            return Err(EngineError::Validation(
                "app: instrument must not be empty".to_string(),
            ));
        }
        self.engine.validate()
    }
}

/// General app settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub name: String,
    pub environment: String,
    /// Instrument the engine trades.
    pub instrument: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: "quorum".to_string(),
            environment: "development".to_string(),
            instrument: "BTCUSD".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file: None,
        }
    }
}

/// Paper-trading run settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaperSettings {
    pub initial_balance: Decimal,
    /// Seed for the synthetic feed; identical seeds replay identical
    /// runs.
    pub seed: u64,
    pub start_price: f64,
    pub interval_minutes: i64,
}

impl Default for PaperSettings {
    fn default() -> Self {
        use rust_decimal_macros::dec;
        Self {
            initial_balance: dec!(100000),
            seed: 42,
            start_price: 50_000.0,
            interval_minutes: 5,
        }
    }
}
