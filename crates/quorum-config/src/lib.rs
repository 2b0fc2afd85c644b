//! Configuration management.

mod settings;

pub use settings::{AppConfig, AppSettings, LoggingConfig, PaperSettings};

use config::{Config, ConfigError, Environment, File};
use std::path::Path;

/// Load configuration from file and environment. Environment variables
/// prefixed `QUORUM` override file values, with `__` separating
/// nesting levels (`QUORUM__ENGINE__GOVERNOR__MAX_DAILY_TRADES=5`).
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from(path).required(true))
        .add_source(
            Environment::with_prefix("QUORUM")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    config.try_deserialize()
}
