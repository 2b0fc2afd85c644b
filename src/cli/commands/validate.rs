//! Validate configuration command.

use anyhow::Result;
use std::path::Path;

use quorum_config::load_config;

pub fn run(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {:?}", config_path);

    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            println!("Configuration error: {}", e);
            return Err(e.into());
        }
    };
    if let Err(e) = config.validate() {
        println!("Configuration invalid: {}", e);
        return Err(e.into());
    }

    println!("Configuration is valid!");
    println!();
    println!("App: {}", config.app.name);
    println!("Instrument: {}", config.app.instrument);
    println!("Log level: {}", config.logging.level);
    println!("Order tag: {}", config.engine.tag);
    println!("Max concurrent positions: {}", config.engine.max_concurrent_positions);
    println!("Risk per trade: {}%", config.engine.sizer.risk_percent);
    println!("Daily loss limit: {}%", config.engine.governor.daily_loss_pct);
    println!("Weekly loss limit: {}%", config.engine.governor.weekly_loss_pct);
    println!("Max drawdown: {}%", config.engine.governor.max_drawdown_pct);

    Ok(())
}
