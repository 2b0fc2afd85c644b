//! Paper trading command implementation.

use anyhow::Result;
use chrono::{Duration, Utc};
use std::path::Path;
use tracing::info;

use quorum_config::load_config;
use quorum_core::{AccountInfo, MarketFeed, SymbolSpec};
use quorum_engine::{Engine, PaperGateway, SharedClock, SimFeed};

use crate::cli::PaperArgs;

// Bars fed before the engine starts so indicators are settled.
const WARMUP_INTERVALS: u32 = 250;

pub fn run(args: PaperArgs, config_path: &Path) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(seed) = args.seed {
        config.paper.seed = seed;
    }
    if let Some(capital) = args.capital {
        config.paper.initial_balance = capital;
    }
    config.validate()?;

    let start = Utc::now();
    let mut feed = SimFeed::new(
        config.app.instrument.clone(),
        config.paper.seed,
        config.paper.start_price,
        start,
        Duration::minutes(config.paper.interval_minutes),
    );
    for _ in 0..WARMUP_INTERVALS {
        feed.step();
    }
    // Warmup bars must not count as fresh intervals.
    let _ = feed.is_new_interval();

    let mut gateway = PaperGateway::new(config.paper.initial_balance, SymbolSpec::default());
    let (bid, ask) = feed.quote();
    gateway.set_quote(bid, ask, feed.time());

    let clock = SharedClock::new(feed.time());
    let mut engine = Engine::new(config.engine.clone(), feed, gateway, clock.clone())?;

    info!(
        instrument = %config.app.instrument,
        seed = config.paper.seed,
        intervals = args.intervals,
        "starting paper run"
    );

    for interval in 1..=args.intervals {
        let now = engine.feed_mut().step();
        let (bid, ask) = engine.feed_mut().quote();
        clock.set(now);
        engine.gateway_mut().set_quote(bid, ask, now);
        engine.on_tick()?;

        if args.report_every > 0 && interval % args.report_every == 0 {
            let status = engine.status();
            info!(
                interval,
                open = status.open_positions,
                halt = ?status.risk.halt,
                daily_pnl = %status.risk.daily_pnl,
                "checkpoint"
            );
        }
    }

    let status = engine.status();
    let gateway = engine.gateway_mut();
    println!("Paper run complete.");
    println!("Final balance:  {}", gateway.balance());
    println!("Final equity:   {}", gateway.equity());
    println!("Closed trades:  {}", gateway.closed_trades().len());
    println!("Open positions: {}", status.open_positions);
    println!("Risk status:    {}", serde_json::to_string_pretty(&status.risk)?);

    Ok(())
}
