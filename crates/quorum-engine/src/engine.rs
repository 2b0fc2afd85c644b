//! Top-level decision loop wiring signals, risk, execution, and
//! position supervision together.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use quorum_core::{
    AccountInfo, Clock, EngineError, EngineResult, ExecutionGateway, MarketFeed, PositionBook,
    Signal,
};
use quorum_risk::{PositionSizer, RiskGovernor, RiskStatus, SizerConfig};
use quorum_strategies::{AggregatorConfig, SignalAggregator};

use crate::executor::{EntryExecutor, ExecutorConfig};
use crate::lifecycle::{LifecycleConfig, LifecycleManager};
use crate::reconciler::{AdoptionDefaults, Reconciler};
use crate::session::{SessionConfig, SessionFilter};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Tag stamped on every order this engine submits.
    pub tag: String,
    /// Bars of history a snapshot must carry before evaluation.
    pub min_lookback: usize,
    pub max_concurrent_positions: usize,

    pub aggregator: AggregatorConfig,
    pub governor: quorum_risk::GovernorConfig,
    pub sizer: SizerConfig,
    pub executor: ExecutorConfig,
    pub lifecycle: LifecycleConfig,
    pub session: SessionConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tag: "quorum".to_string(),
            min_lookback: 21,
            max_concurrent_positions: 3,
            aggregator: AggregatorConfig::default(),
            governor: quorum_risk::GovernorConfig::default(),
            sizer: SizerConfig::default(),
            executor: ExecutorConfig::default(),
            lifecycle: LifecycleConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.tag.is_empty() {
            return Err(EngineError::Validation(
                "engine: tag must not be empty".to_string(),
            ));
        }
        if self.min_lookback < 3 {
            return Err(EngineError::Validation(
                "engine: min_lookback must be at least 3".to_string(),
            ));
        }
        if self.max_concurrent_positions == 0 {
            return Err(EngineError::Validation(
                "engine: max_concurrent_positions must be positive".to_string(),
            ));
        }
        self.aggregator.validate().map_err(EngineError::Signal)?;
        self.governor.validate()?;
        self.sizer.validate()?;
        self.executor.validate()?;
        self.lifecycle.validate()?;
        self.session.validate()?;
        // The sizer splits the risk budget by the same count the
        // executor submits; a mismatch mis-risks every signal.
        if self.executor.entries_per_signal != self.sizer.entries_per_signal {
            return Err(EngineError::Validation(format!(
                "engine: executor submits {} entries per signal but the sizer budgets for {}",
                self.executor.entries_per_signal, self.sizer.entries_per_signal
            )));
        }
        Ok(())
    }
}

/// Read-only view of the engine for status displays.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub last_signal: Signal,
    pub risk: RiskStatus,
    pub open_positions: usize,
}

pub struct Engine<F, G, C>
where
    F: MarketFeed,
    G: ExecutionGateway + AccountInfo,
    C: Clock,
{
    config: EngineConfig,
    feed: F,
    gateway: G,
    clock: C,

    aggregator: SignalAggregator,
    governor: RiskGovernor,
    sizer: PositionSizer,
    executor: EntryExecutor,
    lifecycle: LifecycleManager,
    reconciler: Reconciler,
    session: SessionFilter,

    book: PositionBook,
    last_signal: Signal,
}

impl<F, G, C> Engine<F, G, C>
where
    F: MarketFeed,
    G: ExecutionGateway + AccountInfo,
    C: Clock,
{
    pub fn new(config: EngineConfig, feed: F, gateway: G, clock: C) -> EngineResult<Self> {
        config.validate()?;
        let now = clock.now();
        let balance = gateway.balance();
        let governor = RiskGovernor::new(config.governor.clone(), now, balance);
        Ok(Self {
            aggregator: SignalAggregator::new(config.aggregator.clone()),
            governor,
            sizer: PositionSizer::new(config.sizer.clone()),
            executor: EntryExecutor::new(config.executor.clone(), config.tag.clone()),
            lifecycle: LifecycleManager::new(config.lifecycle.clone()),
            reconciler: Reconciler::new(config.tag.clone(), AdoptionDefaults::default()),
            session: SessionFilter::new(config.session.clone()),
            book: PositionBook::new(),
            last_signal: Signal::none(),
            config,
            feed,
            gateway,
            clock,
        })
    }

    pub fn feed_mut(&mut self) -> &mut F {
        &mut self.feed
    }

    pub fn gateway_mut(&mut self) -> &mut G {
        &mut self.gateway
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            last_signal: self.last_signal.clone(),
            risk: self.governor.status(),
            open_positions: self.book.len(),
        }
    }

    /// One pass of the supervision loop: reconcile against the broker,
    /// enforce risk limits, manage open positions, and evaluate for
    /// new entries when a fresh bar has closed.
    pub fn on_tick(&mut self) -> EngineResult<()> {
        let now = self.clock.now();
        self.governor.roll_clock(now, self.gateway.balance());

        let snapshot = match self.feed.snapshot() {
            Ok(snapshot) => snapshot,
            Err(err) => {
                debug!(%err, "no usable snapshot, skipping tick");
                return Ok(());
            }
        };

        if let Err(err) =
            self.reconciler
                .reconcile(&mut self.book, &self.gateway, &mut self.governor, &snapshot)
        {
            // Stale book state is tolerable for one tick; the next
            // pass retries.
            warn!(%err, "reconciliation failed");
        }

        if let Some(reason) = self.governor.evaluate(self.gateway.balance()) {
            warn!(?reason, "risk limit breached, flattening all positions");
            self.lifecycle.flatten_all(&mut self.book, &mut self.gateway);
        }

        if snapshot.is_complete(self.config.min_lookback) {
            self.lifecycle
                .manage(&mut self.book, &snapshot, &mut self.gateway);
        }

        if self.feed.is_new_interval() {
            self.on_new_interval(&snapshot, now)?;
        }
        Ok(())
    }

    /// Bar-close evaluation: aggregate the strategy votes and, when
    /// every gate agrees, size and submit the entry.
    fn on_new_interval(&mut self, snapshot: &quorum_core::MarketSnapshot, now: DateTime<Utc>) -> EngineResult<()> {
        if !snapshot.is_complete(self.config.min_lookback) {
            debug!("snapshot incomplete, skipping evaluation");
            return Ok(());
        }

        let signal = self.aggregator.evaluate(snapshot);
        self.last_signal = signal.clone();

        let Some(direction) = signal.direction else {
            return Ok(());
        };
        if !self.governor.entries_allowed() {
            info!(halt = ?self.governor.halt_state(), "entry suppressed by risk governor");
            return Ok(());
        }
        if !self.session.is_open(now) {
            debug!("outside trading session, entry suppressed");
            return Ok(());
        }
        if self.book.len() >= self.config.max_concurrent_positions {
            debug!(
                open = self.book.len(),
                "position cap reached, entry suppressed"
            );
            return Ok(());
        }

        let spec = self.gateway.symbol_spec();
        let plan = match self.executor.plan(direction, snapshot, &spec) {
            Ok(plan) => plan,
            Err(EngineError::Validation(reason)) => {
                info!(%reason, "entry plan rejected");
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        let volume = self.sizer.size(
            plan.stop_distance,
            signal.strength,
            self.gateway.equity(),
            plan.regime,
            &spec,
        );

        let records = self
            .executor
            .execute(&mut self.gateway, &plan, volume, &signal, snapshot, now);
        for record in records {
            info!(
                id = %record.id,
                %direction,
                volume = %record.original_volume,
                score = signal.score,
                "position opened"
            );
            self.book.insert(record);
            self.governor.note_trade_opened();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paper::PaperGateway;
    use chrono::TimeZone;
    use quorum_core::{
        DataError, FixedClock, HtfView, IndicatorSeries, MarketSnapshot, SymbolSpec,
    };
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    struct StubFeed {
        snapshot: Option<MarketSnapshot>,
        new_interval: bool,
    }

    impl MarketFeed for StubFeed {
        fn snapshot(&self) -> Result<MarketSnapshot, DataError> {
            self.snapshot
                .clone()
                .ok_or_else(|| DataError::NoData("BTCUSD".to_string()))
        }

        fn is_new_interval(&mut self) -> bool {
            std::mem::take(&mut self.new_interval)
        }
    }

    fn unit_spec() -> SymbolSpec {
        SymbolSpec {
            tick_size: dec!(1),
            tick_value: dec!(1),
            volume_step: dec!(0.01),
            volume_min: dec!(0.01),
            volume_max: dec!(100),
            min_stop_distance: Decimal::ZERO,
        }
    }

    // Aligned rising EMA stack plus a fresh higher high: trend and
    // structure both vote long, clearing the score and two-family
    // requirements.
    fn bullish_snapshot() -> MarketSnapshot {
        let mut highs = vec![50_100.0; 30];
        highs[0] = 50_250.0;
        MarketSnapshot {
            instrument: "BTCUSD".to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 3, 2, 13, 0, 0).unwrap(),
            bid: 50_500.0,
            ask: 50_510.0,
            closes: vec![50_000.0; 30],
            highs,
            lows: vec![49_900.0; 30],
            volumes: vec![10.0; 30],
            ema_fast: IndicatorSeries::new(50_400.0, 50_350.0, 50_300.0),
            ema_medium: IndicatorSeries::new(50_200.0, 50_180.0, 50_160.0),
            ema_slow: IndicatorSeries::new(50_000.0, 49_990.0, 49_980.0),
            ema_trend: IndicatorSeries::new(49_800.0, 49_790.0, 49_780.0),
            ema_anchor: IndicatorSeries::new(49_500.0, 49_490.0, 49_480.0),
            rsi: IndicatorSeries::new(60.0, 58.0, 56.0),
            atr: IndicatorSeries::new(400.0, 398.0, 396.0),
            adx: IndicatorSeries::new(25.0, 24.0, 23.0),
            band_upper: IndicatorSeries::new(51_000.0, 50_950.0, 50_900.0),
            band_mid: IndicatorSeries::new(50_000.0, 49_990.0, 49_980.0),
            band_lower: IndicatorSeries::new(49_000.0, 49_030.0, 49_060.0),
            htf: Some(HtfView {
                bullish: true,
                bearish: false,
            }),
        }
    }

    fn monday_noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 13, 0, 0).unwrap()
    }

    fn engine_with(
        snapshot: Option<MarketSnapshot>,
        config: EngineConfig,
    ) -> Engine<StubFeed, PaperGateway, FixedClock> {
        let feed = StubFeed {
            snapshot,
            new_interval: true,
        };
        let mut gateway = PaperGateway::new(dec!(100000), unit_spec());
        gateway.set_quote(50_500.0, 50_510.0, monday_noon());
        Engine::new(config, feed, gateway, FixedClock(monday_noon())).unwrap()
    }

    #[test]
    fn bullish_bar_opens_a_tagged_position() {
        let mut engine = engine_with(Some(bullish_snapshot()), EngineConfig::default());
        engine.on_tick().unwrap();

        let status = engine.status();
        assert_eq!(status.open_positions, 1);
        assert!(status.last_signal.is_actionable());
        assert_eq!(
            engine
                .gateway_mut()
                .list_open_positions("quorum")
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn missing_snapshot_is_skipped_quietly() {
        let mut engine = engine_with(None, EngineConfig::default());
        assert!(engine.on_tick().is_ok());
        assert_eq!(engine.status().open_positions, 0);
    }

    #[test]
    fn position_cap_blocks_further_entries() {
        let mut config = EngineConfig::default();
        config.max_concurrent_positions = 1;
        let mut engine = engine_with(Some(bullish_snapshot()), config);

        engine.on_tick().unwrap();
        assert_eq!(engine.status().open_positions, 1);

        engine.feed_mut().new_interval = true;
        engine.on_tick().unwrap();
        assert_eq!(engine.status().open_positions, 1);
    }

    #[test]
    fn closed_session_blocks_entries() {
        let feed = StubFeed {
            snapshot: Some(bullish_snapshot()),
            new_interval: true,
        };
        let mut gateway = PaperGateway::new(dec!(100000), unit_spec());
        // Saturday.
        let saturday = Utc.with_ymd_and_hms(2026, 3, 7, 13, 0, 0).unwrap();
        gateway.set_quote(50_500.0, 50_510.0, saturday);
        let mut engine =
            Engine::new(EngineConfig::default(), feed, gateway, FixedClock(saturday)).unwrap();

        engine.on_tick().unwrap();
        // The signal is still computed and reported, only entry is
        // suppressed.
        assert!(engine.status().last_signal.is_actionable());
        assert_eq!(engine.status().open_positions, 0);
    }

    #[test]
    fn no_entry_without_new_interval() {
        let mut engine = engine_with(Some(bullish_snapshot()), EngineConfig::default());
        engine.feed_mut().new_interval = false;
        engine.on_tick().unwrap();
        assert_eq!(engine.status().open_positions, 0);
    }

    #[test]
    fn daily_trade_cap_suppresses_entries() {
        let mut config = EngineConfig::default();
        config.governor.max_daily_trades = 1;
        let mut engine = engine_with(Some(bullish_snapshot()), config);

        engine.on_tick().unwrap();
        assert_eq!(engine.status().open_positions, 1);

        engine.feed_mut().new_interval = true;
        engine.on_tick().unwrap();
        assert_eq!(engine.status().open_positions, 1);
        assert_eq!(engine.status().risk.daily_trades, 1);
    }

    #[test]
    fn mismatched_entry_counts_are_rejected() {
        let mut config = EngineConfig::default();
        config.executor.entries_per_signal = 2;
        assert!(config.validate().is_err());

        config.sizer.entries_per_signal = 2;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = EngineConfig::default();
        config.max_concurrent_positions = 0;
        let feed = StubFeed {
            snapshot: None,
            new_interval: false,
        };
        let gateway = PaperGateway::new(dec!(100000), unit_spec());
        assert!(Engine::new(config, feed, gateway, FixedClock(monday_noon())).is_err());
    }
}
