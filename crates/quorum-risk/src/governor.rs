//! Account-level halt logic: daily/weekly loss limits, drawdown, and
//! the consecutive-loss emergency stop.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use quorum_core::EngineError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernorConfig {
    /// Daily loss limit as a percent of day-start balance, applied
    /// when the balance is at or above `balance_threshold`.
    pub daily_loss_pct: Decimal,
    /// Weekly loss limit as a percent of week-start balance.
    pub weekly_loss_pct: Decimal,
    /// Below this balance the percent limits give way to fixed floors.
    pub balance_threshold: Decimal,
    pub daily_loss_floor: Decimal,
    pub weekly_loss_floor: Decimal,
    /// Drawdown from peak balance, percent, that halts the session.
    pub max_drawdown_pct: Decimal,
    /// Consecutive realized losses that trigger the emergency stop.
    pub max_consecutive_losses: u32,
    pub max_daily_trades: u32,
    /// Day the weekly window re-baselines on, 0 = Monday through
    /// 6 = Sunday.
    pub week_start_day: u32,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            daily_loss_pct: dec!(10),
            weekly_loss_pct: dec!(20),
            balance_threshold: dec!(5000),
            daily_loss_floor: dec!(1000),
            weekly_loss_floor: dec!(2000),
            max_drawdown_pct: dec!(10),
            max_consecutive_losses: 3,
            max_daily_trades: 10,
            week_start_day: 0,
        }
    }
}

impl GovernorConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.daily_loss_pct <= Decimal::ZERO || self.weekly_loss_pct <= Decimal::ZERO {
            return Err(EngineError::Validation(
                "governor: loss percentages must be positive".to_string(),
            ));
        }
        if self.max_drawdown_pct <= Decimal::ZERO || self.max_drawdown_pct > dec!(100) {
            return Err(EngineError::Validation(
                "governor: max_drawdown_pct must be in (0, 100]".to_string(),
            ));
        }
        if self.max_consecutive_losses == 0 {
            return Err(EngineError::Validation(
                "governor: max_consecutive_losses must be positive".to_string(),
            ));
        }
        if self.week_start_day > 6 {
            return Err(EngineError::Validation(
                "governor: week_start_day must be 0..=6".to_string(),
            ));
        }
        Ok(())
    }
}

/// Highest-priority active halt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HaltState {
    Trading,
    DailyHalted,
    WeeklyHalted,
    DrawdownHalted,
    EmergencyHalted,
}

/// Why a flatten-all was commanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlattenReason {
    Drawdown,
    ConsecutiveLosses,
}

/// Owned, explicit risk state. Nothing here is ambient or global.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskState {
    pub day_start_balance: Decimal,
    pub week_start_balance: Decimal,
    pub daily_pnl: Decimal,
    pub weekly_pnl: Decimal,
    pub daily_trades: u32,
    pub consecutive_losses: u32,
    pub consecutive_wins: u32,
    pub wins: u32,
    pub losses: u32,
    pub peak_balance: Decimal,
    pub max_drawdown_seen: Decimal,
    current_day: NaiveDate,
    current_week_start: NaiveDate,
    daily_halted: bool,
    weekly_halted: bool,
    drawdown_halted: bool,
    emergency_halted: bool,
    // Ensures the flatten side effect fires once per halt entry.
    flatten_issued: bool,
}

impl RiskState {
    fn new(now: DateTime<Utc>, balance: Decimal, week_start_day: u32) -> Self {
        Self {
            day_start_balance: balance,
            week_start_balance: balance,
            daily_pnl: Decimal::ZERO,
            weekly_pnl: Decimal::ZERO,
            daily_trades: 0,
            consecutive_losses: 0,
            consecutive_wins: 0,
            wins: 0,
            losses: 0,
            peak_balance: balance,
            max_drawdown_seen: Decimal::ZERO,
            current_day: now.date_naive(),
            current_week_start: week_start(now.date_naive(), week_start_day),
            daily_halted: false,
            weekly_halted: false,
            drawdown_halted: false,
            emergency_halted: false,
            flatten_issued: false,
        }
    }

    pub fn halt_state(&self) -> HaltState {
        if self.emergency_halted {
            HaltState::EmergencyHalted
        } else if self.drawdown_halted {
            HaltState::DrawdownHalted
        } else if self.weekly_halted {
            HaltState::WeeklyHalted
        } else if self.daily_halted {
            HaltState::DailyHalted
        } else {
            HaltState::Trading
        }
    }
}

/// Read-only snapshot for status reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskStatus {
    pub halt: HaltState,
    pub daily_pnl: Decimal,
    pub weekly_pnl: Decimal,
    pub daily_trades: u32,
    pub consecutive_losses: u32,
    pub wins: u32,
    pub losses: u32,
    pub peak_balance: Decimal,
    pub max_drawdown_seen: Decimal,
}

/// Most recent date at or before `date` that falls on `start_day`
/// (0 = Monday).
fn week_start(date: NaiveDate, start_day: u32) -> NaiveDate {
    let today = date.weekday().num_days_from_monday();
    let back = (today + 7 - start_day) % 7;
    date - Duration::days(back as i64)
}

/// Gates entries and issues the flatten-all command on the halts that
/// warrant it. Daily and weekly halts only stop new entries; open
/// positions keep their lifecycle supervision.
#[derive(Debug, Clone)]
pub struct RiskGovernor {
    config: GovernorConfig,
    state: RiskState,
}

impl RiskGovernor {
    pub fn new(config: GovernorConfig, now: DateTime<Utc>, balance: Decimal) -> Self {
        let state = RiskState::new(now, balance, config.week_start_day);
        Self { config, state }
    }

    /// Handle day and week boundaries: reset windows, re-baseline, and
    /// clear the corresponding halt latches. Drawdown and emergency
    /// latches are never cleared here.
    pub fn roll_clock(&mut self, now: DateTime<Utc>, balance: Decimal) {
        let today = now.date_naive();
        if today != self.state.current_day {
            info!(%today, %balance, "new trading day, resetting daily window");
            self.state.current_day = today;
            self.state.day_start_balance = balance;
            self.state.daily_pnl = Decimal::ZERO;
            self.state.daily_trades = 0;
            self.state.daily_halted = false;
            self.refresh_flatten_latch();
        }
        let week = week_start(today, self.config.week_start_day);
        if week != self.state.current_week_start {
            info!(%week, %balance, "new trading week, resetting weekly window");
            self.state.current_week_start = week;
            self.state.week_start_balance = balance;
            self.state.weekly_pnl = Decimal::ZERO;
            self.state.weekly_halted = false;
            self.refresh_flatten_latch();
        }
    }

    /// Attribute one closed trade's realized P&L.
    pub fn record_trade_result(&mut self, pnl: Decimal) {
        self.state.daily_pnl += pnl;
        self.state.weekly_pnl += pnl;
        if pnl < Decimal::ZERO {
            self.state.losses += 1;
            self.state.consecutive_losses += 1;
            self.state.consecutive_wins = 0;
        } else if pnl > Decimal::ZERO {
            self.state.wins += 1;
            self.state.consecutive_wins += 1;
            self.state.consecutive_losses = 0;
        }
    }

    /// Re-check all limits against the current balance. Returns the
    /// flatten-all command exactly once per drawdown or emergency halt
    /// entry; plain daily/weekly halts never flatten.
    pub fn evaluate(&mut self, balance: Decimal) -> Option<FlattenReason> {
        if balance > self.state.peak_balance {
            self.state.peak_balance = balance;
        }

        if !self.state.daily_halted && self.state.daily_pnl <= -self.daily_limit() {
            warn!(daily_pnl = %self.state.daily_pnl, limit = %self.daily_limit(), "daily loss limit reached");
            self.state.daily_halted = true;
        }
        if !self.state.weekly_halted && self.state.weekly_pnl <= -self.weekly_limit() {
            warn!(weekly_pnl = %self.state.weekly_pnl, limit = %self.weekly_limit(), "weekly loss limit reached");
            self.state.weekly_halted = true;
        }

        if self.state.peak_balance > Decimal::ZERO {
            let drawdown =
                (self.state.peak_balance - balance) / self.state.peak_balance * dec!(100);
            if drawdown > self.state.max_drawdown_seen {
                self.state.max_drawdown_seen = drawdown;
            }
            if !self.state.drawdown_halted && drawdown >= self.config.max_drawdown_pct {
                warn!(%drawdown, "max drawdown reached, halting session");
                self.state.drawdown_halted = true;
            }
        }

        if !self.state.emergency_halted
            && self.state.consecutive_losses >= self.config.max_consecutive_losses
        {
            warn!(
                losses = self.state.consecutive_losses,
                "consecutive loss cap reached, emergency stop"
            );
            self.state.emergency_halted = true;
        }

        let should_flatten = self.state.drawdown_halted || self.state.emergency_halted;
        if should_flatten && !self.state.flatten_issued {
            self.state.flatten_issued = true;
            if self.state.drawdown_halted {
                Some(FlattenReason::Drawdown)
            } else {
                Some(FlattenReason::ConsecutiveLosses)
            }
        } else {
            None
        }
    }

    pub fn entries_allowed(&self) -> bool {
        self.state.halt_state() == HaltState::Trading
            && self.state.daily_trades < self.config.max_daily_trades
    }

    pub fn note_trade_opened(&mut self) {
        self.state.daily_trades += 1;
    }

    pub fn halt_state(&self) -> HaltState {
        self.state.halt_state()
    }

    pub fn status(&self) -> RiskStatus {
        RiskStatus {
            halt: self.state.halt_state(),
            daily_pnl: self.state.daily_pnl,
            weekly_pnl: self.state.weekly_pnl,
            daily_trades: self.state.daily_trades,
            consecutive_losses: self.state.consecutive_losses,
            wins: self.state.wins,
            losses: self.state.losses,
            peak_balance: self.state.peak_balance,
            max_drawdown_seen: self.state.max_drawdown_seen,
        }
    }

    fn daily_limit(&self) -> Decimal {
        if self.state.day_start_balance < self.config.balance_threshold {
            self.config.daily_loss_floor
        } else {
            self.state.day_start_balance * self.config.daily_loss_pct / dec!(100)
        }
    }

    fn weekly_limit(&self) -> Decimal {
        if self.state.week_start_balance < self.config.balance_threshold {
            self.config.weekly_loss_floor
        } else {
            self.state.week_start_balance * self.config.weekly_loss_pct / dec!(100)
        }
    }

    // Only re-arm the flatten latch once no flatten-worthy halt is
    // active, so a halt that persists across a reset cannot fire twice.
    fn refresh_flatten_latch(&mut self) {
        if !self.state.drawdown_halted && !self.state.emergency_halted {
            self.state.flatten_issued = false;
        }
    }
}
