//! Trading-session windows and weekend gating.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

use quorum_core::EngineError;

/// An hour window in UTC. `start > end` wraps past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl SessionWindow {
    pub fn contains(&self, hour: u32) -> bool {
        if self.start_hour <= self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub trade_asian: bool,
    pub trade_london: bool,
    pub trade_new_york: bool,
    pub asian: SessionWindow,
    pub london: SessionWindow,
    pub new_york: SessionWindow,

    pub avoid_weekends: bool,
    /// No entries from this hour on Friday.
    pub friday_close_hour: u32,
    /// No entries before this hour on Sunday.
    pub sunday_open_hour: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            trade_asian: false,
            trade_london: true,
            trade_new_york: true,
            asian: SessionWindow {
                start_hour: 23,
                end_hour: 8,
            },
            london: SessionWindow {
                start_hour: 7,
                end_hour: 16,
            },
            new_york: SessionWindow {
                start_hour: 12,
                end_hour: 21,
            },
            avoid_weekends: true,
            friday_close_hour: 14,
            sunday_open_hour: 20,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        for (name, w) in [
            ("asian", &self.asian),
            ("london", &self.london),
            ("new_york", &self.new_york),
        ] {
            if w.start_hour > 23 || w.end_hour > 23 {
                return Err(EngineError::Validation(format!(
                    "session: {name} window hours must be 0..=23"
                )));
            }
        }
        if self.friday_close_hour > 23 || self.sunday_open_hour > 23 {
            return Err(EngineError::Validation(
                "session: weekend hours must be 0..=23".to_string(),
            ));
        }
        Ok(())
    }
}

/// Entry-time gate. Each session is an independent predicate and the
/// result is their explicit disjunction; an enabled flag never leaks
/// into a neighboring window.
#[derive(Debug, Clone)]
pub struct SessionFilter {
    config: SessionConfig,
}

impl SessionFilter {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        let hour = now.hour();

        if self.config.avoid_weekends {
            match now.weekday() {
                Weekday::Sat => return false,
                Weekday::Sun if hour < self.config.sunday_open_hour => return false,
                Weekday::Fri if hour >= self.config.friday_close_hour => return false,
                _ => {}
            }
        }

        let asian = self.config.trade_asian && self.config.asian.contains(hour);
        let london = self.config.trade_london && self.config.london.contains(hour);
        let new_york = self.config.trade_new_york && self.config.new_york.contains(hour);

        asian || london || new_york
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        // March 2026: the 2nd is a Monday.
        Utc.with_ymd_and_hms(2026, 3, day, hour, 30, 0).unwrap()
    }

    #[test]
    fn london_and_new_york_hours_open() {
        let filter = SessionFilter::new(SessionConfig::default());
        assert!(filter.is_open(at(2, 9))); // London
        assert!(filter.is_open(at(2, 13))); // overlap
        assert!(filter.is_open(at(2, 20))); // New York
        assert!(!filter.is_open(at(2, 22))); // after NY close
    }

    #[test]
    fn disabled_asian_session_stays_closed_overnight() {
        // The overnight hours must not leak in through a disabled
        // Asian flag.
        let filter = SessionFilter::new(SessionConfig::default());
        assert!(!filter.is_open(at(2, 23)));
        assert!(!filter.is_open(at(3, 2)));
        assert!(!filter.is_open(at(3, 5)));
    }

    #[test]
    fn enabled_asian_session_wraps_midnight() {
        let config = SessionConfig {
            trade_asian: true,
            trade_london: false,
            trade_new_york: false,
            ..Default::default()
        };
        let filter = SessionFilter::new(config);
        assert!(filter.is_open(at(2, 23)));
        assert!(filter.is_open(at(3, 2)));
        assert!(!filter.is_open(at(3, 9))); // past the 08:00 close
    }

    #[test]
    fn weekend_gating() {
        let filter = SessionFilter::new(SessionConfig::default());
        assert!(!filter.is_open(at(6, 15))); // Friday 15:00, past close hour
        assert!(filter.is_open(at(6, 13))); // Friday before close
        assert!(!filter.is_open(at(7, 12))); // Saturday
        assert!(!filter.is_open(at(8, 10))); // Sunday before open
    }

    #[test]
    fn sunday_reopens_after_open_hour() {
        let config = SessionConfig {
            trade_asian: true,
            ..Default::default()
        };
        let filter = SessionFilter::new(config);
        // Sunday 23:00, past the 20:00 open, inside the Asian window.
        assert!(filter.is_open(at(8, 23)));
    }

    #[test]
    fn invalid_hours_fail_validation() {
        let config = SessionConfig {
            friday_close_hour: 25,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
