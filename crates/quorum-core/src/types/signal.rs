//! Trade direction, strategy identity, and the aggregated signal.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Side of the market a signal or position points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn opposite(&self) -> Self {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }

    /// +1 for long, -1 for short. Useful for price arithmetic.
    pub fn sign(&self) -> i32 {
        match self {
            Direction::Long => 1,
            Direction::Short => -1,
        }
    }

    pub fn is_long(&self) -> bool {
        matches!(self, Direction::Long)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
        }
    }
}

/// Strategy families that cast votes into the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyFamily {
    Trend,
    Breakout,
    Momentum,
    Structure,
}

impl fmt::Display for StrategyFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyFamily::Trend => write!(f, "trend"),
            StrategyFamily::Breakout => write!(f, "breakout"),
            StrategyFamily::Momentum => write!(f, "momentum"),
            StrategyFamily::Structure => write!(f, "structure"),
        }
    }
}

/// Ordinal signal strength derived from the aggregate score.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum Strength {
    #[default]
    Weak,
    Medium,
    Strong,
    VeryStrong,
}

impl Strength {
    /// Map a raw score to a strength band. Monotone in the score.
    pub fn from_score(score: u32) -> Self {
        if score >= 15 {
            Strength::VeryStrong
        } else if score >= 11 {
            Strength::Strong
        } else if score >= 8 {
            Strength::Medium
        } else {
            Strength::Weak
        }
    }
}

impl fmt::Display for Strength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strength::Weak => write!(f, "weak"),
            Strength::Medium => write!(f, "medium"),
            Strength::Strong => write!(f, "strong"),
            Strength::VeryStrong => write!(f, "very_strong"),
        }
    }
}

/// Aggregated per-interval decision.
///
/// `direction: None` means no trade this interval, whether because no
/// family voted, the score missed the threshold, a gate failed, or the
/// weighted vote tied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    pub direction: Option<Direction>,
    pub score: u32,
    pub strength: Strength,
    pub contributors: Vec<StrategyFamily>,
}

impl Signal {
    pub fn none() -> Self {
        Self {
            direction: None,
            score: 0,
            strength: Strength::Weak,
            contributors: Vec::new(),
        }
    }

    pub fn actionable(direction: Direction, score: u32, contributors: Vec<StrategyFamily>) -> Self {
        Self {
            direction: Some(direction),
            score,
            strength: Strength::from_score(score),
            contributors,
        }
    }

    pub fn is_actionable(&self) -> bool {
        self.direction.is_some()
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strength_thresholds() {
        assert_eq!(Strength::from_score(0), Strength::Weak);
        assert_eq!(Strength::from_score(7), Strength::Weak);
        assert_eq!(Strength::from_score(8), Strength::Medium);
        assert_eq!(Strength::from_score(10), Strength::Medium);
        assert_eq!(Strength::from_score(11), Strength::Strong);
        assert_eq!(Strength::from_score(14), Strength::Strong);
        assert_eq!(Strength::from_score(15), Strength::VeryStrong);
        assert_eq!(Strength::from_score(42), Strength::VeryStrong);
    }

    #[test]
    fn strength_is_monotone_in_score() {
        let mut prev = Strength::from_score(0);
        for score in 1..30 {
            let cur = Strength::from_score(score);
            assert!(cur >= prev, "strength regressed at score {score}");
            prev = cur;
        }
    }

    #[test]
    fn none_signal_is_not_actionable() {
        let s = Signal::none();
        assert!(!s.is_actionable());
        assert_eq!(s.score, 0);
        assert!(s.contributors.is_empty());
    }

    #[test]
    fn direction_helpers() {
        assert_eq!(Direction::Long.opposite(), Direction::Short);
        assert_eq!(Direction::Short.sign(), -1);
        assert!(Direction::Long.is_long());
    }
}
