//! Adaptive Kelly fraction
//!
//! Scales the base Kelly fraction by recent results: back off after losing
//! runs, press a little during hot streaks.

use super::bankroll::BetStatus;
use crate::config::StakingConfig;
use serde::Serialize;

/// Resolved bets considered for the recent win rate
const PERFORMANCE_WINDOW: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AdjustmentReason {
    InsufficientData,
    LosingRun,
    TwoLosses,
    HotStreak,
    Normal,
    ColdStreak,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AdaptiveFraction {
    pub fraction: f64,
    pub multiplier: f64,
    pub reason: AdjustmentReason,
}

#[derive(Debug, Clone)]
pub struct AdaptiveKelly {
    base_fraction: f64,
    min_fraction: f64,
    max_fraction: f64,
    min_history: usize,
}

impl AdaptiveKelly {
    pub fn new(config: &StakingConfig) -> Self {
        Self {
            base_fraction: config.kelly_fraction,
            min_fraction: config.adaptive_min_fraction,
            max_fraction: config.adaptive_max_fraction,
            min_history: config.adaptive_min_history,
        }
    }

    /// Fraction for the next bet given resolved results (oldest first) and
    /// the current losing run
    pub fn fraction(&self, resolved: &[BetStatus], consecutive_losses: u32) -> AdaptiveFraction {
        if resolved.len() < self.min_history {
            return AdaptiveFraction {
                fraction: self.base_fraction,
                multiplier: 1.0,
                reason: AdjustmentReason::InsufficientData,
            };
        }

        let recent = &resolved[resolved.len().saturating_sub(PERFORMANCE_WINDOW)..];
        let wins = recent.iter().filter(|s| **s == BetStatus::Won).count();
        let win_rate = wins as f64 / recent.len() as f64;

        let (multiplier, reason) = if consecutive_losses >= 3 {
            (0.5, AdjustmentReason::LosingRun)
        } else if consecutive_losses >= 2 {
            (0.75, AdjustmentReason::TwoLosses)
        } else if win_rate >= 0.6 {
            (1.25, AdjustmentReason::HotStreak)
        } else if win_rate >= 0.5 {
            (1.0, AdjustmentReason::Normal)
        } else {
            (0.75, AdjustmentReason::ColdStreak)
        };

        AdaptiveFraction {
            fraction: (self.base_fraction * multiplier).clamp(self.min_fraction, self.max_fraction),
            multiplier,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use BetStatus::{Lost, Won};

    fn adaptive() -> AdaptiveKelly {
        AdaptiveKelly::new(&StakingConfig::default())
    }

    #[test]
    fn test_insufficient_history_uses_base() {
        let f = adaptive().fraction(&[Won, Lost, Won, Lost], 1);
        assert_eq!(f.fraction, 0.25);
        assert_eq!(f.reason, AdjustmentReason::InsufficientData);
    }

    #[test]
    fn test_losing_runs_back_off() {
        let history = [Won, Won, Lost, Lost, Lost];
        let f = adaptive().fraction(&history, 3);
        assert_eq!(f.multiplier, 0.5);
        assert_eq!(f.fraction, 0.125);
        assert_eq!(f.reason, AdjustmentReason::LosingRun);

        let f = adaptive().fraction(&history[..], 2);
        assert_eq!(f.multiplier, 0.75);
        assert_eq!(f.reason, AdjustmentReason::TwoLosses);
    }

    #[test]
    fn test_hot_streak_is_clamped_to_max() {
        let history = [Won, Won, Won, Lost, Won];
        let f = adaptive().fraction(&history, 0);
        assert_eq!(f.multiplier, 1.25);
        // 0.3125 clamped
        assert_eq!(f.fraction, 0.25);
        assert_eq!(f.reason, AdjustmentReason::HotStreak);
    }

    #[test]
    fn test_normal_and_cold() {
        let normal = [Won, Lost, Won, Lost, Won, Lost];
        assert_eq!(adaptive().fraction(&normal, 1).reason, AdjustmentReason::Normal);

        let cold = [Lost, Won, Lost, Lost, Won, Lost];
        let f = adaptive().fraction(&cold, 1);
        assert_eq!(f.reason, AdjustmentReason::ColdStreak);
        assert_eq!(f.fraction, 0.1875);
    }

    #[test]
    fn test_window_only_counts_recent_bets() {
        // ten recent wins after a long losing history
        let mut history = vec![Lost; 20];
        history.extend([Won; 10]);
        let f = adaptive().fraction(&history, 0);
        assert_eq!(f.reason, AdjustmentReason::HotStreak);
    }

    #[test]
    fn test_floor_applies() {
        let config = StakingConfig {
            kelly_fraction: 0.08,
            ..Default::default()
        };
        let f = AdaptiveKelly::new(&config).fraction(&[Lost; 6], 6);
        // 0.04 lifted to the 0.05 floor
        assert_eq!(f.fraction, 0.05);
    }
}
