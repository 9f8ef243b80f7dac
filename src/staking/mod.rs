//! Stake sizing
//!
//! Kelly criterion sizing under bankroll constraints:
//! - Full and fractional Kelly
//! - Bet amount clamped between a minimum bet and a bankroll share
//! - Adaptive Kelly fraction driven by recent results
//! - Bankroll ledger with atomic bet resolution
//! - Portfolio allocation across events

pub mod adaptive;
pub mod bankroll;
pub mod portfolio;


pub use adaptive::{AdaptiveFraction, AdaptiveKelly};
pub use bankroll::{BankrollManager, BankrollStats, Bet, BetOutcome, BetStatus};
pub use portfolio::{optimize_portfolio, Portfolio, PortfolioCandidate};

use crate::config::StakingConfig;
use crate::error::{EngineError, Result};
use rust_decimal::prelude::*;
use serde::Serialize;

/// Full Kelly fraction `(b*p - q) / b` with `b = odds - 1`.
///
/// Zero for odds at or below 1, probabilities outside (0, 1), or a negative
/// result.
pub fn full_kelly(probability: f64, odds: f64) -> f64 {
    try_full_kelly(probability, odds).unwrap_or(0.0)
}

/// Strict full Kelly: rejects odds at or below 1 and probabilities outside (0, 1)
pub fn try_full_kelly(probability: f64, odds: f64) -> Result<f64> {
    if !(odds > 1.0 && odds.is_finite()) {
        return Err(EngineError::Range(format!("odds must exceed 1.0, got {odds}")));
    }
    if !(probability > 0.0 && probability < 1.0) {
        return Err(EngineError::Range(format!(
            "probability must be in (0, 1), got {probability}"
        )));
    }
    let b = odds - 1.0;
    let q = 1.0 - probability;
    Ok(((b * probability - q) / b).max(0.0))
}

pub fn fractional_kelly(probability: f64, odds: f64, fraction: f64) -> f64 {
    full_kelly(probability, odds) * fraction
}

/// Expected profit per unit staked
pub fn expected_return(probability: f64, odds: f64) -> f64 {
    probability * (odds - 1.0) - (1.0 - probability)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BetRecommendation {
    Skip,
    Minimal,
    AvoidPoorValue,
    AvoidNegativeValue,
    Conservative,
    Cautious,
    Moderate,
    Aggressive,
}

impl BetRecommendation {
    /// Ladder over the fractional Kelly stake and expected value
    pub fn from_sizing(kelly: f64, expected_value: Decimal) -> Self {
        let negative_ev = expected_value < Decimal::ZERO;
        if kelly <= 0.0 {
            BetRecommendation::Skip
        } else if kelly < 0.01 {
            BetRecommendation::Minimal
        } else if kelly < 0.05 && negative_ev {
            BetRecommendation::AvoidPoorValue
        } else if negative_ev {
            BetRecommendation::AvoidNegativeValue
        } else if kelly < 0.02 {
            BetRecommendation::Conservative
        } else if kelly < 0.05 {
            BetRecommendation::Cautious
        } else if kelly < 0.10 {
            BetRecommendation::Moderate
        } else {
            BetRecommendation::Aggressive
        }
    }

    pub fn is_bet(&self) -> bool {
        !matches!(
            self,
            BetRecommendation::Skip
                | BetRecommendation::AvoidPoorValue
                | BetRecommendation::AvoidNegativeValue
        )
    }
}

impl std::fmt::Display for BetRecommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            BetRecommendation::Skip => "SKIP - Negative Kelly (bad bet)",
            BetRecommendation::Minimal => "MINIMAL - Very small edge",
            BetRecommendation::AvoidPoorValue => "AVOID - Poor expected value",
            BetRecommendation::AvoidNegativeValue => "AVOID - Negative EV despite Kelly",
            BetRecommendation::Conservative => "CONSERVATIVE - Small edge, consider skipping",
            BetRecommendation::Cautious => "CAUTIOUS - Moderate edge",
            BetRecommendation::Moderate => "MODERATE - Good edge",
            BetRecommendation::Aggressive => "AGGRESSIVE - Strong edge",
        };
        f.write_str(text)
    }
}

/// Result of sizing one bet. Always recomputed, never stored as truth.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BetSizing {
    pub probability: f64,
    pub odds: f64,
    pub full_kelly: f64,
    /// Full Kelly times the fraction used
    pub kelly_fraction: f64,
    pub fraction_used: f64,
    pub bet_amount: Decimal,
    pub max_bet: Decimal,
    pub expected_value: Decimal,
    pub recommendation: BetRecommendation,
}

/// Kelly sizing with minimum and maximum bet limits
#[derive(Debug, Clone, Default)]
pub struct BetSizer {
    config: StakingConfig,
}

impl BetSizer {
    pub fn new(config: StakingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StakingConfig {
        &self.config
    }

    /// Size a bet with the configured Kelly fraction
    pub fn size(&self, bankroll: Decimal, probability: f64, odds: f64) -> BetSizing {
        self.size_with_fraction(bankroll, probability, odds, self.config.kelly_fraction)
    }

    /// Size a bet with an explicit Kelly fraction.
    ///
    /// A non-positive Kelly stake yields a zero bet; otherwise the stake is
    /// clamped to `[min_bet, bankroll * max_bet_pct]` and never exceeds the
    /// bankroll itself.
    pub fn size_with_fraction(
        &self,
        bankroll: Decimal,
        probability: f64,
        odds: f64,
        fraction: f64,
    ) -> BetSizing {
        let full = full_kelly(probability, odds);
        let kelly = full * fraction;
        let max_bet = (bankroll * self.config.max_bet_pct).max(Decimal::ZERO);

        let bet_amount = if kelly <= 0.0 || bankroll <= Decimal::ZERO {
            Decimal::ZERO
        } else {
            let raw = bankroll * Decimal::from_f64(kelly).unwrap_or(Decimal::ZERO);
            raw.min(max_bet).max(self.config.min_bet).min(bankroll).round_dp(2)
        };

        let unit_ev = if odds > 0.0 { expected_return(probability, odds) } else { 0.0 };
        let expected_value =
            (Decimal::from_f64(unit_ev).unwrap_or(Decimal::ZERO) * bet_amount).round_dp(2);

        BetSizing {
            probability,
            odds,
            full_kelly: full,
            kelly_fraction: kelly,
            fraction_used: fraction,
            bet_amount,
            max_bet,
            expected_value,
            recommendation: BetRecommendation::from_sizing(kelly, expected_value),
        }
    }
}
