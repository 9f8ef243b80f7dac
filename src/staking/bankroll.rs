//! Bankroll ledger
//!
//! Tracks placed bets and the running bankroll. Every mutation happens under a
//! single lock, so concurrent resolutions never lose an update.

use super::adaptive::{AdaptiveFraction, AdaptiveKelly};
use super::{BetRecommendation, BetSizer};
use crate::error::{EngineError, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetStatus {
    Pending,
    Won,
    Lost,
    Void,
}

/// How a bet settled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BetOutcome {
    /// Defaults to `stake * odds` when no payout is given
    Win { payout: Option<Decimal> },
    Loss,
    Void,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bet {
    pub id: Uuid,
    pub event_id: String,
    pub entrant_id: String,
    pub odds: f64,
    pub probability: f64,
    pub stake: Decimal,
    pub kelly_fraction: f64,
    pub expected_value: Decimal,
    pub status: BetStatus,
    pub placed_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BankrollStats {
    pub initial_bankroll: Decimal,
    pub current_bankroll: Decimal,
    pub profit_loss: Decimal,
    /// Percent of initial bankroll
    pub roi_percent: Decimal,
    pub total_bets: usize,
    pub wins: usize,
    pub losses: usize,
    pub voids: usize,
    pub pending: usize,
    /// Percent of all bets placed
    pub win_rate_percent: Decimal,
    pub total_staked: Decimal,
    pub avg_odds: f64,
    pub consecutive_losses: u32,
    pub max_consecutive_losses: u32,
}

#[derive(Debug)]
struct Ledger {
    current: Decimal,
    bets: Vec<Bet>,
    consecutive_losses: u32,
    max_consecutive_losses: u32,
}

/// Bankroll with Kelly-sized bets
pub struct BankrollManager {
    initial: Decimal,
    sizer: BetSizer,
    ledger: Mutex<Ledger>,
}

impl BankrollManager {
    pub fn new(initial: Decimal, sizer: BetSizer) -> Self {
        Self {
            initial,
            sizer,
            ledger: Mutex::new(Ledger {
                current: initial,
                bets: Vec::new(),
                consecutive_losses: 0,
                max_consecutive_losses: 0,
            }),
        }
    }

    pub fn current_bankroll(&self) -> Decimal {
        self.ledger.lock().current
    }

    /// Size and record a pending bet on the current bankroll.
    ///
    /// Returns `None` when Kelly sizing gives no positive stake.
    pub fn place_bet(
        &self,
        event_id: &str,
        entrant_id: &str,
        probability: f64,
        odds: f64,
        fraction: f64,
    ) -> Option<Bet> {
        let mut ledger = self.ledger.lock();
        self.place_locked(&mut ledger, event_id, entrant_id, probability, odds, fraction)
    }

    /// Place a bet with the fraction chosen by `adaptive` from this ledger's
    /// recent results, under one lock
    pub fn place_adaptive_bet(
        &self,
        adaptive: &AdaptiveKelly,
        event_id: &str,
        entrant_id: &str,
        probability: f64,
        odds: f64,
    ) -> (AdaptiveFraction, Option<Bet>) {
        let mut ledger = self.ledger.lock();
        let fraction = Self::adaptive_locked(&ledger, adaptive);
        let bet = self.place_locked(
            &mut ledger,
            event_id,
            entrant_id,
            probability,
            odds,
            fraction.fraction,
        );
        (fraction, bet)
    }

    /// Current adaptive Kelly fraction for this ledger
    pub fn adaptive_fraction(&self, adaptive: &AdaptiveKelly) -> AdaptiveFraction {
        Self::adaptive_locked(&self.ledger.lock(), adaptive)
    }

    fn adaptive_locked(ledger: &Ledger, adaptive: &AdaptiveKelly) -> AdaptiveFraction {
        let resolved: Vec<BetStatus> = ledger
            .bets
            .iter()
            .map(|b| b.status)
            .filter(|s| matches!(s, BetStatus::Won | BetStatus::Lost))
            .collect();
        adaptive.fraction(&resolved, ledger.consecutive_losses)
    }

    fn place_locked(
        &self,
        ledger: &mut Ledger,
        event_id: &str,
        entrant_id: &str,
        probability: f64,
        odds: f64,
        fraction: f64,
    ) -> Option<Bet> {
        let sizing = self.sizer.size_with_fraction(ledger.current, probability, odds, fraction);
        if sizing.bet_amount <= Decimal::ZERO || sizing.recommendation == BetRecommendation::Skip {
            debug!(event_id, entrant_id, odds, probability, "No positive Kelly stake, bet skipped");
            return None;
        }

        let bet = Bet {
            id: Uuid::new_v4(),
            event_id: event_id.to_string(),
            entrant_id: entrant_id.to_string(),
            odds,
            probability,
            stake: sizing.bet_amount,
            kelly_fraction: sizing.kelly_fraction,
            expected_value: sizing.expected_value,
            status: BetStatus::Pending,
            placed_at: Utc::now(),
            resolved_at: None,
        };
        ledger.bets.push(bet.clone());

        info!(
            bet_id = %bet.id,
            event_id,
            entrant_id,
            stake = %bet.stake,
            odds,
            "Bet placed"
        );
        Some(bet)
    }

    /// Settle a pending bet and update the bankroll atomically
    pub fn resolve(&self, bet_id: Uuid, outcome: BetOutcome) -> Result<BankrollStats> {
        let mut ledger = self.ledger.lock();

        let bet = ledger
            .bets
            .iter_mut()
            .find(|b| b.id == bet_id)
            .ok_or_else(|| EngineError::Ledger(format!("bet {bet_id} not found")))?;
        if bet.status != BetStatus::Pending {
            return Err(EngineError::Ledger(format!(
                "bet {bet_id} already resolved as {:?}",
                bet.status
            )));
        }

        let stake = bet.stake;
        let odds = Decimal::from_f64(bet.odds).unwrap_or(Decimal::ZERO);
        bet.resolved_at = Some(Utc::now());

        let delta = match outcome {
            BetOutcome::Win { payout } => {
                bet.status = BetStatus::Won;
                payout.unwrap_or(stake * odds) - stake
            }
            BetOutcome::Loss => {
                bet.status = BetStatus::Lost;
                -stake
            }
            BetOutcome::Void => {
                bet.status = BetStatus::Void;
                Decimal::ZERO
            }
        };

        ledger.current += delta;
        match outcome {
            BetOutcome::Win { .. } => ledger.consecutive_losses = 0,
            BetOutcome::Loss => {
                ledger.consecutive_losses += 1;
                ledger.max_consecutive_losses =
                    ledger.max_consecutive_losses.max(ledger.consecutive_losses);
            }
            BetOutcome::Void => {}
        }

        info!(bet_id = %bet_id, delta = %delta, bankroll = %ledger.current, "Bet resolved");
        Ok(self.stats_locked(&ledger))
    }

    pub fn bets(&self) -> Vec<Bet> {
        self.ledger.lock().bets.clone()
    }

    pub fn stats(&self) -> BankrollStats {
        self.stats_locked(&self.ledger.lock())
    }

    fn stats_locked(&self, ledger: &Ledger) -> BankrollStats {
        let count = |status: BetStatus| ledger.bets.iter().filter(|b| b.status == status).count();
        let total = ledger.bets.len();
        let wins = count(BetStatus::Won);
        let profit_loss = ledger.current - self.initial;
        let hundred = Decimal::ONE_HUNDRED;

        let roi_percent = if self.initial > Decimal::ZERO {
            (profit_loss / self.initial * hundred).round_dp(1)
        } else {
            Decimal::ZERO
        };
        let win_rate_percent = if total > 0 {
            (Decimal::from(wins) / Decimal::from(total) * hundred).round_dp(1)
        } else {
            Decimal::ZERO
        };
        let avg_odds = if total > 0 {
            ledger.bets.iter().map(|b| b.odds).sum::<f64>() / total as f64
        } else {
            0.0
        };

        BankrollStats {
            initial_bankroll: self.initial,
            current_bankroll: ledger.current,
            profit_loss,
            roi_percent,
            total_bets: total,
            wins,
            losses: count(BetStatus::Lost),
            voids: count(BetStatus::Void),
            pending: count(BetStatus::Pending),
            win_rate_percent,
            total_staked: ledger.bets.iter().map(|b| b.stake).sum(),
            avg_odds,
            consecutive_losses: ledger.consecutive_losses,
            max_consecutive_losses: ledger.max_consecutive_losses,
        }
    }
}
