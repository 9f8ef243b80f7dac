//! Historical replay
//!
//! Replays settled events in date order: picks value entrants, stakes them
//! with adaptive Kelly on a running bankroll and settles each bet against the
//! recorded finishing position.

use crate::config::{StakingConfig, ValueConfig};
use crate::staking::{AdaptiveKelly, BankrollManager, BankrollStats, Bet, BetOutcome, BetSizer};
use crate::storage::PredictionLogEntry;
use crate::types::StopFlag;
use crate::value::{rank_opportunities, PricedEntrant};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

fn default_confidence() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayEntrant {
    pub entrant_id: String,
    pub probability: f64,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub odds: Option<f64>,
    /// Finishing position; `None` settles the bet as void
    #[serde(default)]
    pub position: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayEvent {
    pub event_id: String,
    pub event_date: NaiveDate,
    pub entrants: Vec<ReplayEntrant>,
}

/// Group validated log entries of one model version into replayable events
pub fn replay_events_from_log(entries: &[PredictionLogEntry]) -> Vec<ReplayEvent> {
    let mut events: BTreeMap<(NaiveDate, String), Vec<ReplayEntrant>> = BTreeMap::new();
    for entry in entries.iter().filter(|e| e.is_validated()) {
        events
            .entry((entry.event_date, entry.event_id.clone()))
            .or_default()
            .push(ReplayEntrant {
                entrant_id: entry.entrant_id.clone(),
                probability: entry.predicted_win_prob,
                confidence: entry.confidence,
                odds: entry.odds_at_prediction,
                position: entry.actual_position,
            });
    }
    events
        .into_iter()
        .map(|((event_date, event_id), entrants)| ReplayEvent {
            event_id,
            event_date,
            entrants,
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct BacktestResult {
    pub events_total: usize,
    pub events_processed: usize,
    pub stopped_early: bool,
    pub stats: BankrollStats,
    /// Largest peak-to-trough fall of the bankroll, percent of the peak
    pub max_drawdown_percent: Decimal,
    /// Bankroll after each processed event
    pub equity_curve: Vec<(NaiveDate, Decimal)>,
    pub bets: Vec<Bet>,
}

pub struct Backtester {
    staking: StakingConfig,
    value: ValueConfig,
    /// Bets per event, best opportunity first
    max_bets_per_event: usize,
}

impl Backtester {
    pub fn new(staking: StakingConfig, value: ValueConfig) -> Self {
        Self {
            staking,
            value,
            max_bets_per_event: 1,
        }
    }

    pub fn with_max_bets_per_event(mut self, max: usize) -> Self {
        self.max_bets_per_event = max;
        self
    }

    /// Replay `events` oldest first. Checks `stop` between events.
    pub fn run(&self, events: &[ReplayEvent], stop: &StopFlag) -> BacktestResult {
        let mut ordered: Vec<&ReplayEvent> = events.iter().collect();
        ordered.sort_by(|a, b| {
            a.event_date
                .cmp(&b.event_date)
                .then_with(|| a.event_id.cmp(&b.event_id))
        });

        let sizer = BetSizer::new(self.staking.clone());
        let bankroll = BankrollManager::new(self.staking.bankroll, sizer);
        let adaptive = AdaptiveKelly::new(&self.staking);

        info!(events = ordered.len(), bankroll = %self.staking.bankroll, "Starting backtest");

        let mut processed = 0;
        let mut stopped_early = false;
        let mut equity_curve = Vec::with_capacity(ordered.len());
        let mut peak = self.staking.bankroll;
        let mut max_drawdown = Decimal::ZERO;

        for event in ordered.iter() {
            if stop.is_stopped() {
                stopped_early = true;
                warn!(processed, "Backtest stopped early");
                break;
            }
            self.replay_event(event, &bankroll, &adaptive);
            processed += 1;

            let current = bankroll.current_bankroll();
            equity_curve.push((event.event_date, current));
            peak = peak.max(current);
            if peak > Decimal::ZERO {
                max_drawdown = max_drawdown.max((peak - current) / peak * Decimal::ONE_HUNDRED);
            }
        }

        let stats = bankroll.stats();
        info!(
            processed,
            bets = stats.total_bets,
            profit_loss = %stats.profit_loss,
            roi_percent = %stats.roi_percent,
            "Backtest complete"
        );

        BacktestResult {
            events_total: ordered.len(),
            events_processed: processed,
            stopped_early,
            stats,
            max_drawdown_percent: max_drawdown.round_dp(2),
            equity_curve,
            bets: bankroll.bets(),
        }
    }

    fn replay_event(
        &self,
        event: &ReplayEvent,
        bankroll: &BankrollManager,
        adaptive: &AdaptiveKelly,
    ) {
        let priced: Vec<PricedEntrant> = event
            .entrants
            .iter()
            .map(|e| PricedEntrant {
                entrant_id: e.entrant_id.clone(),
                probability: e.probability,
                confidence: e.confidence,
                odds: e.odds,
            })
            .collect();

        let picks = rank_opportunities(&priced, self.value.undervalued_threshold, &self.value);
        for pick in picks.into_iter().take(self.max_bets_per_event) {
            let Some(odds) = pick.odds else { continue };
            let (fraction, bet) = bankroll.place_adaptive_bet(
                adaptive,
                &event.event_id,
                &pick.entrant_id,
                pick.probability,
                odds,
            );
            let Some(bet) = bet else { continue };

            let position = event
                .entrants
                .iter()
                .find(|e| e.entrant_id == pick.entrant_id)
                .and_then(|e| e.position);
            let outcome = match position {
                Some(1) => BetOutcome::Win { payout: None },
                Some(_) => BetOutcome::Loss,
                None => BetOutcome::Void,
            };

            debug!(
                event_id = %event.event_id,
                entrant_id = %pick.entrant_id,
                fraction = fraction.fraction,
                outcome = ?outcome,
                "Replayed bet"
            );
            // freshly placed and still pending
            if let Err(e) = bankroll.resolve(bet.id, outcome) {
                warn!(error = %e, bet_id = %bet.id, "Replay could not settle bet");
            }
        }
    }
}
