//! Accuracy metrics over validated predictions

use super::ValidatedPrediction;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Probability bins for calibration error; the last bin includes 1.0
const CALIBRATION_BINS: [(f64, f64); 5] =
    [(0.0, 0.2), (0.2, 0.4), (0.4, 0.6), (0.6, 0.8), (0.8, 1.0)];

/// Aggregate accuracy of a set of validated predictions.
///
/// Rates are fractions in [0, 1]. ROI assumes a unit stake on every
/// prediction with known odds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccuracyMetrics {
    pub total_predictions: usize,
    pub total_events: usize,
    pub winners_correct: usize,
    pub top3_correct: usize,
    pub top5_correct: usize,
    pub exact_rank_correct: usize,
    pub within_2_places: usize,

    pub win_rate: f64,
    pub place_rate: f64,
    pub top5_rate: f64,
    pub exact_rank_rate: f64,
    pub avg_position_error: f64,

    pub calibration_error: f64,
    pub brier_score: f64,
    pub confidence_correlation: f64,

    pub roi: f64,
    pub profit_loss: f64,
    pub total_staked: f64,
    pub average_odds: f64,

    pub max_consecutive_losses: usize,
    pub best_streak: usize,
}

impl AccuracyMetrics {
    /// Zero-filled metrics for an empty input
    pub fn compute(predictions: &[ValidatedPrediction], min_correlation_samples: usize) -> Self {
        if predictions.is_empty() {
            return Self::default();
        }

        let n = predictions.len();
        let total = n as f64;
        let count = |pred: fn(&ValidatedPrediction) -> bool| {
            predictions.iter().filter(|p| pred(p)).count()
        };

        let winners_correct = count(|p| p.is_winner);
        let top3_correct = count(|p| p.is_place);
        let top5_correct = count(|p| p.actual_position <= 5);
        let exact_rank_correct = count(|p| p.predicted_correctly);
        let within_2_places = count(|p| p.within_2_places);

        let total_events = predictions
            .iter()
            .map(|p| p.event_id.as_str())
            .collect::<HashSet<_>>()
            .len();
        let avg_position_error =
            predictions.iter().map(|p| p.position_error() as f64).sum::<f64>() / total;

        let roi = unit_stake_roi(predictions);
        let (max_consecutive_losses, best_streak) = streaks(predictions);

        Self {
            total_predictions: n,
            total_events,
            winners_correct,
            top3_correct,
            top5_correct,
            exact_rank_correct,
            within_2_places,
            win_rate: winners_correct as f64 / total,
            place_rate: top3_correct as f64 / total,
            top5_rate: top5_correct as f64 / total,
            exact_rank_rate: exact_rank_correct as f64 / total,
            avg_position_error,
            calibration_error: calibration_error(predictions),
            brier_score: brier_score(predictions),
            confidence_correlation: confidence_correlation(predictions, min_correlation_samples),
            roi: roi.roi,
            profit_loss: roi.profit_loss,
            total_staked: roi.staked,
            average_odds: roi.average_odds,
            max_consecutive_losses,
            best_streak,
        }
    }

    /// `1 - 2 * calibration_error`, floored at zero
    pub fn calibration_score(&self) -> f64 {
        (1.0 - self.calibration_error * 2.0).max(0.0)
    }
}

/// Population-weighted mean gap between observed win rate and bin midpoint
pub fn calibration_error(predictions: &[ValidatedPrediction]) -> f64 {
    if predictions.is_empty() {
        return 0.0;
    }
    let mut totals = [0usize; CALIBRATION_BINS.len()];
    let mut wins = [0usize; CALIBRATION_BINS.len()];

    let last = CALIBRATION_BINS.len() - 1;
    for p in predictions {
        let prob = p.predicted_win_prob;
        let bin = CALIBRATION_BINS
            .iter()
            .position(|(low, high)| prob >= *low && prob < *high)
            .or_else(|| (prob == 1.0).then_some(last));
        if let Some(bin) = bin {
            totals[bin] += 1;
            if p.is_winner {
                wins[bin] += 1;
            }
        }
    }

    let n = predictions.len() as f64;
    CALIBRATION_BINS
        .iter()
        .zip(totals.iter().zip(wins.iter()))
        .filter(|(_, (total, _))| **total > 0)
        .map(|((low, high), (total, won))| {
            let observed = *won as f64 / *total as f64;
            let midpoint = (low + high) / 2.0;
            (observed - midpoint).abs() * (*total as f64 / n)
        })
        .sum()
}

pub fn brier_score(predictions: &[ValidatedPrediction]) -> f64 {
    if predictions.is_empty() {
        return 0.0;
    }
    predictions
        .iter()
        .map(|p| {
            let outcome = if p.is_winner { 1.0 } else { 0.0 };
            (p.predicted_win_prob - outcome).powi(2)
        })
        .sum::<f64>()
        / predictions.len() as f64
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitStakeRoi {
    pub roi: f64,
    pub profit_loss: f64,
    pub staked: f64,
    pub average_odds: f64,
}

/// One unit on every prediction with odds > 0; winners return their odds
pub fn unit_stake_roi(predictions: &[ValidatedPrediction]) -> UnitStakeRoi {
    let priced: Vec<(f64, bool)> = predictions
        .iter()
        .filter_map(|p| p.odds.filter(|o| *o > 0.0).map(|o| (o, p.is_winner)))
        .collect();
    if priced.is_empty() {
        return UnitStakeRoi {
            roi: 0.0,
            profit_loss: 0.0,
            staked: 0.0,
            average_odds: 0.0,
        };
    }

    let staked = priced.len() as f64;
    let returned: f64 = priced.iter().filter(|(_, won)| *won).map(|(odds, _)| odds).sum();
    let profit_loss = returned - staked;
    UnitStakeRoi {
        roi: profit_loss / staked,
        profit_loss,
        staked,
        average_odds: priced.iter().map(|(odds, _)| odds).sum::<f64>() / staked,
    }
}

/// Longest run of non-winners and longest run of winners, in input order
pub fn streaks(predictions: &[ValidatedPrediction]) -> (usize, usize) {
    let (mut losses, mut max_losses) = (0, 0);
    let (mut wins, mut best) = (0, 0);
    for p in predictions {
        if p.is_winner {
            wins += 1;
            losses = 0;
            best = best.max(wins);
        } else {
            losses += 1;
            wins = 0;
            max_losses = max_losses.max(losses);
        }
    }
    (max_losses, best)
}

/// Pearson correlation between confidence and exact-rank hits. Zero below
/// `min_samples` or when either series is constant.
pub fn confidence_correlation(predictions: &[ValidatedPrediction], min_samples: usize) -> f64 {
    if predictions.len() < min_samples.max(2) {
        return 0.0;
    }
    let xs: Vec<f64> = predictions.iter().map(|p| p.confidence).collect();
    let ys: Vec<f64> = predictions
        .iter()
        .map(|p| if p.predicted_correctly { 1.0 } else { 0.0 })
        .collect();
    pearson(&xs, &ys)
}

fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return 0.0;
    }
    let r = cov / (var_x.sqrt() * var_y.sqrt());
    if r.is_finite() {
        r
    } else {
        0.0
    }
}
