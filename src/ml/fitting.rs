//! Offline calibration fitting
//!
//! Pure grid search over a single calibration parameter. Deterministic: the
//! same history always yields the same parameter, and ties go to the first
//! grid value in ascending order.

use super::calibration::{normalize, CalibrationMethod, CalibrationModel};
use super::components::sigmoid;
use crate::error::{EngineError, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One settled event: raw model probabilities and who won
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalEvent {
    pub event_id: String,
    pub probabilities: Vec<f64>,
    pub winners: Vec<bool>,
}

impl HistoricalEvent {
    fn is_usable(&self) -> bool {
        !self.probabilities.is_empty() && self.probabilities.len() == self.winners.len()
    }
}

/// Inclusive grid `start, start + step, ..., end`, rounded to `decimals`
pub fn grid(start: f64, end: f64, step: f64, decimals: i32) -> Vec<f64> {
    let scale = 10f64.powi(decimals);
    let steps = ((end - start) / step).round() as i64;
    (0..=steps)
        .map(|i| ((start + step * i as f64) * scale).round() / scale)
        .collect()
}

/// Exponent grid for the power law
pub fn power_law_grid() -> Vec<f64> {
    grid(0.5, 1.1, 0.05, 2)
}

/// Shift grid for the logit shift
pub fn logit_shift_grid() -> Vec<f64> {
    grid(-2.0, 1.0, 0.1, 1)
}

/// Return the grid value minimising `objective`, with its objective value.
/// Non-finite objective values are never selected.
pub fn grid_search<F>(grid: &[f64], objective: F) -> Option<(f64, f64)>
where
    F: Fn(f64) -> f64,
{
    let mut best: Option<(f64, f64)> = None;
    for &value in grid {
        let score = objective(value);
        if !score.is_finite() {
            continue;
        }
        match best {
            Some((_, best_score)) if score >= best_score => {}
            _ => best = Some((value, score)),
        }
    }
    best
}

fn brier(probs: &[f64], winners: &[bool]) -> f64 {
    let n = probs.len() as f64;
    probs
        .iter()
        .zip(winners)
        .map(|(p, w)| (p - if *w { 1.0 } else { 0.0 }).powi(2))
        .sum::<f64>()
        / n
}

/// Mean over events of the per-event Brier score after power-law
/// transform and per-event renormalization
pub fn power_law_objective(events: &[HistoricalEvent], exponent: f64) -> f64 {
    let scores: Vec<f64> = events
        .iter()
        .map(|e| {
            let transformed: Vec<f64> = e
                .probabilities
                .iter()
                .map(|p| p.max(0.0).powf(exponent))
                .collect();
            brier(&normalize(&transformed), &e.winners)
        })
        .collect();
    scores.iter().sum::<f64>() / scores.len() as f64
}

/// Brier score over all flattened (probability, outcome) pairs after a
/// logit shift, without renormalization
pub fn logit_shift_objective(events: &[HistoricalEvent], shift: f64) -> f64 {
    let mut total = 0.0;
    let mut count = 0usize;
    for event in events {
        for (p, won) in event.probabilities.iter().zip(&event.winners) {
            let p = p.clamp(0.001, 0.999);
            let shifted = sigmoid((p / (1.0 - p)).ln() + shift);
            total += (shifted - if *won { 1.0 } else { 0.0 }).powi(2);
            count += 1;
        }
    }
    total / count as f64
}

/// Fit `method` on `history`, starting from `base` for the other parameters
pub fn fit(
    method: CalibrationMethod,
    base: &CalibrationModel,
    history: &[HistoricalEvent],
) -> Result<CalibrationModel> {
    if method == CalibrationMethod::MarketAdjusted {
        return Err(EngineError::Configuration(
            "market_adjusted uses a fixed market weight and has nothing to fit".to_string(),
        ));
    }

    let usable: Vec<HistoricalEvent> = history.iter().filter(|e| e.is_usable()).cloned().collect();
    if usable.len() < history.len() {
        warn!(
            skipped = history.len() - usable.len(),
            "Skipping malformed historical events"
        );
    }
    if usable.is_empty() {
        return Err(EngineError::InsufficientData(
            "no settled events to fit calibration on".to_string(),
        ));
    }

    let samples: usize = usable.iter().map(|e| e.probabilities.len()).sum();
    let mut model = base.clone();
    model.method = method;

    let best = match method {
        CalibrationMethod::PowerLaw => {
            grid_search(&power_law_grid(), |k| power_law_objective(&usable, k))
        }
        CalibrationMethod::LogitShift => {
            grid_search(&logit_shift_grid(), |s| logit_shift_objective(&usable, s))
        }
        CalibrationMethod::MarketAdjusted => None,
    };
    let (value, score) = best.ok_or_else(|| {
        EngineError::InsufficientData("calibration objective undefined on history".to_string())
    })?;

    match method {
        CalibrationMethod::PowerLaw => model.power_exponent = value,
        CalibrationMethod::LogitShift => model.logit_shift = value,
        CalibrationMethod::MarketAdjusted => {}
    }
    model.brier_score = Some(score);
    model.samples = samples;
    model.fitted_at = Some(Utc::now());

    debug!(method = %method, value, score, events = usable.len(), "Grid search complete");
    Ok(model)
}
