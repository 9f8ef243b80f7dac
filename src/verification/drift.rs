//! Accuracy drift detection

use super::ValidatedPrediction;
use crate::types::StopFlag;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Exact-rank accuracy for one event date
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodAccuracy {
    pub date: NaiveDate,
    pub predictions: usize,
    pub accuracy: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DriftRecommendation {
    RetrainImmediately,
    Monitor,
    InsufficientData,
    /// The prediction log could not be read
    Unavailable,
}

impl std::fmt::Display for DriftRecommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriftRecommendation::RetrainImmediately => write!(f, "Retrain immediately"),
            DriftRecommendation::Monitor => write!(f, "Monitor"),
            DriftRecommendation::InsufficientData => write!(f, "Insufficient data"),
            DriftRecommendation::Unavailable => write!(f, "Prediction log unavailable"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriftReport {
    pub detected: bool,
    /// First period accuracy minus last; positive means accuracy declined
    pub drift: f64,
    /// Oldest first
    pub periods: Vec<PeriodAccuracy>,
    pub recommendation: DriftRecommendation,
    /// Store failure behind an `Unavailable` report
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DriftReport {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            detected: false,
            drift: 0.0,
            periods: Vec::new(),
            recommendation: DriftRecommendation::Unavailable,
            error: Some(reason.into()),
        }
    }
}

/// Per-date exact-rank hit rate, oldest first
pub fn period_accuracy(predictions: &[ValidatedPrediction]) -> Vec<PeriodAccuracy> {
    let mut by_date: BTreeMap<NaiveDate, (usize, usize)> = BTreeMap::new();
    for p in predictions {
        let slot = by_date.entry(p.event_date).or_default();
        slot.0 += 1;
        if p.predicted_correctly {
            slot.1 += 1;
        }
    }
    by_date
        .into_iter()
        .map(|(date, (total, hits))| PeriodAccuracy {
            date,
            predictions: total,
            accuracy: hits as f64 / total as f64,
        })
        .collect()
}

/// Compare the first and last of the most recent `window` periods.
///
/// A stop request ends the scan early; the report then covers the most
/// recent periods gathered so far.
pub fn detect_drift(
    predictions: &[ValidatedPrediction],
    window: usize,
    threshold: f64,
    stop: &StopFlag,
) -> DriftReport {
    let all = period_accuracy(predictions);

    let mut recent: Vec<PeriodAccuracy> = Vec::with_capacity(window);
    for period in all.into_iter().rev().take(window) {
        if stop.is_stopped() {
            debug!(collected = recent.len(), "Drift scan stopped early");
            break;
        }
        recent.push(period);
    }
    recent.reverse();

    drift_over(recent, threshold)
}

/// Drift across an already windowed, oldest-first series of periods
pub fn drift_over(periods: Vec<PeriodAccuracy>, threshold: f64) -> DriftReport {
    if periods.len() < 2 {
        return DriftReport {
            detected: false,
            drift: 0.0,
            periods,
            recommendation: DriftRecommendation::InsufficientData,
            error: None,
        };
    }
    let first = periods[0].accuracy;
    let last = periods[periods.len() - 1].accuracy;

    let drift = first - last;
    let detected = drift.abs() > threshold;
    let recommendation = if detected && drift > 0.0 {
        DriftRecommendation::RetrainImmediately
    } else {
        DriftRecommendation::Monitor
    };
    if detected {
        warn!(drift, first, last, periods = periods.len(), "Accuracy drift detected");
    }

    DriftReport {
        detected,
        drift,
        periods,
        recommendation,
        error: None,
    }
}
