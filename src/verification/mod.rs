//! Prediction verification
//!
//! Logged predictions are reconciled against finishing positions, then
//! aggregated into accuracy metrics, drift analysis, health checks and
//! verification reports.

pub mod drift;
pub mod health;
pub mod logger;
pub mod metrics;
pub mod report;


pub use drift::{detect_drift, DriftRecommendation, DriftReport, PeriodAccuracy};
pub use health::{assess_health, HealthOutcome};
pub use logger::{PredictionLogger, ResultSource};
pub use metrics::AccuracyMetrics;
pub use report::{ReportFormat, VerificationReport, Verifier, VersionComparison};

use crate::storage::PredictionLogEntry;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A logged prediction with its actual finishing position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedPrediction {
    pub event_id: String,
    pub event_date: NaiveDate,
    pub venue: String,
    pub entrant_id: String,
    pub model_version: String,
    pub predicted_rank: u32,
    pub predicted_win_prob: f64,
    pub confidence: f64,
    pub odds: Option<f64>,
    pub actual_position: u32,
    pub is_winner: bool,
    pub is_place: bool,
    pub predicted_correctly: bool,
    pub within_2_places: bool,
}

impl ValidatedPrediction {
    /// `None` while the entry has no finishing position
    pub fn from_entry(entry: &PredictionLogEntry) -> Option<Self> {
        let actual = entry.actual_position?;
        Some(Self {
            event_id: entry.event_id.clone(),
            event_date: entry.event_date,
            venue: entry.venue.clone(),
            entrant_id: entry.entrant_id.clone(),
            model_version: entry.model_version.clone(),
            predicted_rank: entry.predicted_rank,
            predicted_win_prob: entry.predicted_win_prob,
            confidence: entry.confidence,
            odds: entry.odds_at_prediction,
            actual_position: actual,
            is_winner: actual == 1,
            is_place: actual <= 3,
            predicted_correctly: actual == entry.predicted_rank,
            within_2_places: actual.abs_diff(entry.predicted_rank) <= 2,
        })
    }

    pub fn position_error(&self) -> u32 {
        self.actual_position.abs_diff(self.predicted_rank)
    }
}

/// Validated subset of a set of log entries, order preserved
pub fn validated(entries: &[PredictionLogEntry]) -> Vec<ValidatedPrediction> {
    entries.iter().filter_map(ValidatedPrediction::from_entry).collect()
}
