//! Verification reports
//!
//! Builds full model reports from the prediction log, compares model
//! versions, caches daily accuracy and records per-version performance.
//! Report and health paths never fail: store errors degrade the result.

use super::drift::{detect_drift, DriftReport};
use super::health::{assess_health, HealthOutcome};
use super::metrics::AccuracyMetrics;
use super::{validated, ValidatedPrediction};
use crate::config::VerificationConfig;
use crate::error::{EngineError, Result};
use crate::storage::{EntryFilter, ModelPerformance, PredictionLogEntry, Store};
use crate::types::StopFlag;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt::Write as _;
use std::str::FromStr;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
}

impl FromStr for ReportFormat {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            other => Err(EngineError::Configuration(format!("unknown report format: {other}"))),
        }
    }
}

/// Accuracy at one venue
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VenuePerformance {
    pub venue: String,
    pub events: usize,
    pub predictions: usize,
    pub wins: usize,
    pub win_rate: f64,
    pub place_rate: f64,
    pub roi: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationReport {
    pub model_version: String,
    pub generated_at: DateTime<Utc>,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,

    pub total_events: usize,
    pub total_predictions: usize,
    pub validated_predictions: usize,
    /// Share of logged events with at least one validated prediction
    pub validation_rate: f64,

    pub metrics: AccuracyMetrics,
    pub calibration_score: f64,
    pub venues: Vec<VenuePerformance>,
    pub recommendations: Vec<String>,
}

impl VerificationReport {
    fn empty(model_version: &str, start: NaiveDate, end: NaiveDate, reason: &str) -> Self {
        Self {
            model_version: model_version.to_string(),
            generated_at: Utc::now(),
            period_start: start,
            period_end: end,
            total_events: 0,
            total_predictions: 0,
            validated_predictions: 0,
            validation_rate: 0.0,
            metrics: AccuracyMetrics::default(),
            calibration_score: 0.0,
            venues: Vec::new(),
            recommendations: vec![reason.to_string()],
        }
    }

    pub fn export(&self, format: ReportFormat) -> Result<String> {
        match format {
            ReportFormat::Json => Ok(serde_json::to_string_pretty(self)?),
            ReportFormat::Text => Ok(self.to_text()),
        }
    }

    fn to_text(&self) -> String {
        let m = &self.metrics;
        let mut out = String::new();
        let _ = writeln!(out, "Model Verification Report");
        let _ = writeln!(out, "{}", "=".repeat(50));
        let _ = writeln!(out, "Model Version: {}", self.model_version);
        let _ = writeln!(out, "Period: {} to {}", self.period_start, self.period_end);
        let _ = writeln!(out);
        let _ = writeln!(out, "Coverage:");
        let _ = writeln!(out, "  Total Events: {}", self.total_events);
        let _ = writeln!(out, "  Total Predictions: {}", self.total_predictions);
        let _ = writeln!(
            out,
            "  Validated: {} ({:.1}%)",
            self.validated_predictions,
            self.validation_rate * 100.0
        );
        let _ = writeln!(out);
        let _ = writeln!(out, "Accuracy:");
        let _ = writeln!(out, "  Win Rate: {:.1}%", m.win_rate * 100.0);
        let _ = writeln!(out, "  Place Rate: {:.1}%", m.place_rate * 100.0);
        let _ = writeln!(out, "  Top 5 Rate: {:.1}%", m.top5_rate * 100.0);
        let _ = writeln!(out, "  Exact Rank: {:.1}%", m.exact_rank_rate * 100.0);
        let _ = writeln!(out, "  Avg Position Error: {:.2}", m.avg_position_error);
        let _ = writeln!(out);
        let _ = writeln!(out, "Calibration:");
        let _ = writeln!(out, "  Calibration Score: {:.2}", self.calibration_score);
        let _ = writeln!(out, "  Brier Score: {:.4}", m.brier_score);
        let _ = writeln!(out, "  Confidence-Accuracy Correlation: {:.2}", m.confidence_correlation);
        let _ = writeln!(out);
        let _ = writeln!(out, "ROI:");
        let _ = writeln!(out, "  ROI: {:.1}%", m.roi * 100.0);
        let _ = writeln!(out, "  Profit/Loss: {:.2} units", m.profit_loss);
        let _ = writeln!(out, "  Total Staked: {:.2} units", m.total_staked);
        let _ = writeln!(out, "  Avg Odds: {:.2}", m.average_odds);
        let _ = writeln!(out);
        let _ = writeln!(out, "Risk:");
        let _ = writeln!(out, "  Max Consecutive Losses: {}", m.max_consecutive_losses);
        let _ = writeln!(out, "  Best Streak: {}", m.best_streak);
        if !self.venues.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Venues:");
            for v in &self.venues {
                let _ = writeln!(
                    out,
                    "  {}: {} events, win {:.1}%, place {:.1}%, ROI {:.1}%",
                    v.venue,
                    v.events,
                    v.win_rate * 100.0,
                    v.place_rate * 100.0,
                    v.roi * 100.0
                );
            }
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "Recommendations:");
        for rec in &self.recommendations {
            let _ = writeln!(out, "  {rec}");
        }
        out
    }
}

/// Per-venue breakdown, venues in name order
pub fn venue_breakdown(predictions: &[ValidatedPrediction]) -> Vec<VenuePerformance> {
    let mut by_venue: BTreeMap<&str, Vec<ValidatedPrediction>> = BTreeMap::new();
    for p in predictions {
        by_venue.entry(p.venue.as_str()).or_default().push(p.clone());
    }
    by_venue
        .into_iter()
        .map(|(venue, preds)| {
            let m = AccuracyMetrics::compute(&preds, usize::MAX);
            VenuePerformance {
                venue: venue.to_string(),
                events: m.total_events,
                predictions: m.total_predictions,
                wins: m.winners_correct,
                win_rate: m.win_rate,
                place_rate: m.place_rate,
                roi: m.roi,
            }
        })
        .collect()
}

/// Actionable notes on a metrics snapshot
pub fn recommendations(metrics: &AccuracyMetrics) -> Vec<String> {
    let mut recs = Vec::new();

    if metrics.win_rate < 0.10 {
        recs.push(
            "⚠️ Win rate below 10% - Review model features and training data".to_string(),
        );
    } else if metrics.win_rate > 0.20 {
        recs.push("✅ Excellent win rate above 20%".to_string());
    }

    if metrics.roi < -0.15 {
        recs.push(
            "⚠️ ROI significantly negative - Consider adjusting betting strategy".to_string(),
        );
    } else if metrics.roi > 0.10 {
        recs.push("✅ Strong positive ROI".to_string());
    }

    if metrics.calibration_score() < 0.7 {
        recs.push("⚠️ Poor probability calibration - Model may be overconfident".to_string());
    }
    if metrics.avg_position_error > 3.0 {
        recs.push(format!(
            "⚠️ High average position error ({:.1}) - Improve ranking logic",
            metrics.avg_position_error
        ));
    }
    if metrics.place_rate < 0.35 {
        recs.push("⚠️ Place rate below 35% - Focus on place predictions".to_string());
    }

    if recs.is_empty() {
        recs.push("✅ Model performance within acceptable ranges".to_string());
    }
    recs
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionComparison {
    pub version_a: VerificationReport,
    pub version_b: VerificationReport,
    pub win_rate_improvement: f64,
    pub place_rate_improvement: f64,
    pub roi_improvement: f64,
    pub calibration_improvement: f64,
    /// `version_b` only when it has the strictly higher win rate
    pub winner: String,
}

/// Reads the prediction log and turns it into reports
pub struct Verifier {
    store: Store,
    config: VerificationConfig,
}

impl Verifier {
    pub fn new(store: Store, config: VerificationConfig) -> Self {
        Self { store, config }
    }

    fn settled_metrics(&self, entries: &[PredictionLogEntry]) -> AccuracyMetrics {
        AccuracyMetrics::compute(&validated(entries), self.config.min_correlation_samples)
    }

    /// Report for `model_version` over the last `days` days up to `today`
    pub async fn verify_model(
        &self,
        model_version: &str,
        days: i64,
        today: NaiveDate,
    ) -> VerificationReport {
        let start = today - Duration::days(days);
        let filter = EntryFilter::default()
            .between(start, today)
            .model_version(model_version);

        let entries = match self.store.entries(&filter).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, model_version, "Prediction log unavailable for verification");
                return VerificationReport::empty(
                    model_version,
                    start,
                    today,
                    &format!("⚠️ Prediction log unavailable: {e}"),
                );
            }
        };

        let results = validated(&entries);
        if results.is_empty() {
            return VerificationReport::empty(
                model_version,
                start,
                today,
                "No validated predictions available for analysis",
            );
        }

        let logged_events: HashSet<&str> = entries.iter().map(|e| e.event_id.as_str()).collect();
        let validated_events: HashSet<&str> = results.iter().map(|r| r.event_id.as_str()).collect();
        let metrics = AccuracyMetrics::compute(&results, self.config.min_correlation_samples);

        let report = VerificationReport {
            model_version: model_version.to_string(),
            generated_at: Utc::now(),
            period_start: start,
            period_end: today,
            total_events: logged_events.len(),
            total_predictions: entries.len(),
            validated_predictions: results.len(),
            validation_rate: validated_events.len() as f64 / logged_events.len() as f64,
            calibration_score: metrics.calibration_score(),
            venues: venue_breakdown(&results),
            recommendations: recommendations(&metrics),
            metrics,
        };
        info!(
            model_version,
            validated = report.validated_predictions,
            win_rate = report.metrics.win_rate,
            roi = report.metrics.roi,
            "Verification report built"
        );
        report
    }

    pub async fn compare_versions(
        &self,
        version_a: &str,
        version_b: &str,
        days: i64,
        today: NaiveDate,
    ) -> VersionComparison {
        let a = self.verify_model(version_a, days, today).await;
        let b = self.verify_model(version_b, days, today).await;
        VersionComparison {
            win_rate_improvement: b.metrics.win_rate - a.metrics.win_rate,
            place_rate_improvement: b.metrics.place_rate - a.metrics.place_rate,
            roi_improvement: b.metrics.roi - a.metrics.roi,
            calibration_improvement: b.calibration_score - a.calibration_score,
            winner: if b.metrics.win_rate > a.metrics.win_rate {
                version_b.to_string()
            } else {
                version_a.to_string()
            },
            version_a: a,
            version_b: b,
        }
    }

    /// Daily metrics from the cache, computing and storing them on a miss
    pub async fn daily_summary(
        &self,
        date: NaiveDate,
        venue: Option<&str>,
    ) -> Result<AccuracyMetrics> {
        if let Some(cached) = self.store.cached_daily_accuracy(date, venue).await? {
            return Ok(cached);
        }

        let mut filter = EntryFilter::validated().between(date, date);
        filter.venue = venue.map(str::to_string);
        let entries = self.store.entries(&filter).await?;
        let metrics = self.settled_metrics(&entries);

        if metrics.total_predictions > 0 {
            self.store.store_daily_accuracy(date, venue, &metrics).await?;
        }
        Ok(metrics)
    }

    /// Compute and store the performance of a version over a date range
    pub async fn record_performance(
        &self,
        model_version: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<ModelPerformance> {
        let filter = EntryFilter::validated().between(start, end).model_version(model_version);
        let entries = self.store.entries(&filter).await?;
        let metrics = self.settled_metrics(&entries);

        let perf = ModelPerformance {
            model_version: model_version.to_string(),
            date_start: start,
            date_end: end,
            total_predictions: metrics.total_predictions,
            win_rate: metrics.win_rate,
            place_rate: metrics.place_rate,
            roi: metrics.roi,
            brier_score: metrics.brier_score,
            calibration_error: metrics.calibration_error,
            recorded_at: Utc::now(),
        };
        self.store.record_model_performance(&perf).await?;
        Ok(perf)
    }

    /// Health of `model_version` over the configured window
    pub async fn health_check(&self, model_version: &str, today: NaiveDate) -> HealthOutcome {
        let start = today - Duration::days(self.config.health_window_days);
        let filter = EntryFilter::validated().between(start, today).model_version(model_version);

        match self.store.entries(&filter).await {
            Ok(entries) => {
                let metrics = self.settled_metrics(&entries);
                let outcome = assess_health(metrics, &self.config);
                info!(model_version, status = %outcome.status(), "Health check complete");
                outcome
            }
            Err(e) => {
                warn!(error = %e, model_version, "Health check could not read the prediction log");
                HealthOutcome::unavailable(format!("Prediction log unavailable: {e}"))
            }
        }
    }

    /// Drift over the configured window of event dates. A store failure
    /// yields an `Unavailable` report rather than an empty one.
    pub async fn drift(&self, model_version: &str, stop: &StopFlag) -> DriftReport {
        let filter = EntryFilter::validated().model_version(model_version);
        let entries = match self.store.entries(&filter).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    error = %e,
                    model_version,
                    "Drift analysis could not read the prediction log"
                );
                return DriftReport::unavailable(format!("Prediction log unavailable: {e}"));
            }
        };
        detect_drift(
            &validated(&entries),
            self.config.drift_window,
            self.config.drift_threshold,
            stop,
        )
    }
}
