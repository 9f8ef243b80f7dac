//! SQLite persistence
//!
//! - `prediction_log`: one row per logged prediction. At most one outstanding
//!   (unvalidated) row per `(event_id, entrant_id, model_version)`, enforced by
//!   a partial unique index.
//! - `accuracy_daily`: cached metrics keyed by `(race_date, venue)`
//! - `model_performance`: summaries keyed by `(model_version, date_start, date_end)`

use crate::config::DatabaseConfig;
use crate::error::{EngineError, Result};
use crate::ml::HistoricalEvent;
use crate::verification::AccuracyMetrics;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{debug, info};

/// Venue key used when metrics span every venue
pub const ALL_VENUES: &str = "*";

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS prediction_log (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        event_id TEXT NOT NULL,
        event_date TEXT NOT NULL,
        venue TEXT NOT NULL,
        entrant_id TEXT NOT NULL,
        predicted_rank INTEGER NOT NULL,
        raw_win_prob REAL NOT NULL,
        predicted_win_prob REAL NOT NULL,
        predicted_place_prob REAL NOT NULL,
        confidence REAL NOT NULL,
        odds_at_prediction REAL,
        model_version TEXT NOT NULL,
        created_at TEXT NOT NULL,
        actual_position INTEGER,
        validated_at TEXT
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_prediction_outstanding
        ON prediction_log (event_id, entrant_id, model_version)
        WHERE validated_at IS NULL",
    "CREATE INDEX IF NOT EXISTS idx_prediction_date ON prediction_log (event_date)",
    "CREATE TABLE IF NOT EXISTS accuracy_daily (
        race_date TEXT NOT NULL,
        venue TEXT NOT NULL,
        total_predictions INTEGER NOT NULL,
        win_rate REAL NOT NULL,
        place_rate REAL NOT NULL,
        roi REAL NOT NULL,
        metrics TEXT NOT NULL,
        computed_at TEXT NOT NULL,
        PRIMARY KEY (race_date, venue)
    )",
    "CREATE TABLE IF NOT EXISTS model_performance (
        model_version TEXT NOT NULL,
        date_start TEXT NOT NULL,
        date_end TEXT NOT NULL,
        total_predictions INTEGER NOT NULL,
        win_rate REAL NOT NULL,
        place_rate REAL NOT NULL,
        roi REAL NOT NULL,
        brier_score REAL NOT NULL,
        calibration_error REAL NOT NULL,
        recorded_at TEXT NOT NULL,
        PRIMARY KEY (model_version, date_start, date_end)
    )",
];

/// A prediction about to be logged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPrediction {
    pub event_id: String,
    pub event_date: NaiveDate,
    pub venue: String,
    pub entrant_id: String,
    pub predicted_rank: u32,
    /// Ensemble probability before calibration, kept for refitting
    pub raw_win_prob: f64,
    pub predicted_win_prob: f64,
    pub predicted_place_prob: f64,
    pub confidence: f64,
    pub odds_at_prediction: Option<f64>,
    pub model_version: String,
}

/// A stored prediction row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionLogEntry {
    pub id: i64,
    pub event_id: String,
    pub event_date: NaiveDate,
    pub venue: String,
    pub entrant_id: String,
    pub predicted_rank: u32,
    pub raw_win_prob: f64,
    pub predicted_win_prob: f64,
    pub predicted_place_prob: f64,
    pub confidence: f64,
    pub odds_at_prediction: Option<f64>,
    pub model_version: String,
    pub created_at: DateTime<Utc>,
    pub actual_position: Option<u32>,
    pub validated_at: Option<DateTime<Utc>>,
}

impl PredictionLogEntry {
    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            event_id: row.try_get("event_id")?,
            event_date: row.try_get("event_date")?,
            venue: row.try_get("venue")?,
            entrant_id: row.try_get("entrant_id")?,
            predicted_rank: to_u32(row.try_get("predicted_rank")?)?,
            raw_win_prob: row.try_get("raw_win_prob")?,
            predicted_win_prob: row.try_get("predicted_win_prob")?,
            predicted_place_prob: row.try_get("predicted_place_prob")?,
            confidence: row.try_get("confidence")?,
            odds_at_prediction: row.try_get("odds_at_prediction")?,
            model_version: row.try_get("model_version")?,
            created_at: row.try_get("created_at")?,
            actual_position: row
                .try_get::<Option<i64>, _>("actual_position")?
                .map(to_u32)
                .transpose()?,
            validated_at: row.try_get("validated_at")?,
        })
    }

    pub fn is_validated(&self) -> bool {
        self.validated_at.is_some()
    }
}

fn to_u32(value: i64) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| EngineError::Internal(format!("stored position {value} out of range")))
}

/// Row selection for log queries. Unset fields do not filter.
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub venue: Option<String>,
    pub model_version: Option<String>,
    pub validated_only: bool,
}

impl EntryFilter {
    pub fn validated() -> Self {
        Self {
            validated_only: true,
            ..Default::default()
        }
    }

    pub fn between(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    pub fn venue(mut self, venue: impl Into<String>) -> Self {
        self.venue = Some(venue.into());
        self
    }

    pub fn model_version(mut self, version: impl Into<String>) -> Self {
        self.model_version = Some(version.into());
        self
    }
}

/// Performance of one model version over a date range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPerformance {
    pub model_version: String,
    pub date_start: NaiveDate,
    pub date_end: NaiveDate,
    pub total_predictions: usize,
    pub win_rate: f64,
    pub place_rate: f64,
    pub roi: f64,
    pub brier_score: f64,
    pub calibration_error: f64,
    pub recorded_at: DateTime<Utc>,
}

/// Handle to the prediction database
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if needed) the configured database and ensure the schema
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        info!(url = %config.url, "Prediction store ready");
        Ok(store)
    }

    /// Private in-memory database on a single pinned connection
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Insert a prediction, or overwrite the outstanding one for the same
    /// `(event, entrant, model_version)`. Returns the row id.
    pub async fn upsert_prediction(&self, p: &NewPrediction) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO prediction_log (
                event_id, event_date, venue, entrant_id, predicted_rank,
                raw_win_prob, predicted_win_prob, predicted_place_prob,
                confidence, odds_at_prediction, model_version, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (event_id, entrant_id, model_version) WHERE validated_at IS NULL
            DO UPDATE SET
                event_date = excluded.event_date,
                venue = excluded.venue,
                predicted_rank = excluded.predicted_rank,
                raw_win_prob = excluded.raw_win_prob,
                predicted_win_prob = excluded.predicted_win_prob,
                predicted_place_prob = excluded.predicted_place_prob,
                confidence = excluded.confidence,
                odds_at_prediction = excluded.odds_at_prediction,
                created_at = excluded.created_at
            RETURNING id",
        )
        .bind(&p.event_id)
        .bind(p.event_date)
        .bind(&p.venue)
        .bind(&p.entrant_id)
        .bind(i64::from(p.predicted_rank))
        .bind(p.raw_win_prob)
        .bind(p.predicted_win_prob)
        .bind(p.predicted_place_prob)
        .bind(p.confidence)
        .bind(p.odds_at_prediction)
        .bind(&p.model_version)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        debug!(id, event_id = %p.event_id, entrant_id = %p.entrant_id, "Prediction logged");
        Ok(id)
    }

    /// Record a finishing position against every logged prediction for the
    /// entrant in this event. Only `actual_position` and `validated_at` change.
    pub async fn record_result(
        &self,
        event_id: &str,
        entrant_id: &str,
        position: u32,
        validated_at: DateTime<Utc>,
    ) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE prediction_log SET actual_position = ?, validated_at = ?
             WHERE event_id = ? AND entrant_id = ?",
        )
        .bind(i64::from(position))
        .bind(validated_at)
        .bind(event_id)
        .bind(entrant_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn event_entries(&self, event_id: &str) -> Result<Vec<PredictionLogEntry>> {
        let rows = sqlx::query(
            "SELECT * FROM prediction_log WHERE event_id = ?
             ORDER BY model_version, predicted_rank, id",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(PredictionLogEntry::from_row).collect()
    }

    pub async fn entries(&self, filter: &EntryFilter) -> Result<Vec<PredictionLogEntry>> {
        let rows = sqlx::query(
            "SELECT * FROM prediction_log
             WHERE (? IS NULL OR event_date >= ?)
               AND (? IS NULL OR event_date <= ?)
               AND (? IS NULL OR venue = ?)
               AND (? IS NULL OR model_version = ?)
               AND (? = 0 OR validated_at IS NOT NULL)
             ORDER BY event_date, event_id, predicted_rank, id",
        )
        .bind(filter.start)
        .bind(filter.start)
        .bind(filter.end)
        .bind(filter.end)
        .bind(filter.venue.as_deref())
        .bind(filter.venue.as_deref())
        .bind(filter.model_version.as_deref())
        .bind(filter.model_version.as_deref())
        .bind(filter.validated_only)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(PredictionLogEntry::from_row).collect()
    }

    /// Settled events as raw probabilities and winners, for calibration fitting
    pub async fn historical_events(&self, filter: &EntryFilter) -> Result<Vec<HistoricalEvent>> {
        let filter = EntryFilter {
            validated_only: true,
            ..filter.clone()
        };
        let entries = self.entries(&filter).await?;

        let mut events: Vec<HistoricalEvent> = Vec::new();
        let mut index: HashMap<(String, String), usize> = HashMap::new();
        for entry in entries {
            let key = (entry.event_id.clone(), entry.model_version.clone());
            let slot = *index.entry(key).or_insert_with(|| {
                events.push(HistoricalEvent {
                    event_id: entry.event_id.clone(),
                    probabilities: Vec::new(),
                    winners: Vec::new(),
                });
                events.len() - 1
            });
            events[slot].probabilities.push(entry.raw_win_prob);
            events[slot].winners.push(entry.actual_position == Some(1));
        }
        Ok(events)
    }

    pub async fn cached_daily_accuracy(
        &self,
        date: NaiveDate,
        venue: Option<&str>,
    ) -> Result<Option<AccuracyMetrics>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT metrics FROM accuracy_daily WHERE race_date = ? AND venue = ?",
        )
        .bind(date)
        .bind(venue.unwrap_or(ALL_VENUES))
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(json,)| serde_json::from_str(&json).map_err(EngineError::from))
            .transpose()
    }

    pub async fn store_daily_accuracy(
        &self,
        date: NaiveDate,
        venue: Option<&str>,
        metrics: &AccuracyMetrics,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO accuracy_daily (
                race_date, venue, total_predictions, win_rate, place_rate, roi, metrics, computed_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (race_date, venue) DO UPDATE SET
                total_predictions = excluded.total_predictions,
                win_rate = excluded.win_rate,
                place_rate = excluded.place_rate,
                roi = excluded.roi,
                metrics = excluded.metrics,
                computed_at = excluded.computed_at",
        )
        .bind(date)
        .bind(venue.unwrap_or(ALL_VENUES))
        .bind(metrics.total_predictions as i64)
        .bind(metrics.win_rate)
        .bind(metrics.place_rate)
        .bind(metrics.roi)
        .bind(serde_json::to_string(metrics)?)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn record_model_performance(&self, perf: &ModelPerformance) -> Result<()> {
        sqlx::query(
            "INSERT INTO model_performance (
                model_version, date_start, date_end, total_predictions, win_rate,
                place_rate, roi, brier_score, calibration_error, recorded_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (model_version, date_start, date_end) DO UPDATE SET
                total_predictions = excluded.total_predictions,
                win_rate = excluded.win_rate,
                place_rate = excluded.place_rate,
                roi = excluded.roi,
                brier_score = excluded.brier_score,
                calibration_error = excluded.calibration_error,
                recorded_at = excluded.recorded_at",
        )
        .bind(&perf.model_version)
        .bind(perf.date_start)
        .bind(perf.date_end)
        .bind(perf.total_predictions as i64)
        .bind(perf.win_rate)
        .bind(perf.place_rate)
        .bind(perf.roi)
        .bind(perf.brier_score)
        .bind(perf.calibration_error)
        .bind(perf.recorded_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Recorded performance for a model version, most recent range first
    pub async fn model_performance(&self, model_version: &str) -> Result<Vec<ModelPerformance>> {
        let rows = sqlx::query(
            "SELECT * FROM model_performance WHERE model_version = ?
             ORDER BY date_end DESC, date_start DESC",
        )
        .bind(model_version)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<ModelPerformance> {
                Ok(ModelPerformance {
                    model_version: row.try_get("model_version")?,
                    date_start: row.try_get("date_start")?,
                    date_end: row.try_get("date_end")?,
                    total_predictions: row.try_get::<i64, _>("total_predictions")?.max(0) as usize,
                    win_rate: row.try_get("win_rate")?,
                    place_rate: row.try_get("place_rate")?,
                    roi: row.try_get("roi")?,
                    brier_score: row.try_get("brier_score")?,
                    calibration_error: row.try_get("calibration_error")?,
                    recorded_at: row.try_get("recorded_at")?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests;
