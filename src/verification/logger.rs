//! Prediction logger
//!
//! Persists every scored entrant and later reconciles it with the official
//! finishing positions. Writers to the same `(event, entrant, model_version)`
//! are serialized by a per-key async lock; different keys never wait on each
//! other.

use super::{validated, ValidatedPrediction};
use crate::engine::EventPrediction;
use crate::error::{EngineError, Result};
use crate::storage::{NewPrediction, Store};
use crate::types::FinishingPositions;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// External results feed
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResultSource: Send + Sync {
    /// Finishing positions for a completed event
    async fn finishing_positions(&self, event_id: &str) -> Result<FinishingPositions>;
}

type LogKey = (String, String, String);

pub struct PredictionLogger {
    store: Store,
    model_version: String,
    locks: Mutex<HashMap<LogKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl PredictionLogger {
    pub fn new(store: Store, model_version: impl Into<String>) -> Self {
        Self {
            store,
            model_version: model_version.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    fn key_lock(&self, key: &LogKey) -> Arc<tokio::sync::Mutex<()>> {
        self.locks.lock().entry(key.clone()).or_default().clone()
    }

    fn release_key(&self, key: &LogKey) {
        let mut locks = self.locks.lock();
        // map + the caller's clone means nobody else is waiting
        if locks.get(key).is_some_and(|l| Arc::strong_count(l) <= 2) {
            locks.remove(key);
        }
    }

    /// Write a prediction into the outstanding slot for its key
    pub async fn log_prediction(&self, prediction: &NewPrediction) -> Result<i64> {
        let key = (
            prediction.event_id.clone(),
            prediction.entrant_id.clone(),
            prediction.model_version.clone(),
        );
        let lock = self.key_lock(&key);
        let id = {
            let _guard = lock.lock().await;
            self.store.upsert_prediction(prediction).await
        };
        self.release_key(&key);
        id
    }

    /// Log every ranked entrant of a scored event under this logger's version
    pub async fn log_event(&self, event: &EventPrediction) -> Result<Vec<i64>> {
        let mut ids = Vec::with_capacity(event.results.len());
        for result in &event.results {
            let prediction = NewPrediction {
                event_id: event.event_id.clone(),
                event_date: event.event_date,
                venue: event.venue.clone(),
                entrant_id: result.entrant_id.clone(),
                predicted_rank: result.rank,
                raw_win_prob: result.raw_probability,
                predicted_win_prob: result.calibrated_win_probability,
                predicted_place_prob: result.place_probability,
                confidence: result.confidence,
                odds_at_prediction: result.odds,
                model_version: self.model_version.clone(),
            };
            ids.push(self.log_prediction(&prediction).await?);
        }
        info!(event_id = %event.event_id, logged = ids.len(), "Event predictions logged");
        Ok(ids)
    }

    /// Record finishing positions for an event and return this version's
    /// validated predictions, best predicted rank first.
    ///
    /// Re-validating overwrites the position and timestamp only.
    pub async fn validate(
        &self,
        event_id: &str,
        positions: &FinishingPositions,
    ) -> Result<Vec<ValidatedPrediction>> {
        if positions.is_empty() {
            return Err(EngineError::InsufficientData(format!(
                "no finishing positions for event {event_id}"
            )));
        }

        let now = Utc::now();
        for (entrant_id, position) in positions {
            let updated = self.store.record_result(event_id, entrant_id, *position, now).await?;
            if updated == 0 {
                debug!(
                    event_id,
                    entrant_id = %entrant_id,
                    "Result for an entrant with no logged prediction"
                );
            }
        }

        let entries: Vec<_> = self
            .store
            .event_entries(event_id)
            .await?
            .into_iter()
            .filter(|e| e.model_version == self.model_version)
            .collect();
        let results = validated(&entries);

        info!(
            event_id,
            validated = results.len(),
            top_pick_won = results.iter().any(|r| r.is_winner && r.predicted_rank == 1),
            "Event validated"
        );
        Ok(results)
    }

    /// Fetch results from `source`, then validate
    pub async fn reconcile(
        &self,
        source: &dyn ResultSource,
        event_id: &str,
    ) -> Result<Vec<ValidatedPrediction>> {
        let positions = source.finishing_positions(event_id).await?;
        self.validate(event_id, &positions).await
    }
}
