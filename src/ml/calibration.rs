//! Probability calibration
//!
//! Maps raw ensemble probabilities to calibrated win probabilities:
//! - Power law (`p^k`)
//! - Logit shift (`sigmoid(logit(p) + shift)`)
//! - Market blend (`(1 - w) * p + w * p_market`)
//!
//! Every transform is followed by favourite compression, a longshot boost and
//! a clamp to configured bounds. Event-level calibration also renormalizes and
//! compresses batches whose probabilities add up to far more than 1.

use super::components::sigmoid;
use super::fitting::{self, HistoricalEvent};
use crate::config::CalibrationConfig;
use crate::error::{EngineError, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

/// Lower and upper clip applied before taking a logit
const LOGIT_CLIP: (f64, f64) = (0.001, 0.999);

/// Calibration transform selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationMethod {
    #[default]
    PowerLaw,
    LogitShift,
    MarketAdjusted,
}

impl CalibrationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalibrationMethod::PowerLaw => "power_law",
            CalibrationMethod::LogitShift => "logit_shift",
            CalibrationMethod::MarketAdjusted => "market_adjusted",
        }
    }
}

impl FromStr for CalibrationMethod {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "power_law" => Ok(CalibrationMethod::PowerLaw),
            "logit_shift" => Ok(CalibrationMethod::LogitShift),
            "market_adjusted" => Ok(CalibrationMethod::MarketAdjusted),
            other => Err(EngineError::Configuration(format!(
                "unknown calibration method '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for CalibrationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A calibration transform and its parameters.
///
/// Only replaced by an explicit fit; scoring never mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationModel {
    pub method: CalibrationMethod,
    pub power_exponent: f64,
    pub logit_shift: f64,
    pub market_weight: f64,
    #[serde(default)]
    pub fitted_at: Option<DateTime<Utc>>,
    /// Objective value at the fitted parameter
    #[serde(default)]
    pub brier_score: Option<f64>,
    #[serde(default)]
    pub samples: usize,
}

impl CalibrationModel {
    pub fn from_config(config: &CalibrationConfig) -> Self {
        Self {
            method: config.method,
            power_exponent: config.power_exponent,
            logit_shift: config.logit_shift,
            market_weight: config.market_weight,
            fitted_at: None,
            brier_score: None,
            samples: 0,
        }
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path.as_ref()).await?;
        let model: CalibrationModel = serde_json::from_str(&raw)?;
        Ok(model)
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path.as_ref(), json).await?;
        Ok(())
    }

    /// Transform one probability without event-level renormalization
    pub fn transform_one(&self, p: f64, odds: Option<f64>) -> f64 {
        match self.method {
            CalibrationMethod::PowerLaw => p.max(0.0).powf(self.power_exponent),
            CalibrationMethod::LogitShift => shift_logit(p, self.logit_shift),
            CalibrationMethod::MarketAdjusted => match valid_odds(odds) {
                Some(o) => (1.0 - self.market_weight) * p + self.market_weight / o,
                None => p,
            },
        }
    }

    /// Transform all entrants of one event and renormalize to sum 1.
    ///
    /// The market blend needs valid odds for every entrant; otherwise it
    /// falls back to model-only probabilities.
    pub fn transform_event(&self, probs: &[f64], odds: &[Option<f64>]) -> Vec<f64> {
        let transformed: Vec<f64> = match self.method {
            CalibrationMethod::PowerLaw => probs
                .iter()
                .map(|p| p.max(0.0).powf(self.power_exponent))
                .collect(),
            CalibrationMethod::LogitShift => probs
                .iter()
                .map(|p| shift_logit(*p, self.logit_shift))
                .collect(),
            CalibrationMethod::MarketAdjusted => match market_probabilities(odds, probs.len()) {
                Some(market) => probs
                    .iter()
                    .zip(&market)
                    .map(|(p, m)| (1.0 - self.market_weight) * p + self.market_weight * m)
                    .collect(),
                None => {
                    warn!(
                        entrants = probs.len(),
                        "Missing or invalid odds for market blend, using model probabilities"
                    );
                    probs.to_vec()
                }
            },
        };
        normalize(&transformed)
    }
}

fn shift_logit(p: f64, shift: f64) -> f64 {
    let p = p.clamp(LOGIT_CLIP.0, LOGIT_CLIP.1);
    sigmoid((p / (1.0 - p)).ln() + shift)
}

fn valid_odds(odds: Option<f64>) -> Option<f64> {
    odds.filter(|o| o.is_finite() && *o > 1.0)
}

/// Normalized implied probabilities, or `None` if any entrant lacks valid odds
pub fn market_probabilities(odds: &[Option<f64>], expected: usize) -> Option<Vec<f64>> {
    if odds.len() != expected || expected == 0 {
        return None;
    }
    let implied: Option<Vec<f64>> = odds.iter().map(|o| valid_odds(*o).map(|o| 1.0 / o)).collect();
    implied.map(|v| normalize(&v))
}

/// Scale to sum 1; a non-positive total is returned unchanged
pub fn normalize(values: &[f64]) -> Vec<f64> {
    let total: f64 = values.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        return values.to_vec();
    }
    values.iter().map(|v| v / total).collect()
}

/// Applies a calibration model plus the configured adjustments
#[derive(Debug, Clone)]
pub struct Calibrator {
    config: CalibrationConfig,
    model: Arc<CalibrationModel>,
}

impl Calibrator {
    pub fn new(config: CalibrationConfig, model: Arc<CalibrationModel>) -> Self {
        Self { config, model }
    }

    pub fn model(&self) -> &CalibrationModel {
        &self.model
    }

    /// Favourite compression, longshot boost, clamp
    pub fn adjust(&self, p: f64) -> f64 {
        let c = &self.config;
        let mut p = p;
        if p > c.favorite_threshold {
            p -= (p - c.favorite_threshold) * c.favorite_compression;
        }
        if p < c.longshot_threshold {
            p *= 1.0 + c.longshot_boost;
        }
        p.clamp(c.min_probability, c.max_probability)
    }

    pub fn calibrate_one(&self, raw: f64, odds: Option<f64>) -> f64 {
        self.adjust(self.model.transform_one(raw, odds))
    }

    /// Calibrate every entrant of one event.
    ///
    /// Probabilities are compressed toward a target sum only when their total
    /// exceeds the configured trigger; they are never forced to exactly 1.
    pub fn calibrate_event(&self, raw: &[f64], odds: &[Option<f64>]) -> Vec<f64> {
        let adjusted: Vec<f64> = self
            .model
            .transform_event(raw, odds)
            .into_iter()
            .map(|p| self.adjust(p))
            .collect();
        self.compress_batch(adjusted)
    }

    /// Scale an overround batch toward `min(ceiling, max(floor, total * scale))`
    pub fn compress_batch(&self, probs: Vec<f64>) -> Vec<f64> {
        let c = &self.config;
        let total: f64 = probs.iter().sum();
        if total <= c.renorm_trigger {
            return probs;
        }
        let target = (total * c.renorm_scale).max(c.renorm_floor).min(c.renorm_ceiling);
        let scale = target / total;
        probs
            .into_iter()
            .map(|p| (p * scale).clamp(c.min_probability, c.max_probability))
            .collect()
    }
}

/// Shared, swappable calibration model.
///
/// Readers take a cheap snapshot; a refit runs off the calling thread and
/// only replaces the snapshot after the new model has been persisted.
pub struct CalibrationHandle {
    current: RwLock<Arc<CalibrationModel>>,
    path: PathBuf,
}

impl CalibrationHandle {
    pub fn new(model: CalibrationModel, path: impl Into<PathBuf>) -> Self {
        Self {
            current: RwLock::new(Arc::new(model)),
            path: path.into(),
        }
    }

    /// Load the persisted model, or start from `fallback` if none exists
    pub async fn open(path: impl Into<PathBuf>, fallback: CalibrationModel) -> Result<Self> {
        let path = path.into();
        let model = if tokio::fs::try_exists(&path).await? {
            let model = CalibrationModel::load(&path).await?;
            info!(path = %path.display(), method = %model.method, "Loaded calibration model");
            model
        } else {
            info!(
                path = %path.display(),
                "No calibration model on disk, using configured defaults"
            );
            fallback
        };
        Ok(Self::new(model, path))
    }

    pub fn snapshot(&self) -> Arc<CalibrationModel> {
        self.current.read().clone()
    }

    /// Fit `method` on historical events, persist, then swap in the result
    pub async fn refit(
        &self,
        method: CalibrationMethod,
        history: Arc<Vec<HistoricalEvent>>,
    ) -> Result<Arc<CalibrationModel>> {
        let base = (*self.snapshot()).clone();
        let fitted =
            tokio::task::spawn_blocking(move || fitting::fit(method, &base, &history)).await??;

        fitted.save(&self.path).await?;
        let fitted = Arc::new(fitted);
        *self.current.write() = fitted.clone();

        info!(
            method = %fitted.method,
            exponent = fitted.power_exponent,
            shift = fitted.logit_shift,
            brier = ?fitted.brier_score,
            samples = fitted.samples,
            "Calibration model refitted"
        );
        Ok(fitted)
    }
}
