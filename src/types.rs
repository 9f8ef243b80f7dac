//! Core domain types shared across the engine

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A single raw feature value as produced by the feature aggregator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Flag(bool),
    Number(f64),
    Text(String),
    Null,
}

impl FeatureValue {
    /// Numeric view; booleans map to 1.0/0.0, text and null are absent
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FeatureValue::Number(v) if v.is_finite() => Some(*v),
            FeatureValue::Flag(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Boolean view; non-zero numbers are true
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FeatureValue::Flag(b) => Some(*b),
            FeatureValue::Number(v) if v.is_finite() => Some(*v != 0.0),
            _ => None,
        }
    }
}

/// Feature name → value map for one entrant in one event
pub type RawFeatureMap = HashMap<String, FeatureValue>;

/// One entrant on an event card
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entrant {
    pub id: String,
    #[serde(default)]
    pub features: RawFeatureMap,
    /// Current decimal win odds
    #[serde(default)]
    pub win_odds: Option<f64>,
    #[serde(default)]
    pub place_odds: Option<f64>,
}

/// An event with all of its entrants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventCard {
    pub event_id: String,
    pub event_date: NaiveDate,
    pub venue: String,
    pub entrants: Vec<Entrant>,
}

/// Point-in-time odds observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OddsSnapshot {
    pub entrant_id: String,
    pub win_odds: f64,
    #[serde(default)]
    pub place_odds: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// Finishing positions for one event, entrant id → position (1 = winner)
pub type FinishingPositions = HashMap<String, u32>;

/// Qualitative risk of an entrant's prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_factor_count(count: usize) -> Self {
        match count {
            0 => RiskLevel::Low,
            1 | 2 => RiskLevel::Medium,
            _ => RiskLevel::High,
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "Low"),
            RiskLevel::Medium => write!(f, "Medium"),
            RiskLevel::High => write!(f, "High"),
        }
    }
}

/// Overall model health
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Warning => write!(f, "warning"),
            HealthStatus::Critical => write!(f, "critical"),
        }
    }
}

/// Cooperative cancellation for long replays and analyses.
///
/// Cloning shares the flag; checks are best effort between units of work.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
