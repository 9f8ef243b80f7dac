//! Ensemble combiner
//!
//! Merges the available component predictions into a single raw win
//! probability, estimates confidence, and explains the result.

use super::components::{standard_predictors, ComponentPrediction, ComponentPredictor};
use super::features::{completeness_factors, EntrantFeatures};
use crate::config::{ComponentWeights, WEIGHT_SUM_TOLERANCE};
use crate::error::{EngineError, Result};
use crate::types::RiskLevel;
use serde::Serialize;

/// Raw ensemble output for one entrant, before calibration
#[derive(Debug, Clone, Serialize)]
pub struct CombinedPrediction {
    pub raw_probability: f64,
    pub confidence: f64,
    pub components: Vec<ComponentPrediction>,
}

/// Weighted combination of component predictors
pub struct EnsembleCombiner {
    predictors: Vec<Box<dyn ComponentPredictor>>,
}

impl EnsembleCombiner {
    /// Standard five predictors. Fails if the weights do not sum to 1.0.
    pub fn new(weights: &ComponentWeights) -> Result<Self> {
        weights.validate()?;
        Ok(Self {
            predictors: standard_predictors(weights),
        })
    }

    pub fn with_predictors(predictors: Vec<Box<dyn ComponentPredictor>>) -> Result<Self> {
        let sum: f64 = predictors.iter().map(|p| p.weight()).sum();
        if predictors.is_empty() || (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(EngineError::Configuration(format!(
                "component weights must sum to 1.0, got {sum:.4}"
            )));
        }
        Ok(Self { predictors })
    }

    /// Run every predictor, keeping only the available ones
    pub fn components(&self, features: &EntrantFeatures) -> Vec<ComponentPrediction> {
        self.predictors
            .iter()
            .filter_map(|p| p.predict(features))
            .collect()
    }

    pub fn combine(&self, features: &EntrantFeatures) -> Result<CombinedPrediction> {
        let components = self.components(features);
        let raw_probability = weighted_probability(&components)?;
        let confidence = confidence(&components, features);
        Ok(CombinedPrediction {
            raw_probability,
            confidence,
            components,
        })
    }
}

/// Weighted mean of component probabilities, renormalized over the
/// components present
pub fn weighted_probability(components: &[ComponentPrediction]) -> Result<f64> {
    let total_weight: f64 = components.iter().map(|c| c.weight).sum();
    if components.is_empty() || total_weight <= 0.0 {
        return Err(EngineError::InsufficientData(
            "no component predictor produced a score".to_string(),
        ));
    }
    let weighted: f64 = components.iter().map(|c| c.probability * c.weight).sum();
    Ok(weighted / total_weight)
}

/// Blend of component agreement and data completeness, in [0.15, 0.99]
pub fn confidence(components: &[ComponentPrediction], features: &EntrantFeatures) -> f64 {
    let agreement = if components.is_empty() {
        0.5
    } else {
        let n = components.len() as f64;
        let mean = components.iter().map(|c| c.probability).sum::<f64>() / n;
        let variance = components
            .iter()
            .map(|c| (c.probability - mean).powi(2))
            .sum::<f64>()
            / n;
        1.0 - variance.min(0.5)
    };

    let factors = completeness_factors(features);
    let data = factors.iter().sum::<f64>() / factors.len() as f64;

    (agreement * 0.6 + data * 0.4).clamp(0.15, 0.99)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Impact {
    Strong,
    Moderate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyFactor {
    pub factor: &'static str,
    pub detail: String,
    pub impact: Impact,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskFactor {
    pub factor: &'static str,
    pub detail: String,
    pub severity: RiskLevel,
}

/// Short verdict on an entrant's chances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Verdict {
    StrongContender,
    PlaceChance,
    Roughie,
    Outsider,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::StrongContender => write!(f, "STRONG CONTENDER - Clear winning chance"),
            Verdict::PlaceChance => write!(f, "PLACE CHANCE - Good each-way prospect"),
            Verdict::Roughie => write!(f, "ROUGHIE - Small place chance"),
            Verdict::Outsider => write!(f, "OUTSIDER - Unlikely to figure"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Explanation {
    pub key_factors: Vec<KeyFactor>,
    pub risk_factors: Vec<RiskFactor>,
    pub risk_assessment: RiskLevel,
    pub verdict: Verdict,
    pub why_predicted: String,
}

/// Explain a calibrated prediction in terms of its inputs
pub fn explain(
    components: &[ComponentPrediction],
    f: &EntrantFeatures,
    probability: f64,
    confidence: f64,
) -> Explanation {
    let mut key_factors = Vec::new();
    let mut key = |factor, detail: String, impact| {
        key_factors.push(KeyFactor {
            factor,
            detail,
            impact,
        })
    };

    if let Some(rate) = f.recent_win_rate.filter(|r| *r > 0.3) {
        key(
            "Recent Winning Form",
            format!("{:.0}% win rate last 5 starts", rate * 100.0),
            Impact::Strong,
        );
    }
    if let Some(trend) = f.form_trend.filter(|t| *t < -1.0) {
        key(
            "Improving Form",
            format!("Trending {:.1} positions better", trend.abs()),
            Impact::Moderate,
        );
    }
    if f.track_favorite == Some(true) {
        key(
            "Track Specialist",
            format!("{:.0}% win rate at this track", f.track_win_rate.unwrap_or(0.0) * 100.0),
            Impact::Strong,
        );
    }
    if f.distance_specialist == Some(true) {
        key("Distance Specialist", "Proven at the distance".to_string(), Impact::Moderate);
    }
    if f.jt_synergy.unwrap_or(0.0) > 0.05 {
        key(
            "Jockey-Trainer Synergy",
            format!("{:.0}% win rate together", f.jt_combo_win_rate.unwrap_or(0.0) * 100.0),
            Impact::Moderate,
        );
    }
    if let Some(score) = f.jockey_score.filter(|s| *s > 75.0) {
        key("Top Jockey", format!("Jockey score {score:.0}"), Impact::Moderate);
    }
    if f.is_favorite == Some(true) {
        let odds = f.current_odds.unwrap_or(0.0);
        key("Market Favorite", format!("Odds: {odds:.1}"), Impact::Strong);
    }
    if let Some(support) = f.market_support.filter(|s| *s > 10.0) {
        key(
            "Market Support",
            format!("Odds shortening ({support:.0}% improvement)"),
            Impact::Moderate,
        );
    }
    if f.trial_win == Some(true) {
        key("Recent Trial Win", "Won latest barrier trial".to_string(), Impact::Moderate);
    }

    let mut risk_factors = Vec::new();
    let mut risk = |factor, detail: String, severity| {
        risk_factors.push(RiskFactor {
            factor,
            detail,
            severity,
        })
    };

    if f.first_up == Some(true) {
        risk(
            "First-Up",
            format!("{:.0} days since last run", f.days_since_last_race.unwrap_or(0.0)),
            RiskLevel::Medium,
        );
    }
    if f.vet_concerns.unwrap_or(0.0) > 0.0 {
        risk(
            "Veterinary Concerns",
            "Recent veterinary attention noted".to_string(),
            RiskLevel::High,
        );
    }
    if f.injury_history == Some(true) {
        risk(
            "Injury History",
            format!("{:.0} previous injuries", f.injury_count.unwrap_or(0.0)),
            RiskLevel::Medium,
        );
    }
    if f.is_heavy_weight == Some(true) {
        risk("Heavy Weight", format!("Carrying {:.0}lbs", f.weight.unwrap_or(0.0)), RiskLevel::Low);
    }
    if f.outside_draw == Some(true) {
        risk("Wide Draw", format!("Barrier {:.0}", f.draw.unwrap_or(0.0)), RiskLevel::Low);
    }
    if let Some(trend) = f.form_trend.filter(|t| *t > 1.5) {
        risk(
            "Declining Form",
            format!("Trending worse by {trend:.1} positions"),
            RiskLevel::Medium,
        );
    }

    let verdict = if probability > 0.25 && confidence > 0.7 && risk_factors.len() < 2 {
        Verdict::StrongContender
    } else if probability > 0.18 && risk_factors.len() < 3 {
        Verdict::PlaceChance
    } else if probability > 0.12 {
        Verdict::Roughie
    } else {
        Verdict::Outsider
    };

    Explanation {
        risk_assessment: RiskLevel::from_factor_count(risk_factors.len()),
        why_predicted: why_predicted(components, probability),
        key_factors,
        risk_factors,
        verdict,
    }
}

fn why_predicted(components: &[ComponentPrediction], probability: f64) -> String {
    let mut ranked: Vec<&ComponentPrediction> = components.iter().collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));

    let parts: Vec<String> = ranked
        .iter()
        .take(2)
        .filter_map(|c| {
            let label = if c.score > 65.0 {
                "strong"
            } else if c.score > 50.0 {
                "solid"
            } else {
                return None;
            };
            Some(format!("{label} {} ({:.0}/100)", c.component, c.score))
        })
        .collect();

    let basis = if parts.is_empty() {
        "average performance across all factors".to_string()
    } else {
        parts.join(", ")
    };
    format!("Predicted at {:.1}% based on: {basis}", probability * 100.0)
}
