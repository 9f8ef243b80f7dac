//! Value and edge analysis
//!
//! Compares calibrated probabilities with market odds:
//! - Edge (`p * odds - 1`) and value classification
//! - Opportunity ranking by edge weighted by confidence
//! - Odds movement, sharp-move detection and value shift over time
//! - Market consensus and contrarian plays

pub mod market;
pub mod movement;

#[cfg(test)]
mod tests;

pub use market::{ContrarianPlay, MarketConsensus, SpreadAnalysis};
pub use movement::{MovementDirection, OddsMovement, ValueShift, ValueTrend};

use crate::config::ValueConfig;
use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};

/// Expected return per unit staked: `p * odds - 1`.
///
/// Non-positive odds yield zero edge rather than an error.
pub fn edge(probability: f64, odds: f64) -> f64 {
    if odds <= 0.0 || !odds.is_finite() {
        return 0.0;
    }
    probability * odds - 1.0
}

/// Strict edge: odds must exceed 1 and the probability lie in (0, 1)
pub fn try_edge(probability: f64, odds: f64) -> Result<f64> {
    if !(odds > 1.0 && odds.is_finite()) {
        return Err(EngineError::Range(format!("odds must exceed 1.0, got {odds}")));
    }
    if !(probability > 0.0 && probability < 1.0) {
        return Err(EngineError::Range(format!(
            "probability must be in (0, 1), got {probability}"
        )));
    }
    Ok(edge(probability, odds))
}

/// Odds at which a bet has zero edge
pub fn fair_odds(probability: f64) -> Option<f64> {
    (probability > 0.0).then(|| 1.0 / probability)
}

pub fn implied_probability(odds: f64) -> Option<f64> {
    (odds > 0.0 && odds.is_finite()).then(|| 1.0 / odds)
}

/// Combined odds of a multi-leg bet; non-positive legs are ignored
pub fn parlay_odds(legs: &[f64]) -> f64 {
    if legs.is_empty() {
        return 0.0;
    }
    legs.iter().filter(|o| **o > 0.0).product()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueClass {
    Undervalued,
    Fair,
    Overvalued,
}

pub fn classify(edge: f64, config: &ValueConfig) -> ValueClass {
    if edge > config.undervalued_threshold {
        ValueClass::Undervalued
    } else if edge < config.overvalued_threshold {
        ValueClass::Overvalued
    } else {
        ValueClass::Fair
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OpportunityRating {
    StrongBuy,
    Buy,
    Consider,
    Avoid,
    Neutral,
}

impl OpportunityRating {
    /// Rating from edge and confidence
    pub fn from_edge(edge: f64, confidence: f64) -> Self {
        let score = edge * 100.0 * confidence;
        if score > 0.5 && edge > 0.2 {
            OpportunityRating::StrongBuy
        } else if score > 0.3 && edge > 0.1 {
            OpportunityRating::Buy
        } else if score > 0.15 && edge > 0.05 {
            OpportunityRating::Consider
        } else if edge < -0.1 {
            OpportunityRating::Avoid
        } else {
            OpportunityRating::Neutral
        }
    }
}

/// Inputs for value analysis of one entrant
#[derive(Debug, Clone, PartialEq)]
pub struct PricedEntrant {
    pub entrant_id: String,
    pub probability: f64,
    pub confidence: f64,
    pub odds: Option<f64>,
}

/// Value assessment of one entrant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueAssessment {
    pub entrant_id: String,
    pub probability: f64,
    pub odds: Option<f64>,
    pub edge: f64,
    pub class: ValueClass,
    /// Ranking key: edge weighted by confidence
    pub opportunity_score: f64,
    pub rating: OpportunityRating,
    pub fair_odds: Option<f64>,
}

/// Assess a single entrant. Missing odds give zero edge.
pub fn assess(entrant: &PricedEntrant, config: &ValueConfig) -> ValueAssessment {
    let edge = entrant.odds.map(|o| edge(entrant.probability, o)).unwrap_or(0.0);
    ValueAssessment {
        entrant_id: entrant.entrant_id.clone(),
        probability: entrant.probability,
        odds: entrant.odds,
        edge,
        class: classify(edge, config),
        opportunity_score: edge * entrant.confidence,
        rating: OpportunityRating::from_edge(edge, entrant.confidence),
        fair_odds: fair_odds(entrant.probability),
    }
}

/// Assessments with edge above `min_edge`, best opportunity first
pub fn rank_opportunities(
    entrants: &[PricedEntrant],
    min_edge: f64,
    config: &ValueConfig,
) -> Vec<ValueAssessment> {
    let mut ranked: Vec<ValueAssessment> = entrants
        .iter()
        .map(|e| assess(e, config))
        .filter(|a| a.edge > min_edge)
        .collect();
    ranked.sort_by(|a, b| b.opportunity_score.total_cmp(&a.opportunity_score));
    ranked
}

/// Undervalued entrants, highest edge first
pub fn undervalued(entrants: &[PricedEntrant], config: &ValueConfig) -> Vec<ValueAssessment> {
    let mut found: Vec<ValueAssessment> = entrants
        .iter()
        .map(|e| assess(e, config))
        .filter(|a| a.class == ValueClass::Undervalued)
        .collect();
    found.sort_by(|a, b| b.edge.total_cmp(&a.edge));
    found
}

/// Overvalued entrants, most overpriced first
pub fn overvalued(entrants: &[PricedEntrant], config: &ValueConfig) -> Vec<ValueAssessment> {
    let mut found: Vec<ValueAssessment> = entrants
        .iter()
        .map(|e| assess(e, config))
        .filter(|a| a.class == ValueClass::Overvalued)
        .collect();
    found.sort_by(|a, b| a.edge.total_cmp(&b.edge));
    found
}

/// An event with several undervalued entrants
#[derive(Debug, Clone, Serialize)]
pub struct MispricedEvent {
    pub event_id: String,
    pub value_count: usize,
    /// Up to three best-value entrants
    pub top_value: Vec<ValueAssessment>,
}

/// Events with at least two undervalued entrants
pub fn mispriced_events<'a, I>(events: I, config: &ValueConfig) -> Vec<MispricedEvent>
where
    I: IntoIterator<Item = (&'a str, &'a [PricedEntrant])>,
{
    events
        .into_iter()
        .filter_map(|(event_id, entrants)| {
            let found = undervalued(entrants, config);
            (found.len() >= 2).then(|| MispricedEvent {
                event_id: event_id.to_string(),
                value_count: found.len(),
                top_value: found.into_iter().take(3).collect(),
            })
        })
        .collect()
}
