//! Event scoring pipeline
//!
//! Features → component predictors → ensemble → calibration → place
//! probability → value. Entrants without any usable component score are
//! skipped; the rest of the event is still scored.
//!
//! A scored event can also be read against its odds history: price
//! movement, value shift, win/place spread, consensus and contrarian plays.

use crate::config::{CalibrationConfig, Config, ValueConfig};
use crate::error::Result;
use crate::ml::ensemble::explain;
use crate::ml::{
    CalibrationHandle, Calibrator, ComponentPrediction, EnsembleCombiner, EntrantFeatures,
    Explanation, PlaceDeriver,
};
use crate::types::{EventCard, OddsSnapshot, RiskLevel};
use crate::value::market::{contrarian_plays, market_consensus, win_place_spread};
use crate::value::movement::{analyze_movement, detect_value_shift, pressure_ranking, PricePressure};
use crate::value::{
    assess, rank_opportunities, ContrarianPlay, MarketConsensus, OddsMovement, PricedEntrant,
    SpreadAnalysis, ValueAssessment, ValueShift,
};
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Ranks inspected for risk alerts
const RISK_SCAN_DEPTH: u32 = 5;

/// Scored entrant
#[derive(Debug, Clone, Serialize)]
pub struct EnsembleResult {
    pub entrant_id: String,
    /// 1 = highest calibrated win probability
    pub rank: u32,
    pub raw_probability: f64,
    pub calibrated_win_probability: f64,
    pub place_probability: f64,
    pub confidence: f64,
    pub odds: Option<f64>,
    pub value: ValueAssessment,
    pub explanation: Explanation,
    pub components: Vec<ComponentPrediction>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedEntrant {
    pub entrant_id: String,
    pub reason: String,
}

/// A fancied entrant carrying high risk
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAlert {
    pub entrant_id: String,
    pub rank: u32,
    pub risk: RiskLevel,
    pub factors: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventPrediction {
    pub event_id: String,
    pub event_date: NaiveDate,
    pub venue: String,
    /// Ordered by calibrated win probability
    pub results: Vec<EnsembleResult>,
    pub top_value: Vec<ValueAssessment>,
    pub top_risk: Vec<RiskAlert>,
    pub skipped: Vec<SkippedEntrant>,
}

/// Price action and model-vs-market view for one entrant
#[derive(Debug, Clone, Serialize)]
pub struct EntrantMarket {
    pub entrant_id: String,
    pub movement: OddsMovement,
    /// Needs current odds and a scored probability
    pub value_shift: Option<ValueShift>,
    /// Needs both win and place odds
    pub spread: Option<SpreadAnalysis>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarketReport {
    pub event_id: String,
    pub consensus: MarketConsensus,
    /// Card order
    pub entrants: Vec<EntrantMarket>,
    /// Strongest absolute price movement first
    pub pressure: Vec<PricePressure>,
    pub contrarian: Vec<ContrarianPlay>,
}

/// Scores whole events with the current calibration snapshot
pub struct EventScorer {
    combiner: EnsembleCombiner,
    calibration: Arc<CalibrationHandle>,
    calibration_config: CalibrationConfig,
    place: PlaceDeriver,
    value: ValueConfig,
}

impl EventScorer {
    pub fn new(config: &Config, calibration: Arc<CalibrationHandle>) -> Result<Self> {
        Ok(Self {
            combiner: EnsembleCombiner::new(&config.ensemble.weights)?,
            calibration,
            calibration_config: config.calibration.clone(),
            place: PlaceDeriver::new(config.place.clone()),
            value: config.value.clone(),
        })
    }

    pub fn score(&self, card: &EventCard) -> EventPrediction {
        let mut skipped = Vec::new();
        let mut scored = Vec::with_capacity(card.entrants.len());

        for entrant in &card.entrants {
            let features = EntrantFeatures::from_raw(&entrant.features).with_odds(entrant.win_odds);
            match self.combiner.combine(&features) {
                Ok(combined) => scored.push((entrant.id.as_str(), features, combined)),
                Err(e) => {
                    warn!(
                        event_id = %card.event_id,
                        entrant_id = %entrant.id,
                        error = %e,
                        "Entrant skipped"
                    );
                    skipped.push(SkippedEntrant {
                        entrant_id: entrant.id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let model = self.calibration.snapshot();
        let calibrator = Calibrator::new(self.calibration_config.clone(), model);
        let raw: Vec<f64> = scored.iter().map(|(_, _, c)| c.raw_probability).collect();
        let odds: Vec<Option<f64>> = scored.iter().map(|(_, f, _)| f.odds()).collect();
        let calibrated = calibrator.calibrate_event(&raw, &odds);

        let mut results: Vec<EnsembleResult> = scored
            .into_iter()
            .zip(calibrated)
            .map(|((entrant_id, features, combined), win)| {
                let place = self.place.derive(win, &features);
                let odds = features.odds();
                let value = assess(
                    &PricedEntrant {
                        entrant_id: entrant_id.to_string(),
                        probability: win,
                        confidence: combined.confidence,
                        odds,
                    },
                    &self.value,
                );
                EnsembleResult {
                    entrant_id: entrant_id.to_string(),
                    rank: 0,
                    raw_probability: combined.raw_probability,
                    calibrated_win_probability: win,
                    place_probability: place,
                    confidence: combined.confidence,
                    odds,
                    value,
                    explanation: explain(&combined.components, &features, win, combined.confidence),
                    components: combined.components,
                }
            })
            .collect();

        results.sort_by(|a, b| {
            b.calibrated_win_probability
                .total_cmp(&a.calibrated_win_probability)
        });
        for (i, result) in results.iter_mut().enumerate() {
            result.rank = i as u32 + 1;
        }

        let prediction = EventPrediction {
            event_id: card.event_id.clone(),
            event_date: card.event_date,
            venue: card.venue.clone(),
            top_value: self.top_value(&results),
            top_risk: top_risk(&results),
            results,
            skipped,
        };

        info!(
            event_id = %prediction.event_id,
            scored = prediction.results.len(),
            skipped = prediction.skipped.len(),
            value_picks = prediction.top_value.len(),
            "Event scored"
        );
        prediction
    }

    /// Read a scored event against its odds history. Snapshots for entrants
    /// not on the card are ignored.
    pub fn market(
        &self,
        card: &EventCard,
        prediction: &EventPrediction,
        history: &[OddsSnapshot],
    ) -> MarketReport {
        let on_card: Vec<OddsSnapshot> = history
            .iter()
            .filter(|s| card.entrants.iter().any(|e| e.id == s.entrant_id))
            .cloned()
            .collect();

        let entrants = card
            .entrants
            .iter()
            .map(|entrant| {
                let own: Vec<OddsSnapshot> = on_card
                    .iter()
                    .filter(|s| s.entrant_id == entrant.id)
                    .cloned()
                    .collect();
                let scored = prediction.results.iter().find(|r| r.entrant_id == entrant.id);
                let value_shift = scored.zip(entrant.win_odds).map(|(r, odds)| {
                    detect_value_shift(odds, r.calibrated_win_probability, &own, &self.value)
                });
                let spread = entrant
                    .win_odds
                    .zip(entrant.place_odds)
                    .and_then(|(win, place)| win_place_spread(win, place, &self.value));
                EntrantMarket {
                    entrant_id: entrant.id.clone(),
                    movement: analyze_movement(&own, &self.value),
                    value_shift,
                    spread,
                }
            })
            .collect();

        let odds: Vec<f64> = card.entrants.iter().filter_map(|e| e.win_odds).collect();
        let report = MarketReport {
            event_id: card.event_id.clone(),
            consensus: market_consensus(&odds, &self.value),
            entrants,
            pressure: pressure_ranking(&on_card, self.value.top_n),
            contrarian: contrarian_plays(&priced(&prediction.results), &self.value),
        };

        info!(
            event_id = %report.event_id,
            snapshots = on_card.len(),
            contrarian = report.contrarian.len(),
            "Market analysed"
        );
        report
    }

    fn top_value(&self, results: &[EnsembleResult]) -> Vec<ValueAssessment> {
        let priced = priced(results);
        let mut ranked = rank_opportunities(&priced, self.value.undervalued_threshold, &self.value);
        ranked.truncate(self.value.top_n);
        debug!(candidates = priced.len(), picks = ranked.len(), "Value picks ranked");
        ranked
    }
}

fn priced(results: &[EnsembleResult]) -> Vec<PricedEntrant> {
    results
        .iter()
        .map(|r| PricedEntrant {
            entrant_id: r.entrant_id.clone(),
            probability: r.calibrated_win_probability,
            confidence: r.confidence,
            odds: r.odds,
        })
        .collect()
}

/// High-risk entrants among the top ranks
fn top_risk(results: &[EnsembleResult]) -> Vec<RiskAlert> {
    results
        .iter()
        .filter(|r| r.rank <= RISK_SCAN_DEPTH && r.explanation.risk_assessment == RiskLevel::High)
        .map(|r| RiskAlert {
            entrant_id: r.entrant_id.clone(),
            rank: r.rank,
            risk: r.explanation.risk_assessment,
            factors: r
                .explanation
                .risk_factors
                .iter()
                .map(|f| f.factor.to_string())
                .collect(),
        })
        .collect()
}
